use crate::domain::model::{Listing, ScoredListing};
use crate::utils::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A labelled pattern as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub label: String,
    pub pattern: String,
}

impl RuleSpec {
    pub fn new(label: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    label: String,
    pattern: Regex,
}

impl Rule {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Ordered, compiled rule collection.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile(specs: &[RuleSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .map(|spec| {
                RegexBuilder::new(&spec.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|pattern| Rule {
                        label: spec.label.clone(),
                        pattern,
                    })
                    .map_err(|e| TrackerError::InvalidRule {
                        label: spec.label.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

/// Additive keyword scorer over a listing's title and location.
///
/// Every rule of the content set and the locality set adds one point when it
/// matches anywhere in the lowercased `"<title> <location>"` string. A rule
/// counts once however many times it matches, so the score is bounded by the
/// total number of rules. No state is kept between calls.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    content: RuleSet,
    locality: RuleSet,
}

impl RelevanceScorer {
    pub fn new(content: RuleSet, locality: RuleSet) -> Self {
        Self { content, locality }
    }

    pub fn from_specs(content: &[RuleSpec], locality: &[RuleSpec]) -> Result<Self> {
        Ok(Self::new(
            RuleSet::compile(content)?,
            RuleSet::compile(locality)?,
        ))
    }

    pub fn max_score(&self) -> u32 {
        (self.content.len() + self.locality.len()) as u32
    }

    pub fn score(&self, title: &str, location: &str) -> u32 {
        let text = evaluation_text(title, location);
        self.rules().filter(|rule| rule.matches(&text)).count() as u32
    }

    /// Labels of the rules that matched, in rule order.
    pub fn explain(&self, title: &str, location: &str) -> Vec<&str> {
        let text = evaluation_text(title, location);
        self.rules()
            .filter(|rule| rule.matches(&text))
            .map(Rule::label)
            .collect()
    }

    pub fn score_listing(&self, listing: Listing, at: DateTime<Utc>) -> ScoredListing {
        let score = self.score(&listing.title, &listing.location);
        tracing::debug!(
            link = %listing.link,
            score,
            matched = ?self.explain(&listing.title, &listing.location),
            "scored listing"
        );
        ScoredListing {
            listing,
            score,
            ingested_at: at,
        }
    }

    fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.content.iter().chain(self.locality.iter())
    }
}

fn evaluation_text(title: &str, location: &str) -> String {
    format!("{} {}", title.to_lowercase(), location.to_lowercase())
}
