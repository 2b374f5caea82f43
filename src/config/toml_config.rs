use crate::core::retention::DEFAULT_MAX_AGE_DAYS;
use crate::core::scorer::{RelevanceScorer, RuleSpec};
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_RULES: &str = include_str!("default_rules.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    pub source: SourceConfig,
    pub repository: RepositoryConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub query_terms: Vec<String>,
    pub locations: Vec<String>,
}

/// The (term, location) worklist of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worklist {
    pub terms: Vec<String>,
    pub locations: Vec<String>,
}

impl Worklist {
    pub fn new<T, L>(terms: T, locations: L) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            terms: dedup_preserving_order(terms.into_iter().map(Into::into)),
            locations: dedup_preserving_order(locations.into_iter().map(Into::into)),
        }
    }

    /// Cartesian product, terms outermost.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms.iter().flat_map(move |term| {
            self.locations
                .iter()
                .map(move |location| (term.as_str(), location.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.terms.len() * self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn dedup_preserving_order(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim().to_string();
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Rule sets; a missing set falls back to the bundled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub content_rules: Option<Vec<RuleSpec>>,
    pub locality_rules: Option<Vec<RuleSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
struct BundledRules {
    content_rules: Vec<RuleSpec>,
    locality_rules: Vec<RuleSpec>,
}

impl ScoringConfig {
    fn bundled() -> Result<BundledRules> {
        toml::from_str(DEFAULT_RULES).map_err(|e| TrackerError::ConfigValidationError {
            field: "scoring".to_string(),
            message: format!("bundled rules are invalid: {}", e),
        })
    }

    /// Resolved (content, locality) rule specs.
    pub fn rule_specs(&self) -> Result<(Vec<RuleSpec>, Vec<RuleSpec>)> {
        let bundled = Self::bundled()?;
        Ok((
            self.content_rules.clone().unwrap_or(bundled.content_rules),
            self.locality_rules.clone().unwrap_or(bundled.locality_rules),
        ))
    }

    pub fn build_scorer(&self) -> Result<RelevanceScorer> {
        let (content, locality) = self.rule_specs()?;
        RelevanceScorer::from_specs(&content, &locality)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

fn default_max_age_days() -> i64 {
    DEFAULT_MAX_AGE_DAYS
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

impl RetentionConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_age_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoint: String,
    #[serde(default = "default_source_name")]
    pub source_name: String,
    #[serde(default = "default_term_param")]
    pub term_param: String,
    #[serde(default = "default_location_param")]
    pub location_param: String,
    pub link_prefix: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
    /// feed key -> listing field (title, company, location, link)
    pub field_mapping: Option<HashMap<String, String>>,
}

fn default_source_name() -> String {
    "feed".to_string()
}

fn default_term_param() -> String {
    "q".to_string()
}

fn default_location_param() -> String {
    "l".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepositoryConfig {
    JsonFile {
        path: String,
        page_size: Option<usize>,
    },
    Notion {
        #[serde(default = "default_notion_api_base")]
        api_base: String,
        token: Option<String>,
        database_id: Option<String>,
        page_size: Option<usize>,
        #[serde(default)]
        properties: NotionProperties,
        timeout_seconds: Option<u64>,
    },
}

fn default_notion_api_base() -> String {
    "https://api.notion.com".to_string()
}

/// Column names of the Notion database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionProperties {
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub source: String,
    pub added_at: String,
    pub score: String,
}

impl Default for NotionProperties {
    fn default() -> Self {
        Self {
            title: "Title".to_string(),
            company: "Company".to_string(),
            location: "Location".to_string(),
            link: "Link".to_string(),
            source: "Source".to_string(),
            added_at: "Date ajoutée".to_string(),
            score: "Score".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_format: Option<String>,
}

impl TrackerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TrackerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string, after `${VAR}` substitution.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| TrackerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unset variables are left as-is so validation can report them.
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern compiles")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn worklist(&self) -> Worklist {
        Worklist::new(
            self.pipeline.query_terms.iter().cloned(),
            self.pipeline.locations.iter().cloned(),
        )
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_list("pipeline.query_terms", &self.pipeline.query_terms)?;
        validation::validate_non_empty_list("pipeline.locations", &self.pipeline.locations)?;

        validation::validate_url("source.endpoint", &self.source.endpoint)?;
        validation::validate_non_empty_string("source.term_param", &self.source.term_param)?;
        validation::validate_non_empty_string(
            "source.location_param",
            &self.source.location_param,
        )?;

        validation::validate_range(
            "retention.max_age_days",
            self.retention.max_age_days,
            1,
            365,
        )?;

        match &self.repository {
            RepositoryConfig::JsonFile { path, page_size } => {
                validation::validate_path("repository.path", path)?;
                if let Some(size) = page_size {
                    validation::validate_positive_number("repository.page_size", *size, 1)?;
                }
            }
            RepositoryConfig::Notion {
                api_base,
                token,
                database_id,
                page_size,
                ..
            } => {
                validation::validate_url("repository.api_base", api_base)?;
                validation::validate_required_setting("repository.token", token)?;
                validation::validate_required_setting("repository.database_id", database_id)?;
                if let Some(size) = page_size {
                    validation::validate_range("repository.page_size", *size, 1, 100)?;
                }
            }
        }

        // Compiling surfaces bad patterns before any network call.
        self.scoring.build_scorer()?;

        Ok(())
    }
}

impl Validate for TrackerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
