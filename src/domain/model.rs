use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UNSPECIFIED_COMPANY: &str = "unspecified";

/// A job posting exactly as the source returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    #[serde(default = "default_company")]
    pub company: String,
    #[serde(default)]
    pub location: String,
    pub link: String,
    #[serde(default)]
    pub source: String,
}

fn default_company() -> String {
    UNSPECIFIED_COMPANY.to_string()
}

impl Listing {
    pub fn new(
        title: impl Into<String>,
        company: Option<String>,
        location: impl Into<String>,
        link: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let company = company
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_company);

        Self {
            title: title.into().trim().to_string(),
            company,
            location: location.into().trim().to_string(),
            link: link.into().trim().to_string(),
            source: source.into(),
        }
    }

    /// Listings without a title or a link cannot be identified or scored.
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty() && !self.link.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredListing {
    pub listing: Listing,
    pub score: u32,
    pub ingested_at: DateTime<Utc>,
}

impl ScoredListing {
    pub fn link(&self) -> &str {
        &self.listing.link
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Archived,
}

impl Lifecycle {
    /// `Archived` is terminal: archiving is the only transition and it is absorbing.
    pub fn archive(self) -> Lifecycle {
        Lifecycle::Archived
    }

    pub fn is_archived(self) -> bool {
        self == Lifecycle::Archived
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted projection of a scored listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub source: String,
    pub score: u32,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

impl StoredRecord {
    pub fn from_scored(scored: &ScoredListing) -> Self {
        let listing = &scored.listing;
        Self {
            title: listing.title.clone(),
            company: listing.company.clone(),
            location: listing.location.clone(),
            link: listing.link.clone(),
            source: listing.source.clone(),
            score: scored.score,
            added_at: scored.ingested_at,
            lifecycle: Lifecycle::Active,
        }
    }
}

/// What the retention sweep reads back from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub id: RecordId,
    pub link: String,
    pub added_at: DateTime<Utc>,
    pub lifecycle: Lifecycle,
}

/// One page of a cursor-paginated repository read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

pub type LinkPage = Page<String>;
pub type RecordPage = Page<RecordRef>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkippedItem {
    Fetch {
        term: String,
        location: String,
        reason: String,
    },
    Incomplete {
        link: String,
        title: String,
    },
    Insert {
        link: String,
        reason: String,
    },
    Archive {
        id: RecordId,
        reason: String,
    },
}

impl fmt::Display for SkippedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkippedItem::Fetch {
                term,
                location,
                reason,
            } => write!(f, "fetch '{}' @ '{}': {}", term, location, reason),
            SkippedItem::Incomplete { link, title } => {
                write!(f, "incomplete listing (title='{}', link='{}')", title, link)
            }
            SkippedItem::Insert { link, reason } => write!(f, "insert {}: {}", link, reason),
            SkippedItem::Archive { id, reason } => write!(f, "archive {}: {}", id, reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub scored: usize,
    /// Listings dropped because the same link already appeared earlier in this run.
    pub repeated: usize,
    pub new: usize,
    pub inserted: usize,
    pub archive_candidates: usize,
    pub archived: usize,
    pub cancelled: bool,
    pub skipped: Vec<SkippedItem>,
}

impl RunSummary {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_listing_defaults_company() {
        let listing = Listing::new("Dev", None, "Paris", "https://x/1", "feed");
        assert_eq!(listing.company, UNSPECIFIED_COMPANY);

        let blank = Listing::new("Dev", Some("  ".to_string()), "Paris", "https://x/1", "feed");
        assert_eq!(blank.company, UNSPECIFIED_COMPANY);
    }

    #[test]
    fn test_listing_completeness() {
        assert!(Listing::new("Dev", None, "", "https://x/1", "feed").is_complete());
        assert!(!Listing::new("", None, "", "https://x/1", "feed").is_complete());
        assert!(!Listing::new("Dev", None, "", " ", "feed").is_complete());
    }

    #[test]
    fn test_listing_deserialize_defaults() {
        let listing: Listing =
            serde_json::from_str(r#"{"title":"Dev","link":"https://x/1"}"#).unwrap();
        assert_eq!(listing.company, UNSPECIFIED_COMPANY);
        assert_eq!(listing.location, "");
    }

    #[test]
    fn test_archived_is_absorbing() {
        let archived = Lifecycle::Active.archive();
        assert!(archived.is_archived());
        assert_eq!(archived.archive(), Lifecycle::Archived);
    }

    #[test]
    fn test_stored_record_from_scored() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let scored = ScoredListing {
            listing: Listing::new("React Developer", None, "Remote", "A", "feed"),
            score: 2,
            ingested_at: at,
        };

        let record = StoredRecord::from_scored(&scored);
        assert_eq!(record.added_at, at);
        assert_eq!(record.lifecycle, Lifecycle::Active);
        assert_eq!(record.score, 2);
        assert_eq!(record.link, "A");
    }
}
