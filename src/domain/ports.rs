use crate::domain::model::{LinkPage, Listing, RecordId, RecordPage, StoredRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Produces raw listings for one (term, location) query.
#[async_trait]
pub trait ListingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, term: &str, location: &str) -> Result<Vec<Listing>>;
}

/// Persistent store of scored listings. Reads are cursor-paginated.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn list_links(&self, cursor: Option<&str>) -> Result<LinkPage>;

    /// Records added at or before `cutoff`. May include archived ones.
    async fn list_records_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<RecordPage>;

    /// Stores the whole record or nothing.
    async fn insert(&self, record: &StoredRecord) -> Result<RecordId>;

    /// Archiving an already archived record succeeds without effect.
    async fn archive(&self, id: &RecordId) -> Result<()>;
}
