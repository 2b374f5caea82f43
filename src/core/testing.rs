//! In-memory collaborators shared by the core unit tests.

use crate::domain::model::{
    LinkPage, Listing, Page, RecordId, RecordPage, RecordRef, StoredRecord,
};
use crate::domain::ports::{ListingRepository, ListingSource};
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct MemoryState {
    records: Vec<(RecordId, StoredRecord)>,
    fail_reads_after: Option<usize>,
    reads: usize,
    fail_insert_links: HashSet<String>,
    fail_archive_ids: HashSet<RecordId>,
    insert_attempts: Vec<String>,
    archive_attempts: Vec<RecordId>,
}

#[derive(Clone)]
pub(crate) struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    page_size: usize,
}

impl MemoryRepository {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            page_size,
        }
    }

    pub(crate) async fn seed(&self, record: StoredRecord) -> RecordId {
        let mut state = self.state.lock().await;
        let id = RecordId::new(format!("mem-{}", state.records.len() + 1));
        state.records.push((id.clone(), record));
        id
    }

    /// Every read after the first `pages` successful ones fails.
    pub(crate) async fn fail_reads_after(&self, pages: usize) {
        self.state.lock().await.fail_reads_after = Some(pages);
    }

    pub(crate) async fn fail_insert_of(&self, link: &str) {
        self.state.lock().await.fail_insert_links.insert(link.to_string());
    }

    pub(crate) async fn fail_archive_of(&self, id: &RecordId) {
        self.state.lock().await.fail_archive_ids.insert(id.clone());
    }

    pub(crate) async fn records(&self) -> Vec<(RecordId, StoredRecord)> {
        self.state.lock().await.records.clone()
    }

    pub(crate) async fn insert_attempts(&self) -> Vec<String> {
        self.state.lock().await.insert_attempts.clone()
    }

    pub(crate) async fn archive_attempts(&self) -> Vec<RecordId> {
        self.state.lock().await.archive_attempts.clone()
    }

    fn check_read(state: &mut MemoryState) -> Result<()> {
        state.reads += 1;
        match state.fail_reads_after {
            Some(limit) if state.reads > limit => Err(TrackerError::RepositoryRead {
                message: format!("simulated read failure on page {}", state.reads),
            }),
            _ => Ok(()),
        }
    }

    fn paginate<T: Clone>(&self, items: &[T], cursor: Option<&str>) -> Result<Page<T>> {
        let offset = match cursor {
            Some(cursor) => cursor.parse::<usize>().map_err(|_| TrackerError::RepositoryRead {
                message: format!("bad cursor {}", cursor),
            })?,
            None => 0,
        };
        let end = (offset + self.page_size).min(items.len());
        let page = items.get(offset..end).unwrap_or_default().to_vec();
        let has_more = end < items.len();
        Ok(Page {
            items: page,
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
        })
    }
}

#[async_trait]
impl ListingRepository for MemoryRepository {
    async fn list_links(&self, cursor: Option<&str>) -> Result<LinkPage> {
        let mut state = self.state.lock().await;
        Self::check_read(&mut state)?;
        let links: Vec<String> = state.records.iter().map(|(_, r)| r.link.clone()).collect();
        self.paginate(&links, cursor)
    }

    async fn list_records_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        let mut state = self.state.lock().await;
        Self::check_read(&mut state)?;
        let refs: Vec<RecordRef> = state
            .records
            .iter()
            .filter(|(_, r)| r.added_at <= cutoff)
            .map(|(id, r)| RecordRef {
                id: id.clone(),
                link: r.link.clone(),
                added_at: r.added_at,
                lifecycle: r.lifecycle,
            })
            .collect();
        self.paginate(&refs, cursor)
    }

    async fn insert(&self, record: &StoredRecord) -> Result<RecordId> {
        let mut state = self.state.lock().await;
        state.insert_attempts.push(record.link.clone());
        if state.fail_insert_links.contains(&record.link) {
            return Err(TrackerError::RepositoryWrite {
                target: record.link.clone(),
                message: "simulated insert failure".to_string(),
            });
        }
        let id = RecordId::new(format!("mem-{}", state.records.len() + 1));
        state.records.push((id.clone(), record.clone()));
        Ok(id)
    }

    async fn archive(&self, id: &RecordId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.archive_attempts.push(id.clone());
        if state.fail_archive_ids.contains(id) {
            return Err(TrackerError::RepositoryWrite {
                target: id.to_string(),
                message: "simulated archive failure".to_string(),
            });
        }
        match state.records.iter_mut().find(|(rid, _)| rid == id) {
            Some((_, record)) => {
                record.lifecycle = record.lifecycle.archive();
                Ok(())
            }
            None => Err(TrackerError::RepositoryWrite {
                target: id.to_string(),
                message: "no such record".to_string(),
            }),
        }
    }
}

/// Delegates to a `MemoryRepository` and cancels `cancel` as soon as one
/// insert or archive has gone through, whether it succeeded or not.
pub(crate) struct CancelAfterWrite {
    inner: MemoryRepository,
    cancel: CancellationToken,
}

impl CancelAfterWrite {
    pub(crate) fn new(inner: MemoryRepository, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

#[async_trait]
impl ListingRepository for CancelAfterWrite {
    async fn list_links(&self, cursor: Option<&str>) -> Result<LinkPage> {
        self.inner.list_links(cursor).await
    }

    async fn list_records_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        self.inner.list_records_older_than(cutoff, cursor).await
    }

    async fn insert(&self, record: &StoredRecord) -> Result<RecordId> {
        let result = self.inner.insert(record).await;
        self.cancel.cancel();
        result
    }

    async fn archive(&self, id: &RecordId) -> Result<()> {
        let result = self.inner.archive(id).await;
        self.cancel.cancel();
        result
    }
}

/// Serves canned listings per (term, location); unknown pairs return nothing.
#[derive(Default)]
pub(crate) struct StubSource {
    listings: HashMap<(String, String), Vec<Listing>>,
    failing: HashSet<(String, String)>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, term: &str, location: &str, listings: Vec<Listing>) -> Self {
        self.listings
            .insert((term.to_string(), location.to_string()), listings);
        self
    }

    pub(crate) fn failing(mut self, term: &str, location: &str) -> Self {
        self.failing.insert((term.to_string(), location.to_string()));
        self
    }

    pub(crate) async fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ListingSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(&self, term: &str, location: &str) -> Result<Vec<Listing>> {
        let key = (term.to_string(), location.to_string());
        self.calls.lock().await.push(key.clone());
        if self.failing.contains(&key) {
            return Err(TrackerError::SourceFetch {
                term: term.to_string(),
                location: location.to_string(),
                message: "simulated outage".to_string(),
            });
        }
        Ok(self.listings.get(&key).cloned().unwrap_or_default())
    }
}

pub(crate) fn listing(title: &str, location: &str, link: &str) -> Listing {
    Listing::new(title, None, location, link, "stub")
}
