use crate::domain::model::{LinkPage, Page, RecordId, RecordPage, RecordRef, StoredRecord};
use crate::domain::ports::ListingRepository;
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: RecordId,
    #[serde(flatten)]
    record: StoredRecord,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    records: Vec<StoredEntry>,
}

/// Listing store kept as one JSON document on local disk.
///
/// Every write goes to a temporary sibling file that is then renamed over
/// the store, so a record is either fully written or not at all.
pub struct JsonFileRepository {
    path: PathBuf,
    page_size: usize,
    state: Mutex<StoreFile>,
}

impl JsonFileRepository {
    /// Opens the store at `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>, page_size: usize) -> Result<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => StoreFile::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => return Err(TrackerError::IoError(e)),
        };

        tracing::debug!(
            "Opened listing store {} with {} record(s)",
            path.display(),
            state.records.len()
        );

        Ok(Self {
            path,
            page_size: page_size.max(1),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of every record with its id.
    pub async fn records(&self) -> Vec<(RecordId, StoredRecord)> {
        self.state
            .lock()
            .await
            .records
            .iter()
            .map(|entry| (entry.id.clone(), entry.record.clone()))
            .collect()
    }

    async fn persist(&self, file: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec_pretty(file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn page<T: Clone>(&self, items: Vec<T>, cursor: Option<&str>) -> Result<Page<T>> {
        let offset = match cursor {
            Some(raw) => raw.parse::<usize>().map_err(|_| TrackerError::RepositoryRead {
                message: format!("invalid cursor '{}'", raw),
            })?,
            None => 0,
        };

        let end = offset.saturating_add(self.page_size).min(items.len());
        let has_more = end < items.len();
        let page_items = if offset < end {
            items[offset..end].to_vec()
        } else {
            Vec::new()
        };

        Ok(Page {
            items: page_items,
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
        })
    }
}

#[async_trait]
impl ListingRepository for JsonFileRepository {
    async fn list_links(&self, cursor: Option<&str>) -> Result<LinkPage> {
        let links: Vec<String> = {
            let state = self.state.lock().await;
            state
                .records
                .iter()
                .map(|entry| entry.record.link.clone())
                .collect()
        };
        self.page(links, cursor)
    }

    async fn list_records_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        let refs: Vec<RecordRef> = {
            let state = self.state.lock().await;
            state
                .records
                .iter()
                .filter(|entry| entry.record.added_at <= cutoff)
                .map(|entry| RecordRef {
                    id: entry.id.clone(),
                    link: entry.record.link.clone(),
                    added_at: entry.record.added_at,
                    lifecycle: entry.record.lifecycle,
                })
                .collect()
        };
        self.page(refs, cursor)
    }

    async fn insert(&self, record: &StoredRecord) -> Result<RecordId> {
        let mut state = self.state.lock().await;

        let mut next = state.clone();
        next.next_id += 1;
        let id = RecordId::new(format!("rec-{:06}", next.next_id));
        next.records.push(StoredEntry {
            id: id.clone(),
            record: record.clone(),
        });

        self.persist(&next)
            .await
            .map_err(|e| TrackerError::RepositoryWrite {
                target: record.link.clone(),
                message: e.to_string(),
            })?;

        *state = next;
        Ok(id)
    }

    async fn archive(&self, id: &RecordId) -> Result<()> {
        let mut state = self.state.lock().await;

        let index = state
            .records
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| TrackerError::RepositoryWrite {
                target: id.to_string(),
                message: "record not found".to_string(),
            })?;

        if state.records[index].record.lifecycle.is_archived() {
            return Ok(());
        }

        let mut next = state.clone();
        let entry = &mut next.records[index];
        entry.record.lifecycle = entry.record.lifecycle.archive();

        self.persist(&next)
            .await
            .map_err(|e| TrackerError::RepositoryWrite {
                target: id.to_string(),
                message: e.to_string(),
            })?;

        *state = next;
        Ok(())
    }
}
