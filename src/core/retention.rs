use crate::core::dedup::as_read_error;
use crate::domain::model::{RecordId, RecordRef, SkippedItem};
use crate::domain::ports::ListingRepository;
use crate::utils::error::{Result, TrackerError};
use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionOutcome {
    pub archived: usize,
    pub failures: Vec<SkippedItem>,
    pub cancelled: bool,
}

/// Decides which active records have outlived the retention window and retires them.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    max_age: Duration,
}

impl Default for RetentionManager {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_MAX_AGE_DAYS))
    }
}

impl RetentionManager {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.max_age
    }

    pub fn is_due(&self, record: &RecordRef, now: DateTime<Utc>) -> bool {
        !record.lifecycle.is_archived() && now - record.added_at >= self.max_age
    }

    /// Ids of every active record older than the window.
    ///
    /// The full candidate set is read before anything is archived, and any
    /// failed page aborts the selection.
    pub async fn select_for_archival<R: ListingRepository + ?Sized>(
        &self,
        repository: &R,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecordId>> {
        let cutoff = self.cutoff(now);
        let mut selected = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = repository
                .list_records_older_than(cutoff, cursor.as_deref())
                .await
                .map_err(|e| as_read_error("archival candidates", e))?;

            selected.extend(
                page.items
                    .into_iter()
                    .filter(|record| self.is_due(record, now))
                    .map(|record| record.id),
            );

            if !page.has_more {
                break;
            }
            cursor = match page.next_cursor {
                Some(next) => Some(next),
                None => {
                    return Err(TrackerError::RepositoryRead {
                        message: "archival page reported more results without a cursor"
                            .to_string(),
                    })
                }
            };
        }

        tracing::info!(
            "🗓️ {} record(s) added on or before {} are due for archival",
            selected.len(),
            cutoff.to_rfc3339()
        );
        Ok(selected)
    }

    /// Best-effort archival; one failure never stops the rest.
    pub async fn archive_all<R: ListingRepository + ?Sized>(
        &self,
        repository: &R,
        ids: &[RecordId],
        cancel: &CancellationToken,
    ) -> RetentionOutcome {
        let mut outcome = RetentionOutcome::default();

        for (index, id) in ids.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!("⏹️ Archival cancelled, {} candidate(s) left", ids.len() - index);
                outcome.cancelled = true;
                break;
            }

            match repository.archive(id).await {
                Ok(()) => {
                    tracing::debug!(%id, "archived record");
                    outcome.archived += 1;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to archive {}: {}", id, e);
                    outcome.failures.push(SkippedItem::Archive {
                        id: id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!("🧹 {} old listing(s) archived", outcome.archived);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{listing, CancelAfterWrite, MemoryRepository};
    use crate::domain::model::{Lifecycle, ScoredListing, StoredRecord};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn record_aged(link: &str, age: Duration, lifecycle: Lifecycle) -> StoredRecord {
        let mut record = StoredRecord::from_scored(&ScoredListing {
            listing: listing("Developer", "Remote", link),
            score: 1,
            ingested_at: now() - age,
        });
        record.lifecycle = lifecycle;
        record
    }

    fn reference(age: Duration, lifecycle: Lifecycle) -> RecordRef {
        RecordRef {
            id: RecordId::new("r"),
            link: "x".to_string(),
            added_at: now() - age,
            lifecycle,
        }
    }

    #[test]
    fn test_is_due_boundaries() {
        let manager = RetentionManager::default();

        assert!(manager.is_due(&reference(Duration::days(7), Lifecycle::Active), now()));
        assert!(manager.is_due(&reference(Duration::days(30), Lifecycle::Active), now()));
        assert!(!manager.is_due(
            &reference(Duration::days(7) - Duration::seconds(1), Lifecycle::Active),
            now()
        ));
        assert!(!manager.is_due(&reference(Duration::days(30), Lifecycle::Archived), now()));
    }

    #[test]
    fn test_cutoff() {
        let manager = RetentionManager::new(Duration::days(3));
        assert_eq!(
            manager.cutoff(now()),
            Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_select_skips_fresh_and_archived() {
        let repo = MemoryRepository::new(2);
        let old = repo
            .seed(record_aged("old", Duration::days(8), Lifecycle::Active))
            .await;
        repo.seed(record_aged("fresh", Duration::days(2), Lifecycle::Active))
            .await;
        repo.seed(record_aged("gone", Duration::days(20), Lifecycle::Archived))
            .await;
        let edge = repo
            .seed(record_aged("edge", Duration::days(7), Lifecycle::Active))
            .await;

        let manager = RetentionManager::default();
        let selected = manager.select_for_archival(&repo, now()).await.unwrap();
        assert_eq!(selected, vec![old, edge]);
    }

    #[tokio::test]
    async fn test_select_propagates_read_failure() {
        let repo = MemoryRepository::new(1);
        repo.seed(record_aged("a", Duration::days(9), Lifecycle::Active))
            .await;
        repo.seed(record_aged("b", Duration::days(9), Lifecycle::Active))
            .await;
        repo.fail_reads_after(1).await;

        let err = RetentionManager::default()
            .select_for_archival(&repo, now())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::RepositoryRead { .. }));
    }

    #[tokio::test]
    async fn test_archive_all_isolates_failures() {
        let repo = MemoryRepository::new(10);
        let a = repo
            .seed(record_aged("a", Duration::days(9), Lifecycle::Active))
            .await;
        let b = repo
            .seed(record_aged("b", Duration::days(9), Lifecycle::Active))
            .await;
        let c = repo
            .seed(record_aged("c", Duration::days(9), Lifecycle::Active))
            .await;
        repo.fail_archive_of(&b).await;

        let manager = RetentionManager::default();
        let outcome = manager
            .archive_all(&repo, &[a, b.clone(), c], &CancellationToken::new())
            .await;

        assert_eq!(outcome.archived, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(&outcome.failures[0], SkippedItem::Archive { id, .. } if *id == b));
        assert_eq!(repo.archive_attempts().await.len(), 3);

        let lifecycles: Vec<Lifecycle> =
            repo.records().await.iter().map(|(_, r)| r.lifecycle).collect();
        assert_eq!(
            lifecycles,
            vec![Lifecycle::Archived, Lifecycle::Active, Lifecycle::Archived]
        );
    }

    #[tokio::test]
    async fn test_second_sweep_is_noop() {
        let repo = MemoryRepository::new(10);
        repo.seed(record_aged("a", Duration::days(9), Lifecycle::Active))
            .await;
        let manager = RetentionManager::default();
        let cancel = CancellationToken::new();

        let first = manager.select_for_archival(&repo, now()).await.unwrap();
        assert_eq!(manager.archive_all(&repo, &first, &cancel).await.archived, 1);

        let second = manager.select_for_archival(&repo, now()).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_archive_all_stops_when_cancelled() {
        let repo = MemoryRepository::new(10);
        let a = repo
            .seed(record_aged("a", Duration::days(9), Lifecycle::Active))
            .await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = RetentionManager::default()
            .archive_all(&repo, &[a], &cancel)
            .await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.archived, 0);
        assert!(repo.archive_attempts().await.is_empty());
    }

    #[tokio::test]
    async fn test_archive_all_stops_between_candidates() {
        let repo = MemoryRepository::new(10);
        let mut ids = Vec::new();
        for link in ["a", "b", "c"] {
            ids.push(
                repo.seed(record_aged(link, Duration::days(9), Lifecycle::Active))
                    .await,
            );
        }
        let cancel = CancellationToken::new();
        let cancelling = CancelAfterWrite::new(repo.clone(), cancel.clone());

        let outcome = RetentionManager::default()
            .archive_all(&cancelling, &ids, &cancel)
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.archived, 1);
        assert!(outcome.failures.is_empty());
        assert_eq!(repo.archive_attempts().await, vec![ids[0].clone()]);

        let lifecycles: Vec<Lifecycle> =
            repo.records().await.iter().map(|(_, r)| r.lifecycle).collect();
        assert_eq!(
            lifecycles,
            vec![Lifecycle::Archived, Lifecycle::Active, Lifecycle::Active]
        );
    }
}
