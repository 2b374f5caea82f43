use crate::config::Worklist;
use crate::core::dedup::{collapse_repeats, collect_known_links, filter_new};
use crate::core::retention::RetentionManager;
use crate::core::scorer::RelevanceScorer;
use crate::domain::model::{Listing, RunSummary, ScoredListing, SkippedItem, StoredRecord};
use crate::domain::ports::{ListingRepository, ListingSource};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Runs fetch → score → dedupe → persist → retire, one step after another.
///
/// Per-item failures (one fetch pair, one insert, one archive) are logged,
/// recorded in the summary and skipped. Only an incomplete repository read
/// fails the run. Nothing is kept between runs.
pub struct Orchestrator<S: ListingSource, R: ListingRepository> {
    source: S,
    repository: R,
    scorer: RelevanceScorer,
    retention: RetentionManager,
}

impl<S: ListingSource, R: ListingRepository> Orchestrator<S, R> {
    pub fn new(
        source: S,
        repository: R,
        scorer: RelevanceScorer,
        retention: RetentionManager,
    ) -> Self {
        Self {
            source,
            repository,
            scorer,
            retention,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn run(&self, worklist: &Worklist, cancel: &CancellationToken) -> Result<RunSummary> {
        self.run_at(worklist, Utc::now(), cancel).await
    }

    /// Same as [`Orchestrator::run`] with an explicit clock, used for scoring
    /// timestamps and the retention cutoff.
    pub async fn run_at(
        &self,
        worklist: &Worklist,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        tracing::info!(
            "🚀 Starting run: {} query pair(s) from {}",
            worklist.len(),
            self.source.name()
        );

        let fetched = self.fetch_all(worklist, cancel, &mut summary).await;
        if summary.cancelled {
            return Ok(summary);
        }

        let scored = self.score_all(fetched, now, &mut summary);

        let (scored, repeated) = collapse_repeats(scored);
        summary.repeated = repeated;
        if repeated > 0 {
            tracing::debug!("{} listing(s) repeated across query pairs", repeated);
        }

        let known_links = collect_known_links(&self.repository).await?;
        let fresh = filter_new(scored, &known_links);
        summary.new = fresh.len();
        tracing::info!("🆕 {} new listing(s) after deduplication", summary.new);

        self.persist_all(&fresh, cancel, &mut summary).await;
        if summary.cancelled {
            return Ok(summary);
        }

        self.retire(now, cancel, &mut summary).await?;

        tracing::info!(
            "✅ Run complete: fetched={} scored={} new={} inserted={} archived={} skipped={}",
            summary.fetched,
            summary.scored,
            summary.new,
            summary.inserted,
            summary.archived,
            summary.skipped_count()
        );
        Ok(summary)
    }

    async fn fetch_all(
        &self,
        worklist: &Worklist,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Vec<Listing> {
        let mut all = Vec::new();

        for (term, location) in worklist.pairs() {
            if cancel.is_cancelled() {
                tracing::warn!("⏹️ Cancelled before fetching '{}' @ '{}'", term, location);
                summary.cancelled = true;
                break;
            }

            tracing::info!("🔎 Fetching '{}' @ '{}'", term, location);
            match self.source.fetch(term, location).await {
                Ok(listings) if listings.is_empty() => {
                    tracing::info!("No listings for '{}' @ '{}'", term, location);
                }
                Ok(listings) => {
                    tracing::info!("📥 {} listing(s) for '{}' @ '{}'", listings.len(), term, location);
                    all.extend(listings);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping '{}' @ '{}': {}", term, location, e);
                    summary.skipped.push(SkippedItem::Fetch {
                        term: term.to_string(),
                        location: location.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        summary.fetched = all.len();
        all
    }

    fn score_all(
        &self,
        listings: Vec<Listing>,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Vec<ScoredListing> {
        let mut scored = Vec::with_capacity(listings.len());

        for listing in listings {
            if !listing.is_complete() {
                tracing::warn!(
                    "⚠️ Dropping incomplete listing (title='{}', link='{}')",
                    listing.title,
                    listing.link
                );
                summary.skipped.push(SkippedItem::Incomplete {
                    link: listing.link,
                    title: listing.title,
                });
                continue;
            }
            scored.push(self.scorer.score_listing(listing, now));
        }

        summary.scored = scored.len();
        scored
    }

    async fn persist_all(
        &self,
        fresh: &[ScoredListing],
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) {
        for (index, candidate) in fresh.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "⏹️ Cancelled with {} listing(s) left to insert",
                    fresh.len() - index
                );
                summary.cancelled = true;
                return;
            }

            let record = StoredRecord::from_scored(candidate);
            match self.repository.insert(&record).await {
                Ok(id) => {
                    summary.inserted += 1;
                    tracing::info!(
                        "➕ Added: {} @ {} (score {}) as {}",
                        record.title,
                        record.company,
                        record.score,
                        id
                    );
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to insert {}: {}", record.link, e);
                    summary.skipped.push(SkippedItem::Insert {
                        link: record.link,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!("💾 {} new listing(s) stored", summary.inserted);
    }

    async fn retire(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<()> {
        tracing::info!("🧹 Cleaning up listings older than {:?}", self.retention.max_age());

        let candidates = self
            .retention
            .select_for_archival(&self.repository, now)
            .await?;
        summary.archive_candidates = candidates.len();

        let outcome = self
            .retention
            .archive_all(&self.repository, &candidates, cancel)
            .await;
        summary.archived = outcome.archived;
        summary.cancelled |= outcome.cancelled;
        summary.skipped.extend(outcome.failures);
        Ok(())
    }
}
