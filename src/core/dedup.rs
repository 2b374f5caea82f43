use crate::domain::model::ScoredListing;
use crate::domain::ports::ListingRepository;
use crate::utils::error::{Result, TrackerError};
use std::collections::HashSet;

/// Keeps the candidates whose link is not already known, in input order.
///
/// Matching is exact on the link string.
pub fn filter_new(
    candidates: Vec<ScoredListing>,
    known_links: &HashSet<String>,
) -> Vec<ScoredListing> {
    candidates
        .into_iter()
        .filter(|candidate| !known_links.contains(candidate.link()))
        .collect()
}

/// Drops later occurrences of a link seen earlier in the same batch.
/// Returns the survivors and how many were dropped.
pub fn collapse_repeats(candidates: Vec<ScoredListing>) -> (Vec<ScoredListing>, usize) {
    let before = candidates.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<ScoredListing> = candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.link().to_string()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Pages through every link the repository holds.
///
/// Fails as a whole if any page fails: a partial set would let known
/// listings through as new.
pub async fn collect_known_links<R: ListingRepository + ?Sized>(
    repository: &R,
) -> Result<HashSet<String>> {
    let mut links = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = repository
            .list_links(cursor.as_deref())
            .await
            .map_err(|e| as_read_error("known links", e))?;
        pages += 1;

        links.extend(page.items.into_iter().filter(|link| !link.is_empty()));

        if !page.has_more {
            break;
        }
        match page.next_cursor {
            Some(next) => {
                tracing::debug!(cursor = %next, "fetching next page of known links");
                cursor = Some(next);
            }
            None => {
                return Err(TrackerError::RepositoryRead {
                    message: "known links page reported more results without a cursor"
                        .to_string(),
                })
            }
        }
    }

    tracing::info!("📚 {} known links across {} page(s)", links.len(), pages);
    Ok(links)
}

pub(crate) fn as_read_error(stage: &str, err: TrackerError) -> TrackerError {
    match err {
        TrackerError::RepositoryRead { .. } => err,
        other => TrackerError::RepositoryRead {
            message: format!("{}: {}", stage, other),
        },
    }
}
