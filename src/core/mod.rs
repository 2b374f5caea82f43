pub mod dedup;
pub mod orchestrator;
pub mod retention;
pub mod scorer;

pub use crate::domain::model::{RunSummary, ScoredListing};
pub use crate::domain::ports::{ListingRepository, ListingSource};
pub use crate::utils::error::Result;

#[cfg(test)]
pub(crate) mod testing;
