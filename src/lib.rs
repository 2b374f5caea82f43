pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{
    http_source::HttpListingSource, json_store::JsonFileRepository, notion::NotionRepository,
};
pub use crate::config::{TrackerConfig, Worklist};
pub use crate::core::{
    orchestrator::Orchestrator, retention::RetentionManager, scorer::RelevanceScorer,
};
pub use crate::domain::model::{Listing, RunSummary, ScoredListing, SkippedItem, StoredRecord};
pub use crate::domain::ports::{ListingRepository, ListingSource};
pub use crate::utils::error::{Result, TrackerError};
