// Adapters layer: concrete listing sources and repositories behind the domain ports.

pub mod http_source;
pub mod json_store;
pub mod notion;

use crate::config::RepositoryConfig;
use crate::domain::model::{LinkPage, RecordId, RecordPage, StoredRecord};
use crate::domain::ports::ListingRepository;
use crate::utils::error::Result;
use crate::utils::validation::validate_required_setting;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use json_store::JsonFileRepository;
use notion::NotionRepository;

/// The repository selected by `[repository] type = ...`.
pub enum ConfiguredRepository {
    JsonFile(JsonFileRepository),
    Notion(NotionRepository),
}

impl ConfiguredRepository {
    pub async fn from_config(config: &RepositoryConfig) -> Result<Self> {
        match config {
            RepositoryConfig::JsonFile { path, page_size } => {
                let repo = JsonFileRepository::open(
                    path,
                    page_size.unwrap_or(json_store::DEFAULT_PAGE_SIZE),
                )
                .await?;
                Ok(Self::JsonFile(repo))
            }
            RepositoryConfig::Notion {
                api_base,
                token,
                database_id,
                page_size,
                properties,
                timeout_seconds,
            } => {
                let token = validate_required_setting("repository.token", token)?;
                let database_id = validate_required_setting("repository.database_id", database_id)?;
                let repo = NotionRepository::new(
                    api_base,
                    token,
                    database_id,
                    page_size.unwrap_or(notion::MAX_PAGE_SIZE),
                    properties.clone(),
                    timeout_seconds.map(Duration::from_secs),
                )?;
                Ok(Self::Notion(repo))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::JsonFile(repo) => format!("json file {}", repo.path().display()),
            Self::Notion(_) => "notion database".to_string(),
        }
    }
}

#[async_trait]
impl ListingRepository for ConfiguredRepository {
    async fn list_links(&self, cursor: Option<&str>) -> Result<LinkPage> {
        match self {
            Self::JsonFile(repo) => repo.list_links(cursor).await,
            Self::Notion(repo) => repo.list_links(cursor).await,
        }
    }

    async fn list_records_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        match self {
            Self::JsonFile(repo) => repo.list_records_older_than(cutoff, cursor).await,
            Self::Notion(repo) => repo.list_records_older_than(cutoff, cursor).await,
        }
    }

    async fn insert(&self, record: &StoredRecord) -> Result<RecordId> {
        match self {
            Self::JsonFile(repo) => repo.insert(record).await,
            Self::Notion(repo) => repo.insert(record).await,
        }
    }

    async fn archive(&self, id: &RecordId) -> Result<()> {
        match self {
            Self::JsonFile(repo) => repo.archive(id).await,
            Self::Notion(repo) => repo.archive(id).await,
        }
    }
}
