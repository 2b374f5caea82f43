use crate::config::NotionProperties;
use crate::domain::model::{
    LinkPage, Lifecycle, Page, RecordId, RecordPage, RecordRef, StoredRecord,
};
use crate::domain::ports::ListingRepository;
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

pub const NOTION_VERSION: &str = "2022-06-28";
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<NotionPage>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotionPage {
    id: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

/// Listing store backed by a Notion database.
///
/// Each listing is one page. Archiving uses Notion's own `archived` flag,
/// and archived pages no longer show up in database queries.
pub struct NotionRepository {
    client: Client,
    api_base: String,
    database_id: String,
    page_size: usize,
    properties: NotionProperties,
}

impl NotionRepository {
    pub fn new(
        api_base: &str,
        token: &str,
        database_id: &str,
        page_size: usize,
        properties: NotionProperties,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            TrackerError::InvalidConfigValueError {
                field: "repository.token".to_string(),
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            database_id: database_id.to_string(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            properties,
        })
    }

    async fn query(&self, cursor: Option<&str>, filter: Option<Value>) -> Result<QueryResponse> {
        let mut body = Map::new();
        body.insert("page_size".to_string(), json!(self.page_size));
        if let Some(cursor) = cursor {
            body.insert("start_cursor".to_string(), json!(cursor));
        }
        if let Some(filter) = filter {
            body.insert("filter".to_string(), filter);
        }

        let url = format!("{}/v1/databases/{}/query", self.api_base, self.database_id);
        tracing::debug!(cursor = ?cursor, "querying Notion database");

        let response = self
            .client
            .post(&url)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| read_error(e.to_string()))?;
        let response = check_status(response)
            .await
            .map_err(read_error)?;

        response
            .json::<QueryResponse>()
            .await
            .map_err(|e| read_error(format!("unexpected query response: {}", e)))
    }

    fn link_of(&self, page: &NotionPage) -> Option<String> {
        page.properties
            .get(&self.properties.link)?
            .get("url")?
            .as_str()
            .map(str::to_string)
    }

    fn added_at_of(&self, page: &NotionPage) -> Option<DateTime<Utc>> {
        let start = page
            .properties
            .get(&self.properties.added_at)?
            .get("date")?
            .get("start")?
            .as_str()?;
        parse_notion_date(start)
    }

    fn page_properties(&self, record: &StoredRecord) -> Value {
        let p = &self.properties;
        let mut props = Map::new();
        props.insert(
            p.title.clone(),
            json!({ "title": [{ "text": { "content": record.title } }] }),
        );
        props.insert(p.company.clone(), rich_text(&record.company));
        props.insert(p.location.clone(), rich_text(&record.location));
        props.insert(p.link.clone(), json!({ "url": record.link }));
        props.insert(
            p.source.clone(),
            json!({ "select": { "name": record.source } }),
        );
        props.insert(
            p.added_at.clone(),
            json!({ "date": { "start": record.added_at.to_rfc3339() } }),
        );
        props.insert(p.score.clone(), json!({ "number": record.score }));
        Value::Object(props)
    }
}

fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

/// Notion dates are either full RFC 3339 timestamps or bare `YYYY-MM-DD` days.
fn parse_notion_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

async fn check_status(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("Notion answered {}: {}", status, body))
}

fn read_error(message: String) -> TrackerError {
    TrackerError::RepositoryRead { message }
}

fn write_error(target: &str, message: String) -> TrackerError {
    TrackerError::RepositoryWrite {
        target: target.to_string(),
        message,
    }
}

#[async_trait]
impl ListingRepository for NotionRepository {
    async fn list_links(&self, cursor: Option<&str>) -> Result<LinkPage> {
        let response = self.query(cursor, None).await?;
        let links = response
            .results
            .iter()
            .filter_map(|page| self.link_of(page))
            .collect();

        Ok(Page {
            items: links,
            next_cursor: response.next_cursor,
            has_more: response.has_more,
        })
    }

    async fn list_records_older_than(
        &self,
        cutoff: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<RecordPage> {
        let filter = json!({
            "property": self.properties.added_at,
            "date": { "on_or_before": cutoff.to_rfc3339() }
        });
        let response = self.query(cursor, Some(filter)).await?;

        let mut records = Vec::with_capacity(response.results.len());
        for page in &response.results {
            let Some(added_at) = self.added_at_of(page) else {
                tracing::warn!("⚠️ Notion page {} has no readable added date", page.id);
                continue;
            };
            records.push(RecordRef {
                id: RecordId::new(page.id.clone()),
                link: self.link_of(page).unwrap_or_default(),
                added_at,
                lifecycle: if page.archived {
                    Lifecycle::Archived
                } else {
                    Lifecycle::Active
                },
            });
        }

        Ok(Page {
            items: records,
            next_cursor: response.next_cursor,
            has_more: response.has_more,
        })
    }

    async fn insert(&self, record: &StoredRecord) -> Result<RecordId> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": self.page_properties(record),
        });

        let response = self
            .client
            .post(format!("{}/v1/pages", self.api_base))
            .json(&body)
            .send()
            .await
            .map_err(|e| write_error(&record.link, e.to_string()))?;
        let response = check_status(response)
            .await
            .map_err(|message| write_error(&record.link, message))?;

        let created: CreatedPage = response
            .json()
            .await
            .map_err(|e| write_error(&record.link, format!("unexpected create response: {}", e)))?;
        Ok(RecordId::new(created.id))
    }

    async fn archive(&self, id: &RecordId) -> Result<()> {
        let response = self
            .client
            .patch(format!("{}/v1/pages/{}", self.api_base, id))
            .json(&json!({ "archived": true }))
            .send()
            .await
            .map_err(|e| write_error(id.as_str(), e.to_string()))?;
        check_status(response)
            .await
            .map_err(|message| write_error(id.as_str(), message))?;
        Ok(())
    }
}
