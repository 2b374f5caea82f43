use crate::config::SourceConfig;
use crate::domain::model::Listing;
use crate::domain::ports::ListingSource;
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Reads listings from a JSON search endpoint, one request per (term, location).
///
/// The endpoint must answer with an array of objects, or an object holding
/// that array under `results`. Feed keys can be renamed onto
/// `title`/`company`/`location`/`link` with `field_mapping`.
pub struct HttpListingSource {
    client: Client,
    config: SourceConfig,
}

impl HttpListingSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    fn fetch_error(&self, term: &str, location: &str, message: impl Into<String>) -> TrackerError {
        TrackerError::SourceFetch {
            term: term.to_string(),
            location: location.to_string(),
            message: message.into(),
        }
    }

    fn parse_item(&self, item: Map<String, Value>) -> Listing {
        let mut fields: HashMap<String, Value> = HashMap::with_capacity(item.len());
        let mut mapped = Vec::new();
        for (key, value) in item {
            match self
                .config
                .field_mapping
                .as_ref()
                .and_then(|mapping| mapping.get(&key))
            {
                Some(target) => mapped.push((target.clone(), value)),
                None => {
                    fields.insert(key, value);
                }
            }
        }
        // A mapped key overrides a literal key of the same name.
        fields.extend(mapped);

        let text = |name: &str| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let link = text("link").unwrap_or_default();
        let link = match &self.config.link_prefix {
            Some(prefix) if !link.is_empty() && !link.starts_with("http") => {
                format!("{}{}", prefix.trim_end_matches('/'), ensure_leading_slash(&link))
            }
            _ => link,
        };

        Listing::new(
            text("title").unwrap_or_default(),
            text("company"),
            text("location").unwrap_or_default(),
            link,
            self.config.source_name.clone(),
        )
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    fn name(&self) -> &str {
        &self.config.source_name
    }

    async fn fetch(&self, term: &str, location: &str) -> Result<Vec<Listing>> {
        let mut request = self.client.get(&self.config.endpoint).query(&[
            (self.config.term_param.as_str(), term),
            (self.config.location_param.as_str(), location),
        ]);

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        tracing::debug!("Requesting {} for '{}' @ '{}'", self.config.endpoint, term, location);
        let response = request
            .send()
            .await
            .map_err(|e| self.fetch_error(term, location, e.to_string()))?;
        tracing::debug!("Feed response status: {}", response.status());

        if !response.status().is_success() {
            return Err(self.fetch_error(
                term,
                location,
                format!("feed answered {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.fetch_error(term, location, format!("invalid JSON: {}", e)))?;

        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("results") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(self.fetch_error(term, location, "object without a results array"))
                }
            },
            _ => return Err(self.fetch_error(term, location, "unexpected JSON shape")),
        };

        let listings: Vec<Listing> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(obj) => Some(self.parse_item(obj)),
                other => {
                    tracing::debug!("Ignoring non-object feed entry: {}", other);
                    None
                }
            })
            .collect();

        Ok(listings)
    }
}
