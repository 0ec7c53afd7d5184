use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::{error::GuardError, types::DomainLists};

/// Supplies the suspect/trusted lists for a page.
#[async_trait]
pub trait ListSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self) -> Result<DomainLists, GuardError>;
}

/// Wire shape of a published domain-list document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocument {
    suspect_domains: Option<Vec<String>>,
    trusted_domains: Option<Vec<String>>,
    official_portal: Option<String>,
    #[serde(default)]
    last_updated: Option<i64>,
}

/// Parses and validates a list document. All three keys are required.
pub fn parse_lists(json: &str) -> Result<DomainLists, GuardError> {
    let doc: ListDocument =
        serde_json::from_str(json).map_err(|e| GuardError::Lists(e.to_string()))?;
    let (Some(suspect), Some(trusted), Some(portal)) =
        (doc.suspect_domains, doc.trusted_domains, doc.official_portal)
    else {
        return Err(GuardError::Lists("invalid domain list format".into()));
    };
    if portal.trim().is_empty() {
        return Err(GuardError::Lists("official portal is empty".into()));
    }
    let mut lists = DomainLists::new(suspect, trusted, &portal);
    lists.drop_trusted_from_suspect();
    let updated = doc
        .last_updated
        .and_then(chrono::DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);
    Ok(lists.with_last_updated(updated))
}

pub struct HttpListSource {
    client: Client,
    url: String,
}

impl HttpListSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, GuardError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GuardError::from)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ListSource for HttpListSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self) -> Result<DomainLists, GuardError> {
        let resp = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(GuardError::from)?;
        if !resp.status().is_success() {
            return Err(GuardError::Http(format!("{} returned {}", self.url, resp.status())));
        }
        let body = resp.text().await.map_err(GuardError::from)?;
        parse_lists(&body)
    }
}

pub struct FileListSource {
    path: PathBuf,
}

impl FileListSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ListSource for FileListSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self) -> Result<DomainLists, GuardError> {
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| GuardError::Lists(format!("{}: {}", self.path.display(), e)))?;
        parse_lists(&data)
    }
}

/// Lists from `source`, or `fallback` if it is absent or fails.
pub async fn load_lists_or(source: Option<&dyn ListSource>, fallback: DomainLists) -> DomainLists {
    let Some(source) = source else {
        return fallback;
    };
    match source.fetch().await {
        Ok(lists) => {
            info!(
                "loaded {} suspect / {} trusted domains from {} source",
                lists.suspect.len(),
                lists.trusted.len(),
                source.name()
            );
            lists
        }
        Err(err) => {
            warn!("{} list source failed ({}); using built-in lists", source.name(), err);
            fallback
        }
    }
}
