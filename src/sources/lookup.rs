use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::config::LookupConfig;
use crate::core::error::GuardError;

/// External reputation facts for a hostname. Each call is independent and may fail.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    async fn domain_age_days(&self, hostname: &str) -> Result<Option<i64>, GuardError>;
    async fn blacklists(&self, hostname: &str) -> Result<Vec<String>, GuardError>;
    async fn hosting_provider(&self, hostname: &str) -> Result<Option<String>, GuardError>;
}

/// RDAP for registration age plus optional JSON endpoints for blacklist and hosting data.
///
/// Endpoint templates substitute `{domain}`.
pub struct HttpLookup {
    client: Client,
    rdap_base_url: String,
    blacklist_url: Option<String>,
    hosting_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct BlacklistResponse {
    #[serde(default)]
    lists: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct HostingResponse {
    #[serde(default)]
    provider: Option<String>,
}

impl HttpLookup {
    pub fn new(config: &LookupConfig, timeout: Duration) -> Result<Self, GuardError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(4))
            .build()
            .map_err(GuardError::from)?;
        Ok(Self {
            client,
            rdap_base_url: config.rdap_base_url.trim_end_matches('/').to_string(),
            blacklist_url: config.blacklist_url.clone(),
            hosting_url: config.hosting_url.clone(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de> + Default>(
        &self,
        url: &str,
    ) -> Result<Option<T>, GuardError> {
        let resp = self.client.get(url).send().await.map_err(GuardError::from)?;
        if !resp.status().is_success() {
            tracing::debug!("lookup {} returned {}", url, resp.status());
            return Ok(None);
        }
        let parsed = resp.json::<T>().await.map_err(GuardError::from)?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl ReputationLookup for HttpLookup {
    async fn domain_age_days(&self, hostname: &str) -> Result<Option<i64>, GuardError> {
        let url = format!("{}/{}", self.rdap_base_url, hostname);
        let Some(json) = self.get_json::<serde_json::Value>(&url).await? else {
            return Ok(None);
        };
        Ok(registration_age_days(&json))
    }

    async fn blacklists(&self, hostname: &str) -> Result<Vec<String>, GuardError> {
        let Some(template) = &self.blacklist_url else {
            return Ok(Vec::new());
        };
        let url = template.replace("{domain}", hostname);
        Ok(self
            .get_json::<BlacklistResponse>(&url)
            .await?
            .unwrap_or_default()
            .lists)
    }

    async fn hosting_provider(&self, hostname: &str) -> Result<Option<String>, GuardError> {
        let Some(template) = &self.hosting_url else {
            return Ok(None);
        };
        let url = template.replace("{domain}", hostname);
        Ok(self
            .get_json::<HostingResponse>(&url)
            .await?
            .and_then(|r| r.provider)
            .filter(|p| !p.trim().is_empty()))
    }
}

/// Days since the RDAP `registration` event, if present.
pub fn registration_age_days(rdap: &serde_json::Value) -> Option<i64> {
    let events = rdap.get("events")?.as_array()?;
    events
        .iter()
        .filter(|ev| ev.get("eventAction").and_then(|a| a.as_str()) == Some("registration"))
        .filter_map(|ev| ev.get("eventDate").and_then(|d| d.as_str()))
        .filter_map(|date| chrono::DateTime::parse_from_rfc3339(date).ok())
        .map(|dt| (Utc::now() - dt.with_timezone(&Utc)).num_days())
        .next()
}

/// Fixed answers, for offline runs and tests. Counts how often it was asked.
#[derive(Debug, Default)]
pub struct StaticLookup {
    pub domain_age: Option<i64>,
    pub blacklists: Vec<String>,
    pub hosting_provider: Option<String>,
    pub delay: Option<Duration>,
    pub fail: bool,
    calls: AtomicUsize,
}

impl StaticLookup {
    pub fn new(domain_age: Option<i64>, blacklists: Vec<String>, hosting_provider: Option<&str>) -> Self {
        Self {
            domain_age,
            blacklists,
            hosting_provider: hosting_provider.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer<T: Clone>(&self, value: &T) -> Result<T, GuardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GuardError::Network("lookup unavailable".into()));
        }
        Ok(value.clone())
    }
}

#[async_trait]
impl ReputationLookup for StaticLookup {
    async fn domain_age_days(&self, _hostname: &str) -> Result<Option<i64>, GuardError> {
        self.answer(&self.domain_age).await
    }

    async fn blacklists(&self, _hostname: &str) -> Result<Vec<String>, GuardError> {
        self.answer(&self.blacklists).await
    }

    async fn hosting_provider(&self, _hostname: &str) -> Result<Option<String>, GuardError> {
        self.answer(&self.hosting_provider).await
    }
}
