use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::core::{error::GuardError, similarity::SimilarityMode, types::DEFAULT_OFFICIAL_PORTAL};

pub const DEFAULT_CONFIG_PATH: &str = "config/donation-guard.toml";

/// Per-session detection parameters. Fixed once the orchestrator is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Portal used when the supplied lists do not name one.
    pub official_portal: String,
    pub official_suffix: String,
    pub similarity_threshold: f64,
    pub similarity_mode: SimilarityMode,
    pub scan_interval_ms: u64,
    pub max_warnings_per_page: u32,
    pub reputation_timeout_ms: u64,
    pub min_domain_age_days: i64,
    pub lists: ListsConfig,
    pub lookup: LookupConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListsConfig {
    pub url: Option<String>,
    pub path: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LookupConfig {
    pub enabled: bool,
    pub rdap_base_url: String,
    pub blacklist_url: Option<String>,
    pub hosting_url: Option<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ReportConfig {
    pub db_path: Option<String>,
    pub webhook_url: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            official_portal: DEFAULT_OFFICIAL_PORTAL.to_string(),
            official_suffix: ".gov.jm".to_string(),
            similarity_threshold: 0.85,
            similarity_mode: SimilarityMode::Alphanumeric,
            scan_interval_ms: 5_000,
            max_warnings_per_page: 1,
            reputation_timeout_ms: 5_000,
            min_domain_age_days: 30,
            lists: ListsConfig::default(),
            lookup: LookupConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            timeout_ms: 5_000,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rdap_base_url: "https://rdap.org/domain".to_string(),
            blacklist_url: None,
            hosting_url: None,
            user_agent: "donation-guard/1.0".to_string(),
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<(), GuardError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(GuardError::Config(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            )));
        }
        if self.scan_interval_ms == 0 {
            return Err(GuardError::Config("scan_interval_ms must be > 0".into()));
        }
        if self.max_warnings_per_page == 0 {
            return Err(GuardError::Config("max_warnings_per_page must be > 0".into()));
        }
        if !self.official_suffix.starts_with('.') {
            return Err(GuardError::Config(format!(
                "official_suffix must start with '.', got {}",
                self.official_suffix
            )));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn reputation_timeout(&self) -> Duration {
        Duration::from_millis(self.reputation_timeout_ms)
    }

    pub fn allows_multiple_warnings(&self) -> bool {
        self.max_warnings_per_page > 1
    }
}

pub fn load_config(path: Option<&str>) -> Result<GuardConfig, GuardError> {
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let path = path.map(Path::new).unwrap_or(default_path);

    if !path.exists() {
        tracing::debug!("config {} not found; using defaults", path.display());
        return Ok(GuardConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| GuardError::Config(e.to_string()))?;
    let cfg: GuardConfig =
        toml::from_str(&content).map_err(|e| GuardError::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: GuardConfig = toml::from_str(
            r#"
            similarity_threshold = 0.82
            max_warnings_per_page = 3

            [lists]
            url = "https://lists.example/domain-lists.json"

            [lookup]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.similarity_threshold, 0.82);
        assert_eq!(cfg.scan_interval_ms, 5_000);
        assert!(cfg.allows_multiple_warnings());
        assert_eq!(cfg.lists.timeout_ms, 5_000);
        assert!(!cfg.lookup.enabled);
        assert_eq!(cfg.lookup.rdap_base_url, "https://rdap.org/domain");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let cfg = GuardConfig {
            similarity_threshold: 1.5,
            ..GuardConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(GuardError::Config(_))));
    }

    #[test]
    fn shipped_config_parses() {
        let cfg = load_config(Some(DEFAULT_CONFIG_PATH)).unwrap();
        assert_eq!(cfg.official_portal, "supportjamaica.gov.jm");
        assert_eq!(cfg.lists.path.as_deref(), Some("demos/domain-lists.json"));
        assert_eq!(cfg.report.db_path.as_deref(), Some("data/donation-guard.db"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config(Some("does/not/exist.toml")).unwrap();
        assert_eq!(cfg, GuardConfig::default());
    }
}
