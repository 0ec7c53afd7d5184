use anyhow::Result;

use crate::cli::flags::Cli;
use crate::config::{load_config, GuardConfig};

/// Where domain lists come from for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListsOrigin {
    Url(String),
    File(String),
    Builtin,
}

/// Loads the config file and applies command-line overrides.
pub fn resolve_config(cli: &Cli) -> Result<GuardConfig> {
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(lists) = &cli.lists {
        if is_url(lists) {
            cfg.lists.url = Some(lists.clone());
        } else {
            cfg.lists.url = None;
            cfg.lists.path = Some(lists.clone());
        }
    }
    if cli.offline {
        cfg.lookup.enabled = false;
        cfg.report.webhook_url = None;
    }
    cfg.validate()?;
    Ok(cfg)
}

pub fn lists_origin(cfg: &GuardConfig, offline: bool) -> ListsOrigin {
    match (&cfg.lists.url, &cfg.lists.path) {
        (Some(url), _) if !offline => ListsOrigin::Url(url.clone()),
        (_, Some(path)) => ListsOrigin::File(path.clone()),
        _ => ListsOrigin::Builtin,
    }
}

fn is_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
