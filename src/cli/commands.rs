use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::config::{lists_origin, resolve_config, ListsOrigin};
use crate::cli::flags::{Cli, Command};
use crate::config::GuardConfig;
use crate::core::{
    alert::WebhookSink,
    page::PageSnapshot,
    sink::{DetectionLog, ReportSink, SiteReport, TracingSink},
    store::DetectionStore,
    types::DomainLists,
};
use crate::detectors::domain::{DomainClassifier, DomainStatus};
use crate::pipeline::orchestrator::{
    DetectionOrchestrator, OrchestratorState, PassReport, ScanTrigger, TriggerHandle,
};
use crate::sources::{
    lists::{load_lists_or, FileListSource, HttpListSource, ListSource},
    lookup::{HttpLookup, ReputationLookup, StaticLookup},
};

pub async fn run(cli: Cli) -> Result<()> {
    let cfg = resolve_config(&cli)?;
    let offline = cli.offline;

    match cli.command {
        Command::Scan { url, html } => run_scan(&cfg, offline, &url, html.as_deref()).await,
        Command::Watch { url, html } => run_watch(&cfg, offline, &url, &html).await,
        Command::Check { hostname } => run_check(&cfg, offline, &hostname).await,
        Command::Report { url, html } => run_report(&cfg, offline, &url, html.as_deref()).await,
        Command::History { host } => run_history(&cfg, host.as_deref()),
    }
}

async fn run_scan(cfg: &GuardConfig, offline: bool, url: &str, html: Option<&Path>) -> Result<()> {
    let page = load_page(url, html)?;
    let orchestrator = build_orchestrator(cfg, offline, page).await?;
    let report = orchestrator
        .scan(ScanTrigger::Initial)
        .await?
        .ok_or_else(|| anyhow!("scan pass did not run"))?;
    print_json(&ScanSummary::new(&report, &orchestrator))
}

async fn run_watch(cfg: &GuardConfig, offline: bool, url: &str, html: &Path) -> Result<()> {
    let page = load_page(url, Some(html))?;
    let mut last_html = std::fs::read_to_string(html)?;
    let orchestrator = Arc::new(build_orchestrator(cfg, offline, page).await?);
    let (handle, rx) = TriggerHandle::channel();
    let scanner = tokio::spawn(Arc::clone(&orchestrator).run(rx));

    info!(
        "watching {} every {} ms; Ctrl-C to stop",
        html.display(),
        cfg.scan_interval_ms
    );
    let mut ticker = tokio::time::interval(cfg.scan_interval());
    ticker.tick().await;
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("interrupt received; stopping");
                break;
            }
            _ = ticker.tick() => {
                let current = match std::fs::read_to_string(html) {
                    Ok(content) => content,
                    Err(err) => {
                        warn!("could not re-read {}: {}", html.display(), err);
                        continue;
                    }
                };
                if current == last_html {
                    continue;
                }
                match PageSnapshot::parse(url, &current) {
                    Ok(next) => {
                        handle.trigger(ScanTrigger::Mutation(next));
                    }
                    Err(err) => warn!("could not parse updated page: {}", err),
                }
                last_html = current;
            }
        }
    }
    drop(handle);
    scanner.await?;
    let detection = orchestrator.detection();
    print_json(&WatchSummary {
        hostname: orchestrator.hostname(),
        state: orchestrator.state(),
        flagged: detection.any(),
        detection: detection.raised().iter().map(|c| c.as_str()).collect(),
    })
}

async fn run_check(cfg: &GuardConfig, offline: bool, hostname: &str) -> Result<()> {
    let lists = load_lists(cfg, offline).await;
    let classifier = DomainClassifier::new(lists, cfg)?;
    let host = hostname.trim().to_ascii_lowercase();
    let status = classifier.status(&host);
    print_json(&CheckSummary {
        similarity: classifier.similarity_to_official(&host),
        official_portal: classifier.official_portal().to_string(),
        message: status_message(status, classifier.official_portal()),
        hostname: host,
        status,
    })
}

async fn run_report(cfg: &GuardConfig, offline: bool, url: &str, html: Option<&Path>) -> Result<()> {
    let page = load_page(url, html)?;
    let orchestrator = build_orchestrator(cfg, offline, page).await?;
    if html.is_some() {
        orchestrator.scan(ScanTrigger::Initial).await?;
    }
    orchestrator
        .report_site()
        .await
        .context("report could not be delivered; please try again")?;
    println!("Reported {} as suspicious.", orchestrator.hostname());
    Ok(())
}

fn run_history(cfg: &GuardConfig, host: Option<&str>) -> Result<()> {
    print_json(&load_history(cfg, host)?)
}

fn load_history(cfg: &GuardConfig, host: Option<&str>) -> Result<HistorySummary> {
    let db_path = cfg
        .report
        .db_path
        .as_deref()
        .ok_or_else(|| anyhow!("no report.db_path configured; nothing is stored"))?;
    let store = DetectionStore::open(Path::new(db_path))
        .with_context(|| format!("opening detection store {db_path}"))?;
    let detections = match host {
        Some(host) => store.logs_for_host(&host.trim().to_ascii_lowercase())?,
        None => Vec::new(),
    };
    Ok(HistorySummary {
        detections,
        reports: store.reports()?,
    })
}

async fn build_orchestrator(
    cfg: &GuardConfig,
    offline: bool,
    page: PageSnapshot,
) -> Result<DetectionOrchestrator> {
    let lookup = build_lookup(cfg, offline)?;
    let sinks = build_report_sinks(cfg)?;
    let orchestrator =
        DetectionOrchestrator::new(cfg.clone(), page, lookup, Arc::new(TracingSink), sinks);
    orchestrator.install_lists(load_lists(cfg, offline).await)?;
    Ok(orchestrator)
}

async fn load_lists(cfg: &GuardConfig, offline: bool) -> DomainLists {
    let fallback = DomainLists::builtin().with_official_portal(&cfg.official_portal);
    let source: Option<Box<dyn ListSource>> = match lists_origin(cfg, offline) {
        ListsOrigin::Url(url) => {
            match HttpListSource::new(&url, std::time::Duration::from_millis(cfg.lists.timeout_ms)) {
                Ok(source) => Some(Box::new(source) as Box<dyn ListSource>),
                Err(err) => {
                    warn!("list source {} unusable: {}", url, err);
                    None
                }
            }
        }
        ListsOrigin::File(path) => Some(Box::new(FileListSource::new(path)) as Box<dyn ListSource>),
        ListsOrigin::Builtin => None,
    };
    load_lists_or(source.as_deref(), fallback).await
}

fn build_lookup(cfg: &GuardConfig, offline: bool) -> Result<Arc<dyn ReputationLookup>> {
    if offline || !cfg.lookup.enabled {
        return Ok(Arc::new(StaticLookup::new(None, Vec::new(), None)));
    }
    Ok(Arc::new(HttpLookup::new(&cfg.lookup, cfg.reputation_timeout())?))
}

fn build_report_sinks(cfg: &GuardConfig) -> Result<Vec<Arc<dyn ReportSink>>> {
    let mut sinks: Vec<Arc<dyn ReportSink>> = vec![Arc::new(TracingSink) as Arc<dyn ReportSink>];
    if let Some(db_path) = &cfg.report.db_path {
        sinks.push(Arc::new(DetectionStore::open(Path::new(db_path))?));
    }
    if let Some(webhook) = &cfg.report.webhook_url {
        let client = reqwest::Client::builder()
            .user_agent(cfg.lookup.user_agent.clone())
            .timeout(cfg.reputation_timeout())
            .build()?;
        sinks.push(Arc::new(WebhookSink::new(client, webhook)));
    }
    Ok(sinks)
}

fn load_page(url: &str, html: Option<&Path>) -> Result<PageSnapshot> {
    match html {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading page {}", path.display()))?;
            Ok(PageSnapshot::parse(url, &content)?)
        }
        None => Ok(PageSnapshot::new(url)?),
    }
}

fn status_message(status: DomainStatus, portal: &str) -> String {
    match status {
        DomainStatus::Suspicious => "Known suspicious domain. Do not donate here.".to_string(),
        DomainStatus::DonationLookalike => {
            format!("Possible lookalike of the official portal. Use {portal} instead.")
        }
        DomainStatus::Trusted => "Verified official or partner domain.".to_string(),
        DomainStatus::Unknown => format!("Not on any list. Official donations: {portal}"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ScanSummary<'a> {
    hostname: &'a str,
    state: OrchestratorState,
    warning: Option<&'a crate::core::types::Warning>,
    flagged: bool,
    flags: Vec<&'static str>,
    forms: &'a [crate::core::types::FormAnalysis],
    reputation: Option<&'a crate::core::types::ReputationAnalysis>,
}

impl<'a> ScanSummary<'a> {
    fn new(report: &'a PassReport, orchestrator: &DetectionOrchestrator) -> Self {
        Self {
            hostname: &report.hostname,
            state: orchestrator.state(),
            warning: report.warning.as_ref(),
            flagged: report.detection.any(),
            flags: report.detection.raised().iter().map(|c| c.as_str()).collect(),
            forms: &report.forms,
            reputation: report.reputation.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WatchSummary {
    hostname: String,
    state: OrchestratorState,
    flagged: bool,
    detection: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct HistorySummary {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    detections: Vec<DetectionLog>,
    reports: Vec<SiteReport>,
}

#[derive(Debug, Serialize)]
struct CheckSummary {
    hostname: String,
    status: DomainStatus,
    similarity: f64,
    official_portal: String,
    message: String,
}
