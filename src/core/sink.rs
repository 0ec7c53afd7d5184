//! Outbound interfaces: warning presentation and detection reporting.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{
    error::GuardError,
    hash::detection_fingerprint,
    types::{DetectionCategory, DetectionResult, ReputationAnalysis, Severity, Warning},
};

/// One surfaced detection, as handed to storage/telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionLog {
    pub fingerprint: String,
    pub url: String,
    pub hostname: String,
    pub message: String,
    pub severity: Severity,
    pub category: DetectionCategory,
    pub timestamp: DateTime<Utc>,
    pub detection: DetectionResult,
    pub reputation: Option<ReputationAnalysis>,
}

impl DetectionLog {
    pub fn new(
        url: &str,
        hostname: &str,
        warning: &Warning,
        detection: DetectionResult,
        reputation: Option<ReputationAnalysis>,
    ) -> Self {
        Self {
            fingerprint: detection_fingerprint(hostname, warning.category),
            url: url.to_string(),
            hostname: hostname.to_string(),
            message: warning.message.clone(),
            severity: warning.severity,
            category: warning.category,
            timestamp: Utc::now(),
            detection,
            reputation,
        }
    }
}

/// An explicit "report this site" submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteReport {
    pub url: String,
    pub hostname: String,
    pub timestamp: DateTime<Utc>,
    pub detection: DetectionResult,
    pub reputation: Option<ReputationAnalysis>,
}

/// Presents warnings to the user. Called at most once per page unless configured otherwise.
pub trait WarningSink: Send + Sync {
    fn on_warning(
        &self,
        warning: &Warning,
        detection: &DetectionResult,
        reputation: Option<&ReputationAnalysis>,
    );
}

/// Persists or forwards detections. Failures are reported to the caller, never panicked on.
#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn on_report(&self, report: &SiteReport) -> Result<(), GuardError>;
    async fn on_log(&self, log: &DetectionLog) -> Result<(), GuardError>;
}

/// Writes everything to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn on_warning(
        &self,
        warning: &Warning,
        detection: &DetectionResult,
        reputation: Option<&ReputationAnalysis>,
    ) {
        let flags: Vec<&str> = detection.raised().iter().map(|c| c.as_str()).collect();
        warn!(
            severity = %warning.severity,
            category = warning.category.as_str(),
            flags = %flags.join(","),
            risk_score = reputation.map(|r| r.risk_score).unwrap_or(0),
            "{}",
            warning.message
        );
    }
}

#[async_trait]
impl ReportSink for TracingSink {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn on_report(&self, report: &SiteReport) -> Result<(), GuardError> {
        info!("site reported: {} ({})", report.hostname, report.url);
        Ok(())
    }

    async fn on_log(&self, log: &DetectionLog) -> Result<(), GuardError> {
        info!(
            "detection {} on {}: {} [{}]",
            log.category.as_str(),
            log.hostname,
            log.message,
            log.severity
        );
        Ok(())
    }
}

/// Keeps everything in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    warnings: Mutex<Vec<Warning>>,
    logs: Mutex<Vec<DetectionLog>>,
    reports: Mutex<Vec<SiteReport>>,
}

impl MemorySink {
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn logs(&self) -> Vec<DetectionLog> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn reports(&self) -> Vec<SiteReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl WarningSink for MemorySink {
    fn on_warning(
        &self,
        warning: &Warning,
        _detection: &DetectionResult,
        _reputation: Option<&ReputationAnalysis>,
    ) {
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(warning.clone());
        }
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn on_report(&self, report: &SiteReport) -> Result<(), GuardError> {
        self.reports
            .lock()
            .map_err(|_| GuardError::Sink("memory sink poisoned".into()))?
            .push(report.clone());
        Ok(())
    }

    async fn on_log(&self, log: &DetectionLog) -> Result<(), GuardError> {
        self.logs
            .lock()
            .map_err(|_| GuardError::Sink("memory sink poisoned".into()))?
            .push(log.clone());
        Ok(())
    }
}
