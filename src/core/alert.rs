use async_trait::async_trait;
use reqwest::Client;

use crate::core::error::GuardError;
use crate::core::sink::{DetectionLog, ReportSink, SiteReport};

/// Posts detections and site reports to a Slack-compatible webhook.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    async fn post(&self, text: String) -> Result<(), GuardError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(GuardError::from)?;
        if !resp.status().is_success() {
            return Err(GuardError::Http(format!(
                "webhook returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn on_report(&self, report: &SiteReport) -> Result<(), GuardError> {
        self.post(format_report_text(report)).await
    }

    async fn on_log(&self, log: &DetectionLog) -> Result<(), GuardError> {
        self.post(format_log_text(log)).await
    }
}

fn format_log_text(log: &DetectionLog) -> String {
    let mut lines = vec![format!(
        "Donation guard detection | {} | {} | severity={}",
        log.hostname,
        log.category.as_str(),
        log.severity
    )];
    lines.push(format!("  {}", log.message));
    lines.push(format!("  url: {}", log.url));
    if let Some(rep) = &log.reputation {
        lines.push(format!("  risk score: {}", rep.risk_score));
        for w in &rep.warnings {
            lines.push(format!("  - {}", w));
        }
    }
    lines.join("\n")
}

fn format_report_text(report: &SiteReport) -> String {
    let flags: Vec<&str> = report
        .detection
        .raised()
        .iter()
        .map(|c| c.as_str())
        .collect();
    format!(
        "Suspicious donation site reported: {} ({})\n  flags: {}",
        report.hostname,
        report.url,
        if flags.is_empty() {
            "none".to_string()
        } else {
            flags.join(",")
        }
    )
}
