//! The individual checks of a scan pass. Each reads an immutable [`ScanContext`] and
//! returns a [`ScanOutcome`]; the orchestrator folds them in a fixed order.

use tracing::debug;

use crate::config::GuardConfig;
use crate::core::{
    page::PageSnapshot,
    types::{
        DetectionCategory, DetectionResult, DomainLists, FormAnalysis, ReputationAnalysis,
        RiskLevel, Severity, Warning,
    },
};
use crate::detectors::{domain::DomainVerdict, DetectorSet};

#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub lists: &'a DomainLists,
    pub config: &'a GuardConfig,
    pub hostname: &'a str,
    pub url: &'a str,
    pub page: &'a PageSnapshot,
}

impl<'a> ScanContext<'a> {
    pub fn new(lists: &'a DomainLists, config: &'a GuardConfig, page: &'a PageSnapshot) -> Self {
        Self {
            lists,
            config,
            hostname: &page.hostname,
            url: &page.url,
            page,
        }
    }

    fn portal(&self) -> &str {
        &self.lists.official_portal
    }
}

/// What a single check (or a whole pass) concluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    pub flags: DetectionResult,
    pub warning: Option<Warning>,
    pub forms: Vec<FormAnalysis>,
    pub reputation: Option<ReputationAnalysis>,
}

impl ScanOutcome {
    fn warn(category: DetectionCategory, severity: Severity, message: String) -> Self {
        let mut flags = DetectionResult::default();
        flags.raise(category);
        Self {
            flags,
            warning: Some(Warning {
                message,
                severity,
                category,
            }),
            ..Self::default()
        }
    }

    pub fn concluded(&self) -> bool {
        self.warning.is_some()
    }

    /// Accumulates `next` into `self`; the first warning is kept.
    pub fn absorb(&mut self, next: ScanOutcome) {
        self.flags.merge(&next.flags);
        if self.warning.is_none() {
            self.warning = next.warning;
        }
        if !next.forms.is_empty() {
            self.forms = next.forms;
        }
        if next.reputation.is_some() {
            self.reputation = next.reputation;
        }
    }
}

pub fn check_suspect_domain(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    if !detectors.classifier.is_known_suspect(ctx.hostname) {
        return ScanOutcome::default();
    }
    ScanOutcome::warn(
        DetectionCategory::SuspectDomain,
        Severity::High,
        format!(
            "This domain has been identified as suspicious. Do NOT enter payment or personal info. Use {}",
            ctx.portal()
        ),
    )
}

pub fn check_similar_domain(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    match detectors.classifier.classify(ctx.hostname, false) {
        Some(DomainVerdict::SimilarToOfficial { similarity }) => {
            debug!("{} similarity to portal {:.3}", ctx.hostname, similarity);
            ScanOutcome::warn(
                DetectionCategory::SimilarDomain,
                Severity::High,
                format!(
                    "This domain ({}) looks very similar to the official portal ({}). Verify the URL carefully.",
                    ctx.hostname,
                    ctx.portal()
                ),
            )
        }
        _ => ScanOutcome::default(),
    }
}

pub fn check_unofficial_donation(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    let has_donation_content = detectors.content.has_donation_content(&ctx.page.body_text);
    if !detectors
        .classifier
        .is_unofficial_donation_site(ctx.hostname, has_donation_content)
    {
        return ScanOutcome::default();
    }
    ScanOutcome::warn(
        DetectionCategory::UnofficialDonation,
        Severity::High,
        format!(
            "This site looks like a donation collection page but does NOT end with {}. The official donation portal is {}. Be cautious.",
            ctx.config.official_suffix,
            ctx.portal()
        ),
    )
}

pub async fn check_reputation(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    let analysis = detectors.reputation.analyze(ctx.page).await;
    let flags = detectors.reputation.detection_flags(&analysis);
    let warning = analysis.severity().map(|severity| Warning {
        message: format!(
            "This site has a poor reputation (risk score {}): {}. Donate only through {}.",
            analysis.risk_score,
            analysis.warnings.join("; "),
            ctx.portal()
        ),
        severity,
        category: DetectionCategory::PoorReputation,
    });
    ScanOutcome {
        flags,
        warning,
        forms: Vec::new(),
        reputation: Some(analysis),
    }
}

pub fn check_forms(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    let trusted = detectors.classifier.is_trusted(ctx.hostname);
    let forms = detectors.forms.analyze_page(ctx.page, trusted);
    let worst = forms
        .iter()
        .filter(|f| f.risk_level.warning_severity().is_some())
        .max_by_key(|f| (f.risk_level, std::cmp::Reverse(f.index)));

    let mut outcome = match worst {
        Some(form) => {
            let severity = form
                .risk_level
                .warning_severity()
                .unwrap_or(Severity::Medium);
            ScanOutcome::warn(
                DetectionCategory::SuspiciousForm,
                severity,
                format!(
                    "This donation form looks risky: {}. Verify the recipient before entering payment info. Official portal: {}",
                    form.reasons.join("; "),
                    ctx.portal()
                ),
            )
        }
        None => ScanOutcome::default(),
    };
    debug!(
        "{} form(s) analysed on {}, {} above low risk",
        forms.len(),
        ctx.hostname,
        forms.iter().filter(|f| f.risk_level > RiskLevel::Low).count()
    );
    outcome.forms = forms;
    outcome
}

pub fn check_scam_content(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    if detectors.classifier.is_trusted(ctx.hostname)
        || !detectors.content.has_urgency_language(&ctx.page.body_text)
    {
        return ScanOutcome::default();
    }
    ScanOutcome::warn(
        DetectionCategory::ScamContent,
        Severity::Medium,
        format!(
            "This page contains urgent-sounding donation requests. Scammers use urgency to trick donors. Confirm via official channels: {}",
            ctx.portal()
        ),
    )
}
