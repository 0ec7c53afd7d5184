use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tracing::{debug, warn};

use crate::core::{
    error::GuardError,
    page::PageSnapshot,
    types::{DetectionCategory, DetectionResult, ReputationAnalysis},
};
use crate::detectors::domain::DomainClassifier;
use crate::sources::lookup::ReputationLookup;

const YOUNG_DOMAIN_SCORE: u32 = 30;
const INVALID_SSL_SCORE: u32 = 20;
const BLACKLISTED_SCORE: u32 = 40;
const SUSPICIOUS_HOSTING_SCORE: u32 = 15;
const HYPHEN_SCORE: u32 = 10;
const DIGIT_RUN_SCORE: u32 = 10;
const SUSPICIOUS_TLD_SCORE: u32 = 20;
const PUNYCODE_SCORE: u32 = 15;

const SUSPICIOUS_HOSTING_KEYWORDS: &[&str] = &[
    "offshore",
    "bulletproof",
    "anonymous",
    "freehost",
    "free hosting",
    "000webhost",
    "cheap",
    "privacy",
];
const SUSPICIOUS_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf", ".xyz", ".top", ".club"];
const ALLOWED_DIGIT_RUNS: &[&str] = &["24", "360", "7"];

/// Score contribution and warnings from the hostname's spelling alone.
pub fn lexical_risk(hostname: &str) -> (u32, Vec<String>) {
    let mut score = 0;
    let mut warnings = Vec::new();

    let hyphens = hostname.matches('-').count();
    if hyphens > 2 {
        score += HYPHEN_SCORE;
        warnings.push(format!("Domain contains {hyphens} hyphens"));
    }

    let has_odd_digits = hostname
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() >= 2)
        .any(|run| !ALLOWED_DIGIT_RUNS.contains(&run));
    if has_odd_digits {
        score += DIGIT_RUN_SCORE;
        warnings.push("Domain contains unusual number sequences".to_string());
    }

    if let Some(tld) = SUSPICIOUS_TLDS.iter().find(|tld| hostname.ends_with(*tld)) {
        score += SUSPICIOUS_TLD_SCORE;
        warnings.push(format!("Domain uses high-abuse TLD {tld}"));
    }

    if hostname.split('.').any(|label| label.starts_with("xn--")) {
        score += PUNYCODE_SCORE;
        warnings.push("Domain uses punycode (possible look-alike characters)".to_string());
    }

    (score, warnings)
}

pub fn is_suspicious_hosting(provider: &str) -> bool {
    let lowered = provider.to_lowercase();
    SUSPICIOUS_HOSTING_KEYWORDS
        .iter()
        .any(|kw| lowered.contains(kw))
}

/// Combines external and local reputation signals into one additive score.
///
/// Results are cached per hostname for the lifetime of the aggregator; a cached host
/// never triggers another lookup.
pub struct ReputationAggregator {
    lookup: Arc<dyn ReputationLookup>,
    classifier: Arc<DomainClassifier>,
    timeout: Duration,
    min_domain_age_days: i64,
    cache: Mutex<HashMap<String, ReputationAnalysis>>,
}

impl ReputationAggregator {
    pub fn new(
        lookup: Arc<dyn ReputationLookup>,
        classifier: Arc<DomainClassifier>,
        timeout: Duration,
        min_domain_age_days: i64,
    ) -> Self {
        Self {
            lookup,
            classifier,
            timeout,
            min_domain_age_days,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self, hostname: &str) -> Option<ReputationAnalysis> {
        let cache = self.cache.lock().ok()?;
        cache.get(hostname).cloned()
    }

    pub async fn analyze(&self, page: &PageSnapshot) -> ReputationAnalysis {
        let hostname = page.hostname.as_str();
        if self.classifier.is_trusted(hostname) {
            debug!("{} is trusted; skipping reputation lookups", hostname);
            return ReputationAnalysis::trusted();
        }
        if let Some(hit) = self.cached(hostname) {
            return hit;
        }

        let (age, blacklists, hosting) = tokio::join!(
            self.bounded("domain age", hostname, self.lookup.domain_age_days(hostname)),
            self.bounded("blacklist", hostname, self.lookup.blacklists(hostname)),
            self.bounded("hosting", hostname, self.lookup.hosting_provider(hostname)),
        );

        let mut analysis = ReputationAnalysis {
            domain_age: age.flatten(),
            ssl_valid: page.is_secure() && !page.has_mixed_content(),
            blacklist_status: blacklists.unwrap_or_default(),
            hosting_provider: hosting.flatten(),
            risk_score: 0,
            warnings: Vec::new(),
        };

        if let Some(days) = analysis.domain_age {
            if days < self.min_domain_age_days {
                analysis.risk_score += YOUNG_DOMAIN_SCORE;
                analysis
                    .warnings
                    .push(format!("Domain was registered only {days} days ago"));
            }
        }
        if !analysis.ssl_valid {
            analysis.risk_score += INVALID_SSL_SCORE;
            analysis
                .warnings
                .push("Connection is not fully secure (no HTTPS or mixed content)".to_string());
        }
        if !analysis.blacklist_status.is_empty() {
            analysis.risk_score += BLACKLISTED_SCORE;
            analysis.warnings.push(format!(
                "Domain appears on blacklists: {}",
                analysis.blacklist_status.join(", ")
            ));
        }
        if let Some(provider) = analysis.hosting_provider.as_deref() {
            if is_suspicious_hosting(provider) {
                analysis.risk_score += SUSPICIOUS_HOSTING_SCORE;
                analysis
                    .warnings
                    .push(format!("Site is hosted with a high-risk provider ({provider})"));
            }
        }
        let (lexical_score, lexical_warnings) = lexical_risk(hostname);
        analysis.risk_score += lexical_score;
        analysis.warnings.extend(lexical_warnings);

        debug!(
            "reputation for {}: score={} warnings={}",
            hostname,
            analysis.risk_score,
            analysis.warnings.len()
        );

        match self.cache.lock() {
            Ok(mut cache) => cache
                .entry(hostname.to_string())
                .or_insert(analysis)
                .clone(),
            Err(_) => analysis,
        }
    }

    /// Flags implied by an analysis; `poor_reputation` follows the warning threshold.
    pub fn detection_flags(&self, analysis: &ReputationAnalysis) -> DetectionResult {
        let mut flags = DetectionResult::default();
        if analysis
            .domain_age
            .is_some_and(|days| days < self.min_domain_age_days)
        {
            flags.raise(DetectionCategory::NewDomain);
        }
        if analysis
            .hosting_provider
            .as_deref()
            .is_some_and(is_suspicious_hosting)
        {
            flags.raise(DetectionCategory::SuspiciousHosting);
        }
        if analysis.severity().is_some() {
            flags.raise(DetectionCategory::PoorReputation);
        }
        flags
    }

    async fn bounded<T, F>(&self, what: &str, hostname: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, GuardError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!("{} lookup for {} failed: {}", what, hostname, err);
                None
            }
            Err(_) => {
                warn!("{} lookup for {} timed out after {:?}", what, hostname, self.timeout);
                None
            }
        }
    }
}
