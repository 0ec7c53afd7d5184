use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OFFICIAL_PORTAL: &str = "supportjamaica.gov.jm";

const DEFAULT_SUSPECT_DOMAINS: &[&str] = &[
    "jamaicahurricanehelp.net",
    "jamaicahurricanehelp.org",
    "jamaica-hurricane-help.com",
    "melissareliefjamaica.net",
    "melissareliefjamaica.com",
    "melissareliefjamaica.org",
    "supportjamaicagovjm.com",
    "supportjamaicagovjm.net",
    "supportjamaica.gov.jm",
    "hurricanemelissareliefconcert.com",
    "aidjamaica.com",
    "melissarelief.net",
    "jamaicahelps.org",
    "jamaica-relief.com",
    "jamaicaaid.com",
    "helpjamaicatoday.org",
    "helpmelissa.com",
    "donatetojamaica.org",
    "helpjamaicatoday.com",
    "jamaicareliefministries.org",
    "melissahelp.org",
    "melissafund.org",
    "melissadonation.org",
    "onelovereliefjamaica.org",
    "onelovereliefjamaica.com",
    "hurricanemelissajamaica.org",
];

const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "opm.gov.jm",
    "supportjamaica.gov.jm",
    "mof.gov.jm",
    "jamcovid19.moh.gov.jm",
    "jis.gov.jm",
    "psoj.org",
    "jcdt.org.jm",
];

/// Lower-cases and trims a hostname; empty entries are rejected.
pub fn normalize_host(raw: &str) -> Option<String> {
    let host = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Suspect/trusted hostname sets plus the official donation portal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainLists {
    pub suspect: BTreeSet<String>,
    pub trusted: BTreeSet<String>,
    pub official_portal: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl DomainLists {
    pub fn new<S, T>(suspect: S, trusted: T, official_portal: &str) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let official_portal =
            normalize_host(official_portal).unwrap_or_else(|| DEFAULT_OFFICIAL_PORTAL.to_string());
        Self {
            suspect: suspect
                .into_iter()
                .filter_map(|h| normalize_host(h.as_ref()))
                .collect(),
            trusted: trusted
                .into_iter()
                .filter_map(|h| normalize_host(h.as_ref()))
                .collect(),
            official_portal,
            last_updated: None,
        }
    }

    /// Lists shipped with the binary, used whenever supply fails.
    ///
    /// The upstream suspect feed has carried the official portal itself; entries that are
    /// also trusted are dropped here so the portal can never be flagged by the defaults.
    pub fn builtin() -> Self {
        let mut lists = Self::new(
            DEFAULT_SUSPECT_DOMAINS.iter(),
            DEFAULT_TRUSTED_DOMAINS.iter(),
            DEFAULT_OFFICIAL_PORTAL,
        );
        lists.drop_trusted_from_suspect();
        lists
    }

    /// Replaces the portal; the new portal is also trusted and never suspect.
    pub fn with_official_portal(mut self, portal: &str) -> Self {
        if let Some(portal) = normalize_host(portal) {
            self.trusted.insert(portal.clone());
            self.official_portal = portal;
            self.drop_trusted_from_suspect();
        }
        self
    }

    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = Some(at);
        self
    }

    pub fn drop_trusted_from_suspect(&mut self) {
        let trusted = &self.trusted;
        let portal = &self.official_portal;
        self.suspect.retain(|h| !trusted.contains(h) && h != portal);
    }

    pub fn is_suspect(&self, hostname: &str) -> bool {
        self.suspect.contains(hostname)
    }

    pub fn is_listed_trusted(&self, hostname: &str) -> bool {
        self.trusted.contains(hostname)
    }
}

impl Default for DomainLists {
    fn default() -> Self {
        Self::builtin()
    }
}

/// User-facing severity of a warning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

/// Ordinal risk of a single form; only ever raised while a form is analysed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn raise_to(&mut self, level: RiskLevel) {
        if level > *self {
            *self = level;
        }
    }

    /// Forms at `Low` or below are recorded but never surfaced.
    pub fn warning_severity(self) -> Option<Severity> {
        match self {
            RiskLevel::High => Some(Severity::High),
            RiskLevel::Medium => Some(Severity::Medium),
            RiskLevel::Low | RiskLevel::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectionCategory {
    SuspectDomain,
    SimilarDomain,
    UnofficialDonation,
    SuspiciousForm,
    ScamContent,
    PoorReputation,
    NewDomain,
    SuspiciousHosting,
}

impl DetectionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionCategory::SuspectDomain => "suspect_domain",
            DetectionCategory::SimilarDomain => "similar_domain",
            DetectionCategory::UnofficialDonation => "unofficial_donation",
            DetectionCategory::SuspiciousForm => "suspicious_form",
            DetectionCategory::ScamContent => "scam_content",
            DetectionCategory::PoorReputation => "poor_reputation",
            DetectionCategory::NewDomain => "new_domain",
            DetectionCategory::SuspiciousHosting => "suspicious_hosting",
        }
    }
}

/// One flag per heuristic category. Flags are only ever set during a page's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionResult {
    pub suspect_domain: bool,
    pub similar_domain: bool,
    pub unofficial_donation: bool,
    pub suspicious_form: bool,
    pub scam_content: bool,
    pub poor_reputation: bool,
    pub new_domain: bool,
    pub suspicious_hosting: bool,
}

impl DetectionResult {
    pub fn raise(&mut self, category: DetectionCategory) {
        *self.flag_mut(category) = true;
    }

    pub fn is_raised(&self, category: DetectionCategory) -> bool {
        match category {
            DetectionCategory::SuspectDomain => self.suspect_domain,
            DetectionCategory::SimilarDomain => self.similar_domain,
            DetectionCategory::UnofficialDonation => self.unofficial_donation,
            DetectionCategory::SuspiciousForm => self.suspicious_form,
            DetectionCategory::ScamContent => self.scam_content,
            DetectionCategory::PoorReputation => self.poor_reputation,
            DetectionCategory::NewDomain => self.new_domain,
            DetectionCategory::SuspiciousHosting => self.suspicious_hosting,
        }
    }

    pub fn merge(&mut self, other: &DetectionResult) {
        for category in other.raised() {
            self.raise(category);
        }
    }

    pub fn raised(&self) -> Vec<DetectionCategory> {
        ALL_CATEGORIES
            .iter()
            .copied()
            .filter(|c| self.is_raised(*c))
            .collect()
    }

    pub fn any(&self) -> bool {
        ALL_CATEGORIES.iter().any(|c| self.is_raised(*c))
    }

    fn flag_mut(&mut self, category: DetectionCategory) -> &mut bool {
        match category {
            DetectionCategory::SuspectDomain => &mut self.suspect_domain,
            DetectionCategory::SimilarDomain => &mut self.similar_domain,
            DetectionCategory::UnofficialDonation => &mut self.unofficial_donation,
            DetectionCategory::SuspiciousForm => &mut self.suspicious_form,
            DetectionCategory::ScamContent => &mut self.scam_content,
            DetectionCategory::PoorReputation => &mut self.poor_reputation,
            DetectionCategory::NewDomain => &mut self.new_domain,
            DetectionCategory::SuspiciousHosting => &mut self.suspicious_hosting,
        }
    }
}

const ALL_CATEGORIES: [DetectionCategory; 8] = [
    DetectionCategory::SuspectDomain,
    DetectionCategory::SimilarDomain,
    DetectionCategory::UnofficialDonation,
    DetectionCategory::SuspiciousForm,
    DetectionCategory::ScamContent,
    DetectionCategory::PoorReputation,
    DetectionCategory::NewDomain,
    DetectionCategory::SuspiciousHosting,
];

/// Aggregated reputation facts for one hostname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReputationAnalysis {
    /// Age in days; `None` when the lookup failed or timed out.
    pub domain_age: Option<i64>,
    pub ssl_valid: bool,
    pub blacklist_status: Vec<String>,
    pub hosting_provider: Option<String>,
    /// Additive and unclamped; may exceed 100.
    pub risk_score: u32,
    pub warnings: Vec<String>,
}

impl ReputationAnalysis {
    pub const HIGH_RISK_SCORE: u32 = 70;
    pub const MEDIUM_RISK_SCORE: u32 = 40;

    /// Result for hosts that skip reputation checks entirely.
    pub fn trusted() -> Self {
        Self {
            ssl_valid: true,
            ..Self::default()
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        if self.risk_score >= Self::HIGH_RISK_SCORE {
            Some(Severity::High)
        } else if self.risk_score >= Self::MEDIUM_RISK_SCORE {
            Some(Severity::Medium)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormAnalysis {
    pub index: usize,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub form_text: String,
    pub action: String,
}

/// A warning ready for presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub severity: Severity,
    pub category: DetectionCategory,
}
