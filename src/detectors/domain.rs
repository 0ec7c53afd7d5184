use regex::Regex;
use serde::Serialize;

use crate::config::GuardConfig;
use crate::core::{
    error::GuardError,
    similarity::{similarity, SimilarityMode},
    types::DomainLists,
};

const DISASTER_KEYWORD_PATTERN: &str = r"(?i)jamaica|melissa|hurricane|relief|donat";

/// Why a hostname was flagged by the domain checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainVerdict {
    KnownSuspect,
    SimilarToOfficial { similarity: f64 },
    UnofficialDonation,
}

/// Quick status for a bare hostname, without page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Suspicious,
    DonationLookalike,
    Trusted,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct DomainClassifier {
    lists: DomainLists,
    official_suffix: String,
    threshold: f64,
    mode: SimilarityMode,
    disaster_keywords: Regex,
}

impl DomainClassifier {
    pub fn new(lists: DomainLists, config: &GuardConfig) -> Result<Self, GuardError> {
        Ok(Self {
            lists,
            official_suffix: config.official_suffix.to_ascii_lowercase(),
            threshold: config.similarity_threshold,
            mode: config.similarity_mode,
            disaster_keywords: Regex::new(DISASTER_KEYWORD_PATTERN)?,
        })
    }

    pub fn lists(&self) -> &DomainLists {
        &self.lists
    }

    pub fn official_portal(&self) -> &str {
        &self.lists.official_portal
    }

    pub fn is_known_suspect(&self, hostname: &str) -> bool {
        self.lists.is_suspect(hostname)
    }

    pub fn similarity_to_official(&self, hostname: &str) -> f64 {
        similarity(hostname, &self.lists.official_portal, self.mode)
    }

    pub fn is_similar_to_official(&self, hostname: &str) -> bool {
        hostname != self.lists.official_portal
            && self.similarity_to_official(hostname) > self.threshold
    }

    pub fn has_official_suffix(&self, hostname: &str) -> bool {
        hostname.ends_with(&self.official_suffix)
            || hostname == self.official_suffix.trim_start_matches('.')
    }

    pub fn mentions_disaster(&self, hostname: &str) -> bool {
        self.disaster_keywords.is_match(hostname)
    }

    pub fn is_unofficial_donation_site(&self, hostname: &str, page_has_donation_content: bool) -> bool {
        !self.has_official_suffix(hostname)
            && !self.lists.is_listed_trusted(hostname)
            && self.mentions_disaster(hostname)
            && page_has_donation_content
    }

    pub fn is_trusted(&self, hostname: &str) -> bool {
        self.has_official_suffix(hostname)
            || self.lists.is_listed_trusted(hostname)
            || hostname == self.lists.official_portal
    }

    /// Runs the domain checks in priority order and stops at the first hit.
    pub fn classify(&self, hostname: &str, page_has_donation_content: bool) -> Option<DomainVerdict> {
        if self.is_known_suspect(hostname) {
            return Some(DomainVerdict::KnownSuspect);
        }
        if self.is_trusted(hostname) {
            return None;
        }
        if self.is_similar_to_official(hostname) {
            return Some(DomainVerdict::SimilarToOfficial {
                similarity: self.similarity_to_official(hostname),
            });
        }
        if self.is_unofficial_donation_site(hostname, page_has_donation_content) {
            return Some(DomainVerdict::UnofficialDonation);
        }
        None
    }

    pub fn status(&self, hostname: &str) -> DomainStatus {
        if self.is_known_suspect(hostname) {
            DomainStatus::Suspicious
        } else if self.is_trusted(hostname) {
            DomainStatus::Trusted
        } else if self.mentions_disaster(hostname) || self.is_similar_to_official(hostname) {
            DomainStatus::DonationLookalike
        } else {
            DomainStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> DomainClassifier {
        let lists = DomainLists::new(
            ["jamaicaaid.com", "helpmelissa.com"],
            ["psoj.org", "jcdt.org.jm"],
            "supportjamaica.gov.jm",
        );
        DomainClassifier::new(lists, &GuardConfig::default()).unwrap()
    }

    #[test]
    fn official_suffix_is_always_trusted() {
        let c = classifier();
        for host in ["opm.gov.jm", "anything.at.all.gov.jm", "jamaicarelief.gov.jm", "gov.jm"] {
            assert!(c.is_trusted(host), "{host}");
        }
        assert!(c.is_trusted("psoj.org"));
        assert!(!c.is_trusted("gov.jm.evil.com"));
    }

    #[test]
    fn suspect_short_circuits_other_checks() {
        let c = classifier();
        assert_eq!(c.classify("jamaicaaid.com", true), Some(DomainVerdict::KnownSuspect));
    }

    #[test]
    fn typosquat_of_portal_is_similar() {
        let c = classifier();
        assert!(c.is_similar_to_official("supportjamaicagovjm.com"));
        assert!(!c.is_similar_to_official("supportjamaica.gov.jm"));
        match c.classify("supportjamaicagovjm.com", false) {
            Some(DomainVerdict::SimilarToOfficial { similarity }) => assert!(similarity > 0.85),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn unofficial_donation_needs_keyword_and_content() {
        let c = classifier();
        assert!(c.is_unofficial_donation_site("melissareliefjamaica.net", true));
        assert!(!c.is_unofficial_donation_site("melissareliefjamaica.net", false));
        assert!(!c.is_unofficial_donation_site("example.net", true));
        assert!(!c.is_unofficial_donation_site("jamaicarelief.gov.jm", true));
        assert_eq!(
            c.classify("HurricaneHelpers.org".to_lowercase().as_str(), true),
            Some(DomainVerdict::UnofficialDonation)
        );
    }

    #[test]
    fn trusted_hosts_get_no_verdict() {
        let c = classifier();
        assert_eq!(c.classify("supportjamaica.gov.jm", true), None);
        assert_eq!(c.classify("www.supportjamaica.gov.jm", true), None);
    }

    #[test]
    fn status_mirrors_quick_check() {
        let c = classifier();
        assert_eq!(c.status("helpmelissa.com"), DomainStatus::Suspicious);
        assert_eq!(c.status("jis.gov.jm"), DomainStatus::Trusted);
        assert_eq!(c.status("jamaica-donations.net"), DomainStatus::DonationLookalike);
        assert_eq!(c.status("example.com"), DomainStatus::Unknown);
    }
}
