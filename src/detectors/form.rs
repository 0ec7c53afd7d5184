//! Per-form risk classification.
//!
//! Risk is a monotonic accumulator: each check may only raise the level, except the
//! sensitive-field check which forces `High` outright.

use regex::Regex;
use url::Url;

use crate::core::{
    error::GuardError,
    page::{FormSnapshot, PageSnapshot},
    types::{FormAnalysis, RiskLevel},
};
use crate::detectors::content::ContentScanner;

/// Payment processors and portals a donation form may legitimately post to.
const TRUSTED_ACTION_HOSTS: &[&str] = &[
    "paypal.com",
    "stripe.com",
    "checkout.stripe.com",
    "js.stripe.com",
    "square.link",
    "squareup.com",
    "braintreegateway.com",
];

const PAYMENT_FIELD_PATTERN: &str =
    r"card|cc-?(num|number|exp|csc)|cvv|cvc|expir|iban|swift|routing|account.?(number|no)|acct|bank|payment|billing";
const SENSITIVE_FIELD_PATTERN: &str =
    r"ssn|social.?security|birth|dob|passport|licen[cs]e|national.?id|\btrn\b|tax.?id|id.?number|mother.?maiden";

/// More sensitive fields than this forces a form to `High`.
const SENSITIVE_FIELD_LIMIT: usize = 2;

#[derive(Debug, Clone)]
pub struct FormRiskAnalyzer {
    content: ContentScanner,
    payment_fields: Regex,
    sensitive_fields: Regex,
    official_portal: String,
    official_suffix: String,
}

impl FormRiskAnalyzer {
    pub fn new(
        content: ContentScanner,
        official_portal: &str,
        official_suffix: &str,
    ) -> Result<Self, GuardError> {
        Ok(Self {
            content,
            payment_fields: Regex::new(PAYMENT_FIELD_PATTERN)?,
            sensitive_fields: Regex::new(SENSITIVE_FIELD_PATTERN)?,
            official_portal: official_portal.to_ascii_lowercase(),
            official_suffix: official_suffix.to_ascii_lowercase(),
        })
    }

    pub fn analyze_page(&self, page: &PageSnapshot, domain_trusted: bool) -> Vec<FormAnalysis> {
        page.forms
            .iter()
            .enumerate()
            .map(|(index, form)| self.analyze_form(index, form, &page.hostname, domain_trusted))
            .collect()
    }

    pub fn analyze_form(
        &self,
        index: usize,
        form: &FormSnapshot,
        hostname: &str,
        domain_trusted: bool,
    ) -> FormAnalysis {
        let mut analysis = FormAnalysis {
            index,
            risk_level: RiskLevel::None,
            reasons: Vec::new(),
            form_text: form.text.clone(),
            action: form.action.clone(),
        };

        let haystack = format!("{} {}", form.text, form.action);
        if !self.content.is_donation_related(&haystack) {
            return analysis;
        }

        let mut level = if domain_trusted {
            RiskLevel::None
        } else {
            RiskLevel::Low
        };

        if self.is_external_action(&form.action, hostname) {
            level.raise_to(RiskLevel::Medium);
            analysis
                .reasons
                .push(format!("submits to external endpoint {}", form.action));
        }

        let payment = self.count_fields(form, &self.payment_fields);
        if payment > 0 && !domain_trusted {
            if level == RiskLevel::Medium {
                level = RiskLevel::High;
            } else {
                level.raise_to(RiskLevel::Medium);
            }
            analysis
                .reasons
                .push(format!("requests payment details ({payment} field(s))"));
        }

        let sensitive = form
            .fields
            .iter()
            .filter(|f| f.field_type == "password" || self.sensitive_fields.is_match(&f.descriptor()))
            .count();
        if sensitive > SENSITIVE_FIELD_LIMIT {
            level = RiskLevel::High;
            analysis
                .reasons
                .push(format!("requests sensitive personal data ({sensitive} field(s))"));
        }

        if !domain_trusted && self.content.has_urgency_language(&form.text) {
            level.raise_to(RiskLevel::Medium);
            analysis.reasons.push("uses urgent language".to_string());
        }

        analysis.risk_level = level;
        analysis
    }

    fn count_fields(&self, form: &FormSnapshot, pattern: &Regex) -> usize {
        form.fields
            .iter()
            .filter(|f| pattern.is_match(&f.descriptor()))
            .count()
    }

    /// Absolute actions that leave the current host and are not an allow-listed processor.
    fn is_external_action(&self, action: &str, hostname: &str) -> bool {
        let action = action.trim().to_ascii_lowercase();
        if action.is_empty() || action.starts_with('#') || action.starts_with('?') {
            return false;
        }
        let absolute = if let Some(rest) = action.strip_prefix("//") {
            format!("https://{rest}")
        } else if action.starts_with('/') {
            return false;
        } else {
            action.clone()
        };
        let Ok(url) = Url::parse(&absolute) else {
            return false;
        };
        let Some(target) = url.host_str() else {
            return false;
        };
        if action.contains(hostname) {
            return false;
        }
        !self.is_allowed_target(target)
    }

    fn is_allowed_target(&self, target: &str) -> bool {
        let matches = |allowed: &str| target == allowed || target.ends_with(&format!(".{allowed}"));
        matches(&self.official_portal)
            || target.ends_with(&self.official_suffix)
            || TRUSTED_ACTION_HOSTS.iter().copied().any(|h| matches(h))
    }
}
