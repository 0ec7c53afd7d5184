use regex::Regex;

use crate::core::error::GuardError;

const DONATION_KEYWORDS: &[&str] = &[
    "donate",
    "donation",
    "contribute",
    "contribution",
    "fundrais",
    "give now",
    "relief fund",
    "support the victims",
    "help victims",
    "sponsor a family",
];

const PAYMENT_KEYWORDS: &[&str] = &[
    "paypal",
    "western union",
    "moneygram",
    "venmo",
    "cash app",
    "cashapp",
    "zelle",
    "gift card",
    "bitcoin",
    "crypto",
    "wire transfer",
    "bank transfer",
    "credit card",
];

const URGENCY_PATTERN: &str = r"(?i)urgent|immediately|act now|send money|paypal|western union|venmo|gift card|last chance|limited time|before it'?s too late";
const DONATION_RELEVANCE_PATTERN: &str = r"(?i)donat|pay|contribute|give|fundrais";

/// Keyword predicates over page and form text.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    urgency: Regex,
    donation_related: Regex,
}

impl ContentScanner {
    pub fn new() -> Result<Self, GuardError> {
        Ok(Self {
            urgency: Regex::new(URGENCY_PATTERN)?,
            donation_related: Regex::new(DONATION_RELEVANCE_PATTERN)?,
        })
    }

    /// Loose substring match: any donation or payment-method keyword anywhere in the text.
    pub fn has_donation_content(&self, page_text: &str) -> bool {
        let lowered = page_text.to_lowercase();
        DONATION_KEYWORDS
            .iter()
            .chain(PAYMENT_KEYWORDS.iter())
            .any(|kw| lowered.contains(kw))
    }

    pub fn has_urgency_language(&self, text: &str) -> bool {
        self.urgency.is_match(text)
    }

    /// Relevance filter for forms: text or action mentions donating or paying.
    pub fn is_donation_related(&self, text: &str) -> bool {
        self.donation_related.is_match(text)
    }
}
