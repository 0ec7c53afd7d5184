use serde::{Deserialize, Serialize};
use strsim::levenshtein;

/// Suffixes removed in cosmetic mode, longest first so `.gov.jm` wins over `.jm`.
const COSMETIC_SUFFIXES: &[&str] = &[
    ".gov.jm", ".org.jm", ".com.jm", ".edu.jm", ".com", ".org", ".net", ".gov", ".info", ".jm",
];

/// How inputs are cleaned before comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMode {
    /// Drop a leading `www.` and one trailing well-known TLD.
    Cosmetic,
    /// Keep only `[a-z0-9]`.
    #[default]
    Alphanumeric,
}

pub fn clean(input: &str, mode: SimilarityMode) -> String {
    let lowered = input.trim().to_ascii_lowercase();
    match mode {
        SimilarityMode::Cosmetic => {
            let mut s = lowered.strip_prefix("www.").unwrap_or(&lowered);
            if let Some(stripped) = COSMETIC_SUFFIXES.iter().find_map(|sfx| s.strip_suffix(sfx)) {
                s = stripped;
            }
            s.to_string()
        }
        SimilarityMode::Alphanumeric => lowered
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect(),
    }
}

/// Normalised edit-distance similarity in `[0, 1]`.
///
/// Returns 0 when either cleaned input is empty.
pub fn similarity(a: &str, b: &str, mode: SimilarityMode) -> f64 {
    let a = clean(a, mode);
    let b = clean(b, mode);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    let distance = levenshtein(&a, &b);
    1.0 - distance as f64 / longest as f64
}
