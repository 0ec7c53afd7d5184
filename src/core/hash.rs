use sha2::{Digest, Sha256};

use crate::core::types::DetectionCategory;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable key for deduplicating stored detections of the same kind on the same host.
pub fn detection_fingerprint(hostname: &str, category: DetectionCategory) -> String {
    let buf = format!("{}|{}", category.as_str(), hostname.to_ascii_lowercase());
    format!("det_{}", sha256_hex(buf.as_bytes()))
}
