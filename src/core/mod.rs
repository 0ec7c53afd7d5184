//! Data model, similarity, page snapshots and the sinks detections flow into.

pub mod alert;
pub mod error;
pub mod hash;
pub mod page;
pub mod similarity;
pub mod sink;
pub mod store;
pub mod types;
