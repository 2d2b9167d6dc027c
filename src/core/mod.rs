pub mod bucket;
pub mod record;

pub use bucket::{normalize_candidate, BucketKey, BUCKET_EXTENSION};
pub use record::{expected_samples, GestureRecord, Hand, Sample};
