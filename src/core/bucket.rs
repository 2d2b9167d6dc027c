use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::record::Hand;

/// File extension of a bucket holding serialized gesture frames
pub const BUCKET_EXTENSION: &str = "frames";

const CANDIDATE_PREFIX: &str = "candidate_";

/// Identifies one append-only bucket: `(gesture_type, target_gesture, hand, candidate)`.
///
/// Candidates that normalize to the same leaf name share a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub gesture_type: String,
    pub target_gesture: String,
    pub hand: Hand,
    pub candidate: String,
}

/// Lower-case and replace spaces with underscores
pub fn normalize_candidate(candidate: &str) -> String {
    candidate.to_lowercase().replace(' ', "_")
}

impl BucketKey {
    pub fn new(
        gesture_type: impl Into<String>,
        target_gesture: impl Into<String>,
        hand: Hand,
        candidate: impl Into<String>,
    ) -> Self {
        Self {
            gesture_type: gesture_type.into(),
            target_gesture: target_gesture.into(),
            hand,
            candidate: candidate.into(),
        }
    }

    pub fn normalized_candidate(&self) -> String {
        normalize_candidate(&self.candidate)
    }

    /// `<gesture_type>/<target_gesture>/<hand>`
    pub fn directory(&self) -> PathBuf {
        Path::new(&self.gesture_type)
            .join(&self.target_gesture)
            .join(self.hand.as_str())
    }

    pub fn file_name(&self) -> String {
        format!("{}{}.{}", CANDIDATE_PREFIX, self.normalized_candidate(), BUCKET_EXTENSION)
    }

    pub fn relative_path(&self) -> PathBuf {
        self.directory().join(self.file_name())
    }

    /// Recover the normalized candidate from a bucket file name
    pub fn candidate_from_file_name(file_name: &str) -> Option<&str> {
        file_name
            .strip_prefix(CANDIDATE_PREFIX)?
            .strip_suffix(BUCKET_EXTENSION)?
            .strip_suffix('.')
            .filter(|c| !c.is_empty())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.gesture_type,
            self.target_gesture,
            self.hand,
            self.normalized_candidate()
        )
    }
}
