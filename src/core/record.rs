use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use super::bucket::BucketKey;
use crate::error::CollectorError;

pub const UNKNOWN: &str = "unknown";
pub const UNKNOWN_CANDIDATE: &str = "Unknown Candidate";

/// One sampling instant: three simultaneous photodiode readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u16; 3]", into = "[u16; 3]")]
pub struct Sample {
    pub r0: u16,
    pub r1: u16,
    pub r2: u16,
}

impl Sample {
    pub const WIRE_SIZE: usize = 6;

    pub fn new(r0: u16, r1: u16, r2: u16) -> Self {
        Self { r0, r1, r2 }
    }

    /// Decode three consecutive little-endian u16 readings
    pub fn from_le_bytes(bytes: [u8; Self::WIRE_SIZE]) -> Self {
        Self {
            r0: u16::from_le_bytes([bytes[0], bytes[1]]),
            r1: u16::from_le_bytes([bytes[2], bytes[3]]),
            r2: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    pub fn to_le_bytes(self) -> [u8; Self::WIRE_SIZE] {
        let [a, b] = self.r0.to_le_bytes();
        let [c, d] = self.r1.to_le_bytes();
        let [e, f] = self.r2.to_le_bytes();
        [a, b, c, d, e, f]
    }
}

impl From<[u16; 3]> for Sample {
    fn from([r0, r1, r2]: [u16; 3]) -> Self {
        Self { r0, r1, r2 }
    }
}

impl From<Sample> for [u16; 3] {
    fn from(s: Sample) -> Self {
        [s.r0, s.r1, s.r2]
    }
}

/// Hand performing the gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hand {
    #[serde(rename = "left_hand")]
    Left,
    #[serde(rename = "right_hand")]
    Right,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Hand {
    /// Directory name used in the dataset layout
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left_hand",
            Self::Right => "right_hand",
            Self::Unknown => UNKNOWN,
        }
    }

    /// Inverse of [`Hand::as_str`]; only the exact directory names match
    pub fn from_dir_name(name: &str) -> Option<Self> {
        [Self::Left, Self::Right, Self::Unknown]
            .into_iter()
            .find(|hand| hand.as_str() == name)
    }
}

impl Default for Hand {
    fn default() -> Self {
        Hand::Unknown
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hand {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "left_hand" => Ok(Hand::Left),
            "right" | "right_hand" => Ok(Hand::Right),
            "unknown" => Ok(Hand::Unknown),
            other => Err(CollectorError::InvalidArgument(format!("Unknown hand: {}", other))),
        }
    }
}

/// One acquired gesture: calibration, sampling parameters, readings and labels.
///
/// `timestamp` is the identity used by the store for removal. Unknown keys are
/// rejected when a persisted record is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GestureRecord {
    /// Calibration resistance in Ohms
    pub resistance: u32,

    /// Requested sample rate in Hz
    pub sample_rate: u32,

    /// Requested duration in seconds
    pub duration: f64,

    /// Expected sample count, `floor(duration * sample_rate)`
    pub samples: u32,

    pub data: Vec<Sample>,

    #[serde(default = "default_candidate")]
    pub candidate: String,

    #[serde(default)]
    pub hand: Hand,

    #[serde(default = "default_label")]
    pub gesture_type: String,

    #[serde(default = "default_label")]
    pub target_gesture: String,

    /// Creation time, seconds since the Unix epoch
    pub timestamp: f64,
}

fn default_candidate() -> String {
    UNKNOWN_CANDIDATE.to_string()
}

fn default_label() -> String {
    UNKNOWN.to_string()
}

/// Expected number of samples for a measurement window
pub fn expected_samples(duration: f64, sample_rate: u32) -> u32 {
    let n = (duration * sample_rate as f64).floor();
    if n <= 0.0 || !n.is_finite() {
        0
    } else if n >= u32::MAX as f64 {
        u32::MAX
    } else {
        n as u32
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

impl GestureRecord {
    /// Empty record stamped with the current time
    pub fn new(resistance: u32, sample_rate: u32, duration: f64) -> Self {
        Self::with_timestamp(resistance, sample_rate, duration, now_secs())
    }

    pub fn with_timestamp(resistance: u32, sample_rate: u32, duration: f64, timestamp: f64) -> Self {
        let samples = expected_samples(duration, sample_rate);
        Self {
            resistance,
            sample_rate,
            duration,
            samples,
            data: Vec::with_capacity(samples.min(1 << 20) as usize),
            candidate: default_candidate(),
            hand: Hand::Unknown,
            gesture_type: default_label(),
            target_gesture: default_label(),
            timestamp,
        }
    }

    /// Append one triplet. The `samples` cap is not enforced here.
    pub fn add_sample(&mut self, r0: u16, r1: u16, r2: u16) {
        self.data.push(Sample::new(r0, r1, r2));
    }

    pub fn push(&mut self, sample: Sample) {
        self.data.push(sample);
    }

    pub fn set_metadata(
        &mut self,
        candidate: impl Into<String>,
        hand: Hand,
        gesture_type: impl Into<String>,
        target_gesture: impl Into<String>,
    ) {
        self.candidate = candidate.into();
        self.hand = hand;
        self.gesture_type = gesture_type.into();
        self.target_gesture = target_gesture.into();
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == self.samples as usize
    }

    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(
            self.gesture_type.clone(),
            self.target_gesture.clone(),
            self.hand,
            self.candidate.clone(),
        )
    }
}
