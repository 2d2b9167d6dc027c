use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::hal::DEFAULT_BAUD_RATE;

/// Sampling defaults and gesture labels of one gesture category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureTypeDefaults {
    /// Hz
    pub sample_rate: u32,
    pub duration_ms: u32,
    pub gestures: Vec<String>,
}

impl GestureTypeDefaults {
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Collector settings persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub dataset_root: PathBuf,
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: Option<u64>,
    pub default_candidate: String,
    /// Pause before a measurement starts, giving the candidate time to get ready
    pub start_delay_ms: u64,
    pub gesture_types: BTreeMap<String, GestureTypeDefaults>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let labels = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut gesture_types = BTreeMap::new();
        gesture_types.insert(
            "gestures".to_string(),
            GestureTypeDefaults {
                sample_rate: 100,
                duration_ms: 1000,
                gestures: labels(&[
                    "swipe_left",
                    "swipe_right",
                    "swipe_up",
                    "swipe_down",
                    "clockwise",
                    "counter_clockwise",
                    "tap",
                    "double_tap",
                    "zoom_in",
                    "zoom_out",
                ]),
            },
        );
        gesture_types.insert(
            "digits".to_string(),
            GestureTypeDefaults {
                sample_rate: 1000,
                duration_ms: 1500,
                gestures: (0..10).map(|i| format!("#{}", i)).collect(),
            },
        );
        gesture_types.insert(
            "letters".to_string(),
            GestureTypeDefaults {
                sample_rate: 100,
                duration_ms: 4000,
                gestures: ('A'..='J').map(|c| format!("char_{}", c)).collect(),
            },
        );

        Self {
            dataset_root: PathBuf::from("./dataset"),
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: None,
            default_candidate: "default".to_string(),
            start_delay_ms: 500,
            gesture_types,
        }
    }
}

impl CollectorConfig {
    pub fn defaults_for(&self, gesture_type: &str) -> Option<&GestureTypeDefaults> {
        self.gesture_types.get(gesture_type)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Write a default config file if none exists yet
    pub async fn ensure(path: &Path) -> Result<()> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await
                    .context("Failed to create config directory")?;
            }

            let json = serde_json::to_string_pretty(&CollectorConfig::default())?;
            fs::write(path, json).await
                .context("Failed to write default config")?;
            log::info!("Wrote default collector config to {}", path.display());
        }

        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        Self::ensure(path).await?;

        let content = fs::read_to_string(path).await
            .context("Failed to read config file")?;

        let config: CollectorConfig = serde_json::from_str(&content)
            .context("Failed to parse config JSON")?;

        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        // Write to temporary file first
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json).await
            .context("Failed to write temporary config file")?;

        // Atomic rename
        fs::rename(&temp_path, path).await
            .context("Failed to atomically update config file")?;

        Ok(())
    }
}
