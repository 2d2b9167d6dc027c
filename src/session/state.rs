use serde::{Deserialize, Serialize};

/// Light-sensitivity calibration of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calibration {
    Uncalibrated,
    /// Resistance in Ohms reported by the device
    Calibrated(u32),
}

impl Calibration {
    pub fn resistance(&self) -> Option<u32> {
        match self {
            Self::Uncalibrated => None,
            Self::Calibrated(r) => Some(*r),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated(_))
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::Uncalibrated
    }
}

/// Device session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connected(Calibration),
    /// Transient; returns to `Connected(Calibrated)` once the window is read
    Sampling { resistance: u32 },
}

impl SessionState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use Calibration::*;
        use SessionState::*;

        matches!(
            (self, target),
            // Calibrating or recalibrating
            (Connected(_), Connected(Calibrated(_))) |

            // Measurement requires calibration
            (Connected(Calibrated(_)), Sampling { .. }) |
            (Sampling { .. }, Connected(Calibrated(_))) |

            // Link loss or close
            (Connected(_), Disconnected) |
            (Sampling { .. }, Disconnected)
        )
    }

    pub fn calibration(&self) -> Calibration {
        match self {
            Self::Disconnected => Calibration::Uncalibrated,
            Self::Connected(c) => *c,
            Self::Sampling { resistance } => Calibration::Calibrated(*resistance),
        }
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected(Calibration::Uncalibrated) => "Connected (uncalibrated)",
            Self::Connected(Calibration::Calibrated(_)) => "Connected (calibrated)",
            Self::Sampling { .. } => "Sampling",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Connected(Calibration::Uncalibrated)
    }
}
