pub mod device;
pub mod state;

pub use device::{DeviceSession, MeasurementReport};
pub use state::{Calibration, SessionState};
