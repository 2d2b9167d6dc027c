pub mod config;
pub mod core;
pub mod error;
pub mod hal;
pub mod session;
pub mod store;

pub use error::{CollectorError, Result};
