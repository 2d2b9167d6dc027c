pub mod mock;
pub mod stream;
pub mod traits;
pub mod types;

pub use stream::{StreamTransport, DEFAULT_BAUD_RATE};
pub use traits::Transport;
pub use types::{Command, Request};
