pub mod frame;
pub mod gesture_store;

pub use frame::{decode_frames, encode_frame};
pub use gesture_store::GestureStore;
