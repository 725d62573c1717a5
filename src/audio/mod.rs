//! Audio subsystem module

pub mod capture;
pub mod device;
pub mod frame;
pub mod playback;

pub use capture::CaptureWorker;
pub use device::{AudioInput, AudioOutput, StreamInput, StreamOutput};
pub use frame::FrameBuffer;
pub use playback::PlaybackWorker;
