//! Opus codec adapter
//!
//! Wraps the opaque Opus transform behind the fixed-frame contract the
//! rest of the client relies on: one PCM frame in, at most one payload
//! out (encode), one payload or a loss marker in, exactly one PCM frame
//! out (decode).

pub mod decoder;
pub mod encoder;

pub use decoder::VoiceDecoder;
pub use encoder::VoiceEncoder;
