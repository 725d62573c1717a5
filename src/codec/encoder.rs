//! Opus encoder wrapper

use bytes::Bytes;
use opus::{Application, Channels, Encoder};

use crate::config::AudioConfig;
use crate::constants::MAX_PAYLOAD;
use crate::error::CodecError;

/// Opus encoder operating on whole little-endian i16 PCM frames
pub struct VoiceEncoder {
    encoder: Encoder,
    config: AudioConfig,
    /// Sample staging buffer (reused to avoid allocations)
    samples: Vec<i16>,
    /// Encoding buffer, sized to the wire payload cap
    encode_buffer: Vec<u8>,
    frames_encoded: u64,
    /// Frames Opus decided not to transmit (DTX)
    frames_suppressed: u64,
    bytes_produced: u64,
}

impl VoiceEncoder {
    /// Create an encoder for the given audio format
    pub fn new(config: AudioConfig) -> Result<Self, CodecError> {
        let channels = match config.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            other => {
                return Err(CodecError::EncoderInit(format!(
                    "Unsupported channel count: {}",
                    other
                )))
            }
        };

        let encoder = Encoder::new(config.sample_rate, channels, Application::Voip)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        let total_samples = config.samples_per_frame() * config.channels as usize;

        Ok(Self {
            encoder,
            config,
            samples: vec![0i16; total_samples],
            encode_buffer: vec![0u8; MAX_PAYLOAD],
            frames_encoded: 0,
            frames_suppressed: 0,
            bytes_produced: 0,
        })
    }

    /// Encode one PCM frame.
    ///
    /// `pcm` must be exactly one frame of little-endian i16 samples.
    /// Returns `Ok(None)` when Opus signals "nothing worth sending"
    /// (a 1-byte DTX packet); the caller skips the datagram.
    pub fn encode(&mut self, pcm: &[u8]) -> Result<Option<Bytes>, CodecError> {
        if pcm.len() != self.config.frame_bytes() {
            return Err(CodecError::InvalidFrameSize(pcm.len()));
        }

        for (sample, bytes) in self.samples.iter_mut().zip(pcm.chunks_exact(2)) {
            *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
        }

        let size = self
            .encoder
            .encode(&self.samples, &mut self.encode_buffer)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        if size <= 1 {
            self.frames_suppressed += 1;
            return Ok(None);
        }

        self.frames_encoded += 1;
        self.bytes_produced += size as u64;
        Ok(Some(Bytes::copy_from_slice(&self.encode_buffer[..size])))
    }

    /// PCM frame size in bytes expected by [`encode`](VoiceEncoder::encode)
    pub fn frame_bytes(&self) -> usize {
        self.config.frame_bytes()
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            frames_suppressed: self.frames_suppressed,
            bytes_produced: self.bytes_produced,
        }
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub frames_suppressed: u64,
    pub bytes_produced: u64,
}
