//! Opus decoder wrapper with loss concealment

use bytes::Bytes;
use opus::{Channels, Decoder};

use crate::config::AudioConfig;
use crate::error::CodecError;

/// Opus decoder producing whole little-endian i16 PCM frames
pub struct VoiceDecoder {
    decoder: Decoder,
    config: AudioConfig,
    /// Decoding buffer (reused to avoid allocations)
    decode_buffer: Vec<i16>,
    frames_decoded: u64,
    /// Frames synthesized by packet loss concealment
    frames_concealed: u64,
}

impl VoiceDecoder {
    /// Create a decoder for the given audio format
    pub fn new(config: AudioConfig) -> Result<Self, CodecError> {
        let channels = match config.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            other => {
                return Err(CodecError::DecoderInit(format!(
                    "Unsupported channel count: {}",
                    other
                )))
            }
        };

        let decoder = Decoder::new(config.sample_rate, channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        let total_samples = config.samples_per_frame() * config.channels as usize;

        Ok(Self {
            decoder,
            config,
            decode_buffer: vec![0i16; total_samples],
            frames_decoded: 0,
            frames_concealed: 0,
        })
    }

    /// Decode one payload, or conceal a lost frame when `payload` is `None`.
    /// Always yields one frame of little-endian i16 PCM bytes.
    pub fn decode(&mut self, payload: Option<&[u8]>) -> Result<Bytes, CodecError> {
        let data = payload.unwrap_or(&[]);
        let samples_per_channel = self
            .decoder
            .decode(data, &mut self.decode_buffer, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total = samples_per_channel * self.config.channels as usize;
        if payload.is_some() {
            self.frames_decoded += 1;
        } else {
            self.frames_concealed += 1;
        }

        let mut pcm = Vec::with_capacity(total * 2);
        for sample in &self.decode_buffer[..total] {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(Bytes::from(pcm))
    }

    /// Synthesize one frame for a packet known to be lost or garbled.
    /// Never fails: if Opus itself refuses, a silent frame is produced.
    pub fn conceal(&mut self) -> Bytes {
        match self.decode(None) {
            Ok(pcm) => pcm,
            Err(e) => {
                tracing::warn!("concealment decode failed, playing silence: {}", e);
                self.frames_concealed += 1;
                Bytes::from(vec![0u8; self.config.frame_bytes()])
            }
        }
    }

    /// PCM frame size in bytes produced per decode
    pub fn frame_bytes(&self) -> usize {
        self.config.frame_bytes()
    }

    /// Get statistics
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_concealed: self.frames_concealed,
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_concealed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::VoiceEncoder;

    #[test]
    fn test_encode_decode_roundtrip_size() {
        let config = AudioConfig::default();
        let mut encoder = VoiceEncoder::new(config).unwrap();
        let mut decoder = VoiceDecoder::new(config).unwrap();

        let mut pcm = Vec::with_capacity(encoder.frame_bytes());
        for i in 0..480 {
            let t = i as f32 / 48000.0;
            let val = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 16000.0) as i16;
            pcm.extend_from_slice(&val.to_le_bytes());
            pcm.extend_from_slice(&val.to_le_bytes());
        }

        let encoded = encoder.encode(&pcm).unwrap().unwrap();
        let decoded = decoder.decode(Some(&encoded)).unwrap();
        assert_eq!(decoded.len(), config.frame_bytes());
    }

    #[test]
    fn test_concealment_yields_full_frame() {
        let config = AudioConfig::default();
        let mut decoder = VoiceDecoder::new(config).unwrap();

        let concealed = decoder.conceal();
        assert_eq!(concealed.len(), config.frame_bytes());
        assert_eq!(decoder.stats().frames_concealed, 1);
    }

    #[test]
    fn test_mono_frame_size() {
        let config = AudioConfig {
            sample_rate: 16000,
            channels: 1,
            frame_ms: 20.0,
        };
        let mut decoder = VoiceDecoder::new(config).unwrap();
        // 16 kHz * 20 ms * 1 channel * 2 bytes
        assert_eq!(decoder.conceal().len(), 640);
    }
}
