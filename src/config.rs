//! Application configuration
//!
//! Config structs with serde support so both binaries can load a TOML
//! file and then apply command line overrides on top.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{DEFAULT_CHANNELS, DEFAULT_FRAME_MS, DEFAULT_PORT, DEFAULT_SAMPLE_RATE};
use crate::error::ConfigError;

/// Sample rates the Opus codec accepts
pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Frame durations (ms) the Opus codec accepts
pub const SUPPORTED_FRAME_MS: [f32; 6] = [2.5, 5.0, 10.0, 20.0, 40.0, 60.0];

/// Audio format shared by the device workers and the codec
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Frame duration in milliseconds
    pub frame_ms: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frame_ms: DEFAULT_FRAME_MS,
        }
    }
}

impl AudioConfig {
    /// Check all fields against the values the codec supports
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ConfigError::InvalidChannels(self.channels));
        }
        if !SUPPORTED_FRAME_MS
            .iter()
            .any(|ms| (ms - self.frame_ms).abs() < f32::EPSILON)
        {
            return Err(ConfigError::InvalidFrameDuration(self.frame_ms));
        }
        Ok(())
    }

    /// Samples per frame, per channel
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as f64 * self.frame_ms as f64 / 1000.0).round() as usize
    }

    /// One PCM frame in bytes (16-bit interleaved samples)
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame() * self.channels as usize * 2
    }
}

/// Client configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub audio: AudioConfig,
    /// Destination relay, `host` or `host:port`
    pub server: Option<String>,
    /// Use stdin/stdout PCM byte streams instead of a live audio device
    pub stdio: bool,
}

impl ClientConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::FileParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolve the configured `host[:port]` to a socket address
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = self
            .server
            .as_deref()
            .ok_or_else(|| ConfigError::InvalidAddress("no server given".into()))?;
        let with_port = if raw.contains(':') {
            raw.to_string()
        } else {
            format!("{}:{}", raw, DEFAULT_PORT)
        };

        use std::net::ToSocketAddrs;
        with_port
            .to_socket_addrs()
            .map_err(|e| ConfigError::ResolveFailed(format!("{}: {}", with_port, e)))?
            .next()
            .ok_or_else(|| ConfigError::ResolveFailed(with_port))
    }
}

/// Server configuration
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// UDP listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ServerConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::FileParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
