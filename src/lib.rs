//! # Voice Relay
//!
//! Minimal low-latency voice chat over UDP: a relay server that fans out
//! voice datagrams among connected peers, and a duplex client that captures
//! PCM, Opus-encodes it into sequence-framed datagrams, and decodes/plays
//! whatever the relay forwards back.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 CLIENT                                     SERVER
//! ┌────────────────────────────────────────┐       ┌───────────────────────┐
//! │ ┌─────────┐  bytes  ┌────────────────┐ │  UDP  │  ┌─────────────────┐  │
//! │ │ Capture │────────▶│                │ │       │  │  Session Table  │  │
//! │ │ Worker  │ channel │   Event Loop   │◀┼──────▶┼─▶│  id │ addr │ ✓  │  │
//! │ └─────────┘         │ (tokio select) │ │       │  └────────┬────────┘  │
//! │ ┌─────────┐  bytes  │                │ │       │           ▼           │
//! │ │Playback │◀────────│ frame buffer   │ │       │  broadcast to every   │
//! │ │ Worker  │ channel │ opus ⇄ packets │ │       │  alive peer except    │
//! │ └─────────┘         └────────────────┘ │       │  the sender           │
//! └────────────────────────────────────────┘       └───────────────────────┘
//! ```
//!
//! The client bridges two blocking I/O domains: an audio device fed and
//! drained at fixed cadence by two dedicated worker threads, and a UDP
//! socket multiplexed in a single-task event loop. The only synchronization
//! between the two domains is a pair of unidirectional byte channels.

pub mod audio;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Default frame duration in milliseconds
    pub const DEFAULT_FRAME_MS: f32 = 10.0;

    /// Default UDP port for the relay server
    pub const DEFAULT_PORT: u16 = 61234;

    /// Maximum encoded payload carried by one DATA packet
    pub const MAX_PAYLOAD: usize = 8192;

    /// Capacity (in PCM chunks) of the worker <-> event loop channels
    pub const CHANNEL_CAPACITY: usize = 64;

    /// Handshake: per-attempt WELCOME timeout in milliseconds
    pub const HELLO_TIMEOUT_MS: u64 = 500;

    /// Handshake: number of HELLO attempts before giving up
    pub const HELLO_RETRIES: u32 = 5;

    /// Upper bound on back-to-back concealment frames for one sequence gap
    pub const MAX_CONCEAL_BURST: u16 = 16;
}
