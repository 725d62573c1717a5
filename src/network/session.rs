//! Client network session
//!
//! State machine between the event loop and the wire:
//! `Connecting -> Established -> Closing -> Closed`. The session owns
//! both codec halves, tracks the send and receive sequence counters, and
//! decides when a lost or garbled frame must be concealed.

use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::codec::{VoiceDecoder, VoiceEncoder};
use crate::config::AudioConfig;
use crate::constants::{HELLO_RETRIES, HELLO_TIMEOUT_MS, MAX_CONCEAL_BURST, MAX_PAYLOAD};
use crate::error::{Error, NetworkError};
use crate::protocol::{DataPacket, Packet, HEADER_LEN};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Established,
    Closing,
    Closed,
}

/// One client's established relay session
pub struct Session {
    sender_id: u8,
    state: SessionState,
    send_seq: u16,
    /// Next expected inbound sequence; `None` until the first DATA after
    /// session start or a JOIN resynchronizes the peer context
    recv_seq: Option<u16>,
    encoder: VoiceEncoder,
    decoder: VoiceDecoder,
    packets_sent: u64,
    packets_received: u64,
    packets_stale: u64,
}

impl Session {
    /// Perform the handshake on an already connected socket.
    ///
    /// Sends HELLO and waits for WELCOME with a per-attempt timeout,
    /// retrying a bounded number of times; anything that is not a WELCOME
    /// is discarded during this phase. Exhausted retries are a setup
    /// failure, not a steady-state condition.
    pub async fn connect(socket: &UdpSocket, audio: AudioConfig) -> Result<Self, Error> {
        let encoder = VoiceEncoder::new(audio)?;
        let decoder = VoiceDecoder::new(audio)?;

        let hello = Packet::Hello.encode();
        let mut buf = [0u8; HEADER_LEN + MAX_PAYLOAD];

        for attempt in 1..=HELLO_RETRIES {
            socket
                .send(&hello)
                .await
                .map_err(|e| NetworkError::SendFailed(e.to_string()))?;

            let wait = Self::await_welcome(socket, &mut buf);
            match timeout(Duration::from_millis(HELLO_TIMEOUT_MS), wait).await {
                Ok(Ok(sender_id)) => {
                    tracing::info!("welcome from server, we are client {}", sender_id);
                    return Ok(Self {
                        sender_id,
                        state: SessionState::Established,
                        send_seq: 0,
                        recv_seq: None,
                        encoder,
                        decoder,
                        packets_sent: 0,
                        packets_received: 0,
                        packets_stale: 0,
                    });
                }
                Ok(Err(e)) => return Err(NetworkError::ReceiveFailed(e.to_string()).into()),
                Err(_) => {
                    tracing::warn!("no WELCOME within {}ms (attempt {})", HELLO_TIMEOUT_MS, attempt)
                }
            }
        }

        Err(NetworkError::HandshakeTimeout(HELLO_RETRIES).into())
    }

    async fn await_welcome(socket: &UdpSocket, buf: &mut [u8]) -> std::io::Result<u8> {
        loop {
            let n = socket.recv(buf).await?;
            match Packet::decode(&buf[..n]) {
                Ok(Packet::Welcome { sender_id }) => return Ok(sender_id),
                Ok(other) => {
                    tracing::debug!("discarding {:?} while connecting", other.packet_type())
                }
                Err(e) => tracing::debug!("discarding malformed datagram: {}", e),
            }
        }
    }

    /// Process one inbound datagram, returning zero or more PCM frames
    /// for playback. Protocol anomalies are logged, never fatal.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Vec<Bytes> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("malformed datagram: {}", e);
                return Vec::new();
            }
        };

        match packet {
            Packet::Data(data) => self.handle_data(data),
            Packet::Join { sender_id } => {
                tracing::info!("user {} joined", sender_id);
                // Fresh peer context: resynchronize on its first DATA
                self.recv_seq = None;
                Vec::new()
            }
            Packet::Bye { sender_id } => {
                tracing::info!("user {} disconnected", sender_id);
                Vec::new()
            }
            other => {
                tracing::warn!("unexpected {:?} packet, ignoring", other.packet_type());
                Vec::new()
            }
        }
    }

    /// DATA path: sequence-gap tracking plus truncation concealment.
    fn handle_data(&mut self, data: DataPacket) -> Vec<Bytes> {
        let mut frames = Vec::new();
        self.packets_received += 1;

        match self.recv_seq {
            None => {
                // First DATA since start or JOIN: adopt its sequence
                self.recv_seq = Some(data.sequence.wrapping_add(1));
            }
            Some(expected) => {
                // Interpreted on the u16 ring: the lower half of the range
                // is forward loss, the upper half is a stale arrival.
                let lost = data.sequence.wrapping_sub(expected);
                if lost == 0 {
                    self.recv_seq = Some(expected.wrapping_add(1));
                } else if lost < u16::MAX / 2 {
                    tracing::warn!(
                        "packet loss: expected seq {}, got {}, {} missing",
                        expected,
                        data.sequence,
                        lost
                    );
                    for _ in 0..lost.min(MAX_CONCEAL_BURST) {
                        frames.push(self.decoder.conceal());
                    }
                    self.recv_seq = Some(data.sequence.wrapping_add(1));
                } else {
                    tracing::debug!(
                        "stale packet seq {} (expected {}), dropping",
                        data.sequence,
                        expected
                    );
                    self.packets_stale += 1;
                    return frames;
                }
            }
        }

        if data.is_truncated() {
            tracing::warn!(
                "incomplete packet, declared {} got {} bytes",
                data.declared_len,
                data.payload.len()
            );
            frames.push(self.decoder.conceal());
            return frames;
        }

        match self.decoder.decode(Some(&data.payload)) {
            Ok(pcm) => frames.push(pcm),
            Err(e) => {
                tracing::warn!("decode failed, concealing: {}", e);
                frames.push(self.decoder.conceal());
            }
        }
        frames
    }

    /// Encode and transmit one PCM frame as a DATA packet.
    ///
    /// DTX suppression (encoder returned nothing) is not an error and
    /// does not consume a sequence number. The counter only advances on
    /// a successful transmission.
    pub async fn send_frame(&mut self, socket: &UdpSocket, pcm: &[u8]) -> Result<(), Error> {
        let payload = match self.encoder.encode(pcm)? {
            Some(payload) => payload,
            None => return Ok(()),
        };

        let packet = Packet::Data(DataPacket::new(self.sender_id, self.send_seq, payload));
        socket
            .send(&packet.encode())
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;

        self.send_seq = self.send_seq.wrapping_add(1);
        self.packets_sent += 1;
        Ok(())
    }

    /// Best-effort BYE; the session ends up Closed regardless of the
    /// send outcome.
    pub async fn close(&mut self, socket: &UdpSocket) {
        if self.state != SessionState::Established {
            self.state = SessionState::Closed;
            return;
        }
        self.state = SessionState::Closing;

        let bye = Packet::Bye {
            sender_id: self.sender_id,
        };
        if let Err(e) = socket.send(&bye.encode()).await {
            tracing::warn!("BYE send failed: {}", e);
        }
        self.state = SessionState::Closed;
    }

    pub fn sender_id(&self) -> u8 {
        self.sender_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn send_seq(&self) -> u16 {
        self.send_seq
    }

    /// Get statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            packets_stale: self.packets_stale,
            frames_concealed: self.decoder.stats().frames_concealed,
        }
    }

    #[cfg(test)]
    pub(crate) fn established_for_test(audio: AudioConfig, send_seq: u16) -> Self {
        Self {
            sender_id: 0,
            state: SessionState::Established,
            send_seq,
            recv_seq: None,
            encoder: VoiceEncoder::new(audio).unwrap(),
            decoder: VoiceDecoder::new(audio).unwrap(),
            packets_sent: 0,
            packets_received: 0,
            packets_stale: 0,
        }
    }
}

/// Session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_stale: u64,
    pub frames_concealed: u64,
}
