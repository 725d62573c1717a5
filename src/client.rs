//! Client event loop
//!
//! The single place where network and audio timing meet. One task
//! multiplexes the socket and the capture channel; nothing in here
//! blocks except the `select!` wait itself. Device blocking lives in
//! the two workers, shutdown is a watch flag observed once per
//! iteration.

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::audio::device::{self, AudioInput, AudioOutput, StreamInput, StreamOutput};
use crate::audio::{CaptureWorker, FrameBuffer, PlaybackWorker};
use crate::config::ClientConfig;
use crate::constants::{CHANNEL_CAPACITY, MAX_PAYLOAD};
use crate::error::Error;
use crate::network::{bind_udp, Session};
use crate::protocol::HEADER_LEN;

/// Run the client until shutdown is signalled or the capture source ends
pub async fn run(config: ClientConfig, mut shutdown: watch::Receiver<bool>) -> Result<(), Error> {
    config.audio.validate()?;
    let server_addr = config.server_addr()?;
    let frame_bytes = config.audio.frame_bytes();

    let socket = bind_udp("0.0.0.0:0".parse().expect("valid wildcard addr"))?;
    socket.connect(server_addr).await?;
    tracing::info!(
        "{} samples per frame, {} channels, relay {}",
        config.audio.samples_per_frame(),
        config.audio.channels,
        server_addr
    );

    // Device setup; the cpal stream handles are !Send and must stay on
    // this task for the lifetime of the loop.
    let mut stream_handles = Vec::new();
    let (input, output): (Box<dyn AudioInput>, Box<dyn AudioOutput>) = if config.stdio {
        (
            Box::new(StreamInput::stdin()),
            Box::new(StreamOutput::stdout()),
        )
    } else {
        let (capture_handle, input) = device::open_capture(&config.audio)?;
        let (playback_handle, output) = device::open_playback(&config.audio)?;
        stream_handles.push(capture_handle);
        stream_handles.push(playback_handle);
        (Box::new(input), Box::new(output))
    };

    let (capture_tx, mut capture_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let (playback_tx, playback_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let mut capture = CaptureWorker::spawn(input, capture_tx, frame_bytes)?;
    let mut playback = PlaybackWorker::spawn(output, playback_rx)?;

    let mut session = Session::connect(&socket, config.audio).await?;
    let mut frame = FrameBuffer::new(frame_bytes);
    let mut recv_buf = vec![0u8; HEADER_LEN + MAX_PAYLOAD];
    let mut frames_dropped: u64 = 0;

    loop {
        tokio::select! {
            received = socket.recv(&mut recv_buf) => match received {
                Ok(n) => {
                    for pcm in session.handle_datagram(&recv_buf[..n]) {
                        // Never stall the loop behind a slow device:
                        // a full playback channel drops the frame.
                        if playback_tx.try_send(pcm).is_err() {
                            frames_dropped += 1;
                            if frames_dropped % 100 == 1 {
                                tracing::warn!("playback backlog, {} frames dropped", frames_dropped);
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!("socket receive failed: {}", e),
            },

            chunk = capture_rx.recv() => match chunk {
                Some(chunk) => {
                    let mut offset = 0;
                    while offset < chunk.len() {
                        offset += frame.push(&chunk[offset..]);
                        if frame.is_full() {
                            let pcm = frame.drain().to_vec();
                            if let Err(e) = session.send_frame(&socket, &pcm).await {
                                tracing::warn!("frame send failed: {}", e);
                            }
                        }
                    }
                }
                None => {
                    tracing::info!("capture channel closed, shutting down");
                    break;
                }
            },

            _ = shutdown.changed() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    session.close(&socket).await;
    let stats = session.stats();
    tracing::info!(
        "session closed: {} sent, {} received, {} concealed, {} stale, {} playback drops",
        stats.packets_sent,
        stats.packets_received,
        stats.frames_concealed,
        stats.packets_stale,
        frames_dropped
    );

    // Tear the audio path down: closing the channels unblocks both
    // workers. The capture join is bounded in case a device read
    // never comes back.
    drop(playback_tx);
    drop(capture_rx);
    drop(stream_handles);
    playback.stop();
    capture.stop();

    Ok(())
}
