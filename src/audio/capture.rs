//! Capture worker
//!
//! A dedicated thread performing blocking device reads, decoupling the
//! device cadence from the event loop. The only crossing point is a
//! bounded byte channel: the worker blocks when the loop falls behind,
//! the loop awaits when no audio is ready.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `stop` waits for one in-flight device read to return
const JOIN_WAIT: Duration = Duration::from_millis(500);

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::audio::device::AudioInput;

/// Handle to the capture thread
pub struct CaptureWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    bytes_captured: Arc<AtomicU64>,
}

impl CaptureWorker {
    /// Spawn the worker. `chunk_bytes` sizes the device read buffer; one
    /// codec frame is a natural choice.
    pub fn spawn(
        mut input: Box<dyn AudioInput>,
        tx: mpsc::Sender<Bytes>,
        chunk_bytes: usize,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let bytes_captured = Arc::new(AtomicU64::new(0));

        let running_in_thread = running.clone();
        let bytes_in_thread = bytes_captured.clone();
        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let mut buf = vec![0u8; chunk_bytes];
                while running_in_thread.load(Ordering::Relaxed) {
                    let n = match input.capture(&mut buf) {
                        Ok(0) => {
                            tracing::info!("capture source ended");
                            break;
                        }
                        Ok(n) => n,
                        Err(e) => {
                            tracing::warn!("capture read failed: {}", e);
                            continue;
                        }
                    };
                    bytes_in_thread.fetch_add(n as u64, Ordering::Relaxed);
                    if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                        // Event loop is gone
                        break;
                    }
                }
                tracing::debug!("capture worker exiting");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
            bytes_captured,
        })
    }

    /// Signal the worker to stop and join it. A worker sitting in a
    /// blocking device read cannot be interrupted from here, so the
    /// join is bounded: if the read has not returned by the deadline
    /// the thread is detached and dies with the process.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + JOIN_WAIT;
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    tracing::debug!("capture worker stuck in a device read, detaching");
                    return;
                }
                thread::sleep(Duration::from_millis(10));
            }
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Total PCM bytes read from the device
    pub fn bytes_captured(&self) -> u64 {
        self.bytes_captured.load(Ordering::Relaxed)
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::StreamInput;

    #[tokio::test]
    async fn test_capture_forwards_all_bytes() {
        let pcm: Vec<u8> = (0..200u8).collect();
        let input = StreamInput::new(std::io::Cursor::new(pcm.clone()));

        let (tx, mut rx) = mpsc::channel(8);
        let mut worker = CaptureWorker::spawn(Box::new(input), tx, 64).unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = rx.recv().await {
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, pcm);

        worker.stop();
        assert_eq!(worker.bytes_captured(), 200);
    }

    #[tokio::test]
    async fn test_capture_stops_when_receiver_dropped() {
        // Endless zero source
        let input = StreamInput::new(std::io::repeat(0u8));
        let (tx, rx) = mpsc::channel(1);
        let mut worker = CaptureWorker::spawn(Box::new(input), tx, 16).unwrap();

        drop(rx);
        // The worker unblocks on the failed send and exits
        worker.stop();
        assert!(worker.handle.is_none());
    }

    #[tokio::test]
    async fn test_stop_detaches_from_stalled_read() {
        // A device read that never returns, like a stalled stdin pipe
        struct StalledInput;
        impl AudioInput for StalledInput {
            fn capture(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                loop {
                    thread::park();
                }
            }
        }

        let (tx, rx) = mpsc::channel(1);
        let mut worker = CaptureWorker::spawn(Box::new(StalledInput), tx, 16).unwrap();
        drop(rx);

        // Closing the channel cannot unblock the read, so stop() must
        // give up on the join instead of waiting forever.
        let stopped = tokio::task::spawn_blocking(move || worker.stop());
        tokio::time::timeout(Duration::from_secs(2), stopped)
            .await
            .expect("stop() hung on a stalled device read")
            .unwrap();
    }
}
