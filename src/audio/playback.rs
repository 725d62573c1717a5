//! Playback worker
//!
//! Mirror of the capture worker: a dedicated thread blocking on the
//! playback channel and writing each PCM chunk to the device. Closing
//! the channel drains and terminates the worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::audio::device::AudioOutput;

/// Handle to the playback thread
pub struct PlaybackWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    bytes_played: Arc<AtomicU64>,
}

impl PlaybackWorker {
    /// Spawn the worker reading PCM chunks from `rx`
    pub fn spawn(
        mut output: Box<dyn AudioOutput>,
        mut rx: mpsc::Receiver<Bytes>,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let bytes_played = Arc::new(AtomicU64::new(0));

        let running_in_thread = running.clone();
        let bytes_in_thread = bytes_played.clone();
        let handle = thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || {
                while running_in_thread.load(Ordering::Relaxed) {
                    let chunk = match rx.blocking_recv() {
                        Some(chunk) => chunk,
                        // Sender dropped and queue drained
                        None => break,
                    };
                    match output.playback(&chunk) {
                        Ok(()) => {
                            bytes_in_thread.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                        }
                        Err(e) => tracing::warn!("playback write failed: {}", e),
                    }
                }
                tracing::debug!("playback worker exiting");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
            bytes_played,
        })
    }

    /// Signal the worker to stop and join it. Callers drop the sending
    /// half first so the blocking receive returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Total PCM bytes written to the device
    pub fn bytes_played(&self) -> u64 {
        self.bytes_played.load(Ordering::Relaxed)
    }
}

impl Drop for PlaybackWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    /// Sink collecting everything played, shared with the test body
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl AudioOutput for SharedSink {
        fn playback(&mut self, buf: &[u8]) -> io::Result<()> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_playback_writes_in_order() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(8);
        let mut worker = PlaybackWorker::spawn(Box::new(SharedSink(sink.clone())), rx).unwrap();

        tx.send(Bytes::from_static(&[1, 2, 3])).await.unwrap();
        tx.send(Bytes::from_static(&[4, 5])).await.unwrap();
        drop(tx);

        worker.stop();
        assert_eq!(*sink.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(worker.bytes_played(), 5);
    }
}
