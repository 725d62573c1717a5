//! Audio device abstraction
//!
//! The workers only ever see two blocking primitives: `capture` fills a
//! buffer with raw PCM, `playback` drains one. Both operate on 16-bit
//! little-endian interleaved samples. Two backends exist:
//!
//! - [`StreamInput`]/[`StreamOutput`] wrap arbitrary byte streams
//!   (typically stdin/stdout), so audio can be piped in and out of the
//!   process.
//! - [`open_capture`]/[`open_playback`] drive a live device through cpal,
//!   bridging its callback streams to the blocking interface with bounded
//!   channels. The cpal stream object is not `Send` and stays on the
//!   thread that opened it; only the channel half crosses into a worker.

use std::io::{self, Read, Write};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::AudioConfig;
use crate::error::AudioError;

/// Chunks buffered between a cpal callback and its worker
const BRIDGE_CAPACITY: usize = 64;

/// Blocking PCM source
pub trait AudioInput: Send {
    /// Fill `buf` with captured PCM bytes; returns the byte count.
    /// A return of 0 means the source is exhausted.
    fn capture(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Blocking PCM sink
pub trait AudioOutput: Send {
    /// Write one chunk of PCM bytes to the device
    fn playback(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Capture from any byte stream (stdin, a file, a pipe)
pub struct StreamInput<R> {
    reader: R,
}

impl<R: Read + Send> StreamInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl StreamInput<io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(io::stdin())
    }
}

impl<R: Read + Send> AudioInput for StreamInput<R> {
    fn capture(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Playback into any byte stream (stdout, a file, a pipe)
pub struct StreamOutput<W> {
    writer: W,
}

impl<W: Write + Send> StreamOutput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl StreamOutput<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> AudioOutput for StreamOutput<W> {
    fn playback(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)?;
        self.writer.flush()
    }
}

/// Keeps a cpal stream alive; dropping it stops the device.
/// Not `Send` — it stays on the thread that opened the device.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

/// Blocking input half of a cpal capture stream
pub struct CpalInput {
    rx: Receiver<Vec<u8>>,
    /// Bytes from the last chunk not yet handed out
    pending: Vec<u8>,
    pos: usize,
}

impl AudioInput for CpalInput {
    fn capture(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                // Stream handle dropped: treat as end of input
                Err(_) => return Ok(0),
            }
        }
        let take = buf.len().min(self.pending.len() - self.pos);
        buf[..take].copy_from_slice(&self.pending[self.pos..self.pos + take]);
        self.pos += take;
        Ok(take)
    }
}

/// Blocking output half of a cpal playback stream
pub struct CpalOutput {
    tx: Sender<Vec<u8>>,
}

impl AudioOutput for CpalOutput {
    fn playback(&mut self, buf: &[u8]) -> io::Result<()> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "playback stream closed"))
    }
}

fn stream_config(config: &AudioConfig) -> StreamConfig {
    StreamConfig {
        channels: config.channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

/// Open the default input device for capture
pub fn open_capture(config: &AudioConfig) -> Result<(StreamHandle, CpalInput), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AudioError::DeviceNotFound("no default input device".into()))?;

    let (tx, rx) = bounded::<Vec<u8>>(BRIDGE_CAPACITY);
    let stream = device
        .build_input_stream(
            &stream_config(config),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mut bytes = Vec::with_capacity(data.len() * 2);
                for sample in data {
                    bytes.extend_from_slice(&sample.to_le_bytes());
                }
                // The callback must never block; drop the chunk on overflow
                let _ = tx.try_send(bytes);
            },
            |err| tracing::error!("capture stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok((
        StreamHandle { _stream: stream },
        CpalInput {
            rx,
            pending: Vec::new(),
            pos: 0,
        },
    ))
}

/// Open the default output device for playback
pub fn open_playback(config: &AudioConfig) -> Result<(StreamHandle, CpalOutput), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceNotFound("no default output device".into()))?;

    let (tx, rx) = bounded::<Vec<u8>>(BRIDGE_CAPACITY);
    let mut pending: Vec<u8> = Vec::new();
    let mut pos = 0usize;

    let stream = device
        .build_output_stream(
            &stream_config(config),
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    if pos == pending.len() {
                        match rx.try_recv() {
                            Ok(chunk) => {
                                pending = chunk;
                                pos = 0;
                            }
                            // Underrun: play silence rather than stall
                            Err(_) => {
                                *sample = 0;
                                continue;
                            }
                        }
                    }
                    if pos + 2 <= pending.len() {
                        *sample = i16::from_le_bytes([pending[pos], pending[pos + 1]]);
                        pos += 2;
                    } else {
                        *sample = 0;
                        pos = pending.len();
                    }
                }
            },
            |err| tracing::error!("playback stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok((StreamHandle { _stream: stream }, CpalOutput { tx }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_input_reads_chunks() {
        let data: Vec<u8> = (0..32).collect();
        let mut input = StreamInput::new(io::Cursor::new(data.clone()));

        let mut buf = [0u8; 10];
        let mut collected = Vec::new();
        loop {
            let n = input.capture(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(collected, data);
    }

    #[test]
    fn test_stream_output_writes_all() {
        let mut sink = Vec::new();
        {
            let mut output = StreamOutput::new(&mut sink);
            output.playback(&[1, 2, 3]).unwrap();
            output.playback(&[4, 5]).unwrap();
        }
        assert_eq!(sink, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cpal_input_reassembles_chunks() {
        let (tx, rx) = bounded(4);
        let mut input = CpalInput {
            rx,
            pending: Vec::new(),
            pos: 0,
        };

        tx.send(vec![1, 2, 3, 4]).unwrap();
        drop(tx);

        let mut buf = [0u8; 3];
        assert_eq!(input.capture(&mut buf).unwrap(), 3);
        assert_eq!(&buf, &[1, 2, 3]);
        assert_eq!(input.capture(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 4);
        // Sender gone and nothing pending: end of input
        assert_eq!(input.capture(&mut buf).unwrap(), 0);
    }
}
