//! Destinations for synthesized frames.
//!
//! Writes block until the destination has accepted every sample, so a slow
//! sink paces the whole pipeline through the channel's backpressure.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, warn};

use crate::{audio::AudioFrame, error::SinkError, wav::float_to_pcm16_bytes};

pub trait AudioSink {
    /// Drop anything buffered from a previous request and get ready to play.
    fn reset(&mut self) -> Result<(), SinkError>;

    /// Deliver every sample of `frame`, blocking until accepted.
    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError>;

    /// Halt output immediately and release resources. Never fails.
    fn stop(&mut self);

    /// Called once after the last frame of a request that ran to completion.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps frames in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<AudioFrame>,
    stopped: bool,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[AudioFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<AudioFrame> {
        self.frames
    }

    /// All samples concatenated in arrival order.
    pub fn samples(&self) -> Vec<f32> {
        self.frames
            .iter()
            .flat_map(|f| f.samples().iter().copied())
            .collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl AudioSink for MemorySink {
    fn reset(&mut self) -> Result<(), SinkError> {
        self.frames.clear();
        self.stopped = false;
        self.finished = false;
        Ok(())
    }

    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        if self.stopped {
            return Err(SinkError::Closed);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}

type FileWriter = WavWriter<BufWriter<File>>;

/// Streams frames into a mono 16-bit WAV file as they arrive.
pub struct WavFileSink {
    path: PathBuf,
    sample_rate: u32,
    writer: Option<FileWriter>,
    samples_written: usize,
}

impl WavFileSink {
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let writer = Self::open(&path, sample_rate)?;
        Ok(Self {
            path,
            sample_rate,
            writer: Some(writer),
            samples_written: 0,
        })
    }

    fn open(path: &Path, sample_rate: u32) -> Result<FileWriter, SinkError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(WavWriter::create(path, spec)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            debug!(path = %self.path.display(), samples = self.samples_written, "wav file finalized");
        }
        Ok(())
    }
}

impl AudioSink for WavFileSink {
    fn reset(&mut self) -> Result<(), SinkError> {
        // Drop the old writer before truncating the file it points at.
        self.writer = None;
        self.writer = Some(Self::open(&self.path, self.sample_rate)?);
        self.samples_written = 0;
        Ok(())
    }

    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        if frame.sample_rate() != self.sample_rate {
            warn!(
                frame_rate = frame.sample_rate(),
                file_rate = self.sample_rate,
                "frame sample rate differs from file"
            );
        }
        for &s in frame.samples() {
            writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16)?;
        }
        self.samples_written += frame.len();
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = self.finalize() {
            warn!(path = %self.path.display(), error = %e, "failed to finalize wav file");
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.finalize()
    }
}

/// Default chunk size for [`Pcm16ChunkSink`], in bytes.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8192;

/// Converts frames to little-endian PCM16 and hands them to a platform
/// callback in pieces of at most `max_buffer_size` bytes.
pub struct Pcm16ChunkSink<F>
where
    F: FnMut(&[u8]) -> Result<(), SinkError>,
{
    callback: F,
    max_buffer_size: usize,
    stopped: bool,
}

impl<F> Pcm16ChunkSink<F>
where
    F: FnMut(&[u8]) -> Result<(), SinkError>,
{
    pub fn new(max_buffer_size: usize, callback: F) -> Self {
        // Keep chunks on a sample boundary.
        let max_buffer_size = (max_buffer_size.max(2) / 2) * 2;
        Self {
            callback,
            max_buffer_size,
            stopped: false,
        }
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }
}

impl<F> AudioSink for Pcm16ChunkSink<F>
where
    F: FnMut(&[u8]) -> Result<(), SinkError>,
{
    fn reset(&mut self) -> Result<(), SinkError> {
        self.stopped = false;
        Ok(())
    }

    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        if self.stopped {
            return Err(SinkError::Closed);
        }
        let bytes = float_to_pcm16_bytes(frame.samples());
        for chunk in bytes.chunks(self.max_buffer_size) {
            (self.callback)(chunk)?;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
