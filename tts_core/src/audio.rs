use std::path::Path;

use tracing::{info, warn};

use crate::{error::WavError, wav};

/// A batch of mono samples in [-1.0, 1.0] moving from producer to sink.
///
/// Frames are not `Clone`: each one is owned by exactly one pipeline stage.
#[derive(Debug, PartialEq)]
pub struct AudioFrame {
    seq: u64,
    segment: usize,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(seq: u64, segment: usize, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            seq,
            segment,
            sample_rate,
            samples,
        }
    }

    /// Position of this frame in the request's output, starting at 0.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Index of the text segment that produced this frame.
    pub fn segment(&self) -> usize {
        self.segment
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Samples produced for a whole request (or segment) and their rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioResult {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Append another result's samples. Rates are expected to match.
    pub fn append(&mut self, other: AudioResult) {
        if self.sample_rate != other.sample_rate && !other.is_empty() {
            warn!(
                ours = self.sample_rate,
                theirs = other.sample_rate,
                "appending audio with a different sample rate"
            );
        }
        self.samples.extend(other.samples);
    }

    /// Persist as mono 16-bit WAV. `Ok(false)` when there is nothing to save.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<bool, WavError> {
        if self.is_empty() {
            return Ok(false);
        }
        wav::write_file(path.as_ref(), &self.samples, self.sample_rate)?;
        info!(
            path = %path.as_ref().display(),
            samples = self.samples.len(),
            "saved synthesized audio"
        );
        Ok(true)
    }
}
