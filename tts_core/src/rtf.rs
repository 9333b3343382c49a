//! Real-time factor accounting: processing time divided by produced audio
//! duration. Below 1.0 means faster than real time.

use std::fmt;

use serde::Serialize;

/// `None` when no audio was produced (the ratio is undefined).
pub fn real_time_factor(processing_ms: u64, audio_secs: f64) -> Option<f64> {
    if audio_secs > 0.0 && audio_secs.is_finite() {
        Some(processing_ms as f64 / 1000.0 / audio_secs)
    } else {
        None
    }
}

fn fmt_rtf(rtf: Option<f64>) -> String {
    match rtf {
        Some(v) => format!("{v:.2}"),
        None => "undefined".to_string(),
    }
}

/// Timing of one synthesized segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtfSample {
    pub segment_index: usize,
    pub total_segments: usize,
    pub text: String,
    pub audio_secs: f64,
    pub processing_ms: u64,
    pub rtf: Option<f64>,
}

impl fmt::Display for RtfSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Chunk {}/{}", self.segment_index + 1, self.total_segments)?;
        writeln!(f, "Text: \"{}\"", self.text)?;
        writeln!(f, "Audio Duration: {:.2}s", self.audio_secs)?;
        writeln!(f, "Processing Time: {}ms", self.processing_ms)?;
        write!(f, "RTF: {}", fmt_rtf(self.rtf))
    }
}

/// Totals over a whole request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RtfSummary {
    pub segments: usize,
    pub total_audio_secs: f64,
    pub total_processing_ms: u64,
    pub overall_rtf: Option<f64>,
}

impl fmt::Display for RtfSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RTF Streaming Results (Complete)")?;
        writeln!(f, "Total Audio Duration: {:.2}s", self.total_audio_secs)?;
        writeln!(f, "Total Processing Time: {}ms", self.total_processing_ms)?;
        writeln!(f, "Overall RTF: {}", fmt_rtf(self.overall_rtf))?;
        write!(f, "(RTF < 1.0 = faster than real-time)")
    }
}

/// Per-segment samples plus the final summary for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RtfReport {
    pub samples: Vec<RtfSample>,
    pub summary: RtfSummary,
}

/// Running totals across one request. Past samples are never mutated.
#[derive(Debug, Clone, Default)]
pub struct RtfAccumulator {
    segments: usize,
    total_audio_secs: f64,
    total_processing_ms: u64,
}

impl RtfAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        segment_index: usize,
        total_segments: usize,
        text: &str,
        audio_secs: f64,
        processing_ms: u64,
    ) -> RtfSample {
        let audio_secs = if audio_secs.is_finite() { audio_secs.max(0.0) } else { 0.0 };
        self.segments += 1;
        self.total_audio_secs += audio_secs;
        self.total_processing_ms += processing_ms;

        RtfSample {
            segment_index,
            total_segments,
            text: text.to_string(),
            audio_secs,
            processing_ms,
            rtf: real_time_factor(processing_ms, audio_secs),
        }
    }

    pub fn summarize(&self) -> RtfSummary {
        RtfSummary {
            segments: self.segments,
            total_audio_secs: self.total_audio_secs,
            total_processing_ms: self.total_processing_ms,
            overall_rtf: real_time_factor(self.total_processing_ms, self.total_audio_secs),
        }
    }
}
