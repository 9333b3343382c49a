//! Drives the engine over a request's text, one segment at a time, and hands
//! every batch of samples to a caller-supplied `emit` as an [`AudioFrame`].

use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    audio::{AudioFrame, AudioResult},
    config::SynthesisConfig,
    engine::{GenerationParams, SynthesisEngine, Voice},
    error::SynthesisError,
    normalize::normalize_numbers,
    request::{clamp_speaker_id, SynthesisRequest, VoiceSelector},
    rtf::{RtfAccumulator, RtfReport},
    text::{single_segment, split_for_streaming, Segments},
};

/// Frame consumer handed to [`Synthesizer::synthesize`]. Returning `Break`
/// stops the current segment and skips the rest.
pub type FrameEmit<'a> = dyn Fn(AudioFrame) -> ControlFlow<()> + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub audio: AudioResult,
    pub status: StreamStatus,
    pub rtf: RtfReport,
    pub frames_emitted: u64,
}

impl SynthesisOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.status == StreamStatus::Cancelled
    }
}

/// Owns the engine handle and configuration for the lifetime of the host.
#[derive(Clone)]
pub struct Synthesizer {
    engine: Arc<dyn SynthesisEngine>,
    config: Arc<SynthesisConfig>,
}

impl Synthesizer {
    pub fn new(engine: Arc<dyn SynthesisEngine>, config: SynthesisConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    pub fn engine(&self) -> &dyn SynthesisEngine {
        self.engine.as_ref()
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    fn segments(&self, text: &str) -> Segments {
        let text = if self.config.normalize_numbers {
            normalize_numbers(text)
        } else {
            text.to_string()
        };
        if self.config.segmented {
            split_for_streaming(&text, self.config.max_chunk_len)
        } else {
            single_segment(&text)
        }
    }

    /// Synthesize `request`, emitting frames in production order.
    ///
    /// Voice preconditions are checked before the engine is touched. A stop
    /// (flag set, or `emit` returning `Break`) ends the stream with
    /// [`StreamStatus::Cancelled`]; an engine failure aborts it with an error.
    pub fn synthesize(
        &self,
        request: &SynthesisRequest,
        emit: &FrameEmit<'_>,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        request.check_voice(self.engine.as_ref())?;

        let engine = self.engine.as_ref();
        let sample_rate = engine.sample_rate();
        let voice = match request.voice() {
            VoiceSelector::Speaker(id) => {
                Voice::Speaker(clamp_speaker_id(*id, engine.num_speakers()))
            }
            VoiceSelector::ZeroShot(prompt) => Voice::ZeroShot(prompt),
        };
        let params = GenerationParams {
            speed: request.speed(),
            num_steps: self.config.zero_shot_steps,
        };
        let stop = request.stop_flag();

        let segments = self.segments(request.text());
        let total = segments.total();
        debug!(
            segments = total,
            zero_shot = matches!(voice, Voice::ZeroShot(_)),
            speed = params.speed,
            "starting synthesis"
        );

        let seq = AtomicU64::new(0);
        let halted = AtomicBool::new(false);
        let mut audio = AudioResult::empty(sample_rate);
        let mut acc = RtfAccumulator::new();
        let mut samples = Vec::with_capacity(total);

        for segment in segments {
            if stop.is_stopped() || halted.load(Ordering::SeqCst) {
                halted.store(true, Ordering::SeqCst);
                break;
            }

            let streamed = AtomicBool::new(false);
            let segment_emit = |batch: &[f32]| -> ControlFlow<()> {
                if halted.load(Ordering::SeqCst) || stop.is_stopped() {
                    halted.store(true, Ordering::SeqCst);
                    return ControlFlow::Break(());
                }
                streamed.store(true, Ordering::SeqCst);
                if batch.is_empty() {
                    return ControlFlow::Continue(());
                }
                let frame = AudioFrame::new(
                    seq.fetch_add(1, Ordering::SeqCst),
                    segment.index,
                    sample_rate,
                    batch.to_vec(),
                );
                let flow = emit(frame);
                if flow.is_break() {
                    halted.store(true, Ordering::SeqCst);
                }
                flow
            };

            let start = Instant::now();
            let result = engine
                .generate(&segment.text, voice, &params, &segment_emit)
                .map_err(|e| {
                    warn!(segment = segment.index, error = %e, "engine failed");
                    e
                })?;
            let processing_ms = start.elapsed().as_millis() as u64;

            if !streamed.load(Ordering::SeqCst) && !result.is_empty() {
                debug!(
                    segment = segment.index,
                    samples = result.samples.len(),
                    "engine returned a final buffer, emitting it in batches"
                );
                for batch in result.samples.chunks(self.config.fallback_frame_len.max(1)) {
                    if segment_emit(batch).is_break() {
                        break;
                    }
                }
            }

            let sample = acc.record(
                segment.index,
                total,
                &segment.text,
                result.duration_secs(),
                processing_ms,
            );
            debug!(
                segment = segment.index,
                audio_secs = sample.audio_secs,
                processing_ms,
                rtf = ?sample.rtf,
                "segment synthesized"
            );
            samples.push(sample);
            audio.append(result);
        }

        let status = if halted.load(Ordering::SeqCst) {
            StreamStatus::Cancelled
        } else {
            StreamStatus::Completed
        };
        let summary = acc.summarize();
        info!(
            ?status,
            segments = summary.segments,
            audio_secs = summary.total_audio_secs,
            processing_ms = summary.total_processing_ms,
            rtf = ?summary.overall_rtf,
            "synthesis finished"
        );

        Ok(SynthesisOutcome {
            audio,
            status,
            rtf: RtfReport { samples, summary },
            frames_emitted: seq.load(Ordering::SeqCst),
        })
    }
}
