//! The synthesis engine capability.
//!
//! The core never constructs or configures an engine; it only calls the
//! operations below. Tests and alternative backends substitute their own
//! implementation of the trait.

use std::ops::ControlFlow;

use crate::{audio::AudioResult, error::EngineError, request::PromptAudio};

/// Per-batch callback handed to the engine.
///
/// `Continue` lets the engine keep producing; `Break` asks it to stop before
/// the next batch. It may be invoked from any thread the engine chooses.
pub type EmitFn<'a> = dyn Fn(&[f32]) -> ControlFlow<()> + Sync + 'a;

/// Voice handed to the engine after request validation.
#[derive(Debug, Clone, Copy)]
pub enum Voice<'a> {
    /// Preset speaker, already clamped to `[0, num_speakers)`.
    Speaker(u32),
    /// Clone the voice of a reference recording.
    ZeroShot(&'a PromptAudio),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Multiplier on the engine's default rate.
    pub speed: f32,
    /// Flow-matching steps for zero-shot engines; ignored otherwise.
    pub num_steps: u32,
}

pub trait SynthesisEngine: Send + Sync {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    fn num_speakers(&self) -> u32;

    fn is_zero_shot(&self) -> bool;

    /// Synthesize `text`, calling `emit` with each batch of samples as it is
    /// produced. Returns everything generated (engines that do not stream
    /// may return the full buffer without calling `emit`).
    fn generate(
        &self,
        text: &str,
        voice: Voice<'_>,
        params: &GenerationParams,
        emit: &EmitFn<'_>,
    ) -> Result<AudioResult, EngineError>;
}
