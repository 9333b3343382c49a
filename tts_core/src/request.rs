use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::info;

use crate::{
    config::SynthesisConfig,
    engine::SynthesisEngine,
    error::{PreconditionError, WavError},
    wav,
};

/// Shared cooperative cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    stopped: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Reference recording and transcript for voice cloning.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptAudio {
    pub text: String,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PromptAudio {
    pub fn new(text: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            text: text.into(),
            samples,
            sample_rate,
        }
    }

    /// Load the prompt recording from a WAV file (downmixed to mono).
    pub fn from_wav_file<P: AsRef<Path>>(text: impl Into<String>, path: P) -> Result<Self, WavError> {
        let (samples, sample_rate) = wav::read_file(path.as_ref())?;
        info!(
            path = %path.as_ref().display(),
            sample_rate,
            samples = samples.len(),
            "loaded prompt audio"
        );
        Ok(Self::new(text, samples, sample_rate))
    }

    pub fn check(&self) -> Result<(), PreconditionError> {
        if self.samples.is_empty() {
            return Err(PreconditionError::MissingPromptAudio);
        }
        if self.text.trim().is_empty() {
            return Err(PreconditionError::MissingPromptText);
        }
        if self.sample_rate == 0 {
            return Err(PreconditionError::InvalidPromptSampleRate);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceSelector {
    /// Preset speaker id; clamped into the engine's range at synthesis time.
    Speaker(i64),
    ZeroShot(PromptAudio),
}

impl VoiceSelector {
    /// Parse user-entered speaker id text. Blank or non-numeric input falls back to 0.
    pub fn speaker_from_input(input: &str) -> Self {
        match parse_speaker_id(input) {
            Ok(id) => VoiceSelector::Speaker(id),
            Err(_) => {
                info!(input, "invalid speaker id input, using 0");
                VoiceSelector::Speaker(0)
            }
        }
    }
}

impl Default for VoiceSelector {
    fn default() -> Self {
        VoiceSelector::Speaker(0)
    }
}

/// Strict speaker id parser; see [`VoiceSelector::speaker_from_input`] for the lenient one.
pub fn parse_speaker_id(input: &str) -> Result<i64, PreconditionError> {
    input
        .trim()
        .parse::<i64>()
        .map_err(|_| PreconditionError::InvalidSpeakerId(input.to_string()))
}

/// Clamp a requested speaker id into `[0, num_speakers)`.
pub fn clamp_speaker_id(id: i64, num_speakers: u32) -> u32 {
    if num_speakers == 0 {
        return 0;
    }
    id.clamp(0, num_speakers as i64 - 1) as u32
}

/// One user "start" action: text, voice, speed and its stop flag.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    text: String,
    voice: VoiceSelector,
    speed: f32,
    stop: StopFlag,
}

impl SynthesisRequest {
    /// Validate the request-level fields against the configured limits.
    pub fn new(
        text: impl Into<String>,
        voice: VoiceSelector,
        speed: f32,
        config: &SynthesisConfig,
    ) -> Result<Self, PreconditionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PreconditionError::EmptyText);
        }
        if !config.speed_in_range(speed) {
            return Err(PreconditionError::SpeedOutOfRange {
                speed,
                min: config.min_speed,
                max: config.max_speed,
            });
        }
        Ok(Self {
            text,
            voice,
            speed,
            stop: StopFlag::new(),
        })
    }

    /// Share an existing stop flag (e.g. one owned by a UI or connection).
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &VoiceSelector {
        &self.voice
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    /// Check the voice against what the engine supports. Runs before any engine call.
    pub fn check_voice(&self, engine: &dyn SynthesisEngine) -> Result<(), PreconditionError> {
        let zero_shot_engine = engine.is_zero_shot();
        match &self.voice {
            VoiceSelector::ZeroShot(prompt) if zero_shot_engine => prompt.check(),
            VoiceSelector::Speaker(_) if !zero_shot_engine => Ok(()),
            _ => Err(PreconditionError::VoiceModeMismatch { zero_shot_engine }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_shared() {
        let a = StopFlag::new();
        let b = a.clone();
        assert!(!b.is_stopped());
        a.request_stop();
        assert!(b.is_stopped());
    }

    #[test]
    fn test_speaker_input_fallback() {
        assert_eq!(VoiceSelector::speaker_from_input("3"), VoiceSelector::Speaker(3));
        assert_eq!(VoiceSelector::speaker_from_input(" 7 "), VoiceSelector::Speaker(7));
        assert_eq!(VoiceSelector::speaker_from_input(""), VoiceSelector::Speaker(0));
        assert_eq!(VoiceSelector::speaker_from_input("abc"), VoiceSelector::Speaker(0));
        assert!(parse_speaker_id("x").is_err());
    }

    #[test]
    fn test_clamp_speaker_id() {
        assert_eq!(clamp_speaker_id(5, 3), 2);
        assert_eq!(clamp_speaker_id(-1, 3), 0);
        assert_eq!(clamp_speaker_id(1, 3), 1);
        assert_eq!(clamp_speaker_id(9, 0), 0);
    }

    #[test]
    fn test_request_validation() {
        let config = SynthesisConfig::default();
        assert_eq!(
            SynthesisRequest::new("  ", VoiceSelector::default(), 1.0, &config).unwrap_err(),
            PreconditionError::EmptyText
        );
        assert!(matches!(
            SynthesisRequest::new("hi", VoiceSelector::default(), 5.0, &config),
            Err(PreconditionError::SpeedOutOfRange { .. })
        ));
        let req = SynthesisRequest::new("hi", VoiceSelector::Speaker(2), 1.5, &config).unwrap();
        assert_eq!(req.text(), "hi");
        assert_eq!(req.speed(), 1.5);
        assert!(!req.stop_flag().is_stopped());
    }

    #[test]
    fn test_prompt_checks() {
        assert_eq!(
            PromptAudio::new("text", vec![], 16000).check(),
            Err(PreconditionError::MissingPromptAudio)
        );
        assert_eq!(
            PromptAudio::new(" ", vec![0.1], 16000).check(),
            Err(PreconditionError::MissingPromptText)
        );
        assert_eq!(
            PromptAudio::new("text", vec![0.1], 0).check(),
            Err(PreconditionError::InvalidPromptSampleRate)
        );
        assert!(PromptAudio::new("text", vec![0.1], 16000).check().is_ok());
    }
}
