use thiserror::Error;

/// Malformed or unsupported WAV data.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("missing RIFF tag")]
    MissingRiff,

    #[error("missing WAVE form type")]
    NotWave,

    #[error("no 'fmt ' chunk before 'data'")]
    MissingFmt,

    #[error("no 'data' chunk found")]
    MissingData,

    #[error("unsupported bits per sample: {0}")]
    UnsupportedBitsPerSample(u16),

    #[error("invalid channel count: 0")]
    InvalidChannels,

    #[error("invalid sample rate: 0")]
    InvalidSampleRate,

    #[error("payload length {len} is not a multiple of block size {block_align}")]
    PayloadMisaligned { len: usize, block_align: usize },

    #[error("truncated chunk: '{0}'")]
    Truncated(String),

    #[error("wav io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A request that must not reach the engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PreconditionError {
    #[error("text cannot be empty")]
    EmptyText,

    #[error("speed {speed} outside allowed range [{min}, {max}]")]
    SpeedOutOfRange { speed: f32, min: f32, max: f32 },

    #[error("zero-shot synthesis requires prompt audio")]
    MissingPromptAudio,

    #[error("zero-shot synthesis requires prompt text")]
    MissingPromptText,

    #[error("prompt sample rate must be positive")]
    InvalidPromptSampleRate,

    #[error("voice mode does not match engine (zero-shot engine: {zero_shot_engine})")]
    VoiceModeMismatch { zero_shot_engine: bool },

    #[error("invalid speaker id: {0:?}")]
    InvalidSpeakerId(String),
}

/// Opaque failure reported by a synthesis engine.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("engine error: {message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure writing audio to a destination.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("audio device error: {0}")]
    Device(String),

    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink encode error: {0}")]
    Encode(#[from] hound::Error),

    #[error("sink already stopped")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("producer thread panicked")]
    ProducerPanicked,
}

impl From<PreconditionError> for PipelineError {
    fn from(e: PreconditionError) -> Self {
        PipelineError::Synthesis(SynthesisError::Precondition(e))
    }
}
