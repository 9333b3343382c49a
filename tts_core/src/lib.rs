//! Streaming text-to-speech core: text segmentation, a synthesis producer
//! driving an injected engine, an ordered frame channel, audio sinks, WAV
//! encoding and real-time-factor accounting.

pub mod audio;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod producer;
pub mod request;
pub mod rtf;
pub mod sink;
pub mod text;
pub mod wav;

#[cfg(feature = "playback")]
pub mod device;
#[cfg(feature = "piper")]
pub mod piper;

pub use audio::{AudioFrame, AudioResult};
pub use channel::{audio_channel, FrameReceiver, FrameSender, SendError};
pub use config::SynthesisConfig;
pub use engine::{EmitFn, GenerationParams, SynthesisEngine, Voice};
pub use error::{
    EngineError, PipelineError, PreconditionError, SinkError, SynthesisError, WavError,
};
pub use normalize::normalize_numbers;
pub use pipeline::{StreamReport, StreamingPipeline};
pub use producer::{FrameEmit, StreamStatus, SynthesisOutcome, Synthesizer};
pub use request::{PromptAudio, StopFlag, SynthesisRequest, VoiceSelector};
pub use rtf::{RtfAccumulator, RtfReport, RtfSample, RtfSummary};
pub use sink::{AudioSink, MemorySink, Pcm16ChunkSink, WavFileSink};
pub use text::{split_for_streaming, TextSegment};

#[cfg(feature = "playback")]
pub use device::DeviceSink;
#[cfg(feature = "piper")]
pub use piper::PiperEngine;
