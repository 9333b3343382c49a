//! Common utilities for integration tests

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    ops::ControlFlow,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use axum::Router;
use stream_server::{config::ServerConfig, router, AppState};
use tokio::net::TcpListener;
use tts_core::{
    AudioResult, EmitFn, EngineError, GenerationParams, PromptAudio, SynthesisConfig,
    SynthesisEngine, Synthesizer, Voice,
};

pub const SAMPLE_RATE: u32 = 16000;
pub const BATCH_LEN: usize = 800;
pub const BATCHES_PER_SEGMENT: usize = 2;

/// Engine double: two constant batches per segment.
pub struct MockEngine {
    pub zero_shot: bool,
    pub fail: bool,
    pub delay: Option<Duration>,
    calls: AtomicUsize,
    speakers: Mutex<Vec<u32>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            zero_shot: false,
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
            speakers: Mutex::new(Vec::new()),
        }
    }

    pub fn zero_shot() -> Self {
        Self {
            zero_shot: true,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Speaker ids seen by `generate`, in call order.
    pub fn speakers(&self) -> Vec<u32> {
        self.speakers.lock().unwrap().clone()
    }
}

impl SynthesisEngine for MockEngine {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn num_speakers(&self) -> u32 {
        2
    }

    fn is_zero_shot(&self) -> bool {
        self.zero_shot
    }

    fn generate(
        &self,
        _text: &str,
        voice: Voice<'_>,
        _params: &GenerationParams,
        emit: &EmitFn<'_>,
    ) -> Result<AudioResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Voice::Speaker(id) = voice {
            self.speakers.lock().unwrap().push(id);
        }
        if self.fail {
            return Err(EngineError::new("mock engine failure"));
        }

        let mut all = Vec::new();
        for _ in 0..BATCHES_PER_SEGMENT {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            let batch = vec![0.25f32; BATCH_LEN];
            all.extend_from_slice(&batch);
            if let ControlFlow::Break(()) = emit(&batch) {
                break;
            }
        }
        Ok(AudioResult::new(all, SAMPLE_RATE))
    }
}

pub fn prompt() -> PromptAudio {
    PromptAudio::new("参考文本。", vec![0.1; 1600], SAMPLE_RATE)
}

pub fn test_state(engine: Arc<MockEngine>, prompt: Option<PromptAudio>) -> AppState {
    let synth = Synthesizer::new(engine, SynthesisConfig::default());
    AppState::new(synth, prompt, ServerConfig::default())
}

/// Create a test app instance
pub fn create_test_app() -> Router {
    router(test_state(Arc::new(MockEngine::new()), None))
}

pub fn create_app_with(engine: Arc<MockEngine>, prompt: Option<PromptAudio>) -> Router {
    router(test_state(engine, prompt))
}

/// Serve `state` on an ephemeral local port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}
