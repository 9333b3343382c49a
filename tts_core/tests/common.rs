//! Shared fakes for the pipeline integration tests

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use tts_core::{
    AudioFrame, AudioResult, AudioSink, EmitFn, EngineError, GenerationParams, MemorySink,
    SinkError, StopFlag, SynthesisConfig, SynthesisEngine, Synthesizer, Voice,
};

/// Engine double that produces `batches` tagged batches per call and counts
/// every invocation.
pub struct ScriptedEngine {
    pub sample_rate: u32,
    pub num_speakers: u32,
    pub zero_shot: bool,
    pub streams: bool,
    pub batches: usize,
    pub batch_len: usize,
    pub batch_delay: Option<Duration>,
    pub fail_on_call: Option<usize>,
    calls: AtomicUsize,
    next_tag: AtomicU64,
    texts: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(batches: usize, batch_len: usize) -> Self {
        Self {
            sample_rate: 16000,
            num_speakers: 2,
            zero_shot: false,
            streams: true,
            batches,
            batch_len,
            batch_delay: None,
            fail_on_call: None,
            calls: AtomicUsize::new(0),
            next_tag: AtomicU64::new(1),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn zero_shot(mut self, streams: bool) -> Self {
        self.zero_shot = true;
        self.streams = streams;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    /// Fail on the n-th call (1-based), after emitting nothing for it.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

/// Sample value carried by the n-th batch produced.
pub fn tag_value(tag: u64) -> f32 {
    (tag as f32) / 10_000.0
}

impl SynthesisEngine for ScriptedEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn num_speakers(&self) -> u32 {
        self.num_speakers
    }

    fn is_zero_shot(&self) -> bool {
        self.zero_shot
    }

    fn generate(
        &self,
        text: &str,
        _voice: Voice<'_>,
        _params: &GenerationParams,
        emit: &EmitFn<'_>,
    ) -> Result<AudioResult, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail_on_call == Some(call) {
            return Err(EngineError::new(format!("scripted failure on call {call}")));
        }

        let mut out = Vec::new();
        for _ in 0..self.batches {
            if let Some(delay) = self.batch_delay {
                thread::sleep(delay);
            }
            let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
            let batch = vec![tag_value(tag); self.batch_len];
            out.extend_from_slice(&batch);
            if self.streams && emit(&batch).is_break() {
                break;
            }
        }
        Ok(AudioResult::new(out, self.sample_rate))
    }
}

pub fn synthesizer(engine: Arc<ScriptedEngine>, config: SynthesisConfig) -> Synthesizer {
    Synthesizer::new(engine, config)
}

/// Memory sink that sleeps on every write.
pub struct SlowSink {
    pub inner: MemorySink,
    pub delay: Duration,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemorySink::new(),
            delay,
        }
    }
}

impl AudioSink for SlowSink {
    fn reset(&mut self) -> Result<(), SinkError> {
        self.inner.reset()
    }

    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        thread::sleep(self.delay);
        self.inner.write(frame)
    }

    fn stop(&mut self) {
        self.inner.stop()
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.inner.finish()
    }
}

/// Requests a stop after `after` frames have been written, like a user
/// pressing stop mid-playback.
pub struct StoppingSink {
    pub inner: MemorySink,
    pub stop: StopFlag,
    pub after: usize,
}

impl AudioSink for StoppingSink {
    fn reset(&mut self) -> Result<(), SinkError> {
        self.inner.reset()
    }

    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        self.inner.write(frame)?;
        if self.inner.frames().len() == self.after {
            self.stop.request_stop();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.inner.stop()
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.inner.finish()
    }
}

/// Fails the n-th write (1-based) with a device error.
pub struct FailingSink {
    pub inner: MemorySink,
    pub fail_on: usize,
    pub fail_finish: bool,
    writes: usize,
    pub stopped: bool,
}

impl FailingSink {
    pub fn new(fail_on: usize) -> Self {
        Self {
            inner: MemorySink::new(),
            fail_on,
            fail_finish: false,
            writes: 0,
            stopped: false,
        }
    }

    /// Accepts every write, then fails to flush.
    pub fn on_finish() -> Self {
        Self {
            fail_finish: true,
            ..Self::new(0)
        }
    }
}

impl AudioSink for FailingSink {
    fn reset(&mut self) -> Result<(), SinkError> {
        self.inner.reset()
    }

    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        self.writes += 1;
        if self.writes == self.fail_on {
            return Err(SinkError::Device("device unplugged".into()));
        }
        self.inner.write(frame)
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.inner.stop()
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if self.fail_finish {
            return Err(SinkError::Device("flush failed".into()));
        }
        self.inner.finish()
    }
}
