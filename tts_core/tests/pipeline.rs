//! End-to-end tests for the producer -> channel -> sink pipeline

mod common;

use std::{sync::Arc, time::Duration};

use tts_core::{
    wav, MemorySink, Pcm16ChunkSink, PipelineError, PreconditionError, PromptAudio,
    StreamStatus, StreamingPipeline, SynthesisConfig, SynthesisError, SynthesisRequest,
    VoiceSelector, WavFileSink,
};

use common::*;

const TEXT: &str = "The first sentence is here. A second one follows! And a third?";

fn pipeline(engine: &Arc<ScriptedEngine>, config: SynthesisConfig) -> StreamingPipeline {
    StreamingPipeline::new(synthesizer(engine.clone(), config))
}

fn request(text: &str, voice: VoiceSelector) -> SynthesisRequest {
    SynthesisRequest::new(text, voice, 1.0, &SynthesisConfig::default()).unwrap()
}

#[test]
fn test_frames_arrive_in_order_with_slow_sink() {
    let engine = Arc::new(ScriptedEngine::new(4, 32));
    let config = SynthesisConfig {
        channel_capacity: 2,
        ..SynthesisConfig::default()
    };
    let pipeline = pipeline(&engine, config);
    let mut sink = SlowSink::new(Duration::from_millis(2));

    let report = pipeline
        .run(&request(TEXT, VoiceSelector::Speaker(0)), &mut sink)
        .unwrap();

    assert_eq!(report.status, StreamStatus::Completed);
    assert_eq!(engine.calls(), 3);
    assert_eq!(report.frames_emitted, 12);
    assert_eq!(report.frames_written, 12);
    assert_eq!(report.frames_discarded, 0);
    assert!(sink.inner.is_finished());

    let frames = sink.inner.frames();
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.seq(), i as u64);
        assert_eq!(frame.segment(), i / 4);
        assert!(frame.samples().iter().all(|&s| s == tag_value(i as u64 + 1)));
    }
    assert_eq!(sink.inner.samples(), report.audio.samples);
}

#[test]
fn test_fast_sink_slow_engine_keeps_order() {
    let engine = Arc::new(ScriptedEngine::new(5, 8).with_delay(Duration::from_millis(1)));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let mut sink = MemorySink::new();

    let report = pipeline
        .run(&request(TEXT, VoiceSelector::Speaker(1)), &mut sink)
        .unwrap();

    let seqs: Vec<u64> = sink.frames().iter().map(|f| f.seq()).collect();
    assert_eq!(seqs, (0..15).collect::<Vec<_>>());
    assert_eq!(report.rtf.samples.len(), 3);
    assert_eq!(report.rtf.summary.segments, 3);
}

#[test]
fn test_stop_mid_stream_terminates_without_deadlock() {
    let engine = Arc::new(ScriptedEngine::new(200, 16));
    let config = SynthesisConfig {
        channel_capacity: 1,
        ..SynthesisConfig::default()
    };
    let pipeline = pipeline(&engine, config);
    let req = request(TEXT, VoiceSelector::Speaker(0));
    let mut sink = StoppingSink {
        inner: MemorySink::new(),
        stop: req.stop_flag().clone(),
        after: 3,
    };

    let report = pipeline.run(&req, &mut sink).unwrap();

    assert_eq!(report.status, StreamStatus::Cancelled);
    assert_eq!(report.frames_written, 3);
    assert_eq!(sink.inner.frames().len(), 3);
    assert!(sink.inner.is_stopped());
    assert!(!sink.inner.is_finished());
    // the producer never starts the next segment after a stop
    assert_eq!(engine.calls(), 1);
    assert!(report.frames_emitted < 200);
}

#[test]
fn test_stop_before_run_produces_nothing() {
    let engine = Arc::new(ScriptedEngine::new(3, 16));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let req = request(TEXT, VoiceSelector::Speaker(0));
    req.stop_flag().request_stop();
    let mut sink = MemorySink::new();

    let report = pipeline.run(&req, &mut sink).unwrap();

    assert_eq!(report.status, StreamStatus::Cancelled);
    assert_eq!(report.frames_written, 0);
    assert_eq!(engine.calls(), 0);
}

#[test]
fn test_zero_shot_without_prompt_audio_never_calls_engine() {
    let engine = Arc::new(ScriptedEngine::new(3, 16).zero_shot(true));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let prompt = PromptAudio::new("reference transcript", Vec::new(), 16000);
    let mut sink = MemorySink::new();

    let err = pipeline
        .run(&request(TEXT, VoiceSelector::ZeroShot(prompt)), &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Synthesis(SynthesisError::Precondition(
            PreconditionError::MissingPromptAudio
        ))
    ));
    assert_eq!(engine.calls(), 0);
    assert!(sink.frames().is_empty());
}

#[test]
fn test_voice_mode_mismatch_is_rejected() {
    let engine = Arc::new(ScriptedEngine::new(1, 16));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let prompt = PromptAudio::new("reference", vec![0.1; 100], 16000);

    let err = pipeline
        .run(&request(TEXT, VoiceSelector::ZeroShot(prompt)), &mut MemorySink::new())
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Synthesis(SynthesisError::Precondition(
            PreconditionError::VoiceModeMismatch {
                zero_shot_engine: false
            }
        ))
    ));
    assert_eq!(engine.calls(), 0);
}

#[test]
fn test_engine_error_keeps_delivered_frames() {
    let engine = Arc::new(ScriptedEngine::new(2, 16).failing_on(2));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let mut sink = MemorySink::new();

    let err = pipeline
        .run(&request(TEXT, VoiceSelector::Speaker(0)), &mut sink)
        .unwrap_err();

    assert!(matches!(err, PipelineError::Synthesis(SynthesisError::Engine(_))));
    assert_eq!(engine.calls(), 2);
    // segment 0 frames were already delivered before the failure
    assert_eq!(sink.frames().len(), 2);
    assert!(sink.frames().iter().all(|f| f.segment() == 0));
    assert!(sink.is_stopped());
}

#[test]
fn test_sink_error_stops_stream() {
    let engine = Arc::new(ScriptedEngine::new(50, 16));
    let config = SynthesisConfig {
        channel_capacity: 1,
        ..SynthesisConfig::default()
    };
    let pipeline = pipeline(&engine, config);
    let req = request(TEXT, VoiceSelector::Speaker(0));
    let mut sink = FailingSink::new(2);

    let err = pipeline.run(&req, &mut sink).unwrap_err();

    assert!(matches!(err, PipelineError::Sink(_)));
    assert!(sink.stopped);
    assert!(req.stop_flag().is_stopped());
    assert_eq!(sink.inner.frames().len(), 1);
    assert_eq!(engine.calls(), 1);
}

#[test]
fn test_finish_error_stops_sink() {
    let engine = Arc::new(ScriptedEngine::new(2, 16));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let mut sink = FailingSink::on_finish();

    let err = pipeline
        .run(&request(TEXT, VoiceSelector::Speaker(0)), &mut sink)
        .unwrap_err();

    assert!(matches!(err, PipelineError::Sink(_)));
    assert!(sink.stopped);
    assert!(sink.inner.is_stopped());
    assert_eq!(sink.inner.frames().len(), 6);
}

#[test]
fn test_non_streaming_zero_shot_engine_is_delivered_in_batches() {
    let engine = Arc::new(ScriptedEngine::new(1, 10_000).zero_shot(false));
    let config = SynthesisConfig {
        segmented: false,
        fallback_frame_len: 4096,
        ..SynthesisConfig::default()
    };
    let pipeline = pipeline(&engine, config);
    let prompt = PromptAudio::new("reference", vec![0.1; 100], 16000);
    let mut sink = MemorySink::new();

    let report = pipeline
        .run(&request(TEXT, VoiceSelector::ZeroShot(prompt)), &mut sink)
        .unwrap();

    assert_eq!(engine.calls(), 1);
    let lens: Vec<usize> = sink.frames().iter().map(|f| f.len()).collect();
    assert_eq!(lens, vec![4096, 4096, 1808]);
    assert_eq!(report.audio.samples.len(), 10_000);
    assert_eq!(report.status, StreamStatus::Completed);
}

#[test]
fn test_reset_discards_previous_request_audio() {
    let engine = Arc::new(ScriptedEngine::new(2, 8));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let mut sink = MemorySink::new();

    pipeline
        .run(&request(TEXT, VoiceSelector::Speaker(0)), &mut sink)
        .unwrap();
    assert_eq!(sink.frames().len(), 6);

    pipeline
        .run(&request("Just one.", VoiceSelector::Speaker(0)), &mut sink)
        .unwrap();
    assert_eq!(sink.frames().len(), 2);
    assert_eq!(sink.frames()[0].seq(), 0);
}

#[test]
fn test_wav_file_sink_matches_saved_result() {
    let dir = tempfile::tempdir().unwrap();
    let streamed = dir.path().join("streamed.wav");
    let saved = dir.path().join("generated.wav");

    let engine = Arc::new(ScriptedEngine::new(3, 400));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let mut sink = WavFileSink::create(&streamed, 16000).unwrap();

    let report = pipeline
        .run(&request(TEXT, VoiceSelector::Speaker(0)), &mut sink)
        .unwrap();
    assert!(report.audio.save(&saved).unwrap());

    let (a, rate_a) = wav::read_file(&streamed).unwrap();
    let (b, rate_b) = wav::read_file(&saved).unwrap();
    assert_eq!(rate_a, 16000);
    assert_eq!(rate_b, 16000);
    assert_eq!(a.len(), 3 * 3 * 400);
    assert_eq!(a, b);
}

#[test]
fn test_pcm16_sink_receives_bounded_chunks() {
    let engine = Arc::new(ScriptedEngine::new(2, 1000));
    let pipeline = pipeline(&engine, SynthesisConfig::default());
    let mut chunks: Vec<usize> = Vec::new();
    {
        let mut sink = Pcm16ChunkSink::new(512, |chunk: &[u8]| {
            chunks.push(chunk.len());
            Ok(())
        });
        pipeline
            .run(&request("Only one sentence.", VoiceSelector::Speaker(0)), &mut sink)
            .unwrap();
    }
    assert!(chunks.iter().all(|&len| len <= 512));
    assert_eq!(chunks.iter().sum::<usize>(), 2 * 1000 * 2);
}

#[test]
fn test_number_normalization_reaches_engine() {
    let engine = Arc::new(ScriptedEngine::new(1, 8));
    let config = SynthesisConfig {
        normalize_numbers: true,
        ..SynthesisConfig::default()
    };
    let pipeline = pipeline(&engine, config);

    pipeline
        .run(&request("气温25℃。", VoiceSelector::Speaker(0)), &mut MemorySink::new())
        .unwrap();

    assert_eq!(engine.texts(), vec!["气温二十五摄氏度。".to_string()]);
}
