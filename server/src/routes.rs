use std::{ops::ControlFlow, time::Instant};

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tts_core::{wav, RtfReport, StreamStatus, SynthesisRequest, VoiceSelector};

use crate::error::ApiError;
use crate::metrics::MetricsResponse;
use crate::validation::validate_tts_request;
use crate::AppState;

/// Speaker id as sent by clients: a number, or user-entered text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SpeakerInput {
    Id(i64),
    Text(String),
}

impl SpeakerInput {
    /// Text that is blank or not a number selects speaker 0.
    pub fn into_selector(self) -> VoiceSelector {
        match self {
            SpeakerInput::Id(id) => VoiceSelector::Speaker(id),
            SpeakerInput::Text(text) => VoiceSelector::speaker_from_input(&text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub speaker: Option<SpeakerInput>,
    pub speed: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct TtsResponse {
    pub audio_base64: String,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub status: StreamStatus,
    pub rtf: RtfReport,
}

#[derive(Debug, Serialize)]
pub struct EngineInfo {
    pub sample_rate: u32,
    pub num_speakers: u32,
    pub zero_shot: bool,
    pub has_prompt: bool,
    pub min_speed: f32,
    pub max_speed: f32,
    pub max_chunk_len: usize,
    pub segmented: bool,
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn engine_info(State(state): State<AppState>) -> Json<EngineInfo> {
    let engine = state.synth.engine();
    let config = state.synth.config();
    Json(EngineInfo {
        sample_rate: engine.sample_rate(),
        num_speakers: engine.num_speakers(),
        zero_shot: engine.is_zero_shot(),
        has_prompt: state.prompt.is_some(),
        min_speed: config.min_speed,
        max_speed: config.max_speed,
        max_chunk_len: config.max_chunk_len,
        segmented: config.segmented,
    })
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.metrics.snapshot())
}

/// Build a validated synthesis request for this server's engine. Zero-shot
/// engines always clone the configured prompt voice.
pub fn build_request(
    state: &AppState,
    text: &str,
    speaker: Option<SpeakerInput>,
    speed: Option<f32>,
) -> Result<SynthesisRequest, ApiError> {
    validate_tts_request(text)?;

    let voice = if state.synth.engine().is_zero_shot() {
        let prompt = state
            .prompt
            .as_deref()
            .cloned()
            .ok_or(tts_core::PreconditionError::MissingPromptAudio)?;
        VoiceSelector::ZeroShot(prompt)
    } else {
        speaker
            .map(SpeakerInput::into_selector)
            .unwrap_or_default()
    };

    let request = SynthesisRequest::new(text, voice, speed.unwrap_or(1.0), state.synth.config())?;
    request.check_voice(state.synth.engine())?;
    Ok(request)
}

pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    let started = Instant::now();
    let result = synthesize_whole(&state, req).await;

    let latency_ms = started.elapsed().as_millis() as u64;
    state.metrics.tts.record_request(latency_ms);
    if result.is_err() {
        state.metrics.tts.record_error();
    }
    result.map(Json)
}

async fn synthesize_whole(state: &AppState, req: TtsRequest) -> Result<TtsResponse, ApiError> {
    let request = build_request(state, &req.text, req.speaker, req.speed)?;
    let synth = state.synth.clone();

    // Using spawn_blocking to keep the engine off the async runtime
    let outcome = tokio::task::spawn_blocking(move || {
        synth.synthesize(&request, &|_| ControlFlow::Continue(()))
    })
    .await
    .map_err(|join_err| {
        error!("Task join error: {join_err}");
        ApiError::InternalError(format!("Task join error: {join_err}"))
    })??;

    state
        .metrics
        .synthesis
        .record(outcome.status, &outcome.rtf.summary, 0);

    let audio = &outcome.audio;
    let duration_ms = (audio.duration_secs() * 1000.0) as u64;
    info!(
        samples = audio.samples.len(),
        duration_ms,
        rtf = ?outcome.rtf.summary.overall_rtf,
        "tts request synthesized"
    );

    Ok(TtsResponse {
        audio_base64: wav::encode_base64(&audio.samples, audio.sample_rate),
        duration_ms,
        sample_rate: audio.sample_rate,
        status: outcome.status,
        rtf: outcome.rtf,
    })
}
