//! WebSocket streaming endpoint.
//!
//! Protocol: the client sends one JSON text message
//! `{"text": "...", "speaker": 0, "speed": 1.0}`. The server answers with
//! JSON text messages (`status`, `metadata`, `rtf`, and finally one of
//! `complete` / `cancelled` / `error`) and binary messages carrying
//! little-endian PCM16 mono audio, one per frame, in production order.
//! Sending `stop` (or `{"type":"stop"}`), or disconnecting, cancels the
//! stream.

use std::{ops::ControlFlow, time::Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use tts_core::{audio_channel, wav::float_to_pcm16_bytes, AudioFrame, StopFlag, StreamStatus};

use crate::error::ApiError;
use crate::routes::{build_request, SpeakerInput};
use crate::validation::is_stop_message;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub text: String,
    pub speaker: Option<SpeakerInput>,
    pub speed: Option<f32>,
}

type WsSender = SplitSink<WebSocket, Message>;

pub async fn stream_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(sender: &mut WsSender, value: serde_json::Value) -> bool {
    sender
        .send(Message::Text(value.to_string().into()))
        .await
        .is_ok()
}

async fn send_error(sender: &mut WsSender, err: &ApiError) {
    let body = err.body();
    let _ = send_json(
        sender,
        json!({ "type": "error", "error": body.error, "code": body.code }),
    )
    .await;
}

/// Wait for the client's request message.
async fn read_request(receiver: &mut SplitStream<WebSocket>) -> Result<StreamRequest, ApiError> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                return serde_json::from_str(text.as_str())
                    .map_err(|e| ApiError::InvalidInput(format!("Invalid stream request: {e}")));
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        }
    }
    Err(ApiError::InvalidInput("connection closed before a request was sent".into()))
}

/// Set `stop` when the client asks for it or goes away.
async fn watch_for_stop(mut receiver: SplitStream<WebSocket>, stop: StopFlag) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) if is_stop_message(text.as_str()) => {
                info!("client requested stop");
                break;
            }
            Ok(Message::Close(_)) | Err(_) => {
                debug!("client disconnected");
                break;
            }
            Ok(_) => {}
        }
    }
    stop.request_stop();
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let started = Instant::now();
    let (mut sender, mut receiver) = socket.split();

    let request = match read_request(&mut receiver)
        .await
        .and_then(|req| build_request(&state, &req.text, req.speaker, req.speed))
    {
        Ok(request) => request,
        Err(e) => {
            warn!("rejecting stream request: {e}");
            send_error(&mut sender, &e).await;
            let _ = sender.close().await;
            state.metrics.stream.record_error();
            return;
        }
    };

    let stop = request.stop_flag().clone();
    let watcher = tokio::spawn(watch_for_stop(receiver, stop.clone()));

    let _ = send_json(
        &mut sender,
        json!({ "type": "status", "status": "synthesizing", "message": "Generating audio..." }),
    )
    .await;

    let sample_rate = state.synth.sample_rate();
    let (tx, mut rx) = audio_channel(state.synth.config().channel_capacity, stop.clone());

    // Producer on a blocking thread; tx is dropped when it returns, closing the channel
    let synth = state.synth.clone();
    let producer = tokio::task::spawn_blocking(move || {
        let emit = |frame: AudioFrame| match tx.send(frame) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        };
        synth.synthesize(&request, &emit)
    });

    let _ = send_json(
        &mut sender,
        json!({
            "type": "metadata",
            "sample_rate": sample_rate,
            "channels": 1,
            "encoding": "pcm_s16le"
        }),
    )
    .await;

    let mut frames_sent = 0u64;
    let mut samples_sent = 0usize;
    let mut discarded = 0usize;
    while let Some(frame) = rx.recv().await {
        if stop.is_stopped() {
            discarded += 1;
            break;
        }
        let bytes = float_to_pcm16_bytes(frame.samples());
        if sender.send(Message::Binary(bytes.into())).await.is_err() {
            warn!("client went away mid-stream");
            stop.request_stop();
            break;
        }
        frames_sent += 1;
        samples_sent += frame.len();
    }
    discarded += rx.drain().await;
    if discarded > 0 {
        debug!(discarded, "discarded frames after stop");
    }

    let outcome = match producer.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            let e = ApiError::from(e);
            send_error(&mut sender, &e).await;
            let _ = sender.close().await;
            watcher.abort();
            state.metrics.stream.record_error();
            return;
        }
        Err(join_err) => {
            let e = ApiError::InternalError(format!("Task join error: {join_err}"));
            send_error(&mut sender, &e).await;
            let _ = sender.close().await;
            watcher.abort();
            state.metrics.stream.record_error();
            return;
        }
    };

    let status = if outcome.is_cancelled() || stop.is_stopped() {
        StreamStatus::Cancelled
    } else {
        StreamStatus::Completed
    };

    for sample in &outcome.rtf.samples {
        let _ = send_json(
            &mut sender,
            json!({
                "type": "rtf",
                "segment": sample.segment_index,
                "total_segments": sample.total_segments,
                "text": sample.text,
                "audio_secs": sample.audio_secs,
                "processing_ms": sample.processing_ms,
                "rtf": sample.rtf,
            }),
        )
        .await;
    }

    let summary = &outcome.rtf.summary;
    let kind = match status {
        StreamStatus::Completed => "complete",
        StreamStatus::Cancelled => "cancelled",
    };
    let _ = send_json(
        &mut sender,
        json!({
            "type": kind,
            "frames": frames_sent,
            "total_samples": samples_sent,
            "duration_secs": samples_sent as f64 / sample_rate.max(1) as f64,
            "rtf": summary,
        }),
    )
    .await;
    let _ = sender.close().await;
    watcher.abort();

    state
        .metrics
        .synthesis
        .record(status, summary, frames_sent);
    state
        .metrics
        .stream
        .record_request(started.elapsed().as_millis() as u64);
    info!(?status, frames_sent, discarded, "stream finished");
}
