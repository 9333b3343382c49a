pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod stream;
pub mod validation;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tracing::{info, warn};
use tts_core::{PromptAudio, SynthesisEngine, Synthesizer};

use crate::config::ServerConfig;
use crate::metrics::AppMetrics;

#[derive(Clone)]
pub struct AppState {
    pub synth: Synthesizer,
    /// Voice prompt used when the engine is zero-shot.
    pub prompt: Option<Arc<PromptAudio>>,
    pub metrics: AppMetrics,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(synth: Synthesizer, prompt: Option<PromptAudio>, config: ServerConfig) -> Self {
        Self {
            synth,
            prompt: prompt.map(Arc::new),
            metrics: AppMetrics::new(),
            config,
        }
    }
}

/// Load the engine named by the configuration.
#[cfg(feature = "piper")]
pub fn load_engine(config: &ServerConfig) -> anyhow::Result<Arc<dyn SynthesisEngine>> {
    let path = config
        .model_config
        .as_deref()
        .context("TTS_MODEL_CONFIG must point at a Piper .onnx.json config")?;
    let engine = tts_core::PiperEngine::from_config_path(path)
        .with_context(|| format!("Failed to load Piper model from {path}"))?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "piper"))]
pub fn load_engine(_config: &ServerConfig) -> anyhow::Result<Arc<dyn SynthesisEngine>> {
    anyhow::bail!("no synthesis backend compiled in; rebuild with `--features piper`")
}

/// Load the zero-shot prompt if one is configured.
pub fn load_prompt(config: &ServerConfig) -> anyhow::Result<Option<PromptAudio>> {
    let Some(path) = config.prompt_wav.as_deref() else {
        return Ok(None);
    };
    let prompt = PromptAudio::from_wav_file(config.prompt_text.clone(), path)
        .with_context(|| format!("Failed to load prompt audio {path}"))?;
    Ok(Some(prompt))
}

/// Tag every request and response with an `x-request-id`.
pub async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = header.clone() {
        request.headers_mut().insert("x-request-id", value);
    }
    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Routes at the root and under `/api`, with state attached.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health_check))
        .route("/healthz", get(routes::health_check))
        .route("/engine", get(routes::engine_info))
        .route("/tts", post(routes::tts_endpoint))
        .route("/stream", get(stream::stream_ws))
        .route("/metrics", get(routes::metrics_endpoint));

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(axum::middleware::from_fn(add_request_id))
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_credentials(false)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_credentials(false)
    }
}

/// Full application: routes plus tracing, rate limiting, timeout and CORS.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    // Global limit: every client shares one bucket
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second((config.rate_limit_per_minute / 60).max(1) as u64)
            .burst_size(config.rate_limit_per_minute.max(1))
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .context("invalid rate limit configuration")?,
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(&config))
        .into_inner();

    Ok(router(state).layer(middleware_stack))
}
