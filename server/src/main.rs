use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tts_core::{SynthesisConfig, Synthesizer};

use stream_server::{config::ServerConfig, load_engine, load_prompt, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting streaming TTS server...");

    let config = ServerConfig::from_env();
    let synthesis = SynthesisConfig::from_env();
    info!(
        min_speed = synthesis.min_speed,
        max_speed = synthesis.max_speed,
        max_chunk_len = synthesis.max_chunk_len,
        segmented = synthesis.segmented,
        "synthesis settings"
    );

    let engine = load_engine(&config)?;
    info!(
        sample_rate = engine.sample_rate(),
        num_speakers = engine.num_speakers(),
        zero_shot = engine.is_zero_shot(),
        "engine loaded"
    );

    let prompt = load_prompt(&config)?;
    if engine.is_zero_shot() && prompt.is_none() {
        tracing::warn!("zero-shot engine without TTS_PROMPT_WAV; requests will be rejected");
    }

    let synth = Synthesizer::new(engine, synthesis);
    let state = AppState::new(synth, prompt, config.clone());
    let app = stream_server::app(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
