//! Piper (ONNX) backend for [`SynthesisEngine`].

use std::{fs, path::Path, sync::RwLock};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::{debug, info};

use crate::{
    audio::AudioResult,
    engine::{EmitFn, GenerationParams, SynthesisEngine, Voice},
    error::EngineError,
};

pub struct PiperEngine {
    synth: RwLock<PiperSpeechSynthesizer>,
    sample_rate: u32,
    num_speakers: u32,
}

impl std::fmt::Debug for PiperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiperEngine")
            .field("synth", &"<PiperSpeechSynthesizer>")
            .field("sample_rate", &self.sample_rate)
            .field("num_speakers", &self.num_speakers)
            .finish()
    }
}

/// Fields of the model's JSON config that the engine reports.
fn read_model_info<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<(u32, u32)> {
    let text = fs::read_to_string(cfg_path.as_ref()).with_context(|| {
        format!("Failed to read config file: {}", cfg_path.as_ref().display())
    })?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

    let sample_rate = json
        .get("audio")
        .and_then(|a| a.get("sample_rate"))
        .and_then(|sr| sr.as_u64())
        .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;
    let num_speakers = json
        .get("num_speakers")
        .and_then(|n| n.as_u64())
        .unwrap_or(1);

    Ok((sample_rate as u32, num_speakers as u32))
}

impl PiperEngine {
    /// Load a Piper voice from its `.onnx.json` config.
    pub fn from_config_path<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<Self> {
        let (sample_rate, num_speakers) = read_model_info(&cfg_path)?;
        let model = piper_rs::from_config_path(cfg_path.as_ref())
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = PiperSpeechSynthesizer::new(model)?;
        info!(
            config = %cfg_path.as_ref().display(),
            sample_rate,
            num_speakers,
            "loaded piper model"
        );
        Ok(Self {
            synth: RwLock::new(synth),
            sample_rate,
            num_speakers,
        })
    }
}

impl SynthesisEngine for PiperEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn num_speakers(&self) -> u32 {
        self.num_speakers
    }

    fn is_zero_shot(&self) -> bool {
        false
    }

    fn generate(
        &self,
        text: &str,
        voice: Voice<'_>,
        params: &GenerationParams,
        emit: &EmitFn<'_>,
    ) -> Result<AudioResult, EngineError> {
        // piper-rs 0.1.9 exposes neither speaker selection nor length scale.
        if let Voice::Speaker(id) = voice {
            debug!(speaker = id, speed = params.speed, "piper generate, using model defaults");
        }

        let synth = self
            .synth
            .read()
            .map_err(|_| EngineError::new("synthesizer lock poisoned"))?;
        let parts: PiperSpeechStreamParallel = synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| EngineError::new(format!("piper synth error: {e}")))?;

        let mut samples = Vec::new();
        for part in parts {
            let batch = part
                .map_err(|e| EngineError::new(format!("chunk error: {e}")))?
                .into_vec();
            samples.extend_from_slice(&batch);
            if emit(&batch).is_break() {
                debug!("piper generation stopped by consumer");
                break;
            }
        }
        Ok(AudioResult::new(samples, self.sample_rate))
    }
}
