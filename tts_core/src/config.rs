// Synthesis settings, constructed once by the host and passed in explicitly

use serde::Deserialize;

use crate::text::DEFAULT_MAX_CHUNK_LEN;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub min_speed: f32,
    pub max_speed: f32,
    /// Character budget per text segment.
    pub max_chunk_len: usize,
    /// Synthesize segment by segment instead of one engine call per request.
    pub segmented: bool,
    /// Frames buffered between producer and sink before the producer blocks.
    pub channel_capacity: usize,
    pub zero_shot_steps: u32,
    /// Batch size used to stream a buffer an engine returned without emitting.
    pub fallback_frame_len: usize,
    /// Rewrite Arabic numerals as spoken Chinese before segmentation.
    pub normalize_numbers: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            min_speed: 0.2,
            max_speed: 3.0,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            segmented: true,
            channel_capacity: 16,
            zero_shot_steps: 4,
            fallback_frame_len: 4096,
            normalize_numbers: false,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl SynthesisConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let min_speed = env_or("TTS_MIN_SPEED", defaults.min_speed);
        let max_speed = env_or("TTS_MAX_SPEED", defaults.max_speed);
        let max_chunk_len = env_or("TTS_MAX_CHUNK_LEN", defaults.max_chunk_len);
        let segmented = env_or("TTS_SEGMENTED", defaults.segmented);
        let channel_capacity = env_or("TTS_CHANNEL_CAPACITY", defaults.channel_capacity);
        let zero_shot_steps = env_or("TTS_ZERO_SHOT_STEPS", defaults.zero_shot_steps);
        let fallback_frame_len = env_or("TTS_FALLBACK_FRAME_LEN", defaults.fallback_frame_len);
        let normalize_numbers = env_or("TTS_NORMALIZE_NUMBERS", defaults.normalize_numbers);

        Self {
            min_speed,
            max_speed,
            max_chunk_len: max_chunk_len.max(1),
            segmented,
            channel_capacity: channel_capacity.max(1),
            zero_shot_steps,
            fallback_frame_len: fallback_frame_len.max(1),
            normalize_numbers,
        }
    }

    pub fn speed_in_range(&self, speed: f32) -> bool {
        speed.is_finite() && speed >= self.min_speed && speed <= self.max_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = SynthesisConfig::default();
        assert_eq!(c.min_speed, 0.2);
        assert_eq!(c.max_speed, 3.0);
        assert_eq!(c.max_chunk_len, 50);
        assert!(c.segmented);
        assert_eq!(c.zero_shot_steps, 4);
    }

    #[test]
    fn test_speed_range() {
        let c = SynthesisConfig::default();
        assert!(c.speed_in_range(1.0));
        assert!(c.speed_in_range(0.2));
        assert!(c.speed_in_range(3.0));
        assert!(!c.speed_in_range(0.1));
        assert!(!c.speed_in_range(3.5));
        assert!(!c.speed_in_range(f32::NAN));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let c: SynthesisConfig = serde_json::from_str(r#"{ "max_chunk_len": 80 }"#).unwrap();
        assert_eq!(c.max_chunk_len, 80);
        assert_eq!(c.channel_capacity, 16);
    }
}
