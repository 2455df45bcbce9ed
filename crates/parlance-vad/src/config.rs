use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE_HZ: u32 = 16_000;
pub const FRAME_SIZE_SAMPLES: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    pub frame_size_samples: usize,
    pub sample_rate_hz: u32,
    /// Offset above the adaptive noise floor at which a frame counts as
    /// speech-active.
    pub onset_threshold_db: f32,
    /// EMA coefficient for noise-floor adaptation from inactive frames.
    pub ema_alpha: f32,
    pub initial_floor_db: f32,
    /// Fraction of frames in a segment that must be active for a Speech
    /// verdict.
    pub min_speech_ratio: f32,
    /// Minimum total active time for a Speech verdict; shorter bursts are
    /// classified as noise (door slams, clicks).
    pub min_speech_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            frame_size_samples: FRAME_SIZE_SAMPLES,
            sample_rate_hz: SAMPLE_RATE_HZ,
            onset_threshold_db: 9.0,
            ema_alpha: 0.05,
            initial_floor_db: -50.0,
            min_speech_ratio: 0.12,
            min_speech_ms: 250,
        }
    }
}

impl VadConfig {
    pub fn frame_duration_ms(&self) -> f32 {
        (self.frame_size_samples as f32 * 1000.0) / self.sample_rate_hz as f32
    }
}
