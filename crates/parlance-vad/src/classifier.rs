use crate::config::VadConfig;
use crate::energy::EnergyCalculator;
use crate::threshold::AdaptiveThreshold;

/// Verdict for one captured segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentVerdict {
    /// Enough sustained energy above the noise floor to be worth
    /// transcribing.
    Speech,
    /// Nothing above the noise floor.
    Silence,
    /// Energy above the floor but too sparse or too short to be speech.
    Noise,
}

impl SegmentVerdict {
    /// Capture loops discard everything that is not speech.
    pub fn is_speech(&self) -> bool {
        matches!(self, SegmentVerdict::Speech)
    }
}

/// Classifies whole capture segments, adapting its noise floor to the room
/// from the frames it rejects.
pub struct SegmentClassifier {
    config: VadConfig,
    energy: EnergyCalculator,
    threshold: AdaptiveThreshold,
}

impl SegmentClassifier {
    pub fn new(config: VadConfig) -> Self {
        Self {
            threshold: AdaptiveThreshold::new(&config),
            energy: EnergyCalculator::new(),
            config,
        }
    }

    pub fn classify(&mut self, segment: &[i16]) -> SegmentVerdict {
        if segment.len() < self.config.frame_size_samples {
            return SegmentVerdict::Silence;
        }

        let mut active_frames = 0u32;
        let mut total_frames = 0u32;

        for frame in segment.chunks_exact(self.config.frame_size_samples) {
            total_frames += 1;
            let energy_db = self.energy.calculate_dbfs(frame);
            if self.threshold.is_active(energy_db) {
                active_frames += 1;
            } else {
                self.threshold.update(energy_db);
            }
        }

        let active_ms = active_frames as f32 * self.config.frame_duration_ms();
        let active_ratio = active_frames as f32 / total_frames as f32;

        let verdict = if active_frames == 0 {
            SegmentVerdict::Silence
        } else if active_ratio >= self.config.min_speech_ratio
            && active_ms >= self.config.min_speech_ms as f32
        {
            SegmentVerdict::Speech
        } else {
            SegmentVerdict::Noise
        };

        tracing::trace!(
            target: "vad",
            "segment: {} frames, {} active ({:.0}ms), floor {:.1} dBFS -> {:?}",
            total_frames,
            active_frames,
            active_ms,
            self.threshold.current_floor(),
            verdict
        );
        verdict
    }

    pub fn noise_floor_db(&self) -> f32 {
        self.threshold.current_floor()
    }

    pub fn reset(&mut self) {
        self.threshold.reset(self.config.initial_floor_db);
    }
}
