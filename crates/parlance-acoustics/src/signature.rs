use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Minimum usable audio for a signature (0.5 s at 16 kHz).
const MIN_SAMPLE_COUNT: usize = 8_000;

/// Normalization ranges used to bring the compared features into [0,1]
/// before the cosine. Values outside the range saturate.
const ZCR_RANGE: f32 = 3_000.0;
const SPEAKING_RATE_RANGE: f32 = 8.0;

/// Small acoustic fingerprint of one utterance. Derived data only; never
/// persisted by this crate, never compared for exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSignature {
    /// Loudness, RMS normalized to full scale.
    pub rms_energy: f32,
    /// Zero crossings per second, a coarse pitch correlate.
    pub zero_cross_rate: f32,
    /// Words per second.
    pub speaking_rate: f32,
    /// (max - min) amplitude, normalized to full scale.
    pub dynamic_range: f32,
    pub duration_secs: f32,
}

impl VoiceSignature {
    /// Cosine similarity in [0,1] over zero-cross rate, speaking rate, and
    /// dynamic range. RMS energy is excluded on purpose: it reflects
    /// microphone distance, not speaker identity.
    pub fn similarity(&self, other: &VoiceSignature) -> f32 {
        let a = self.comparable();
        let b = other.comparable();

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 && norm_b == 0.0 {
            return 1.0;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }

    fn comparable(&self) -> [f32; 3] {
        [
            (self.zero_cross_rate / ZCR_RANGE).clamp(0.0, 1.0),
            (self.speaking_rate / SPEAKING_RATE_RANGE).clamp(0.0, 1.0),
            self.dynamic_range.clamp(0.0, 1.0),
        ]
    }
}

/// Extract a signature from a WAV-contained utterance.
///
/// Requires 16-bit PCM and at least half a second of audio; anything else
/// returns `None` rather than a degenerate fingerprint. Multi-channel
/// input is downmixed by averaging.
pub fn extract(wav_bytes: &[u8], word_count: usize) -> Option<VoiceSignature> {
    let reader = hound::WavReader::new(Cursor::new(wav_bytes)).ok()?;
    let spec = reader.spec();

    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        tracing::debug!(
            target: "acoustics",
            "rejecting non-16-bit container ({} bits, {:?})",
            spec.bits_per_sample,
            spec.sample_format
        );
        return None;
    }

    let channels = spec.channels as usize;
    let interleaved: Vec<i16> = reader.into_samples::<i16>().filter_map(|s| s.ok()).collect();
    let samples: Vec<i16> = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if samples.len() < MIN_SAMPLE_COUNT {
        return None;
    }

    let duration_secs = samples.len() as f32 / spec.sample_rate as f32;

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms_energy = ((sum_squares / samples.len() as f64).sqrt() / 32768.0) as f32;

    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0) != (w[1] >= 0))
        .count();
    let zero_cross_rate = crossings as f32 / duration_secs;

    let max = samples.iter().copied().max().unwrap_or(0) as f32;
    let min = samples.iter().copied().min().unwrap_or(0) as f32;
    let dynamic_range = (max - min) / 65_535.0;

    let speaking_rate = word_count as f32 / duration_secs;

    Some(VoiceSignature {
        rms_energy,
        zero_cross_rate,
        speaking_rate,
        dynamic_range,
        duration_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_of(samples: &[i16], sample_rate: u32, bits: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            if bits == 16 {
                for &s in samples {
                    writer.write_sample(s).unwrap();
                }
            } else {
                for &s in samples {
                    writer.write_sample(s as i8).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn voiced_samples(freq: f32, amplitude: f32, secs: f32) -> Vec<i16> {
        let n = (16_000.0 * secs) as usize;
        (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / 16_000.0;
                (phase.sin() * amplitude) as i16
            })
            .collect()
    }

    #[test]
    fn extracts_plausible_features() {
        let wav = wav_of(&voiced_samples(200.0, 12000.0, 2.0), 16_000, 16);
        let sig = extract(&wav, 6).unwrap();

        assert!((sig.duration_secs - 2.0).abs() < 0.01);
        // 200 Hz sine crosses zero 400 times per second.
        assert!((sig.zero_cross_rate - 400.0).abs() < 20.0);
        assert!((sig.speaking_rate - 3.0).abs() < 0.1);
        assert!(sig.rms_energy > 0.2 && sig.rms_energy < 0.3);
        assert!(sig.dynamic_range > 0.3);
    }

    #[test]
    fn rejects_short_audio() {
        let wav = wav_of(&voiced_samples(200.0, 12000.0, 0.2), 16_000, 16);
        assert!(extract(&wav, 2).is_none());
    }

    #[test]
    fn rejects_non_16_bit() {
        let wav = wav_of(&voiced_samples(200.0, 100.0, 2.0), 16_000, 8);
        assert!(extract(&wav, 2).is_none());
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(extract(b"not a wav container", 3).is_none());
    }

    #[test]
    fn similarity_is_symmetric_and_reflexive() {
        let wav_a = wav_of(&voiced_samples(180.0, 10000.0, 2.0), 16_000, 16);
        let wav_b = wav_of(&voiced_samples(400.0, 9000.0, 1.5), 16_000, 16);
        let a = extract(&wav_a, 5).unwrap();
        let b = extract(&wav_b, 7).unwrap();

        assert!((a.similarity(&b) - b.similarity(&a)).abs() < 1e-6);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
        assert!((b.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn same_speaker_scores_higher_than_cross_speaker() {
        // Same voice, repeated: close pitch and pacing.
        let first = extract(&wav_of(&voiced_samples(190.0, 11000.0, 2.0), 16_000, 16), 6).unwrap();
        let repeat = extract(&wav_of(&voiced_samples(200.0, 9000.0, 2.1), 16_000, 16), 6).unwrap();
        // Different voice: much higher pitch, much faster.
        let other = extract(&wav_of(&voiced_samples(1400.0, 11000.0, 1.0), 16_000, 16), 8).unwrap();

        let same = first.similarity(&repeat);
        let cross = first.similarity(&other);
        assert!(
            same > cross,
            "same-speaker {:.3} should beat cross-speaker {:.3}",
            same,
            cross
        );
    }

    #[test]
    fn rms_energy_is_excluded_from_similarity() {
        let near = VoiceSignature {
            rms_energy: 0.05,
            zero_cross_rate: 400.0,
            speaking_rate: 3.0,
            dynamic_range: 0.4,
            duration_secs: 2.0,
        };
        let far = VoiceSignature {
            rms_energy: 0.5,
            ..near
        };
        assert!((near.similarity(&far) - 1.0).abs() < 1e-6);
    }
}
