use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::time::{Duration, Instant};

const FFT_WINDOW: usize = 1024;
const FFT_HOP: usize = 512;
const BAND_COUNT: usize = 16;
const BAND_LOW_HZ: f32 = 100.0;
const BAND_HIGH_HZ: f32 = 8_000.0;

/// Coarse spectral profile: unit-normalized log-band energies. Level
/// independent, so the quieter acoustic copy of our own playback still
/// matches the synthesized original.
#[derive(Debug, Clone)]
struct SpectralProfile {
    bands: [f32; BAND_COUNT],
}

/// Detects the engine's own synthesized speech coming back in through the
/// microphone.
///
/// `remember` is fed the audio that was just played; `is_echo` compares a
/// captured segment against that profile within a freshness window. Stale
/// profiles never match, so the detector cannot eat real speech minutes
/// after playback ended.
pub struct SelfEchoDetector {
    sample_rate: u32,
    freshness: Duration,
    match_threshold: f32,
    planner: FftPlanner<f32>,
    profile: Option<(SpectralProfile, Instant)>,
}

impl SelfEchoDetector {
    pub fn new(sample_rate: u32, freshness: Duration, match_threshold: f32) -> Self {
        Self {
            sample_rate,
            freshness,
            match_threshold,
            planner: FftPlanner::new(),
            profile: None,
        }
    }

    /// Defaults tuned for 16 kHz speech: 6 s freshness, 0.88 correlation.
    pub fn with_defaults(sample_rate: u32) -> Self {
        Self::new(sample_rate, Duration::from_secs(6), 0.88)
    }

    /// Store the spectral profile of audio the engine just synthesized.
    pub fn remember(&mut self, pcm: &[i16]) {
        match self.compute_profile(pcm) {
            Some(profile) => {
                tracing::debug!(target: "acoustics", "self-echo profile updated ({} samples)", pcm.len());
                self.profile = Some((profile, Instant::now()));
            }
            None => self.profile = None,
        }
    }

    pub fn clear(&mut self) {
        self.profile = None;
    }

    /// Does this captured segment look like our own recent playback?
    pub fn is_echo(&mut self, pcm: &[i16]) -> bool {
        let (remembered, at) = match &self.profile {
            Some(entry) => entry.clone(),
            None => return false,
        };
        if at.elapsed() > self.freshness {
            return false;
        }
        let captured = match self.compute_profile(pcm) {
            Some(p) => p,
            None => return false,
        };

        let score: f32 = remembered
            .bands
            .iter()
            .zip(captured.bands.iter())
            .map(|(a, b)| a * b)
            .sum();
        tracing::trace!(target: "acoustics", "self-echo correlation {:.3}", score);
        score >= self.match_threshold
    }

    /// Average magnitude spectrum over overlapping windows, folded into
    /// log-spaced bands and unit-normalized.
    fn compute_profile(&mut self, pcm: &[i16]) -> Option<SpectralProfile> {
        if pcm.len() < FFT_WINDOW {
            return None;
        }

        let fft = self.planner.plan_fft_forward(FFT_WINDOW);
        let mut bands = [0.0f32; BAND_COUNT];
        let mut windows = 0usize;

        let mut buffer = vec![Complex::new(0.0f32, 0.0f32); FFT_WINDOW];
        let mut start = 0usize;
        while start + FFT_WINDOW <= pcm.len() {
            for (slot, &sample) in buffer.iter_mut().zip(&pcm[start..start + FFT_WINDOW]) {
                *slot = Complex::new(sample as f32 / 32768.0, 0.0);
            }
            fft.process(&mut buffer);

            let bin_hz = self.sample_rate as f32 / FFT_WINDOW as f32;
            for (bin, value) in buffer.iter().enumerate().take(FFT_WINDOW / 2).skip(1) {
                let freq = bin as f32 * bin_hz;
                if let Some(band) = band_index(freq) {
                    bands[band] += value.norm_sqr();
                }
            }
            windows += 1;
            start += FFT_HOP;
        }

        if windows == 0 {
            return None;
        }

        let norm: f32 = bands.iter().map(|e| e * e).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return None;
        }
        for band in bands.iter_mut() {
            *band /= norm;
        }
        Some(SpectralProfile { bands })
    }
}

/// Log-spaced band index for a frequency, `None` outside the speech range.
fn band_index(freq: f32) -> Option<usize> {
    if freq < BAND_LOW_HZ || freq > BAND_HIGH_HZ {
        return None;
    }
    let span = (BAND_HIGH_HZ / BAND_LOW_HZ).ln();
    let position = (freq / BAND_LOW_HZ).ln() / span;
    Some(((position * BAND_COUNT as f32) as usize).min(BAND_COUNT - 1))
}
