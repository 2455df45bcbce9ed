use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;
use parlance_foundation::AudioError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// All downstream processing (VAD, signatures, transcription) runs at this
/// rate, mono.
pub const ENGINE_SAMPLE_RATE_HZ: u32 = 16_000;

/// Records one fixed-length PCM segment at the engine rate.
///
/// Implementations block for the segment duration; callers run them through
/// `spawn_blocking`. Cancellation is cooperative and checked between
/// callback drains, not mid-syscall.
pub trait SegmentRecorder: Send + Sync {
    fn record(&self, duration: Duration, cancel: &CancellationToken) -> Result<Vec<i16>, AudioError>;
}

/// CPAL-backed recorder: builds a fresh input stream per segment, converts
/// whatever the device produces to 16 kHz mono i16.
pub struct CpalSegmentRecorder {
    device_name: Option<String>,
}

impl CpalSegmentRecorder {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn open_device(&self) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| AudioError::CaptureFailed(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound {
                    name: Some(name.clone()),
                }),
            None => host
                .default_input_device()
                .ok_or(AudioError::DeviceNotFound { name: None }),
        }
    }
}

impl SegmentRecorder for CpalSegmentRecorder {
    fn record(&self, duration: Duration, cancel: &CancellationToken) -> Result<Vec<i16>, AudioError> {
        let device = self.open_device()?;
        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;
        let device_rate = config.sample_rate.0;

        let buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::with_capacity(
            (device_rate as f64 * duration.as_secs_f64()) as usize,
        )));
        let stream_failed = Arc::new(AtomicBool::new(false));

        let err_flag = Arc::clone(&stream_failed);
        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("Audio stream error: {}", err);
            err_flag.store(true, Ordering::SeqCst);
        };

        // Common handler after conversion to i16: downmix interleaved
        // channels to mono by averaging.
        let sink = Arc::clone(&buffer);
        let handle_i16 = move |data: &[i16]| {
            let mut buf = sink.lock();
            for frame in data.chunks_exact(channels) {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                buf.push((sum / channels as i32) as i16);
            }
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &_| handle_i16(data),
                err_fn,
                None,
            )?,
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &_| {
                    let converted: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
                        .collect();
                    handle_i16(&converted);
                },
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &_| {
                    let converted: Vec<i16> =
                        data.iter().map(|&s| (s as i32 - 32768) as i16).collect();
                    handle_i16(&converted);
                },
                err_fn,
                None,
            )?,
            other => {
                return Err(AudioError::FormatNotSupported {
                    format: format!("{:?}", other),
                })
            }
        };

        stream.play()?;

        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                drop(stream);
                return Err(AudioError::Cancelled);
            }
            if stream_failed.load(Ordering::SeqCst) {
                drop(stream);
                return Err(AudioError::DeviceDisconnected);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        drop(stream);

        let captured = std::mem::take(&mut *buffer.lock());
        if captured.is_empty() {
            return Err(AudioError::NoDataTimeout { duration });
        }
        Ok(resample_to_engine_rate(&captured, device_rate))
    }
}

/// Linear-interpolation resample to `ENGINE_SAMPLE_RATE_HZ`. Quality is
/// adequate for VAD and transcription of speech segments; this is not a
/// music-grade resampler.
pub fn resample_to_engine_rate(samples: &[i16], source_rate: u32) -> Vec<i16> {
    if source_rate == ENGINE_SAMPLE_RATE_HZ || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = source_rate as f64 / ENGINE_SAMPLE_RATE_HZ as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = samples[idx] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_at_engine_rate() {
        let samples = vec![1i16, 2, 3, 4];
        assert_eq!(
            resample_to_engine_rate(&samples, ENGINE_SAMPLE_RATE_HZ),
            samples
        );
    }

    #[test]
    fn resample_halves_sample_count_from_32k() {
        let samples: Vec<i16> = (0..3200).map(|i| (i % 100) as i16).collect();
        let out = resample_to_engine_rate(&samples, 32_000);
        assert_eq!(out.len(), 1600);
    }

    #[test]
    fn resample_preserves_constant_signal() {
        let samples = vec![1000i16; 4410];
        let out = resample_to_engine_rate(&samples, 44_100);
        assert!(out.iter().all(|&s| (s - 1000).abs() <= 1));
    }
}
