use async_trait::async_trait;
use parking_lot::Mutex;
use parlance_stt::{SegmentTranscriber, SttError, SttResult, Transcript};
use std::io::Cursor;
use vosk::{CompleteResult, Model, Recognizer};

/// Whole-segment Vosk transcription. One recognizer is reused across
/// segments; `final_result` both yields the text and clears state for the
/// next segment.
pub struct VoskTranscriber {
    recognizer: Mutex<Recognizer>,
}

impl VoskTranscriber {
    pub fn new(model_path: &str, sample_rate: f32) -> SttResult<Self> {
        if !std::path::Path::new(model_path).exists() {
            return Err(SttError::NotAvailable(format!(
                "Vosk model not found at '{}'",
                model_path
            )));
        }

        let model = Model::new(model_path).ok_or_else(|| {
            SttError::NotAvailable(format!("Failed to load Vosk model from: {}", model_path))
        })?;

        let recognizer = Recognizer::new(&model, sample_rate).ok_or_else(|| {
            SttError::NotAvailable(format!(
                "Failed to create Vosk recognizer with sample rate: {}",
                sample_rate
            ))
        })?;

        tracing::info!(target: "stt", "Vosk model loaded from {}", model_path);
        Ok(Self {
            recognizer: Mutex::new(recognizer),
        })
    }
}

#[async_trait]
impl SegmentTranscriber for VoskTranscriber {
    fn name(&self) -> &str {
        "vosk"
    }

    async fn transcribe(&self, wav: &[u8], _locale: &str) -> SttResult<Option<Transcript>> {
        let reader = hound::WavReader::new(Cursor::new(wav))
            .map_err(|e| SttError::TranscriptionFailed(format!("bad WAV container: {e}")))?;
        let samples: Vec<i16> = reader.into_samples::<i16>().filter_map(|s| s.ok()).collect();
        if samples.is_empty() {
            return Ok(None);
        }

        let mut recognizer = self.recognizer.lock();
        recognizer
            .accept_waveform(&samples)
            .map_err(|e| SttError::TranscriptionFailed(format!("waveform rejected: {e:?}")))?;

        let text = match recognizer.final_result() {
            CompleteResult::Single(single) => single.text.to_string(),
            CompleteResult::Multiple(multiple) => multiple
                .alternatives
                .first()
                .map(|alt| alt.text.to_string())
                .unwrap_or_default(),
        };

        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(Transcript {
                text,
                // Vosk does not expose an utterance-level score.
                confidence: 1.0,
            }))
        }
    }
}
