use crate::backend::SpeechBackend;
use crate::error::SttResult;
use crate::transcribe::SegmentTranscriber;
use crate::types::{now_ms, RecognitionEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use parlance_audio::{encode_wav, MicFlag, SegmentRecorder, ENGINE_SAMPLE_RATE_HZ};
use parlance_foundation::AudioError;
use parlance_vad::{SegmentClassifier, VadConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct LocalBackendConfig {
    /// Length of each recorded segment.
    pub segment_duration: Duration,
    /// Pause after a transcription failure so a broken model does not spin
    /// a hot error loop.
    pub error_backoff: Duration,
    /// Pause when another consumer holds the microphone.
    pub mic_busy_backoff: Duration,
    pub locale: String,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            segment_duration: Duration::from_secs(5),
            error_backoff: Duration::from_millis(500),
            mic_busy_backoff: Duration::from_millis(300),
            locale: "en-US".to_string(),
        }
    }
}

/// Segmented-polling recognition: record a fixed-length segment, gate it
/// through the VAD, transcribe, emit a final event for non-empty text.
/// There are no interim events on this path.
pub struct LocalBackend {
    recorder: Arc<dyn SegmentRecorder>,
    transcriber: Arc<dyn SegmentTranscriber>,
    mic: MicFlag,
    vad: Mutex<SegmentClassifier>,
    config: LocalBackendConfig,
}

impl LocalBackend {
    pub fn new(
        recorder: Arc<dyn SegmentRecorder>,
        transcriber: Arc<dyn SegmentTranscriber>,
        mic: MicFlag,
        vad_config: VadConfig,
        config: LocalBackendConfig,
    ) -> Self {
        Self {
            recorder,
            transcriber,
            mic,
            vad: Mutex::new(SegmentClassifier::new(vad_config)),
            config,
        }
    }

    async fn record_segment(&self, cancel: &CancellationToken) -> Result<Vec<i16>, AudioError> {
        let recorder = Arc::clone(&self.recorder);
        let duration = self.config.segment_duration;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || recorder.record(duration, &cancel))
            .await
            .map_err(|e| AudioError::CaptureFailed(format!("recording task panicked: {e}")))?
    }
}

#[async_trait]
impl SpeechBackend for LocalBackend {
    fn name(&self) -> &str {
        "local-offline"
    }

    async fn run(
        &self,
        event_tx: mpsc::Sender<RecognitionEvent>,
        cancel: CancellationToken,
    ) -> SttResult<()> {
        tracing::info!(
            target: "stt",
            "local backend starting (model: {}, segment: {:?})",
            self.transcriber.name(),
            self.config.segment_duration
        );

        while !cancel.is_cancelled() {
            let guard = match self.mic.try_claim() {
                Some(guard) => guard,
                None => {
                    tokio::time::sleep(self.config.mic_busy_backoff).await;
                    continue;
                }
            };

            let recorded = self.record_segment(&cancel).await;
            drop(guard);

            let pcm = match recorded {
                Ok(pcm) => pcm,
                Err(AudioError::Cancelled) => break,
                Err(e) => {
                    tracing::warn!(target: "stt", "segment capture failed: {}", e);
                    tokio::time::sleep(self.config.error_backoff).await;
                    continue;
                }
            };

            if !self.vad.lock().classify(&pcm).is_speech() {
                tracing::debug!(target: "stt", "segment discarded by VAD");
                continue;
            }

            let wav = match encode_wav(&pcm, ENGINE_SAMPLE_RATE_HZ) {
                Ok(wav) => wav,
                Err(e) => {
                    tracing::warn!(target: "stt", "segment encode failed: {}", e);
                    continue;
                }
            };

            match self.transcriber.transcribe(&wav, &self.config.locale).await {
                Ok(Some(transcript)) if !transcript.text.trim().is_empty() => {
                    let event = RecognitionEvent {
                        text: transcript.text,
                        is_final: true,
                        confidence: transcript.confidence,
                        timestamp_ms: now_ms(),
                    };
                    if event_tx.send(event).await.is_err() {
                        tracing::info!(target: "stt", "event receiver dropped, stopping local backend");
                        break;
                    }
                }
                Ok(_) => {
                    tracing::debug!(target: "stt", "segment produced empty transcript");
                }
                Err(e) => {
                    // Skip the segment, keep the loop alive.
                    tracing::warn!(target: "stt", "transcription failed: {}", e);
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }

        tracing::info!(target: "stt", "local backend stopped");
        Ok(())
    }
}
