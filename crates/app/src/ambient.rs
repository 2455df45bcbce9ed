use parking_lot::Mutex;
use parlance_acoustics::{SelfEchoDetector, VoiceSignature};
use parlance_audio::{encode_wav, MicFlag, SegmentRecorder, ENGINE_SAMPLE_RATE_HZ};
use parlance_foundation::AudioError;
use parlance_stt::{is_hallucination, now_ms, word_count, SegmentTranscriber, Utterance};
use parlance_telemetry::{CaptureDiagnostics, PeriodicReporter};
use parlance_tts::SelfSpeechFlag;
use parlance_vad::{SegmentClassifier, VadConfig};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AmbientConfig {
    /// Length of each passively recorded segment.
    pub segment_duration: Duration,
    /// Sleep when the mic is owned elsewhere or the engine is speaking.
    pub idle_backoff: Duration,
    /// Backoff after an unexpected per-cycle failure.
    pub error_backoff: Duration,
    /// Minimum words for an utterance to be worth forwarding.
    pub min_word_count: usize,
    /// Similarity at or above which a signature reuses a known speaker id.
    pub speaker_similarity_threshold: f32,
    pub locale: String,
    /// Counter summary cadence (time-gated, never per event).
    pub report_interval: Duration,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            segment_duration: Duration::from_secs(3),
            idle_backoff: Duration::from_millis(400),
            error_backoff: Duration::from_secs(2),
            min_word_count: 3,
            speaker_similarity_threshold: 0.82,
            locale: "en-US".to_string(),
            report_interval: Duration::from_secs(60),
        }
    }
}

/// Attributes utterances to speakers by acoustic similarity against the
/// most recent distinct signatures. Lightweight diarization, not speaker
/// identification.
pub struct SpeakerRegistry {
    recent: VecDeque<(String, VoiceSignature)>,
    next_id: u32,
    threshold: f32,
    capacity: usize,
}

impl SpeakerRegistry {
    pub fn new(threshold: f32) -> Self {
        Self {
            recent: VecDeque::new(),
            next_id: 1,
            threshold,
            capacity: 8,
        }
    }

    pub fn attribute(&mut self, signature: &VoiceSignature) -> String {
        let mut best: Option<(usize, f32)> = None;
        for (index, (_, known)) in self.recent.iter().enumerate() {
            let score = signature.similarity(known);
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((index, score));
            }
        }

        if let Some((index, score)) = best {
            if score >= self.threshold {
                let (id, _) = self.recent.remove(index).expect("index in range");
                // Keep the freshest sample for this speaker.
                self.recent.push_front((id.clone(), *signature));
                return id;
            }
        }

        let id = format!("speaker-{}", self.next_id);
        self.next_id += 1;
        self.recent.push_front((id.clone(), *signature));
        self.recent.truncate(self.capacity);
        id
    }
}

/// Continuously produces speaker-attributed utterances from passive room
/// listening. One long-lived loop; every discard path increments its
/// counter and nothing short of explicit cancellation stops it.
pub struct AmbientCaptureLoop {
    recorder: Arc<dyn SegmentRecorder>,
    transcriber: Arc<dyn SegmentTranscriber>,
    mic: MicFlag,
    self_speech: SelfSpeechFlag,
    vad: Mutex<SegmentClassifier>,
    echo: Arc<Mutex<SelfEchoDetector>>,
    diagnostics: CaptureDiagnostics,
    reporter: PeriodicReporter,
    speakers: Mutex<SpeakerRegistry>,
    config: AmbientConfig,
}

impl AmbientCaptureLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recorder: Arc<dyn SegmentRecorder>,
        transcriber: Arc<dyn SegmentTranscriber>,
        mic: MicFlag,
        self_speech: SelfSpeechFlag,
        vad_config: VadConfig,
        echo: Arc<Mutex<SelfEchoDetector>>,
        diagnostics: CaptureDiagnostics,
        config: AmbientConfig,
    ) -> Self {
        Self {
            recorder,
            transcriber,
            mic,
            self_speech,
            vad: Mutex::new(SegmentClassifier::new(vad_config)),
            echo,
            diagnostics,
            reporter: PeriodicReporter::new(config.report_interval),
            speakers: Mutex::new(SpeakerRegistry::new(config.speaker_similarity_threshold)),
            config,
        }
    }

    pub async fn run(&self, utterance_tx: mpsc::Sender<Utterance>, cancel: CancellationToken) {
        info!(
            target: "ambient",
            "ambient capture starting (segment: {:?}, min words: {})",
            self.config.segment_duration,
            self.config.min_word_count
        );

        while !cancel.is_cancelled() {
            if let Some(utterance) = self.run_cycle(&cancel).await {
                self.diagnostics.record_utterance();
                if utterance_tx.send(utterance).await.is_err() {
                    info!(target: "ambient", "utterance receiver dropped, stopping");
                    break;
                }
            }
            self.reporter.maybe_report(&self.diagnostics);
        }

        info!(target: "ambient", "ambient capture stopped");
    }

    /// One capture cycle. Returns an utterance only when the segment
    /// survives every gate; all other outcomes are logged, counted, and
    /// swallowed.
    async fn run_cycle(&self, cancel: &CancellationToken) -> Option<Utterance> {
        // Skip entirely while the engine speaks or the foreground listener
        // owns the microphone.
        if self.self_speech.is_raised() {
            tokio::time::sleep(self.config.idle_backoff).await;
            return None;
        }
        let guard = match self.mic.try_claim() {
            Some(guard) => guard,
            None => {
                tokio::time::sleep(self.config.idle_backoff).await;
                return None;
            }
        };

        let recorder = Arc::clone(&self.recorder);
        let duration = self.config.segment_duration;
        let record_cancel = cancel.clone();
        let recorded =
            tokio::task::spawn_blocking(move || recorder.record(duration, &record_cancel)).await;
        drop(guard);

        let pcm = match recorded {
            Ok(Ok(pcm)) => pcm,
            Ok(Err(AudioError::Cancelled)) => return None,
            Ok(Err(e)) => {
                self.diagnostics.record_capture_failure();
                warn!(target: "ambient", "capture failed: {}", e);
                tokio::time::sleep(self.config.error_backoff).await;
                return None;
            }
            Err(e) => {
                self.diagnostics.record_capture_failure();
                warn!(target: "ambient", "capture task panicked: {}", e);
                tokio::time::sleep(self.config.error_backoff).await;
                return None;
            }
        };

        self.diagnostics.record_chunk();

        if !self.vad.lock().classify(&pcm).is_speech() {
            self.diagnostics.record_vad_discard();
            return None;
        }

        if self.echo.lock().is_echo(&pcm) {
            self.diagnostics.record_echo_discard();
            debug!(target: "ambient", "segment matches our own playback, discarding");
            return None;
        }

        let wav = match encode_wav(&pcm, ENGINE_SAMPLE_RATE_HZ) {
            Ok(wav) => wav,
            Err(e) => {
                self.diagnostics.record_capture_failure();
                warn!(target: "ambient", "segment encode failed: {}", e);
                return None;
            }
        };

        let transcript = match self.transcriber.transcribe(&wav, &self.config.locale).await {
            Ok(Some(transcript)) => transcript,
            Ok(None) => return None,
            Err(e) => {
                self.diagnostics.record_transcription_failure();
                warn!(target: "ambient", "transcription failed: {}", e);
                tokio::time::sleep(self.config.error_backoff).await;
                return None;
            }
        };

        let text = transcript.text.trim().to_string();
        if is_hallucination(&text) {
            self.diagnostics.record_hallucination_discard();
            debug!(target: "ambient", "hallucination artifact discarded: {:?}", text);
            return None;
        }

        let words = word_count(&text);
        if words < self.config.min_word_count {
            self.diagnostics.record_word_filter_discard();
            return None;
        }

        let signature = parlance_acoustics::extract(&wav, words);
        let speaker_id = signature
            .as_ref()
            .map(|sig| self.speakers.lock().attribute(sig));

        Some(Utterance {
            text,
            timestamp_ms: now_ms(),
            confidence: transcript.confidence,
            speaker_id,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_stt::MockTranscriber;
    use std::collections::VecDeque as Deque;

    struct ScriptedRecorder {
        segments: Mutex<Deque<Vec<i16>>>,
        cancel: CancellationToken,
    }

    impl SegmentRecorder for ScriptedRecorder {
        fn record(
            &self,
            _duration: Duration,
            _cancel: &CancellationToken,
        ) -> Result<Vec<i16>, AudioError> {
            match self.segments.lock().pop_front() {
                Some(segment) => Ok(segment),
                None => {
                    self.cancel.cancel();
                    Err(AudioError::Cancelled)
                }
            }
        }
    }

    fn speech_segment() -> Vec<i16> {
        (0..ENGINE_SAMPLE_RATE_HZ as usize * 3)
            .map(|i| {
                let phase =
                    2.0 * std::f32::consts::PI * 220.0 * i as f32 / ENGINE_SAMPLE_RATE_HZ as f32;
                (phase.sin() * 12000.0) as i16
            })
            .collect()
    }

    fn low_energy_segment() -> Vec<i16> {
        (0..ENGINE_SAMPLE_RATE_HZ as usize * 3)
            .map(|i| {
                let phase =
                    2.0 * std::f32::consts::PI * 220.0 * i as f32 / ENGINE_SAMPLE_RATE_HZ as f32;
                (phase.sin() * 30.0) as i16
            })
            .collect()
    }

    async fn run_loop(
        segments: Vec<Vec<i16>>,
        transcriber: MockTranscriber,
        config: AmbientConfig,
    ) -> (Vec<Utterance>, CaptureDiagnostics) {
        let cancel = CancellationToken::new();
        let recorder = Arc::new(ScriptedRecorder {
            segments: Mutex::new(segments.into()),
            cancel: cancel.clone(),
        });
        let diagnostics = CaptureDiagnostics::new();
        let echo = Arc::new(Mutex::new(SelfEchoDetector::with_defaults(
            ENGINE_SAMPLE_RATE_HZ,
        )));
        let ambient = AmbientCaptureLoop::new(
            recorder,
            Arc::new(transcriber),
            MicFlag::new(),
            SelfSpeechFlag::new(),
            VadConfig::default(),
            echo,
            diagnostics.clone(),
            AmbientConfig {
                error_backoff: Duration::from_millis(1),
                ..config
            },
        );

        let (tx, mut rx) = mpsc::channel(16);
        ambient.run(tx, cancel).await;

        let mut utterances = Vec::new();
        while let Ok(utterance) = rx.try_recv() {
            utterances.push(utterance);
        }
        (utterances, diagnostics)
    }

    #[tokio::test]
    async fn three_low_energy_segments_count_three_vad_discards() {
        let (utterances, diag) = run_loop(
            vec![
                low_energy_segment(),
                low_energy_segment(),
                low_energy_segment(),
            ],
            MockTranscriber::new(),
            AmbientConfig::default(),
        )
        .await;

        let snap = diag.snapshot();
        assert_eq!(snap.vad_discards, 3);
        assert_eq!(snap.chunks_total, 3);
        assert!(utterances.is_empty());
    }

    #[tokio::test]
    async fn surviving_segment_becomes_attributed_utterance() {
        let transcriber = MockTranscriber::new();
        transcriber.push_text("the weather is lovely today");

        let (utterances, diag) = run_loop(
            vec![speech_segment()],
            transcriber,
            AmbientConfig::default(),
        )
        .await;

        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].text, "the weather is lovely today");
        assert_eq!(utterances[0].speaker_id.as_deref(), Some("speaker-1"));
        assert!(utterances[0].signature.is_some());
        assert_eq!(diag.snapshot().utterances_emitted, 1);
    }

    #[tokio::test]
    async fn hallucinations_and_short_texts_are_discarded() {
        let transcriber = MockTranscriber::new();
        transcriber.push_text("[BLANK_AUDIO]");
        transcriber.push_text("too short");

        let (utterances, diag) = run_loop(
            vec![speech_segment(), speech_segment()],
            transcriber,
            AmbientConfig::default(),
        )
        .await;

        assert!(utterances.is_empty());
        let snap = diag.snapshot();
        assert_eq!(snap.hallucination_discards, 1);
        assert_eq!(snap.word_filter_discards, 1);
    }

    #[tokio::test]
    async fn transcription_error_counts_and_loop_continues() {
        let transcriber = MockTranscriber::new();
        transcriber.push_error("backend blew up");
        transcriber.push_text("still running just fine");

        let (utterances, diag) = run_loop(
            vec![speech_segment(), speech_segment()],
            transcriber,
            AmbientConfig::default(),
        )
        .await;

        assert_eq!(utterances.len(), 1);
        assert_eq!(diag.snapshot().transcription_failures, 1);
    }

    #[test]
    fn registry_reuses_ids_for_similar_voices() {
        let mut registry = SpeakerRegistry::new(0.82);
        let base = VoiceSignature {
            rms_energy: 0.2,
            zero_cross_rate: 400.0,
            speaking_rate: 3.0,
            dynamic_range: 0.4,
            duration_secs: 3.0,
        };
        let close = VoiceSignature {
            zero_cross_rate: 420.0,
            speaking_rate: 2.8,
            ..base
        };
        let distant = VoiceSignature {
            zero_cross_rate: 2900.0,
            speaking_rate: 0.5,
            dynamic_range: 0.05,
            ..base
        };

        let first = registry.attribute(&base);
        assert_eq!(registry.attribute(&close), first);
        assert_ne!(registry.attribute(&distant), first);
    }
}
