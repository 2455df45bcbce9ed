use crate::ambient::AmbientCaptureLoop;
use crate::config::EngineConfig;
use crate::session::{DialogueSession, ReplyGenerator, SessionSignal};
use crate::wake::{WakeConfig, WakeWordGate};
use anyhow::Context;
use parking_lot::Mutex;
use parlance_acoustics::SelfEchoDetector;
use parlance_audio::{CpalSegmentRecorder, MicFlag, SegmentRecorder, ENGINE_SAMPLE_RATE_HZ};
use parlance_foundation::PresenceController;
use parlance_stt::{
    cloud_credential, resolve_kind, BackendKind, CloudBackend, CloudConfig, LocalBackend,
    NoopTranscriber, SegmentTranscriber, SpeechBackend, Utterance,
};
use parlance_telemetry::CaptureDiagnostics;
use parlance_tts::{
    AudioTap, CircuitBreaker, EspeakProvider, HttpTtsConfig, HttpTtsProvider, PlaybackCoordinator,
    SelfSpeechFlag,
};
use parlance_vad::VadConfig;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Feeds synthesized audio into the self-echo profile ahead of playback.
struct EchoTap {
    echo: Arc<Mutex<SelfEchoDetector>>,
}

impl AudioTap for EchoTap {
    fn on_synthesized(&self, wav_bytes: &[u8]) {
        let Ok(reader) = hound::WavReader::new(Cursor::new(wav_bytes)) else {
            return;
        };
        let pcm: Vec<i16> = reader.into_samples::<i16>().filter_map(|s| s.ok()).collect();
        if !pcm.is_empty() {
            self.echo.lock().remember(&pcm);
        }
    }
}

/// Handle to the running engine pipeline.
pub struct EngineHandle {
    pub presence: Arc<PresenceController>,
    pub session: Arc<DialogueSession>,
    pub diagnostics: CaptureDiagnostics,
    /// Ambient utterance stream; `None` when ambient capture is disabled.
    pub utterances: Option<mpsc::Receiver<Utterance>>,
    pub control_rx: mpsc::Receiver<SessionSignal>,
    capture_cancel: CancellationToken,
    backend_handle: JoinHandle<()>,
    event_handle: JoinHandle<()>,
    ambient_handle: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Gracefully stop the capture loops and cancel anything in flight.
    pub async fn shutdown(self) {
        info!("Shutting down Parlance runtime...");
        self.session.shutdown();
        self.capture_cancel.cancel();

        let _ = self.backend_handle.await;
        let _ = self.event_handle.await;
        if let Some(handle) = self.ambient_handle {
            let _ = handle.await;
        }
        info!("Parlance runtime shutdown complete");
    }
}

fn make_transcriber(_config: &EngineConfig) -> Arc<dyn SegmentTranscriber> {
    #[cfg(feature = "vosk")]
    {
        match parlance_stt_vosk::VoskTranscriber::new(
            &parlance_stt_vosk::default_model_path(),
            ENGINE_SAMPLE_RATE_HZ as f32,
        ) {
            Ok(transcriber) => return Arc::new(transcriber),
            Err(e) => {
                warn!("offline model unavailable ({}), transcription disabled", e);
            }
        }
    }
    Arc::new(NoopTranscriber)
}

fn build_coordinator(
    config: &EngineConfig,
    presence: Arc<PresenceController>,
    self_speech: SelfSpeechFlag,
    echo: Arc<Mutex<SelfEchoDetector>>,
) -> PlaybackCoordinator {
    let tap: Arc<dyn AudioTap> = Arc::new(EchoTap { echo });
    let mut coordinator =
        PlaybackCoordinator::new(presence, self_speech, config.tts.clone());

    // Fixed fallback order: primary cloud neural, free neural behind a
    // circuit breaker, local espeak, last-resort secondary cloud.
    if let Ok(key) = std::env::var("PARLANCE_TTS_PRIMARY_KEY") {
        let endpoint = std::env::var("PARLANCE_TTS_PRIMARY_ENDPOINT")
            .unwrap_or_else(|_| "https://tts.parlance.dev/v1/synthesize".to_string());
        coordinator = coordinator.add_provider(Box::new(
            HttpTtsProvider::new(HttpTtsConfig {
                name: "primary-neural".to_string(),
                endpoint,
                api_key: Some(key),
                request_timeout: Duration::from_secs(15),
            })
            .with_tap(Arc::clone(&tap)),
        ));
    }

    if let Ok(endpoint) = std::env::var("PARLANCE_TTS_FREE_ENDPOINT") {
        coordinator = coordinator.add_provider_with_breaker(
            Box::new(
                HttpTtsProvider::new(HttpTtsConfig {
                    name: "free-neural".to_string(),
                    endpoint,
                    api_key: None,
                    request_timeout: Duration::from_secs(15),
                })
                .with_tap(Arc::clone(&tap)),
            ),
            CircuitBreaker::default(),
        );
    }

    coordinator = coordinator.add_provider(Box::new(EspeakProvider::new()));

    if let Ok(key) = std::env::var("PARLANCE_TTS_BACKUP_KEY") {
        let endpoint = std::env::var("PARLANCE_TTS_BACKUP_ENDPOINT")
            .unwrap_or_else(|_| "https://tts-backup.parlance.dev/v1/synthesize".to_string());
        coordinator = coordinator.add_provider(Box::new(
            HttpTtsProvider::new(HttpTtsConfig {
                name: "backup-neural".to_string(),
                endpoint,
                api_key: Some(key),
                request_timeout: Duration::from_secs(15),
            })
            .with_tap(tap),
        ));
    }

    coordinator
}

/// Build and start the full pipeline: foreground recognition, dialogue
/// session, and (unless disabled) the ambient capture loop.
pub async fn start(
    config: EngineConfig,
    replies: Arc<dyn ReplyGenerator>,
) -> anyhow::Result<EngineHandle> {
    let presence = Arc::new(PresenceController::new());
    let diagnostics = CaptureDiagnostics::new();
    let mic = MicFlag::new();
    let self_speech = SelfSpeechFlag::new();
    let echo = Arc::new(Mutex::new(SelfEchoDetector::with_defaults(
        ENGINE_SAMPLE_RATE_HZ,
    )));

    let recorder: Arc<dyn SegmentRecorder> =
        Arc::new(CpalSegmentRecorder::new(config.device.clone()));
    let transcriber = make_transcriber(&config);

    let kind = resolve_kind(config.stt.kind, cloud_credential().is_some())
        .context("speech backend configuration")?;
    let backend: Arc<dyn SpeechBackend> = match kind {
        BackendKind::Cloud => {
            let cloud_config = CloudConfig::from_env(&config.stt.locale)
                .context("cloud backend configuration")?;
            Arc::new(CloudBackend::new(
                cloud_config,
                Arc::clone(&recorder),
                mic.clone(),
            ))
        }
        _ => Arc::new(LocalBackend::new(
            Arc::clone(&recorder),
            Arc::clone(&transcriber),
            mic.clone(),
            VadConfig::default(),
            config.local.clone(),
        )),
    };
    info!("speech backend: {}", backend.name());

    let coordinator = Arc::new(build_coordinator(
        &config,
        Arc::clone(&presence),
        self_speech.clone(),
        Arc::clone(&echo),
    ));

    let (control_tx, control_rx) = mpsc::channel(4);
    let session = Arc::new(DialogueSession::new(
        WakeWordGate::new(WakeConfig {
            wake_word: config.stt.wake_word.clone(),
            ..Default::default()
        }),
        Arc::clone(&presence),
        coordinator,
        replies,
        diagnostics.clone(),
        control_tx,
        config.whisper_replies,
    ));

    let capture_cancel = CancellationToken::new();

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let backend_cancel = capture_cancel.clone();
    let backend_task = Arc::clone(&backend);
    let backend_handle = tokio::spawn(async move {
        if let Err(e) = backend_task.run(event_tx, backend_cancel).await {
            warn!("speech backend terminated: {}", e);
        }
    });

    let pump_session = Arc::clone(&session);
    let event_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            pump_session.handle_event(event);
        }
    });

    let (ambient_handle, utterances) = if config.ambient_enabled {
        let ambient = AmbientCaptureLoop::new(
            recorder,
            transcriber,
            mic,
            self_speech,
            VadConfig::default(),
            echo,
            diagnostics.clone(),
            config.ambient.clone(),
        );
        let (utterance_tx, utterance_rx) = mpsc::channel(32);
        let ambient_cancel = capture_cancel.clone();
        let handle = tokio::spawn(async move {
            ambient.run(utterance_tx, ambient_cancel).await;
        });
        (Some(handle), Some(utterance_rx))
    } else {
        (None, None)
    };

    Ok(EngineHandle {
        presence,
        session,
        diagnostics,
        utterances,
        control_rx,
        capture_cancel,
        backend_handle,
        event_handle,
        ambient_handle,
    })
}
