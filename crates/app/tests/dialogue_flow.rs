//! End-to-end dialogue scenarios against mock collaborators: wake-word
//! gating into single-flight processing, barge-in during playback, and
//! provider exhaustion.

use async_trait::async_trait;
use parking_lot::Mutex;
use parlance_app::session::{DialogueSession, ReplyGenerator};
use parlance_app::wake::{WakeConfig, WakeWordGate};
use parlance_foundation::{BargeInEvent, PresenceController, PresenceState};
use parlance_stt::{now_ms, RecognitionEvent};
use parlance_telemetry::CaptureDiagnostics;
use parlance_tts::{
    PlaybackCoordinator, SelfSpeechFlag, SpeechProvider, SynthesisOptions, TtsConfig, TtsError,
    TtsResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct RecordingReplies {
    heard: Mutex<Vec<String>>,
}

#[async_trait]
impl ReplyGenerator for RecordingReplies {
    async fn generate(
        &self,
        utterance: &str,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<String> {
        self.heard.lock().push(utterance.to_string());
        Ok(format!("re: {utterance}"))
    }
}

/// Succeeds instantly.
struct InstantProvider;

#[async_trait]
impl SpeechProvider for InstantProvider {
    fn name(&self) -> &str {
        "instant"
    }

    async fn speak(
        &self,
        _text: &str,
        _options: &SynthesisOptions,
        _cancel: &CancellationToken,
    ) -> TtsResult<()> {
        Ok(())
    }
}

/// Plays forever until cancelled, like real synthesis mid-sentence.
struct BlockingProvider;

#[async_trait]
impl SpeechProvider for BlockingProvider {
    fn name(&self) -> &str {
        "blocking"
    }

    async fn speak(
        &self,
        _text: &str,
        _options: &SynthesisOptions,
        cancel: &CancellationToken,
    ) -> TtsResult<()> {
        cancel.cancelled().await;
        Err(TtsError::Cancelled)
    }
}

struct FailingProvider;

#[async_trait]
impl SpeechProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn speak(
        &self,
        _text: &str,
        _options: &SynthesisOptions,
        _cancel: &CancellationToken,
    ) -> TtsResult<()> {
        Err(TtsError::SynthesisError("provider down".to_string()))
    }
}

fn final_event(text: &str) -> RecognitionEvent {
    RecognitionEvent {
        text: text.to_string(),
        is_final: true,
        confidence: 0.92,
        timestamp_ms: now_ms(),
    }
}

fn build(
    wake_word: Option<&str>,
    providers: Vec<Box<dyn SpeechProvider>>,
) -> (
    Arc<DialogueSession>,
    Arc<PresenceController>,
    Arc<RecordingReplies>,
    CaptureDiagnostics,
) {
    let presence = Arc::new(PresenceController::new());
    let diagnostics = CaptureDiagnostics::new();
    let replies = Arc::new(RecordingReplies {
        heard: Mutex::new(Vec::new()),
    });

    let mut coordinator = PlaybackCoordinator::new(
        Arc::clone(&presence),
        SelfSpeechFlag::new(),
        TtsConfig::default(),
    )
    .with_cooldown(Duration::from_millis(1));
    for provider in providers {
        coordinator = coordinator.add_provider(provider);
    }

    let (control_tx, _control_rx) = mpsc::channel(4);
    let session = Arc::new(DialogueSession::new(
        WakeWordGate::new(WakeConfig {
            wake_word: wake_word.map(|w| w.to_string()),
            ..Default::default()
        }),
        Arc::clone(&presence),
        Arc::new(coordinator),
        Arc::clone(&replies) as Arc<dyn ReplyGenerator>,
        diagnostics.clone(),
        control_tx,
        false,
    ));
    (session, presence, replies, diagnostics)
}

async fn wait_for(mut predicate: impl FnMut() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn wake_word_opens_gate_and_processes_stripped_text() {
    let (session, presence, replies, _diag) =
        build(Some("hey iaret"), vec![Box::new(InstantProvider)]);

    // Asleep: ordinary speech is ignored outright.
    session.handle_event(final_event("what is the weather"));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(replies.heard.lock().is_empty());

    // Wake phrase plus a question: gate opens, phrase is stripped, one
    // reply cycle runs.
    session.handle_event(final_event("hey iaret what time is it"));
    wait_for(|| !session.is_busy() && !replies.heard.lock().is_empty()).await;

    assert_eq!(replies.heard.lock().as_slice(), ["what time is it"]);
    assert_eq!(presence.current(), PresenceState::Idle);
}

#[tokio::test]
async fn barge_in_while_speaking_cancels_playback() {
    let (session, presence, replies, diagnostics) =
        build(None, vec![Box::new(BlockingProvider)]);

    session.handle_event(final_event("tell me something long"));
    wait_for(|| presence.current() == PresenceState::Speaking).await;

    let barge_rx = presence.subscribe_barge_in();
    session.handle_event(final_event("stop talking please"));

    wait_for(|| presence.current() == PresenceState::Idle).await;
    assert_eq!(barge_rx.try_recv().unwrap(), BargeInEvent::SpeechInterrupt);

    // The interrupting utterance was dropped by the single-flight guard,
    // not queued.
    wait_for(|| !session.is_busy()).await;
    assert_eq!(replies.heard.lock().len(), 1);
    assert_eq!(diagnostics.snapshot().busy_drops, 1);
}

#[tokio::test]
async fn provider_exhaustion_returns_presence_to_idle() {
    let (session, presence, replies, _diag) = build(
        None,
        vec![
            Box::new(FailingProvider),
            Box::new(FailingProvider),
            Box::new(FailingProvider),
            Box::new(FailingProvider),
        ],
    );

    session.handle_event(final_event("say something"));
    wait_for(|| !session.is_busy()).await;

    assert_eq!(replies.heard.lock().len(), 1);
    assert_eq!(presence.current(), PresenceState::Idle);
}
