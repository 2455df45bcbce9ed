use crate::wake::{GateDecision, WakeWordGate};
use async_trait::async_trait;
use parking_lot::Mutex;
use parlance_foundation::{BargeInEvent, PresenceController, PresenceState};
use parlance_stt::RecognitionEvent;
use parlance_telemetry::CaptureDiagnostics;
use parlance_tts::{PlaybackCoordinator, SpeakStyle, TtsError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The external reply-generation collaborator: plain utterance text in,
/// plain reply text out. Fallible and cancellable; everything else about
/// it is out of scope here.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, utterance: &str, cancel: &CancellationToken)
        -> anyhow::Result<String>;
}

/// Outbound control signals from the dialogue layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    StopListening,
}

/// Owns one conversation: gates recognized text, runs at most one reply
/// cycle at a time, and arbitrates barge-in between the capture side and
/// the in-flight processing/playback.
pub struct DialogueSession {
    gate: WakeWordGate,
    presence: Arc<PresenceController>,
    coordinator: Arc<PlaybackCoordinator>,
    replies: Arc<dyn ReplyGenerator>,
    diagnostics: CaptureDiagnostics,
    control_tx: mpsc::Sender<SessionSignal>,
    /// Single-flight guard: a second utterance arriving while set is
    /// dropped, never queued.
    busy: AtomicBool,
    /// Cancellation for the in-flight reply-generation call.
    processing_cancel: Mutex<CancellationToken>,
    /// Cancellation for the in-flight synthesis attempt.
    tts_cancel: Mutex<CancellationToken>,
    /// Whisper-style delivery instead of a spoken reply.
    whisper_replies: bool,
}

impl DialogueSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: WakeWordGate,
        presence: Arc<PresenceController>,
        coordinator: Arc<PlaybackCoordinator>,
        replies: Arc<dyn ReplyGenerator>,
        diagnostics: CaptureDiagnostics,
        control_tx: mpsc::Sender<SessionSignal>,
        whisper_replies: bool,
    ) -> Self {
        Self {
            gate,
            presence,
            coordinator,
            replies,
            diagnostics,
            control_tx,
            busy: AtomicBool::new(false),
            processing_cancel: Mutex::new(CancellationToken::new()),
            tts_cancel: Mutex::new(CancellationToken::new()),
            whisper_replies,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Feed one normalized recognition event. Interim events are advisory
    /// and never trigger anything.
    pub fn handle_event(self: &Arc<Self>, event: RecognitionEvent) {
        if !event.is_final {
            debug!(target: "session", "interim: {}", event.text);
            return;
        }
        self.handle_final(&event.text);
    }

    fn handle_final(self: &Arc<Self>, text: &str) {
        let decision = self.gate.handle(text);
        match decision {
            GateDecision::StopListening => {
                info!(target: "session", "stop-listening phrase recognized");
                let _ = self.control_tx.try_send(SessionSignal::StopListening);
            }
            GateDecision::Ignored => {
                debug!(target: "session", "asleep, ignoring: {}", text);
            }
            GateDecision::JustWoke => {
                info!(target: "session", "awake and listening");
            }
            GateDecision::Process(clean) => {
                // Speech while Speaking or Processing is a barge-in; the
                // controller notifies, we fire the matching cancellation.
                match self.presence.speech_detected() {
                    Some(BargeInEvent::SpeechInterrupt) => {
                        self.tts_cancel.lock().cancel();
                    }
                    Some(BargeInEvent::ProcessingCancel) => {
                        self.processing_cancel.lock().cancel();
                    }
                    None => {}
                }

                if self.busy.swap(true, Ordering::SeqCst) {
                    // Explicit trade-off: bounded latency over completeness.
                    self.diagnostics.record_busy_drop();
                    debug!(target: "session", "busy, dropping utterance: {}", clean);
                    return;
                }

                let session = Arc::clone(self);
                tokio::spawn(async move {
                    session.process_utterance(&clean).await;
                    session.busy.store(false, Ordering::SeqCst);
                });
            }
        }
    }

    async fn process_utterance(&self, text: &str) {
        if let Err(e) = self
            .presence
            .transition(PresenceState::Processing, "voice input received")
        {
            debug!(target: "session", "presence not updated for processing: {}", e);
        }

        let processing = CancellationToken::new();
        *self.processing_cancel.lock() = processing.clone();

        let reply = tokio::select! {
            result = self.replies.generate(text, &processing) => result,
            _ = processing.cancelled() => {
                info!(target: "session", "reply generation cancelled by barge-in");
                let _ = self
                    .presence
                    .transition(PresenceState::Idle, "processing cancelled");
                return;
            }
        };

        let reply = match reply {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                debug!(target: "session", "empty reply, nothing to speak");
                let _ = self.presence.transition(PresenceState::Idle, "empty reply");
                return;
            }
            Err(e) => {
                warn!(target: "session", "reply generation failed: {:#}", e);
                let _ = self
                    .presence
                    .transition(PresenceState::Idle, "reply generation failed");
                return;
            }
        };

        let tts = CancellationToken::new();
        *self.tts_cancel.lock() = tts.clone();

        let style = if self.whisper_replies {
            SpeakStyle::Whisper
        } else {
            SpeakStyle::Spoken
        };
        match self.coordinator.speak(&reply, style, &tts).await {
            Ok(()) => {}
            Err(TtsError::Cancelled) => {
                info!(target: "session", "playback cancelled by barge-in");
            }
            Err(TtsError::ProviderExhausted) => {
                // The coordinator already surfaced the one user-visible
                // warning; nothing further to report.
            }
            Err(e) => {
                warn!(target: "session", "playback failed: {}", e);
            }
        }
    }

    /// Session shutdown cancels both in-flight signals unconditionally.
    pub fn shutdown(&self) {
        self.processing_cancel.lock().cancel();
        self.tts_cancel.lock().cancel();
    }
}
