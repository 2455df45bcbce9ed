use crate::error::{TtsError, TtsResult};
use crate::flags::SelfSpeechFlag;
use crate::provider::{CircuitBreaker, SpeechProvider};
use crate::sanitize::sanitize_for_speech;
use crate::types::{SpeakStyle, SynthesisOptions, TtsConfig};
use parlance_foundation::{PresenceController, PresenceState};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct ProviderSlot {
    provider: Box<dyn SpeechProvider>,
    breaker: Option<CircuitBreaker>,
}

/// Drives the ordered fallback chain of synthesis providers and owns the
/// Speaking presence window.
///
/// Providers are tried in registration order with uniform error handling;
/// the first success wins. A provider failure is a debug-level event —
/// only full exhaustion produces a user-visible warning, and exactly one.
pub struct PlaybackCoordinator {
    slots: Vec<ProviderSlot>,
    presence: Arc<PresenceController>,
    self_speech: SelfSpeechFlag,
    config: TtsConfig,
    /// How long the self-speech flag stays raised after playback, so echo
    /// suppression covers the acoustic tail.
    cooldown: Duration,
}

impl PlaybackCoordinator {
    pub fn new(
        presence: Arc<PresenceController>,
        self_speech: SelfSpeechFlag,
        config: TtsConfig,
    ) -> Self {
        Self {
            slots: Vec::new(),
            presence,
            self_speech,
            config,
            cooldown: Duration::from_millis(750),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn add_provider(mut self, provider: Box<dyn SpeechProvider>) -> Self {
        self.slots.push(ProviderSlot {
            provider,
            breaker: None,
        });
        self
    }

    /// Register a provider guarded by a circuit breaker; while the breaker
    /// is open the chain skips it without counting a failure.
    pub fn add_provider_with_breaker(
        mut self,
        provider: Box<dyn SpeechProvider>,
        breaker: CircuitBreaker,
    ) -> Self {
        self.slots.push(ProviderSlot {
            provider,
            breaker: Some(breaker),
        });
        self
    }

    /// Synthesize and play `text`, returning when playback completes, every
    /// provider has failed, or `cancel` fires.
    pub async fn speak(
        &self,
        text: &str,
        style: SpeakStyle,
        cancel: &CancellationToken,
    ) -> TtsResult<()> {
        if !self.config.enabled {
            debug!(target: "tts", "synthesis disabled, dropping {} chars", text.len());
            return Ok(());
        }

        let clean = sanitize_for_speech(text);
        if clean.is_empty() {
            debug!(target: "tts", "nothing speakable after sanitization");
            return Ok(());
        }

        let speaking_reason = match style {
            SpeakStyle::Whisper => "thinking aloud",
            SpeakStyle::Spoken => "speaking reply",
        };
        if let Err(e) = self
            .presence
            .transition(PresenceState::Speaking, speaking_reason)
        {
            debug!(target: "tts", "presence not updated for playback: {}", e);
        }
        self.self_speech.raise();

        let result = self.try_chain(&clean, style, cancel).await;

        // Keep the suppression flag up past the audio tail.
        let flag = self.self_speech.clone();
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            flag.lower();
        });

        let idle_reason = match &result {
            Ok(()) => "synthesis complete",
            Err(TtsError::Cancelled) => "synthesis cancelled",
            Err(_) => "synthesis failed",
        };
        if let Err(e) = self.presence.transition(PresenceState::Idle, idle_reason) {
            debug!(target: "tts", "presence not returned to idle: {}", e);
        }

        result
    }

    async fn try_chain(
        &self,
        text: &str,
        style: SpeakStyle,
        cancel: &CancellationToken,
    ) -> TtsResult<()> {
        let options = SynthesisOptions::from_config(&self.config, style);

        for slot in &self.slots {
            if cancel.is_cancelled() {
                return Err(TtsError::Cancelled);
            }

            if let Some(breaker) = &slot.breaker {
                if breaker.is_open() {
                    debug!(target: "tts", "{}: circuit open, skipping", slot.provider.name());
                    continue;
                }
            }

            if !slot.provider.is_available().await {
                debug!(target: "tts", "{}: unavailable, skipping", slot.provider.name());
                continue;
            }

            match slot.provider.speak(text, &options, cancel).await {
                Ok(()) => {
                    if let Some(breaker) = &slot.breaker {
                        breaker.record_success();
                    }
                    info!(target: "tts", "spoke via {}", slot.provider.name());
                    return Ok(());
                }
                Err(TtsError::Cancelled) => {
                    // Barge-in aborts the whole chain, not just this slot.
                    debug!(target: "tts", "{}: playback cancelled", slot.provider.name());
                    return Err(TtsError::Cancelled);
                }
                Err(e) => {
                    debug!(target: "tts", "{} failed: {}", slot.provider.name(), e);
                    if let Some(breaker) = &slot.breaker {
                        breaker.record_failure();
                    }
                }
            }
        }

        warn!(
            target: "tts",
            "all {} speech providers failed; the reply will not be spoken",
            self.slots.len()
        );
        Err(TtsError::ProviderExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        WaitForCancel,
    }

    struct MockProvider {
        name: String,
        available: bool,
        calls: Arc<AtomicU32>,
        script: Mutex<VecDeque<Behavior>>,
    }

    impl MockProvider {
        fn boxed(name: &str, behaviors: &[Behavior]) -> (Box<dyn SpeechProvider>, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Box::new(Self {
                    name: name.to_string(),
                    available: true,
                    calls: Arc::clone(&calls),
                    script: Mutex::new(behaviors.iter().copied().collect()),
                }),
                calls,
            )
        }

        fn boxed_unavailable(name: &str) -> (Box<dyn SpeechProvider>, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Box::new(Self {
                    name: name.to_string(),
                    available: false,
                    calls: Arc::clone(&calls),
                    script: Mutex::new(VecDeque::new()),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl SpeechProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn speak(
            &self,
            _text: &str,
            _options: &SynthesisOptions,
            cancel: &CancellationToken,
        ) -> TtsResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behavior = self.script.lock().pop_front().unwrap_or(Behavior::Succeed);
            match behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(TtsError::SynthesisError("mock failure".to_string())),
                Behavior::WaitForCancel => {
                    cancel.cancelled().await;
                    Err(TtsError::Cancelled)
                }
            }
        }
    }

    fn coordinator_with(
        providers: Vec<Box<dyn SpeechProvider>>,
    ) -> (PlaybackCoordinator, Arc<PresenceController>) {
        let presence = Arc::new(PresenceController::new());
        let mut coordinator = PlaybackCoordinator::new(
            Arc::clone(&presence),
            SelfSpeechFlag::new(),
            TtsConfig::default(),
        )
        .with_cooldown(Duration::from_millis(1));
        for provider in providers {
            coordinator = coordinator.add_provider(provider);
        }
        (coordinator, presence)
    }

    fn enter_processing(presence: &PresenceController) {
        presence
            .transition(PresenceState::Processing, "voice input received")
            .unwrap();
    }

    #[tokio::test]
    async fn first_success_stops_the_chain() {
        let (primary, primary_calls) = MockProvider::boxed("primary", &[Behavior::Succeed]);
        let (backup, backup_calls) = MockProvider::boxed("backup", &[Behavior::Succeed]);
        let (coordinator, presence) = coordinator_with(vec![primary, backup]);
        enter_processing(&presence);

        let cancel = CancellationToken::new();
        coordinator
            .speak("hello there", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap();

        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backup_calls.load(Ordering::SeqCst), 0);
        assert_eq!(presence.current(), PresenceState::Idle);
    }

    #[tokio::test]
    async fn failure_falls_through_to_the_next_provider() {
        let (primary, _) = MockProvider::boxed("primary", &[Behavior::Fail]);
        let (backup, backup_calls) = MockProvider::boxed("backup", &[Behavior::Succeed]);
        let (coordinator, presence) = coordinator_with(vec![primary, backup]);
        enter_processing(&presence);

        let cancel = CancellationToken::new();
        coordinator
            .speak("hello there", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap();
        assert_eq!(backup_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unavailable_providers_are_skipped_without_failure() {
        let (missing, missing_calls) = MockProvider::boxed_unavailable("missing");
        let (backup, backup_calls) = MockProvider::boxed("backup", &[Behavior::Succeed]);
        let (coordinator, presence) = coordinator_with(vec![missing, backup]);
        enter_processing(&presence);

        let cancel = CancellationToken::new();
        coordinator
            .speak("hello there", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap();
        assert_eq!(missing_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backup_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_fails_once_and_returns_to_idle() {
        let (a, _) = MockProvider::boxed("a", &[Behavior::Fail]);
        let (b, _) = MockProvider::boxed("b", &[Behavior::Fail]);
        let (c, _) = MockProvider::boxed("c", &[Behavior::Fail]);
        let (d, _) = MockProvider::boxed("d", &[Behavior::Fail]);
        let (coordinator, presence) = coordinator_with(vec![a, b, c, d]);
        enter_processing(&presence);

        let cancel = CancellationToken::new();
        let err = coordinator
            .speak("hello there", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TtsError::ProviderExhausted));
        assert_eq!(presence.current(), PresenceState::Idle);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_attempt_and_skips_the_rest() {
        let (primary, _) = MockProvider::boxed("primary", &[Behavior::WaitForCancel]);
        let (backup, backup_calls) = MockProvider::boxed("backup", &[Behavior::Succeed]);
        let (coordinator, presence) = coordinator_with(vec![primary, backup]);
        enter_processing(&presence);

        let cancel = CancellationToken::new();
        let speak_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            speak_cancel.cancel();
        });

        let err = coordinator
            .speak("a long reply", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, TtsError::Cancelled));
        assert_eq!(backup_calls.load(Ordering::SeqCst), 0);
        assert_eq!(presence.current(), PresenceState::Idle);
    }

    #[tokio::test]
    async fn open_breaker_skips_the_provider() {
        let (flaky, flaky_calls) = MockProvider::boxed("flaky", &[Behavior::Fail]);
        let (backup, backup_calls) =
            MockProvider::boxed("backup", &[Behavior::Succeed, Behavior::Succeed]);

        let presence = Arc::new(PresenceController::new());
        let coordinator = PlaybackCoordinator::new(
            Arc::clone(&presence),
            SelfSpeechFlag::new(),
            TtsConfig::default(),
        )
        .with_cooldown(Duration::from_millis(1))
        .add_provider_with_breaker(flaky, CircuitBreaker::new(1, Duration::from_secs(600)))
        .add_provider(backup);

        let cancel = CancellationToken::new();

        // First call: flaky fails, breaker opens, backup covers.
        enter_processing(&presence);
        coordinator
            .speak("first", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap();
        assert_eq!(flaky_calls.load(Ordering::SeqCst), 1);

        // Second call: flaky is skipped entirely while the circuit is open.
        enter_processing(&presence);
        coordinator
            .speak("second", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap();
        assert_eq!(flaky_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backup_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn whisper_style_reports_thinking_aloud() {
        let (provider, _) = MockProvider::boxed("primary", &[Behavior::Succeed]);
        let (coordinator, presence) = coordinator_with(vec![provider]);
        let changes = presence.subscribe();
        enter_processing(&presence);

        let cancel = CancellationToken::new();
        coordinator
            .speak("hmm let me think", SpeakStyle::Whisper, &cancel)
            .await
            .unwrap();

        let reasons: Vec<String> = changes.try_iter().map(|c| c.reason).collect();
        assert!(reasons.iter().any(|r| r == "thinking aloud"));
    }

    #[tokio::test]
    async fn unspeakable_text_never_reaches_providers() {
        let (provider, calls) = MockProvider::boxed("primary", &[Behavior::Succeed]);
        let (coordinator, _presence) = coordinator_with(vec![provider]);

        let cancel = CancellationToken::new();
        coordinator
            .speak("```rust\nfn code_only() {}\n```", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn self_speech_flag_spans_playback_and_cooldown() {
        let (provider, _) = MockProvider::boxed("primary", &[Behavior::Succeed]);
        let presence = Arc::new(PresenceController::new());
        let flag = SelfSpeechFlag::new();
        let coordinator =
            PlaybackCoordinator::new(Arc::clone(&presence), flag.clone(), TtsConfig::default())
                .with_cooldown(Duration::from_millis(10))
                .add_provider(provider);
        enter_processing(&presence);

        let cancel = CancellationToken::new();
        coordinator
            .speak("hello", SpeakStyle::Spoken, &cancel)
            .await
            .unwrap();

        // Raised through the cooldown window, lowered afterwards.
        assert!(flag.is_raised());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!flag.is_raised());
    }
}
