use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Control phrases that bypass the gate entirely.
const STOP_PHRASES: &[&str] = &["stop listening", "disable voice"];

#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// No wake word means always-on: every final utterance is live.
    pub wake_word: Option<String>,
    /// Inactivity window after which the gate falls back asleep.
    pub sleep_timeout: Duration,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            wake_word: None,
            sleep_timeout: Duration::from_secs(120),
        }
    }
}

/// What the gate decided about one final utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run a reply cycle on this (wake-word-stripped) text.
    Process(String),
    /// The wake phrase alone woke the gate; nothing to process.
    JustWoke,
    /// Asleep and no wake phrase heard.
    Ignored,
    /// Explicit stop-listening control phrase.
    StopListening,
}

/// Decides whether recognized text wakes the engine or is ignored.
pub struct WakeWordGate {
    config: WakeConfig,
    /// `Some(last_activity)` while awake, `None` while asleep.
    awake_since: Mutex<Option<Instant>>,
}

impl WakeWordGate {
    pub fn new(config: WakeConfig) -> Self {
        Self {
            config,
            awake_since: Mutex::new(None),
        }
    }

    /// True when the text would wake the gate. Always true with no wake
    /// word configured, regardless of content.
    pub fn check_wake_word(&self, text: &str) -> bool {
        match &self.config.wake_word {
            None => true,
            Some(phrase) => text.to_lowercase().contains(&phrase.to_lowercase()),
        }
    }

    /// Remove a leading wake phrase and its trailing punctuation.
    /// Idempotent: text that does not start with the phrase is returned
    /// unchanged.
    pub fn strip_wake_word(&self, text: &str) -> String {
        let trimmed = text.trim();
        let phrase = match &self.config.wake_word {
            Some(phrase) => phrase.to_lowercase(),
            None => return trimmed.to_string(),
        };

        if trimmed.to_lowercase().starts_with(&phrase) {
            trimmed[phrase.len()..]
                .trim_start_matches([' ', ',', '.', '!', '?'])
                .to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn is_awake(&self) -> bool {
        let mut awake = self.awake_since.lock();
        match *awake {
            Some(last) if last.elapsed() >= self.config.sleep_timeout => {
                tracing::info!(target: "wake", "sleep timeout elapsed, going back to sleep");
                *awake = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Gate one final utterance.
    pub fn handle(&self, text: &str) -> GateDecision {
        let lowered = text.to_lowercase();
        if STOP_PHRASES.iter().any(|p| lowered.contains(p)) {
            return GateDecision::StopListening;
        }

        if self.config.wake_word.is_none() {
            return GateDecision::Process(text.trim().to_string());
        }

        if self.is_awake() {
            *self.awake_since.lock() = Some(Instant::now());
            let stripped = self.strip_wake_word(text);
            return if stripped.is_empty() {
                GateDecision::JustWoke
            } else {
                GateDecision::Process(stripped)
            };
        }

        if self.check_wake_word(text) {
            *self.awake_since.lock() = Some(Instant::now());
            tracing::info!(target: "wake", "wake phrase heard, now awake");
            let stripped = self.strip_wake_word(text);
            if stripped.is_empty() {
                GateDecision::JustWoke
            } else {
                GateDecision::Process(stripped)
            }
        } else {
            GateDecision::Ignored
        }
    }
}
