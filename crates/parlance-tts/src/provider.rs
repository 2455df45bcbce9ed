use crate::error::TtsResult;
use crate::types::SynthesisOptions;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// One speech-synthesis provider in the fallback chain.
///
/// `speak` synthesizes and plays the text to completion. Cancellation is
/// cooperative: implementations check the token between phases (request,
/// playback chunks) and return `TtsError::Cancelled`.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap availability probe; unavailable providers are skipped without
    /// counting as failures.
    async fn is_available(&self) -> bool {
        true
    }

    async fn speak(
        &self,
        text: &str,
        options: &SynthesisOptions,
        cancel: &CancellationToken,
    ) -> TtsResult<()>;
}

/// Receives the raw synthesized audio a provider is about to play.
/// The runtime hangs the self-echo profiler off this.
pub trait AudioTap: Send + Sync {
    fn on_synthesized(&self, wav_bytes: &[u8]);
}

#[derive(Debug)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Failure-count circuit breaker for flaky free-tier providers. After
/// `failure_threshold` consecutive failures the provider is skipped for
/// `open_duration`, then given one probe attempt (half-open).
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_duration: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            failure_threshold,
            open_duration,
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock();
        match state.opened_at {
            Some(at) if at.elapsed() >= self.open_duration => {
                // Half-open: allow one probe. A failure reopens the window.
                state.opened_at = None;
                state.consecutive_failures = self.failure_threshold.saturating_sub(1);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold && state.opened_at.is_none() {
            state.opened_at = Some(Instant::now());
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(120))
    }
}
