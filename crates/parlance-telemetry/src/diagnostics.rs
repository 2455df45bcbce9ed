use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-loop capture diagnostics, shared across threads.
///
/// Counters are cumulative for the session and are never reset; readers
/// take a `snapshot` and diff against an earlier one if they want rates.
#[derive(Clone, Default)]
pub struct CaptureDiagnostics {
    pub chunks_total: Arc<AtomicU64>,
    pub vad_discards: Arc<AtomicU64>,
    pub echo_discards: Arc<AtomicU64>,
    pub transcription_failures: Arc<AtomicU64>,
    pub capture_failures: Arc<AtomicU64>,
    pub word_filter_discards: Arc<AtomicU64>,
    pub hallucination_discards: Arc<AtomicU64>,
    pub utterances_emitted: Arc<AtomicU64>,
    pub busy_drops: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub chunks_total: u64,
    pub vad_discards: u64,
    pub echo_discards: u64,
    pub transcription_failures: u64,
    pub capture_failures: u64,
    pub word_filter_discards: u64,
    pub hallucination_discards: u64,
    pub utterances_emitted: u64,
    pub busy_drops: u64,
}

impl CaptureDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk(&self) {
        self.chunks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vad_discard(&self) {
        self.vad_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_echo_discard(&self) {
        self.echo_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transcription_failure(&self) {
        self.transcription_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_word_filter_discard(&self) {
        self.word_filter_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hallucination_discard(&self) {
        self.hallucination_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_utterance(&self) {
        self.utterances_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_busy_drop(&self) {
        self.busy_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_total: self.chunks_total.load(Ordering::Relaxed),
            vad_discards: self.vad_discards.load(Ordering::Relaxed),
            echo_discards: self.echo_discards.load(Ordering::Relaxed),
            transcription_failures: self.transcription_failures.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            word_filter_discards: self.word_filter_discards.load(Ordering::Relaxed),
            hallucination_discards: self.hallucination_discards.load(Ordering::Relaxed),
            utterances_emitted: self.utterances_emitted.load(Ordering::Relaxed),
            busy_drops: self.busy_drops.load(Ordering::Relaxed),
        }
    }
}

/// Time-gated summary logging. Called opportunistically from the capture
/// loop; emits at most one line per interval so counters never flood the
/// log no matter how fast segments are discarded.
pub struct PeriodicReporter {
    interval: Duration,
    last_report: Mutex<Instant>,
}

impl PeriodicReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: Mutex::new(Instant::now()),
        }
    }

    /// Log a summary if the interval has elapsed. Counters are not reset.
    pub fn maybe_report(&self, diagnostics: &CaptureDiagnostics) {
        let mut last = self.last_report.lock();
        if last.elapsed() < self.interval {
            return;
        }
        *last = Instant::now();
        drop(last);

        let snap = diagnostics.snapshot();
        tracing::info!(
            target: "ambient",
            "capture stats - chunks: {}, vad discards: {}, echo discards: {}, \
             stt failures: {}, capture failures: {}, word-filter discards: {}, \
             hallucination discards: {}, utterances: {}, busy drops: {}",
            snap.chunks_total,
            snap.vad_discards,
            snap.echo_discards,
            snap.transcription_failures,
            snap.capture_failures,
            snap.word_filter_discards,
            snap.hallucination_discards,
            snap.utterances_emitted,
            snap.busy_drops,
        );
    }
}
