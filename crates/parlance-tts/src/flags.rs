use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raised while the engine is emitting audio (and for a short cooldown
/// after), so the ambient capture loop skips cycles instead of hearing the
/// engine talk to itself. The self-echo detector covers whatever the
/// cooldown misses.
#[derive(Clone, Default)]
pub struct SelfSpeechFlag {
    active: Arc<AtomicBool>,
}

impl SelfSpeechFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn lower(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
