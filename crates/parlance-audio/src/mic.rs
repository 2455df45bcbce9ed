use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Advisory mutual-exclusion flag for the microphone.
///
/// The foreground wake-word listener and the background ambient loop both
/// honor this flag before recording; it is not enforced at the driver
/// level. A cycle that sees the flag raised skips instead of blocking.
#[derive(Clone, Default)]
pub struct MicFlag {
    in_use: Arc<AtomicBool>,
}

impl MicFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the microphone. Returns a guard on success, `None` if
    /// another consumer already holds it.
    pub fn try_claim(&self) -> Option<MicGuard> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(MicGuard {
                in_use: Arc::clone(&self.in_use),
            })
        } else {
            None
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }
}

pub struct MicGuard {
    in_use: Arc<AtomicBool>,
}

impl Drop for MicGuard {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::SeqCst);
    }
}
