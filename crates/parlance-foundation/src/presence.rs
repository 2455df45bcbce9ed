use crate::error::EngineError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Conversational presence. Exactly one state is active at a time and
/// `transition` is the only mutation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PresenceState::Idle => "idle",
            PresenceState::Listening => "listening",
            PresenceState::Processing => "processing",
            PresenceState::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Notification emitted on every presence transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceChange {
    pub from: PresenceState,
    pub to: PresenceState,
    pub reason: String,
}

/// Raised when incoming speech is detected while the engine is busy.
///
/// The controller only notifies; the playback coordinator and the reply
/// task each hold their own cancellation signal and react independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BargeInEvent {
    /// Speech arrived while Speaking: the synthesis attempt should stop.
    SpeechInterrupt,
    /// Speech arrived while Processing: the reply call should stop.
    ProcessingCancel,
}

pub struct PresenceController {
    state: Arc<RwLock<PresenceState>>,
    change_tx: Sender<PresenceChange>,
    change_rx: Receiver<PresenceChange>,
    barge_tx: Sender<BargeInEvent>,
    barge_rx: Receiver<BargeInEvent>,
}

impl Default for PresenceController {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceController {
    pub fn new() -> Self {
        let (change_tx, change_rx) = crossbeam_channel::unbounded();
        let (barge_tx, barge_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(PresenceState::Idle)),
            change_tx,
            change_rx,
            barge_tx,
            barge_rx,
        }
    }

    /// Move to `new_state`, carrying a human-readable reason for diagnostics.
    pub fn transition(&self, new_state: PresenceState, reason: &str) -> Result<(), EngineError> {
        let mut current = self.state.write();

        let valid = matches!(
            (*current, new_state),
            (PresenceState::Idle, PresenceState::Listening)
                | (PresenceState::Listening, PresenceState::Idle)
                | (PresenceState::Idle, PresenceState::Processing)
                | (PresenceState::Listening, PresenceState::Processing)
                | (PresenceState::Processing, PresenceState::Speaking)
                | (PresenceState::Processing, PresenceState::Idle)
                | (PresenceState::Speaking, PresenceState::Idle)
        );

        if !valid {
            return Err(EngineError::InvalidTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        tracing::info!(
            target: "presence",
            "{} -> {} ({})",
            *current,
            new_state,
            reason
        );
        let change = PresenceChange {
            from: *current,
            to: new_state,
            reason: reason.to_string(),
        };
        *current = new_state;
        let _ = self.change_tx.send(change);
        Ok(())
    }

    pub fn current(&self) -> PresenceState {
        *self.state.read()
    }

    /// Report that recognized speech arrived. While Speaking or Processing
    /// this raises the corresponding barge-in event; otherwise it is a no-op.
    pub fn speech_detected(&self) -> Option<BargeInEvent> {
        let state = *self.state.read();
        let event = match state {
            PresenceState::Speaking => Some(BargeInEvent::SpeechInterrupt),
            PresenceState::Processing => Some(BargeInEvent::ProcessingCancel),
            _ => None,
        };
        if let Some(event) = event {
            tracing::info!(target: "presence", "barge-in while {}: {:?}", state, event);
            let _ = self.barge_tx.send(event);
        }
        event
    }

    pub fn subscribe(&self) -> Receiver<PresenceChange> {
        self.change_rx.clone()
    }

    pub fn subscribe_barge_in(&self) -> Receiver<BargeInEvent> {
        self.barge_rx.clone()
    }
}
