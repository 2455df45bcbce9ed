//! Foundation types for the Parlance spoken-dialogue engine: the shared
//! error taxonomy, the presence state machine with barge-in detection, and
//! the graceful-shutdown handler.

pub mod error;
pub mod presence;
pub mod shutdown;

pub use error::{AudioError, EngineError, RecoveryStrategy};
pub use presence::{BargeInEvent, PresenceChange, PresenceController, PresenceState};
pub use shutdown::{ShutdownGuard, ShutdownHandler};
