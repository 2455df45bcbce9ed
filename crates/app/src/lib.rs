//! Parlance application layer: configuration, the wake-word gate, the
//! single-flight dialogue session, the ambient capture loop, and the
//! runtime wiring that assembles the pipeline.

pub mod ambient;
pub mod config;
pub mod runtime;
pub mod session;
pub mod wake;

pub use ambient::{AmbientCaptureLoop, AmbientConfig, SpeakerRegistry};
pub use config::{BackendChoice, Cli, EngineConfig};
pub use runtime::{start, EngineHandle};
pub use session::{DialogueSession, ReplyGenerator, SessionSignal};
pub use wake::{GateDecision, WakeConfig, WakeWordGate};
