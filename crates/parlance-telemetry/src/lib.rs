//! Telemetry for the Parlance capture loops: lock-free diagnostic counters
//! and a time-gated periodic reporter.

pub mod diagnostics;

pub use diagnostics::{CaptureDiagnostics, DiagnosticsSnapshot, PeriodicReporter};
