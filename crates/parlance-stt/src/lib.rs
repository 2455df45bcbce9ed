//! Speech recognition for Parlance.
//!
//! Two interchangeable backends — a continuous cloud streaming path and a
//! segmented local polling path — normalized behind one event contract,
//! plus the transcript gates (hallucination filter, word count) that sit
//! between raw recognition and the dialogue layer.

pub mod backend;
pub mod cloud;
pub mod error;
pub mod filter;
pub mod local;
pub mod transcribe;
pub mod types;

pub use backend::{cloud_credential, resolve_kind, SpeechBackend, CLOUD_CREDENTIAL_ENV};
pub use cloud::{CloudBackend, CloudConfig};
pub use error::{SttError, SttResult};
pub use filter::{is_hallucination, word_count};
pub use local::{LocalBackend, LocalBackendConfig};
pub use transcribe::{MockTranscriber, NoopTranscriber, SegmentTranscriber, Transcript};
pub use types::{now_ms, BackendKind, RecognitionEvent, SttBackendConfig, Utterance};
