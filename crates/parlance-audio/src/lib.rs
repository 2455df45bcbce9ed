//! Audio capture for Parlance: fixed-length segment recording through CPAL,
//! the advisory microphone mutual-exclusion flag, and WAV helpers.

pub mod mic;
pub mod recorder;
pub mod wav;

pub use mic::{MicFlag, MicGuard};
pub use recorder::{CpalSegmentRecorder, SegmentRecorder, ENGINE_SAMPLE_RATE_HZ};
pub use wav::encode_wav;
