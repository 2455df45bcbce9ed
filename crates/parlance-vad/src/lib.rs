//! Voice-activity detection for Parlance capture segments.
//!
//! The classifier works on whole fixed-length segments rather than a frame
//! stream: the capture loops record a few seconds at a time and need a
//! single keep-or-discard verdict per segment. The noise floor adapts to
//! the room from the frames each segment rejects.

pub mod classifier;
pub mod config;
pub mod energy;
pub mod threshold;

pub use classifier::{SegmentClassifier, SegmentVerdict};
pub use config::{VadConfig, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use energy::EnergyCalculator;
pub use threshold::AdaptiveThreshold;
