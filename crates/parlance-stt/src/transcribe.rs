use crate::error::SttResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One transcribed segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub confidence: f32,
}

/// Whole-segment transcription, used by the local polling backend and the
/// ambient capture loop. Input is a WAV container at the engine rate.
#[async_trait]
pub trait SegmentTranscriber: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means "nothing recognized"; it is not an error.
    async fn transcribe(&self, wav: &[u8], locale: &str) -> SttResult<Option<Transcript>>;
}

/// Recognizes nothing. Stands in when no offline model is compiled in.
#[derive(Debug, Default)]
pub struct NoopTranscriber;

#[async_trait]
impl SegmentTranscriber for NoopTranscriber {
    fn name(&self) -> &str {
        "noop"
    }

    async fn transcribe(&self, _wav: &[u8], _locale: &str) -> SttResult<Option<Transcript>> {
        Ok(None)
    }
}

/// Scripted transcriber for tests: hands out queued results in order,
/// then `None` forever.
#[derive(Default)]
pub struct MockTranscriber {
    queue: Mutex<VecDeque<SttResult<Option<Transcript>>>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: &str) {
        self.queue.lock().push_back(Ok(Some(Transcript {
            text: text.to_string(),
            confidence: 0.9,
        })));
    }

    pub fn push_empty(&self) {
        self.queue.lock().push_back(Ok(None));
    }

    pub fn push_error(&self, message: &str) {
        self.queue.lock().push_back(Err(
            crate::error::SttError::TranscriptionFailed(message.to_string()),
        ));
    }
}

#[async_trait]
impl SegmentTranscriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(&self, _wav: &[u8], _locale: &str) -> SttResult<Option<Transcript>> {
        self.queue.lock().pop_front().unwrap_or(Ok(None))
    }
}
