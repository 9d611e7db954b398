use std::sync::atomic::{AtomicUsize, Ordering};

use crate::geometry::DetectionBox;
use crate::inference::client::{ImageSource, InferenceClient};
use crate::inference::error::{InferenceError, InferenceResult};
use crate::inference::result::ClassificationResult;

/// Scripted client for tests and offline demos. Never touches the network.
///
/// Every `detect` call returns the same boxes and every `classify` call the
/// same result, except for calls whose 1-based ordinal was marked as failing.
#[derive(Debug, Default)]
pub struct StubClient {
    detections: Vec<DetectionBox>,
    classification: Option<ClassificationResult>,
    failing_detect_calls: Vec<usize>,
    failing_classify_calls: Vec<usize>,
    detect_calls: AtomicUsize,
    classify_calls: AtomicUsize,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detections(mut self, detections: Vec<DetectionBox>) -> Self {
        self.detections = detections;
        self
    }

    pub fn with_classification(mut self, classification: Option<ClassificationResult>) -> Self {
        self.classification = classification;
        self
    }

    /// Make the `call`-th detection (1-based) fail with a service error.
    pub fn fail_detect_call(mut self, call: usize) -> Self {
        self.failing_detect_calls.push(call);
        self
    }

    /// Make the `call`-th classification (1-based) fail with a service error.
    pub fn fail_classify_call(mut self, call: usize) -> Self {
        self.failing_classify_calls.push(call);
        self
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }
}

fn scripted_failure(call: usize) -> InferenceError {
    InferenceError::Status {
        status: 503,
        body: format!("stub failure on call {}", call),
    }
}

impl InferenceClient for StubClient {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, image: ImageSource<'_>) -> InferenceResult<Vec<DetectionBox>> {
        let call = self.detect_calls.fetch_add(1, Ordering::SeqCst) + 1;
        image.read()?;
        if self.failing_detect_calls.contains(&call) {
            return Err(scripted_failure(call));
        }
        Ok(self.detections.clone())
    }

    fn classify(&self, image: ImageSource<'_>) -> InferenceResult<Option<ClassificationResult>> {
        let call = self.classify_calls.fetch_add(1, Ordering::SeqCst) + 1;
        image.read()?;
        if self.failing_classify_calls.contains(&call) {
            return Err(scripted_failure(call));
        }
        Ok(self.classification.clone())
    }
}
