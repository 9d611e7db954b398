use std::borrow::Cow;
use std::path::Path;

use crate::geometry::DetectionBox;
use crate::inference::error::InferenceResult;
use crate::inference::result::ClassificationResult;

/// Image handed to a workflow: a file on disk or an encoded buffer.
#[derive(Clone, Copy, Debug)]
pub enum ImageSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

impl<'a> ImageSource<'a> {
    /// Encoded image bytes, read from disk when needed.
    pub fn read(&self) -> std::io::Result<Cow<'a, [u8]>> {
        match *self {
            ImageSource::Path(path) => std::fs::read(path).map(Cow::Owned),
            ImageSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }
}

/// Remote detection and classification capability.
///
/// The hosted workflow binding ([`super::WorkflowClient`]) and the scripted
/// test double ([`super::StubClient`]) both implement this, so the pipeline
/// never depends on the transport.
pub trait InferenceClient: Send + Sync {
    /// Client identifier for logs.
    fn name(&self) -> &'static str;

    /// Detect regions of interest. An empty vector is "no detections", not
    /// an error.
    fn detect(&self, image: ImageSource<'_>) -> InferenceResult<Vec<DetectionBox>>;

    /// Classify one cropped region. `Ok(None)` means the service returned no
    /// result for it.
    fn classify(&self, image: ImageSource<'_>) -> InferenceResult<Option<ClassificationResult>>;
}
