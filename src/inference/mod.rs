//! Remote inference: the [`InferenceClient`] capability, its hosted workflow
//! binding and a scripted stub for tests.

mod client;
mod error;
pub mod response;
mod result;
mod stub;
mod workflow;

pub use client::{ImageSource, InferenceClient};
pub use error::{InferenceError, InferenceResult};
pub use result::{ClassScore, ClassificationResult, UNAVAILABLE_LABEL};
pub use stub::StubClient;
pub use workflow::WorkflowClient;
