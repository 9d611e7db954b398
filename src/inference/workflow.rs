//! Hosted workflow binding over blocking HTTPS.
//!
//! Each operation is one `POST {api_url}/{workspace}/workflows/{workflow_id}`
//! carrying the image as base64. No retries: a failed call is returned to the
//! caller, which decides whether the image or just the region is skipped.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use url::Url;

use crate::config::InferenceSettings;
use crate::geometry::DetectionBox;
use crate::inference::client::{ImageSource, InferenceClient};
use crate::inference::error::{InferenceError, InferenceResult};
use crate::inference::response::{parse_classification, parse_detections};
use crate::inference::result::ClassificationResult;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// [`InferenceClient`] backed by the hosted workflow API.
pub struct WorkflowClient {
    agent: ureq::Agent,
    settings: InferenceSettings,
}

impl WorkflowClient {
    pub fn new(settings: InferenceSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.timeout)
            .user_agent(concat!("panoramic-roi/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, settings }
    }

    /// Endpoint URL for a workflow in the configured workspace.
    pub fn endpoint(&self, workflow_id: &str) -> InferenceResult<Url> {
        let mut url = Url::parse(&self.settings.api_url)
            .map_err(|e| InferenceError::Endpoint(format!("{}: {}", self.settings.api_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                InferenceError::Endpoint(format!("{} cannot be a base URL", self.settings.api_url))
            })?
            .pop_if_empty()
            .extend([self.settings.workspace.as_str(), "workflows", workflow_id]);
        Ok(url)
    }

    /// Run one workflow on one image and return the decoded JSON response.
    pub fn run_workflow(&self, workflow_id: &str, image: ImageSource<'_>) -> InferenceResult<Value> {
        let url = self.endpoint(workflow_id)?;
        let bytes = image.read()?;
        let body = json!({
            "api_key": self.settings.api_key,
            "use_cache": self.settings.use_cache,
            "inputs": {
                "image": { "type": "base64", "value": STANDARD.encode(bytes.as_ref()) }
            }
        });

        log::debug!(
            "POST {} ({} image bytes, use_cache={})",
            url,
            bytes.len(),
            self.settings.use_cache
        );
        let response = self
            .agent
            .post(url.as_str())
            .set("Content-Type", "application/json")
            .send_string(&body.to_string());

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(InferenceError::Status {
                    status,
                    body: truncate(&body, MAX_ERROR_BODY_CHARS),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(InferenceError::Transport {
                    url: url.to_string(),
                    message: transport.to_string(),
                });
            }
        };

        let text = response.into_string()?;
        log::debug!("{} raw response: {}", workflow_id, text);
        Ok(serde_json::from_str(&text)?)
    }
}

impl InferenceClient for WorkflowClient {
    fn name(&self) -> &'static str {
        "workflow"
    }

    fn detect(&self, image: ImageSource<'_>) -> InferenceResult<Vec<DetectionBox>> {
        let value = self.run_workflow(&self.settings.detection_workflow, image)?;
        Ok(parse_detections(value, &self.settings.detection_output))
    }

    fn classify(&self, image: ImageSource<'_>) -> InferenceResult<Option<ClassificationResult>> {
        let value = self.run_workflow(&self.settings.classification_workflow, image)?;
        Ok(parse_classification(
            value,
            &self.settings.classification_output,
        ))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
