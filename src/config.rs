use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://serverless.roboflow.com";
const DEFAULT_WORKSPACE: &str = "impacteddetectionmodel";
const DEFAULT_DETECTION_WORKFLOW: &str = "custom-workflow-3";
const DEFAULT_CLASSIFICATION_WORKFLOW: &str = "custom-workflow-6";
const DEFAULT_OUTPUT_KEY: &str = "predictions";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_UI_ADDR: &str = "127.0.0.1:8501";
const DEFAULT_WORKING_SIZE: u32 = 640;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_INPUT_DIR: &str = "input";
const DEFAULT_OUTPUT_DIR: &str = "roi_output";

#[derive(Debug, Deserialize, Default)]
struct RoiConfigFile {
    inference: Option<InferenceConfigFile>,
    ui: Option<UiConfigFile>,
    batch: Option<BatchConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct InferenceConfigFile {
    api_url: Option<String>,
    api_key: Option<String>,
    workspace: Option<String>,
    detection_workflow: Option<String>,
    classification_workflow: Option<String>,
    detection_output: Option<String>,
    classification_output: Option<String>,
    use_cache: Option<bool>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct UiConfigFile {
    addr: Option<String>,
    working_size: Option<u32>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct BatchConfigFile {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RoiConfig {
    pub inference: InferenceSettings,
    pub ui: UiSettings,
    pub batch: BatchSettings,
}

/// Hosted workflow identifiers and credentials.
#[derive(Clone)]
pub struct InferenceSettings {
    pub api_url: String,
    pub api_key: String,
    pub workspace: String,
    pub detection_workflow: String,
    pub classification_workflow: String,
    /// Name of the workflow output holding the detector block.
    pub detection_output: String,
    /// Name of the workflow output holding the classifier block.
    pub classification_output: String,
    /// Forwarded to the service as-is.
    pub use_cache: bool,
    pub timeout: Duration,
}

impl fmt::Debug for InferenceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("workspace", &self.workspace)
            .field("detection_workflow", &self.detection_workflow)
            .field("classification_workflow", &self.classification_workflow)
            .field("detection_output", &self.detection_output)
            .field("classification_output", &self.classification_output)
            .field("use_cache", &self.use_cache)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UiSettings {
    pub addr: String,
    /// Uploads are resized to `working_size x working_size` before detection.
    pub working_size: u32,
    pub max_upload_bytes: usize,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_UI_ADDR.to_string(),
            working_size: DEFAULT_WORKING_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl RoiConfig {
    /// Load from the file named by `ROI_CONFIG` (if any), then apply env
    /// overrides and validate.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`RoiConfig::load`], but an explicit path wins over `ROI_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("ROI_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RoiConfigFile) -> Self {
        let inference = file.inference.unwrap_or_default();
        let ui = file.ui.unwrap_or_default();
        let batch = file.batch.unwrap_or_default();

        Self {
            inference: InferenceSettings {
                api_url: inference
                    .api_url
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                api_key: inference.api_key.unwrap_or_default(),
                workspace: inference
                    .workspace
                    .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string()),
                detection_workflow: inference
                    .detection_workflow
                    .unwrap_or_else(|| DEFAULT_DETECTION_WORKFLOW.to_string()),
                classification_workflow: inference
                    .classification_workflow
                    .unwrap_or_else(|| DEFAULT_CLASSIFICATION_WORKFLOW.to_string()),
                detection_output: inference
                    .detection_output
                    .unwrap_or_else(|| DEFAULT_OUTPUT_KEY.to_string()),
                classification_output: inference
                    .classification_output
                    .unwrap_or_else(|| DEFAULT_OUTPUT_KEY.to_string()),
                use_cache: inference.use_cache.unwrap_or(true),
                timeout: Duration::from_secs(
                    inference.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
                ),
            },
            ui: UiSettings {
                addr: ui.addr.unwrap_or_else(|| DEFAULT_UI_ADDR.to_string()),
                working_size: ui.working_size.unwrap_or(DEFAULT_WORKING_SIZE),
                max_upload_bytes: ui.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            },
            batch: BatchSettings {
                input_dir: batch
                    .input_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
                output_dir: batch
                    .output_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("ROI_API_URL") {
            self.inference.api_url = url;
        }
        if let Some(key) = non_empty_env("ROI_API_KEY") {
            self.inference.api_key = key;
        }
        if let Some(workspace) = non_empty_env("ROI_WORKSPACE") {
            self.inference.workspace = workspace;
        }
        if let Some(workflow) = non_empty_env("ROI_DETECTION_WORKFLOW") {
            self.inference.detection_workflow = workflow;
        }
        if let Some(workflow) = non_empty_env("ROI_CLASSIFICATION_WORKFLOW") {
            self.inference.classification_workflow = workflow;
        }
        if let Some(use_cache) = non_empty_env("ROI_USE_CACHE") {
            self.inference.use_cache = parse_bool(&use_cache)
                .ok_or_else(|| anyhow!("ROI_USE_CACHE must be true/false, got '{}'", use_cache))?;
        }
        if let Some(timeout) = non_empty_env("ROI_TIMEOUT_SECS") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|_| anyhow!("ROI_TIMEOUT_SECS must be an integer number of seconds"))?;
            self.inference.timeout = Duration::from_secs(seconds);
        }
        if let Some(addr) = non_empty_env("ROI_UI_ADDR") {
            self.ui.addr = addr;
        }
        if let Some(size) = non_empty_env("ROI_WORKING_SIZE") {
            self.ui.working_size = size
                .parse()
                .map_err(|_| anyhow!("ROI_WORKING_SIZE must be a positive integer"))?;
        }
        if let Some(dir) = non_empty_env("ROI_INPUT_DIR") {
            self.batch.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_env("ROI_OUTPUT_DIR") {
            self.batch.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let inference = &self.inference;
        if inference.api_key.trim().is_empty() {
            return Err(anyhow!(
                "inference API key missing; set ROI_API_KEY or inference.api_key"
            ));
        }
        let url = url::Url::parse(&inference.api_url)
            .map_err(|e| anyhow!("invalid api_url '{}': {}", inference.api_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "api_url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        for (name, value) in [
            ("workspace", &inference.workspace),
            ("detection_workflow", &inference.detection_workflow),
            ("classification_workflow", &inference.classification_workflow),
            ("detection_output", &inference.detection_output),
            ("classification_output", &inference.classification_output),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{} must not be empty", name));
            }
        }
        if inference.timeout.is_zero() {
            return Err(anyhow!("timeout must be greater than zero"));
        }
        if self.ui.working_size == 0 {
            return Err(anyhow!("working_size must be greater than zero"));
        }
        if self.ui.max_upload_bytes == 0 {
            return Err(anyhow!("max_upload_bytes must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RoiConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: RoiConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = RoiConfig::from_file(RoiConfigFile {
            inference: Some(InferenceConfigFile {
                api_key: Some("super-secret".to_string()),
                ..InferenceConfigFile::default()
            }),
            ..RoiConfigFile::default()
        });
        let debug = format!("{:?}", cfg.inference);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = RoiConfig::from_file(RoiConfigFile::default());
        assert_eq!(cfg.inference.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.inference.detection_workflow, DEFAULT_DETECTION_WORKFLOW);
        assert!(cfg.inference.use_cache);
        assert_eq!(cfg.ui.working_size, 640);
        assert_eq!(cfg.batch.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert!(cfg.validate().is_err(), "no API key by default");
    }
}
