//! Workflow response parsing.
//!
//! The hosted workflow API answers with an `{"outputs": [...]}` envelope,
//! while SDK-style callers hand back either the list of outputs or a single
//! bare output object. All three shapes are captured by [`WorkflowPayload`]
//! and reduced to one per-image output object by
//! [`WorkflowPayload::into_first_output`]. Everything after that point only
//! sees a single JSON object.
//!
//! Valid JSON in an unexpected shape is never an error here: it is logged
//! and reported as an empty result.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::geometry::DetectionBox;
use crate::inference::result::{ClassScore, ClassificationResult, UNAVAILABLE_LABEL};

const UNKNOWN_LABEL: &str = "unknown";

/// Response shapes accepted from a workflow call.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WorkflowPayload {
    /// `[ {output}, ... ]`
    List(Vec<Value>),
    /// `{ "outputs": [ {output}, ... ], ... }`
    Envelope { outputs: Vec<Value> },
    /// `{output}`
    Bare(Map<String, Value>),
}

impl WorkflowPayload {
    /// Classify a decoded JSON document. Returns `None` for scalars and other
    /// shapes no workflow produces.
    pub fn from_value(value: Value) -> Option<Self> {
        match WorkflowPayload::deserialize(value) {
            Ok(payload) => Some(payload),
            Err(err) => {
                log::warn!("unrecognised workflow response shape: {}", err);
                None
            }
        }
    }

    /// Output object for the first (and only) submitted image.
    pub fn into_first_output(self) -> Option<Map<String, Value>> {
        let first = match self {
            WorkflowPayload::List(items) | WorkflowPayload::Envelope { outputs: items } => {
                items.into_iter().next()?
            }
            WorkflowPayload::Bare(map) => return Some(map),
        };
        match first {
            Value::Object(map) => Some(map),
            other => {
                log::warn!("workflow output is not an object: {}", other);
                None
            }
        }
    }
}

/// Single object prediction as emitted by a detection model block.
#[derive(Debug, Deserialize)]
struct RawDetection {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(default = "unknown_label")]
    class: String,
    #[serde(default)]
    confidence: f64,
}

fn unknown_label() -> String {
    UNKNOWN_LABEL.to_string()
}

impl From<RawDetection> for DetectionBox {
    fn from(raw: RawDetection) -> Self {
        DetectionBox {
            center_x: raw.x,
            center_y: raw.y,
            width: raw.width,
            height: raw.height,
            label: raw.class,
            confidence: raw.confidence,
        }
    }
}

/// Classification block output: `{top, confidence, predictions}`.
#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    #[serde(default)]
    top: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    /// Array of `{class, confidence}` for single-label models, or a map of
    /// `class -> {confidence}` for multi-label ones.
    #[serde(default)]
    predictions: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawClassScore {
    class: String,
    #[serde(default)]
    confidence: f64,
}

/// Extract detection boxes from a decoded workflow response.
///
/// Reads `<output_key>.predictions`; entries that do not look like a box are
/// skipped. An empty vector means "no detections".
pub fn parse_detections(value: Value, output_key: &str) -> Vec<DetectionBox> {
    let Some(output) = WorkflowPayload::from_value(value).and_then(|p| p.into_first_output())
    else {
        return Vec::new();
    };
    let predictions = match output.get(output_key) {
        Some(Value::Object(block)) => block.get("predictions"),
        Some(list @ Value::Array(_)) => Some(list),
        _ => None,
    };
    let Some(Value::Array(items)) = predictions else {
        log::debug!("workflow output has no '{}.predictions' list", output_key);
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match RawDetection::deserialize(item) {
            Ok(raw) => Some(DetectionBox::from(raw)),
            Err(err) => {
                log::warn!("skipping malformed detection #{}: {}", idx + 1, err);
                None
            }
        })
        .collect()
}

/// Extract the classification headline and score distribution.
///
/// Returns `None` when the service produced no result for the image.
/// `top`/`confidence` are authoritative for the headline; a missing `top`
/// becomes [`UNAVAILABLE_LABEL`] and a missing confidence becomes 0.
pub fn parse_classification(value: Value, output_key: &str) -> Option<ClassificationResult> {
    let output = WorkflowPayload::from_value(value)?.into_first_output()?;
    let block = match output.get(output_key) {
        Some(block @ Value::Object(_)) => block,
        Some(other) => {
            log::warn!("classification output '{}' is not an object: {}", output_key, other);
            return None;
        }
        None => {
            log::debug!("workflow output has no '{}' block", output_key);
            return None;
        }
    };
    let raw = RawClassification::deserialize(block).unwrap_or_else(|err| {
        log::warn!("malformed classification block: {}", err);
        RawClassification::default()
    });

    Some(ClassificationResult {
        top_label: raw.top.unwrap_or_else(|| UNAVAILABLE_LABEL.to_string()),
        top_confidence: raw.confidence.unwrap_or(0.0),
        per_class_scores: raw.predictions.map(class_scores).unwrap_or_default(),
    })
}

fn class_scores(predictions: Value) -> Vec<ClassScore> {
    match predictions {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| RawClassScore::deserialize(item).ok())
            .map(|raw| ClassScore {
                label: raw.class,
                confidence: raw.confidence,
            })
            .collect(),
        Value::Object(map) => {
            let mut scores: Vec<ClassScore> = map
                .into_iter()
                .filter_map(|(label, entry)| {
                    let confidence = match &entry {
                        Value::Number(n) => n.as_f64(),
                        Value::Object(fields) => fields.get("confidence").and_then(Value::as_f64),
                        _ => None,
                    }?;
                    Some(ClassScore { label, confidence })
                })
                .collect();
            scores.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            scores
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DETECTION_LIST: &str = r#"[
        {
            "predictions": {
                "image": {"width": 640, "height": 640},
                "predictions": [
                    {"x": 100.0, "y": 120.5, "width": 40, "height": 60,
                     "class": "impacted", "confidence": 0.91, "detection_id": "a"},
                    {"x": 400, "y": 300, "width": 80, "height": 50,
                     "confidence": 0.55}
                ]
            }
        }
    ]"#;

    const CLASSIFICATION_LIST: &str = r#"[
        {
            "predictions": {
                "top": "mesioangular",
                "confidence": 0.87,
                "predictions": [
                    {"class": "mesioangular", "class_id": 0, "confidence": 0.87},
                    {"class": "vertical", "class_id": 1, "confidence": 0.1}
                ]
            }
        }
    ]"#;

    fn parse(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn list_wrapped_detections_are_parsed_in_order() {
        let boxes = parse_detections(parse(DETECTION_LIST), "predictions");
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].label, "impacted");
        assert_eq!(boxes[0].center_y, 120.5);
        assert_eq!(boxes[1].label, "unknown");
        assert_eq!(boxes[1].confidence, 0.55);
    }

    #[test]
    fn bare_and_envelope_shapes_match_list_shape() {
        let list = parse_detections(parse(DETECTION_LIST), "predictions");
        let inner = parse(DETECTION_LIST)[0].clone();

        let bare = parse_detections(inner.clone(), "predictions");
        let envelope = parse_detections(json!({ "outputs": [inner] }), "predictions");

        assert_eq!(list, bare);
        assert_eq!(list, envelope);
    }

    #[test]
    fn empty_prediction_list_means_no_detections() {
        let value = json!([{ "predictions": { "predictions": [] } }]);
        assert!(parse_detections(value, "predictions").is_empty());
        assert!(parse_detections(json!([]), "predictions").is_empty());
    }

    #[test]
    fn unexpected_shapes_are_treated_as_empty() {
        assert!(parse_detections(json!(42), "predictions").is_empty());
        assert!(parse_detections(json!({"predictions": "oops"}), "predictions").is_empty());
        assert!(parse_classification(json!("nope"), "predictions").is_none());
        assert!(parse_classification(json!([{"other": {}}]), "predictions").is_none());
    }

    #[test]
    fn malformed_detection_entries_are_skipped() {
        let value = json!({
            "predictions": { "predictions": [
                {"x": 1, "y": 2},
                {"x": 10, "y": 10, "width": 4, "height": 4, "class": "ok"}
            ]}
        });
        let boxes = parse_detections(value, "predictions");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].label, "ok");
        assert_eq!(boxes[0].confidence, 0.0);
    }

    #[test]
    fn custom_output_key_is_honoured() {
        let value = json!([{ "model_predictions": { "predictions": [
            {"x": 5, "y": 5, "width": 2, "height": 2, "class": "roi", "confidence": 0.4}
        ]}}]);
        assert_eq!(parse_detections(value.clone(), "model_predictions").len(), 1);
        assert!(parse_detections(value, "predictions").is_empty());
    }

    #[test]
    fn classification_headline_and_scores() {
        let result = parse_classification(parse(CLASSIFICATION_LIST), "predictions").unwrap();
        assert_eq!(result.top_label, "mesioangular");
        assert_eq!(result.top_confidence, 0.87);
        assert_eq!(result.per_class_scores.len(), 2);
        assert_eq!(result.per_class_scores[1].label, "vertical");
    }

    #[test]
    fn missing_top_falls_back_to_sentinel() {
        let value = json!([{ "predictions": { "predictions": [] } }]);
        let result = parse_classification(value, "predictions").unwrap();
        assert_eq!(result.top_label, UNAVAILABLE_LABEL);
        assert_eq!(result.top_confidence, 0.0);
        assert!(result.per_class_scores.is_empty());
    }

    #[test]
    fn headline_survives_empty_score_list() {
        let value = json!([{ "predictions": { "top": "distoangular", "confidence": 0.6, "predictions": [] } }]);
        let result = parse_classification(value, "predictions").unwrap();
        assert_eq!(result.top_label, "distoangular");
        assert_eq!(result.top_confidence, 0.6);
        assert!(result.per_class_scores.is_empty());
    }

    #[test]
    fn empty_classification_list_cannot_classify() {
        assert!(parse_classification(json!([]), "predictions").is_none());
        assert!(parse_classification(json!({"outputs": []}), "predictions").is_none());
    }

    #[test]
    fn multi_label_map_is_sorted_by_confidence() {
        let value = json!({ "predictions": {
            "predictions": {
                "caries": {"confidence": 0.2, "class_id": 0},
                "impacted": {"confidence": 0.9, "class_id": 1}
            }
        }});
        let result = parse_classification(value, "predictions").unwrap();
        assert_eq!(result.per_class_scores[0].label, "impacted");
        assert_eq!(result.per_class_scores[1].label, "caries");
    }
}
