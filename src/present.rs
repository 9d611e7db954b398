//! Text presentation shared by the console and HTML front ends.

use crate::inference::ClassificationResult;
use crate::pipeline::{ClassificationOutcome, RegionReport};

/// `LABEL (0.97)`
pub fn headline(result: &ClassificationResult) -> String {
    format!("{} ({:.2})", result.top_label, result.top_confidence)
}

/// Label drawn next to a detection box: `class (0.91)`.
pub fn box_caption(region: &RegionReport) -> String {
    let bbox = &region.region.source_box;
    format!("{} ({:.2})", bbox.label, bbox.confidence)
}

/// Fraction used for score bars; service values outside [0, 1] are clamped.
pub fn bar_fraction(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

/// One-line console description of a region result.
pub fn describe_region(region: &RegionReport) -> String {
    let rect = region.region.rect;
    let prefix = format!(
        "ROI {} [{}] ({},{})-({},{})",
        region.index,
        box_caption(region),
        rect.x1,
        rect.y1,
        rect.x2,
        rect.y2
    );
    match &region.classification {
        ClassificationOutcome::Classified(result) => {
            format!("{prefix}: classified as {}", headline(result))
        }
        ClassificationOutcome::Unclassified => format!("{prefix}: could not classify this region"),
        ClassificationOutcome::Degenerate => format!("{prefix}: empty crop, skipped"),
        ClassificationOutcome::Failed(err) => format!("{prefix}: classification error: {err}"),
    }
}

/// Per-class score lines: `class: 0.87`.
pub fn score_lines(result: &ClassificationResult) -> Vec<String> {
    result
        .per_class_scores
        .iter()
        .map(|score| format!("{}: {:.2}", score.label, score.confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CropRect, DetectionBox};
    use crate::inference::{ClassScore, InferenceError, UNAVAILABLE_LABEL};
    use crate::pipeline::CroppedRegion;
    use image::RgbImage;

    fn region(classification: ClassificationOutcome) -> RegionReport {
        RegionReport {
            index: 2,
            region: CroppedRegion {
                image: RgbImage::new(4, 4),
                rect: CropRect {
                    x1: 80,
                    y1: 80,
                    x2: 120,
                    y2: 120,
                },
                source_box: DetectionBox {
                    center_x: 100.0,
                    center_y: 100.0,
                    width: 40.0,
                    height: 40.0,
                    label: "impacted".to_string(),
                    confidence: 0.912,
                },
            },
            classification,
        }
    }

    #[test]
    fn classified_region_line_includes_headline() {
        let result = ClassificationResult {
            top_label: "vertical".to_string(),
            top_confidence: 0.5,
            per_class_scores: vec![ClassScore {
                label: "vertical".to_string(),
                confidence: 0.5,
            }],
        };
        let line = describe_region(&region(ClassificationOutcome::Classified(result.clone())));
        assert_eq!(
            line,
            "ROI 2 [impacted (0.91)] (80,80)-(120,120): classified as vertical (0.50)"
        );
        assert_eq!(score_lines(&result), vec!["vertical: 0.50"]);
    }

    #[test]
    fn sentinel_headline_renders_zero_confidence() {
        let result = ClassificationResult {
            top_label: UNAVAILABLE_LABEL.to_string(),
            top_confidence: 0.0,
            per_class_scores: Vec::new(),
        };
        assert_eq!(headline(&result), "N/A (0.00)");
    }

    #[test]
    fn failures_and_empty_results_are_described() {
        let failed = region(ClassificationOutcome::Failed(InferenceError::Status {
            status: 500,
            body: "boom".to_string(),
        }));
        assert!(describe_region(&failed).contains("classification error"));
        assert!(describe_region(&region(ClassificationOutcome::Unclassified))
            .contains("could not classify"));
        assert!(describe_region(&region(ClassificationOutcome::Degenerate)).contains("skipped"));
    }

    #[test]
    fn bar_fraction_is_clamped() {
        assert_eq!(bar_fraction(1.7), 1.0);
        assert_eq!(bar_fraction(-0.2), 0.0);
        assert_eq!(bar_fraction(f64::NAN), 0.0);
        assert_eq!(bar_fraction(0.25), 0.25);
    }
}
