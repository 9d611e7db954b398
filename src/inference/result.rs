/// Label shown when the classifier omits its headline class.
pub const UNAVAILABLE_LABEL: &str = "N/A";

/// One entry of a per-class score distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassScore {
    pub label: String,
    pub confidence: f64,
}

/// Result of classifying a single cropped region.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    /// Headline class (`top`), or [`UNAVAILABLE_LABEL`].
    pub top_label: String,
    /// Headline confidence, 0 when absent.
    pub top_confidence: f64,
    /// Optional supplementary distribution, in service order.
    pub per_class_scores: Vec<ClassScore>,
}
