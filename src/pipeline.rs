//! Per-image pipeline: detect, then crop and classify each region in
//! detector order.
//!
//! The pipeline never returns an error. Failures are folded into the
//! [`ImageReport`] so that callers can present them and carry on:
//! a detection failure ends the current image, a classification failure
//! only affects its own region.

use image::imageops;
use image::RgbImage;

use crate::acquire::encode_jpeg;
use crate::geometry::{crop_rect, CropRect, DetectionBox};
use crate::inference::{ClassificationResult, ImageSource, InferenceClient, InferenceError};

/// Pixels cut out of the source image for one detection.
#[derive(Clone, Debug)]
pub struct CroppedRegion {
    pub image: RgbImage,
    pub rect: CropRect,
    pub source_box: DetectionBox,
}

#[derive(Debug)]
pub enum ClassificationOutcome {
    Classified(ClassificationResult),
    /// The service answered without a result for this region.
    Unclassified,
    /// The crop covered no pixels; nothing was sent to the classifier.
    Degenerate,
    Failed(InferenceError),
}

#[derive(Debug)]
pub struct RegionReport {
    /// 1-based position in detector order.
    pub index: usize,
    pub region: CroppedRegion,
    pub classification: ClassificationOutcome,
}

#[derive(Debug)]
pub enum DetectionOutcome {
    Failed(InferenceError),
    NoDetections,
    Regions(Vec<RegionReport>),
}

#[derive(Debug)]
pub struct ImageReport {
    /// Boxes returned by the detector, before any region limit.
    pub detected: usize,
    pub outcome: DetectionOutcome,
}

impl ImageReport {
    pub fn regions(&self) -> &[RegionReport] {
        match &self.outcome {
            DetectionOutcome::Regions(regions) => regions,
            _ => &[],
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineOptions {
    /// Only crop and classify the first N detections.
    pub max_regions: Option<usize>,
}

pub struct RoiPipeline<'a> {
    client: &'a dyn InferenceClient,
    options: PipelineOptions,
}

impl<'a> RoiPipeline<'a> {
    pub fn new(client: &'a dyn InferenceClient) -> Self {
        Self {
            client,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run on an in-memory image; the image is JPEG-encoded for detection.
    pub fn run(&self, image: &RgbImage) -> ImageReport {
        self.run_observed(image, None, |_| {})
    }

    /// Run with an explicit detector input (e.g. the original file) and a
    /// callback invoked for each region as soon as it is classified.
    ///
    /// `source` must encode the same pixels as `image`, since the returned
    /// boxes are applied to `image`.
    pub fn run_observed<F>(
        &self,
        image: &RgbImage,
        source: Option<ImageSource<'_>>,
        mut on_region: F,
    ) -> ImageReport
    where
        F: FnMut(&RegionReport),
    {
        let report = |detected, outcome| ImageReport { detected, outcome };

        let detected = match source {
            Some(source) => self.client.detect(source),
            None => encode_jpeg(image).and_then(|bytes| self.client.detect(ImageSource::Bytes(&bytes))),
        };
        let boxes = match detected {
            Ok(boxes) => boxes,
            Err(err) => {
                log::warn!("{}: detection failed: {}", self.client.name(), err);
                return report(0, DetectionOutcome::Failed(err));
            }
        };
        if boxes.is_empty() {
            log::info!("no regions detected");
            return report(0, DetectionOutcome::NoDetections);
        }

        let detected = boxes.len();
        let limit = self.options.max_regions.unwrap_or(usize::MAX);
        log::info!("{} region(s) detected", detected);

        let mut regions = Vec::with_capacity(detected.min(limit));
        for (idx, bbox) in boxes.into_iter().take(limit).enumerate() {
            let region = crop_region(image, bbox);
            let classification = self.classify_region(&region);
            let region_report = RegionReport {
                index: idx + 1,
                region,
                classification,
            };
            on_region(&region_report);
            regions.push(region_report);
        }

        report(detected, DetectionOutcome::Regions(regions))
    }

    fn classify_region(&self, region: &CroppedRegion) -> ClassificationOutcome {
        if region.rect.is_degenerate() {
            log::warn!(
                "skipping degenerate region {:?} for box '{}'",
                region.rect,
                region.source_box.label
            );
            return ClassificationOutcome::Degenerate;
        }
        let result = encode_jpeg(&region.image)
            .and_then(|bytes| self.client.classify(ImageSource::Bytes(&bytes)));
        match result {
            Ok(Some(result)) => ClassificationOutcome::Classified(result),
            Ok(None) => ClassificationOutcome::Unclassified,
            Err(err) => {
                log::warn!("{}: classification failed: {}", self.client.name(), err);
                ClassificationOutcome::Failed(err)
            }
        }
    }
}

/// Cut the pixels for `bbox` out of `image`. Degenerate boxes produce an
/// empty image.
pub fn crop_region(image: &RgbImage, bbox: DetectionBox) -> CroppedRegion {
    let rect = crop_rect(&bbox, image.width(), image.height());
    let pixels = if rect.is_degenerate() {
        RgbImage::new(0, 0)
    } else {
        imageops::crop_imm(image, rect.x1, rect.y1, rect.width(), rect.height()).to_image()
    };
    CroppedRegion {
        image: pixels,
        rect,
        source_box: bbox,
    }
}
