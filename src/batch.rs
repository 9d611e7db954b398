//! Folder-at-a-time processing.
//!
//! Every supported image in the input directory is run through the
//! pipeline at native resolution. Region crops are written to the output
//! directory as `<stem>_ROI.jpg` (first region) and `<stem>_ROI_<k>.jpg`
//! (k-th region). When two inputs share a stem, the later one's outputs
//! carry the extension as well (`scan_png_ROI.jpg`). A failing image is
//! logged and skipped; the run continues.

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::acquire::{is_supported_image, open_image};
use crate::annotate::annotate;
use crate::config::BatchSettings;
use crate::inference::{ImageSource, InferenceClient};
use crate::pipeline::{ClassificationOutcome, DetectionOutcome, PipelineOptions, RoiPipeline};
use crate::present::{describe_region, score_lines};

#[derive(Clone, Copy, Debug, Default)]
pub struct BatchOptions {
    pub pipeline: PipelineOptions,
    /// Also write `<stem>_annotated.jpg` with box outlines.
    pub annotate: bool,
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus {
    LoadFailed(String),
    DetectionFailed(String),
    NoDetections,
    Processed {
        regions: usize,
        classified: usize,
        written: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub source: PathBuf,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub images: usize,
    pub failed: usize,
    pub without_detections: usize,
    pub regions_written: usize,
    pub regions_classified: usize,
}

impl BatchSummary {
    fn record(&mut self, status: &EntryStatus) {
        self.images += 1;
        match status {
            EntryStatus::LoadFailed(_) | EntryStatus::DetectionFailed(_) => self.failed += 1,
            EntryStatus::NoDetections => self.without_detections += 1,
            EntryStatus::Processed {
                classified,
                written,
                ..
            } => {
                self.regions_written += written.len();
                self.regions_classified += classified;
            }
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} image(s) processed, {} failed, {} without detections, {} ROI(s) written, {} classified",
            self.images,
            self.failed,
            self.without_detections,
            self.regions_written,
            self.regions_classified
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
}

pub struct BatchRunner<'a> {
    client: &'a dyn InferenceClient,
    settings: BatchSettings,
    options: BatchOptions,
}

impl<'a> BatchRunner<'a> {
    pub fn new(client: &'a dyn InferenceClient, settings: BatchSettings) -> Self {
        Self {
            client,
            settings,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Supported images in the input directory, sorted by file name.
    pub fn collect_inputs(&self) -> Result<Vec<PathBuf>> {
        collect_images(&self.settings.input_dir)
    }

    /// Process every input. `on_entry` is called after each file.
    pub fn run<F>(&self, mut on_entry: F) -> Result<BatchReport>
    where
        F: FnMut(&BatchEntry),
    {
        let inputs = self.collect_inputs()?;
        std::fs::create_dir_all(&self.settings.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                self.settings.output_dir.display()
            )
        })?;

        let mut report = BatchReport::default();
        let mut claimed = HashSet::new();
        for path in inputs {
            let status = self.process_claiming(&path, &mut claimed);
            report.summary.record(&status);
            let entry = BatchEntry {
                source: path,
                status,
            };
            on_entry(&entry);
            report.entries.push(entry);
        }
        log::info!("{}", report.summary);
        Ok(report)
    }

    /// Run one file through the pipeline and write its crops.
    pub fn process(&self, path: &Path) -> EntryStatus {
        self.process_claiming(path, &mut HashSet::new())
    }

    /// `claimed` holds the outputs already written in this run; a file whose
    /// stem collides with an earlier input gets extension-qualified names.
    fn process_claiming(&self, path: &Path, claimed: &mut HashSet<PathBuf>) -> EntryStatus {
        let name = display_name(path);
        log::info!("processing {}", name);

        let image = match open_image(path) {
            Ok(image) => image,
            Err(err) => {
                log::error!("error processing {}: {:#}", name, err);
                return EntryStatus::LoadFailed(format!("{:#}", err));
            }
        };

        let pipeline = RoiPipeline::new(self.client).with_options(self.options.pipeline);
        let mut written = Vec::new();
        let mut classified = 0;
        let report = pipeline.run_observed(&image, Some(ImageSource::Path(path)), |region| {
            log::info!("{}: {}", name, describe_region(region));
            if let ClassificationOutcome::Classified(result) = &region.classification {
                classified += 1;
                for line in score_lines(result) {
                    log::info!("{}:   {}", name, line);
                }
            }
            if region.region.rect.is_degenerate() {
                return;
            }
            let out = claim_output(
                claimed,
                roi_output_path(&self.settings.output_dir, path, region.index),
                || qualified_roi_output_path(&self.settings.output_dir, path, region.index),
            );
            match region.region.image.save(&out) {
                Ok(()) => {
                    log::info!("{}: ROI saved: {}", name, out.display());
                    written.push(out);
                }
                Err(err) => log::error!("{}: failed to write {}: {}", name, out.display(), err),
            }
        });

        match report.outcome {
            DetectionOutcome::Failed(err) => {
                if err.is_service_error() {
                    log::error!("error processing {}: {}", name, err);
                } else {
                    log::error!("error preparing {}: {}", name, err);
                }
                EntryStatus::DetectionFailed(err.to_string())
            }
            DetectionOutcome::NoDetections => {
                log::warn!("no ROI detected for {}", name);
                EntryStatus::NoDetections
            }
            DetectionOutcome::Regions(regions) => {
                if self.options.annotate {
                    let rects: Vec<_> = regions.iter().map(|r| r.region.rect).collect();
                    let out = claim_output(
                        claimed,
                        annotated_output_path(&self.settings.output_dir, path),
                        || {
                            self.settings
                                .output_dir
                                .join(format!("{}_annotated.jpg", qualified_stem(path)))
                        },
                    );
                    if let Err(err) = annotate(&image, rects.iter()).save(&out) {
                        log::error!("{}: failed to write {}: {}", name, out.display(), err);
                    }
                }
                EntryStatus::Processed {
                    regions: regions.len(),
                    classified,
                    written,
                }
            }
        }
    }
}

/// Supported image files directly inside `dir`, sorted by name.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("input directory {} does not exist", dir.display()));
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read input directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// `<output_dir>/<stem>_ROI.jpg` for region 1, `<stem>_ROI_<k>.jpg` after.
pub fn roi_output_path(output_dir: &Path, source: &Path, index: usize) -> PathBuf {
    output_dir.join(roi_file_name(&file_stem(source), index))
}

pub fn annotated_output_path(output_dir: &Path, source: &Path) -> PathBuf {
    output_dir.join(format!("{}_annotated.jpg", file_stem(source)))
}

/// Fallback name when two inputs share a stem: `scan.png` region 2 becomes
/// `scan_png_ROI_2.jpg`.
pub fn qualified_roi_output_path(output_dir: &Path, source: &Path, index: usize) -> PathBuf {
    output_dir.join(roi_file_name(&qualified_stem(source), index))
}

fn roi_file_name(stem: &str, index: usize) -> String {
    if index <= 1 {
        format!("{stem}_ROI.jpg")
    } else {
        format!("{stem}_ROI_{index}.jpg")
    }
}

fn claim_output<F>(claimed: &mut HashSet<PathBuf>, preferred: PathBuf, fallback: F) -> PathBuf
where
    F: FnOnce() -> PathBuf,
{
    if claimed.insert(preferred.clone()) {
        return preferred;
    }
    let alternative = fallback();
    log::warn!(
        "{} already written in this run, using {}",
        preferred.display(),
        alternative.display()
    );
    claimed.insert(alternative.clone());
    alternative
}

fn qualified_stem(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!("{}_{}", file_stem(path), ext.to_string_lossy()),
        None => file_stem(path),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
