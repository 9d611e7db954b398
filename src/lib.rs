//! Panoramic X-ray ROI pipeline
//!
//! Finds regions of interest on panoramic dental X-rays with a hosted
//! detection workflow, crops each region and sends the crop to a hosted
//! classification workflow.
//!
//! # Module Structure
//!
//! - `geometry`: center-format boxes and clamped crop rectangles
//! - `inference`: the [`InferenceClient`] capability and its workflow binding
//! - `acquire`: decoding, working-size resize, JPEG handoff encoding
//! - `pipeline`: detect, crop, classify for one image
//! - `annotate`, `present`: box outlines and result text
//! - `web`: browser front end (`roi_ui`)
//! - `batch`: folder processing (`roi_batch`)
//! - `config`: file and environment configuration

pub mod acquire;
pub mod annotate;
pub mod batch;
pub mod config;
pub mod geometry;
pub mod inference;
pub mod pipeline;
pub mod present;
pub mod web;

pub use batch::{BatchOptions, BatchReport, BatchRunner, BatchSummary, EntryStatus};
pub use config::{BatchSettings, InferenceSettings, RoiConfig, UiSettings};
pub use geometry::{crop_rect, CropRect, DetectionBox};
pub use inference::{
    ClassScore, ClassificationResult, ImageSource, InferenceClient, InferenceError, StubClient,
    WorkflowClient,
};
pub use pipeline::{
    ClassificationOutcome, CroppedRegion, DetectionOutcome, ImageReport, PipelineOptions,
    RegionReport, RoiPipeline,
};
pub use web::{UiHandle, UiServer};
