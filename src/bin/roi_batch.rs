//! roi_batch - run ROI detection and classification over a folder.
//!
//! Every .jpg/.jpeg/.png in the input directory is processed at native
//! resolution. Region crops land in the output directory as
//! `<stem>_ROI.jpg`, `<stem>_ROI_2.jpg`, ...

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use panoramic_roi::batch::{BatchOptions, BatchRunner, EntryStatus};
use panoramic_roi::{PipelineOptions, RoiConfig, WorkflowClient};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "roi_batch",
    about = "Detect, crop and classify ROIs for every image in a folder"
)]
struct Args {
    /// JSON or TOML config file
    #[arg(long, env = "ROI_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Folder of input images, overrides the configured one
    #[arg(long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Folder for ROI crops, overrides the configured one
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Only crop and classify the first N detections per image
    #[arg(long, value_name = "N")]
    max_regions: Option<NonZeroUsize>,

    /// Also write <stem>_annotated.jpg with box outlines
    #[arg(long)]
    annotate: bool,

    /// Log raw workflow responses
    #[arg(long)]
    print_raw: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.print_raw {
        logger.filter_module("panoramic_roi::inference", log::LevelFilter::Debug);
    }
    logger.init();

    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let mut cfg = {
        let _stage = ui.stage("Load configuration");
        RoiConfig::load_from(args.config.as_deref())?
    };
    if let Some(dir) = args.input_dir {
        cfg.batch.input_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        cfg.batch.output_dir = dir;
    }

    let client = WorkflowClient::new(cfg.inference.clone());
    let runner = BatchRunner::new(&client, cfg.batch.clone()).with_options(BatchOptions {
        pipeline: PipelineOptions {
            max_regions: args.max_regions.map(NonZeroUsize::get),
        },
        annotate: args.annotate,
    });

    let inputs = {
        let _stage = ui.stage("Scan input directory");
        runner.collect_inputs()?
    };
    if inputs.is_empty() {
        println!(
            "No supported images found in {}",
            cfg.batch.input_dir.display()
        );
        return Ok(());
    }

    let mut progress = ui.images(inputs.len());
    let report = runner.run(|entry| {
        let name = entry
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let outcome = match &entry.status {
            EntryStatus::LoadFailed(err) | EntryStatus::DetectionFailed(err) => {
                format!("error: {err}")
            }
            EntryStatus::NoDetections => "no ROI detected".to_string(),
            EntryStatus::Processed {
                regions, written, ..
            } => {
                for path in written {
                    progress.println(&format!("ROI saved: {}", path.display()));
                }
                format!("{regions} region(s)")
            }
        };
        progress.advance(&name, &outcome);
    })?;
    drop(progress);

    println!();
    println!("{}", report.summary);
    println!("Check results in: {}", cfg.batch.output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_regions_must_be_positive() {
        assert!(Args::try_parse_from(["roi_batch", "--max-regions", "0"]).is_err());
        let args = Args::try_parse_from(["roi_batch", "--max-regions", "1"]).unwrap();
        assert_eq!(args.max_regions.map(NonZeroUsize::get), Some(1));
    }
}
