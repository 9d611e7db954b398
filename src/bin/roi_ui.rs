//! roi_ui - browser front end for single-image ROI detection and
//! classification.
//!
//! Serves an upload page; each upload is resized to the working size,
//! sent to the detection workflow, and every detected region is cropped
//! and classified.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use panoramic_roi::{RoiConfig, UiServer, WorkflowClient};

#[derive(Parser, Debug)]
#[command(
    name = "roi_ui",
    about = "Browser UI for panoramic X-ray ROI detection and classification"
)]
struct Args {
    /// JSON or TOML config file
    #[arg(long, env = "ROI_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configured one
    #[arg(long, value_name = "HOST:PORT")]
    addr: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = RoiConfig::load_from(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        cfg.ui.addr = addr;
    }
    log::info!(
        "workspace={}, detection={}, classification={}",
        cfg.inference.workspace,
        cfg.inference.detection_workflow,
        cfg.inference.classification_workflow
    );

    let client = Arc::new(WorkflowClient::new(cfg.inference.clone()));
    let handle = UiServer::new(cfg.ui.clone(), client).spawn()?;
    log::info!("roi_ui listening on http://{}", handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    log::info!("roi_ui waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping ui server...");
    handle.stop()?;
    Ok(())
}
