//! scanloop_server - local object recognition service
//!
//! This daemon:
//! 1. Loads a detector (the stub detector; the model itself is pluggable)
//! 2. Serves POST /api/recognize, GET /api/health, GET /api/test
//! 3. Stops cleanly on Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::Ordering;

use scanloop::api::{ApiConfig, ApiServer};
use scanloop::config::ServerConfig;
use scanloop::ui::Ui;
use scanloop::StubDetector;

#[derive(Parser, Debug)]
#[command(author, version, about = "Local object recognition service")]
struct Args {
    /// Listen address (overrides config file, SCANLOOP_ADDR and PORT).
    #[arg(long)]
    addr: Option<String>,

    /// Minimum score for a detection to be reported (0.0-1.0).
    #[arg(long)]
    threshold: Option<f32>,

    /// Maximum number of objects reported per frame.
    #[arg(long)]
    max_objects: Option<usize>,

    /// Candidates the stub detector reports for every frame, as class_id:score pairs.
    /// Class ids follow the COCO category table (17 = cat, 18 = dog, 1 = person).
    #[arg(long, env = "SCANLOOP_STUB_OBJECTS", default_value = "17:0.92,1:0.64,47:0.41")]
    stub_objects: String,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal(), false);

    let mut cfg = ServerConfig::load()?;
    if let Some(addr) = args.addr {
        cfg.addr = addr;
    }
    if let Some(threshold) = args.threshold {
        cfg.threshold = threshold;
    }
    if let Some(max_objects) = args.max_objects {
        cfg.max_objects = max_objects;
    }
    cfg.validate()?;

    let detector = StubDetector::from_spec(&args.stub_objects).context("parse --stub-objects")?;
    let handle = {
        let _stage = ui.stage("Load detector and bind");
        ApiServer::new(ApiConfig::from(&cfg), Box::new(detector)).spawn()?
    };
    log::info!(
        "recognition api listening on {} (threshold={}, max_objects={})",
        handle.addr,
        cfg.threshold,
        cfg.max_objects
    );

    let shutdown = handle.shutdown_flag();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, stopping recognition api...");
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("install Ctrl-C handler")?;

    log::info!("scanloop_server waiting for shutdown signal (Ctrl-C)...");
    handle.wait()?;
    log::info!("recognition api stopped");

    Ok(())
}
