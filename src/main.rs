//! CLI Entry Point for sbig-capture
//!
//! Opens the configured camera and either sets the cooler and exits, or runs
//! a capture sequence:
//!
//! ```bash
//! # Cool to -10 C and exit
//! sbig-capture --temperature -10
//!
//! # 20 exposures of 30 s through the red filter, 2x2 binned
//! sbig-capture M42 20 30 --filter Red --readout-mode 2x2
//! ```
//!
//! Without the `sbig_hardware` feature (or with `--simulate`) the camera is
//! simulated.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use mimalloc::MiMalloc;
use tracing::{info, warn};

use sbig_camera::capabilities::{Camera, FilterWheel};
use sbig_camera::config::{CaptureConfig, DEFAULT_CONFIG_PATH};
use sbig_camera::driver::mock::MockDriver;
use sbig_camera::driver::UniversalDriver;
use sbig_camera::exposure::ShutterAction;
use sbig_camera::mount::{MountClient, NoMount};
use sbig_camera::readout_mode::ReadoutModeId;
use sbig_camera::storage::RawFrameWriter;
use sbig_camera::worker::{CapturePlan, CaptureWorker};
use sbig_camera::{logging, CommandSession};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Cooler setpoints at or above this turn regulation off.
const COOLER_OFF_THRESHOLD: f64 = 40.0;

#[derive(Parser)]
#[command(name = "sbig-capture")]
#[command(about = "Cooled CCD capture sequencing for SBIG cameras", long_about = None)]
struct Cli {
    /// Target name, used in image file names
    object: Option<String>,

    /// Number of exposures
    quantity: Option<usize>,

    /// Exposure time in seconds
    duration: Option<f64>,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Cooler setpoint in Celsius; 40 or above turns the cooler off
    #[arg(long, allow_hyphen_values = true)]
    temperature: Option<f64>,

    /// Filter name to select before the first exposure
    #[arg(long)]
    filter: Option<String>,

    /// Binning (1x1, 2x2, 3x3, 9x9)
    #[arg(long)]
    readout_mode: Option<ReadoutModeId>,

    /// Shutter handling (leave-alone, open-close, close-close, open-open)
    #[arg(long)]
    shutter: Option<ShutterAction>,

    /// Do not start before this time (RFC 3339)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Do not run an exposure that would end after this time (RFC 3339)
    #[arg(long)]
    stop: Option<DateTime<Utc>>,

    /// Mount server URL
    #[arg(long)]
    telescope_url: Option<String>,

    /// Directory for captured images
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Use the simulated driver
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CaptureConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    logging::init_from_config(&config).map_err(|e| anyhow::anyhow!(e))?;

    info!("{} starting", config.application.name);
    let session = CommandSession::new(select_driver(&config))?;
    let driver = session.driver_info()?;
    info!("Using {}", driver);

    let mut device_info = session.find_device(
        &config.camera.model,
        config.camera.filter_wheel.as_deref(),
    )?;
    device_info.filters = config.slot_names().map_err(|e| anyhow::anyhow!(e))?;
    let device = session.open_device(&device_info)?;
    info!("{}", device);

    if let Some(celsius) = cli.temperature {
        let on = celsius < COOLER_OFF_THRESHOLD;
        device.set_temperature_regulation(on, celsius)?;
        info!(
            "Cooler {} (setpoint {:.1} C)",
            if on { "on" } else { "off" },
            celsius
        );
    }

    let (object, quantity, duration) = match (&cli.object, cli.quantity, cli.duration) {
        (Some(object), Some(quantity), Some(duration)) => (object.clone(), quantity, duration),
        (None, None, None) => {
            let status = device.temperature_info()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            session.close_device(&device)?;
            return Ok(());
        }
        _ => bail!("OBJECT, QUANTITY and DURATION must be given together"),
    };

    let camera: Arc<dyn Camera> = match device.main_detector() {
        Some(detector) => Arc::clone(detector) as Arc<dyn Camera>,
        None => bail!("{} has no imaging detector", device.info().name),
    };
    let filter_wheel = device
        .filter_wheel()
        .map(|wheel| Arc::clone(wheel) as Arc<dyn FilterWheel>);

    let mount: Arc<dyn MountClient> = match &config.telescope.url {
        Some(url) => {
            warn!("No mount client for {}; images carry no pointing", url);
            Arc::new(NoMount)
        }
        None => Arc::new(NoMount),
    };
    let sink = Arc::new(RawFrameWriter::new(config.exposure.output_dir.clone()));

    let mut plan = CapturePlan::new(object, quantity, duration);
    plan.readout_mode = config.exposure.readout_mode;
    plan.shutter = config.exposure.shutter;
    plan.filter = cli.filter.clone();
    if let Some(start) = cli.start {
        plan.start = start;
    }
    if let Some(stop) = cli.stop {
        plan.stop = stop;
    }

    let worker = Arc::new(CaptureWorker::new(camera, filter_wheel, mount, sink));
    let interrupt = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current exposure");
                worker.stop();
            }
        })
    };

    let result = worker.run(&plan).await;
    interrupt.abort();

    session.close_device(&device)?;
    let summary = result?;
    println!(
        "{} images saved to {}",
        summary.saved.len(),
        config.exposure.output_dir.display()
    );
    Ok(())
}

fn apply_overrides(config: &mut CaptureConfig, cli: &Cli) {
    if let Some(mode) = cli.readout_mode {
        config.exposure.readout_mode = mode;
    }
    if let Some(shutter) = cli.shutter {
        config.exposure.shutter = shutter;
    }
    if let Some(dir) = &cli.output_dir {
        config.exposure.output_dir = dir.clone();
    }
    if let Some(url) = &cli.telescope_url {
        config.telescope.url = Some(url.clone());
    }
    config.camera.simulate |= cli.simulate;
}

#[cfg(feature = "sbig_hardware")]
fn select_driver(config: &CaptureConfig) -> Box<dyn UniversalDriver> {
    if config.camera.simulate {
        Box::new(simulated_driver())
    } else {
        Box::new(sbig_camera::driver::sdk::SdkDriver::new())
    }
}

#[cfg(not(feature = "sbig_hardware"))]
fn select_driver(config: &CaptureConfig) -> Box<dyn UniversalDriver> {
    if !config.camera.simulate {
        info!("Built without sbig_hardware; using the simulated driver");
    }
    Box::new(simulated_driver())
}

fn simulated_driver() -> MockDriver {
    use sbig_camera::driver::mock::MockCamera;
    MockDriver::new(vec![MockCamera::st10(), MockCamera::st7()])
}
