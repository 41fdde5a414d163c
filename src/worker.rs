//! Capture loop.
//!
//! Runs a [`CapturePlan`]: move the filter wheel, wait for the start time, then
//! take exposures until the count is reached or the next exposure would end
//! after the stop time. Hardware calls block, so they run on tokio's blocking
//! pool; mount and storage calls are awaited on the runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cancel::RunFlag;
use crate::capabilities::{Camera, FilterWheel};
use crate::exposure::{ExposureRequest, ShutterAction};
use crate::mount::{midpoint, MountClient};
use crate::readout_mode::ReadoutModeId;
use crate::storage::ImageSink;

const START_POLL: Duration = Duration::from_millis(100);

/// What to capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturePlan {
    /// Target name, used in file names.
    pub object: String,
    /// Number of exposures.
    pub quantity: usize,
    /// Exposure time, seconds.
    pub duration: f64,
    /// Binning.
    pub readout_mode: ReadoutModeId,
    /// Shutter handling.
    pub shutter: ShutterAction,
    /// Filter to select before the first exposure.
    pub filter: Option<String>,
    /// Do not start before this time.
    pub start: DateTime<Utc>,
    /// Do not run an exposure that would end after this time.
    pub stop: DateTime<Utc>,
}

impl CapturePlan {
    /// Plan starting now and stopping one day from now.
    pub fn new(object: impl Into<String>, quantity: usize, duration: f64) -> Self {
        let now = Utc::now();
        Self {
            object: object.into(),
            quantity,
            duration,
            readout_mode: ReadoutModeId::Bin1x1,
            shutter: ShutterAction::OpenClose,
            filter: None,
            start: now,
            stop: now + chrono::Duration::days(1),
        }
    }

    fn request(&self) -> ExposureRequest {
        ExposureRequest::new(self.duration)
            .with_readout_mode(self.readout_mode)
            .with_shutter(self.shutter)
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSummary {
    /// Files written, in order.
    pub saved: Vec<PathBuf>,
    /// Exposures that came back aborted and were not saved.
    pub aborted: usize,
    /// True if the stop time or a stop request ended the run early.
    pub stopped_early: bool,
}

/// Drives a camera, filter wheel, mount and image sink through a plan.
pub struct CaptureWorker {
    camera: Arc<dyn Camera>,
    filter_wheel: Option<Arc<dyn FilterWheel>>,
    mount: Arc<dyn MountClient>,
    sink: Arc<dyn ImageSink>,
    running: RunFlag,
}

impl CaptureWorker {
    /// Worker for `camera`, saving to `sink`.
    pub fn new(
        camera: Arc<dyn Camera>,
        filter_wheel: Option<Arc<dyn FilterWheel>>,
        mount: Arc<dyn MountClient>,
        sink: Arc<dyn ImageSink>,
    ) -> Self {
        Self {
            camera,
            filter_wheel,
            mount,
            sink,
            running: RunFlag::new(),
        }
    }

    /// Stop after the current exposure, aborting it if it is still waiting.
    pub fn stop(&self) {
        self.running.stop();
        self.camera.abort_exposure();
    }

    /// Execute `plan`.
    pub async fn run(&self, plan: &CapturePlan) -> Result<CaptureSummary> {
        self.running.start();
        let result = self.run_plan(plan).await;
        self.running.stop();
        result
    }

    async fn run_plan(&self, plan: &CapturePlan) -> Result<CaptureSummary> {
        let mut summary = CaptureSummary::default();

        if let (Some(wheel), Some(filter)) = (&self.filter_wheel, &plan.filter) {
            let wheel = Arc::clone(wheel);
            let filter = filter.clone();
            tokio::task::spawn_blocking(move || wheel.set_filter_name(&filter))
                .await
                .context("Filter wheel task failed")?
                .context("Failed to select filter")?;
        }

        if Utc::now() < plan.start {
            info!("Waiting until {} to start exposures", plan.start);
        }
        while Utc::now() < plan.start {
            if !self.running.is_running() {
                summary.stopped_early = true;
                return Ok(summary);
            }
            tokio::time::sleep(START_POLL).await;
        }

        let exposure = chrono::Duration::milliseconds((plan.duration * 1000.0) as i64);
        for number in 0..plan.quantity {
            if !self.running.is_running() {
                info!("Capture stopped after {} exposures", number);
                summary.stopped_early = true;
                break;
            }
            if Utc::now() + exposure > plan.stop {
                info!("Stop time {} reached after {} exposures", plan.stop, number);
                summary.stopped_early = true;
                break;
            }
            debug!("Starting exposure {} of {}", number + 1, plan.quantity);

            self.mount
                .start_buffering()
                .await
                .context("Mount failed to start buffering")?;

            let camera = Arc::clone(&self.camera);
            let request = plan.request();
            let mut image = tokio::task::spawn_blocking(move || camera.acquire(&request))
                .await
                .context("Exposure task failed")?
                .context("Exposure failed")?;

            self.mount
                .stop_buffering()
                .await
                .context("Mount failed to stop buffering")?;

            if image.aborted {
                warn!("Exposure {} was aborted; not saved", number + 1);
                summary.aborted += 1;
                continue;
            }

            let coordinates = self.mount.coordinates().await.context("No mount coordinates")?;
            image.pointing = midpoint(&coordinates);
            image.location = self.mount.location().await.context("No mount location")?;
            image.object = plan.object.clone();

            let name = format!(
                "{}_{}",
                plan.object,
                Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
            );
            let path = self.sink.save(&image, &name).await.context("Failed to save image")?;
            summary.saved.push(path);
        }

        info!(
            "Capture of '{}' finished: {} saved, {} aborted",
            plan.object,
            summary.saved.len(),
            summary.aborted
        );
        Ok(summary)
    }
}
