//! Integration tests for the capture worker
//!
//! Runs whole capture plans against the simulated camera and writes frames to
//! a temporary directory.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use common::Rig;
use sbig_camera::capabilities::{Camera, FilterWheel};
use sbig_camera::image::{ObservatoryLocation, Pointing};
use sbig_camera::mount::{MountClient, NoMount};
use sbig_camera::storage::RawFrameWriter;
use sbig_camera::worker::{CapturePlan, CaptureWorker};
use sbig_camera::Device;

/// Mount that reports five equatorial samples per exposure.
#[derive(Default)]
struct ScriptedMount {
    started: AtomicUsize,
    stopped: AtomicUsize,
}

#[async_trait]
impl MountClient for ScriptedMount {
    async fn start_buffering(&self) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_buffering(&self) -> Result<()> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn coordinates(&self) -> Result<Vec<Pointing>> {
        Ok((0..5)
            .map(|i| Pointing::Equatorial {
                ra: 1.0 + f64::from(i) * 0.001,
                dec: 0.5,
            })
            .collect())
    }

    async fn location(&self) -> Result<Option<ObservatoryLocation>> {
        Ok(Some(ObservatoryLocation {
            latitude: 0.7,
            longitude: -1.2,
            altitude: 350.0,
        }))
    }
}

fn worker(device: &Device, mount: Arc<dyn MountClient>, dir: &std::path::Path) -> CaptureWorker {
    let camera: Arc<dyn Camera> = Arc::clone(device.main_detector().unwrap()) as Arc<dyn Camera>;
    let wheel = device
        .filter_wheel()
        .map(|wheel| Arc::clone(wheel) as Arc<dyn FilterWheel>);
    CaptureWorker::new(camera, wheel, mount, Arc::new(RawFrameWriter::new(dir)))
}

#[tokio::test]
async fn test_captures_requested_quantity() {
    let rig = Rig::default();
    let device = rig.open_with_wheel("ST-7");
    let dir = tempfile::tempdir().unwrap();
    let mount = Arc::new(ScriptedMount::default());
    let worker = worker(&device, Arc::clone(&mount) as Arc<dyn MountClient>, dir.path());

    let mut plan = CapturePlan::new("M42", 2, 0.12);
    plan.filter = Some("Blue".to_string());
    let summary = worker.run(&plan).await.unwrap();

    assert_eq!(summary.saved.len(), 2);
    assert_eq!(summary.aborted, 0);
    assert!(!summary.stopped_early);
    assert_eq!(mount.started.load(Ordering::SeqCst), 2);
    assert_eq!(mount.stopped.load(Ordering::SeqCst), 2);
    assert_eq!(device.filter_wheel().unwrap().active_filter_slot(), 3);

    for path in &summary.saved {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("M42_"), "unexpected file {}", name);
        assert_eq!(std::fs::metadata(path).unwrap().len(), 765 * 510 * 2);

        let meta: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path.with_extension("json")).unwrap()).unwrap();
        assert_eq!(meta["object"], "M42");
        assert_eq!(meta["filter_name"], "Blue");
        assert_eq!(meta["pointing"]["frame"], "equatorial");
        assert!((meta["pointing"]["ra"].as_f64().unwrap() - 1.002).abs() < 1e-9);
        assert_eq!(meta["location"]["altitude"], 350.0);
    }
}

#[tokio::test]
async fn test_stop_time_ends_run() {
    let rig = Rig::default();
    let device = rig.open("ST-7");
    let dir = tempfile::tempdir().unwrap();
    let worker = worker(&device, Arc::new(NoMount), dir.path());

    let mut plan = CapturePlan::new("M31", 5, 10.0);
    plan.stop = Utc::now() + chrono::Duration::seconds(1);
    let summary = worker.run(&plan).await.unwrap();

    assert!(summary.saved.is_empty());
    assert!(summary.stopped_early);
}

#[tokio::test]
async fn test_waits_for_start_time() {
    let rig = Rig::default();
    let device = rig.open("ST-7");
    let dir = tempfile::tempdir().unwrap();
    let worker = worker(&device, Arc::new(NoMount), dir.path());

    let mut plan = CapturePlan::new("M13", 1, 0.12);
    plan.start = Utc::now() + chrono::Duration::milliseconds(300);
    let summary = worker.run(&plan).await.unwrap();

    assert_eq!(summary.saved.len(), 1);
    let meta: serde_json::Value = serde_json::from_slice(
        &std::fs::read(summary.saved[0].with_extension("json")).unwrap(),
    )
    .unwrap();
    let exposure_start: chrono::DateTime<Utc> =
        serde_json::from_value(meta["exposure_start"].clone()).unwrap();
    assert!(exposure_start >= plan.start);
    assert!(meta["pointing"].is_null());
}

#[tokio::test]
async fn test_stop_aborts_current_exposure() {
    let rig = Rig::default();
    let device = rig.open("ST-7");
    let dir = tempfile::tempdir().unwrap();
    let worker = Arc::new(worker(&device, Arc::new(NoMount), dir.path()));

    let plan = CapturePlan::new("M57", 3, 5.0);
    let running = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run(&plan).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    worker.stop();
    let summary = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("worker did not stop")
        .unwrap()
        .unwrap();

    assert!(summary.saved.is_empty());
    assert_eq!(summary.aborted, 1);
    assert!(summary.stopped_early);
    assert!(!device.image_in_progress());
}
