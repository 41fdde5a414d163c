#![cfg(feature = "hardware_tests")]

use anyhow::{Context, Result};
use sbig_camera::driver::sdk::SdkDriver;
use sbig_camera::exposure::{ExposureRequest, ShutterAction};
use sbig_camera::CommandSession;

/// Smoke test against a connected camera.
///
/// Run with:
/// `SBIG_SMOKE_TEST=1 SBIG_CAMERA_MODEL=ST-7 cargo test --test hardware_smoke --features hardware_tests -- --nocapture`
#[test]
fn sbig_hardware_smoke() -> Result<()> {
    if std::env::var("SBIG_SMOKE_TEST").unwrap_or_default() != "1" {
        eprintln!("Skipping sbig_hardware_smoke (set SBIG_SMOKE_TEST=1 to enable real camera check)");
        return Ok(());
    }

    let session = CommandSession::new(SdkDriver::new()).context("open driver")?;
    let info = session.driver_info().context("driver info")?;
    eprintln!("Driver: {} {}", info.name, info.version);

    let model = std::env::var("SBIG_CAMERA_MODEL").unwrap_or_else(|_| "ST-7".to_string());
    let device_info = session
        .find_device(&model, None)
        .with_context(|| format!("find {model}"))?;
    let device = session.open_device(&device_info).context("open device")?;

    let status = device.temperature_info().context("temperature")?;
    assert!(status.main_temperature > -60.0 && status.main_temperature < 60.0);

    let main = device.main_detector().context("no main detector")?;
    let image = main
        .acquire(
            &ExposureRequest::new(0.0)
                .with_shutter(ShutterAction::CloseClose)
                .with_region(0, 32, 0, 32),
        )
        .context("dark exposure")?;
    assert_eq!((image.width, image.height), (32, 32));
    assert!(!image.aborted);

    session.close_device(&device).context("close device")?;
    Ok(())
}
