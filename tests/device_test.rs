//! Integration tests for device bootstrap and the device registry

mod common;

use std::sync::Arc;

use common::Rig;
use sbig_camera::driver::mock::{MockCamera, MockDriver};
use sbig_camera::driver::{CommandId, DeviceAddress, Regulation};
use sbig_camera::{DeviceInfo, SbigError};

#[test]
fn test_st_series_builds_both_detectors() {
    let rig = Rig::default();
    let device = rig.open("ST-7");

    let main = device.main_detector().unwrap();
    let guide = device.guide_detector().unwrap();
    assert!(!main.ccd().is_guide());
    assert!(guide.ccd().is_guide());
    assert!(device.filter_wheel().is_none());
    assert!(!device.image_in_progress());
    assert_eq!(rig.session.open_device_count(), 1);
}

#[test]
fn test_no_guide_without_firmware() {
    let rig = Rig::new(MockDriver::new(vec![
        MockCamera::st7().with_firmware_version(0)
    ]));
    let device = rig.open("ST-7");
    assert!(device.main_detector().is_some());
    assert!(device.guide_detector().is_none());
}

#[test]
fn test_pixcel_has_no_detectors() {
    let rig = Rig::new(MockDriver::new(vec![
        MockCamera::st7().with_name("SBIG PixCel 255")
    ]));
    let info = DeviceInfo::new("SBIG PixCel 255", "07-1001", DeviceAddress::Usb(1));
    let device = rig.session.open_device(&info).unwrap();

    assert!(device.main_detector().is_none());
    assert!(device.guide_detector().is_none());
    assert!(!device.image_in_progress());
}

#[test]
fn test_unknown_family_releases_handle() {
    let rig = Rig::default();
    let info = DeviceInfo::new("Mystery Camera", "0000", DeviceAddress::Usb(1));

    let err = rig.session.open_device(&info).unwrap_err();
    assert!(matches!(err, SbigError::UnknownDeviceFamily(_)));
    assert_eq!(rig.session.open_device_count(), 0);
    assert_eq!(rig.driver.open_devices(), 0);
    assert_eq!(rig.driver.count(CommandId::CloseDevice), 1);
}

#[test]
fn test_open_failure_carries_status() {
    let rig = Rig::default();
    let info = DeviceInfo::new("SBIG ST-7", "x", DeviceAddress::Usb(5));

    let err = rig.session.open_device(&info).unwrap_err();
    assert!(matches!(err, SbigError::Command { command: CommandId::OpenDevice, .. }));
    assert_eq!(rig.session.open_device_count(), 0);
}

#[test]
fn test_open_twice_returns_same_device() {
    let rig = Rig::default();
    let first = rig.open("ST-7");
    let second = rig.open("ST-7");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(rig.driver.count(CommandId::OpenDevice), 1);
}

#[test]
fn test_reopen_after_drop_reuses_handle() {
    let rig = Rig::default();
    let handle = rig.open("ST-7").handle();

    let again = rig.open("ST-7");
    assert_eq!(again.handle(), handle);
    assert_eq!(rig.driver.count(CommandId::OpenDevice), 1);
    assert_eq!(rig.session.open_device_count(), 1);
}

#[test]
fn test_close_device() {
    let rig = Rig::two_cameras();
    let st7 = rig.open("ST-7");
    let st10 = rig.open("ST-10");

    rig.session.close_device(&st7).unwrap();
    assert_eq!(rig.session.open_device_count(), 1);
    assert_eq!(rig.driver.open_devices(), 1);
    assert_eq!(rig.session.active_handle(), None);

    // The remaining device still works after the close.
    assert!(st10.temperature_info().is_ok());
    assert_eq!(rig.session.active_handle(), Some(st10.handle()));
}

#[test]
fn test_find_device_rejects_unsupported_models() {
    let rig = Rig::default();
    assert!(matches!(
        rig.session.find_device("ST-99", None),
        Err(SbigError::UnsupportedCamera(_))
    ));
    assert!(matches!(
        rig.session.find_device("ST-7", Some("CFW-99")),
        Err(SbigError::UnsupportedFilterWheel(_))
    ));
    assert!(matches!(
        rig.session.find_device("ST-8", None),
        Err(SbigError::DeviceNotFound(_))
    ));
}

#[test]
fn test_filter_wheel_from_device_info() {
    let rig = Rig::default();
    let info = rig.wheel_info("ST-7");
    assert_eq!(info.filter_wheel.as_deref(), Some("CFW-8"));

    let device = rig.session.open_device(&info).unwrap();
    let wheel = device.filter_wheel().unwrap();
    assert_eq!(wheel.model().name(), "CFW-8");
    assert_eq!(
        wheel.filter_names(),
        vec!["Red", "Green", "Blue", "Clear", "None"]
    );
}

#[test]
fn test_temperature_regulation() {
    let rig = Rig::default();
    let device = rig.open("ST-7");
    rig.driver.clear_log();

    device.set_temperature_regulation(true, -15.0).unwrap();
    let status = device.temperature_info().unwrap();
    assert!(status.regulation_on);
    assert!((status.main_setpoint + 15.0).abs() < 1e-9);
    assert!((status.main_temperature + 15.0).abs() < 1e-9);
    assert!((status.tracking_temperature + 13.5).abs() < 1e-9);
    assert!((status.heatsink_temperature - 24.0).abs() < 1e-9);

    device.set_temperature_regulation(false, 40.0).unwrap();
    assert!(!device.temperature_info().unwrap().regulation_on);
    assert_eq!(
        rig.driver.regulation_log(),
        vec![Regulation::On, Regulation::Off]
    );
}

#[test]
fn test_display_lists_detectors() {
    let rig = Rig::default();
    let device = rig.open("ST-7");
    let text = device.to_string();
    assert!(text.contains("ST-7"));
    assert!(text.contains("Readout Modes"));
}
