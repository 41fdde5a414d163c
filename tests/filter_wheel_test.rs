//! Integration tests for FilterPositioner
//!
//! The simulated wheel needs 20 ms per slot moved, so every move below takes
//! a measurable amount of time.

mod common;

use std::time::Duration;

use common::Rig;
use sbig_camera::capabilities::FilterWheel;
use sbig_camera::driver::mock::MockDriver;
use sbig_camera::driver::CommandId;
use sbig_camera::exposure::ExposureRequest;
use sbig_camera::SbigError;

#[test]
fn test_move_by_name() {
    let rig = Rig::default();
    let device = rig.open_with_wheel("ST-7");
    let wheel = device.filter_wheel().unwrap();
    assert_eq!(wheel.active_filter_slot(), 1);
    assert_eq!(wheel.active_filter_name(), "Red");

    let elapsed = wheel.set_filter_name("Blue").unwrap();
    assert!(elapsed >= 0.02, "move took {} s", elapsed);
    assert_eq!(wheel.active_filter_slot(), 3);
    assert_eq!(wheel.active_filter_name(), "Blue");
    assert_eq!(rig.driver.filter_position(device.handle()), Some(3));
}

#[test]
fn test_unknown_name_leaves_wheel() {
    let rig = Rig::default();
    let device = rig.open_with_wheel("ST-7");
    let wheel = device.filter_wheel().unwrap();
    rig.driver.clear_log();

    assert_eq!(wheel.set_filter_name("Ha").unwrap(), 0.0);
    assert_eq!(wheel.active_filter_slot(), 1);
    assert_eq!(rig.driver.count(CommandId::Cfw), 0);
}

#[test]
fn test_unnamed_slot_has_empty_name() {
    let rig = Rig::default();
    let info = rig.session.find_device("ST-7", Some("CFW-8")).unwrap();
    let device = rig.session.open_device(&info).unwrap();
    let wheel = device.filter_wheel().unwrap();

    wheel.set_filter_slot(4).unwrap();
    assert_eq!(wheel.active_filter_slot(), 4);
    assert_eq!(wheel.active_filter_name(), "");
    assert!(wheel.slot_to_filter_map().is_empty());
}

#[test]
fn test_wheel_error_is_reported() {
    let rig = Rig::default();
    let device = rig.open_with_wheel("ST-7");
    let wheel = device.filter_wheel().unwrap();

    rig.driver.inject_filter_wheel_error(4);
    match wheel.set_filter_slot(2) {
        Err(SbigError::FilterWheel { slot, code }) => {
            assert_eq!(slot, 2);
            assert_eq!(code, 4);
        }
        other => panic!("expected filter wheel error, got {:?}", other),
    }
    assert_eq!(wheel.active_filter_slot(), 1);
}

#[test]
fn test_move_waits_for_travel() {
    let rig = Rig::new(MockDriver::default().with_filter_travel(Duration::from_millis(50)));
    let device = rig.open_with_wheel("ST-7");
    let wheel = device.filter_wheel().unwrap();

    // Four slots at 50 ms each.
    let elapsed = wheel.set_filter_slot(5).unwrap();
    assert!(elapsed >= 0.2, "move took {} s", elapsed);
    assert_eq!(rig.driver.filter_position(device.handle()), Some(5));
}

#[test]
fn test_image_records_active_filter() {
    let rig = Rig::default();
    let device = rig.open_with_wheel("ST-7");
    let wheel = device.filter_wheel().unwrap();
    wheel.set_filter_name("Green").unwrap();

    let main = device.main_detector().unwrap();
    let image = main
        .acquire(&ExposureRequest::new(0.12).with_region(0, 4, 0, 4))
        .unwrap();
    assert_eq!(image.filter_name, "Green");

    let guide = device.guide_detector().unwrap();
    let image = guide
        .acquire(&ExposureRequest::new(0.12).with_region(0, 4, 0, 4))
        .unwrap();
    assert_eq!(image.filter_name, "Green");
}

#[test]
fn test_wheel_closes_with_device() {
    let rig = Rig::default();
    let device = rig.open_with_wheel("ST-7");
    assert!(rig.driver.filter_wheel_open());

    drop(device);
    assert!(!rig.driver.filter_wheel_open());
}

#[test]
fn test_trait_object_access() {
    let rig = Rig::default();
    let device = rig.open_with_wheel("ST-7");
    let wheel: &dyn FilterWheel = &**device.filter_wheel().unwrap();

    wheel.set_filter_slot(2).unwrap();
    assert_eq!(wheel.active_filter_name(), "Green");
    assert_eq!(wheel.slot_to_filter_map().get(&4).map(String::as_str), Some("Clear"));
}
