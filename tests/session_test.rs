//! Integration tests for CommandSession
//!
//! Covers handle caching, failure reporting and the guarantee that readouts
//! of different devices never interleave on the driver.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::Rig;
use sbig_camera::driver::mock::{MockCamera, MockDriver};
use sbig_camera::driver::{CcdId, CommandId, DeviceHandle, ReadoutArea, StatusCode};
use sbig_camera::readout_mode::BinningMode;
use sbig_camera::SbigError;

fn area(top: u16, height: u16) -> ReadoutArea {
    ReadoutArea {
        ccd: CcdId::Imaging,
        readout_mode: BinningMode::Rm1x1,
        top,
        left: 10,
        height,
        width: 16,
    }
}

// =============================================================================
// Handle cache
// =============================================================================

#[test]
fn test_same_handle_needs_no_switch() {
    let rig = Rig::default();
    let device = rig.open("ST-7");
    rig.driver.clear_log();

    rig.session.ccd_info(device.handle(), CcdId::Imaging).unwrap();
    rig.session.ccd_info(device.handle(), CcdId::Tracking).unwrap();

    assert_eq!(rig.driver.handle_switches(), 0);
    assert_eq!(rig.session.active_handle(), Some(device.handle()));
}

#[test]
fn test_switches_once_per_handle_change() {
    let rig = Rig::two_cameras();
    let st7 = rig.open("ST-7");
    let st10 = rig.open("ST-10");
    assert_ne!(st7.handle(), st10.handle());
    rig.driver.clear_log();

    // The ST-10 was opened last, so the driver still addresses it.
    rig.session.ccd_info(st10.handle(), CcdId::Imaging).unwrap();
    assert_eq!(rig.driver.handle_switches(), 0);

    rig.session.ccd_info(st7.handle(), CcdId::Imaging).unwrap();
    rig.session.ccd_info(st7.handle(), CcdId::Tracking).unwrap();
    assert_eq!(rig.driver.handle_switches(), 1);
    assert_eq!(rig.driver.count(CommandId::SetDriverHandle), 1);

    let log = rig.driver.command_log();
    let last = log.last().unwrap();
    assert_eq!(last.command, CommandId::GetCcdInfo);
    assert_eq!(last.handle, Some(st7.handle()));
}

#[test]
fn test_failed_switch_invalidates_cache() {
    let rig = Rig::two_cameras();
    let st7 = rig.open("ST-7");
    let st10 = rig.open("ST-10");

    rig.driver
        .inject_fault(CommandId::SetDriverHandle, StatusCode::INVALID_HANDLE);
    let err = rig
        .session
        .ccd_info(st7.handle(), CcdId::Imaging)
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INVALID_HANDLE));
    assert_eq!(rig.session.active_handle(), None);

    // With the cache cleared the next call switches even to the old handle.
    rig.driver.clear_faults();
    rig.driver.clear_log();
    rig.session.ccd_info(st10.handle(), CcdId::Imaging).unwrap();
    assert_eq!(rig.driver.count(CommandId::SetDriverHandle), 1);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_failure_reports_command_and_status() {
    let rig = Rig::default();
    let device = rig.open("ST-7");

    rig.driver
        .inject_fault(CommandId::QueryTemperatureStatus, StatusCode::RX_TIMEOUT);
    match device.temperature_info() {
        Err(SbigError::Command { command, status }) => {
            assert_eq!(command, CommandId::QueryTemperatureStatus);
            assert_eq!(status, StatusCode::RX_TIMEOUT);
        }
        other => panic!("expected command failure, got {:?}", other),
    }

    rig.driver.clear_faults();
    assert!(device.temperature_info().is_ok());
}

#[test]
fn test_unknown_handle_is_rejected() {
    let rig = Rig::default();
    let err = rig
        .session
        .ccd_info(DeviceHandle(99), CcdId::Imaging)
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INVALID_HANDLE));
}

#[test]
fn test_driver_info() {
    let rig = Rig::default();
    let info = rig.session.driver_info().unwrap();
    assert!((info.version - 4.31).abs() < 1e-9);
    assert!(info.name.contains("SBIGUDrv"));
}

#[test]
fn test_device_list_numbers_ports_from_one() {
    let rig = Rig::two_cameras();
    let devices = rig.session.device_list().unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices[0].name.contains("ST-7"));
    assert_eq!(devices[0].address.to_string(), "USB1");
    assert_eq!(devices[1].address.to_string(), "USB2");
}

// =============================================================================
// Readout
// =============================================================================

#[test]
fn test_concurrent_readouts_do_not_interleave() {
    let rig = Rig::new(
        MockDriver::new(vec![MockCamera::st7(), MockCamera::st10()])
            .with_command_latency(Duration::from_millis(1)),
    );
    let st7 = rig.open("ST-7");
    let st10 = rig.open("ST-10");
    rig.driver.clear_log();

    let workers: Vec<_> = [(st7.handle(), 0u16), (st10.handle(), 100u16)]
        .into_iter()
        .map(|(handle, top)| {
            let session = Arc::clone(&rig.session);
            thread::spawn(move || (top, session.readout(handle, area(top, 20)).unwrap()))
        })
        .collect();

    for worker in workers {
        let (top, image) = worker.join().unwrap();
        assert!(!image.aborted);
        for row in 0..20u16 {
            let expected: Vec<u16> = (0..16)
                .map(|col| MockDriver::pixel(top + row, 10 + col))
                .collect();
            assert_eq!(image.row(row).unwrap(), expected.as_slice());
        }
    }

    assert_eq!(rig.driver.max_in_flight(), 1);

    // Between start-readout and end-readout only the reading device is addressed.
    let mut reading: Option<DeviceHandle> = None;
    for entry in rig.driver.command_log() {
        match (entry.command, reading) {
            (CommandId::StartReadout, None) => reading = entry.handle,
            (CommandId::StartReadout, Some(_)) => panic!("readouts overlapped"),
            (CommandId::EndReadout, Some(handle)) => {
                assert_eq!(entry.handle, Some(handle));
                reading = None;
            }
            (_, Some(handle)) => assert_eq!(entry.handle, Some(handle)),
            _ => {}
        }
    }
    assert_eq!(rig.driver.count(CommandId::ReadoutLine), 40);
}

#[test]
fn test_readout_freezes_cooler_around_transfer() {
    let rig = Rig::default();
    let device = rig.open("ST-7");
    rig.driver.clear_log();

    rig.session.readout(device.handle(), area(0, 3)).unwrap();

    let order: Vec<CommandId> = rig
        .driver
        .command_log()
        .into_iter()
        .map(|entry| entry.command)
        .collect();
    assert_eq!(order.first(), Some(&CommandId::SetTemperatureRegulation2));
    assert_eq!(order.get(1), Some(&CommandId::StartReadout));
    assert_eq!(order.last(), Some(&CommandId::SetTemperatureRegulation2));
    assert!(!rig.driver.cooler_frozen());
}

#[test]
fn test_abort_readout_returns_partial_image() {
    let rig = Rig::new(MockDriver::default().with_command_latency(Duration::from_millis(2)));
    let device = rig.open("ST-7");
    let handle = device.handle();

    let session = Arc::clone(&rig.session);
    let reader = thread::spawn(move || session.readout(handle, area(0, 400)).unwrap());

    thread::sleep(Duration::from_millis(60));
    assert!(rig.session.readout_in_progress());
    device.main_detector().unwrap().abort_readout();

    let image = reader.join().unwrap();
    assert!(image.aborted);
    assert_eq!(image.height, 400);
    let lines = rig.driver.count(CommandId::ReadoutLine);
    assert!(lines > 0 && lines < 400, "read {} lines", lines);
    assert!(!rig.session.readout_in_progress());
    assert!(!rig.driver.cooler_frozen());
}

// =============================================================================
// Lifetime
// =============================================================================

#[test]
fn test_drop_closes_devices_and_driver() {
    let rig = Rig::two_cameras();
    let st7 = rig.open("ST-7");
    let st10 = rig.open("ST-10");
    assert_eq!(rig.driver.open_devices(), 2);

    let Rig { driver, session } = rig;
    drop(st7);
    drop(st10);
    drop(session);

    assert_eq!(driver.open_devices(), 0);
    assert!(!driver.is_driver_open());
    let mut closes: HashMap<CommandId, usize> = HashMap::new();
    for entry in driver.command_log() {
        *closes.entry(entry.command).or_default() += 1;
    }
    assert_eq!(closes.get(&CommandId::CloseDevice), Some(&2));
    assert_eq!(closes.get(&CommandId::CloseDriver), Some(&1));
}
