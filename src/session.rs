//! The single serialized channel to the universal driver.
//!
//! The vendor driver keeps one "current device" and is not reentrant, so every
//! command in the process goes through one [`CommandSession`]:
//!
//! - A command lock guards each individual dispatch and the cached current
//!   handle. A handle-qualified dispatch only issues the (slow) set-handle
//!   command when the cached handle differs.
//! - A readout lock is held for a whole readout sequence (freeze, start, one
//!   read per row, end, unfreeze). Every dispatch also passes through it, so
//!   no other thread's command can land between two row reads. The lock is
//!   reentrant so the reading thread can keep dispatching.
//!
//! Lock order is device registry, then readout lock, then command lock.
//!
//! The session is created explicitly and shared by `Arc` with every device it
//! opens. Dropping the last reference closes the leftover devices and the
//! driver, ignoring errors.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, error, info, warn};

use crate::cancel::RunFlag;
use crate::device::Device;
use crate::device_info::{DeviceInfo, SUPPORTED_CAMERAS};
use crate::driver::{
    CcdExtendedInfo, CcdId, CcdInfo, CfwReply, CfwRequest, Command, CommandId, DeviceAddress,
    DeviceHandle, ReadoutArea, Regulation, Reply, TemperatureStatus, UniversalDriver,
};
use crate::error::{SbigError, SbigResult};
use crate::filter_wheel::FilterWheelModel;
use crate::image::Image;
use crate::readout_mode::bcd_to_f64;

/// Driver identification.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverInfo {
    /// Driver name.
    pub name: String,
    /// Driver version.
    pub version: f64,
    /// Highest command number the driver understands.
    pub max_requests: u16,
}

impl fmt::Display for DriverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} version {:.2} (max request {})",
            self.name, self.version, self.max_requests
        )
    }
}

struct OpenDevice {
    info: DeviceInfo,
    device: Weak<Device>,
}

/// Owner of the driver connection.
pub struct CommandSession {
    driver: Box<dyn UniversalDriver>,
    active: Mutex<Option<DeviceHandle>>,
    readout: ReentrantMutex<()>,
    readout_flag: RunFlag,
    devices: Mutex<HashMap<DeviceHandle, OpenDevice>>,
}

impl fmt::Debug for CommandSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSession")
            .field("active", &*self.active.lock())
            .field("open_devices", &self.devices.lock().len())
            .finish()
    }
}

fn run(driver: &dyn UniversalDriver, command: Command<'_>) -> SbigResult<Reply> {
    let id = command.id();
    driver.execute(command).map_err(|status| {
        error!("Driver command {} failed: {}", id, status);
        SbigError::Command {
            command: id,
            status,
        }
    })
}

impl CommandSession {
    /// Open the driver and wrap it in a session.
    pub fn new(driver: impl UniversalDriver + 'static) -> SbigResult<Arc<Self>> {
        let session = Self {
            driver: Box::new(driver),
            active: Mutex::new(None),
            readout: ReentrantMutex::new(()),
            readout_flag: RunFlag::new(),
            devices: Mutex::new(HashMap::new()),
        };
        session.dispatch(Command::OpenDriver)?;
        info!("Universal driver opened");
        Ok(Arc::new(session))
    }

    /// Run one command on whatever device is current.
    pub fn dispatch(&self, command: Command<'_>) -> SbigResult<Reply> {
        let _readout = self.readout.lock();
        let _active = self.active.lock();
        run(self.driver.as_ref(), command)
    }

    /// Run one command on `handle`, switching the driver to it first if needed.
    pub fn dispatch_on(&self, handle: DeviceHandle, command: Command<'_>) -> SbigResult<Reply> {
        let _readout = self.readout.lock();
        let mut active = self.active.lock();
        self.switch_to(&mut active, handle)?;
        run(self.driver.as_ref(), command)
    }

    fn switch_to(&self, active: &mut Option<DeviceHandle>, handle: DeviceHandle) -> SbigResult<()> {
        if *active == Some(handle) {
            return Ok(());
        }
        // Unknown until the switch succeeds.
        *active = None;
        run(self.driver.as_ref(), Command::SetDriverHandle(handle))?;
        *active = Some(handle);
        debug!("Switched driver to {}", handle);
        Ok(())
    }

    /// Hold the readout lock. Other threads cannot dispatch until the guard drops.
    pub fn readout_section(&self) -> ReentrantMutexGuard<'_, ()> {
        self.readout.lock()
    }

    /// Handle the driver currently addresses, if known.
    pub fn active_handle(&self) -> Option<DeviceHandle> {
        *self.active.lock()
    }

    /// Read a sub-frame from a detector that has finished exposing.
    ///
    /// Cooler regulation is frozen for the duration of the transfer. Rows are
    /// read until the area is complete or [`abort_readout`](Self::abort_readout)
    /// is called; a partial image is returned with `aborted` set.
    pub fn readout(&self, handle: DeviceHandle, area: ReadoutArea) -> SbigResult<Image> {
        let _section = self.readout_section();
        let mut image = Image::new(area.width, area.height);
        let width = usize::from(area.width);

        self.dispatch_on(
            handle,
            Command::SetTemperatureRegulation {
                regulation: Regulation::Freeze,
                setpoint: 0.0,
            },
        )?;

        let mut rows_read = 0usize;
        let mut cancelled = false;
        {
            let flag = self.readout_flag.run();
            self.dispatch_on(handle, Command::StartReadout(area))?;
            if width > 0 {
                for row in image.pixels.chunks_exact_mut(width) {
                    if !flag.is_running() {
                        cancelled = true;
                        break;
                    }
                    self.dispatch_on(
                        handle,
                        Command::ReadoutLine {
                            ccd: area.ccd,
                            readout_mode: area.readout_mode,
                            pixel_start: area.left,
                            pixel_length: area.width,
                            line: row,
                        },
                    )?;
                    rows_read += 1;
                }
            }
            self.dispatch_on(handle, Command::EndReadout(area.ccd))?;
        }

        self.dispatch_on(
            handle,
            Command::SetTemperatureRegulation {
                regulation: Regulation::Unfreeze,
                setpoint: 0.0,
            },
        )?;

        if cancelled {
            warn!(
                "Readout of {} on {} stopped after {} of {} rows",
                area.ccd, handle, rows_read, area.height
            );
            image.aborted = true;
        }
        Ok(image)
    }

    /// Stop a readout in progress after the current row.
    pub fn abort_readout(&self) {
        self.readout_flag.stop();
    }

    /// True while a readout is transferring rows.
    pub fn readout_in_progress(&self) -> bool {
        self.readout_flag.is_running()
    }

    /// Name and version of the loaded driver.
    pub fn driver_info(&self) -> SbigResult<DriverInfo> {
        match self.dispatch(Command::GetDriverInfo)? {
            Reply::DriverInfo(raw) => Ok(DriverInfo {
                name: raw.name,
                version: bcd_to_f64(u32::from(raw.version)),
                max_requests: raw.max_requests,
            }),
            _ => Err(SbigError::UnexpectedReply(CommandId::GetDriverInfo)),
        }
    }

    /// Cameras attached over USB.
    pub fn device_list(&self) -> SbigResult<Vec<DeviceInfo>> {
        let cameras = match self.dispatch(Command::QueryUsb)? {
            Reply::UsbCameras(cameras) => cameras,
            _ => return Err(SbigError::UnexpectedReply(CommandId::QueryUsb2)),
        };
        Ok(cameras
            .into_iter()
            .map(|camera| {
                DeviceInfo::new(
                    camera.name,
                    camera.serial,
                    DeviceAddress::Usb(camera.port.saturating_add(1)),
                )
            })
            .collect())
    }

    /// First connected device whose name contains `model`.
    pub fn find_device(&self, model: &str, filter_wheel: Option<&str>) -> SbigResult<DeviceInfo> {
        if !SUPPORTED_CAMERAS.contains(&model) {
            return Err(SbigError::UnsupportedCamera(model.to_string()));
        }
        if let Some(wheel) = filter_wheel {
            FilterWheelModel::from_name(wheel)?;
        }

        let mut info = self
            .device_list()?
            .into_iter()
            .find(|info| info.name.contains(model))
            .ok_or_else(|| SbigError::DeviceNotFound(model.to_string()))?;
        info.filter_wheel = filter_wheel.map(str::to_string);
        info!("Found {}", info);
        Ok(info)
    }

    /// Open `info`, or return it if it is already open.
    pub fn open_device(self: &Arc<Self>, info: &DeviceInfo) -> SbigResult<Arc<Device>> {
        let mut devices = self.devices.lock();

        let existing = devices
            .iter()
            .find(|(_, open)| open.info == *info)
            .map(|(handle, open)| (*handle, open.device.upgrade()));
        let handle = match existing {
            Some((_, Some(device))) => return Ok(device),
            Some((handle, None)) => {
                debug!("Re-initializing {} on {}", info.name, handle);
                handle
            }
            None => {
                let handle = self.open_handle(info.address)?;
                devices.insert(
                    handle,
                    OpenDevice {
                        info: info.clone(),
                        device: Weak::new(),
                    },
                );
                info!("Opened {} on {}", info, handle);
                handle
            }
        };
        drop(devices);

        let device = match Device::initialize(Arc::clone(self), info.clone(), handle) {
            Ok(device) => Arc::new(device),
            Err(err) => {
                self.devices.lock().remove(&handle);
                let _ = self.release_handle(handle);
                return Err(err);
            }
        };
        if let Some(open) = self.devices.lock().get_mut(&handle) {
            open.device = Arc::downgrade(&device);
        }
        Ok(device)
    }

    fn open_handle(&self, address: DeviceAddress) -> SbigResult<DeviceHandle> {
        let _readout = self.readout.lock();
        let mut active = self.active.lock();
        let driver = self.driver.as_ref();

        // Open-device moves the driver to a fresh handle we do not know yet.
        *active = None;
        run(driver, Command::OpenDevice(address))?;
        let handle = match run(driver, Command::GetDriverHandle)? {
            Reply::Handle(handle) => handle,
            _ => return Err(SbigError::UnexpectedReply(CommandId::GetDriverHandle)),
        };
        run(driver, Command::SetDriverHandle(handle))?;
        *active = Some(handle);
        run(driver, Command::EstablishLink)?;
        Ok(handle)
    }

    fn release_handle(&self, handle: DeviceHandle) -> SbigResult<()> {
        let _readout = self.readout.lock();
        let mut active = self.active.lock();
        self.switch_to(&mut active, handle)?;
        let result = run(self.driver.as_ref(), Command::CloseDevice);
        *active = None;
        result.map(|_| ())
    }

    /// Unregister `device` and close its handle.
    pub fn close_device(&self, device: &Device) -> SbigResult<()> {
        let handle = device.handle();
        self.devices.lock().remove(&handle);
        self.release_handle(handle)?;
        info!("Closed {} on {}", device.info().name, handle);
        Ok(())
    }

    /// Number of devices registered with the session.
    pub fn open_device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Standard CCD information for one detector.
    pub fn ccd_info(&self, handle: DeviceHandle, ccd: CcdId) -> SbigResult<CcdInfo> {
        match self.dispatch_on(handle, Command::GetCcdInfo(ccd))? {
            Reply::CcdInfo(info) => Ok(info),
            _ => Err(SbigError::UnexpectedReply(CommandId::GetCcdInfo)),
        }
    }

    /// Extended CCD information for one detector.
    pub fn ccd_extended_info(
        &self,
        handle: DeviceHandle,
        ccd: CcdId,
    ) -> SbigResult<CcdExtendedInfo> {
        match self.dispatch_on(handle, Command::GetCcdExtendedInfo(ccd))? {
            Reply::CcdExtendedInfo(info) => Ok(info),
            _ => Err(SbigError::UnexpectedReply(CommandId::GetCcdInfo)),
        }
    }

    /// Raw status bits of a previously issued command.
    pub fn command_status(&self, handle: DeviceHandle, command: CommandId) -> SbigResult<u16> {
        match self.dispatch_on(handle, Command::QueryCommandStatus(command))? {
            Reply::CommandStatus(bits) => Ok(bits),
            _ => Err(SbigError::UnexpectedReply(CommandId::QueryCommandStatus)),
        }
    }

    /// Full cooler status.
    pub fn temperature_status(&self, handle: DeviceHandle) -> SbigResult<TemperatureStatus> {
        match self.dispatch_on(handle, Command::QueryTemperatureStatus)? {
            Reply::Temperature(status) => Ok(status),
            _ => Err(SbigError::UnexpectedReply(CommandId::QueryTemperatureStatus)),
        }
    }

    /// Send a filter wheel request.
    pub fn cfw(&self, handle: DeviceHandle, request: CfwRequest) -> SbigResult<CfwReply> {
        match self.dispatch_on(handle, Command::Cfw(request))? {
            Reply::Cfw(reply) => Ok(reply),
            _ => Err(SbigError::UnexpectedReply(CommandId::Cfw)),
        }
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        let handles: Vec<DeviceHandle> = self.devices.lock().drain().map(|(h, _)| h).collect();
        for handle in handles {
            if let Err(err) = self.release_handle(handle) {
                warn!("Failed to close device on {} during shutdown: {}", handle, err);
            }
        }
        match self.dispatch(Command::CloseDriver) {
            Ok(_) => info!("Universal driver closed"),
            Err(err) => warn!("Failed to close universal driver: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use crate::driver::StatusCode;
    use crate::readout_mode::BinningMode;

    #[test]
    fn test_new_opens_driver() {
        let driver = Arc::new(MockDriver::default());
        let session = CommandSession::new(Arc::clone(&driver)).unwrap();
        assert!(driver.is_driver_open());
        drop(session);
        assert!(!driver.is_driver_open());
    }

    #[test]
    fn test_failure_carries_status() {
        let driver = Arc::new(MockDriver::default());
        let session = CommandSession::new(Arc::clone(&driver)).unwrap();
        driver.inject_fault(CommandId::GetDriverInfo, StatusCode::RX_TIMEOUT);
        let err = session.driver_info().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::RX_TIMEOUT));
    }

    #[test]
    fn test_driver_info_decodes_version() {
        let session = CommandSession::new(MockDriver::default()).unwrap();
        let info = session.driver_info().unwrap();
        assert!((info.version - 4.31).abs() < 1e-9);
    }

    #[test]
    fn test_readout_fills_rows() {
        let driver = Arc::new(MockDriver::default());
        let session = CommandSession::new(Arc::clone(&driver)).unwrap();
        let handle = session.open_handle(DeviceAddress::Usb(1)).unwrap();
        let image = session
            .readout(
                handle,
                ReadoutArea {
                    ccd: CcdId::Imaging,
                    readout_mode: BinningMode::Rm1x1,
                    top: 2,
                    left: 3,
                    height: 4,
                    width: 5,
                },
            )
            .unwrap();
        assert!(!image.aborted);
        assert_eq!(image.row(1).unwrap()[0], MockDriver::pixel(3, 3));
        assert_eq!(driver.count(CommandId::ReadoutLine), 4);
        assert_eq!(
            driver.regulation_log(),
            vec![Regulation::Freeze, Regulation::Unfreeze]
        );
        assert!(!session.readout_in_progress());
    }
}
