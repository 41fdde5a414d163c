//! Simulated Universal Driver
//!
//! Provides an in-process stand-in for the vendor driver so the session,
//! detector and filter-wheel state machines can run without a camera.
//!
//! # Simulation
//!
//! - Cameras are enumerated on USB ports in the order given
//! - Exposures complete after their requested time; completion is reported
//!   through the start-exposure command status bits (imaging bits 0-1,
//!   tracking bits 2-3)
//! - Readout fills each row with a deterministic pattern (see
//!   [`MockDriver::pixel`])
//! - The filter wheel travels at a fixed time per slot
//!
//! # Inspection
//!
//! Every command is logged together with the handle that was current when it
//! ran, up to [`COMMAND_LOG_CAPACITY`] entries; older entries are dropped. The
//! parameters of the last start-exposure per sensor are kept. Handle switches and the peak number of concurrently executing commands
//! are counted so tests can check the session's serialization guarantees.
//! Faults can be injected per command id.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::{
    CcdExtendedInfo, CcdId, CcdInfo, CfwCommand, CfwReply, CfwRequest, Command, CommandId,
    DeviceAddress, DeviceHandle, ExposureParams, RawDriverInfo, RawReadoutInfo, Regulation, Reply, StatusCode,
    TemperatureStatus, UniversalDriver, UsbCamera,
};
use crate::detector::CameraType;

/// One simulated sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct MockSensor {
    /// Readout modes reported by the CCD-info query.
    pub modes: Vec<RawReadoutInfo>,
    /// Extended capability bits.
    pub capabilities_bits: u16,
}

/// One simulated camera.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCamera {
    /// Name reported by enumeration and CCD info.
    pub name: String,
    /// Serial number.
    pub serial: String,
    /// Raw camera type.
    pub camera_type: u16,
    /// Firmware version, BCD.
    pub firmware_version: u16,
    /// Imaging sensor.
    pub imaging: MockSensor,
    /// Tracking sensor, if fitted.
    pub tracking: Option<MockSensor>,
}

fn mode(mode: u16, width: u16, height: u16, gain: u16, pixel_w: u32, pixel_h: u32) -> RawReadoutInfo {
    RawReadoutInfo {
        mode,
        width,
        height,
        gain,
        pixel_width: pixel_w,
        pixel_height: pixel_h,
    }
}

fn tc211_tracking() -> MockSensor {
    MockSensor {
        modes: vec![
            mode(0, 192, 165, 0x0100, 0x1375, 0x1600),
            mode(1, 96, 82, 0x0100, 0x2750, 0x3200),
            mode(2, 64, 55, 0x0100, 0x4125, 0x4800),
        ],
        capabilities_bits: 0,
    }
}

impl MockCamera {
    /// ST-7: 765x510 imaging sensor at 9 microns with a TC-211 tracking chip.
    pub fn st7() -> Self {
        Self {
            name: "SBIG ST-7 Dual CCD Camera".to_string(),
            serial: "07-1001".to_string(),
            camera_type: CameraType::St7.code(),
            firmware_version: 0x0120,
            imaging: MockSensor {
                modes: vec![
                    mode(0, 765, 510, 0x0230, 0x0900, 0x0900),
                    mode(1, 382, 255, 0x0230, 0x1800, 0x1800),
                    mode(2, 255, 170, 0x0230, 0x2700, 0x2700),
                    mode(3, 765, 510, 0x0230, 0x0900, 0x0900),
                    mode(9, 85, 56, 0x0230, 0x8100, 0x8100),
                ],
                capabilities_bits: 0,
            },
            tracking: Some(tc211_tracking()),
        }
    }

    /// ST-10: 2184x1472 imaging sensor at 6.8 microns.
    pub fn st10() -> Self {
        Self {
            name: "SBIG ST-10 Dual CCD Camera".to_string(),
            serial: "10-2002".to_string(),
            camera_type: CameraType::St10.code(),
            firmware_version: 0x0141,
            imaging: MockSensor {
                modes: vec![
                    mode(0, 2184, 1472, 0x0130, 0x0680, 0x0680),
                    mode(1, 1092, 736, 0x0130, 0x1360, 0x1360),
                    mode(2, 728, 490, 0x0130, 0x2040, 0x2040),
                    mode(9, 242, 163, 0x0130, 0x6120, 0x6120),
                ],
                capabilities_bits: 0,
            },
            tracking: Some(tc211_tracking()),
        }
    }

    /// Replace the reported name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the serial number.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Replace the raw camera type.
    pub fn with_camera_type(mut self, camera_type: CameraType) -> Self {
        self.camera_type = camera_type.code();
        self
    }

    /// Replace the BCD firmware version.
    pub fn with_firmware_version(mut self, version: u16) -> Self {
        self.firmware_version = version;
        self
    }

    /// Replace the imaging sensor's capability bits.
    pub fn with_imaging_capabilities(mut self, bits: u16) -> Self {
        self.imaging.capabilities_bits = bits;
        self
    }

    fn sensor(&self, ccd: CcdId) -> Option<&MockSensor> {
        match ccd {
            CcdId::Imaging => Some(&self.imaging),
            CcdId::Tracking => self.tracking.as_ref(),
            CcdId::ExternalTracking => None,
        }
    }
}

/// A command as seen by the simulated driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedCommand {
    /// Command number.
    pub command: CommandId,
    /// Handle current when the command ran.
    pub handle: Option<DeviceHandle>,
}

#[derive(Debug)]
struct MockExposure {
    started: Instant,
    duration: Duration,
}

#[derive(Debug)]
struct MockReadout {
    ccd: CcdId,
    top: u16,
    row: u16,
}

#[derive(Debug)]
struct MockCooler {
    cooling: bool,
    frozen: bool,
    setpoint: f64,
}

#[derive(Debug)]
struct MockWheel {
    open: bool,
    model: u16,
    position: u16,
    target: u16,
    arrive: Option<Instant>,
}

impl MockWheel {
    fn settle(&mut self) {
        if let Some(arrive) = self.arrive {
            if Instant::now() >= arrive {
                self.position = self.target;
                self.arrive = None;
            }
        }
    }

    fn apply(&mut self, req: CfwRequest, travel: Duration, injected_error: u16) -> CfwReply {
        self.settle();
        match req.command {
            CfwCommand::OpenDevice => {
                self.open = true;
                self.model = req.model;
            }
            CfwCommand::CloseDevice => self.open = false,
            CfwCommand::Init if self.open => {
                self.position = 1;
                self.target = 1;
                self.arrive = None;
            }
            CfwCommand::Goto if self.open => {
                let target = u16::try_from(req.param1).unwrap_or(u16::MAX);
                let slots = u32::from(self.position.abs_diff(target).max(1));
                self.target = target;
                self.arrive = Some(Instant::now() + travel * slots);
            }
            _ => {}
        }

        let moving = self.arrive.is_some();
        let error = if injected_error != 0 {
            injected_error
        } else if !self.open && req.command != CfwCommand::CloseDevice {
            7 // CFWE_DEVICE_NOT_OPEN
        } else {
            0
        };
        CfwReply {
            model: self.model,
            position: if moving { 0 } else { self.position },
            status: if moving { 2 } else { 1 },
            error,
            result1: 0,
            result2: 0,
        }
    }
}

#[derive(Debug)]
struct MockDevice {
    camera: usize,
    exposures: HashMap<CcdId, MockExposure>,
    readout: Option<MockReadout>,
    cooler: MockCooler,
    wheel: MockWheel,
}

impl MockDevice {
    fn new(camera: usize) -> Self {
        Self {
            camera,
            exposures: HashMap::new(),
            readout: None,
            cooler: MockCooler {
                cooling: false,
                frozen: false,
                setpoint: 0.0,
            },
            wheel: MockWheel {
                open: false,
                model: 0,
                position: 1,
                target: 1,
                arrive: None,
            },
        }
    }
}

struct MockState {
    driver_open: bool,
    cameras: Vec<MockCamera>,
    devices: HashMap<DeviceHandle, MockDevice>,
    next_handle: i16,
    current: Option<DeviceHandle>,
    log: VecDeque<LoggedCommand>,
    handle_switches: usize,
    faults: HashMap<CommandId, StatusCode>,
    cfw_error: u16,
    regulation_log: VecDeque<Regulation>,
    exposures: HashMap<CcdId, ExposureParams>,
}

/// Entries kept in the command and regulation logs.
pub const COMMAND_LOG_CAPACITY: usize = 65_536;

fn push_bounded<T>(log: &mut VecDeque<T>, entry: T) {
    if log.len() == COMMAND_LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(entry);
}

const AMBIENT_C: f64 = 18.5;
const HEATSINK_C: f64 = 24.0;

/// Simulated vendor driver.
pub struct MockDriver {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
    filter_travel: Duration,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new(vec![MockCamera::st7()])
    }
}

impl MockDriver {
    /// Driver with the given cameras on USB1, USB2, ...
    pub fn new(cameras: Vec<MockCamera>) -> Self {
        Self {
            state: Mutex::new(MockState {
                driver_open: false,
                cameras,
                devices: HashMap::new(),
                next_handle: 0,
                current: None,
                log: VecDeque::new(),
                handle_switches: 0,
                faults: HashMap::new(),
                cfw_error: 0,
                regulation_log: VecDeque::new(),
                exposures: HashMap::new(),
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
            filter_travel: Duration::from_millis(20),
        }
    }

    /// Delay every command by `latency`. Makes overlapping calls observable.
    pub fn with_command_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Time the filter wheel needs per slot moved.
    pub fn with_filter_travel(mut self, per_slot: Duration) -> Self {
        self.filter_travel = per_slot;
        self
    }

    /// Pixel value produced at `(row, column)` of a full-frame readout.
    pub fn pixel(row: u16, column: usize) -> u16 {
        let value = (usize::from(row) * 7 + column) % 1000;
        1000 + value as u16
    }

    /// Make every `command` fail with `status` until cleared.
    pub fn inject_fault(&self, command: CommandId, status: StatusCode) {
        self.state.lock().faults.insert(command, status);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.faults.clear();
        state.cfw_error = 0;
    }

    /// Report `code` in the error field of every filter wheel reply.
    pub fn inject_filter_wheel_error(&self, code: u16) {
        self.state.lock().cfw_error = code;
    }

    /// Commands executed so far, oldest first.
    pub fn command_log(&self) -> Vec<LoggedCommand> {
        self.state.lock().log.iter().copied().collect()
    }

    /// Forget the command log and counters.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.log.clear();
        state.handle_switches = 0;
        state.regulation_log.clear();
        state.exposures.clear();
    }

    /// Parameters of the last start-exposure sent for `ccd`.
    pub fn last_exposure(&self, ccd: CcdId) -> Option<ExposureParams> {
        self.state.lock().exposures.get(&ccd).copied()
    }

    /// Number of times `command` was executed.
    pub fn count(&self, command: CommandId) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|entry| entry.command == command)
            .count()
    }

    /// Number of successful handle switches.
    pub fn handle_switches(&self) -> usize {
        self.state.lock().handle_switches
    }

    /// Regulation modes requested, in order.
    pub fn regulation_log(&self) -> Vec<Regulation> {
        self.state.lock().regulation_log.iter().copied().collect()
    }

    /// Highest number of commands that were executing at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// True between open-driver and close-driver.
    pub fn is_driver_open(&self) -> bool {
        self.state.lock().driver_open
    }

    /// Number of devices currently open.
    pub fn open_devices(&self) -> usize {
        self.state.lock().devices.len()
    }

    /// True if any device has its filter wheel port open.
    pub fn filter_wheel_open(&self) -> bool {
        self.state.lock().devices.values().any(|d| d.wheel.open)
    }

    /// True if any device has its cooler regulation frozen.
    pub fn cooler_frozen(&self) -> bool {
        self.state.lock().devices.values().any(|d| d.cooler.frozen)
    }

    /// Current filter wheel slot of the device behind `handle`.
    pub fn filter_position(&self, handle: DeviceHandle) -> Option<u16> {
        let mut state = self.state.lock();
        let device = state.devices.get_mut(&handle)?;
        device.wheel.settle();
        Some(device.wheel.position)
    }
}

impl MockState {
    fn apply(&mut self, command: Command<'_>, filter_travel: Duration) -> Result<Reply, StatusCode> {
        let id = command.id();
        push_bounded(
            &mut self.log,
            LoggedCommand {
                command: id,
                handle: self.current,
            },
        );
        if let Command::StartExposure(params) = &command {
            self.exposures.insert(params.ccd, *params);
        }

        if let Some(status) = self.faults.get(&id) {
            return Err(*status);
        }
        if !self.driver_open && id != CommandId::OpenDriver {
            return Err(StatusCode::DRIVER_NOT_OPEN);
        }

        match command {
            Command::OpenDriver => {
                self.driver_open = true;
                Ok(Reply::Done)
            }
            Command::CloseDriver => {
                self.driver_open = false;
                Ok(Reply::Done)
            }
            Command::GetDriverInfo => Ok(Reply::DriverInfo(RawDriverInfo {
                version: 0x0431,
                name: "SBIGUDrv (simulated)".to_string(),
                max_requests: CommandId::QueryUsb2.code(),
            })),
            Command::QueryUsb => Ok(Reply::UsbCameras(
                self.cameras
                    .iter()
                    .take(8)
                    .enumerate()
                    .map(|(port, camera)| UsbCamera {
                        port: port as u8,
                        camera_type: camera.camera_type,
                        name: camera.name.clone(),
                        serial: camera.serial.clone(),
                    })
                    .collect(),
            )),
            Command::OpenDevice(address) => {
                let index = match address {
                    DeviceAddress::Usb(port) => usize::from(port).checked_sub(1),
                    DeviceAddress::UsbAny => Some(0),
                    DeviceAddress::Lpt(_) | DeviceAddress::Ethernet(_) => None,
                }
                .filter(|index| *index < self.cameras.len())
                .ok_or(StatusCode::DEVICE_NOT_FOUND)?;

                if self.devices.values().any(|device| device.camera == index) {
                    return Err(StatusCode::DEVICE_NOT_CLOSED);
                }

                let handle = DeviceHandle(self.next_handle);
                self.next_handle += 1;
                self.devices.insert(handle, MockDevice::new(index));
                self.current = Some(handle);
                Ok(Reply::Done)
            }
            Command::CloseDevice => {
                let handle = self.current.take().ok_or(StatusCode::DEVICE_NOT_OPEN)?;
                self.devices.remove(&handle);
                Ok(Reply::Done)
            }
            Command::GetDriverHandle => self
                .current
                .map(Reply::Handle)
                .ok_or(StatusCode::DEVICE_NOT_OPEN),
            Command::SetDriverHandle(handle) => {
                if !self.devices.contains_key(&handle) {
                    return Err(StatusCode::INVALID_HANDLE);
                }
                self.current = Some(handle);
                self.handle_switches += 1;
                Ok(Reply::Done)
            }
            other => {
                let handle = self.current.ok_or(StatusCode::DEVICE_NOT_OPEN)?;
                let device = self
                    .devices
                    .get_mut(&handle)
                    .ok_or(StatusCode::DEVICE_NOT_OPEN)?;
                let camera = self
                    .cameras
                    .get(device.camera)
                    .ok_or(StatusCode::DEVICE_NOT_FOUND)?;
                apply_device(
                    device,
                    camera,
                    other,
                    filter_travel,
                    self.cfw_error,
                    &mut self.regulation_log,
                )
            }
        }
    }
}

fn apply_device(
    device: &mut MockDevice,
    camera: &MockCamera,
    command: Command<'_>,
    filter_travel: Duration,
    cfw_error: u16,
    regulation_log: &mut VecDeque<Regulation>,
) -> Result<Reply, StatusCode> {
    match command {
        Command::EstablishLink => Ok(Reply::Link {
            camera_type: camera.camera_type,
        }),
        Command::GetCcdInfo(ccd) => Ok(Reply::CcdInfo(CcdInfo {
            firmware_version: camera.firmware_version,
            camera_type: camera.camera_type,
            name: camera.name.clone(),
            readout_modes: camera
                .sensor(ccd)
                .map(|sensor| sensor.modes.clone())
                .unwrap_or_default(),
        })),
        Command::GetCcdExtendedInfo(ccd) => Ok(Reply::CcdExtendedInfo(CcdExtendedInfo {
            capabilities_bits: camera
                .sensor(ccd)
                .map(|sensor| sensor.capabilities_bits)
                .unwrap_or_default(),
            dump_extra: 0,
        })),
        Command::StartExposure(params) => {
            camera.sensor(params.ccd).ok_or(StatusCode::BAD_PARAMETER)?;
            device.exposures.insert(
                params.ccd,
                MockExposure {
                    started: Instant::now(),
                    duration: Duration::from_millis(u64::from(params.exposure_csec) * 10),
                },
            );
            Ok(Reply::Done)
        }
        Command::EndExposure(ccd) => {
            device.exposures.remove(&ccd);
            Ok(Reply::Done)
        }
        Command::QueryCommandStatus(CommandId::StartExposure2) => {
            let mut status = 0u16;
            for (ccd, exposure) in &device.exposures {
                let bits = if exposure.started.elapsed() >= exposure.duration {
                    0b11
                } else {
                    0b10
                };
                let shift = if ccd.is_guide() { 2 } else { 0 };
                status |= bits << shift;
            }
            Ok(Reply::CommandStatus(status))
        }
        Command::QueryCommandStatus(_) => Ok(Reply::CommandStatus(0)),
        Command::StartReadout(area) => {
            camera.sensor(area.ccd).ok_or(StatusCode::BAD_PARAMETER)?;
            device.readout = Some(MockReadout {
                ccd: area.ccd,
                top: area.top,
                row: 0,
            });
            Ok(Reply::Done)
        }
        Command::ReadoutLine {
            ccd,
            pixel_start,
            pixel_length,
            line,
            ..
        } => {
            let readout = device
                .readout
                .as_mut()
                .filter(|readout| readout.ccd == ccd)
                .ok_or(StatusCode::BAD_PARAMETER)?;
            let length = usize::from(pixel_length);
            if line.len() < length {
                return Err(StatusCode::BAD_LENGTH);
            }
            let row = readout.top.saturating_add(readout.row);
            for (offset, pixel) in line[..length].iter_mut().enumerate() {
                *pixel = MockDriver::pixel(row, usize::from(pixel_start) + offset);
            }
            readout.row = readout.row.saturating_add(1);
            Ok(Reply::Done)
        }
        Command::EndReadout(_) => {
            device.readout = None;
            Ok(Reply::Done)
        }
        Command::SetTemperatureRegulation {
            regulation,
            setpoint,
        } => {
            push_bounded(regulation_log, regulation);
            let cooler = &mut device.cooler;
            match regulation {
                Regulation::On | Regulation::Override => {
                    cooler.cooling = true;
                    cooler.setpoint = setpoint;
                }
                Regulation::Off => {
                    cooler.cooling = false;
                    cooler.setpoint = setpoint;
                }
                Regulation::Freeze => cooler.frozen = true,
                Regulation::Unfreeze => cooler.frozen = false,
                Regulation::EnableAutoFreeze | Regulation::DisableAutoFreeze => {}
            }
            Ok(Reply::Done)
        }
        Command::QueryTemperatureStatus => {
            let cooler = &device.cooler;
            let imaging = if cooler.cooling {
                cooler.setpoint
            } else {
                AMBIENT_C
            };
            Ok(Reply::Temperature(TemperatureStatus {
                cooling_enabled: cooler.cooling,
                fan_enabled: true,
                ccd_setpoint: cooler.setpoint,
                imaging_ccd_temperature: imaging,
                tracking_ccd_temperature: imaging + 1.5,
                external_tracking_ccd_temperature: AMBIENT_C,
                ambient_temperature: AMBIENT_C,
                imaging_ccd_power: if cooler.cooling { 45.0 } else { 0.0 },
                tracking_ccd_power: 0.0,
                external_tracking_ccd_power: 0.0,
                heatsink_temperature: HEATSINK_C,
                fan_power: 100.0,
                fan_speed: 3000.0,
                tracking_ccd_setpoint: cooler.setpoint,
            }))
        }
        Command::Cfw(request) => Ok(Reply::Cfw(device.wheel.apply(
            request,
            filter_travel,
            cfw_error,
        ))),
        other => {
            trace!(command = %other.id(), "Simulated driver rejected command");
            Err(StatusCode::BAD_PARAMETER)
        }
    }
}

impl UniversalDriver for MockDriver {
    fn execute(&self, command: Command<'_>) -> Result<Reply, StatusCode> {
        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_running, Ordering::SeqCst);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let result = self.state.lock().apply(command, self.filter_travel);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
