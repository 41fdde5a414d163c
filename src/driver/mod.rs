//! Universal Driver Command Seam
//!
//! The vendor library funnels every camera, cooler and filter-wheel operation
//! through one entry point that takes a command number, a parameter struct and
//! a result struct. This module models that call as a typed [`Command`] /
//! [`Reply`] pair behind the [`UniversalDriver`] trait so the rest of the crate
//! never touches raw structs.
//!
//! # Implementations
//!
//! - [`mock::MockDriver`] - in-process simulation, always available
//! - `sdk::SdkDriver` - the real driver (feature `sbig_hardware`)
//!
//! # Contract
//!
//! `execute` returns `Err(StatusCode)` for any non-zero driver status. Callers
//! treat that as fatal for the current operation. The driver itself is not
//! thread safe, so callers must serialize access (see `CommandSession`).

pub mod mock;
#[cfg(feature = "sbig_hardware")]
pub mod sdk;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::readout_mode::BinningMode;

/// Vendor command numbers for the commands this crate issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum CommandId {
    /// `CC_END_EXPOSURE`
    EndExposure = 2,
    /// `CC_READOUT_LINE`
    ReadoutLine = 3,
    /// `CC_QUERY_TEMPERATURE_STATUS`
    QueryTemperatureStatus = 6,
    /// `CC_ESTABLISH_LINK`
    EstablishLink = 9,
    /// `CC_GET_DRIVER_INFO`
    GetDriverInfo = 10,
    /// `CC_GET_CCD_INFO`
    GetCcdInfo = 11,
    /// `CC_QUERY_COMMAND_STATUS`
    QueryCommandStatus = 12,
    /// `CC_OPEN_DRIVER`
    OpenDriver = 17,
    /// `CC_CLOSE_DRIVER`
    CloseDriver = 18,
    /// `CC_END_READOUT`
    EndReadout = 25,
    /// `CC_OPEN_DEVICE`
    OpenDevice = 27,
    /// `CC_CLOSE_DEVICE`
    CloseDevice = 28,
    /// `CC_GET_DRIVER_HANDLE`
    GetDriverHandle = 33,
    /// `CC_SET_DRIVER_HANDLE`
    SetDriverHandle = 34,
    /// `CC_START_READOUT`
    StartReadout = 35,
    /// `CC_CFW`
    Cfw = 43,
    /// `CC_START_EXPOSURE2`
    StartExposure2 = 50,
    /// `CC_SET_TEMPERATURE_REGULATION2`
    SetTemperatureRegulation2 = 51,
    /// `CC_QUERY_USB2`
    QueryUsb2 = 57,
}

impl CommandId {
    /// Raw command number passed to the driver.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Vendor name of the command.
    pub fn name(self) -> &'static str {
        match self {
            CommandId::EndExposure => "CC_END_EXPOSURE",
            CommandId::ReadoutLine => "CC_READOUT_LINE",
            CommandId::QueryTemperatureStatus => "CC_QUERY_TEMPERATURE_STATUS",
            CommandId::EstablishLink => "CC_ESTABLISH_LINK",
            CommandId::GetDriverInfo => "CC_GET_DRIVER_INFO",
            CommandId::GetCcdInfo => "CC_GET_CCD_INFO",
            CommandId::QueryCommandStatus => "CC_QUERY_COMMAND_STATUS",
            CommandId::OpenDriver => "CC_OPEN_DRIVER",
            CommandId::CloseDriver => "CC_CLOSE_DRIVER",
            CommandId::EndReadout => "CC_END_READOUT",
            CommandId::OpenDevice => "CC_OPEN_DEVICE",
            CommandId::CloseDevice => "CC_CLOSE_DEVICE",
            CommandId::GetDriverHandle => "CC_GET_DRIVER_HANDLE",
            CommandId::SetDriverHandle => "CC_SET_DRIVER_HANDLE",
            CommandId::StartReadout => "CC_START_READOUT",
            CommandId::Cfw => "CC_CFW",
            CommandId::StartExposure2 => "CC_START_EXPOSURE2",
            CommandId::SetTemperatureRegulation2 => "CC_SET_TEMPERATURE_REGULATION2",
            CommandId::QueryUsb2 => "CC_QUERY_USB2",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Status returned by the driver. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

const STATUS_NAMES: [&str; 43] = [
    "CE_NO_ERROR",
    "CE_CAMERA_NOT_FOUND",
    "CE_EXPOSURE_IN_PROGRESS",
    "CE_NO_EXPOSURE_IN_PROGRESS",
    "CE_UNKNOWN_COMMAND",
    "CE_BAD_CAMERA_COMMAND",
    "CE_BAD_PARAMETER",
    "CE_TX_TIMEOUT",
    "CE_RX_TIMEOUT",
    "CE_NAK_RECEIVED",
    "CE_CAN_RECEIVED",
    "CE_UNKNOWN_RESPONSE",
    "CE_BAD_LENGTH",
    "CE_AD_TIMEOUT",
    "CE_KBD_ESC",
    "CE_CHECKSUM_ERROR",
    "CE_EEPROM_ERROR",
    "CE_SHUTTER_ERROR",
    "CE_UNKNOWN_CAMERA",
    "CE_DRIVER_NOT_FOUND",
    "CE_DRIVER_NOT_OPEN",
    "CE_DRIVER_NOT_CLOSED",
    "CE_SHARE_ERROR",
    "CE_TCE_NOT_FOUND",
    "CE_AO_ERROR",
    "CE_ECP_ERROR",
    "CE_MEMORY_ERROR",
    "CE_DEVICE_NOT_FOUND",
    "CE_DEVICE_NOT_OPEN",
    "CE_DEVICE_NOT_CLOSED",
    "CE_DEVICE_NOT_IMPLEMENTED",
    "CE_DEVICE_DISABLED",
    "CE_OS_ERROR",
    "CE_SOCK_ERROR",
    "CE_SERVER_NOT_FOUND",
    "CE_CFW_ERROR",
    "CE_MF_ERROR",
    "CE_FIRMWARE_ERROR",
    "CE_DIFF_GUIDER_ERROR",
    "CE_RIPPLE_CORRECTION_ERROR",
    "CE_EZUSB_RESET",
    "CE_INCOMPATIBLE_FIRMWARE",
    "CE_INVALID_HANDLE",
];

impl StatusCode {
    /// `CE_NO_ERROR`
    pub const NO_ERROR: StatusCode = StatusCode(0);
    /// `CE_EXPOSURE_IN_PROGRESS`
    pub const EXPOSURE_IN_PROGRESS: StatusCode = StatusCode(2);
    /// `CE_NO_EXPOSURE_IN_PROGRESS`
    pub const NO_EXPOSURE_IN_PROGRESS: StatusCode = StatusCode(3);
    /// `CE_BAD_PARAMETER`
    pub const BAD_PARAMETER: StatusCode = StatusCode(6);
    /// `CE_RX_TIMEOUT`
    pub const RX_TIMEOUT: StatusCode = StatusCode(8);
    /// `CE_BAD_LENGTH`
    pub const BAD_LENGTH: StatusCode = StatusCode(12);
    /// `CE_SHUTTER_ERROR`
    pub const SHUTTER_ERROR: StatusCode = StatusCode(17);
    /// `CE_DRIVER_NOT_OPEN`
    pub const DRIVER_NOT_OPEN: StatusCode = StatusCode(20);
    /// `CE_DEVICE_NOT_FOUND`
    pub const DEVICE_NOT_FOUND: StatusCode = StatusCode(27);
    /// `CE_DEVICE_NOT_OPEN`
    pub const DEVICE_NOT_OPEN: StatusCode = StatusCode(28);
    /// `CE_DEVICE_NOT_CLOSED`
    pub const DEVICE_NOT_CLOSED: StatusCode = StatusCode(29);
    /// `CE_CFW_ERROR`
    pub const CFW_ERROR: StatusCode = StatusCode(35);
    /// `CE_INVALID_HANDLE`
    pub const INVALID_HANDLE: StatusCode = StatusCode(42);

    /// Vendor name for this status, or `None` for codes outside the table.
    pub fn name(self) -> Option<&'static str> {
        STATUS_NAMES.get(usize::from(self.0)).copied()
    }

    /// True for `CE_NO_ERROR`.
    pub fn is_ok(self) -> bool {
        self == Self::NO_ERROR
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "unknown status ({})", self.0),
        }
    }
}

/// Driver-assigned identifier of an opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceHandle(pub i16);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle {}", self.0)
    }
}

/// Sensor slot within a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum CcdId {
    /// Main imaging sensor.
    Imaging = 0,
    /// Built-in tracking (guide) sensor.
    Tracking = 1,
    /// External tracking sensor on the guider port.
    ExternalTracking = 2,
}

impl CcdId {
    /// Raw detector number.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// True for the tracking sensors.
    pub fn is_guide(self) -> bool {
        !matches!(self, CcdId::Imaging)
    }
}

impl fmt::Display for CcdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CcdId::Imaging => "Imaging Sensor",
            CcdId::Tracking => "Tracking Sensor",
            CcdId::ExternalTracking => "External Tracking Sensor",
        };
        f.write_str(label)
    }
}

/// Cooler regulation modes (`TEMPERATURE_REGULATION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum Regulation {
    /// Cooler off.
    Off = 0,
    /// Regulate to the setpoint.
    On = 1,
    /// Run the cooler at a fixed power.
    Override = 2,
    /// Hold cooler power constant.
    Freeze = 3,
    /// Resume regulation after a freeze.
    Unfreeze = 4,
    /// Let the driver freeze automatically during readout.
    EnableAutoFreeze = 5,
    /// Turn automatic freezing off.
    DisableAutoFreeze = 6,
}

/// Shutter command sent with a start-exposure (`SHUTTER_COMMAND`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ShutterCommand {
    /// Leave the shutter where it is.
    Leave = 0,
    /// Open the shutter for the exposure, close it afterwards.
    Open = 1,
    /// Keep the shutter closed (dark frame).
    Close = 2,
}

/// Physical connection used to open a device (`SBIG_DEVICE_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceAddress {
    /// USB camera on enumerated port 1..=8.
    Usb(u8),
    /// First USB camera the driver finds.
    UsbAny,
    /// Parallel port camera (`DEV_LPT1`) at the given base address.
    Lpt(u16),
    /// Ethernet camera at the given IPv4 address.
    Ethernet(u32),
}

impl DeviceAddress {
    /// Value for the `deviceType` field of the open-device parameters.
    pub fn device_type(self) -> u16 {
        match self {
            DeviceAddress::Usb(port) => 0x7F01 + u16::from(port.clamp(1, 8)),
            DeviceAddress::UsbAny => 0x7F00,
            DeviceAddress::Lpt(_) => 1,
            DeviceAddress::Ethernet(_) => 0x7F01,
        }
    }

    /// Parallel port base address, zero for other connections.
    pub fn lpt_base(self) -> u16 {
        match self {
            DeviceAddress::Lpt(base) => base,
            _ => 0,
        }
    }

    /// IPv4 address, zero for other connections.
    pub fn ip_address(self) -> u32 {
        match self {
            DeviceAddress::Ethernet(ip) => ip,
            _ => 0,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAddress::Usb(port) => write!(f, "USB{}", port),
            DeviceAddress::UsbAny => f.write_str("USB"),
            DeviceAddress::Lpt(base) => write!(f, "LPT 0x{:X}", base),
            DeviceAddress::Ethernet(ip) => write!(f, "{}", std::net::Ipv4Addr::from(*ip)),
        }
    }
}

/// Parameters of a start-exposure command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureParams {
    /// Detector to expose.
    pub ccd: CcdId,
    /// Exposure time in hundredths of a second.
    pub exposure_csec: u32,
    /// Anti-blooming gate state (0 = off).
    pub abg_state: u16,
    /// Shutter handling.
    pub shutter: ShutterCommand,
    /// Binning mode.
    pub readout_mode: BinningMode,
    /// First row.
    pub top: u16,
    /// First column.
    pub left: u16,
    /// Rows to expose.
    pub height: u16,
    /// Columns to expose.
    pub width: u16,
}

/// Sub-frame of a readout, in binned pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadoutArea {
    /// Detector to read.
    pub ccd: CcdId,
    /// Binning mode.
    pub readout_mode: BinningMode,
    /// First row.
    pub top: u16,
    /// First column.
    pub left: u16,
    /// Rows.
    pub height: u16,
    /// Columns.
    pub width: u16,
}

/// Filter wheel sub-commands (`CFW_COMMAND`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CfwCommand {
    /// Report status and position.
    Query = 0,
    /// Move to the slot in `param1`.
    Goto = 1,
    /// Re-home the wheel.
    Init = 2,
    /// Firmware and slot count.
    GetInfo = 3,
    /// Open the wheel's communication port.
    OpenDevice = 4,
    /// Close the wheel's communication port.
    CloseDevice = 5,
}

/// Filter wheel motion status (`CFW_STATUS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfwStatus {
    /// Status not reported.
    Unknown,
    /// Wheel at rest.
    Idle,
    /// Wheel moving.
    Busy,
}

impl CfwStatus {
    /// Decode the raw `cfwStatus` field.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            1 => CfwStatus::Idle,
            2 => CfwStatus::Busy,
            _ => CfwStatus::Unknown,
        }
    }
}

/// One filter wheel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfwRequest {
    /// Raw `CFW_MODEL_SELECT` value.
    pub model: u16,
    /// Sub-command.
    pub command: CfwCommand,
    /// First parameter (target slot for goto).
    pub param1: u32,
    /// Second parameter.
    pub param2: u32,
}

impl CfwRequest {
    /// Request without parameters.
    pub fn new(model: u16, command: CfwCommand) -> Self {
        Self {
            model,
            command,
            param1: 0,
            param2: 0,
        }
    }
}

/// Filter wheel response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CfwReply {
    /// Model that answered.
    pub model: u16,
    /// Current slot (1-based, 0 when unknown).
    pub position: u16,
    /// Raw `CFW_STATUS`.
    pub status: u16,
    /// Raw `CFW_ERROR`. 0 = none, 1 = busy.
    pub error: u16,
    /// Command specific.
    pub result1: u32,
    /// Command specific.
    pub result2: u32,
}

/// One readout mode entry as reported by the camera. BCD fields are raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawReadoutInfo {
    /// Raw binning mode number.
    pub mode: u16,
    /// Width in binned pixels.
    pub width: u16,
    /// Height in binned pixels.
    pub height: u16,
    /// Gain in e-/ADU, BCD `xx.xx`.
    pub gain: u16,
    /// Pixel width in microns, BCD `nnnnnn.nn`.
    pub pixel_width: u32,
    /// Pixel height in microns, BCD `nnnnnn.nn`.
    pub pixel_height: u32,
}

/// Standard CCD information (requests 0 and 1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CcdInfo {
    /// Firmware version, BCD `xx.xx`.
    pub firmware_version: u16,
    /// Raw `CAMERA_TYPE`.
    pub camera_type: u16,
    /// Camera name reported by the firmware.
    pub name: String,
    /// Supported readout modes.
    pub readout_modes: Vec<RawReadoutInfo>,
}

/// Extended CCD information (requests 4 and 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CcdExtendedInfo {
    /// Capability bits. Bit 1 set = electronic shutter.
    pub capabilities_bits: u16,
    /// Extra dump lines the camera needs.
    pub dump_extra: u16,
}

impl CcdExtendedInfo {
    /// True when the sensor has an interline (electronic) shutter.
    pub fn has_electronic_shutter(&self) -> bool {
        self.capabilities_bits & 0b10 != 0
    }
}

/// Full cooler status (`TEMP_STATUS_ADVANCED2`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TemperatureStatus {
    /// Regulation enabled.
    pub cooling_enabled: bool,
    /// Fan running.
    pub fan_enabled: bool,
    /// Imaging sensor setpoint, Celsius.
    pub ccd_setpoint: f64,
    /// Imaging sensor temperature, Celsius.
    pub imaging_ccd_temperature: f64,
    /// Tracking sensor temperature, Celsius.
    pub tracking_ccd_temperature: f64,
    /// External tracking sensor temperature, Celsius.
    pub external_tracking_ccd_temperature: f64,
    /// Ambient temperature, Celsius.
    pub ambient_temperature: f64,
    /// Imaging cooler power, percent.
    pub imaging_ccd_power: f64,
    /// Tracking cooler power, percent.
    pub tracking_ccd_power: f64,
    /// External tracking cooler power, percent.
    pub external_tracking_ccd_power: f64,
    /// Heatsink temperature, Celsius.
    pub heatsink_temperature: f64,
    /// Fan power, percent.
    pub fan_power: f64,
    /// Fan speed, RPM.
    pub fan_speed: f64,
    /// Tracking sensor setpoint, Celsius.
    pub tracking_ccd_setpoint: f64,
}

/// Driver identification (`GetDriverInfoResults0`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawDriverInfo {
    /// Version, BCD `xx.xx`.
    pub version: u16,
    /// Driver name.
    pub name: String,
    /// Maximum request number supported.
    pub max_requests: u16,
}

/// A camera found on a USB port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbCamera {
    /// Zero-based USB port index.
    pub port: u8,
    /// Raw `CAMERA_TYPE`.
    pub camera_type: u16,
    /// Camera name.
    pub name: String,
    /// Serial number.
    pub serial: String,
}

/// A typed driver command.
pub enum Command<'a> {
    /// Open the driver.
    OpenDriver,
    /// Close the driver.
    CloseDriver,
    /// Driver name and version.
    GetDriverInfo,
    /// Enumerate USB cameras.
    QueryUsb,
    /// Open a device on the current driver handle.
    OpenDevice(DeviceAddress),
    /// Close the device on the current driver handle.
    CloseDevice,
    /// Handle of the current device.
    GetDriverHandle,
    /// Make another handle current.
    SetDriverHandle(DeviceHandle),
    /// Establish communication with the camera.
    EstablishLink,
    /// Standard CCD information for one detector.
    GetCcdInfo(CcdId),
    /// Extended CCD information for one detector.
    GetCcdExtendedInfo(CcdId),
    /// Start an exposure.
    StartExposure(ExposureParams),
    /// End the exposure on a detector.
    EndExposure(CcdId),
    /// Status of a previously issued command.
    QueryCommandStatus(CommandId),
    /// Begin reading out a sub-frame.
    StartReadout(ReadoutArea),
    /// Read one row into `line`.
    ReadoutLine {
        /// Detector being read.
        ccd: CcdId,
        /// Binning mode.
        readout_mode: BinningMode,
        /// First column.
        pixel_start: u16,
        /// Number of pixels to read.
        pixel_length: u16,
        /// Destination, at least `pixel_length` long.
        line: &'a mut [u16],
    },
    /// Finish a readout.
    EndReadout(CcdId),
    /// Change cooler regulation.
    SetTemperatureRegulation {
        /// Regulation mode.
        regulation: Regulation,
        /// Setpoint, Celsius.
        setpoint: f64,
    },
    /// Full cooler status.
    QueryTemperatureStatus,
    /// Filter wheel request.
    Cfw(CfwRequest),
}

impl Command<'_> {
    /// Vendor command number of this command.
    pub fn id(&self) -> CommandId {
        match self {
            Command::OpenDriver => CommandId::OpenDriver,
            Command::CloseDriver => CommandId::CloseDriver,
            Command::GetDriverInfo => CommandId::GetDriverInfo,
            Command::QueryUsb => CommandId::QueryUsb2,
            Command::OpenDevice(_) => CommandId::OpenDevice,
            Command::CloseDevice => CommandId::CloseDevice,
            Command::GetDriverHandle => CommandId::GetDriverHandle,
            Command::SetDriverHandle(_) => CommandId::SetDriverHandle,
            Command::EstablishLink => CommandId::EstablishLink,
            Command::GetCcdInfo(_) | Command::GetCcdExtendedInfo(_) => CommandId::GetCcdInfo,
            Command::StartExposure(_) => CommandId::StartExposure2,
            Command::EndExposure(_) => CommandId::EndExposure,
            Command::QueryCommandStatus(_) => CommandId::QueryCommandStatus,
            Command::StartReadout(_) => CommandId::StartReadout,
            Command::ReadoutLine { .. } => CommandId::ReadoutLine,
            Command::EndReadout(_) => CommandId::EndReadout,
            Command::SetTemperatureRegulation { .. } => CommandId::SetTemperatureRegulation2,
            Command::QueryTemperatureStatus => CommandId::QueryTemperatureStatus,
            Command::Cfw(_) => CommandId::Cfw,
        }
    }
}

/// Decoded result of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Command has no result structure.
    Done,
    /// Driver identification.
    DriverInfo(RawDriverInfo),
    /// USB enumeration.
    UsbCameras(Vec<UsbCamera>),
    /// Current device handle.
    Handle(DeviceHandle),
    /// Camera type reported when the link came up.
    Link {
        /// Raw `CAMERA_TYPE`.
        camera_type: u16,
    },
    /// Standard CCD information.
    CcdInfo(CcdInfo),
    /// Extended CCD information.
    CcdExtendedInfo(CcdExtendedInfo),
    /// Raw command status bits.
    CommandStatus(u16),
    /// Cooler status.
    Temperature(TemperatureStatus),
    /// Filter wheel response.
    Cfw(CfwReply),
}

/// The single vendor entry point.
///
/// Implementations need not be thread safe internally beyond `Send + Sync`;
/// `CommandSession` guarantees at most one `execute` is in flight.
pub trait UniversalDriver: Send + Sync {
    /// Run one command. Non-zero driver status is returned as `Err`.
    fn execute(&self, command: Command<'_>) -> Result<Reply, StatusCode>;
}

impl<T: UniversalDriver + ?Sized> UniversalDriver for Arc<T> {
    fn execute(&self, command: Command<'_>) -> Result<Reply, StatusCode> {
        (**self).execute(command)
    }
}

impl<T: UniversalDriver + ?Sized> UniversalDriver for Box<T> {
    fn execute(&self, command: Command<'_>) -> Result<Reply, StatusCode> {
        (**self).execute(command)
    }
}
