//! Vendor driver binding.
//!
//! Marshals each typed [`Command`] into the fixed-layout parameter and result
//! structures of `sbigudrv.h` and calls `SBIGUnivDrvCommand`. Only documented
//! fields are read back; everything else in the result structs is ignored.

#![allow(unsafe_code)]

use std::os::raw::{c_char, c_void};
use std::ptr;

use sbigudrv_sys::*;

use super::{
    CcdExtendedInfo, CcdId, CcdInfo, CfwReply, Command, CommandId, RawDriverInfo, RawReadoutInfo,
    Reply, StatusCode, TemperatureStatus, UniversalDriver, UsbCamera,
};

/// `TEMP_STATUS_ADVANCED2`
const TEMP_STATUS_ADVANCED2: u16 = 2;

/// Driver backed by the installed vendor library.
///
/// The library keeps process-global state, so only one `SdkDriver` should be
/// handed to a `CommandSession`.
#[derive(Debug, Default)]
pub struct SdkDriver;

impl SdkDriver {
    /// Create the binding. No command is issued until the session opens the driver.
    pub fn new() -> Self {
        Self
    }
}

fn as_void<T>(value: &mut T) -> *mut c_void {
    (value as *mut T).cast()
}

fn call(command: CommandId, params: *mut c_void, results: *mut c_void) -> Result<(), StatusCode> {
    // SAFETY: `params` and `results` are null or point to live, correctly typed
    // structs for `command`, as documented in sbigudrv.h.
    let status = unsafe { SBIGUnivDrvCommand(command.code() as _, params, results) };
    let status = StatusCode(status as u16);
    if status.is_ok() {
        Ok(())
    } else {
        Err(status)
    }
}

fn c_chars_to_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

fn ccd_info_request(ccd: CcdId, extended: bool) -> u16 {
    match (ccd, extended) {
        (CcdId::Imaging, false) => 0,
        (CcdId::Tracking, false) => 1,
        (CcdId::Imaging, true) => 4,
        (CcdId::Tracking, true) => 5,
        // External tracking CCD info (request 6) shares the tracking layout.
        (CcdId::ExternalTracking, false) => 6,
        (CcdId::ExternalTracking, true) => 5,
    }
}

impl UniversalDriver for SdkDriver {
    fn execute(&self, command: Command<'_>) -> Result<Reply, StatusCode> {
        let id = command.id();
        let null = ptr::null_mut();

        match command {
            Command::OpenDriver | Command::CloseDriver | Command::CloseDevice => {
                call(id, null, null)?;
                Ok(Reply::Done)
            }
            Command::GetDriverInfo => {
                let mut params = GetDriverInfoParams { request: 0 };
                // SAFETY: plain C struct, all-zero is a valid value.
                let mut results: GetDriverInfoResults0 = unsafe { std::mem::zeroed() };
                call(id, as_void(&mut params), as_void(&mut results))?;
                Ok(Reply::DriverInfo(RawDriverInfo {
                    version: results.version as u16,
                    name: c_chars_to_string(&results.name),
                    max_requests: results.maxRequest as u16,
                }))
            }
            Command::QueryUsb => {
                // SAFETY: plain C struct, all-zero is a valid value.
                let mut results: QueryUSBResults2 = unsafe { std::mem::zeroed() };
                call(id, null, as_void(&mut results))?;
                let cameras = results
                    .usbInfo
                    .iter()
                    .enumerate()
                    .filter(|(_, info)| info.cameraFound != 0)
                    .map(|(port, info)| UsbCamera {
                        port: port as u8,
                        camera_type: info.cameraType as u16,
                        name: c_chars_to_string(&info.name),
                        serial: c_chars_to_string(&info.serialNumber),
                    })
                    .collect();
                Ok(Reply::UsbCameras(cameras))
            }
            Command::OpenDevice(address) => {
                let mut params = OpenDeviceParams {
                    deviceType: address.device_type() as _,
                    lptBaseAddress: address.lpt_base() as _,
                    ipAddress: address.ip_address() as _,
                };
                call(id, as_void(&mut params), null)?;
                Ok(Reply::Done)
            }
            Command::GetDriverHandle => {
                let mut results = GetDriverHandleResults { handle: 0 };
                call(id, null, as_void(&mut results))?;
                Ok(Reply::Handle(super::DeviceHandle(results.handle as i16)))
            }
            Command::SetDriverHandle(handle) => {
                let mut params = SetDriverHandleParams {
                    handle: handle.0 as _,
                };
                call(id, as_void(&mut params), null)?;
                Ok(Reply::Done)
            }
            Command::EstablishLink => {
                let mut params = EstablishLinkParams { sbigUseOnly: 0 };
                let mut results = EstablishLinkResults { cameraType: 0 };
                call(id, as_void(&mut params), as_void(&mut results))?;
                Ok(Reply::Link {
                    camera_type: results.cameraType as u16,
                })
            }
            Command::GetCcdInfo(ccd) => {
                let mut params = GetCCDInfoParams {
                    request: ccd_info_request(ccd, false) as _,
                };
                // SAFETY: plain C struct, all-zero is a valid value.
                let mut results: GetCCDInfoResults0 = unsafe { std::mem::zeroed() };
                call(id, as_void(&mut params), as_void(&mut results))?;
                let count = usize::from(results.readoutModes as u16).min(results.readoutInfo.len());
                let readout_modes = results.readoutInfo[..count]
                    .iter()
                    .map(|info| RawReadoutInfo {
                        mode: info.mode as u16,
                        width: info.width as u16,
                        height: info.height as u16,
                        gain: info.gain as u16,
                        pixel_width: info.pixelWidth as u32,
                        pixel_height: info.pixelHeight as u32,
                    })
                    .collect();
                Ok(Reply::CcdInfo(CcdInfo {
                    firmware_version: results.firmwareVersion as u16,
                    camera_type: results.cameraType as u16,
                    name: c_chars_to_string(&results.name),
                    readout_modes,
                }))
            }
            Command::GetCcdExtendedInfo(ccd) => {
                let mut params = GetCCDInfoParams {
                    request: ccd_info_request(ccd, true) as _,
                };
                // SAFETY: plain C struct, all-zero is a valid value.
                let mut results: GetCCDInfoResults4 = unsafe { std::mem::zeroed() };
                call(id, as_void(&mut params), as_void(&mut results))?;
                Ok(Reply::CcdExtendedInfo(CcdExtendedInfo {
                    capabilities_bits: results.capabilitiesBits as u16,
                    dump_extra: results.dumpExtra as u16,
                }))
            }
            Command::StartExposure(exposure) => {
                let mut params = StartExposureParams2 {
                    ccd: exposure.ccd.code() as _,
                    exposureTime: exposure.exposure_csec as _,
                    abgState: exposure.abg_state as _,
                    openShutter: exposure.shutter as u16 as _,
                    readoutMode: exposure.readout_mode.code() as _,
                    top: exposure.top as _,
                    left: exposure.left as _,
                    height: exposure.height as _,
                    width: exposure.width as _,
                };
                call(id, as_void(&mut params), null)?;
                Ok(Reply::Done)
            }
            Command::EndExposure(ccd) => {
                let mut params = EndExposureParams {
                    ccd: ccd.code() as _,
                };
                call(id, as_void(&mut params), null)?;
                Ok(Reply::Done)
            }
            Command::QueryCommandStatus(queried) => {
                let mut params = QueryCommandStatusParams {
                    command: queried.code() as _,
                };
                let mut results = QueryCommandStatusResults { status: 0 };
                call(id, as_void(&mut params), as_void(&mut results))?;
                Ok(Reply::CommandStatus(results.status as u16))
            }
            Command::StartReadout(area) => {
                let mut params = StartReadoutParams {
                    ccd: area.ccd.code() as _,
                    readoutMode: area.readout_mode.code() as _,
                    top: area.top as _,
                    left: area.left as _,
                    height: area.height as _,
                    width: area.width as _,
                };
                call(id, as_void(&mut params), null)?;
                Ok(Reply::Done)
            }
            Command::ReadoutLine {
                ccd,
                readout_mode,
                pixel_start,
                pixel_length,
                line,
            } => {
                if line.len() < usize::from(pixel_length) {
                    return Err(StatusCode::BAD_LENGTH);
                }
                let mut params = ReadoutLineParams {
                    ccd: ccd.code() as _,
                    readoutMode: readout_mode.code() as _,
                    pixelStart: pixel_start as _,
                    pixelLength: pixel_length as _,
                };
                // The driver writes `pixel_length` u16 values into `line`.
                call(id, as_void(&mut params), line.as_mut_ptr().cast())?;
                Ok(Reply::Done)
            }
            Command::EndReadout(ccd) => {
                let mut params = EndReadoutParams {
                    ccd: ccd.code() as _,
                };
                call(id, as_void(&mut params), null)?;
                Ok(Reply::Done)
            }
            Command::SetTemperatureRegulation {
                regulation,
                setpoint,
            } => {
                let mut params = SetTemperatureRegulationParams2 {
                    regulation: regulation as u16 as _,
                    ccdSetpoint: setpoint,
                };
                call(id, as_void(&mut params), null)?;
                Ok(Reply::Done)
            }
            Command::QueryTemperatureStatus => {
                let mut params = QueryTemperatureStatusParams {
                    request: TEMP_STATUS_ADVANCED2 as _,
                };
                // SAFETY: plain C struct, all-zero is a valid value.
                let mut results: QueryTemperatureStatusResults2 = unsafe { std::mem::zeroed() };
                call(id, as_void(&mut params), as_void(&mut results))?;
                Ok(Reply::Temperature(TemperatureStatus {
                    cooling_enabled: results.coolingEnabled != 0,
                    fan_enabled: results.fanEnabled != 0,
                    ccd_setpoint: results.ccdSetpoint,
                    imaging_ccd_temperature: results.imagingCCDTemperature,
                    tracking_ccd_temperature: results.trackingCCDTemperature,
                    external_tracking_ccd_temperature: results.externalTrackingCCDTemperature,
                    ambient_temperature: results.ambientTemperature,
                    imaging_ccd_power: results.imagingCCDPower,
                    tracking_ccd_power: results.trackingCCDPower,
                    external_tracking_ccd_power: results.externalTrackingCCDPower,
                    heatsink_temperature: results.heatsinkTemperature,
                    fan_power: results.fanPower,
                    fan_speed: results.fanSpeed,
                    tracking_ccd_setpoint: results.trackingCCDSetpoint,
                }))
            }
            Command::Cfw(request) => {
                // SAFETY: plain C struct; null in/out pointers with zero lengths.
                let mut params: CFWParams = unsafe { std::mem::zeroed() };
                params.cfwModel = request.model as _;
                params.cfwCommand = request.command as u16 as _;
                params.cfwParam1 = request.param1 as _;
                params.cfwParam2 = request.param2 as _;
                // SAFETY: plain C struct, all-zero is a valid value.
                let mut results: CFWResults = unsafe { std::mem::zeroed() };
                call(id, as_void(&mut params), as_void(&mut results))?;
                Ok(Reply::Cfw(CfwReply {
                    model: results.cfwModel as u16,
                    position: results.cfwPosition as u16,
                    status: results.cfwStatus as u16,
                    error: results.cfwError as u16,
                    result1: results.cfwResult1 as u32,
                    result2: results.cfwResult2 as u32,
                }))
            }
        }
    }
}
