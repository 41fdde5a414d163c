//! One CCD sensor and its exposure state machine.
//!
//! ```text
//! Idle -> Exposing -> Aborted
//!                  -> Completed -> ReadingOut -> Idle
//! ```
//!
//! An exposure is started, then the thread sleeps in 100 ms steps for most of
//! the exposure time, checking the exposure flag at every step. Clearing the
//! flag ([`Detector::abort_exposure`]) during that phase returns a 1x1 image
//! marked aborted. After the sleep the command status is polled without delay
//! until the detector's completion bits are set; that phase cannot be aborted.
//! The exposure is then ended and read out through the session.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::cancel::RunFlag;
use crate::driver::{
    CcdExtendedInfo, CcdId, CcdInfo, Command, CommandId, DeviceHandle, ExposureParams,
    ReadoutArea, Regulation,
};
use crate::error::SbigResult;
use crate::exposure::{ExposureRequest, ShutterAction};
use crate::filter_wheel::FilterPositioner;
use crate::image::Image;
use crate::readout_mode::{bcd_to_f64, ReadoutModeId, ReadoutModeTable};
use crate::session::CommandSession;

const WAIT_INTERVAL: Duration = Duration::from_millis(100);

/// Longest exposure of a main sensor, seconds.
pub const MAX_EXPOSURE_MAIN: f64 = 167_777.16;
/// Longest exposure of a tracking sensor, seconds.
pub const MAX_EXPOSURE_GUIDE: f64 = 655.35;
/// Shortest exposure unless the model allows less, seconds.
pub const MIN_EXPOSURE_DEFAULT: f64 = 0.12;

/// Camera models as reported by establish-link and CCD info (`CAMERA_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum CameraType {
    /// ST-7
    St7 = 4,
    /// ST-8
    St8 = 5,
    /// ST-5C
    St5c = 6,
    /// TCE controller
    Tce = 7,
    /// ST-237
    St237 = 8,
    /// ST-K
    StK = 9,
    /// ST-9
    St9 = 10,
    /// ST-V
    StV = 11,
    /// ST-10
    St10 = 12,
    /// ST-1K
    St1k = 13,
    /// ST-2K
    St2k = 14,
    /// ST-L
    StL = 15,
    /// ST-402
    St402 = 16,
    /// ST-X
    StX = 17,
    /// ST-4K
    St4k = 18,
    /// ST-T
    StT = 19,
    /// ST-I
    StI = 20,
    /// ST-F
    StF = 21,
    /// No camera answered.
    NoCamera = 0xFFFF,
}

impl CameraType {
    /// Decode a raw `CAMERA_TYPE`.
    pub fn from_raw(raw: u16) -> Option<Self> {
        let camera = match raw {
            4 => CameraType::St7,
            5 => CameraType::St8,
            6 => CameraType::St5c,
            7 => CameraType::Tce,
            8 => CameraType::St237,
            9 => CameraType::StK,
            10 => CameraType::St9,
            11 => CameraType::StV,
            12 => CameraType::St10,
            13 => CameraType::St1k,
            14 => CameraType::St2k,
            15 => CameraType::StL,
            16 => CameraType::St402,
            17 => CameraType::StX,
            18 => CameraType::St4k,
            19 => CameraType::StT,
            20 => CameraType::StI,
            21 => CameraType::StF,
            0xFFFF => CameraType::NoCamera,
            _ => return None,
        };
        Some(camera)
    }

    /// Raw `CAMERA_TYPE` value.
    pub fn code(self) -> u16 {
        self as u16
    }

    fn min_exposure(self) -> f64 {
        match self {
            CameraType::St402 => 0.040,
            CameraType::St2k | CameraType::StL => 0.001,
            _ => MIN_EXPOSURE_DEFAULT,
        }
    }

    fn main_shutter(self) -> ShutterKind {
        match self {
            CameraType::St7
            | CameraType::St8
            | CameraType::St5c
            | CameraType::St9
            | CameraType::StV
            | CameraType::St10
            | CameraType::St1k
            | CameraType::St402 => ShutterKind::Physical,
            CameraType::St2k | CameraType::StL => ShutterKind::Electronic,
            _ => ShutterKind::None,
        }
    }
}

/// Kind of shutter in front of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterKind {
    /// No shutter the detector controls.
    None,
    /// Mechanical shutter.
    Physical,
    /// Interline transfer.
    Electronic,
}

/// Which temperature to read or regulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureTarget {
    /// The sensor itself.
    Sensor,
    /// Camera body (heatsink).
    Chassis,
    /// Surrounding air.
    Environment,
}

/// Static description of a detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorCapabilities {
    /// Detector name.
    pub name: String,
    /// Camera firmware version.
    pub firmware_version: f64,
    /// Largest (width, height) in pixels.
    pub pixel_count: (u16, u16),
    /// Smallest pixel pitch, microns.
    pub pixel_size: (f64, f64),
    /// Shortest exposure, seconds.
    pub min_exposure: f64,
    /// Longest exposure, seconds.
    pub max_exposure: f64,
    /// Shutter in front of the sensor.
    pub shutter: ShutterKind,
    /// Binning modes offered.
    pub readout_modes: Vec<ReadoutModeId>,
    /// Shutter actions accepted.
    pub shutter_actions: Vec<ShutterAction>,
}

/// A sensor of an open device.
pub struct Detector {
    session: Arc<CommandSession>,
    handle: DeviceHandle,
    ccd: CcdId,
    name: String,
    camera_type: Option<CameraType>,
    firmware_version: f64,
    modes: ReadoutModeTable,
    min_exposure: f64,
    max_exposure: f64,
    shutter: ShutterKind,
    exposing: RunFlag,
    main_exposing: Option<RunFlag>,
    filter_wheel: OnceLock<Arc<FilterPositioner>>,
}

impl Detector {
    /// Build a detector from the camera's CCD information.
    ///
    /// `main_exposing` is the main detector's exposure flag and is only given
    /// to tracking detectors.
    pub fn new(
        session: Arc<CommandSession>,
        handle: DeviceHandle,
        ccd: CcdId,
        info: &CcdInfo,
        extended: &CcdExtendedInfo,
        main_exposing: Option<RunFlag>,
    ) -> Self {
        let camera_type = CameraType::from_raw(info.camera_type);
        let min_exposure = camera_type.map_or(MIN_EXPOSURE_DEFAULT, CameraType::min_exposure);
        let max_exposure = if ccd.is_guide() {
            MAX_EXPOSURE_GUIDE
        } else {
            MAX_EXPOSURE_MAIN
        };

        let shutter = if ccd.is_guide() {
            ShutterKind::None
        } else {
            match camera_type.map_or(ShutterKind::None, CameraType::main_shutter) {
                ShutterKind::None if extended.has_electronic_shutter() => ShutterKind::Electronic,
                kind => kind,
            }
        };

        Self {
            session,
            handle,
            ccd,
            name: format!("{} {}", info.name, ccd.code()),
            camera_type,
            firmware_version: bcd_to_f64(u32::from(info.firmware_version)),
            modes: ReadoutModeTable::from_raw(&info.readout_modes),
            min_exposure,
            max_exposure,
            shutter,
            exposing: RunFlag::new(),
            main_exposing,
            filter_wheel: OnceLock::new(),
        }
    }

    /// Report the wheel's active filter in acquired images.
    pub fn attach_filter_wheel(&self, wheel: Arc<FilterPositioner>) {
        let _ = self.filter_wheel.set(wheel);
    }

    /// `<camera name> <detector number>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sensor slot.
    pub fn ccd(&self) -> CcdId {
        self.ccd
    }

    /// Camera model, if recognized.
    pub fn camera_type(&self) -> Option<CameraType> {
        self.camera_type
    }

    /// Supported readout modes.
    pub fn readout_modes(&self) -> &ReadoutModeTable {
        &self.modes
    }

    /// Exposure bounds in seconds.
    pub fn exposure_range(&self) -> (f64, f64) {
        (self.min_exposure, self.max_exposure)
    }

    /// Shutter actions callers may request. Only the main sensor moves the shutter.
    pub fn shutter_actions(&self) -> Vec<ShutterAction> {
        if self.ccd.is_guide() {
            vec![ShutterAction::LeaveAlone]
        } else {
            ShutterAction::ALL.to_vec()
        }
    }

    /// Static capability report.
    pub fn capabilities(&self) -> DetectorCapabilities {
        DetectorCapabilities {
            name: self.name.clone(),
            firmware_version: self.firmware_version,
            pixel_count: self.modes.pixel_count(),
            pixel_size: self.modes.pixel_size(),
            min_exposure: self.min_exposure,
            max_exposure: self.max_exposure,
            shutter: self.shutter,
            readout_modes: self.modes.ids(),
            shutter_actions: self.shutter_actions(),
        }
    }

    /// Exposure time actually used for a requested `duration`.
    pub fn clamp_duration(&self, duration: f64) -> f64 {
        duration.clamp(self.min_exposure, self.max_exposure)
    }

    fn effective_shutter(&self, requested: ShutterAction) -> ShutterAction {
        if self.ccd.is_guide() && self.main_exposing.as_ref().is_some_and(RunFlag::is_running) {
            ShutterAction::LeaveAlone
        } else {
            requested
        }
    }

    /// Shared flag that is set while this detector exposes.
    pub fn exposing_flag(&self) -> RunFlag {
        self.exposing.clone()
    }

    /// True from start-exposure until the image is returned.
    pub fn image_in_progress(&self) -> bool {
        self.exposing.is_running()
    }

    /// Ask a running exposure to stop at its next 100 ms checkpoint.
    pub fn abort_exposure(&self) {
        self.exposing.stop();
    }

    /// Stop a readout after the current row.
    pub fn abort_readout(&self) {
        self.session.abort_readout();
    }

    /// Expose and read out one image.
    ///
    /// The region and duration are clamped to what the detector supports. An
    /// exposure aborted while waiting returns a 1x1 image with `aborted` set.
    pub fn acquire(&self, request: &ExposureRequest) -> SbigResult<Image> {
        let exposing = self.exposing.run();
        let mode = self.modes.lookup(request.readout_mode)?;

        let right = request.right.min(mode.max_width);
        let bottom = request.bottom.min(mode.max_height);
        let left = request.left.min(right);
        let top = request.top.min(bottom);
        let width = right - left;
        let height = bottom - top;
        let duration = self.clamp_duration(request.duration);
        let shutter = self.effective_shutter(request.shutter);
        let exposure_csec = (duration * 100.0).round() as u32;

        info!(
            "{} exposing {} ms, {} {}x{} at ({}, {}), shutter {}",
            self.name,
            u64::from(exposure_csec) * 10,
            request.readout_mode,
            width,
            height,
            left,
            top,
            shutter
        );
        self.session.dispatch_on(
            self.handle,
            Command::StartExposure(ExposureParams {
                ccd: self.ccd,
                exposure_csec,
                abg_state: 0,
                shutter: shutter.command(),
                readout_mode: mode.binning,
                top,
                left,
                height,
                width,
            }),
        )?;
        let exposure_start = Utc::now();

        let intervals = (exposure_csec / 10).saturating_sub(1);
        for _ in 0..intervals {
            thread::sleep(WAIT_INTERVAL);
            if !exposing.is_running() {
                info!("{} exposure aborted", self.name);
                return Ok(Image::aborted());
            }
        }

        let mask = if self.ccd.is_guide() { 0b1100 } else { 0b0011 };
        loop {
            let status = self
                .session
                .command_status(self.handle, CommandId::StartExposure2)?;
            if status & mask == mask {
                break;
            }
        }
        let exposure_end = Utc::now();
        self.session
            .dispatch_on(self.handle, Command::EndExposure(self.ccd))?;
        debug!(
            "{} exposure took {} ms",
            self.name,
            (exposure_end - exposure_start).num_milliseconds()
        );

        let readout_start = Utc::now();
        let mut image = self.session.readout(
            self.handle,
            ReadoutArea {
                ccd: self.ccd,
                readout_mode: mode.binning,
                top,
                left,
                height,
                width,
            },
        )?;
        let readout_end = Utc::now();
        debug!(
            "{} readout took {} ms",
            self.name,
            (readout_end - readout_start).num_milliseconds()
        );

        image.exposure_duration = duration;
        image.exposure_start = exposure_start;
        image.exposure_end = exposure_end;
        image.readout_start = readout_start;
        image.readout_end = readout_end;
        image.detector_name = self.name.clone();
        image.filter_name = self
            .filter_wheel
            .get()
            .map(|wheel| wheel.active_filter_name())
            .unwrap_or_default();
        image.temperature = self.temperature(TemperatureTarget::Sensor)?;
        Ok(image)
    }

    /// Turn cooler regulation on at `celsius`, or off.
    ///
    /// The cooler is shared by the whole camera, so `target` only documents
    /// intent.
    pub fn set_temperature_target(
        &self,
        target: TemperatureTarget,
        enable: bool,
        celsius: f64,
    ) -> SbigResult<()> {
        let regulation = if enable {
            Regulation::On
        } else {
            Regulation::Off
        };
        debug!(
            "{}: {:?} regulation {:?} at {:.1} C",
            self.name, target, regulation, celsius
        );
        self.session.dispatch_on(
            self.handle,
            Command::SetTemperatureRegulation {
                regulation,
                setpoint: celsius,
            },
        )?;
        Ok(())
    }

    /// Current temperature, Celsius.
    pub fn temperature(&self, target: TemperatureTarget) -> SbigResult<f64> {
        let status = self.session.temperature_status(self.handle)?;
        Ok(match target {
            TemperatureTarget::Sensor if self.ccd.is_guide() => status.tracking_ccd_temperature,
            TemperatureTarget::Sensor => status.imaging_ccd_temperature,
            TemperatureTarget::Chassis => status.heatsink_temperature,
            TemperatureTarget::Environment => status.ambient_temperature,
        })
    }

    /// Regulation setpoint, Celsius. Targets without a setpoint report ambient.
    pub fn temperature_target(&self, target: TemperatureTarget) -> SbigResult<f64> {
        let status = self.session.temperature_status(self.handle)?;
        Ok(match target {
            TemperatureTarget::Sensor if self.ccd.is_guide() => status.tracking_ccd_setpoint,
            TemperatureTarget::Sensor => status.ccd_setpoint,
            TemperatureTarget::Chassis | TemperatureTarget::Environment => {
                status.ambient_temperature
            }
        })
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("name", &self.name)
            .field("ccd", &self.ccd)
            .field("handle", &self.handle)
            .field("exposing", &self.exposing.is_running())
            .finish()
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.modes.pixel_count();
        writeln!(f, "{} {}", self.name, self.ccd)?;
        writeln!(f, " Max Resolution: {}x{}", width, height)?;
        writeln!(f, " Readout Modes: {}", self.modes.len())?;
        for (_, mode) in self.modes.iter() {
            writeln!(
                f,
                "  ModeID: {} Resolution: {}x{}",
                mode.name, mode.max_width, mode.max_height
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;

    #[test]
    fn test_camera_type_codes() {
        assert_eq!(CameraType::from_raw(12), Some(CameraType::St10));
        assert_eq!(CameraType::St402.code(), 16);
        assert_eq!(CameraType::from_raw(3), None);
    }

    #[test]
    fn test_model_limits() {
        assert!((CameraType::St402.min_exposure() - 0.040).abs() < 1e-12);
        assert!((CameraType::StL.min_exposure() - 0.001).abs() < 1e-12);
        assert!((CameraType::St7.min_exposure() - MIN_EXPOSURE_DEFAULT).abs() < 1e-12);
        assert_eq!(CameraType::St2k.main_shutter(), ShutterKind::Electronic);
        assert_eq!(CameraType::St9.main_shutter(), ShutterKind::Physical);
        assert_eq!(CameraType::StX.main_shutter(), ShutterKind::None);
    }

    #[test]
    fn test_guide_leaves_shutter_while_main_exposes() {
        let session = CommandSession::new(MockDriver::default()).unwrap();
        let info = session.find_device("ST-7", None).unwrap();
        let device = session.open_device(&info).unwrap();
        let main = device.main_detector().unwrap();
        let guide = device.guide_detector().unwrap();

        assert_eq!(
            guide.effective_shutter(ShutterAction::OpenClose),
            ShutterAction::OpenClose
        );
        main.exposing_flag().start();
        assert_eq!(
            guide.effective_shutter(ShutterAction::OpenClose),
            ShutterAction::LeaveAlone
        );
        assert_eq!(
            main.effective_shutter(ShutterAction::CloseClose),
            ShutterAction::CloseClose
        );
        main.exposing_flag().stop();
        assert_eq!(guide.shutter_actions(), vec![ShutterAction::LeaveAlone]);
    }
}
