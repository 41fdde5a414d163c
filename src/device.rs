//! An opened camera: its detectors, filter wheel and cooler.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::detector::Detector;
use crate::device_info::DeviceInfo;
use crate::driver::{CcdId, Command, DeviceHandle, Regulation};
use crate::error::{SbigError, SbigResult};
use crate::filter_wheel::FilterPositioner;
use crate::session::CommandSession;

/// Cooler and fan status.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TemperatureInfo {
    /// Fan running.
    pub fan_on: bool,
    /// Regulation active.
    pub regulation_on: bool,
    /// Main sensor setpoint, Celsius.
    pub main_setpoint: f64,
    /// Main sensor temperature, Celsius.
    pub main_temperature: f64,
    /// Tracking sensor setpoint, Celsius.
    pub tracking_setpoint: f64,
    /// Tracking sensor temperature, Celsius.
    pub tracking_temperature: f64,
    /// Ambient temperature, Celsius.
    pub ambient_temperature: f64,
    /// Heatsink temperature, Celsius.
    pub heatsink_temperature: f64,
    /// Fan power, percent.
    pub fan_power: f64,
    /// Fan speed, RPM.
    pub fan_speed: f64,
}

/// A camera opened through a [`CommandSession`].
///
/// Obtained from [`CommandSession::open_device`]; release the hardware with
/// [`CommandSession::close_device`].
pub struct Device {
    session: Arc<CommandSession>,
    info: DeviceInfo,
    handle: DeviceHandle,
    main: Option<Arc<Detector>>,
    guide: Option<Arc<Detector>>,
    filter_wheel: Option<Arc<FilterPositioner>>,
}

impl Device {
    pub(crate) fn initialize(
        session: Arc<CommandSession>,
        info: DeviceInfo,
        handle: DeviceHandle,
    ) -> SbigResult<Self> {
        let mut device = Self {
            session,
            info,
            handle,
            main: None,
            guide: None,
            filter_wheel: None,
        };

        if device.info.name.contains("ST-") {
            device.initialize_st_series()?;
        } else if device.info.name.contains("PixCel") {
            debug!("{}: PixCel cameras expose no detectors", device.info.name);
        } else {
            return Err(SbigError::UnknownDeviceFamily(device.info.name.clone()));
        }
        Ok(device)
    }

    fn initialize_st_series(&mut self) -> SbigResult<()> {
        let session = &self.session;

        let imaging = session.ccd_info(self.handle, CcdId::Imaging)?;
        let imaging_ext = session.ccd_extended_info(self.handle, CcdId::Imaging)?;
        let main = Arc::new(Detector::new(
            Arc::clone(session),
            self.handle,
            CcdId::Imaging,
            &imaging,
            &imaging_ext,
            None,
        ));

        let tracking = session.ccd_info(self.handle, CcdId::Tracking)?;
        let tracking_ext = session.ccd_extended_info(self.handle, CcdId::Tracking)?;
        if imaging.firmware_version > 0 {
            self.guide = Some(Arc::new(Detector::new(
                Arc::clone(session),
                self.handle,
                CcdId::Tracking,
                &tracking,
                &tracking_ext,
                Some(main.exposing_flag()),
            )));
        }

        if let Some(model) = &self.info.filter_wheel {
            let wheel = Arc::new(FilterPositioner::new(
                Arc::clone(session),
                self.handle,
                model,
                self.info.filters.clone(),
                Some(main.exposing_flag()),
            )?);
            main.attach_filter_wheel(Arc::clone(&wheel));
            if let Some(guide) = &self.guide {
                guide.attach_filter_wheel(Arc::clone(&wheel));
            }
            self.filter_wheel = Some(wheel);
        }

        info!(
            "{} ready: main {}, guide {}, filter wheel {}",
            self.info.name,
            main.name(),
            self.guide.as_ref().map_or("none", |guide| guide.name()),
            self.info.filter_wheel.as_deref().unwrap_or("none")
        );
        self.main = Some(main);
        Ok(())
    }

    /// Driver handle of this device.
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Identification used to open the device.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Imaging detector.
    pub fn main_detector(&self) -> Option<&Arc<Detector>> {
        self.main.as_ref()
    }

    /// Tracking detector.
    pub fn guide_detector(&self) -> Option<&Arc<Detector>> {
        self.guide.as_ref()
    }

    /// Attached filter wheel.
    pub fn filter_wheel(&self) -> Option<&Arc<FilterPositioner>> {
        self.filter_wheel.as_ref()
    }

    /// True while any detector is exposing.
    pub fn image_in_progress(&self) -> bool {
        self.main
            .iter()
            .chain(self.guide.iter())
            .any(|detector| detector.image_in_progress())
    }

    /// Turn cooler regulation on at `celsius`, or off.
    pub fn set_temperature_regulation(&self, on: bool, celsius: f64) -> SbigResult<()> {
        let regulation = if on { Regulation::On } else { Regulation::Off };
        self.session.dispatch_on(
            self.handle,
            Command::SetTemperatureRegulation {
                regulation,
                setpoint: celsius,
            },
        )?;
        info!(
            "{}: regulation {:?}, setpoint {:.1} C",
            self.info.name, regulation, celsius
        );
        Ok(())
    }

    /// Cooler snapshot.
    pub fn temperature_info(&self) -> SbigResult<TemperatureInfo> {
        let status = self.session.temperature_status(self.handle)?;
        Ok(TemperatureInfo {
            fan_on: status.fan_enabled,
            regulation_on: status.cooling_enabled,
            main_setpoint: status.ccd_setpoint,
            main_temperature: status.imaging_ccd_temperature,
            tracking_setpoint: status.tracking_ccd_setpoint,
            tracking_temperature: status.tracking_ccd_temperature,
            ambient_temperature: status.ambient_temperature,
            heatsink_temperature: status.heatsink_temperature,
            fan_power: status.fan_power,
            fan_speed: status.fan_speed,
        })
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("info", &self.info)
            .field("handle", &self.handle)
            .field("main", &self.main)
            .field("guide", &self.guide)
            .field("filter_wheel", &self.filter_wheel)
            .finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.info, self.handle)?;
        for detector in self.main.iter().chain(self.guide.iter()) {
            write!(f, "{}", detector)?;
        }
        Ok(())
    }
}
