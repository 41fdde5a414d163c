//! Camera and Filter Wheel Capabilities
//!
//! Hardware-agnostic interfaces for the two things a capture run needs: a
//! sensor that can take an exposure and a wheel that can put a filter in the
//! light path. [`Detector`] and [`FilterPositioner`] are the implementations
//! for this camera family; the capture worker only sees the traits.
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is blocking (hardware calls sleep and poll; run them on a blocking thread)
//! - Is thread-safe (requires Send + Sync)
//! - Uses [`SbigResult`] for errors
//! - Focuses on ONE thing
//!
//! # Example
//!
//! ```rust,ignore
//! fn dark_frame<C: Camera + ?Sized>(camera: &C, seconds: f64) -> SbigResult<Image> {
//!     let request = ExposureRequest::new(seconds).with_shutter(ShutterAction::CloseClose);
//!     camera.acquire(&request)
//! }
//! ```

use std::collections::BTreeMap;

use crate::detector::{Detector, DetectorCapabilities, TemperatureTarget};
use crate::error::SbigResult;
use crate::exposure::ExposureRequest;
use crate::filter_wheel::FilterPositioner;
use crate::image::Image;

/// Capability: Exposure
///
/// # Contract
/// - `acquire` blocks for the exposure time plus readout
/// - Out-of-range durations and regions are clamped, never rejected
/// - `abort_exposure` is cooperative; an aborted exposure is an `Ok` image
///   with `aborted` set
pub trait Camera: Send + Sync {
    /// Expose and read out one image.
    fn acquire(&self, request: &ExposureRequest) -> SbigResult<Image>;

    /// Ask a running exposure to stop.
    fn abort_exposure(&self);

    /// True while an exposure is running.
    fn image_in_progress(&self) -> bool;

    /// Current temperature, Celsius.
    fn temperature(&self, target: TemperatureTarget) -> SbigResult<f64>;

    /// Turn regulation on at `celsius`, or off.
    fn set_temperature_target(
        &self,
        target: TemperatureTarget,
        enable: bool,
        celsius: f64,
    ) -> SbigResult<()>;

    /// Static limits and modes.
    fn capabilities(&self) -> DetectorCapabilities;
}

/// Capability: Filter Selection
///
/// # Contract
/// - Slots are 1-based
/// - Both setters block until the wheel stops and return the seconds spent
/// - Requests that cannot be honoured right now (exposure in progress,
///   unknown name) are ignored and return `0.0`
pub trait FilterWheel: Send + Sync {
    /// Move to `slot`.
    fn set_filter_slot(&self, slot: usize) -> SbigResult<f64>;

    /// Move to the slot holding `name`.
    fn set_filter_name(&self, name: &str) -> SbigResult<f64>;

    /// Name of the filter in the light path.
    fn active_filter_name(&self) -> String;

    /// Slot in the light path.
    fn active_filter_slot(&self) -> usize;

    /// Slot to filter name.
    fn slot_to_filter_map(&self) -> BTreeMap<usize, String>;
}

impl Camera for Detector {
    fn acquire(&self, request: &ExposureRequest) -> SbigResult<Image> {
        Detector::acquire(self, request)
    }

    fn abort_exposure(&self) {
        Detector::abort_exposure(self);
    }

    fn image_in_progress(&self) -> bool {
        Detector::image_in_progress(self)
    }

    fn temperature(&self, target: TemperatureTarget) -> SbigResult<f64> {
        Detector::temperature(self, target)
    }

    fn set_temperature_target(
        &self,
        target: TemperatureTarget,
        enable: bool,
        celsius: f64,
    ) -> SbigResult<()> {
        Detector::set_temperature_target(self, target, enable, celsius)
    }

    fn capabilities(&self) -> DetectorCapabilities {
        Detector::capabilities(self)
    }
}

impl FilterWheel for FilterPositioner {
    fn set_filter_slot(&self, slot: usize) -> SbigResult<f64> {
        FilterPositioner::set_filter_slot(self, slot)
    }

    fn set_filter_name(&self, name: &str) -> SbigResult<f64> {
        FilterPositioner::set_filter_name(self, name)
    }

    fn active_filter_name(&self) -> String {
        FilterPositioner::active_filter_name(self)
    }

    fn active_filter_slot(&self) -> usize {
        FilterPositioner::active_filter_slot(self)
    }

    fn slot_to_filter_map(&self) -> BTreeMap<usize, String> {
        FilterPositioner::slot_to_filter_map(self)
    }
}
