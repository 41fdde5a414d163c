//! Exposure requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::driver::ShutterCommand;
use crate::error::SbigError;
use crate::readout_mode::ReadoutModeId;

/// What the shutter does around an exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutterAction {
    /// Do not move the shutter.
    LeaveAlone,
    /// Open for the exposure, close afterwards (light frame).
    #[default]
    OpenClose,
    /// Closed throughout (dark frame).
    CloseClose,
    /// Open throughout.
    OpenOpen,
}

impl ShutterAction {
    /// Every action, for capability reports.
    pub const ALL: [ShutterAction; 4] = [
        ShutterAction::LeaveAlone,
        ShutterAction::OpenClose,
        ShutterAction::CloseClose,
        ShutterAction::OpenOpen,
    ];

    /// Shutter command sent with the start-exposure.
    ///
    /// The driver has no "keep open" command; an already open shutter stays
    /// open when it is left alone.
    pub fn command(self) -> ShutterCommand {
        match self {
            ShutterAction::OpenClose => ShutterCommand::Open,
            ShutterAction::CloseClose => ShutterCommand::Close,
            ShutterAction::LeaveAlone | ShutterAction::OpenOpen => ShutterCommand::Leave,
        }
    }
}

impl fmt::Display for ShutterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShutterAction::LeaveAlone => "leave-alone",
            ShutterAction::OpenClose => "open-close",
            ShutterAction::CloseClose => "close-close",
            ShutterAction::OpenOpen => "open-open",
        };
        f.write_str(label)
    }
}

impl FromStr for ShutterAction {
    type Err = SbigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leave-alone" | "none" => Ok(ShutterAction::LeaveAlone),
            "open-close" => Ok(ShutterAction::OpenClose),
            "close-close" | "dark" => Ok(ShutterAction::CloseClose),
            "open-open" => Ok(ShutterAction::OpenOpen),
            other => Err(SbigError::Config(format!("Unknown shutter action '{}'", other))),
        }
    }
}

/// Parameters of one exposure.
///
/// The region is in pixels of the chosen readout mode. `right` and `bottom`
/// are exclusive and are clamped to the mode's geometry, so the default
/// region selects the full frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureRequest {
    /// Exposure time in seconds.
    pub duration: f64,
    /// First column.
    pub left: u16,
    /// One past the last column.
    pub right: u16,
    /// First row.
    pub top: u16,
    /// One past the last row.
    pub bottom: u16,
    /// Binning.
    pub readout_mode: ReadoutModeId,
    /// Shutter handling.
    pub shutter: ShutterAction,
}

impl Default for ExposureRequest {
    fn default() -> Self {
        Self {
            duration: 1.0,
            left: 0,
            right: u16::MAX,
            top: 0,
            bottom: u16::MAX,
            readout_mode: ReadoutModeId::Bin1x1,
            shutter: ShutterAction::OpenClose,
        }
    }
}

impl ExposureRequest {
    /// Full-frame exposure of `duration` seconds.
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    /// Restrict to a sub-frame.
    pub fn with_region(mut self, left: u16, right: u16, top: u16, bottom: u16) -> Self {
        self.left = left;
        self.right = right;
        self.top = top;
        self.bottom = bottom;
        self
    }

    /// Select the readout mode.
    pub fn with_readout_mode(mut self, mode: ReadoutModeId) -> Self {
        self.readout_mode = mode;
        self
    }

    /// Select the shutter action.
    pub fn with_shutter(mut self, shutter: ShutterAction) -> Self {
        self.shutter = shutter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutter_codes() {
        assert_eq!(ShutterAction::OpenClose.command() as u16, 1);
        assert_eq!(ShutterAction::CloseClose.command() as u16, 2);
        assert_eq!(ShutterAction::LeaveAlone.command() as u16, 0);
        assert_eq!(ShutterAction::OpenOpen.command() as u16, 0);
    }

    #[test]
    fn test_default_request_is_full_frame() {
        let request = ExposureRequest::new(2.5);
        assert_eq!((request.left, request.top), (0, 0));
        assert_eq!((request.right, request.bottom), (u16::MAX, u16::MAX));
        assert_eq!(request.shutter, ShutterAction::OpenClose);
    }
}
