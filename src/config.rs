//! Capture configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/sbig_camera.toml` (or a path given on the command line)
//! 2. Environment variables prefixed with `SBIG_CAMERA_`, sections separated
//!    by a double underscore (`SBIG_CAMERA_CAMERA__MODEL=ST-7`)
//!
//! Every section has defaults, so a missing file yields a runnable
//! configuration for an ST-10 without filter wheel.
//!
//! # Example
//! ```no_run
//! use sbig_camera::config::CaptureConfig;
//!
//! let config = CaptureConfig::load()?;
//! println!("Camera: {}", config.camera.model);
//! # Ok::<(), figment::Error>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::device_info::{DeviceInfo, FilterSet, SUPPORTED_CAMERAS};
use crate::exposure::ShutterAction;
use crate::filter_wheel::FilterWheelModel;
use crate::readout_mode::ReadoutModeId;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/sbig_camera.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Camera selection
    #[serde(default)]
    pub camera: CameraConfig,
    /// Exposure defaults
    #[serde(default)]
    pub exposure: ExposureConfig,
    /// Telescope connection
    #[serde(default)]
    pub telescope: TelescopeConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Camera and filter wheel selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera model, matched against enumerated device names (e.g. "ST-10")
    #[serde(default = "default_model")]
    pub model: String,
    /// Filter wheel model (e.g. "CFW-8"), if one is attached
    #[serde(default)]
    pub filter_wheel: Option<String>,
    /// Standard filter set installed in the wheel (RGBL or UBVRI)
    #[serde(default)]
    pub filter_set: Option<FilterSet>,
    /// Explicit slot names, overriding the filter set ("1" = "Ha", ...)
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    /// Use the simulated driver even when hardware support is compiled in
    #[serde(default)]
    pub simulate: bool,
}

/// Exposure defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Binning (1x1, 2x2, 3x3, 9x9)
    #[serde(default = "default_readout_mode")]
    pub readout_mode: ReadoutModeId,
    /// Shutter handling
    #[serde(default)]
    pub shutter: ShutterAction,
    /// Directory for captured images
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Telescope connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelescopeConfig {
    /// Mount server URL
    #[serde(default)]
    pub url: Option<String>,
}

// Default value functions
fn default_name() -> String {
    "SBIG Camera".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_model() -> String {
    "ST-10".to_string()
}

fn default_readout_mode() -> ReadoutModeId {
    ReadoutModeId::Bin1x1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("images")
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            filter_wheel: None,
            filter_set: None,
            filters: BTreeMap::new(),
            simulate: false,
        }
    }
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            readout_mode: default_readout_mode(),
            shutter: ShutterAction::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl CaptureConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SBIG_CAMERA_").split("__"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        if !SUPPORTED_CAMERAS.contains(&self.camera.model.as_str()) {
            return Err(format!(
                "Unsupported camera model '{}'. Must be one of: {}",
                self.camera.model,
                SUPPORTED_CAMERAS.join(", ")
            ));
        }

        if let Some(wheel) = &self.camera.filter_wheel {
            if FilterWheelModel::from_name(wheel).is_err() {
                return Err(format!(
                    "Unsupported filter wheel '{}'. Must be one of: {}",
                    wheel,
                    FilterWheelModel::supported().collect::<Vec<_>>().join(", ")
                ));
            }
        }

        self.slot_names().map(|_| ())
    }

    /// Slot names from the filter set, then the explicit `filters` table.
    pub fn slot_names(&self) -> Result<BTreeMap<usize, String>, String> {
        let mut info = DeviceInfo::new("", "", crate::driver::DeviceAddress::UsbAny);
        if let Some(set) = self.camera.filter_set {
            info.apply_filter_set(set);
        }
        for (slot, name) in &self.camera.filters {
            let slot: usize = slot
                .parse()
                .ok()
                .filter(|slot| *slot > 0)
                .ok_or_else(|| format!("Invalid filter slot '{}'. Slots start at 1", slot))?;
            info.set_filter(slot, name.clone());
        }
        Ok(info.filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.model, "ST-10");
        assert_eq!(config.exposure.readout_mode, ReadoutModeId::Bin1x1);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = CaptureConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_hardware() {
        let mut config = CaptureConfig::default();
        config.camera.model = "ST-99".to_string();
        assert!(config.validate().is_err());

        let mut config = CaptureConfig::default();
        config.camera.filter_wheel = Some("CFW-99".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_filters_override_set() {
        let mut config = CaptureConfig::default();
        config.camera.filter_set = Some(FilterSet::Rgbl);
        config.camera.filters.insert("5".to_string(), "Ha".to_string());
        let names = config.slot_names().unwrap();
        assert_eq!(names.get(&1).map(String::as_str), Some("Red"));
        assert_eq!(names.get(&5).map(String::as_str), Some("Ha"));

        config.camera.filters.insert("0".to_string(), "Bad".to_string());
        assert!(config.validate().is_err());
    }
}
