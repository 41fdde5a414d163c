//! Image returned by an exposure.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Telescope pointing at the middle of an exposure, radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Pointing {
    /// Right ascension / declination.
    Equatorial {
        /// Right ascension.
        ra: f64,
        /// Declination.
        dec: f64,
    },
    /// Azimuth / altitude.
    Horizontal {
        /// Azimuth.
        azm: f64,
        /// Altitude.
        alt: f64,
    },
}

/// Observatory location.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ObservatoryLocation {
    /// Latitude, radians.
    pub latitude: f64,
    /// Longitude, radians.
    pub longitude: f64,
    /// Height above sea level, meters.
    pub altitude: f64,
}

/// Raw 16-bit frame plus acquisition metadata.
///
/// Pixels are row-major, `width * height` long.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    /// Columns.
    pub width: u16,
    /// Rows.
    pub height: u16,
    /// Pixel data.
    #[serde(skip)]
    pub pixels: Vec<u16>,
    /// Set when the exposure or readout was cut short.
    pub aborted: bool,
    /// Exposure time used, seconds.
    pub exposure_duration: f64,
    /// Start-exposure issued.
    pub exposure_start: DateTime<Utc>,
    /// Camera reported the exposure complete.
    pub exposure_end: DateTime<Utc>,
    /// Readout began.
    pub readout_start: DateTime<Utc>,
    /// Readout finished.
    pub readout_end: DateTime<Utc>,
    /// Device that produced the image.
    pub detector_name: String,
    /// Filter in the light path, empty when unknown.
    pub filter_name: String,
    /// Sensor temperature after readout, Celsius.
    pub temperature: f64,
    /// Target name.
    pub object: String,
    /// Telescope pointing, if a mount was available.
    pub pointing: Option<Pointing>,
    /// Observatory location, if a mount was available.
    pub location: Option<ObservatoryLocation>,
}

impl Image {
    /// Zero-filled image. All timestamps are set to now.
    pub fn new(width: u16, height: u16) -> Self {
        let now = Utc::now();
        Self {
            width,
            height,
            pixels: vec![0; usize::from(width) * usize::from(height)],
            aborted: false,
            exposure_duration: 0.0,
            exposure_start: now,
            exposure_end: now,
            readout_start: now,
            readout_end: now,
            detector_name: String::new(),
            filter_name: String::new(),
            temperature: 0.0,
            object: String::new(),
            pointing: None,
            location: None,
        }
    }

    /// The 1x1 placeholder returned for an aborted exposure.
    pub fn aborted() -> Self {
        let mut image = Self::new(1, 1);
        image.aborted = true;
        image
    }

    /// One row of pixels.
    pub fn row(&self, row: u16) -> Option<&[u16]> {
        let width = usize::from(self.width);
        let start = usize::from(row) * width;
        self.pixels.get(start..start + width)
    }

    /// Middle of the exposure.
    pub fn exposure_midpoint(&self) -> DateTime<Utc> {
        self.exposure_start + (self.exposure_end - self.exposure_start) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_image_is_sized() {
        let image = Image::new(4, 3);
        assert_eq!(image.pixels.len(), 12);
        assert_eq!(image.row(2).map(<[u16]>::len), Some(4));
        assert!(image.row(3).is_none());
        assert!(!image.aborted);
    }

    #[test]
    fn test_aborted_placeholder() {
        let image = Image::aborted();
        assert!(image.aborted);
        assert_eq!((image.width, image.height), (1, 1));
    }
}
