//! Readout modes (binning) reported by a detector.
//!
//! The camera reports every binning mode it supports through the standard
//! CCD-info query. Only the symmetric 1x1, 2x2, 3x3 and 9x9 modes are exposed
//! to callers; the on-chip/off-chip variants are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::driver::RawReadoutInfo;
use crate::error::{SbigError, SbigResult};

/// Vendor binning mode numbers (`READOUT_BINNING_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum BinningMode {
    /// `RM_1X1`
    Rm1x1 = 0,
    /// `RM_2X2`
    Rm2x2 = 1,
    /// `RM_3X3`
    Rm3x3 = 2,
    /// `RM_NX1`
    RmNx1 = 3,
    /// `RM_NX2`
    RmNx2 = 4,
    /// `RM_NX3`
    RmNx3 = 5,
    /// `RM_1X1_VOFFCHIP`
    Rm1x1VOffChip = 6,
    /// `RM_2X2_VOFFCHIP`
    Rm2x2VOffChip = 7,
    /// `RM_3X3_VOFFCHIP`
    Rm3x3VOffChip = 8,
    /// `RM_9X9`
    Rm9x9 = 9,
    /// `RM_NXN`
    RmNxN = 10,
}

impl BinningMode {
    /// Decode a raw mode number. Only the low byte selects the mode.
    pub fn from_raw(raw: u16) -> Option<Self> {
        let mode = match raw & 0x00FF {
            0 => BinningMode::Rm1x1,
            1 => BinningMode::Rm2x2,
            2 => BinningMode::Rm3x3,
            3 => BinningMode::RmNx1,
            4 => BinningMode::RmNx2,
            5 => BinningMode::RmNx3,
            6 => BinningMode::Rm1x1VOffChip,
            7 => BinningMode::Rm2x2VOffChip,
            8 => BinningMode::Rm3x3VOffChip,
            9 => BinningMode::Rm9x9,
            10 => BinningMode::RmNxN,
            _ => return None,
        };
        Some(mode)
    }

    /// Raw mode number.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Vendor name.
    pub fn name(self) -> &'static str {
        match self {
            BinningMode::Rm1x1 => "RM_1X1",
            BinningMode::Rm2x2 => "RM_2X2",
            BinningMode::Rm3x3 => "RM_3X3",
            BinningMode::RmNx1 => "RM_NX1",
            BinningMode::RmNx2 => "RM_NX2",
            BinningMode::RmNx3 => "RM_NX3",
            BinningMode::Rm1x1VOffChip => "RM_1X1_VOFFCHIP",
            BinningMode::Rm2x2VOffChip => "RM_2X2_VOFFCHIP",
            BinningMode::Rm3x3VOffChip => "RM_3X3_VOFFCHIP",
            BinningMode::Rm9x9 => "RM_9X9",
            BinningMode::RmNxN => "RM_NXN",
        }
    }
}

/// Readout modes offered to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReadoutModeId {
    /// Full resolution.
    #[serde(rename = "1x1")]
    Bin1x1,
    /// 2x2 binning.
    #[serde(rename = "2x2")]
    Bin2x2,
    /// 3x3 binning.
    #[serde(rename = "3x3")]
    Bin3x3,
    /// 9x9 binning.
    #[serde(rename = "9x9")]
    Bin9x9,
}

impl ReadoutModeId {
    /// All modes, smallest binning first.
    pub const ALL: [ReadoutModeId; 4] = [
        ReadoutModeId::Bin1x1,
        ReadoutModeId::Bin2x2,
        ReadoutModeId::Bin3x3,
        ReadoutModeId::Bin9x9,
    ];

    /// Binning mode this id maps to.
    pub fn binning(self) -> BinningMode {
        match self {
            ReadoutModeId::Bin1x1 => BinningMode::Rm1x1,
            ReadoutModeId::Bin2x2 => BinningMode::Rm2x2,
            ReadoutModeId::Bin3x3 => BinningMode::Rm3x3,
            ReadoutModeId::Bin9x9 => BinningMode::Rm9x9,
        }
    }

    fn from_binning(mode: BinningMode) -> Option<Self> {
        match mode {
            BinningMode::Rm1x1 => Some(ReadoutModeId::Bin1x1),
            BinningMode::Rm2x2 => Some(ReadoutModeId::Bin2x2),
            BinningMode::Rm3x3 => Some(ReadoutModeId::Bin3x3),
            BinningMode::Rm9x9 => Some(ReadoutModeId::Bin9x9),
            _ => None,
        }
    }
}

impl fmt::Display for ReadoutModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReadoutModeId::Bin1x1 => "1x1",
            ReadoutModeId::Bin2x2 => "2x2",
            ReadoutModeId::Bin3x3 => "3x3",
            ReadoutModeId::Bin9x9 => "9x9",
        };
        f.write_str(label)
    }
}

impl FromStr for ReadoutModeId {
    type Err = SbigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1x1" => Ok(ReadoutModeId::Bin1x1),
            "2x2" => Ok(ReadoutModeId::Bin2x2),
            "3x3" => Ok(ReadoutModeId::Bin3x3),
            "9x9" => Ok(ReadoutModeId::Bin9x9),
            _ => Err(SbigError::UnsupportedReadoutMode(s.to_string())),
        }
    }
}

/// Geometry and gain of one readout mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutMode {
    /// Binning mode sent to the camera.
    pub binning: BinningMode,
    /// Columns at this binning.
    pub max_width: u16,
    /// Rows at this binning.
    pub max_height: u16,
    /// Gain, e-/ADU.
    pub gain: f64,
    /// Effective pixel width, microns.
    pub pixel_width: f64,
    /// Effective pixel height, microns.
    pub pixel_height: f64,
    /// Vendor mode name.
    pub name: &'static str,
}

impl ReadoutMode {
    /// Decode one entry of the CCD-info readout table.
    pub fn from_raw(binning: BinningMode, info: &RawReadoutInfo) -> Self {
        Self {
            binning,
            max_width: info.width,
            max_height: info.height,
            gain: bcd_to_f64(u32::from(info.gain)),
            pixel_width: bcd_to_f64(info.pixel_width),
            pixel_height: bcd_to_f64(info.pixel_height),
            name: binning.name(),
        }
    }
}

/// Supported readout modes of one detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadoutModeTable {
    modes: BTreeMap<ReadoutModeId, ReadoutMode>,
    pixel_count: (u16, u16),
    pixel_size: (f64, f64),
}

impl ReadoutModeTable {
    /// Build the table from the camera's readout-mode list.
    ///
    /// Pixel count is the largest geometry of any reported mode and pixel size
    /// the smallest pitch, including modes that are not exposed.
    pub fn from_raw(infos: &[RawReadoutInfo]) -> Self {
        let mut modes = BTreeMap::new();
        let mut pixel_count = (0u16, 0u16);
        let mut pixel_size = (1000.0f64, 1000.0f64);

        for info in infos {
            let Some(binning) = BinningMode::from_raw(info.mode) else {
                continue;
            };
            let mode = ReadoutMode::from_raw(binning, info);

            pixel_count.0 = pixel_count.0.max(mode.max_width);
            pixel_count.1 = pixel_count.1.max(mode.max_height);
            pixel_size.0 = pixel_size.0.min(mode.pixel_width);
            pixel_size.1 = pixel_size.1.min(mode.pixel_height);

            if let Some(id) = ReadoutModeId::from_binning(binning) {
                modes.insert(id, mode);
            }
        }

        Self {
            modes,
            pixel_count,
            pixel_size,
        }
    }

    /// Mode for `id`, if the detector offers it.
    pub fn get(&self, id: ReadoutModeId) -> Option<&ReadoutMode> {
        self.modes.get(&id)
    }

    /// Mode for `id`, or `UnsupportedReadoutMode`.
    pub fn lookup(&self, id: ReadoutModeId) -> SbigResult<&ReadoutMode> {
        self.get(id)
            .ok_or_else(|| SbigError::UnsupportedReadoutMode(id.to_string()))
    }

    /// Supported modes in binning order.
    pub fn iter(&self) -> impl Iterator<Item = (ReadoutModeId, &ReadoutMode)> {
        self.modes.iter().map(|(id, mode)| (*id, mode))
    }

    /// Supported mode ids.
    pub fn ids(&self) -> Vec<ReadoutModeId> {
        self.modes.keys().copied().collect()
    }

    /// Number of supported modes.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// True when no symmetric mode was reported.
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Largest (width, height) of any reported mode.
    pub fn pixel_count(&self) -> (u16, u16) {
        self.pixel_count
    }

    /// Smallest (width, height) pixel pitch in microns.
    pub fn pixel_size(&self) -> (f64, f64) {
        self.pixel_size
    }
}

/// Decode a packed BCD value with two implied decimal places.
///
/// `0x0230` is 2.30 and `0x00000680` is 6.80.
pub fn bcd_to_f64(bcd: u32) -> f64 {
    let mut value = 0u64;
    for shift in (0..8).rev() {
        let digit = (bcd >> (shift * 4)) & 0xF;
        value = value * 10 + u64::from(digit.min(9));
    }
    value as f64 / 100.0
}
