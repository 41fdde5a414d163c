//! Identification of a camera device before it is opened.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::driver::DeviceAddress;
use crate::error::SbigError;

/// Camera models this crate can drive. Matched as substrings of the device name.
pub const SUPPORTED_CAMERAS: [&str; 17] = [
    "ST-7", "ST-8", "ST-9", "ST-10", "ST-5C", "ST-237", "ST-K", "ST-V", "ST-1K", "ST-2K", "ST-L",
    "ST-402", "ST-X", "ST-4K", "ST-T", "ST-I", "ST-F",
];

/// Standard filter sets, installed from slot 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterSet {
    /// Red, Green, Blue, Clear, None.
    Rgbl,
    /// Johnson-Cousins U, B, V, R, I.
    Ubvri,
}

impl FilterSet {
    /// Filter names in slot order.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            FilterSet::Rgbl => &["Red", "Green", "Blue", "Clear", "None"],
            FilterSet::Ubvri => &["U", "B", "V", "R", "I"],
        }
    }
}

impl FromStr for FilterSet {
    type Err = SbigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RGBL" => Ok(FilterSet::Rgbl),
            "UBVRI" => Ok(FilterSet::Ubvri),
            _ => Err(SbigError::Config(format!("Unknown filter set '{}'", s))),
        }
    }
}

/// Everything needed to open a device and configure its filter wheel.
///
/// Two infos are equal when they name the same device on the same connection
/// with the same filter wheel; filter names are not compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Name reported by enumeration.
    pub name: String,
    /// Serial number.
    pub serial: String,
    /// Connection.
    pub address: DeviceAddress,
    /// Attached filter wheel model, if any. Not auto-detected.
    pub filter_wheel: Option<String>,
    /// Slot (1-based) to filter name.
    pub filters: BTreeMap<usize, String>,
}

impl DeviceInfo {
    /// Info for a device without filter wheel.
    pub fn new(name: impl Into<String>, serial: impl Into<String>, address: DeviceAddress) -> Self {
        Self {
            name: name.into(),
            serial: serial.into(),
            address,
            filter_wheel: None,
            filters: BTreeMap::new(),
        }
    }

    /// Attach a filter wheel model.
    pub fn with_filter_wheel(mut self, model: impl Into<String>) -> Self {
        self.filter_wheel = Some(model.into());
        self
    }

    /// Name the filter in `slot`.
    pub fn set_filter(&mut self, slot: usize, name: impl Into<String>) {
        self.filters.insert(slot, name.into());
    }

    /// Name slots 1.. after a standard filter set.
    pub fn apply_filter_set(&mut self, set: FilterSet) {
        for (index, name) in set.names().iter().enumerate() {
            self.set_filter(index + 1, *name);
        }
    }
}

impl PartialEq for DeviceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.serial == other.serial
            && self.address == other.address
            && self.filter_wheel == other.filter_wheel
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (S/N {}) on {}", self.name, self.serial, self.address)?;
        if let Some(wheel) = &self.filter_wheel {
            write!(f, " with {}", wheel)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sets() {
        let mut info = DeviceInfo::new("ST-10", "1", DeviceAddress::Usb(1));
        info.apply_filter_set(FilterSet::Ubvri);
        assert_eq!(info.filters.get(&1).map(String::as_str), Some("U"));
        assert_eq!(info.filters.get(&5).map(String::as_str), Some("I"));

        info.apply_filter_set(FilterSet::Rgbl);
        assert_eq!(info.filters.get(&4).map(String::as_str), Some("Clear"));
    }

    #[test]
    fn test_equality_ignores_filter_names() {
        let a = DeviceInfo::new("ST-7", "42", DeviceAddress::Usb(1)).with_filter_wheel("CFW-8");
        let mut b = a.clone();
        b.set_filter(1, "Red");
        assert_eq!(a, b);

        let c = a.clone().with_filter_wheel("CFW-10");
        assert_ne!(a, c);
    }
}
