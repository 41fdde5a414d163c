//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use sbig_camera::device_info::FilterSet;
use sbig_camera::driver::mock::{MockCamera, MockDriver};
use sbig_camera::{CommandSession, Device, DeviceInfo};

/// Simulated rig: the driver for inspection plus an open session.
pub struct Rig {
    pub driver: Arc<MockDriver>,
    pub session: Arc<CommandSession>,
}

impl Rig {
    pub fn new(driver: MockDriver) -> Self {
        let driver = Arc::new(driver);
        let session = CommandSession::new(Arc::clone(&driver)).unwrap();
        Self { driver, session }
    }

    /// Rig with an ST-7 on USB1 and an ST-10 on USB2.
    pub fn two_cameras() -> Self {
        Self::new(MockDriver::new(vec![MockCamera::st7(), MockCamera::st10()]))
    }

    pub fn open(&self, model: &str) -> Arc<Device> {
        let info = self.session.find_device(model, None).unwrap();
        self.session.open_device(&info).unwrap()
    }

    /// Open `model` with a CFW-8 carrying the RGBL set.
    pub fn open_with_wheel(&self, model: &str) -> Arc<Device> {
        let info = self.wheel_info(model);
        self.session.open_device(&info).unwrap()
    }

    pub fn wheel_info(&self, model: &str) -> DeviceInfo {
        let mut info = self.session.find_device(model, Some("CFW-8")).unwrap();
        info.apply_filter_set(FilterSet::Rgbl);
        info
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new(MockDriver::default())
    }
}
