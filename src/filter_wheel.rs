//! Filter wheel positioning.
//!
//! A goto is a single command followed by a status poll every 10 ms until the
//! wheel reports idle or a real error (anything above "busy"). Moves are
//! refused while the main detector is exposing, since the wheel would be in
//! the light path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cancel::RunFlag;
use crate::driver::{CfwCommand, CfwReply, CfwRequest, CfwStatus, DeviceHandle};
use crate::error::{SbigError, SbigResult};
use crate::session::CommandSession;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// `CFWE_BUSY`. Error codes above this abort a move.
const CFW_ERROR_BUSY: u16 = 1;

/// Supported filter wheel models with their `CFW_MODEL_SELECT` value and slot count.
const MODELS: [(&str, u16, usize); 17] = [
    ("CFW-2", 1, 2),
    ("CFW-5", 2, 4),
    ("CFW-8", 3, 5),
    ("CFW-L", 4, 5),
    ("CFW-402", 5, 4),
    ("CFW-6A", 7, 6),
    ("CFW-10", 8, 10),
    ("CFW-10-serial", 9, 10),
    ("CFW-9", 10, 5),
    ("CFW-L8", 11, 8),
    ("CFW-L8G", 12, 8),
    ("CFW-1603", 13, 5),
    ("FW5-STX", 14, 5),
    ("FW5-8300", 15, 5),
    ("FW8-8300", 16, 8),
    ("FW7-STX", 17, 7),
    ("FW8-STT", 18, 8),
];

/// A supported filter wheel model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterWheelModel {
    name: &'static str,
    code: u16,
    slots: usize,
}

impl FilterWheelModel {
    /// Look up a model by its catalogue name, e.g. `CFW-8`.
    pub fn from_name(name: &str) -> SbigResult<Self> {
        MODELS
            .iter()
            .find(|(model, _, _)| *model == name)
            .map(|&(name, code, slots)| Self { name, code, slots })
            .ok_or_else(|| SbigError::UnsupportedFilterWheel(name.to_string()))
    }

    /// Names of every supported model.
    pub fn supported() -> impl Iterator<Item = &'static str> {
        MODELS.iter().map(|(name, _, _)| *name)
    }

    /// Catalogue name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Raw model selector sent with every request.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Number of filter positions.
    pub fn slots(&self) -> usize {
        self.slots
    }
}

/// A filter wheel attached to a camera.
///
/// Opened on construction and closed on drop.
pub struct FilterPositioner {
    session: Arc<CommandSession>,
    handle: DeviceHandle,
    model: FilterWheelModel,
    slot_names: BTreeMap<usize, String>,
    active_slot: Mutex<usize>,
    main_exposing: Option<RunFlag>,
}

impl FilterPositioner {
    /// Open the wheel on `handle` and check that it answers.
    ///
    /// `main_exposing` is the main detector's exposure flag; moves are refused
    /// while it is set.
    pub fn new(
        session: Arc<CommandSession>,
        handle: DeviceHandle,
        model: &str,
        slot_names: BTreeMap<usize, String>,
        main_exposing: Option<RunFlag>,
    ) -> SbigResult<Self> {
        let model = FilterWheelModel::from_name(model)?;
        let wheel = Self {
            session,
            handle,
            model,
            slot_names,
            active_slot: Mutex::new(1),
            main_exposing,
        };
        wheel.request(CfwCommand::OpenDevice, 0)?;
        let reply = wheel.request(CfwCommand::Query, 0)?;
        debug!(
            "{} opened on {}: position {}, status {:?}",
            model.name,
            handle,
            reply.position,
            CfwStatus::from_raw(reply.status)
        );
        Ok(wheel)
    }

    fn request(&self, command: CfwCommand, param1: u32) -> SbigResult<CfwReply> {
        let mut request = CfwRequest::new(self.model.code, command);
        request.param1 = param1;
        self.session.cfw(self.handle, request)
    }

    /// Re-home the wheel.
    pub fn init(&self) -> SbigResult<()> {
        self.request(CfwCommand::Init, 0)?;
        *self.active_slot.lock() = 1;
        Ok(())
    }

    /// Model of this wheel.
    pub fn model(&self) -> FilterWheelModel {
        self.model
    }

    /// Move to `slot` (1-based) and wait until the wheel stops.
    ///
    /// Returns the time the move took in seconds. While the main detector is
    /// exposing the request is ignored and `0.0` is returned.
    pub fn set_filter_slot(&self, slot: usize) -> SbigResult<f64> {
        if self.main_exposing.as_ref().is_some_and(RunFlag::is_running) {
            warn!(
                "Ignoring move of {} to slot {}: exposure in progress",
                self.model.name, slot
            );
            return Ok(0.0);
        }

        let started = Instant::now();
        self.request(CfwCommand::Goto, u32::try_from(slot).unwrap_or(u32::MAX))?;

        let reply = loop {
            thread::sleep(POLL_INTERVAL);
            let reply = self.request(CfwCommand::Query, 0)?;
            let idle = CfwStatus::from_raw(reply.status) == CfwStatus::Idle;
            if idle || reply.error > CFW_ERROR_BUSY {
                break reply;
            }
        };
        if reply.error > CFW_ERROR_BUSY {
            return Err(SbigError::FilterWheel {
                slot,
                code: reply.error,
            });
        }

        *self.active_slot.lock() = slot;
        let elapsed = started.elapsed().as_secs_f64();
        info!(
            "{} at slot {} ({}) after {:.2} s",
            self.model.name,
            slot,
            self.active_filter_name(),
            elapsed
        );
        Ok(elapsed)
    }

    /// Move to the first slot named `name`.
    ///
    /// An unknown name leaves the wheel where it is and returns `0.0`.
    pub fn set_filter_name(&self, name: &str) -> SbigResult<f64> {
        match self
            .slot_names
            .iter()
            .find(|(_, filter)| filter.as_str() == name)
        {
            Some((slot, _)) => self.set_filter_slot(*slot),
            None => {
                warn!("No filter named '{}' in {}", name, self.model.name);
                Ok(0.0)
            }
        }
    }

    /// Installed filter names in slot order.
    pub fn filter_names(&self) -> Vec<String> {
        self.slot_names.values().cloned().collect()
    }

    /// Slot to filter name.
    pub fn slot_to_filter_map(&self) -> BTreeMap<usize, String> {
        self.slot_names.clone()
    }

    /// Name of the filter at the active slot, empty if the slot is unnamed.
    pub fn active_filter_name(&self) -> String {
        self.slot_names
            .get(&self.active_filter_slot())
            .cloned()
            .unwrap_or_default()
    }

    /// Active slot, 1-based.
    pub fn active_filter_slot(&self) -> usize {
        *self.active_slot.lock()
    }
}

impl fmt::Debug for FilterPositioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterPositioner")
            .field("model", &self.model.name)
            .field("handle", &self.handle)
            .field("active_slot", &self.active_filter_slot())
            .finish()
    }
}

impl Drop for FilterPositioner {
    fn drop(&mut self) {
        // Some wheels reject close; it must not block teardown.
        if let Err(err) = self.request(CfwCommand::CloseDevice, 0) {
            debug!("Ignoring close failure of {}: {}", self.model.name, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use tracing_test::traced_test;

    #[test]
    fn test_model_table() {
        let model = FilterWheelModel::from_name("CFW-10-serial").unwrap();
        assert_eq!(model.code(), 9);
        assert_eq!(model.slots(), 10);
        assert_eq!(FilterWheelModel::from_name("FW7-STX").unwrap().slots(), 7);
        assert_eq!(FilterWheelModel::supported().count(), 17);
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(matches!(
            FilterWheelModel::from_name("CFW-99"),
            Err(SbigError::UnsupportedFilterWheel(_))
        ));
    }

    #[test]
    #[traced_test]
    fn test_move_refused_while_main_exposes() {
        let session = CommandSession::new(MockDriver::default()).unwrap();
        let info = session.find_device("ST-7", Some("CFW-8")).unwrap();
        let device = session.open_device(&info).unwrap();
        let wheel = device.filter_wheel().unwrap();
        let main = device.main_detector().unwrap();

        main.exposing_flag().start();
        assert_eq!(wheel.set_filter_slot(3).unwrap(), 0.0);
        assert_eq!(wheel.active_filter_slot(), 1);
        assert!(logs_contain("exposure in progress"));

        main.exposing_flag().stop();
        assert!(wheel.set_filter_slot(3).unwrap() > 0.0);
        assert_eq!(wheel.active_filter_slot(), 3);
    }
}
