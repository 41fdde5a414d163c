//! # SBIG Camera Control Library
//!
//! Control of SBIG cooled CCD cameras and their filter wheels through the
//! vendor's universal driver, plus a capture loop that sequences exposures.
//!
//! ## Crate Structure
//!
//! - **`driver`**: The single-entry-point driver seam (`UniversalDriver`), its
//!   typed command and reply structures, the simulated `MockDriver` and, with
//!   the `sbig_hardware` feature, the FFI-backed driver.
//! - **`session`**: `CommandSession`, which serializes every driver call,
//!   caches the current device handle and owns the readout critical section.
//! - **`device`** / **`device_info`**: Opening a camera and building its
//!   detectors and filter wheel.
//! - **`detector`**: The exposure and readout state machine of one sensor.
//! - **`filter_wheel`**: `FilterPositioner`, slot and name based filter moves.
//! - **`readout_mode`**: Binning modes and the per-detector readout table.
//! - **`capabilities`**: `Camera` and `FilterWheel` traits the capture loop is
//!   written against.
//! - **`worker`**, **`mount`**, **`storage`**: The capture loop and its
//!   collaborators.
//! - **`config`** / **`logging`**: Figment configuration and tracing setup.
//! - **`error`**: `SbigError`, the crate-wide error type.

pub mod cancel;
pub mod capabilities;
pub mod config;
pub mod detector;
pub mod device;
pub mod device_info;
pub mod driver;
pub mod error;
pub mod exposure;
pub mod filter_wheel;
pub mod image;
pub mod logging;
pub mod mount;
pub mod readout_mode;
pub mod session;
pub mod storage;
pub mod worker;

pub use detector::Detector;
pub use device::Device;
pub use device_info::DeviceInfo;
pub use error::{SbigError, SbigResult};
pub use filter_wheel::FilterPositioner;
pub use session::CommandSession;
