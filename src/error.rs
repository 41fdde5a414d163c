//! Custom error types for the camera control crate.
//!
//! This module defines the primary error type, `SbigError`. Using the `thiserror`
//! crate, it provides a single place for everything that can fail while talking
//! to the universal driver, from rejected commands to configuration problems.
//!
//! ## Error Hierarchy
//!
//! - **`Command`**: The driver returned a non-zero status for a command. This is
//!   fatal for the operation in progress. Nothing in this crate retries a failed
//!   command, since the driver session is in an unknown state afterwards.
//! - **`FilterWheel`**: The filter wheel reported an error while moving.
//! - **`Unsupported*`** / **`UnknownDeviceFamily`** / **`DeviceNotFound`**: The
//!   requested hardware is not something this crate knows how to drive.
//! - **`Config`**, **`Io`**, **`Serialization`**, **`Task`**: Ambient failures
//!   while loading configuration or persisting images.
//!
//! Clamped exposure parameters, refused filter moves and aborted exposures are
//! not errors and never surface here.

use thiserror::Error;

use crate::driver::{CommandId, StatusCode};

/// Convenience alias for results using the crate error type.
pub type SbigResult<T> = std::result::Result<T, SbigError>;

/// Primary error type for camera control.
#[derive(Error, Debug)]
pub enum SbigError {
    /// A driver command returned a non-zero status.
    #[error("Command {command} failed: {status}")]
    Command {
        /// Command that was rejected.
        command: CommandId,
        /// Raw status reported by the driver.
        status: StatusCode,
    },

    /// A driver command succeeded but answered with a reply of the wrong shape.
    #[error("Command {0} returned an unexpected reply")]
    UnexpectedReply(CommandId),

    /// The filter wheel reported an error code while moving.
    #[error("Filter wheel error {code} while moving to slot {slot}")]
    FilterWheel {
        /// Slot that was requested.
        slot: usize,
        /// Raw filter wheel error code.
        code: u16,
    },

    /// Camera model not in the supported list.
    #[error("Camera model '{0}' is not supported")]
    UnsupportedCamera(String),

    /// Filter wheel model not in the supported list.
    #[error("Filter wheel model '{0}' is not supported")]
    UnsupportedFilterWheel(String),

    /// The detector does not offer the requested readout mode.
    #[error("Readout mode {0} is not supported by this detector")]
    UnsupportedReadoutMode(String),

    /// The device name matches no known camera family.
    #[error("Unknown camera family for device '{0}'. Cannot initialize")]
    UnknownDeviceFamily(String),

    /// No enumerated device matched the requested model.
    #[error("No connected device matches '{0}'")]
    DeviceNotFound(String),

    /// Configuration is syntactically valid but semantically wrong.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failures while persisting images.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking task on the runtime's pool panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SbigError {
    /// Raw driver status carried by a command failure, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SbigError::Command { status, .. } => Some(*status),
            _ => None,
        }
    }
}
