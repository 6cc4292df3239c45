//! Error types

use crate::io::IoObject;
use kernel_api::KernelError;
use thiserror::Error;

/// Result of an I/O layer operation
pub type Result<T> = core::result::Result<T, KernelError>;

/// A rejected bind
///
/// The table never takes ownership of an object it refuses, so the object
/// rides back to the caller, who must close or re-bind it.
#[derive(Debug, Error)]
#[error("cannot bind descriptor: {status}")]
pub struct BindError {
    pub status: KernelError,
    pub io: Box<dyn IoObject>,
}

impl BindError {
    /// Closes the rejected object and returns the bind status
    pub fn close(self) -> KernelError {
        if let Err(err) = self.io.close() {
            log::warn!("closing rejected object failed: {}", err);
        }
        self.status
    }

    /// Takes the rejected object back
    pub fn into_io(self) -> Box<dyn IoObject> {
        self.io
    }
}
