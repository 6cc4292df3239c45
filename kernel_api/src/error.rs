//! Kernel status codes

use thiserror::Error;

/// Errors that can occur when interacting with the kernel or with an I/O
/// object built on top of it
///
/// Each kind carries a distinct small negative status code so that callers
/// speaking the numeric convention can still tell them apart.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum KernelError {
    /// Object or slot not found by path
    #[error("Not found")]
    NotFound,

    /// Allocation failed, or caller-provided space is too small
    #[error("Out of memory")]
    NoMemory,

    /// Malformed argument, null buffer, out-of-range slot
    #[error("Invalid arguments")]
    InvalidArgs,

    /// Deadline elapsed before the wait was satisfied
    #[error("Timed out")]
    TimedOut,

    /// Slot or name already bound
    #[error("Already exists")]
    AlreadyExists,

    /// Malformed or short reply from a transport
    #[error("I/O error")]
    Io,

    /// Capability not implemented by this object
    #[error("Not supported")]
    NotSupported,

    /// Fixed-capacity table is full
    #[error("No resources")]
    NoResources,

    /// Handle is not live, or slot is not bound
    #[error("Bad handle")]
    BadHandle,

    /// Operation not permitted on this handle
    #[error("Access denied")]
    AccessDenied,

    /// Non-blocking operation found nothing to do yet
    #[error("Should wait")]
    ShouldWait,

    /// The other end of a pipe or channel is gone
    #[error("Peer closed")]
    PeerClosed,
}

impl KernelError {
    /// Returns the numeric status code (always negative)
    pub const fn code(self) -> i32 {
        match self {
            KernelError::NotFound => -2,
            KernelError::NoMemory => -5,
            KernelError::InvalidArgs => -8,
            KernelError::TimedOut => -13,
            KernelError::AlreadyExists => -14,
            KernelError::PeerClosed => -15,
            KernelError::Io => -20,
            KernelError::NotSupported => -24,
            KernelError::ShouldWait => -33,
            KernelError::NoResources => -41,
            KernelError::BadHandle => -42,
            KernelError::AccessDenied => -43,
        }
    }

    /// Decodes a numeric status code
    ///
    /// Returns `None` for non-negative values (success) and for codes this
    /// layer does not know, which callers usually treat as [`KernelError::Io`].
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -2 => KernelError::NotFound,
            -5 => KernelError::NoMemory,
            -8 => KernelError::InvalidArgs,
            -13 => KernelError::TimedOut,
            -14 => KernelError::AlreadyExists,
            -15 => KernelError::PeerClosed,
            -20 => KernelError::Io,
            -24 => KernelError::NotSupported,
            -33 => KernelError::ShouldWait,
            -41 => KernelError::NoResources,
            -42 => KernelError::BadHandle,
            -43 => KernelError::AccessDenied,
            _ => return None,
        })
    }
}
