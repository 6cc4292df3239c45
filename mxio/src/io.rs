//! The I/O object capability set
//!
//! Every fd resolves to a `Box<dyn IoObject>`. POSIX entry points do a
//! single call through the trait; nothing outside the variants knows how
//! a particular transport works. Variants override what they support and
//! inherit `NotSupported` for the rest.

use crate::Result;
use bitflags::bitflags;
use core_types::HandleInfo;
use kernel_api::{Deadline, Handle, KernelError};
use std::fmt;

/// Handles (and their info words) produced by cloning one object
///
/// Never longer than [`MXIO_MAX_HANDLES`](core_types::MXIO_MAX_HANDLES).
pub type TransferUnit = Vec<(Handle, HandleInfo)>;

bitflags! {
    /// Readiness conditions an fd can be waited on for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Events: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const PEER_CLOSED = 1 << 2;
    }
}

/// Base for a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

impl Whence {
    /// Decodes the POSIX `SEEK_SET`/`SEEK_CUR`/`SEEK_END` values
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            _ => Err(KernelError::InvalidArgs),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Whence::Set => 0,
            Whence::Current => 1,
            Whence::End => 2,
        }
    }
}

/// Out-of-band operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscOp {
    /// Node attributes, see [`VnAttr`](ipc::VnAttr)
    Stat,
    /// Next batch of packed directory records
    Readdir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Null,
    Pipe,
    Remote,
}

/// An object an fd can name
pub trait IoObject: Send + fmt::Debug {
    fn kind(&self) -> IoKind;

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(KernelError::NotSupported)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(KernelError::NotSupported)
    }

    /// Releases the object and every handle it owns
    ///
    /// Consumes the object: whatever the outcome, the handles are gone.
    fn close(self: Box<Self>) -> Result<()>;

    /// Returns the new offset
    fn seek(&mut self, _offset: i64, _whence: Whence) -> Result<u64> {
        Err(KernelError::NotSupported)
    }

    /// Device-specific control; returns the bytes written to `output`
    fn ioctl(&mut self, _op: u32, _input: &[u8], _output: &mut [u8]) -> Result<usize> {
        Err(KernelError::NotSupported)
    }

    /// Blocks until one of `events` holds or the deadline passes
    fn wait(&self, _events: Events, _deadline: Deadline) -> Result<Events> {
        Err(KernelError::NotSupported)
    }

    /// Produces new handles to the same underlying resource
    ///
    /// The object itself stays owned by its caller. Info words carry the
    /// kind; the fd argument is stamped by whoever packs the unit.
    fn clone_handles(&self) -> Result<TransferUnit> {
        Err(KernelError::NotSupported)
    }

    /// Out-of-band request returning at most `max` bytes
    fn misc(&mut self, _op: MiscOp, _max: usize) -> Result<Vec<u8>> {
        Err(KernelError::NotSupported)
    }

    /// Resolves `path` relative to this object (root only in practice)
    fn open(&mut self, _path: &str, _flags: u32) -> Result<Box<dyn IoObject>> {
        Err(KernelError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whence_raw_values() {
        for whence in [Whence::Set, Whence::Current, Whence::End] {
            assert_eq!(Whence::from_raw(whence.raw()), Ok(whence));
        }
        assert_eq!(Whence::from_raw(3), Err(KernelError::InvalidArgs));
    }
}
