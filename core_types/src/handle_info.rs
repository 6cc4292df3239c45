//! Handle-info words
//!
//! Every handle delivered to a new process travels with a 32-bit info word.
//! The low 16 bits name the kind of handle, the high 16 bits carry an
//! argument. For descriptor-bound kinds the argument is the fd slot the
//! handle must land in.
//!
//! ```
//! use core_types::{HandleInfo, HandleType};
//!
//! let info = HandleInfo::new(HandleType::MxioPipe, 3);
//! assert_eq!(info.handle_type(), HandleType::MxioPipe);
//! assert_eq!(info.arg(), 3);
//! assert_eq!(info.raw(), 0x12 | (3 << 16));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw kernel handle value. Zero never names a live handle.
pub type RawHandle = u32;

/// Largest number of handles a single I/O object produces when cloned.
///
/// A remote object may carry an auxiliary event handle next to its
/// primary channel, so one transfer unit is at most two handles.
pub const MXIO_MAX_HANDLES: usize = 2;

/// Coarse kind of a transferred handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleType {
    /// The receiving process's own process handle
    ProcSelf,
    /// Root filesystem connection
    MxioRoot,
    /// Remote I/O object bound to an fd
    MxioRemote,
    /// Pipe endpoint bound to an fd
    MxioPipe,
    /// Any kind this layer does not interpret
    Unknown(u16),
}

impl HandleType {
    /// Returns the 16-bit wire value
    pub const fn bits(self) -> u16 {
        match self {
            HandleType::ProcSelf => 0x01,
            HandleType::MxioRoot => 0x10,
            HandleType::MxioRemote => 0x11,
            HandleType::MxioPipe => 0x12,
            HandleType::Unknown(bits) => bits,
        }
    }

    /// Decodes a 16-bit wire value
    pub const fn from_bits(bits: u16) -> Self {
        match bits {
            0x01 => HandleType::ProcSelf,
            0x10 => HandleType::MxioRoot,
            0x11 => HandleType::MxioRemote,
            0x12 => HandleType::MxioPipe,
            other => HandleType::Unknown(other),
        }
    }

    /// Whether handles of this kind are bound to an fd in the receiver
    pub const fn is_fd_bound(self) -> bool {
        matches!(self, HandleType::MxioRemote | HandleType::MxioPipe)
    }
}

/// Kind + argument metadata attached to a transferred handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleInfo(u32);

impl HandleInfo {
    /// The "consumed" marker left in a bundle once an entry is claimed
    pub const NONE: HandleInfo = HandleInfo(0);

    /// Builds an info word from a kind and an argument
    pub const fn new(handle_type: HandleType, arg: u16) -> Self {
        Self(handle_type.bits() as u32 | ((arg as u32) << 16))
    }

    /// Wraps a raw info word as received from the kernel
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw info word
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn handle_type(self) -> HandleType {
        HandleType::from_bits((self.0 & 0xffff) as u16)
    }

    pub const fn arg(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Returns the same kind with its argument replaced
    pub const fn with_arg(self, arg: u16) -> Self {
        Self((self.0 & 0xffff) | ((arg as u32) << 16))
    }

    /// Returns the same argument with its kind replaced
    pub const fn with_type(self, handle_type: HandleType) -> Self {
        Self((self.0 & 0xffff_0000) | handle_type.bits() as u32)
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for HandleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.handle_type(), self.arg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_type_bits_roundtrip() {
        for ty in [
            HandleType::ProcSelf,
            HandleType::MxioRoot,
            HandleType::MxioRemote,
            HandleType::MxioPipe,
        ] {
            assert_eq!(HandleType::from_bits(ty.bits()), ty);
        }
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let info = HandleInfo::from_raw(0x7777 | (5 << 16));
        assert_eq!(info.handle_type(), HandleType::Unknown(0x7777));
        assert_eq!(info.arg(), 5);
    }

    #[test]
    fn test_with_arg_replaces_slot() {
        let info = HandleInfo::new(HandleType::MxioRemote, 9).with_arg(4);
        assert_eq!(info.arg(), 4);
        assert_eq!(info.handle_type(), HandleType::MxioRemote);
    }

    #[test]
    fn test_with_type_keeps_arg() {
        let info = HandleInfo::new(HandleType::MxioRemote, 0).with_type(HandleType::MxioRoot);
        assert_eq!(info.handle_type(), HandleType::MxioRoot);
        assert_eq!(info.arg(), 0);
    }

    #[test]
    fn test_fd_bound_kinds() {
        assert!(HandleType::MxioRemote.is_fd_bound());
        assert!(HandleType::MxioPipe.is_fd_bound());
        assert!(!HandleType::MxioRoot.is_fd_bound());
        assert!(!HandleType::ProcSelf.is_fd_bound());
    }

    #[test]
    fn test_none_marker() {
        assert!(HandleInfo::NONE.is_none());
        assert!(!HandleInfo::new(HandleType::ProcSelf, 0).is_none());
    }

    #[test]
    fn test_info_serializes_as_word() {
        let info = HandleInfo::new(HandleType::MxioPipe, 2);
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, format!("{}", info.raw()));
    }
}
