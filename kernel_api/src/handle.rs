//! Owned kernel handles

use crate::{Deadline, KernelError, KernelRef, Signals};
use core_types::RawHandle;
use std::fmt;

/// An owned reference to a kernel object
///
/// `Handle` is move-only: there is no `Clone`. A second reference to the
/// same object only comes from [`Handle::duplicate`], which asks the kernel
/// for a new handle value. The underlying handle is closed exactly once:
/// by [`Handle::close`], or on drop if it was neither closed nor given away
/// with [`Handle::into_raw`].
pub struct Handle {
    raw: RawHandle,
    kernel: KernelRef,
}

impl Handle {
    /// Takes ownership of a raw handle value
    ///
    /// The caller must own `raw`; ownership moves into the returned value.
    pub fn from_raw(kernel: KernelRef, raw: RawHandle) -> Self {
        Self { raw, kernel }
    }

    /// Returns the raw value without giving up ownership
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Returns the kernel this handle belongs to
    pub fn kernel(&self) -> &KernelRef {
        &self.kernel
    }

    /// Asks the kernel for a second handle to the same object
    pub fn duplicate(&self) -> Result<Handle, KernelError> {
        let raw = self.kernel.handle_duplicate(self.raw)?;
        Ok(Handle::from_raw(self.kernel.clone(), raw))
    }

    /// Waits for any of `signals` on the underlying object
    pub fn wait_one(&self, signals: Signals, deadline: Deadline) -> Result<Signals, KernelError> {
        self.kernel.handle_wait_one(self.raw, signals, deadline)
    }

    /// Closes the handle, reporting the kernel's status
    pub fn close(mut self) -> Result<(), KernelError> {
        let raw = std::mem::take(&mut self.raw);
        self.kernel.handle_close(raw)
    }

    /// Gives up ownership of the raw value (e.g. to transfer it)
    pub fn into_raw(mut self) -> RawHandle {
        std::mem::take(&mut self.raw)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.raw != 0 {
            let _ = self.kernel.handle_close(self.raw);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.raw)
    }
}
