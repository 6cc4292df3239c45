//! Handing descriptors to a child process
//!
//! The parent clones its root and every inheritable fd into a flat list of
//! handles with info words. The child's bootstrap reads the same list back
//! into the same fd layout.

use crate::io::TransferUnit;
use crate::unistd::Mxio;
use crate::Result;
use core_types::{HandleType, MXIO_MAX_HANDLES};
use kernel_api::{BundleEntry, Handle, KernelError};

/// Stamps every info word in `unit` with `fd`
fn stamp(unit: TransferUnit, fd: u16) -> TransferUnit {
    unit.into_iter()
        .map(|(handle, info)| (handle, info.with_arg(fd)))
        .collect()
}

impl Mxio {
    /// Clones the object at `fd` for delivery as `newfd` elsewhere
    pub fn clone_fd(&self, fd: i32, newfd: i32) -> Result<TransferUnit> {
        let newfd = u16::try_from(newfd).map_err(|_| KernelError::InvalidArgs)?;
        let io = self.table.resolve(fd).ok_or(KernelError::BadHandle)?;
        Ok(stamp(io.clone_handles()?, newfd))
    }

    /// Packs the root and every clonable fd into at most `capacity` entries
    ///
    /// Fails `NoMemory` up front if `capacity` cannot hold one transfer
    /// unit, and `BadHandle` without a root. A root that cannot be cloned
    /// fails the whole call; an fd that cannot be cloned is skipped.
    pub fn create_subprocess_handles(&self, capacity: usize) -> Result<TransferUnit> {
        if capacity < MXIO_MAX_HANDLES {
            return Err(KernelError::NoMemory);
        }
        let root = self.root.as_ref().ok_or(KernelError::BadHandle)?;
        let mut bundle: TransferUnit = root
            .clone_handles()?
            .into_iter()
            .map(|(handle, info)| (handle, info.with_type(HandleType::MxioRoot).with_arg(0)))
            .collect();

        for (fd, io) in self.table.occupied() {
            if capacity.saturating_sub(bundle.len()) < MXIO_MAX_HANDLES {
                log::debug!("subprocess bundle full at fd {}", fd);
                break;
            }
            let Ok(tag) = u16::try_from(fd) else {
                log::warn!("fd {} does not fit a handle info word, not inherited", fd);
                continue;
            };
            match io.clone_handles() {
                Ok(unit) if !unit.is_empty() => bundle.extend(stamp(unit, tag)),
                Ok(_) => {}
                Err(err) => log::debug!("fd {} ({:?}) not inherited: {}", fd, io.kind(), err),
            }
        }
        Ok(bundle)
    }

    /// Starts a process that inherits this context's root and fds
    pub fn start_process(&self, name: &str, argv: &[String]) -> Result<Handle> {
        let bundle = self.create_subprocess_handles(self.config.subprocess_capacity())?;
        let entries: Vec<BundleEntry> = bundle
            .into_iter()
            .map(|(handle, info)| (handle.into_raw(), info))
            .collect();
        log::debug!("starting {} with {} handles", name, entries.len());
        let process = self.kernel.process_start(name, argv, entries)?;
        Ok(Handle::from_raw(self.kernel.clone(), process))
    }
}
