//! Descriptor table
//!
//! A fixed-capacity arena of owned I/O objects indexed by fd. This is the
//! only place fd lifetime is decided: an object enters through [`bind`],
//! leaves through [`release`] or [`close`], and everything still present
//! is closed by [`teardown`].
//!
//! [`bind`]: FdTable::bind
//! [`release`]: FdTable::release
//! [`close`]: FdTable::close
//! [`teardown`]: FdTable::teardown

use crate::error::BindError;
use crate::io::IoObject;
use crate::Result;
use kernel_api::KernelError;

#[derive(Debug)]
pub struct FdTable {
    slots: Vec<Option<Box<dyn IoObject>>>,
}

impl FdTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn index(&self, fd: i32) -> Option<usize> {
        usize::try_from(fd).ok().filter(|index| *index < self.slots.len())
    }

    /// Binds `io` at `fd`, or at the lowest free slot if `fd` is negative
    ///
    /// Fails `InvalidArgs` for an out-of-range slot, `AlreadyExists` for an
    /// occupied one and `NoResources` when no slot is free. On failure the
    /// object comes back inside the error, untouched.
    pub fn bind(&mut self, io: Box<dyn IoObject>, fd: i32) -> core::result::Result<i32, BindError> {
        let index = if fd < 0 {
            match self.slots.iter().position(Option::is_none) {
                Some(index) => index,
                None => {
                    return Err(BindError {
                        status: KernelError::NoResources,
                        io,
                    })
                }
            }
        } else {
            let Some(index) = self.index(fd) else {
                return Err(BindError {
                    status: KernelError::InvalidArgs,
                    io,
                });
            };
            if self.slots[index].is_some() {
                return Err(BindError {
                    status: KernelError::AlreadyExists,
                    io,
                });
            }
            index
        };
        self.slots[index] = Some(io);
        Ok(index as i32)
    }

    pub fn resolve(&self, fd: i32) -> Option<&dyn IoObject> {
        self.slots.get(self.index(fd)?)?.as_deref()
    }

    pub fn resolve_mut(&mut self, fd: i32) -> Option<&mut Box<dyn IoObject>> {
        let index = self.index(fd)?;
        self.slots[index].as_mut()
    }

    /// Unbinds `fd` and hands its object to the caller
    pub fn release(&mut self, fd: i32) -> Option<Box<dyn IoObject>> {
        let index = self.index(fd)?;
        self.slots[index].take()
    }

    /// Closes the object at `fd`
    ///
    /// The slot is free afterwards even if the object's close failed.
    pub fn close(&mut self, fd: i32) -> Result<()> {
        let io = self.release(fd).ok_or(KernelError::BadHandle)?;
        io.close()
    }

    /// Closes every bound object and empties the table
    pub fn teardown(&mut self) {
        for (fd, slot) in self.slots.iter_mut().enumerate() {
            if let Some(io) = slot.take() {
                if let Err(err) = io.close() {
                    log::warn!("fd {}: close during teardown failed: {}", fd, err);
                }
            }
        }
    }

    /// Occupied slots in ascending fd order
    pub fn occupied(&self) -> impl Iterator<Item = (i32, &dyn IoObject)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(fd, slot)| slot.as_deref().map(|io| (fd as i32, io)))
    }
}
