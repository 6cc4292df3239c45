//! # Kernel API
//!
//! This crate defines the boundary between the userspace I/O layer and the
//! kernel.
//!
//! ## Philosophy
//!
//! The kernel hands out **handles**, not file descriptors:
//! - A handle names exactly one kernel object (message pipe end, byte
//!   stream end, event, process)
//! - Handles are never duplicated implicitly
//! - Closing a handle is a one-time, irreversible operation
//! - Handles move between processes only by explicit transfer
//!
//! ## Design Goals
//!
//! 1. **Testability**: the whole surface is a trait, implemented in-process
//!    by `sim_kernel` and by syscalls on real hardware
//! 2. **Ownership**: [`Handle`] owns its kernel object and closes it exactly
//!    once, on explicit `close()` or on drop
//! 3. **One status space**: every failure is a [`KernelError`] with a
//!    stable negative code
//!
//! ## Non-Goals
//!
//! This is NOT the POSIX layer. File descriptors, paths and seek offsets
//! belong to `mxio`, which is built on top of this crate.

pub mod error;
pub mod handle;
pub mod kernel;
pub mod mp;
pub mod signals;
pub mod time;

pub use error::KernelError;
pub use handle::Handle;
pub use kernel::{BundleEntry, KernelApi, KernelRef, MessageRead};
pub use mp::{CpuMask, IpiSender, MpIpi};
pub use signals::Signals;
pub use time::{Deadline, Duration, Instant};
