//! # mxio
//!
//! POSIX-style file descriptors over capability handles.
//!
//! ## Philosophy
//!
//! **Descriptors are a view, handles are the truth.**
//!
//! The kernel knows nothing about file descriptors. It hands out opaque,
//! move-only handles, and every I/O endpoint speaks its own transport over
//! them. This crate keeps a small numeric namespace on top:
//! - Each fd slot owns exactly one I/O object
//! - Each I/O object owns exactly the handles inside it
//! - Closing an object closes its handles once, and only once
//!
//! ## Design
//!
//! - **IoObject**: one trait, three variants ([`NullIo`], [`PipeIo`],
//!   [`RemoteIo`]); unsupported operations answer `NotSupported`
//! - **FdTable**: fixed-capacity arena of owned objects, first-fit binding
//! - **Bootstrap**: decodes the startup bundle in two passes (group, then
//!   construct) into the root resolver and the fd table
//! - **Subprocess packing**: clones the root and every inheritable fd into
//!   a bundle of handles and handle-info words for a child
//! - **Mxio**: the per-process context that owns all of the above; its
//!   `Drop` is the process-exit hook
//!
//! The context is single-owner and not synchronized. Callers sharing it
//! across threads wrap it in a lock.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod fd_table;
pub mod io;
pub mod null;
pub mod pipe;
pub mod remote;
pub mod spawn;
pub mod unistd;

pub use bootstrap::StartupBundle;
pub use config::{ConfigError, MxioConfig, UnknownHandlePolicy};
pub use error::{BindError, Result};
pub use fd_table::FdTable;
pub use io::{Events, IoKind, IoObject, MiscOp, TransferUnit, Whence};
pub use null::NullIo;
pub use pipe::{pipe_pair, PipeIo};
pub use remote::RemoteIo;
pub use unistd::Mxio;

pub use core_types::{HandleInfo, HandleType, MXIO_MAX_HANDLES};
pub use ipc::VnAttr;
pub use kernel_api::{Deadline, KernelError};
