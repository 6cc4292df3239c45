//! # Core Types
//!
//! Kernel-independent values shared by every layer of the I/O stack.
//!
//! ## Philosophy
//!
//! - **Handles are numbers here, capabilities elsewhere**: this crate only
//!   names raw handle values. Owning, closing and transferring a handle is
//!   the kernel API's business.
//! - **Tags are typed**: the metadata word that travels next to each handle
//!   in a startup bundle is decoded into [`HandleInfo`] instead of being
//!   shifted and masked at every call site.
//!
//! ## Key Types
//!
//! - [`RawHandle`]: the kernel-issued handle value
//! - [`HandleType`]: coarse kind of a transferred handle
//! - [`HandleInfo`]: kind + argument (usually a destination fd)

pub mod handle_info;

pub use handle_info::{HandleInfo, HandleType, RawHandle, MXIO_MAX_HANDLES};
