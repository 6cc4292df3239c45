//! # Remote I/O wire protocol
//!
//! This crate defines the request/reply protocol spoken between a remote
//! I/O object and the peer that serves it (a filesystem node, a device).
//!
//! ## Philosophy
//!
//! - **One request, one reply**: a client writes one [`RioRequest`] on its
//!   channel and blocks until the [`RioReply`] carrying the same
//!   transaction id comes back. There is no pipelining.
//! - **Handles travel beside bytes**: `open` and `clone` replies carry
//!   fresh kernel handles in the message's handle list, never in the
//!   payload.
//! - **Fixed layouts where callers copy bytes**: node attributes
//!   ([`VnAttr`]) and directory records ([`dirent`]) have explicit
//!   little-endian layouts so a short reply is detectable.

pub mod dirent;
pub mod message;
pub mod rio;
pub mod vnattr;

pub use dirent::{Dirent, DirentWriter, DIRENT_TYPE_DIR, DIRENT_TYPE_FILE};
pub use message::{MessageId, WireError};
pub use rio::{RioOp, RioReply, RioRequest, MXIO_CHUNK_SIZE, RIO_MAX_HANDLES};
pub use vnattr::{VnAttr, S_IFDIR, S_IFMT, S_IFREG};
