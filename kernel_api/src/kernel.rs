//! Kernel API trait

use crate::{Deadline, Instant, KernelError, Signals};
use core_types::{HandleInfo, RawHandle};
use std::sync::Arc;

/// Shared reference to the kernel
///
/// Every owned [`Handle`](crate::Handle) keeps one of these so that it can
/// close itself.
pub type KernelRef = Arc<dyn KernelApi>;

/// One message taken off a message pipe
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageRead {
    pub bytes: Vec<u8>,
    /// Handles carried by the message, now owned by the reader
    pub handles: Vec<RawHandle>,
}

/// One entry of a process-creation bundle
pub type BundleEntry = (RawHandle, HandleInfo);

/// The kernel API trait
///
/// This is the full set of kernel primitives the I/O layer needs. Multiple
/// implementations are possible:
/// - Simulated kernel (for testing)
/// - Real kernel (syscalls)
///
/// All methods take `&self`: the kernel serializes access to its own
/// object table. Methods that move handles (`message_write`,
/// `process_start`) take ownership of the raw values passed in; on error
/// the handles are closed by the kernel, never returned.
///
/// # Example
///
/// ```ignore
/// use kernel_api::{Deadline, KernelApi, Signals};
///
/// fn ping<K: KernelApi>(kernel: &K) -> Result<Vec<u8>, kernel_api::KernelError> {
///     let (a, b) = kernel.message_pipe_create()?;
///     kernel.message_write(a, b"ping", Vec::new())?;
///     kernel.handle_wait_one(b, Signals::READABLE, Deadline::Infinite)?;
///     Ok(kernel.message_read(b)?.bytes)
/// }
/// ```
pub trait KernelApi: Send + Sync {
    /// Closes a handle. A second close of the same value fails `BadHandle`.
    fn handle_close(&self, handle: RawHandle) -> Result<(), KernelError>;

    /// Creates a new handle to the same kernel object
    fn handle_duplicate(&self, handle: RawHandle) -> Result<RawHandle, KernelError>;

    /// Blocks until any of `signals` is asserted on the object or the
    /// deadline passes
    ///
    /// Returns the asserted subset on success. Fails `TimedOut` at the
    /// deadline and `BadHandle` if the handle is (or becomes) invalid.
    fn handle_wait_one(
        &self,
        handle: RawHandle,
        signals: Signals,
        deadline: Deadline,
    ) -> Result<Signals, KernelError>;

    /// Creates a connected pair of message pipe ends
    fn message_pipe_create(&self) -> Result<(RawHandle, RawHandle), KernelError>;

    /// Queues one message on the peer of `handle`, transferring `handles`
    fn message_write(
        &self,
        handle: RawHandle,
        bytes: &[u8],
        handles: Vec<RawHandle>,
    ) -> Result<(), KernelError>;

    /// Takes the next message. Fails `ShouldWait` if none is queued and
    /// `PeerClosed` if none is queued and the peer is gone.
    fn message_read(&self, handle: RawHandle) -> Result<MessageRead, KernelError>;

    /// Creates a connected pair of byte stream ends
    fn stream_create(&self) -> Result<(RawHandle, RawHandle), KernelError>;

    /// Appends bytes to the peer's stream. Fails `PeerClosed` if the peer is
    /// gone.
    fn stream_write(&self, handle: RawHandle, bytes: &[u8]) -> Result<usize, KernelError>;

    /// Reads up to `buf.len()` bytes. Fails `ShouldWait` when empty with a
    /// live peer; returns `Ok(0)` when empty and the peer is gone.
    fn stream_read(&self, handle: RawHandle, buf: &mut [u8]) -> Result<usize, KernelError>;

    /// Creates an event object
    fn event_create(&self) -> Result<RawHandle, KernelError>;

    /// Clears then sets user signal bits on an event object
    fn object_signal(
        &self,
        handle: RawHandle,
        clear: Signals,
        set: Signals,
    ) -> Result<(), KernelError>;

    /// Current time on the kernel's monotonic clock
    fn now(&self) -> Instant;

    /// Creates and starts a process, transferring the bundle to it
    ///
    /// Returns a handle to the new process.
    fn process_start(
        &self,
        name: &str,
        args: &[String],
        bundle: Vec<BundleEntry>,
    ) -> Result<RawHandle, KernelError>;

    /// Return code of an exited process. Fails `ShouldWait` while running.
    fn process_return_code(&self, process: RawHandle) -> Result<i32, KernelError>;
}
