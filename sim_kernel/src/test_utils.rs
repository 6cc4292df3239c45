//! Test utilities
//!
//! Helpers shared by the simulated kernel's own tests and by the I/O layer's
//! integration tests: building kernels with fault plans, owning pipe ends,
//! spawning peer threads and waiting on process exit.

use crate::fault_injection::FaultPlan;
use crate::SimulatedKernel;
use kernel_api::{Deadline, Duration, Handle, KernelApi, KernelError, KernelRef, Signals};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Runs a test with a fault plan applied
///
/// # Example
///
/// ```
/// use sim_kernel::test_utils::with_fault_plan;
/// use sim_kernel::fault_injection::{FaultPlan, HandleFault};
/// use kernel_api::KernelApi;
///
/// with_fault_plan(
///     FaultPlan::new().with_handle_fault(HandleFault::FailDuplicate { count: 1 }),
///     |kernel| {
///         let event = kernel.event_create().unwrap();
///         assert!(kernel.handle_duplicate(event).is_err());
///     },
/// );
/// ```
pub fn with_fault_plan<F>(plan: FaultPlan, f: F)
where
    F: FnOnce(Arc<SimulatedKernel>),
{
    let kernel = Arc::new(SimulatedKernel::new().with_fault_plan(plan));
    f(kernel);
}

/// Upcasts a simulated kernel to the trait object the I/O layer holds
pub fn kernel_ref(kernel: &Arc<SimulatedKernel>) -> KernelRef {
    kernel.clone()
}

/// Advances the virtual clock by `duration` in 1ms steps
pub fn run_for_duration(kernel: &SimulatedKernel, duration: Duration) {
    let target_time = kernel.now() + duration;
    const TIME_STEP: Duration = Duration::from_millis(1);

    while kernel.now() < target_time {
        kernel.advance_time(TIME_STEP);
    }
}

/// Spawns a named peer thread
pub fn thread_create<F, T>(name: &str, f: F) -> std::io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new().name(name.to_string()).spawn(f)
}

/// Creates a message pipe with both ends owned
pub fn message_pipe_create(kernel: &KernelRef) -> Result<(Handle, Handle), KernelError> {
    let (a, b) = kernel.message_pipe_create()?;
    Ok((
        Handle::from_raw(kernel.clone(), a),
        Handle::from_raw(kernel.clone(), b),
    ))
}

/// Writes a message carrying `handles`, which are given up either way
pub fn message_write(channel: &Handle, bytes: &[u8], handles: Vec<Handle>) -> Result<(), KernelError> {
    let raws = handles.into_iter().map(Handle::into_raw).collect();
    channel.kernel().message_write(channel.raw(), bytes, raws)
}

/// Waits for a message and takes it, owning any handles it carried
pub fn message_read(channel: &Handle) -> Result<(Vec<u8>, Vec<Handle>), KernelError> {
    channel.wait_one(Signals::READABLE | Signals::PEER_CLOSED, Deadline::Infinite)?;
    let message = channel.kernel().message_read(channel.raw())?;
    let handles = message
        .handles
        .into_iter()
        .map(|raw| Handle::from_raw(channel.kernel().clone(), raw))
        .collect();
    Ok((message.bytes, handles))
}

/// Waits up to `timeout` of virtual time for `READABLE`
pub fn wait_readable(handle: &Handle, timeout: Duration) -> Result<Signals, KernelError> {
    let deadline = Deadline::after(handle.kernel().now(), timeout);
    handle.wait_one(Signals::READABLE, deadline)
}

/// Waits up to `timeout` of virtual time for `SIGNALED`
pub fn wait_signalled(handle: &Handle, timeout: Duration) -> Result<Signals, KernelError> {
    let deadline = Deadline::after(handle.kernel().now(), timeout);
    handle.wait_one(Signals::SIGNALED, deadline)
}

/// Blocks until the process exits and returns its code
pub fn process_wait_exit(process: &Handle) -> Result<i32, KernelError> {
    process.wait_one(Signals::SIGNALED, Deadline::Infinite)?;
    process.kernel().process_return_code(process.raw())
}
