//! Pipe endpoints
//!
//! A pipe fd wraps one end of a kernel byte stream. Reads and writes go
//! straight to the stream: no buffering, no framing. A read on an empty
//! stream blocks until bytes arrive or the other end goes away, in which
//! case it reports EOF.

use crate::io::{Events, IoKind, IoObject, TransferUnit};
use crate::Result;
use core_types::{HandleInfo, HandleType};
use kernel_api::{Deadline, Handle, KernelError, KernelRef, Signals};

#[derive(Debug)]
pub struct PipeIo {
    handle: Handle,
}

impl PipeIo {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Creates two connected pipe endpoints
pub fn pipe_pair(kernel: &KernelRef) -> Result<(PipeIo, PipeIo)> {
    let (a, b) = kernel.stream_create()?;
    Ok((
        PipeIo::new(Handle::from_raw(kernel.clone(), a)),
        PipeIo::new(Handle::from_raw(kernel.clone(), b)),
    ))
}

fn to_signals(events: Events) -> Signals {
    let mut signals = Signals::empty();
    if events.contains(Events::READABLE) {
        signals |= Signals::READABLE;
    }
    if events.contains(Events::WRITABLE) {
        signals |= Signals::WRITABLE;
    }
    if events.contains(Events::PEER_CLOSED) {
        signals |= Signals::PEER_CLOSED;
    }
    signals
}

fn from_signals(signals: Signals) -> Events {
    let mut events = Events::empty();
    if signals.contains(Signals::READABLE) {
        events |= Events::READABLE;
    }
    if signals.contains(Signals::WRITABLE) {
        events |= Events::WRITABLE;
    }
    if signals.contains(Signals::PEER_CLOSED) {
        events |= Events::PEER_CLOSED;
    }
    events
}

impl IoObject for PipeIo {
    fn kind(&self) -> IoKind {
        IoKind::Pipe
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let kernel = self.handle.kernel();
        loop {
            match kernel.stream_read(self.handle.raw(), buf) {
                Err(KernelError::ShouldWait) => {
                    self.handle
                        .wait_one(Signals::READABLE | Signals::PEER_CLOSED, Deadline::Infinite)?;
                }
                other => return other,
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.handle.kernel().stream_write(self.handle.raw(), buf)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.handle.close()
    }

    fn wait(&self, events: Events, deadline: Deadline) -> Result<Events> {
        let asserted = self.handle.wait_one(to_signals(events), deadline)?;
        Ok(from_signals(asserted))
    }

    fn clone_handles(&self) -> Result<TransferUnit> {
        let dup = self.handle.duplicate()?;
        Ok(vec![(dup, HandleInfo::new(HandleType::MxioPipe, 0))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_kernel::SimulatedKernel;

    fn kernel() -> (std::sync::Arc<SimulatedKernel>, KernelRef) {
        let sim = SimulatedKernel::shared();
        let kernel: KernelRef = sim.clone();
        (sim, kernel)
    }

    #[test]
    fn test_pipe_pair_roundtrip() {
        let (_sim, kernel) = kernel();
        let (mut a, mut b) = pipe_pair(&kernel).unwrap();

        assert_eq!(a.write(b"ping"), Ok(4));
        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf), Ok(4));
        assert_eq!(&buf[..4], b"ping");
    }

    #[test]
    fn test_read_after_peer_close_is_eof() {
        let (_sim, kernel) = kernel();
        let (a, mut b) = pipe_pair(&kernel).unwrap();
        Box::new(a).close().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf), Ok(0));
        assert_eq!(b.write(b"x"), Err(KernelError::PeerClosed));
    }

    #[test]
    fn test_read_blocks_until_data() {
        let (_sim, kernel) = kernel();
        let (mut a, mut b) = pipe_pair(&kernel).unwrap();

        let reader = std::thread::spawn(move || {
            let mut buf = [0u8; 3];
            let n = b.read(&mut buf).unwrap();
            buf[..n].to_vec()
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        a.write(b"abc").unwrap();
        assert_eq!(reader.join().unwrap(), b"abc");
    }

    #[test]
    fn test_wait_maps_events() {
        let (_sim, kernel) = kernel();
        let (mut a, b) = pipe_pair(&kernel).unwrap();

        assert_eq!(
            b.wait(Events::WRITABLE, Deadline::Infinite),
            Ok(Events::WRITABLE)
        );
        a.write(b"x").unwrap();
        assert_eq!(
            b.wait(Events::READABLE, Deadline::Infinite),
            Ok(Events::READABLE)
        );
    }

    #[test]
    fn test_clone_shares_stream() {
        let (sim, kernel) = kernel();
        let (a, mut b) = pipe_pair(&kernel).unwrap();

        let mut unit = a.clone_handles().unwrap();
        assert_eq!(unit.len(), 1);
        let (dup, info) = unit.remove(0);
        assert_eq!(info.handle_type(), HandleType::MxioPipe);
        assert!(sim.same_object(dup.raw(), a.handle().raw()));

        let mut cloned = PipeIo::new(dup);
        cloned.write(b"via clone").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(b.read(&mut buf), Ok(9));
    }
}
