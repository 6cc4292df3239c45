//! Remote I/O objects
//!
//! A remote object talks to a peer (typically a filesystem server) over a
//! message pipe using the RIO protocol in [`ipc::rio`]. Every operation is
//! one synchronous transaction: write a request, block for the reply, check
//! that its transaction id matches. There is never more than one request in
//! flight per call.
//!
//! A remote object may also hold an event handle. The peer raises user
//! signals on it to report readiness, which is what [`IoObject::wait`]
//! waits on.

use crate::io::{Events, IoKind, IoObject, MiscOp, TransferUnit, Whence};
use crate::Result;
use core_types::{HandleInfo, HandleType};
use ipc::{RioOp, RioReply, RioRequest, MXIO_CHUNK_SIZE, RIO_MAX_HANDLES};
use kernel_api::{Deadline, Handle, KernelError, Signals};

/// Event signal a peer raises when the node is readable
pub const REMOTE_READABLE: Signals = Signals::USER_0;
/// Event signal a peer raises when the node is writable
pub const REMOTE_WRITABLE: Signals = Signals::USER_1;
/// Event signal a peer raises when it has hung up
pub const REMOTE_PEER_CLOSED: Signals = Signals::USER_2;

#[derive(Debug)]
pub struct RemoteIo {
    channel: Handle,
    event: Option<Handle>,
}

impl RemoteIo {
    pub fn new(channel: Handle, event: Option<Handle>) -> Self {
        Self { channel, event }
    }

    pub fn channel(&self) -> &Handle {
        &self.channel
    }

    pub fn event(&self) -> Option<&Handle> {
        self.event.as_ref()
    }

    /// Runs one request/reply round trip
    ///
    /// Handles carried by the reply are returned owned. A negative status
    /// becomes the matching error; anything malformed is `Io`.
    fn transact(&self, op: RioOp) -> Result<(RioReply, Vec<Handle>)> {
        let kernel = self.channel.kernel();
        let request = RioRequest::new(op);
        let bytes = request.encode().map_err(|_| KernelError::Io)?;
        kernel.message_write(self.channel.raw(), &bytes, Vec::new())?;

        let message = loop {
            self.channel
                .wait_one(Signals::READABLE | Signals::PEER_CLOSED, Deadline::Infinite)?;
            match kernel.message_read(self.channel.raw()) {
                Err(KernelError::ShouldWait) => continue,
                other => break other?,
            }
        };
        let handles: Vec<Handle> = message
            .handles
            .into_iter()
            .map(|raw| Handle::from_raw(kernel.clone(), raw))
            .collect();

        let reply = RioReply::decode(&message.bytes).map_err(|_| KernelError::Io)?;
        if reply.txid != request.txid {
            log::warn!(
                "{} reply for another transaction ({} != {})",
                request.op.name(),
                reply.txid,
                request.txid
            );
            return Err(KernelError::Io);
        }
        if handles.len() > RIO_MAX_HANDLES {
            return Err(KernelError::Io);
        }
        if !reply.is_ok() {
            return Err(KernelError::from_code(reply.status).unwrap_or(KernelError::Io));
        }
        Ok((reply, handles))
    }

    fn to_signals(events: Events) -> Signals {
        let mut signals = Signals::empty();
        if events.contains(Events::READABLE) {
            signals |= REMOTE_READABLE;
        }
        if events.contains(Events::WRITABLE) {
            signals |= REMOTE_WRITABLE;
        }
        if events.contains(Events::PEER_CLOSED) {
            signals |= REMOTE_PEER_CLOSED;
        }
        signals
    }

    fn from_signals(signals: Signals) -> Events {
        let mut events = Events::empty();
        if signals.contains(REMOTE_READABLE) {
            events |= Events::READABLE;
        }
        if signals.contains(REMOTE_WRITABLE) {
            events |= Events::WRITABLE;
        }
        if signals.contains(REMOTE_PEER_CLOSED) {
            events |= Events::PEER_CLOSED;
        }
        events
    }
}

/// Builds a remote object from the handles of an open or clone reply
fn from_reply_handles(handles: Vec<Handle>) -> Result<RemoteIo> {
    let mut handles = handles.into_iter();
    let channel = handles.next().ok_or(KernelError::Io)?;
    Ok(RemoteIo::new(channel, handles.next()))
}

impl IoObject for RemoteIo {
    fn kind(&self) -> IoKind {
        IoKind::Remote
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut count = 0;
        while count < buf.len() {
            let want = (buf.len() - count).min(MXIO_CHUNK_SIZE);
            let (reply, _) = self.transact(RioOp::Read { max: want })?;
            let got = reply.data.len();
            if got > want {
                return Err(KernelError::Io);
            }
            buf[count..count + got].copy_from_slice(&reply.data);
            count += got;
            if got < want {
                break;
            }
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut count = 0;
        for chunk in buf.chunks(MXIO_CHUNK_SIZE) {
            let (reply, _) = self.transact(RioOp::Write {
                data: chunk.to_vec(),
            })?;
            let put = reply.status as usize;
            if put > chunk.len() {
                return Err(KernelError::Io);
            }
            count += put;
            if put < chunk.len() {
                break;
            }
        }
        Ok(count)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let status = self.transact(RioOp::Close).map(|_| ());
        let RemoteIo { channel, event } = *self;
        let closed = channel.close();
        let event_closed = event.map_or(Ok(()), Handle::close);
        status.and(closed).and(event_closed)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let (reply, _) = self.transact(RioOp::Seek {
            offset,
            whence: whence.raw(),
        })?;
        Ok(reply.offset)
    }

    fn ioctl(&mut self, op: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let (reply, _) = self.transact(RioOp::Ioctl {
            op,
            input: input.to_vec(),
            max: output.len(),
        })?;
        if reply.data.len() > output.len() {
            return Err(KernelError::Io);
        }
        output[..reply.data.len()].copy_from_slice(&reply.data);
        Ok(reply.data.len())
    }

    fn wait(&self, events: Events, deadline: Deadline) -> Result<Events> {
        let event = self.event.as_ref().ok_or(KernelError::NotSupported)?;
        let asserted = event.wait_one(Self::to_signals(events), deadline)?;
        Ok(Self::from_signals(asserted))
    }

    fn clone_handles(&self) -> Result<TransferUnit> {
        let (_, handles) = self.transact(RioOp::Clone)?;
        if handles.is_empty() {
            return Err(KernelError::Io);
        }
        let info = HandleInfo::new(HandleType::MxioRemote, 0);
        Ok(handles.into_iter().map(|handle| (handle, info)).collect())
    }

    fn misc(&mut self, op: MiscOp, max: usize) -> Result<Vec<u8>> {
        let op = match op {
            MiscOp::Stat => RioOp::Stat { max },
            MiscOp::Readdir => RioOp::Readdir { max },
        };
        let (reply, _) = self.transact(op)?;
        if reply.data.len() > max {
            return Err(KernelError::Io);
        }
        Ok(reply.data)
    }

    fn open(&mut self, path: &str, flags: u32) -> Result<Box<dyn IoObject>> {
        let (_, handles) = self.transact(RioOp::Open {
            path: path.to_string(),
            flags,
        })?;
        Ok(Box::new(from_reply_handles(handles)?))
    }
}
