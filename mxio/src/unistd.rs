//! The per-process I/O context and its POSIX-style surface
//!
//! [`Mxio`] owns the fd table, the root resolver, the process's own handle
//! and any handles kept back from bootstrap. Every call resolves an fd and
//! makes one call on the object behind it.

use crate::config::{ConfigError, MxioConfig};
use crate::error::BindError;
use crate::fd_table::FdTable;
use crate::io::{Events, IoObject, MiscOp, Whence};
use crate::pipe::pipe_pair;
use crate::Result;
use core_types::HandleInfo;
use ipc::VnAttr;
use kernel_api::{Deadline, Handle, KernelError, KernelRef};

/// A process's I/O context
///
/// Dropping the context is process exit: every bound fd is closed once.
pub struct Mxio {
    pub(crate) kernel: KernelRef,
    pub(crate) config: MxioConfig,
    pub(crate) table: FdTable,
    pub(crate) root: Option<Box<dyn IoObject>>,
    pub(crate) process: Option<Handle>,
    pub(crate) retained: Vec<(Handle, HandleInfo)>,
}

impl Mxio {
    /// Creates an empty context: no root, no fds
    pub fn new(kernel: KernelRef, config: MxioConfig) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table: FdTable::new(config.max_fds),
            kernel,
            config,
            root: None,
            process: None,
            retained: Vec::new(),
        })
    }

    pub fn kernel(&self) -> &KernelRef {
        &self.kernel
    }

    pub fn config(&self) -> &MxioConfig {
        &self.config
    }

    pub fn fd_table(&self) -> &FdTable {
        &self.table
    }

    /// Installs the root resolver; the first install wins
    ///
    /// Returns false, having closed `io`, if a root is already installed.
    pub fn install_root(&mut self, io: Box<dyn IoObject>) -> bool {
        if self.root.is_some() {
            log::warn!("root already installed, closing the new one");
            if let Err(err) = io.close() {
                log::warn!("closing surplus root failed: {}", err);
            }
            return false;
        }
        self.root = Some(io);
        true
    }

    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    /// The process's own handle, if the bundle carried one
    pub fn get_process_handle(&self) -> Option<&Handle> {
        self.process.as_ref()
    }

    /// Return code of this process, looked up through its own handle
    pub fn process_return_code(&self) -> Result<i32> {
        let process = self.process.as_ref().ok_or(KernelError::BadHandle)?;
        self.kernel.process_return_code(process.raw())
    }

    /// Handles bootstrap kept back because their type was unknown
    pub fn take_retained_handles(&mut self) -> Vec<(Handle, HandleInfo)> {
        std::mem::take(&mut self.retained)
    }

    /// Binds `io` at `fd`, or first-fit when `fd` is negative
    pub fn bind(&mut self, io: Box<dyn IoObject>, fd: i32) -> core::result::Result<i32, BindError> {
        self.table.bind(io, fd)
    }

    /// Unbinds `fd` without closing its object
    pub fn release(&mut self, fd: i32) -> Option<Box<dyn IoObject>> {
        self.table.release(fd)
    }

    fn io_mut(&mut self, fd: i32) -> Result<&mut Box<dyn IoObject>> {
        self.table.resolve_mut(fd).ok_or(KernelError::BadHandle)
    }

    fn io(&self, fd: i32) -> Result<&dyn IoObject> {
        self.table.resolve(fd).ok_or(KernelError::BadHandle)
    }

    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        self.io_mut(fd)?.read(buf)
    }

    pub fn write(&mut self, fd: i32, buf: &[u8]) -> Result<usize> {
        self.io_mut(fd)?.write(buf)
    }

    /// Reads into each buffer in turn
    ///
    /// Empty buffers are skipped and a short read ends the call. An error
    /// after some bytes arrived reports those bytes instead.
    pub fn readv(&mut self, fd: i32, bufs: &mut [&mut [u8]]) -> Result<usize> {
        let io = self.io_mut(fd)?;
        let mut count = 0;
        for buf in bufs.iter_mut().filter(|buf| !buf.is_empty()) {
            match io.read(buf) {
                Ok(n) => {
                    count += n;
                    if n != buf.len() {
                        break;
                    }
                }
                Err(err) if count == 0 => return Err(err),
                Err(_) => break,
            }
        }
        Ok(count)
    }

    /// Writes each buffer in turn, with the same rules as [`readv`](Self::readv)
    pub fn writev(&mut self, fd: i32, bufs: &[&[u8]]) -> Result<usize> {
        let io = self.io_mut(fd)?;
        let mut count = 0;
        for buf in bufs.iter().filter(|buf| !buf.is_empty()) {
            match io.write(buf) {
                Ok(n) => {
                    count += n;
                    if n != buf.len() {
                        break;
                    }
                }
                Err(err) if count == 0 => return Err(err),
                Err(_) => break,
            }
        }
        Ok(count)
    }

    /// Closes `fd`; the slot is free afterwards whatever close reports
    pub fn close(&mut self, fd: i32) -> Result<()> {
        self.table.close(fd)
    }

    /// `whence` is `SEEK_SET` (0), `SEEK_CUR` (1) or `SEEK_END` (2)
    pub fn lseek(&mut self, fd: i32, offset: i64, whence: u32) -> Result<u64> {
        let whence = Whence::from_raw(whence)?;
        self.io_mut(fd)?.seek(offset, whence)
    }

    /// Opens `path` through the root and binds it at the lowest free fd
    ///
    /// If no fd is free the new object is closed and `NoResources` returned.
    pub fn open(&mut self, path: &str, flags: u32) -> Result<i32> {
        if path.is_empty() {
            return Err(KernelError::InvalidArgs);
        }
        let root = self.root.as_mut().ok_or(KernelError::BadHandle)?;
        let io = root.open(path, flags)?;
        self.table.bind(io, -1).map_err(|err| {
            log::warn!("open {}: {}", path, err);
            err.close()
        })
    }

    /// Attributes of `path`, through a transient object that is always
    /// closed
    pub fn stat(&mut self, path: &str) -> Result<VnAttr> {
        if path.is_empty() {
            return Err(KernelError::InvalidArgs);
        }
        let root = self.root.as_mut().ok_or(KernelError::BadHandle)?;
        let mut io = root.open(path, 0)?;
        let result = io.misc(MiscOp::Stat, VnAttr::SIZE);
        if let Err(err) = io.close() {
            log::warn!("stat {}: closing transient object failed: {}", path, err);
        }
        VnAttr::from_bytes(&result?).ok_or(KernelError::Io)
    }

    pub fn fstat(&mut self, fd: i32) -> Result<VnAttr> {
        let bytes = self.io_mut(fd)?.misc(MiscOp::Stat, VnAttr::SIZE)?;
        VnAttr::from_bytes(&bytes).ok_or(KernelError::Io)
    }

    /// Creates a connected pipe and binds both ends
    ///
    /// Returns `(read_end, write_end)`; either end can in fact do both. On
    /// failure nothing stays bound.
    pub fn pipe(&mut self) -> Result<(i32, i32)> {
        let (a, b) = pipe_pair(&self.kernel)?;
        let fd0 = match self.table.bind(Box::new(a), -1) {
            Ok(fd) => fd,
            Err(err) => {
                if let Err(close_err) = Box::new(b).close() {
                    log::warn!("pipe: closing unbound end failed: {}", close_err);
                }
                return Err(err.close());
            }
        };
        match self.table.bind(Box::new(b), -1) {
            Ok(fd1) => Ok((fd0, fd1)),
            Err(err) => {
                let status = err.close();
                if let Err(close_err) = self.table.close(fd0) {
                    log::warn!("pipe: closing fd {} on rollback failed: {}", fd0, close_err);
                }
                Err(status)
            }
        }
    }

    pub fn ioctl(&mut self, fd: i32, op: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.io_mut(fd)?.ioctl(op, input, output)
    }

    /// Fills `buf` with packed directory records; zero at end of directory
    pub fn getdirents(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        let bytes = self.io_mut(fd)?.misc(MiscOp::Readdir, buf.len())?;
        let count = bytes.len().min(buf.len());
        buf[..count].copy_from_slice(&bytes[..count]);
        Ok(count)
    }

    /// Blocks until one of `events` holds on `fd`
    pub fn wait_fd(&self, fd: i32, events: Events) -> Result<Events> {
        self.wait_fd_until(fd, events, Deadline::Infinite)
    }

    pub fn wait_fd_until(&self, fd: i32, events: Events, deadline: Deadline) -> Result<Events> {
        self.io(fd)?.wait(events, deadline)
    }

    /// Closes every fd; also run on drop
    pub fn teardown(&mut self) {
        self.table.teardown();
    }
}

impl Drop for Mxio {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::NullIo;
    use crate::IoKind;
    use kernel_api::KernelApi;
    use sim_kernel::SimulatedKernel;
    use std::sync::Arc;

    fn context() -> (Arc<SimulatedKernel>, Mxio) {
        let sim = SimulatedKernel::shared();
        let mxio = Mxio::new(sim.clone(), MxioConfig::default()).unwrap();
        (sim, mxio)
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let sim = SimulatedKernel::shared();
        let config = MxioConfig {
            max_fds: 0,
            stdio_fallback: false,
            ..MxioConfig::default()
        };
        assert!(Mxio::new(sim, config).is_err());
    }

    #[test]
    fn test_unbound_fd_is_bad_handle() {
        let (_sim, mut mxio) = context();
        let mut buf = [0u8; 4];
        assert_eq!(mxio.read(9, &mut buf), Err(KernelError::BadHandle));
        assert_eq!(mxio.write(-1, b"x"), Err(KernelError::BadHandle));
        assert_eq!(mxio.close(9), Err(KernelError::BadHandle));
        assert_eq!(mxio.fstat(9), Err(KernelError::BadHandle));
    }

    #[test]
    fn test_open_without_root() {
        let (_sim, mut mxio) = context();
        assert_eq!(mxio.open("/etc/motd", 0), Err(KernelError::BadHandle));
        assert_eq!(mxio.stat("/etc/motd"), Err(KernelError::BadHandle));
        assert_eq!(mxio.open("", 0), Err(KernelError::InvalidArgs));
    }

    #[test]
    fn test_second_root_is_closed() {
        let (_sim, mut mxio) = context();
        assert!(mxio.install_root(Box::new(NullIo::new())));
        assert!(!mxio.install_root(Box::new(NullIo::new())));
        assert!(mxio.has_root());
    }

    #[test]
    fn test_lseek_rejects_bad_whence() {
        let (_sim, mut mxio) = context();
        let fd = mxio.bind(Box::new(NullIo::new()), -1).unwrap();
        assert_eq!(mxio.lseek(fd, 0, 7), Err(KernelError::InvalidArgs));
        assert_eq!(mxio.lseek(fd, 0, 0), Err(KernelError::NotSupported));
    }

    #[test]
    fn test_pipe_binds_lowest_fds() {
        let (_sim, mut mxio) = context();
        let (r, w) = mxio.pipe().unwrap();
        assert_eq!((r, w), (0, 1));
        assert_eq!(mxio.fd_table().resolve(r).map(|io| io.kind()), Some(IoKind::Pipe));
    }

    #[test]
    fn test_pipe_rolls_back_when_second_bind_fails() {
        let sim = SimulatedKernel::shared();
        let config = MxioConfig {
            max_fds: 4,
            ..MxioConfig::default()
        };
        let mut mxio = Mxio::new(sim.clone(), config).unwrap();
        for fd in 0..3 {
            mxio.bind(Box::new(NullIo::new()), fd).unwrap();
        }
        let live = sim.live_handle_count();

        assert_eq!(mxio.pipe(), Err(KernelError::NoResources));
        assert!(mxio.fd_table().resolve(3).is_none());
        assert_eq!(sim.live_handle_count(), live);
    }

    #[test]
    fn test_readv_writev() {
        let (_sim, mut mxio) = context();
        let (r, w) = mxio.pipe().unwrap();

        let written = mxio.writev(w, &[b"ab", b"", b"cde"]).unwrap();
        assert_eq!(written, 5);

        let mut first = [0u8; 2];
        let mut empty = [0u8; 0];
        let mut second = [0u8; 8];
        let read = mxio
            .readv(r, &mut [&mut first[..], &mut empty[..], &mut second[..]])
            .unwrap();
        assert_eq!(read, 5);
        assert_eq!(&first, b"ab");
        assert_eq!(&second[..3], b"cde");
    }

    #[test]
    fn test_writev_error_before_any_bytes() {
        let (_sim, mut mxio) = context();
        let (r, w) = mxio.pipe().unwrap();
        mxio.close(r).unwrap();
        assert_eq!(
            mxio.writev(w, &[b"x"]),
            Err(KernelError::PeerClosed)
        );
    }

    /// Transfers in full once, then fails every later call
    #[derive(Debug, Default)]
    struct OneShot {
        calls: usize,
    }

    impl OneShot {
        fn next(&mut self, len: usize) -> Result<usize> {
            self.calls += 1;
            if self.calls == 1 {
                Ok(len)
            } else {
                Err(KernelError::Io)
            }
        }
    }

    impl IoObject for OneShot {
        fn kind(&self) -> IoKind {
            IoKind::Null
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.next(buf.len())
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            self.next(buf.len())
        }

        fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writev_reports_partial_progress() {
        let (_sim, mut mxio) = context();
        let fd = mxio.bind(Box::new(OneShot::default()), -1).unwrap();
        assert_eq!(mxio.writev(fd, &[b"abc", b"", b"defg"]), Ok(3));
        assert_eq!(mxio.writev(fd, &[b"h"]), Err(KernelError::Io));
    }

    #[test]
    fn test_readv_reports_partial_progress() {
        let (_sim, mut mxio) = context();
        let fd = mxio.bind(Box::new(OneShot::default()), -1).unwrap();
        let mut first = [0u8; 4];
        let mut second = [0u8; 4];
        assert_eq!(
            mxio.readv(fd, &mut [&mut first[..], &mut second[..]]),
            Ok(4)
        );
    }

    #[test]
    fn test_wait_fd_on_pipe() {
        let (_sim, mut mxio) = context();
        let (r, w) = mxio.pipe().unwrap();
        mxio.write(w, b"!").unwrap();
        assert_eq!(mxio.wait_fd(r, Events::READABLE), Ok(Events::READABLE));
    }

    #[test]
    fn test_wait_fd_deadline() {
        let (sim, mut mxio) = context();
        let (r, _w) = mxio.pipe().unwrap();
        let deadline = Deadline::after(sim.now(), kernel_api::Duration::from_millis(2));
        assert_eq!(
            mxio.wait_fd_until(r, Events::READABLE, deadline),
            Err(KernelError::TimedOut)
        );
    }

    #[test]
    fn test_drop_closes_every_fd() {
        let (sim, mut mxio) = context();
        mxio.pipe().unwrap();
        mxio.pipe().unwrap();
        assert_eq!(sim.live_handle_count(), 4);
        drop(mxio);
        assert_eq!(sim.live_handle_count(), 0);
    }

    #[test]
    fn test_process_return_code_without_handle() {
        let (_sim, mxio) = context();
        assert!(mxio.get_process_handle().is_none());
        assert_eq!(mxio.process_return_code(), Err(KernelError::BadHandle));
    }
}
