//! The null object: reads hit EOF, writes vanish

use crate::io::{IoKind, IoObject};
use crate::Result;

/// Inert standard stream stand-in
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIo;

impl NullIo {
    pub fn new() -> Self {
        NullIo
    }
}

impl IoObject for NullIo {
    fn kind(&self) -> IoKind {
        IoKind::Null
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Events;
    use kernel_api::{Deadline, KernelError};

    #[test]
    fn test_null_read_is_eof() {
        let mut null = NullIo::new();
        let mut buf = [7u8; 16];
        assert_eq!(null.read(&mut buf), Ok(0));
        assert_eq!(buf, [7u8; 16]);
    }

    #[test]
    fn test_null_write_discards() {
        let mut null = NullIo::new();
        assert_eq!(null.write(b"into the void"), Ok(13));
    }

    #[test]
    fn test_null_refuses_the_rest() {
        let mut null = NullIo::new();
        assert_eq!(
            null.seek(0, crate::Whence::Set),
            Err(KernelError::NotSupported)
        );
        assert_eq!(
            null.wait(Events::READABLE, Deadline::Infinite),
            Err(KernelError::NotSupported)
        );
        assert!(matches!(null.clone_handles(), Err(KernelError::NotSupported)));
        assert!(Box::new(null).close().is_ok());
    }
}
