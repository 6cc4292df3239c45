//! RIO requests and replies

use crate::message::{decode, encode, MessageId, WireError};
use serde::{Deserialize, Serialize};

/// Largest data chunk moved by a single read or write transaction
pub const MXIO_CHUNK_SIZE: usize = 8192;

/// Largest number of handles a reply may carry
pub const RIO_MAX_HANDLES: usize = 2;

/// Operation requested of a remote peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RioOp {
    /// Release the peer's side of the connection
    Close,
    /// Produce new handles to the same node; they ride on the reply
    Clone,
    /// Resolve `path` relative to this node; the new node's handles ride on
    /// the reply
    Open { path: String, flags: u32 },
    Read { max: usize },
    Write { data: Vec<u8> },
    Seek { offset: i64, whence: u32 },
    /// Node attributes as a [`VnAttr`](crate::VnAttr) record
    Stat { max: usize },
    /// Packed directory records, see [`dirent`](crate::dirent)
    Readdir { max: usize },
    Ioctl { op: u32, input: Vec<u8>, max: usize },
}

impl RioOp {
    pub fn name(&self) -> &'static str {
        match self {
            RioOp::Close => "close",
            RioOp::Clone => "clone",
            RioOp::Open { .. } => "open",
            RioOp::Read { .. } => "read",
            RioOp::Write { .. } => "write",
            RioOp::Seek { .. } => "seek",
            RioOp::Stat { .. } => "stat",
            RioOp::Readdir { .. } => "readdir",
            RioOp::Ioctl { .. } => "ioctl",
        }
    }
}

/// A request as written on the client's channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RioRequest {
    pub txid: MessageId,
    pub op: RioOp,
}

impl RioRequest {
    /// Creates a request with a fresh transaction id
    pub fn new(op: RioOp) -> Self {
        Self {
            txid: MessageId::new(),
            op,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        decode(bytes)
    }
}

/// A reply as written by the peer
///
/// `status` is non-negative on success (its meaning depends on the op:
/// bytes transferred, handle count, ioctl result) and a negative status
/// code on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RioReply {
    pub txid: MessageId,
    pub status: i32,
    pub data: Vec<u8>,
    /// Seek position after the operation
    pub offset: u64,
}

impl RioReply {
    /// Successful reply correlated to `request`
    pub fn ok(request: &RioRequest, status: i32) -> Self {
        Self {
            txid: request.txid,
            status,
            data: Vec::new(),
            offset: 0,
        }
    }

    /// Failed reply correlated to `request`
    pub fn error(request: &RioRequest, code: i32) -> Self {
        debug_assert!(code < 0);
        Self::ok(request, code)
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status >= 0
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_roundtrip() {
        let request = RioRequest::new(RioOp::Open {
            path: "/data/log.txt".to_string(),
            flags: 0,
        });
        let decoded = RioRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.op.name(), "open");
    }

    #[test]
    fn test_reply_is_correlated() {
        let request = RioRequest::new(RioOp::Read { max: 16 });
        let reply = RioReply::ok(&request, 3)
            .with_data(b"abc".to_vec())
            .with_offset(3);
        assert_eq!(reply.txid, request.txid);
        assert!(reply.is_ok());

        let decoded = RioReply::decode(&reply.encode().unwrap()).unwrap();
        assert_eq!(decoded.data, b"abc");
        assert_eq!(decoded.offset, 3);
    }

    #[test]
    fn test_error_reply() {
        let request = RioRequest::new(RioOp::Stat { max: 64 });
        let reply = RioReply::error(&request, -2);
        assert!(!reply.is_ok());
        assert!(reply.data.is_empty());
    }

    #[test]
    fn test_truncated_reply_is_rejected() {
        let request = RioRequest::new(RioOp::Close);
        let bytes = RioReply::ok(&request, 0).encode().unwrap();
        assert!(RioReply::decode(&bytes[..bytes.len() / 2]).is_err());
    }
}
