//! Node attributes returned by a stat request

/// File type mask and kinds within `mode`
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

/// Attributes of a remote node
///
/// Encoded as `mode: u32, inode: u64, size: u64`, little-endian, packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VnAttr {
    pub mode: u32,
    pub inode: u64,
    pub size: u64,
}

impl VnAttr {
    /// Encoded length in bytes
    pub const SIZE: usize = 4 + 8 + 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.mode.to_le_bytes());
        out[4..12].copy_from_slice(&self.inode.to_le_bytes());
        out[12..20].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    /// Decodes a record; `None` if `bytes` is shorter than [`VnAttr::SIZE`]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            mode: u32::from_le_bytes(bytes[0..4].try_into().ok()?),
            inode: u64::from_le_bytes(bytes[4..12].try_into().ok()?),
            size: u64::from_le_bytes(bytes[12..20].try_into().ok()?),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let attr = VnAttr {
            mode: S_IFREG | 0o644,
            inode: 7,
            size: 4096,
        };
        let bytes = attr.to_bytes();
        assert_eq!(&bytes[0..4], &(S_IFREG | 0o644).to_le_bytes());
        assert_eq!(VnAttr::from_bytes(&bytes), Some(attr));
        assert!(!attr.is_dir());
    }

    #[test]
    fn test_short_record() {
        let bytes = VnAttr::default().to_bytes();
        assert_eq!(VnAttr::from_bytes(&bytes[..VnAttr::SIZE - 1]), None);
    }
}
