//! Directory records returned by a readdir request
//!
//! Each record is `size: u32, type: u32, name bytes, NUL`, padded to a
//! multiple of four. `size` is the padded record length.

pub const DIRENT_TYPE_FILE: u32 = 8;
pub const DIRENT_TYPE_DIR: u32 = 4;

const HEADER: usize = 8;

fn record_len(name: &str) -> usize {
    (HEADER + name.len() + 1 + 3) & !3
}

/// One decoded directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub name: String,
    pub kind: u32,
}

impl Dirent {
    /// Decodes every complete record in `bytes`
    ///
    /// Stops at the first truncated or malformed record.
    pub fn parse_all(bytes: &[u8]) -> Vec<Dirent> {
        let mut out = Vec::new();
        let mut rest = bytes;
        while rest.len() >= HEADER {
            let size = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            let kind = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
            if size < HEADER + 1 || size > rest.len() {
                break;
            }
            let name_bytes = &rest[HEADER..size];
            let end = name_bytes.iter().position(|b| *b == 0).unwrap_or(name_bytes.len());
            let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
            out.push(Dirent { name, kind });
            rest = &rest[size..];
        }
        out
    }
}

/// Packs directory records into a bounded buffer
#[derive(Debug)]
pub struct DirentWriter {
    buf: Vec<u8>,
    max: usize,
}

impl DirentWriter {
    pub fn new(max: usize) -> Self {
        Self {
            buf: Vec::new(),
            max,
        }
    }

    /// Appends a record; returns false (and appends nothing) if it would
    /// not fit
    pub fn push(&mut self, name: &str, kind: u32) -> bool {
        let len = record_len(name);
        if self.buf.len() + len > self.max {
            return false;
        }
        self.buf.extend_from_slice(&(len as u32).to_le_bytes());
        self.buf.extend_from_slice(&kind.to_le_bytes());
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.resize(self.buf.len() + len - HEADER - name.len(), 0);
        true
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_padded() {
        let mut writer = DirentWriter::new(256);
        assert!(writer.push("a", DIRENT_TYPE_FILE));
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_writer_respects_limit() {
        let mut writer = DirentWriter::new(16);
        assert!(writer.push("abc", DIRENT_TYPE_FILE));
        assert!(!writer.push("defgh", DIRENT_TYPE_DIR));
        let entries = Dirent::parse_all(&writer.into_bytes());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "abc");
    }

    #[test]
    fn test_parse_stops_at_truncation() {
        let mut writer = DirentWriter::new(256);
        writer.push("bin", DIRENT_TYPE_DIR);
        writer.push("readme", DIRENT_TYPE_FILE);
        let bytes = writer.into_bytes();
        let entries = Dirent::parse_all(&bytes[..bytes.len() - 1]);
        assert_eq!(
            entries,
            vec![Dirent {
                name: "bin".to_string(),
                kind: DIRENT_TYPE_DIR
            }]
        );
    }
}
