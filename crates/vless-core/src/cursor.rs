//! Bounds-checked forward reader over a byte buffer.
//!
//! Every read names the field it is reading so a short buffer produces a
//! [`VlessError::Truncated`] that says exactly where the header ran out.

use crate::error::{VlessError, VlessResult};

/// A cursor that advances through a borrowed buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take the next `len` bytes, failing if fewer are left.
    pub fn take(&mut self, len: usize, field: &'static str) -> VlessResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(VlessError::Truncated {
                field,
                needed: len,
                available: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    pub fn skip(&mut self, len: usize, field: &'static str) -> VlessResult<()> {
        self.take(len, field).map(|_| ())
    }

    pub fn read_u8(&mut self, field: &'static str) -> VlessResult<u8> {
        Ok(self.take(1, field)?[0])
    }

    /// Read a big-endian `u16`.
    pub fn read_u16_be(&mut self, field: &'static str) -> VlessResult<u16> {
        let bytes = self.read_array::<2>(field)?;
        Ok(u16::from_be_bytes(bytes))
    }

    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> VlessResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_position() {
        let data = [0x01, 0x00, 0x50, 0xaa, 0xbb];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.read_u8("a").unwrap(), 0x01);
        assert_eq!(cur.read_u16_be("b").unwrap(), 80);
        assert_eq!(cur.position(), 3);
        assert_eq!(cur.remaining(), 2);
        assert_eq!(cur.take(2, "c").unwrap(), &[0xaa, 0xbb]);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn short_read_reports_field() {
        let data = [0x01];
        let mut cur = ByteCursor::new(&data);
        match cur.read_u16_be("port") {
            Err(VlessError::Truncated {
                field,
                needed,
                available,
            }) => {
                assert_eq!(field, "port");
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        // A failed read leaves the cursor where it was.
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn skip_zero_is_ok_at_end() {
        let mut cur = ByteCursor::new(&[]);
        assert!(cur.skip(0, "options").is_ok());
        assert!(cur.read_u8("version").is_err());
    }
}
