//! Bounds-checked cursor over an in-memory byte buffer.
//!
//! Every container decoder reads through this type. All multi-byte reads are
//! little-endian; a failed read reports [`DecodeError::OutOfBounds`] and
//! leaves the offset where it was.

use std::io;

use binrw::BinRead;

use crate::error::{DecodeError, Result};

pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Move the read offset to an absolute position within the buffer.
    /// Seeking to the exact end is allowed; anything past it is not.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.buf.len() {
            return Err(DecodeError::InvalidOffset {
                offset,
                len: self.buf.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Borrow a sub-range of the buffer without touching the offset.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(DecodeError::InvalidOffset {
            offset,
            len: self.buf.len(),
        })?;
        if end > self.buf.len() {
            return Err(DecodeError::InvalidOffset {
                offset,
                len: self.buf.len(),
            });
        }
        Ok(&self.buf[offset..end])
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let bytes = &self.buf[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(DecodeError::OutOfBounds {
                offset: self.pos,
                requested: n,
                available: self.buf.len() - self.pos,
            }),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read `len` raw bytes, advancing the offset.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Read a fixed-width NUL-padded string field.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&bytes[..end]).to_string())
    }

    /// Read the next u32 without advancing the offset.
    pub fn peek_u32(&self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(DecodeError::OutOfBounds {
                offset: self.pos,
                requested: 4,
                available: self.remaining(),
            });
        }
        let b = &self.buf[self.pos..self.pos + 4];
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a fixed-layout binrw record at the current offset.
    pub fn read_record<T>(&mut self) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let mut inner = io::Cursor::new(&self.buf[self.pos..]);
        match T::read_le(&mut inner) {
            Ok(value) => {
                self.pos += inner.position() as usize;
                Ok(value)
            }
            // binrw wraps field-level failures in `Error::Backtrace`, so
            // match the root cause rather than the top-level variant.
            Err(e)
                if matches!(
                    e.root_cause(),
                    binrw::Error::Io(io_e) if io_e.kind() == io::ErrorKind::UnexpectedEof
                ) =>
            {
                Err(DecodeError::OutOfBounds {
                    offset: self.pos + inner.position() as usize,
                    requested: 1,
                    available: 0,
                })
            }
            Err(e) => Err(DecodeError::MalformedContainer {
                offset: self.pos,
                message: e.to_string(),
            }),
        }
    }
}
