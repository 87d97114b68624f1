//! reader.rs
//!
//! A small bounds-checked cursor over an in-memory byte buffer.
//!
//! Everything in a Standard MIDI File is big-endian, and timing deltas plus
//! meta/sysex lengths use MIDI's variable-length quantity: 7 bits per byte,
//! most significant group first, high bit set on every byte except the last.
//! A quantity never spans more than 4 bytes (max value 0x0FFF_FFFF).
//!
//! Every read either consumes exactly the bytes it decodes or fails and leaves
//! the position where it was.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{MidiError, Result};

/// Longest legal variable-length quantity, in bytes.
const MAX_VAR_LEN_BYTES: usize = 4;

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { inner: Cursor::new(buf) }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    /// Total buffer length.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Look at the next byte without consuming it.
    pub fn peek(&self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.inner.get_ref()[self.position()])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.inner.read_u8().map_err(|_| self.truncated(1))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.inner.read_u16::<BigEndian>().map_err(|_| self.truncated(2))
    }

    /// Three-byte big-endian integer, as used by the tempo meta event.
    pub fn read_u24(&mut self) -> Result<u32> {
        self.ensure(3)?;
        self.inner.read_u24::<BigEndian>().map_err(|_| self.truncated(3))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        self.inner.read_u32::<BigEndian>().map_err(|_| self.truncated(4))
    }

    /// Decode a MIDI variable-length quantity.
    pub fn read_var_len(&mut self) -> Result<u32> {
        let start = self.position();
        let mut value: u32 = 0;
        for _ in 0..MAX_VAR_LEN_BYTES {
            let byte = match self.read_u8() {
                Ok(b) => b,
                Err(e) => {
                    self.inner.set_position(start as u64);
                    return Err(e);
                }
            };
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        self.inner.set_position(start as u64);
        Err(MidiError::MalformedVarLength { offset: start })
    }

    /// Borrow the next `n` bytes straight out of the underlying buffer.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let start = self.position();
        let buf: &'a [u8] = *self.inner.get_ref();
        self.inner.set_position((start + n) as u64);
        Ok(&buf[start..start + n])
    }

    /// Four-byte chunk identifier such as `MThd` or `MTrk`.
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read_bytes(4)?;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(bytes);
        Ok(tag)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(self.truncated(needed));
        }
        Ok(())
    }

    fn truncated(&self, needed: usize) -> MidiError {
        MidiError::TruncatedInput {
            offset: self.position(),
            needed,
            available: self.remaining(),
        }
    }
}
