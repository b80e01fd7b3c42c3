//! Byte sources and sinks the codec runs against.
//!
//! The serial link decodes straight off the UART and encodes straight onto
//! it, while the mesh works on whole datagrams in memory. Both sides of
//! the codec only need one byte (or one slice) at a time.

use heapless::Vec;

/// Errors that can occur while encoding a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Message does not fit the send buffer
    Overflow,
    /// Underlying device rejected the write
    Io,
}

/// Input to the decoder
pub trait ByteSource {
    /// Next byte of input, `None` once the input is exhausted
    fn next_byte(&mut self) -> Option<u8>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn next_byte(&mut self) -> Option<u8> {
        (**self).next_byte()
    }
}

/// Output of the encoder
pub trait Sink {
    fn write(&mut self, data: &[u8]) -> Result<(), EncodeError>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        (**self).write(data)
    }
}

/// Read cursor over one in-memory datagram
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Unread bytes
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Take the next `len` bytes, or `None` if fewer are left
    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl ByteSource for SliceSource<'_> {
    fn next_byte(&mut self) -> Option<u8> {
        self.read_u8()
    }
}

/// Fixed-capacity outbound message buffer
///
/// A write that does not fit is dropped whole and the buffer remembers
/// the overflow until it is cleared, so a truncated message is never sent.
#[derive(Debug, Clone, Default)]
pub struct SendBuffer<const N: usize> {
    buf: Vec<u8, N>,
    overflowed: bool,
}

impl<const N: usize> SendBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}

impl<const N: usize> Sink for SendBuffer<N> {
    fn write(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if self.buf.len() + data.len() > N {
            self.overflowed = true;
            return Err(EncodeError::Overflow);
        }
        // Capacity checked above
        let _ = self.buf.extend_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_reads_little_endian() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA];
        let mut src = SliceSource::new(&data);
        assert_eq!(src.read_u16(), Some(0x1234));
        assert_eq!(src.read_u32(), Some(0x1234_5678));
        assert_eq!(src.position(), 6);
        assert_eq!(src.remaining(), &[0xAA]);
        assert_eq!(src.read_u16(), None);
        assert_eq!(src.next_byte(), Some(0xAA));
        assert_eq!(src.next_byte(), None);
    }

    #[test]
    fn test_send_buffer_drops_whole_write_on_overflow() {
        let mut buf = SendBuffer::<4>::new();
        buf.write(&[1, 2, 3]).unwrap();
        assert_eq!(buf.write(&[4, 5]), Err(EncodeError::Overflow));
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        assert!(buf.overflowed());

        // A later write that fits still lands, but the overflow sticks
        buf.write(&[4]).unwrap();
        assert_eq!(buf.len(), 4);
        assert!(buf.overflowed());

        buf.clear();
        assert!(buf.is_empty());
        assert!(!buf.overflowed());
    }
}
