use std::io::{self, ErrorKind};

use serde::Serialize;

/// Byte order of the multi-byte fields in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Read a `u16` at `off`. Callers guarantee `dat` is long enough; record payloads
    /// are always read to their full fixed size before fields are extracted.
    #[must_use]
    pub fn u16(self, dat: &[u8], off: usize) -> u16 {
        let b = [dat[off], dat[off + 1]];
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    #[must_use]
    pub fn i16(self, dat: &[u8], off: usize) -> i16 {
        let b = [dat[off], dat[off + 1]];
        match self {
            ByteOrder::Little => i16::from_le_bytes(b),
            ByteOrder::Big => i16::from_be_bytes(b),
        }
    }

    #[must_use]
    pub fn u32(self, dat: &[u8], off: usize) -> u32 {
        let b = [dat[off], dat[off + 1], dat[off + 2], dat[off + 3]];
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    #[must_use]
    pub fn f32(self, dat: &[u8], off: usize) -> f32 {
        f32::from_bits(self.u32(dat, off))
    }

    /// Encode a `u16` in this byte order.
    #[must_use]
    pub fn u16_bytes(self, val: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => val.to_le_bytes(),
            ByteOrder::Big => val.to_be_bytes(),
        }
    }
}

/// Bytes provides the ability to read bytes from a reader and push them
/// back if they are not needed, i.e., Peek-and-push. The original order of
/// the bytes is preserved when pushing bytes back.
pub struct Bytes<R>
where
    R: io::Read,
{
    reader: R,
    num_read: usize,
    // Pushed back bytes, stored as a stack so the next byte is at the end.
    cache: Vec<u8>,
    buf: [u8; 1],
}

impl<R> Bytes<R>
where
    R: io::Read,
{
    pub fn new(reader: R) -> Self {
        Self::with_offset(reader, 0)
    }

    /// Create a ``Bytes`` for a reader already positioned at `offset`, so offsets
    /// reported stay absolute within the file.
    pub fn with_offset(reader: R, offset: usize) -> Self {
        Bytes {
            reader,
            num_read: offset,
            cache: Vec::new(),
            buf: [0u8; 1],
        }
    }

    pub fn next(&mut self) -> Result<u8, io::Error> {
        if let Some(b) = self.cache.pop() {
            Ok(b)
        } else {
            let n = self.reader.read(&mut self.buf)?;
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            self.num_read += 1;
            Ok(self.buf[0])
        }
    }

    /// Fill `buf` completely. Returns `Ok(false)` if the stream ended before `buf`
    /// could be filled, in which case every byte up to the end has been consumed.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<bool, io::Error> {
        let mut filled = self.cache.len().min(buf.len());
        for slot in buf[..filled].iter_mut() {
            // filled is bounded by the cache length
            *slot = self.cache.pop().unwrap_or_default();
        }

        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.num_read += n;
                    filled += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => (),
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    /// Discard `num` bytes. Returns `Ok(false)` if the stream ended first.
    pub fn skip(&mut self, num: usize) -> Result<bool, io::Error> {
        let mut buf = vec![0u8; num];
        self.fill(&mut buf)
    }

    /// Read up to `num` bytes without consuming them. Fewer are returned only at end of
    /// stream.
    pub fn peek(&mut self, num: usize) -> Result<Vec<u8>, io::Error> {
        let mut dat = Vec::with_capacity(num);
        while dat.len() < num {
            match self.next() {
                Ok(b) => dat.push(b),
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
                Err(err) => {
                    self.push(&dat);
                    return Err(err);
                }
            }
        }
        self.push(&dat);
        Ok(dat)
    }

    /// Push bytes back so they are produced again, `dat[0]` first.
    pub fn push(&mut self, dat: &[u8]) {
        self.cache.extend(dat.iter().rev());
    }

    /// Absolute offset of the next byte to be produced.
    pub fn offset(&self) -> usize {
        self.num_read - self.cache.len()
    }
}
