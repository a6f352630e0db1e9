use std::io::Read;

use tracing::{debug, trace, warn};

use crate::bytes::{ByteOrder, Bytes};
use crate::record::{checksum, split_id, RecordKind, Velocity, SYNC, WORD_LEN};
use crate::{Error, Result};

/// A synchronized record location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub kind: RecordKind,
    /// Offset of the first byte of the record's id word.
    pub offset: usize,
    /// Raw id word bytes, as they appear in the stream.
    pub id: [u8; 2],
}

/// Result of reading the next id word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id {
    Record(Frame),
    /// The sync byte matched but the type code is not one we know how to decode.
    Unknown { code: u8, offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Synchronized,
    Resyncing,
}

/// Synchronizer locates record boundaries in a byte stream.
///
/// While synchronized, each call to [Synchronizer::next] reads exactly one id word. When
/// the sync byte does not match the stream is scanned forward one byte at a time until
/// the next sync byte followed by a known type code, optionally validated by the
/// candidate record's own checksum.
pub struct Synchronizer<R>
where
    R: Read,
{
    bytes: Bytes<R>,
    order: ByteOrder,
    state: State,
    // Verify the checksum of resync candidates before accepting them
    validate: bool,
    /// Number of corrupted blocks recovered from.
    pub corrupt_blocks: usize,
}

impl<R> Synchronizer<R>
where
    R: Read,
{
    /// Creates a new ``Synchronizer`` reading from `reader`, which is positioned at the
    /// absolute byte `offset` of the file.
    pub fn new(reader: R, order: ByteOrder, offset: usize, validate: bool) -> Self {
        Synchronizer {
            bytes: Bytes::with_offset(reader, offset),
            order,
            state: State::Synchronized,
            validate,
            corrupt_blocks: 0,
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.bytes.offset()
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Read the next id word, resynchronizing if it does not begin with the sync byte.
    ///
    /// # Errors
    /// Any non-EOF I/O error. End of stream produces `Ok(None)`.
    pub fn next(&mut self) -> Result<Option<Id>> {
        let mut id = [0u8; WORD_LEN];
        if !self.bytes.fill(&mut id)? {
            return Ok(None);
        }
        let offset = self.bytes.offset() - WORD_LEN;
        let (sync, code) = split_id(self.order.u16(&id, 0));
        if sync != SYNC {
            self.corrupt_blocks += 1;
            warn!(
                offset,
                sync, code, "corrupted data block sync code; searching for next valid code"
            );
            // The next candidate starts at the second byte of the bad id word
            self.bytes.push(&id[1..]);
            return Ok(self.resync()?.map(Id::Record));
        }
        trace!(offset, code, "id");
        Ok(Some(match RecordKind::from_code(code) {
            Some(kind) => Id::Record(Frame { kind, offset, id }),
            None => Id::Unknown { code, offset },
        }))
    }

    /// Scan forward one byte at a time for the next sync byte followed by a known type
    /// code. With validation enabled a candidate is accepted only if the record it
    /// starts carries a valid checksum.
    ///
    /// # Errors
    /// Any non-EOF I/O error. Reaching the end of the stream produces `Ok(None)`.
    pub fn resync(&mut self) -> Result<Option<Frame>> {
        self.state = State::Resyncing;
        let start = self.bytes.offset();

        let mut first = match self.next_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        loop {
            let Some(second) = self.next_byte()? else {
                debug!(start, "end of stream while resynchronizing");
                return Ok(None);
            };
            let id = [first, second];
            let offset = self.bytes.offset() - WORD_LEN;
            let (sync, code) = split_id(self.order.u16(&id, 0));

            if sync == SYNC {
                if let Some(kind) = RecordKind::from_code(code) {
                    if !self.validate || self.validates(kind, &id)? {
                        self.state = State::Synchronized;
                        debug!(start, offset, %kind, skipped = offset - start, "resynchronized");
                        return Ok(Some(Frame { kind, offset, id }));
                    }
                    trace!(offset, %kind, "rejected resync candidate");
                }
            }
            first = second;
        }
    }

    /// Check the checksum of the candidate record whose id word was just read, without
    /// consuming any of it. Records other than velocity data carry their size, in words,
    /// as the first payload word.
    fn validates(&mut self, kind: RecordKind, id: &[u8; 2]) -> Result<bool> {
        let payload_len = if kind == RecordKind::VelocityData {
            Velocity::LEN
        } else {
            let size = self.bytes.peek(WORD_LEN)?;
            if size.len() < WORD_LEN {
                return Ok(false);
            }
            (2 * self.order.u16(&size, 0) as usize).saturating_sub(2 * WORD_LEN)
        };
        if payload_len < WORD_LEN {
            return Ok(false);
        }
        let dat = self.bytes.peek(payload_len + WORD_LEN)?;
        if dat.len() < payload_len + WORD_LEN {
            return Ok(false);
        }
        let (payload, cs) = dat.split_at(payload_len);
        Ok(checksum(self.order, id, &[payload]) == self.order.u16(cs, 0))
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        match self.bytes.next() {
            Ok(b) => Ok(Some(b)),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(Error::Io(err)),
        }
    }

    /// Fill `buf` with record payload. Returns `Ok(false)` at end of stream.
    ///
    /// # Errors
    /// Any non-EOF I/O error.
    pub fn payload(&mut self, buf: &mut [u8]) -> Result<bool> {
        Ok(self.bytes.fill(buf)?)
    }

    /// Skip `num` bytes. Returns `Ok(false)` at end of stream.
    ///
    /// # Errors
    /// Any non-EOF I/O error.
    pub fn skip(&mut self, num: usize) -> Result<bool> {
        Ok(self.bytes.skip(num)?)
    }

    /// Return bytes to the stream so the next read produces them again.
    pub fn push_back(&mut self, dat: &[u8]) {
        self.bytes.push(dat);
    }

    /// Consume the trailing checksum word of `frame`. When `verify` is set, the word is
    /// compared against the checksum computed over the id word and `payloads`,
    /// otherwise it is skipped unread. Returns `Ok(false)` at end of stream.
    ///
    /// # Errors
    /// [Error::Checksum] on mismatch, or any non-EOF I/O error.
    pub fn finish(&mut self, frame: &Frame, payloads: &[&[u8]], verify: bool) -> Result<bool> {
        if !verify {
            return self.skip(WORD_LEN);
        }
        let mut word = [0u8; WORD_LEN];
        if !self.bytes.fill(&mut word)? {
            return Ok(false);
        }
        let expected = self.order.u16(&word, 0);
        let computed = checksum(self.order, &frame.id, payloads);
        if expected != computed {
            return Err(Error::Checksum {
                kind: frame.kind,
                offset: frame.offset,
                expected,
                computed,
            });
        }
        Ok(true)
    }

    /// False only while a resync scan is in progress or after one ran off the end of
    /// the stream.
    pub fn is_synchronized(&self) -> bool {
        self.state == State::Synchronized
    }
}
