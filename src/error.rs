use crate::record::RecordKind;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input is not a decodable Nortek file: byte order could not be determined,
    /// a mandatory header record is missing or out of order, or the instrument family
    /// is unknown.
    #[error("not a supported Nortek file: {0}")]
    Format(String),

    /// Per-record checksum mismatch. `offset` is the byte offset of the record's id word.
    #[error("checksum failed for {kind} record at offset {offset}: expected {expected:#06x}, computed {computed:#06x}")]
    Checksum {
        kind: RecordKind,
        offset: usize,
        expected: u16,
        computed: u16,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
