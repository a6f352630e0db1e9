//! Decoding of Nortek Vector (ADV) and AWAC (ADCP) binary data files.
//!
//! A file is a sequence of records, each framed by a sync byte, a type code and a
//! trailing checksum. [read_file] and [Reader] parse the configuration header, decode
//! every data record into fixed-capacity columns and convert raw values into physical
//! units.
//!
//! ```no_run
//! use nortek::{read_file, DecodeOptions};
//!
//! let ds = read_file("deployment.vec", &DecodeOptions::default()).unwrap();
//! println!("{} samples at {} Hz", ds.len(), ds.attrs.fs);
//! ```
mod error;

pub mod buffer;
pub mod bytes;
pub mod header;
mod reader;
pub mod record;
pub mod schema;
pub mod science;
pub mod synchronizer;
pub mod time;

pub use buffer::{Column, Group};
pub use bytes::ByteOrder;
pub use error::{Error, Result};
pub use header::{CoordSys, Family, InstrumentConfig};
pub use reader::{
    read_file, Attrs, Dataset, DecodeOptions, DecodeStats, EndReason, Reader, RecordLimit,
};
pub use record::{InertialVariant, RecordKind};
