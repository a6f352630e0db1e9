//! Record types and their fixed binary layouts.
//!
//! Every record is framed as
//!
//! ```text
//! [id word: sync | code << 8][payload ...][checksum word]
//! ```
//!
//! where the id word and all multi-byte payload fields use the file's byte order.
//! Payload offsets below are relative to the first byte after the id word.
use std::fmt::Display;

use serde::Serialize;

use crate::bytes::ByteOrder;
use crate::time::decode_bcd_time;

/// Sync byte beginning every record.
pub const SYNC: u8 = 0xa5;

/// Constant added to the word-sum of a record to produce its checksum.
pub const CHECKSUM_SEED: u16 = 0xb58c;

/// Length of the id word and of the trailing checksum word.
pub const WORD_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    UserConfig,
    HeadConfig,
    HardwareConfig,
    CheckData,
    VelocityData,
    SystemData,
    DataHeader,
    InertialData,
    ProfileData,
}

impl RecordKind {
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => RecordKind::UserConfig,
            0x04 => RecordKind::HeadConfig,
            0x05 => RecordKind::HardwareConfig,
            0x07 => RecordKind::CheckData,
            0x10 => RecordKind::VelocityData,
            0x11 => RecordKind::SystemData,
            0x12 => RecordKind::DataHeader,
            0x71 => RecordKind::InertialData,
            0x20 => RecordKind::ProfileData,
            _ => return None,
        })
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            RecordKind::UserConfig => 0x00,
            RecordKind::HeadConfig => 0x04,
            RecordKind::HardwareConfig => 0x05,
            RecordKind::CheckData => 0x07,
            RecordKind::VelocityData => 0x10,
            RecordKind::SystemData => 0x11,
            RecordKind::DataHeader => 0x12,
            RecordKind::InertialData => 0x71,
            RecordKind::ProfileData => 0x20,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::UserConfig => "user_config",
            RecordKind::HeadConfig => "head_config",
            RecordKind::HardwareConfig => "hardware_config",
            RecordKind::CheckData => "check_data",
            RecordKind::VelocityData => "velocity_data",
            RecordKind::SystemData => "system_data",
            RecordKind::DataHeader => "data_header",
            RecordKind::InertialData => "inertial_data",
            RecordKind::ProfileData => "profile_data",
        }
    }

    /// Payload length for record kinds whose length is fixed by the format.
    #[must_use]
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            RecordKind::UserConfig => Some(508),
            RecordKind::HeadConfig => Some(220),
            RecordKind::HardwareConfig => Some(44),
            RecordKind::VelocityData => Some(Velocity::LEN),
            RecordKind::SystemData => Some(System::LEN),
            RecordKind::DataHeader => Some(DataHeader::LEN),
            RecordKind::CheckData | RecordKind::InertialData | RecordKind::ProfileData => None,
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Split an id word into its (sync, code) bytes.
#[must_use]
pub fn split_id(id: u16) -> (u8, u8) {
    ((id & 0xff) as u8, (id >> 8) as u8)
}

/// Compute a record checksum: the 16-bit word-sum of the id word and all payload words,
/// plus [CHECKSUM_SEED], modulo 2^16.
///
/// A payload with an odd length has its final byte summed as a word whose other byte
/// is zero.
#[must_use]
pub fn checksum(order: ByteOrder, id: &[u8], payloads: &[&[u8]]) -> u16 {
    let mut sum = CHECKSUM_SEED.wrapping_add(order.u16(id, 0));
    let mut pending: Option<u8> = None;
    for byte in payloads.iter().flat_map(|p| p.iter()) {
        match pending.take() {
            Some(first) => sum = sum.wrapping_add(order.u16(&[first, *byte], 0)),
            None => pending = Some(*byte),
        }
    }
    if let Some(last) = pending {
        sum = sum.wrapping_add(order.u16(&[last, 0], 0));
    }
    sum
}

/// Velocity data record (0x10). Has no size word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub anain2_lsb: u8,
    pub count: u8,
    pub pressure_msb: u8,
    pub anain2_msb: u8,
    pub pressure_lsw: u16,
    pub anain1: u16,
    pub vel: [i16; 3],
    pub amp: [u8; 3],
    pub corr: [u8; 3],
}

impl Velocity {
    pub const LEN: usize = 20;

    #[must_use]
    pub fn decode(dat: &[u8], order: ByteOrder) -> Self {
        Velocity {
            anain2_lsb: dat[0],
            count: dat[1],
            pressure_msb: dat[2],
            anain2_msb: dat[3],
            pressure_lsw: order.u16(dat, 4),
            anain1: order.u16(dat, 6),
            vel: [order.i16(dat, 8), order.i16(dat, 10), order.i16(dat, 12)],
            amp: [dat[14], dat[15], dat[16]],
            corr: [dat[17], dat[18], dat[19]],
        }
    }
}

/// System data record (0x11), the only Vector record carrying a timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct System {
    /// Seconds since the Unix epoch, NaN if the clock bytes are not a valid date.
    pub time: f64,
    pub batt: u16,
    pub c_sound: u16,
    pub heading: i16,
    pub pitch: i16,
    pub roll: i16,
    pub temp: u16,
    pub error: u8,
    pub status: u8,
    pub anain: u16,
}

impl System {
    pub const LEN: usize = 24;

    #[must_use]
    pub fn decode(dat: &[u8], order: ByteOrder) -> Self {
        System {
            time: decode_bcd_time(&dat[2..8]),
            batt: order.u16(dat, 8),
            c_sound: order.u16(dat, 10),
            heading: order.i16(dat, 12),
            pitch: order.i16(dat, 14),
            roll: order.i16(dat, 16),
            temp: order.u16(dat, 18),
            error: dat[20],
            status: dat[21],
            anain: order.u16(dat, 22),
        }
    }
}

/// Vector data header record (0x12), emitted at the start of each burst.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataHeader {
    pub time: f64,
    pub num_records: u16,
    pub noise: [u8; 3],
    pub corr: [u8; 3],
}

impl DataHeader {
    pub const LEN: usize = 38;

    #[must_use]
    pub fn decode(dat: &[u8], order: ByteOrder) -> Self {
        DataHeader {
            time: decode_bcd_time(&dat[2..8]),
            num_records: order.u16(dat, 8),
            noise: [dat[10], dat[11], dat[12]],
            corr: [dat[14], dat[15], dat[16]],
        }
    }
}

/// Vector check data record (0x07).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckData {
    pub first_sample: u16,
    pub amp: [Vec<u8>; 3],
}

impl CheckData {
    /// Length of the fixed part preceding the amplitude samples.
    pub const PREFIX_LEN: usize = 6;

    /// Number of amplitude samples per beam declared by the prefix.
    #[must_use]
    pub fn num_samples(prefix: &[u8], order: ByteOrder) -> usize {
        order.u16(prefix, 2) as usize
    }

    #[must_use]
    pub fn decode(prefix: &[u8], amps: &[u8], order: ByteOrder) -> Self {
        let n = amps.len() / 3;
        CheckData {
            first_sample: order.u16(prefix, 4),
            amp: [
                amps[..n].to_vec(),
                amps[n..2 * n].to_vec(),
                amps[2 * n..3 * n].to_vec(),
            ],
        }
    }
}

/// Sub-types of the auxiliary inertial sensor record (0x71).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InertialVariant {
    /// 0xc3: delta angle, delta velocity and orientation matrix.
    DeltaOrient,
    /// 0xcc: acceleration, angular rate, magnetic field and orientation matrix.
    FullOrient,
    /// 0xd3: delta angle, delta velocity and magnetic field.
    DeltaMag,
}

impl InertialVariant {
    /// Length of the preamble: size word, count byte and sub-type byte.
    pub const PREAMBLE_LEN: usize = 4;

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0xc3 => Some(InertialVariant::DeltaOrient),
            0xcc => Some(InertialVariant::FullOrient),
            0xd3 => Some(InertialVariant::DeltaMag),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            InertialVariant::DeltaOrient => 0xc3,
            InertialVariant::FullOrient => 0xcc,
            InertialVariant::DeltaMag => 0xd3,
        }
    }

    /// Payload length following the preamble.
    #[must_use]
    pub fn body_len(self) -> usize {
        match self {
            InertialVariant::DeltaOrient => 64,
            InertialVariant::FullOrient => 78,
            InertialVariant::DeltaMag => 42,
        }
    }

    /// Whether the angular rate and acceleration are per-sample deltas that must be
    /// scaled by the sampling rate.
    #[must_use]
    pub fn is_delta(self) -> bool {
        matches!(
            self,
            InertialVariant::DeltaOrient | InertialVariant::DeltaMag
        )
    }

    #[must_use]
    pub fn has_mag(self) -> bool {
        matches!(self, InertialVariant::FullOrient | InertialVariant::DeltaMag)
    }

    #[must_use]
    pub fn has_orientmat(self) -> bool {
        matches!(
            self,
            InertialVariant::DeltaOrient | InertialVariant::FullOrient
        )
    }
}

/// Auxiliary inertial sensor record body, in the sensor's native frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inertial {
    pub variant: InertialVariant,
    pub accel: [f32; 3],
    pub angrt: [f32; 3],
    pub mag: Option<[f32; 3]>,
    pub orientmat: Option<[[f32; 3]; 3]>,
}

fn vec3(dat: &[u8], off: usize, order: ByteOrder) -> [f32; 3] {
    [
        order.f32(dat, off),
        order.f32(dat, off + 4),
        order.f32(dat, off + 8),
    ]
}

fn mat3(dat: &[u8], off: usize, order: ByteOrder) -> [[f32; 3]; 3] {
    [
        vec3(dat, off, order),
        vec3(dat, off + 12, order),
        vec3(dat, off + 24, order),
    ]
}

impl Inertial {
    #[must_use]
    pub fn decode(variant: InertialVariant, body: &[u8], order: ByteOrder) -> Self {
        match variant {
            InertialVariant::DeltaOrient => Inertial {
                variant,
                angrt: vec3(body, 0, order),
                accel: vec3(body, 12, order),
                mag: None,
                orientmat: Some(mat3(body, 24, order)),
            },
            InertialVariant::FullOrient => Inertial {
                variant,
                accel: vec3(body, 0, order),
                angrt: vec3(body, 12, order),
                mag: Some(vec3(body, 24, order)),
                orientmat: Some(mat3(body, 36, order)),
            },
            InertialVariant::DeltaMag => Inertial {
                variant,
                angrt: vec3(body, 0, order),
                accel: vec3(body, 12, order),
                mag: Some(vec3(body, 24, order)),
                orientmat: None,
            },
        }
    }
}

/// AWAC velocity profile record (0x20).
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub time: f64,
    pub error: u16,
    pub anain1: u16,
    pub batt: u16,
    pub c_sound: u16,
    pub heading: u16,
    pub pitch: u16,
    pub roll: u16,
    /// Pressure combined from its msb byte and lsw word, in mm.
    pub pressure: u32,
    pub status: u8,
    pub temp: u16,
    /// Per-beam velocities, `vel[beam][bin]`.
    pub vel: [Vec<i16>; 3],
    /// Per-beam amplitudes, `amp[beam][bin]`.
    pub amp: [Vec<u8>; 3],
}

impl Profile {
    /// Offset of the first velocity sample; the fixed part ends with a spare field.
    pub const DATA_OFFSET: usize = 116;

    /// Payload length for `nbins` depth bins, including the fill byte present when
    /// `nbins` is odd.
    #[must_use]
    pub fn len(nbins: usize) -> usize {
        Self::DATA_OFFSET + 9 * nbins + nbins % 2
    }

    #[must_use]
    pub fn decode(dat: &[u8], nbins: usize, order: ByteOrder) -> Self {
        let p_msb = u32::from(dat[22]);
        let p_lsw = u32::from(order.u16(dat, 24));
        let vel_at = |beam: usize| -> Vec<i16> {
            (0..nbins)
                .map(|bin| order.i16(dat, Self::DATA_OFFSET + 2 * (beam * nbins + bin)))
                .collect()
        };
        let amp_start = Self::DATA_OFFSET + 6 * nbins;
        let amp_at = |beam: usize| -> Vec<u8> {
            dat[amp_start + beam * nbins..amp_start + (beam + 1) * nbins].to_vec()
        };
        Profile {
            time: decode_bcd_time(&dat[2..8]),
            error: order.u16(dat, 8),
            anain1: order.u16(dat, 10),
            batt: order.u16(dat, 12),
            c_sound: order.u16(dat, 14),
            heading: order.u16(dat, 16),
            pitch: order.u16(dat, 18),
            roll: order.u16(dat, 20),
            pressure: 65536 * p_msb + p_lsw,
            status: dat[23],
            temp: order.u16(dat, 26),
            vel: [vel_at(0), vel_at(1), vel_at(2)],
            amp: [amp_at(0), amp_at(1), amp_at(2)],
        }
    }
}

/// A single decoded record, produced by one decode routine and written into the
/// buffer at the current sample index.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Velocity(Velocity),
    System(System),
    DataHeader(DataHeader),
    CheckData(CheckData),
    Inertial(Inertial),
    Profile(Profile),
    /// A configuration record found after the header; verified then discarded.
    Config(RecordKind),
}

impl RawRecord {
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            RawRecord::Velocity(_) => RecordKind::VelocityData,
            RawRecord::System(_) => RecordKind::SystemData,
            RawRecord::DataHeader(_) => RecordKind::DataHeader,
            RawRecord::CheckData(_) => RecordKind::CheckData,
            RawRecord::Inertial(_) => RecordKind::InertialData,
            RawRecord::Profile(_) => RecordKind::ProfileData,
            RawRecord::Config(kind) => *kind,
        }
    }
}
