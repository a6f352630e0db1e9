//! Mandatory configuration records at the start of every file.
//!
//! A file always begins with the hardware, head and user configuration records, in
//! that order. Together they determine the byte order, instrument family, the number of
//! depth bins (and therefore the profile record length) and the sampling rate.
use std::io::Read;

use serde::Serialize;
use tracing::debug;

use crate::bytes::ByteOrder;
use crate::record::{RecordKind, Velocity, SYNC, WORD_LEN};
use crate::synchronizer::{Id, Synchronizer};
use crate::{Error, Result};

/// Size, in 16-bit words, of the hardware configuration record. Together with the
/// leading id word this forms the magic used to detect the byte order.
const HARDWARE_SIZE_WORDS: u16 = 24;

/// Determine the byte order from the first 4 bytes of a file.
///
/// # Errors
/// [Error::Format] if neither byte order produces the hardware configuration id word
/// followed by its size.
pub fn detect_byte_order(dat: &[u8]) -> Result<ByteOrder> {
    if dat.len() < 4 {
        return Err(Error::Format("file too short to contain a header".into()));
    }
    let magic = u16::from(SYNC) | (u16::from(RecordKind::HardwareConfig.code()) << 8);
    for order in [ByteOrder::Little, ByteOrder::Big] {
        if order.u16(dat, 0) == magic && order.u16(dat, 2) == HARDWARE_SIZE_WORDS {
            return Ok(order);
        }
    }
    Err(Error::Format(
        "could not determine the byte order of the file".into(),
    ))
}

fn ascii(dat: &[u8]) -> String {
    let end = dat.iter().position(|b| *b == 0).unwrap_or(dat.len());
    String::from_utf8_lossy(&dat[..end]).trim_end().to_string()
}

fn bit(reg: u16, n: u32) -> bool {
    reg & (1 << n) != 0
}

/// Instrument family, resolved from the hardware serial number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Vector acoustic Doppler velocimeter.
    Vector,
    /// AWAC current profiler.
    Awac,
}

impl Family {
    /// Length of the serial number prefix identifying the family.
    pub const PREFIX_LEN: usize = 3;

    #[must_use]
    pub fn from_serial(serial: &str) -> Option<Self> {
        let prefix = serial.get(..Self::PREFIX_LEN)?.to_ascii_uppercase();
        match prefix.as_str() {
            "VEC" => Some(Family::Vector),
            "WPR" => Some(Family::Awac),
            _ => None,
        }
    }

    /// Record kind whose spacing is measured to estimate the number of samples.
    #[must_use]
    pub fn spacing_kind(self) -> RecordKind {
        match self {
            Family::Vector => RecordKind::SystemData,
            Family::Awac => RecordKind::ProfileData,
        }
    }

    #[must_use]
    pub fn model(self) -> &'static str {
        match self {
            Family::Vector => "Vector",
            Family::Awac => "AWAC",
        }
    }

    #[must_use]
    pub fn inst_type(self) -> &'static str {
        match self {
            Family::Vector => "ADV",
            Family::Awac => "ADCP",
        }
    }
}

/// Coordinate system the instrument reported velocities in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordSys {
    /// ENU
    Earth,
    /// XYZ
    Inst,
    Beam,
}

impl CoordSys {
    #[must_use]
    pub fn from_selector(sel: u16) -> Option<Self> {
        match sel {
            0 => Some(CoordSys::Earth),
            1 => Some(CoordSys::Inst),
            2 => Some(CoordSys::Beam),
            _ => None,
        }
    }

    /// Canonical frame name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CoordSys::Earth => "earth",
            CoordSys::Inst => "inst",
            CoordSys::Beam => "beam",
        }
    }
}

/// Hardware configuration record (0x05).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hardware {
    pub serial: String,
    pub prolog_id: u8,
    pub prolog_fw_version: String,
    pub config: u16,
    pub freq: u16,
    pub pic_version: u16,
    pub hw_revision: u16,
    /// Recorder size in bytes.
    pub rec_size: u32,
    pub status: u16,
    pub fw_version: u32,
}

impl Hardware {
    pub const LEN: usize = 44;

    #[must_use]
    pub fn decode(dat: &[u8], order: ByteOrder) -> Self {
        Hardware {
            serial: ascii(&dat[2..10]),
            prolog_id: dat[10],
            prolog_fw_version: ascii(&dat[12..16]),
            config: order.u16(dat, 16),
            freq: order.u16(dat, 18),
            pic_version: order.u16(dat, 20),
            hw_revision: order.u16(dat, 22),
            rec_size: u32::from(order.u16(dat, 24)) * 65536,
            status: order.u16(dat, 26),
            fw_version: order.u32(dat, 40),
        }
    }
}

/// Head configuration record (0x04).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Head {
    pub config: u16,
    /// Acoustic frequency, kHz.
    pub freq: u16,
    pub head_type: u16,
    pub serial: String,
    /// Beam to instrument transformation matrix.
    pub beam2inst: [[f64; 3]; 3],
    pub beams: u16,
}

impl Head {
    pub const LEN: usize = 220;
    const MATRIX_OFFSET: usize = 28;
    const MATRIX_SCALE: f64 = 4096.0;

    #[must_use]
    pub fn decode(dat: &[u8], order: ByteOrder) -> Self {
        let mut beam2inst = [[0.0; 3]; 3];
        for (i, row) in beam2inst.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                let off = Self::MATRIX_OFFSET + 2 * (3 * i + j);
                *val = f64::from(order.i16(dat, off)) / Self::MATRIX_SCALE;
            }
        }
        Head {
            config: order.u16(dat, 2),
            freq: order.u16(dat, 4),
            head_type: order.u16(dat, 6),
            serial: ascii(&dat[8..20]),
            beam2inst,
            beams: order.u16(dat, 218),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transmit {
    pub pulse_length: u16,
    pub blank_distance: u16,
    pub receive_length: u16,
    pub time_between_pings: u16,
    pub time_between_bursts: u16,
}

/// User configuration record (0x00).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub transmit: Transmit,
    pub npings: u16,
    pub avg_interval: u16,
    pub beams: u16,
    pub timing_ctrl_reg: u16,
    pub power_ctrl_reg: u16,
    pub a1: u16,
    pub b0: u16,
    pub b1: u16,
    pub compass_update_rate: u16,
    pub coord_sys: CoordSys,
    pub nbins: u16,
    pub bin_length: u16,
    pub meas_interval: u16,
    pub deploy_name: String,
    pub wrap_mode: u16,
    pub clock_deploy: [u16; 3],
    pub diag_interval: u32,
    pub mode0: u16,
    pub adj_sound_speed: u16,
    pub nsamp_diag: u16,
    pub nbeams_cell_diag: u16,
    pub npings_diag: u16,
    pub mode_test: u16,
    pub ana_in_addr: u16,
    pub sw_version: u16,
    pub vel_adj_table: Vec<u16>,
    pub comments: String,
    pub mode1: u16,
    pub dyn_perc_pos: u16,
    pub t1w: u16,
    pub t2w: u16,
    pub t3w: u16,
    pub nsamp: u16,
    /// Samples per burst, 0 when sampling continuously.
    pub nburst: u16,
    pub ana_out_scale: u16,
    pub corr_thresh: u16,
    pub ti_lag2: u16,
    pub qual_const: [u16; 8],
}

impl User {
    pub const LEN: usize = 508;

    /// # Errors
    /// [Error::Format] if the coordinate system selector is not recognized.
    pub fn decode(dat: &[u8], order: ByteOrder) -> Result<Self> {
        let u16_at = |off: usize| order.u16(dat, off);
        let selector = u16_at(30);
        let coord_sys = CoordSys::from_selector(selector).ok_or_else(|| {
            Error::Format(format!("unknown coordinate system selector {selector}"))
        })?;
        let mut qual_const = [0u16; 8];
        for (i, q) in qual_const.iter_mut().enumerate() {
            *q = u16_at(492 + 2 * i);
        }
        Ok(User {
            transmit: Transmit {
                pulse_length: u16_at(2),
                blank_distance: u16_at(4),
                receive_length: u16_at(6),
                time_between_pings: u16_at(8),
                time_between_bursts: u16_at(10),
            },
            npings: u16_at(12),
            avg_interval: u16_at(14),
            beams: u16_at(16),
            timing_ctrl_reg: u16_at(18),
            power_ctrl_reg: u16_at(20),
            a1: u16_at(22),
            b0: u16_at(24),
            b1: u16_at(26),
            compass_update_rate: u16_at(28),
            coord_sys,
            nbins: u16_at(32),
            bin_length: u16_at(34),
            meas_interval: u16_at(36),
            deploy_name: ascii(&dat[38..44]),
            wrap_mode: u16_at(44),
            clock_deploy: [u16_at(46), u16_at(48), u16_at(50)],
            diag_interval: order.u32(dat, 52),
            mode0: u16_at(56),
            adj_sound_speed: u16_at(58),
            nsamp_diag: u16_at(60),
            nbeams_cell_diag: u16_at(62),
            npings_diag: u16_at(64),
            mode_test: u16_at(66),
            ana_in_addr: u16_at(68),
            sw_version: u16_at(70),
            vel_adj_table: (0..90).map(|i| u16_at(74 + 2 * i)).collect(),
            comments: ascii(&dat[254..434]),
            mode1: u16_at(434),
            dyn_perc_pos: u16_at(436),
            t1w: u16_at(438),
            t2w: u16_at(440),
            t3w: u16_at(442),
            nsamp: u16_at(444),
            nburst: u16_at(450),
            ana_out_scale: u16_at(454),
            corr_thresh: u16_at(456),
            ti_lag2: u16_at(460),
            qual_const,
        })
    }

    /// Profile timing, "single" or "continuous".
    #[must_use]
    pub fn profile_timing(&self) -> &'static str {
        if bit(self.timing_ctrl_reg, 1) {
            "continuous"
        } else {
            "single"
        }
    }

    #[must_use]
    pub fn burst_mode(&self) -> bool {
        !bit(self.timing_ctrl_reg, 2)
    }

    /// Sync-out position, "middle" or "end".
    #[must_use]
    pub fn sync_out(&self) -> &'static str {
        if bit(self.timing_ctrl_reg, 7) {
            "end"
        } else {
            "middle"
        }
    }

    #[must_use]
    pub fn sample_on_sync(&self) -> bool {
        bit(self.timing_ctrl_reg, 8)
    }

    #[must_use]
    pub fn start_on_sync(&self) -> bool {
        bit(self.timing_ctrl_reg, 9)
    }

    /// Velocity scaling selected by mode bit 4: 0.1 for the high-resolution range.
    #[must_use]
    pub fn vel_scale(&self) -> f32 {
        if bit(self.mode0, 4) {
            0.1
        } else {
            1.0
        }
    }
}

/// Parsed header data. Immutable once the reader is constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentConfig {
    pub byte_order: ByteOrder,
    pub family: Family,
    pub hardware: Hardware,
    pub head: Head,
    pub user: User,
    /// Nominal sampling rate, Hz.
    pub fs: f64,
}

impl InstrumentConfig {
    /// # Errors
    /// [Error::Format] if the serial number does not identify a supported family or
    /// the averaging interval is zero.
    pub fn new(byte_order: ByteOrder, hardware: Hardware, head: Head, user: User) -> Result<Self> {
        let family = Family::from_serial(&hardware.serial).ok_or_else(|| {
            Error::Format(format!(
                "unrecognized instrument serial number {:?}",
                hardware.serial
            ))
        })?;
        if user.avg_interval == 0 {
            return Err(Error::Format("averaging interval is zero".into()));
        }
        let fs = match family {
            Family::Vector => 512.0 / f64::from(user.avg_interval),
            Family::Awac => 1.0 / f64::from(user.avg_interval),
        };
        Ok(InstrumentConfig {
            byte_order,
            family,
            hardware,
            head,
            user,
            fs,
        })
    }

    #[must_use]
    pub fn nbins(&self) -> usize {
        self.user.nbins as usize
    }
}

fn read_config<R: Read>(
    sync: &mut Synchronizer<R>,
    expected: RecordKind,
    len: usize,
    verify: bool,
) -> Result<Vec<u8>> {
    let frame = match sync.next()? {
        Some(Id::Record(frame)) if frame.kind == expected => frame,
        Some(Id::Record(frame)) => {
            return Err(Error::Format(format!(
                "expected {expected} record, found {} at offset {}",
                frame.kind, frame.offset
            )))
        }
        Some(Id::Unknown { code, offset }) => {
            return Err(Error::Format(format!(
                "expected {expected} record, found unknown code {code:#04x} at offset {offset}"
            )))
        }
        None => {
            return Err(Error::Format(format!(
                "end of file before {expected} record"
            )))
        }
    };
    if sync.corrupt_blocks > 0 {
        return Err(Error::Format(format!(
            "corrupted data before {expected} record at offset {}",
            frame.offset
        )));
    }
    let mut buf = vec![0u8; len];
    if !sync.payload(&mut buf)? || !sync.finish(&frame, &[&buf], verify)? {
        return Err(Error::Format(format!("end of file in {expected} record")));
    }
    debug!(kind = %expected, offset = frame.offset, "read header record");
    Ok(buf)
}

/// Read the three mandatory configuration records, which must appear in order
/// hardware, head, user at the current position.
///
/// # Errors
/// [Error::Format] if a record is missing, out of order, truncated or describes an
/// unsupported instrument. [Error::Checksum] if `verify` is set and a record fails its
/// checksum.
pub fn read_header<R: Read>(sync: &mut Synchronizer<R>, verify: bool) -> Result<InstrumentConfig> {
    let order = sync.order();
    let dat = read_config(sync, RecordKind::HardwareConfig, Hardware::LEN, verify)?;
    let hardware = Hardware::decode(&dat, order);
    let dat = read_config(sync, RecordKind::HeadConfig, Head::LEN, verify)?;
    let head = Head::decode(&dat, order);
    let dat = read_config(sync, RecordKind::UserConfig, User::LEN, verify)?;
    let user = User::decode(&dat, order)?;

    InstrumentConfig::new(order, hardware, head, user)
}

/// Skip past the next record of `kind`, returning the offset following it, or `None` at
/// end of stream. Records are skipped using their size word; velocity data records
/// have no size word and a fixed length.
fn skip_to_next<R: Read>(sync: &mut Synchronizer<R>, kind: RecordKind) -> Result<Option<usize>> {
    loop {
        let found = match sync.next()? {
            None => return Ok(None),
            Some(Id::Record(frame)) => Some(frame.kind),
            Some(Id::Unknown { .. }) => None,
        };
        let more = if found == Some(RecordKind::VelocityData) {
            sync.skip(Velocity::LEN + WORD_LEN)?
        } else {
            let mut size = [0u8; WORD_LEN];
            if !sync.payload(&mut size)? {
                return Ok(None);
            }
            let total = 2 * sync.order().u16(&size, 0) as usize;
            sync.skip(total.saturating_sub(2 * WORD_LEN))?
        };
        if !more {
            return Ok(None);
        }
        if found == Some(kind) {
            return Ok(Some(sync.offset()));
        }
    }
}

/// Estimate the average spacing, in bytes, between consecutive records of `kind` by
/// locating up to `iterations + 1` of them. Returns `None` if fewer than two are found.
///
/// # Errors
/// Any non-EOF I/O error.
pub fn record_spacing<R: Read>(
    sync: &mut Synchronizer<R>,
    kind: RecordKind,
    iterations: usize,
) -> Result<Option<f64>> {
    let Some(first) = skip_to_next(sync, kind)? else {
        return Ok(None);
    };
    let mut last = first;
    let mut found = 0usize;
    for _ in 0..iterations {
        match skip_to_next(sync, kind)? {
            Some(pos) => {
                last = pos;
                found += 1;
            }
            None => break,
        }
    }
    debug!(%kind, first, last, found, "measured record spacing");
    if found == 0 {
        return Ok(None);
    }
    Ok(Some((last - first) as f64 / found as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_from_magic() {
        assert_eq!(
            detect_byte_order(&[0xa5, 0x05, 0x18, 0x00]).unwrap(),
            ByteOrder::Little
        );
        assert_eq!(
            detect_byte_order(&[0x05, 0xa5, 0x00, 0x18]).unwrap(),
            ByteOrder::Big
        );
        assert!(matches!(
            detect_byte_order(&[0xa5, 0x05, 0x00, 0x18]),
            Err(Error::Format(_))
        ));
        assert!(matches!(detect_byte_order(&[0xa5]), Err(Error::Format(_))));
    }

    #[test]
    fn family_from_serial() {
        assert_eq!(Family::from_serial("VEC 1234"), Some(Family::Vector));
        assert_eq!(Family::from_serial("vec9"), Some(Family::Vector));
        assert_eq!(Family::from_serial("WPR 1"), Some(Family::Awac));
        assert_eq!(Family::from_serial("AQD 1"), None);
        assert_eq!(Family::from_serial("VE"), None);
    }

    #[test]
    fn coord_sys_labels() {
        assert_eq!(CoordSys::from_selector(0).unwrap().label(), "earth");
        assert_eq!(CoordSys::from_selector(1).unwrap().label(), "inst");
        assert_eq!(CoordSys::from_selector(2).unwrap().label(), "beam");
        assert_eq!(CoordSys::from_selector(3), None);
    }

    #[test]
    fn decode_hardware() {
        let mut dat = [0u8; Hardware::LEN];
        dat[0..2].copy_from_slice(&24u16.to_le_bytes());
        dat[2..10].copy_from_slice(b"VEC 5678");
        dat[10] = 7;
        dat[12..16].copy_from_slice(b"4.10");
        dat[18..20].copy_from_slice(&6000u16.to_le_bytes());
        dat[24..26].copy_from_slice(&2u16.to_le_bytes());
        dat[40..44].copy_from_slice(&1234u32.to_le_bytes());

        let hw = Hardware::decode(&dat, ByteOrder::Little);
        assert_eq!(hw.serial, "VEC 5678");
        assert_eq!(hw.prolog_id, 7);
        assert_eq!(hw.prolog_fw_version, "4.10");
        assert_eq!(hw.freq, 6000);
        assert_eq!(hw.rec_size, 131_072);
        assert_eq!(hw.fw_version, 1234);
    }

    #[test]
    fn decode_head_matrix() {
        let mut dat = [0u8; Head::LEN];
        dat[4..6].copy_from_slice(&6000u16.to_be_bytes());
        let vals: [i16; 9] = [4096, 0, 0, 0, -4096, 0, 0, 0, 2048];
        for (i, v) in vals.iter().enumerate() {
            let off = 28 + 2 * i;
            dat[off..off + 2].copy_from_slice(&v.to_be_bytes());
        }
        let head = Head::decode(&dat, ByteOrder::Big);
        assert_eq!(head.freq, 6000);
        assert_eq!(
            head.beam2inst,
            [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 0.5]]
        );
    }

    #[test]
    fn decode_user_flags() {
        let mut dat = vec![0u8; User::LEN];
        dat[14..16].copy_from_slice(&32u16.to_le_bytes());
        dat[18..20].copy_from_slice(&0b10_0000_0010u16.to_le_bytes());
        dat[30..32].copy_from_slice(&1u16.to_le_bytes());
        dat[32..34].copy_from_slice(&20u16.to_le_bytes());
        dat[38..44].copy_from_slice(b"DEP\0\0\0");
        dat[56..58].copy_from_slice(&0b1_0000u16.to_le_bytes());
        dat[254..259].copy_from_slice(b"hello");
        dat[450..452].copy_from_slice(&1024u16.to_le_bytes());

        let user = User::decode(&dat, ByteOrder::Little).unwrap();
        assert_eq!(user.avg_interval, 32);
        assert_eq!(user.coord_sys, CoordSys::Inst);
        assert_eq!(user.nbins, 20);
        assert_eq!(user.deploy_name, "DEP");
        assert_eq!(user.comments, "hello");
        assert_eq!(user.nburst, 1024);
        assert_eq!(user.profile_timing(), "continuous");
        assert!(user.burst_mode());
        assert!(user.start_on_sync());
        assert!(!user.sample_on_sync());
        assert!((user.vel_scale() - 0.1).abs() < f32::EPSILON);
        assert_eq!(user.vel_adj_table.len(), 90);
    }

    #[test]
    fn decode_user_rejects_bad_selector() {
        let mut dat = vec![0u8; User::LEN];
        dat[30..32].copy_from_slice(&7u16.to_le_bytes());
        assert!(matches!(
            User::decode(&dat, ByteOrder::Little),
            Err(Error::Format(_))
        ));
    }
}
