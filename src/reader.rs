//! Decoding session: header, buffer sizing, the record loop and post-processing.
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use ndarray::ArrayD;
use serde::Serialize;
use tracing::{debug, span, trace, warn, Level};
use typed_builder::TypedBuilder;

use crate::buffer::{estimate_capacity, Column, ColumnSpec, Element, Group, TimeSeriesBuffer};
use crate::bytes::ByteOrder;
use crate::header::{detect_byte_order, read_header, record_spacing, Family, InstrumentConfig};
use crate::record::{
    CheckData, DataHeader, Inertial, InertialVariant, Profile, RawRecord, RecordKind, System,
    Velocity,
};
use crate::schema;
use crate::science::{self, ProfileGeometry};
use crate::synchronizer::{Frame, Id, Synchronizer};
use crate::{Error, Result};

/// Spacing assumed when fewer than two spacing records can be found: the length of the
/// smallest complete data record.
const FALLBACK_SPACING: f64 = 24.0;

/// Number of previously decoded record kinds remembered by the decode loop.
const HISTORY_LEN: usize = 5;

/// Limit on the number of samples decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLimit {
    /// Stop after this many samples.
    Count(usize),
    /// Decode samples `start..stop`.
    ///
    /// Reading from a start sample is not supported: the file is always decoded from
    /// its beginning up to `stop`, and the leading samples are cropped afterwards.
    Window { start: usize, stop: usize },
}

impl RecordLimit {
    fn cap(self) -> usize {
        match self {
            RecordLimit::Count(n) => n,
            RecordLimit::Window { stop, .. } => stop,
        }
    }

    fn start(self) -> usize {
        match self {
            RecordLimit::Count(_) => 0,
            RecordLimit::Window { start, .. } => start,
        }
    }
}

/// Options controlling a decode.
///
/// Log verbosity is not an option: events are emitted through `tracing` and filtered
/// by whatever subscriber the caller installs.
///
/// ```
/// use nortek::{DecodeOptions, RecordLimit};
///
/// let opts = DecodeOptions::builder()
///     .checksum(true)
///     .records(RecordLimit::Count(1000))
///     .build();
/// assert_eq!(opts.spacing_iterations, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct DecodeOptions {
    /// Verify the trailing checksum of every record. When false checksum words are
    /// skipped unread.
    #[builder(default)]
    pub checksum: bool,
    /// Byte order override. Detected from the file's leading bytes by default.
    #[builder(default, setter(strip_option))]
    pub endian: Option<ByteOrder>,
    #[builder(default, setter(strip_option))]
    pub records: Option<RecordLimit>,
    /// Accept a resynchronization candidate only if its record checksum is valid.
    #[builder(default)]
    pub validate_resync: bool,
    /// Number of spacing records located to estimate the sample count.
    #[builder(default = 50)]
    pub spacing_iterations: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions::builder().build()
    }
}

/// Why the record loop stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    #[default]
    EndOfStream,
    /// The requested record limit was reached.
    RecordLimit,
    /// The sample index reached the estimated buffer capacity.
    CapacityReached,
}

/// Counters describing a finished decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Records decoded, per kind.
    pub records: BTreeMap<RecordKind, usize>,
    /// Corrupted blocks recovered by resynchronizing.
    pub corrupt_blocks: usize,
    /// Records with a sync byte but an unrecognized type code.
    pub unknown_records: usize,
    /// Checksum words were skipped rather than verified.
    pub checksums_skipped: bool,
    /// Absolute offset where decoding stopped.
    pub offset: usize,
    pub end: EndReason,
}

/// Scalar attributes describing the instrument and deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attrs {
    pub inst_make: &'static str,
    pub inst_model: &'static str,
    pub inst_type: &'static str,
    pub serial: String,
    /// Head acoustic frequency, kHz.
    pub freq: u16,
    /// Sampling rate, Hz.
    pub fs: f64,
    pub coord_sys: &'static str,
    pub has_imu: bool,
    pub imu_variant: Option<InertialVariant>,
    /// Samples per burst, when sampling in bursts.
    pub n_burst: Option<u16>,
    /// Samples per burst cycle, when sampling in bursts.
    pub n_cycle: Option<f64>,
    pub cell_size: Option<f64>,
    pub blank_dist: Option<f64>,
}

impl Attrs {
    fn new(config: &InstrumentConfig) -> Self {
        let nburst = config.user.nburst;
        Attrs {
            inst_make: "Nortek",
            inst_model: config.family.model(),
            inst_type: config.family.inst_type(),
            serial: config.hardware.serial.clone(),
            freq: config.head.freq,
            fs: config.fs,
            coord_sys: config.user.coord_sys.label(),
            has_imu: false,
            imu_variant: None,
            n_burst: (nburst > 0).then_some(nburst),
            n_cycle: (nburst > 0).then(|| f64::from(config.user.meas_interval) * config.fs),
            cell_size: None,
            blank_dist: None,
        }
    }
}

/// Decoded, physically scaled contents of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    buffer: TimeSeriesBuffer,
    pub attrs: Attrs,
    pub config: InstrumentConfig,
    /// Vector check data records, in file order.
    pub checkdata: Vec<CheckData>,
    /// Vector data header records, in file order.
    pub data_headers: Vec<DataHeader>,
    pub stats: DecodeStats,
}

#[derive(Serialize)]
struct ConfigDump<'a> {
    config: &'a InstrumentConfig,
    attrs: &'a Attrs,
}

impl Dataset {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names present in each group.
    #[must_use]
    pub fn groups(&self) -> BTreeMap<Group, Vec<&'static str>> {
        let mut groups: BTreeMap<Group, Vec<&'static str>> = BTreeMap::new();
        for (name, entry) in self.buffer.iter() {
            groups.entry(entry.group).or_default().push(name);
        }
        groups
    }

    /// Columns of a single group.
    pub fn group(&self, group: Group) -> impl Iterator<Item = (&'static str, &Column)> {
        self.buffer
            .iter()
            .filter(move |(_, e)| e.group == group)
            .map(|(name, e)| (name, &e.column))
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.buffer.get(name).map(|e| &e.column)
    }

    #[must_use]
    pub fn array<T: Element>(&self, name: &str) -> Option<&ArrayD<T>> {
        self.buffer.array(name)
    }

    #[must_use]
    pub fn units(&self, name: &str) -> Option<&'static str> {
        self.buffer.get(name).map(|e| e.units)
    }

    /// Instrument configuration and attributes as JSON.
    ///
    /// # Errors
    /// If serialization fails.
    pub fn config_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ConfigDump {
            config: &self.config,
            attrs: &self.attrs,
        })
    }
}

/// What the record loop does after a record is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Scan forward for the next record.
    Resync,
    /// A short read ended the stream.
    End,
}

/// Transient state of the record loop.
struct DecodeContext<'a> {
    config: &'a InstrumentConfig,
    verify: bool,
    buf: TimeSeriesBuffer,
    index: usize,
    /// Most recent first.
    history: VecDeque<RecordKind>,
    imu: Option<InertialVariant>,
    /// Data record kinds in the order first encountered.
    kinds: Vec<RecordKind>,
    checkdata: Vec<CheckData>,
    data_headers: Vec<DataHeader>,
    stats: DecodeStats,
}

impl<'a> DecodeContext<'a> {
    fn new(config: &'a InstrumentConfig, capacity: usize, verify: bool) -> Self {
        let mut buf = TimeSeriesBuffer::new(capacity, config.nbins());
        if config.family == Family::Vector {
            buf.ensure(schema::VECTOR_EAGER);
        }
        DecodeContext {
            config,
            verify,
            buf,
            index: 0,
            history: VecDeque::with_capacity(HISTORY_LEN),
            imu: None,
            kinds: Vec::new(),
            checkdata: Vec::new(),
            data_headers: Vec::new(),
            stats: DecodeStats {
                checksums_skipped: !verify,
                ..DecodeStats::default()
            },
        }
    }

    fn last(&self, n: usize) -> Option<RecordKind> {
        self.history.get(n).copied()
    }

    fn ensure(&mut self, kind: RecordKind, specs: &[ColumnSpec]) {
        let created = self.buf.ensure(specs);
        if created > 0 {
            debug!(%kind, created, capacity = self.buf.capacity(), "allocated columns");
        }
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
    }

    /// Read, verify and decode the record framed by `frame`, writing it into the buffer.
    fn dispatch<R: Read>(&mut self, sync: &mut Synchronizer<R>, frame: Frame) -> Result<Flow> {
        trace!(kind = %frame.kind, offset = frame.offset, index = self.index, "record");
        let order = sync.order();
        let record = match frame.kind {
            RecordKind::VelocityData => {
                let mut dat = [0u8; Velocity::LEN];
                if !self.read(sync, &frame, &mut dat)? {
                    return Ok(Flow::End);
                }
                RawRecord::Velocity(Velocity::decode(&dat, order))
            }
            RecordKind::SystemData => {
                let mut dat = [0u8; System::LEN];
                if !self.read(sync, &frame, &mut dat)? {
                    return Ok(Flow::End);
                }
                RawRecord::System(System::decode(&dat, order))
            }
            RecordKind::DataHeader => {
                let mut dat = [0u8; DataHeader::LEN];
                if !self.read(sync, &frame, &mut dat)? {
                    return Ok(Flow::End);
                }
                RawRecord::DataHeader(DataHeader::decode(&dat, order))
            }
            RecordKind::CheckData => {
                let mut prefix = [0u8; CheckData::PREFIX_LEN];
                if !sync.payload(&mut prefix)? {
                    return Ok(Flow::End);
                }
                let mut amps = vec![0u8; 3 * CheckData::num_samples(&prefix, order)];
                if !sync.payload(&mut amps)? || !sync.finish(&frame, &[&prefix, &amps], self.verify)?
                {
                    return Ok(Flow::End);
                }
                RawRecord::CheckData(CheckData::decode(&prefix, &amps, order))
            }
            RecordKind::InertialData => {
                let mut preamble = [0u8; InertialVariant::PREAMBLE_LEN];
                if !sync.payload(&mut preamble)? {
                    return Ok(Flow::End);
                }
                let Some(variant) = InertialVariant::from_code(preamble[3]) else {
                    warn!(
                        offset = frame.offset,
                        code = preamble[3],
                        "unrecognized inertial sensor sub-type; searching for next record"
                    );
                    sync.push_back(&preamble[2..]);
                    return Ok(Flow::Resync);
                };
                let mut body = vec![0u8; variant.body_len()];
                if !sync.payload(&mut body)? || !sync.finish(&frame, &[&preamble, &body], self.verify)?
                {
                    return Ok(Flow::End);
                }
                RawRecord::Inertial(Inertial::decode(variant, &body, order))
            }
            RecordKind::ProfileData => {
                let nbins = self.config.nbins();
                let mut dat = vec![0u8; Profile::len(nbins)];
                if !self.read(sync, &frame, &mut dat)? {
                    return Ok(Flow::End);
                }
                RawRecord::Profile(Profile::decode(&dat, nbins, order))
            }
            kind @ (RecordKind::UserConfig | RecordKind::HeadConfig | RecordKind::HardwareConfig) => {
                let mut dat = vec![0u8; kind.fixed_len().unwrap_or_default()];
                if !self.read(sync, &frame, &mut dat)? {
                    return Ok(Flow::End);
                }
                debug!(%kind, offset = frame.offset, "ignoring configuration record in data");
                RawRecord::Config(kind)
            }
        };

        let kind = record.kind();
        self.write(record, frame.offset);
        *self.stats.records.entry(kind).or_default() += 1;
        if self.history.len() == HISTORY_LEN {
            self.history.pop_back();
        }
        self.history.push_front(kind);
        Ok(Flow::Continue)
    }

    fn read<R: Read>(&self, sync: &mut Synchronizer<R>, frame: &Frame, buf: &mut [u8]) -> Result<bool> {
        Ok(sync.payload(buf)? && sync.finish(frame, &[&*buf], self.verify)?)
    }

    /// Write a decoded record at the current sample index, advancing the index per
    /// record kind.
    fn write(&mut self, record: RawRecord, offset: usize) {
        match record {
            RawRecord::Velocity(rec) => {
                self.write_velocity(&rec);
                self.index += 1;
            }
            RawRecord::System(rec) => self.write_system(&rec),
            RawRecord::Inertial(rec) => {
                // Inertial data is emitted after the velocity record it belongs to, which
                // has already advanced the index. The step back applies after any
                // record kind, not only after system data.
                if self.index > 0 {
                    if self.last(0) == Some(RecordKind::SystemData) {
                        debug!(offset, index = self.index, "inertial record follows system data");
                    }
                    self.index -= 1;
                } else {
                    warn!(offset, "inertial record before the first sample");
                }
                self.write_inertial(&rec);
                self.index += 1;
            }
            RawRecord::Profile(rec) => {
                self.write_profile(&rec);
                self.index += 1;
            }
            RawRecord::CheckData(rec) => self.checkdata.push(rec),
            RawRecord::DataHeader(rec) => self.data_headers.push(rec),
            RawRecord::Config(_) => (),
        }
    }

    fn write_velocity(&mut self, rec: &Velocity) {
        self.ensure(RecordKind::VelocityData, schema::VELOCITY);
        let i = self.index;
        let buf = &mut self.buf;
        buf.put("anain2_lsb", &[i], rec.anain2_lsb);
        buf.put("count", &[i], rec.count);
        buf.put("anain2_msb", &[i], rec.anain2_msb);
        buf.put("anain1", &[i], rec.anain1);
        buf.put("pressure_msb", &[i], rec.pressure_msb);
        buf.put("pressure_lsw", &[i], rec.pressure_lsw);
        for beam in 0..3 {
            buf.put("vel", &[beam, i], f32::from(rec.vel[beam]));
            buf.put("amp", &[beam, i], rec.amp[beam]);
            buf.put("corr", &[beam, i], rec.corr[beam]);
        }
    }

    fn write_system(&mut self, rec: &System) {
        self.ensure(RecordKind::SystemData, schema::SYSTEM);
        let i = self.index;
        let burst_start = self.last(0) == Some(RecordKind::CheckData)
            && self.last(1) == Some(RecordKind::DataHeader);
        let buf = &mut self.buf;
        buf.put("time", &[i], rec.time);
        buf.put("batt", &[i], f32::from(rec.batt));
        buf.put("error", &[i], rec.error);
        buf.put("status", &[i], rec.status);
        buf.put("anain", &[i], rec.anain);
        buf.put("c_sound", &[i], f32::from(rec.c_sound));
        buf.put("heading", &[i], f32::from(rec.heading));
        buf.put("pitch", &[i], f32::from(rec.pitch));
        buf.put("roll", &[i], f32::from(rec.roll));
        buf.put("temp", &[i], f32::from(rec.temp));
        if burst_start {
            buf.put("burst_start", &[i], true);
        }
    }

    fn write_inertial(&mut self, rec: &Inertial) {
        if self.imu != Some(rec.variant) {
            match self.imu {
                Some(prev) => warn!(
                    from = prev.code(),
                    to = rec.variant.code(),
                    "inertial sensor sub-type changed mid-file"
                ),
                None => debug!(code = rec.variant.code(), "inertial sensor sub-type"),
            }
            self.imu = Some(rec.variant);
        }
        self.ensure(RecordKind::InertialData, &schema::inertial(rec.variant));
        self.ensure(RecordKind::InertialData, &[schema::IMU_DELTA]);
        let i = self.index;
        let buf = &mut self.buf;
        buf.put(schema::IMU_DELTA.name, &[i], rec.variant.is_delta());
        for axis in 0..3 {
            buf.put(schema::ACCEL.name, &[axis, i], rec.accel[axis]);
            buf.put(schema::ANGRT.name, &[axis, i], rec.angrt[axis]);
            if let Some(mag) = rec.mag {
                buf.put(schema::MAG.name, &[axis, i], mag[axis]);
            }
            if let Some(omat) = rec.orientmat {
                for col in 0..3 {
                    buf.put(schema::ORIENTMAT.name, &[axis, col, i], omat[axis][col]);
                }
            }
        }
    }

    fn write_profile(&mut self, rec: &Profile) {
        self.ensure(RecordKind::ProfileData, schema::PROFILE);
        let i = self.index;
        let buf = &mut self.buf;
        buf.put("time", &[i], rec.time);
        buf.put("error", &[i], rec.error);
        buf.put("anain1", &[i], rec.anain1);
        buf.put("batt", &[i], f32::from(rec.batt));
        buf.put("status", &[i], rec.status);
        buf.put("c_sound", &[i], f32::from(rec.c_sound));
        buf.put("heading", &[i], f32::from(rec.heading));
        buf.put("pitch", &[i], f32::from(rec.pitch));
        buf.put("roll", &[i], f32::from(rec.roll));
        buf.put("pressure", &[i], rec.pressure as f32);
        buf.put("temp", &[i], f32::from(rec.temp));
        for beam in 0..3 {
            for (bin, (v, a)) in rec.vel[beam].iter().zip(&rec.amp[beam]).enumerate() {
                buf.put("vel", &[beam, bin, i], f32::from(*v));
                buf.put("amp", &[beam, bin, i], *a);
            }
        }
    }
}

/// Decodes a Nortek binary stream.
///
/// The stream is read from its beginning: the header records are parsed, the stream is
/// scanned once to estimate the number of samples, then decoded in a single pass.
pub struct Reader<R>
where
    R: Read + Seek,
{
    inner: R,
    opts: DecodeOptions,
}

impl<R> Reader<R>
where
    R: Read + Seek,
{
    pub fn new(inner: R, opts: DecodeOptions) -> Self {
        Reader { inner, opts }
    }

    fn byte_order(&mut self) -> Result<ByteOrder> {
        let mut magic = [0u8; 4];
        self.inner.seek(SeekFrom::Start(0))?;
        match self.inner.read_exact(&mut magic) {
            Ok(()) => (),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                return Err(Error::Format("file too short to contain a header".into()))
            }
            Err(err) => return Err(err.into()),
        }
        match self.opts.endian {
            Some(order) => {
                debug!(?order, "using byte order override");
                Ok(order)
            }
            None => detect_byte_order(&magic),
        }
    }

    fn estimate_capacity(&mut self, config: &InstrumentConfig, file_size: u64, header_end: usize) -> Result<usize> {
        if let Some(limit) = self.opts.records {
            return Ok(limit.cap() + 1);
        }
        self.inner.seek(SeekFrom::Start(header_end as u64))?;
        let kind = config.family.spacing_kind();
        let mut sync = Synchronizer::new(
            BufReader::new(&mut self.inner),
            config.byte_order,
            header_end,
            self.opts.validate_resync,
        );
        let spacing = match record_spacing(&mut sync, kind, self.opts.spacing_iterations)? {
            Some(spacing) => spacing,
            None => {
                debug!(%kind, fallback = FALLBACK_SPACING, "too few records to measure spacing");
                FALLBACK_SPACING
            }
        };
        let multiplier = match config.family {
            // Several velocity samples per system record
            Family::Vector => config.fs.floor() as usize,
            Family::Awac => 1,
        };
        Ok(estimate_capacity(file_size, spacing, multiplier))
    }

    /// Decode the entire stream.
    ///
    /// # Errors
    /// [Error::Format] if the stream is not a supported Nortek file, [Error::Checksum]
    /// if checksums are verified and a record fails, or [Error::Io] on read failure.
    /// Corrupted data and unknown records are recovered from and reported in
    /// [DecodeStats].
    pub fn decode(mut self) -> Result<Dataset> {
        let file_size = self.inner.seek(SeekFrom::End(0))?;
        let order = self.byte_order()?;

        self.inner.seek(SeekFrom::Start(0))?;
        let (config, header_end) = {
            let mut sync = Synchronizer::new(
                BufReader::new(&mut self.inner),
                order,
                0,
                self.opts.validate_resync,
            );
            let config = read_header(&mut sync, self.opts.checksum)?;
            (config, sync.offset())
        };
        let span = span!(
            Level::DEBUG,
            "decode",
            model = config.family.model(),
            serial = %config.hardware.serial
        );
        let _guard = span.enter();
        debug!(?order, fs = config.fs, nbins = config.nbins(), header_end, "read header");

        let capacity = self.estimate_capacity(&config, file_size, header_end)?;
        debug!(file_size, capacity, "sized buffer");

        let cap = self.opts.records.map(RecordLimit::cap);
        let start = self.opts.records.map_or(0, RecordLimit::start);
        if start > 0 {
            warn!(
                start,
                "reading from a start sample is not supported; decoding from the beginning and cropping"
            );
        }

        self.inner.seek(SeekFrom::Start(header_end as u64))?;
        let mut sync = Synchronizer::new(
            BufReader::new(&mut self.inner),
            order,
            header_end,
            self.opts.validate_resync,
        );
        let mut ctx = DecodeContext::new(&config, capacity, self.opts.checksum);
        let mut pending: Option<Frame> = None;
        loop {
            if ctx.index >= capacity {
                warn!(index = ctx.index, capacity, "sample index reached buffer capacity; stopping");
                ctx.stats.end = EndReason::CapacityReached;
                break;
            }
            let frame = match pending.take() {
                Some(frame) => frame,
                None => match sync.next()? {
                    None => break,
                    Some(Id::Record(frame)) => frame,
                    Some(Id::Unknown { code, offset }) => {
                        warn!(offset, code, "unknown record type code; searching for next record");
                        ctx.stats.unknown_records += 1;
                        match sync.resync()? {
                            Some(frame) => frame,
                            None => break,
                        }
                    }
                },
            };
            match ctx.dispatch(&mut sync, frame)? {
                Flow::Continue => (),
                Flow::Resync => match sync.resync()? {
                    Some(frame) => pending = Some(frame),
                    None => break,
                },
                Flow::End => {
                    debug!(offset = sync.offset(), "end of stream inside record");
                    break;
                }
            }
            if let Some(cap) = cap {
                if ctx.index >= cap {
                    // An inertial record trails the last velocity record it belongs to
                    if ctx.imu.is_some() {
                        if let Some(Id::Record(frame)) = sync.next()? {
                            if frame.kind == RecordKind::InertialData {
                                ctx.dispatch(&mut sync, frame)?;
                            }
                        }
                    }
                    ctx.stats.end = EndReason::RecordLimit;
                    break;
                }
            }
        }
        if !sync.is_synchronized() {
            warn!(offset = sync.offset(), "end of stream while resynchronizing; trailing bytes discarded");
        }
        ctx.stats.corrupt_blocks = sync.corrupt_blocks;
        ctx.stats.offset = sync.offset();
        drop(sync);

        let DecodeContext {
            mut buf,
            index,
            imu,
            kinds,
            checkdata,
            data_headers,
            stats,
            ..
        } = ctx;
        debug!(samples = index, ?stats, "decoded records");

        buf.crop(0..cap.map_or(index, |cap| index.min(cap)));

        let mut attrs = Attrs::new(&config);
        attrs.has_imu = imu.is_some();
        attrs.imu_variant = imu;
        for kind in kinds {
            if let Some(ProfileGeometry {
                cell_size,
                blank_dist,
            }) = science::process(kind, &mut buf, &config)
            {
                attrs.cell_size = Some(cell_size);
                attrs.blank_dist = Some(blank_dist);
            }
        }

        if start > 0 {
            let len = buf.capacity();
            buf.crop(start..len);
        }

        Ok(Dataset {
            buffer: buf,
            attrs,
            config,
            checkdata,
            data_headers,
            stats,
        })
    }
}

/// Decode the file at `path`.
///
/// # Errors
/// See [Reader::decode]. Also [Error::Io] if the file cannot be opened.
pub fn read_file<P: AsRef<Path>>(path: P, opts: &DecodeOptions) -> Result<Dataset> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading");
    let file = File::open(path)?;
    Reader::new(file, opts.clone()).decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_limit_cap_and_start() {
        assert_eq!(RecordLimit::Count(10).cap(), 10);
        assert_eq!(RecordLimit::Count(10).start(), 0);
        let window = RecordLimit::Window { start: 2, stop: 8 };
        assert_eq!(window.cap(), 8);
        assert_eq!(window.start(), 2);
    }

    #[test]
    fn default_options() {
        let opts = DecodeOptions::default();
        assert!(!opts.checksum);
        assert!(!opts.validate_resync);
        assert_eq!(opts.endian, None);
        assert_eq!(opts.records, None);
        assert_eq!(opts.spacing_iterations, 50);

        let opts = DecodeOptions::builder()
            .endian(ByteOrder::Big)
            .records(RecordLimit::Count(3))
            .build();
        assert_eq!(opts.endian, Some(ByteOrder::Big));
        assert_eq!(opts.records, Some(RecordLimit::Count(3)));
    }

    #[test]
    fn too_short_is_format_error() {
        let reader = Reader::new(std::io::Cursor::new(vec![0xa5u8, 0x05]), DecodeOptions::default());
        assert!(matches!(reader.decode(), Err(Error::Format(_))));
    }
}
