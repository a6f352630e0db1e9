//! Synthetic Nortek file construction.
#![allow(dead_code)]

use nortek::ByteOrder;

pub const SYNC: u8 = 0xa5;
pub const SEED: u16 = 0xb58c;

pub const HARDWARE: u8 = 0x05;
pub const HEAD: u8 = 0x04;
pub const USER: u8 = 0x00;
pub const VELOCITY: u8 = 0x10;
pub const SYSTEM: u8 = 0x11;
pub const DATA_HEADER: u8 = 0x12;
pub const CHECK_DATA: u8 = 0x07;
pub const INERTIAL: u8 = 0x71;
pub const PROFILE: u8 = 0x20;

/// Encode a value 0..=99 as binary-coded decimal.
pub fn bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

/// Instrument clock bytes for a date in 2000..2090.
pub fn clock(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> [u8; 6] {
    let yy = (year - 2000) as u8;
    [
        bcd(minute),
        bcd(second),
        bcd(day),
        bcd(hour),
        bcd(yy),
        bcd(month),
    ]
}

/// Seconds since the epoch of [clock] bytes for 2012-06-12 10:30:00 UTC.
pub const T0: f64 = 1_339_497_000.0;

/// Clock bytes `secs` seconds after [T0], within the same hour.
pub fn clock_at(secs: u32) -> [u8; 6] {
    clock(2012, 6, 12, 10, 30 + (secs / 60) as u8, (secs % 60) as u8)
}

#[derive(Debug, Clone, Copy)]
pub struct UserSettings {
    pub avg_interval: u16,
    pub coord_sys: u16,
    pub nbins: u16,
    pub bin_length: u16,
    pub blank_distance: u16,
    pub meas_interval: u16,
    pub nburst: u16,
    pub mode0: u16,
}

impl Default for UserSettings {
    fn default() -> Self {
        UserSettings {
            // 1 Hz on a Vector
            avg_interval: 512,
            coord_sys: 1,
            nbins: 0,
            bin_length: 256,
            blank_distance: 100,
            meas_interval: 600,
            nburst: 0,
            mode0: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityFields {
    pub count: u8,
    pub pressure_msb: u8,
    pub pressure_lsw: u16,
    pub anain1: u16,
    pub vel: [i16; 3],
    pub amp: [u8; 3],
    pub corr: [u8; 3],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFields {
    pub clock: [u8; 6],
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

#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub clock: [u8; 6],
    pub batt: u16,
    pub c_sound: u16,
    pub heading: u16,
    pub pitch: u16,
    pub roll: u16,
    pub pressure_msb: u8,
    pub pressure_lsw: u16,
    pub status: u8,
    pub temp: u16,
    /// `vel[beam][bin]`
    pub vel: [Vec<i16>; 3],
    /// `amp[beam][bin]`
    pub amp: [Vec<u8>; 3],
}

/// Builds a file record by record in either byte order, with valid size words and
/// checksums.
pub struct FileBuilder {
    order: ByteOrder,
    dat: Vec<u8>,
    /// Offset of every record written, in order.
    pub offsets: Vec<usize>,
}

impl FileBuilder {
    pub fn new(order: ByteOrder) -> Self {
        FileBuilder {
            order,
            dat: Vec::new(),
            offsets: Vec::new(),
        }
    }

    fn put_u16(&self, buf: &mut [u8], off: usize, val: u16) {
        buf[off..off + 2].copy_from_slice(&self.order.u16_bytes(val));
    }

    fn put_f32(&self, buf: &mut [u8], off: usize, val: f32) {
        let bits = val.to_bits();
        let bytes = match self.order {
            ByteOrder::Little => bits.to_le_bytes(),
            ByteOrder::Big => bits.to_be_bytes(),
        };
        buf[off..off + 4].copy_from_slice(&bytes);
    }

    fn word(&self, dat: &[u8]) -> u16 {
        match self.order {
            ByteOrder::Little => u16::from_le_bytes([dat[0], dat[1]]),
            ByteOrder::Big => u16::from_be_bytes([dat[0], dat[1]]),
        }
    }

    /// Payload buffer of `len` bytes whose first word is the record size in words.
    fn sized(&self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.put_u16(&mut buf, 0, ((len + 4) / 2) as u16);
        buf
    }

    /// Append a framed record, returning its offset.
    pub fn record(&mut self, code: u8, payload: &[u8]) -> usize {
        let offset = self.dat.len();
        let id = self
            .order
            .u16_bytes(u16::from(SYNC) | (u16::from(code) << 8));
        let mut sum = SEED.wrapping_add(self.word(&id));
        for chunk in payload.chunks(2) {
            let word = if chunk.len() == 2 {
                self.word(chunk)
            } else {
                self.word(&[chunk[0], 0])
            };
            sum = sum.wrapping_add(word);
        }
        self.dat.extend_from_slice(&id);
        self.dat.extend_from_slice(payload);
        self.dat.extend_from_slice(&self.order.u16_bytes(sum));
        self.offsets.push(offset);
        offset
    }

    pub fn hardware(&mut self, serial: &str) -> &mut Self {
        let mut buf = self.sized(44);
        let serial = serial.as_bytes();
        buf[2..2 + serial.len().min(8)].copy_from_slice(&serial[..serial.len().min(8)]);
        self.put_u16(&mut buf, 18, 6000);
        self.record(HARDWARE, &buf);
        self
    }

    pub fn head(&mut self, freq: u16) -> &mut Self {
        let mut buf = self.sized(220);
        self.put_u16(&mut buf, 4, freq);
        buf[8..14].copy_from_slice(b"A123  ");
        self.put_u16(&mut buf, 218, 3);
        self.record(HEAD, &buf);
        self
    }

    pub fn user(&mut self, settings: UserSettings) -> &mut Self {
        let mut buf = self.sized(508);
        self.put_u16(&mut buf, 4, settings.blank_distance);
        self.put_u16(&mut buf, 14, settings.avg_interval);
        self.put_u16(&mut buf, 30, settings.coord_sys);
        self.put_u16(&mut buf, 32, settings.nbins);
        self.put_u16(&mut buf, 34, settings.bin_length);
        self.put_u16(&mut buf, 36, settings.meas_interval);
        self.put_u16(&mut buf, 56, settings.mode0);
        self.put_u16(&mut buf, 450, settings.nburst);
        self.record(USER, &buf);
        self
    }

    /// Hardware, head and user records.
    pub fn header(&mut self, serial: &str, freq: u16, settings: UserSettings) -> &mut Self {
        self.hardware(serial).head(freq).user(settings)
    }

    pub fn velocity(&mut self, f: VelocityFields) -> usize {
        let mut buf = vec![0u8; 20];
        buf[1] = f.count;
        buf[2] = f.pressure_msb;
        self.put_u16(&mut buf, 4, f.pressure_lsw);
        self.put_u16(&mut buf, 6, f.anain1);
        for i in 0..3 {
            self.put_u16(&mut buf, 8 + 2 * i, f.vel[i] as u16);
            buf[14 + i] = f.amp[i];
            buf[17 + i] = f.corr[i];
        }
        self.record(VELOCITY, &buf)
    }

    pub fn system(&mut self, f: SystemFields) -> usize {
        let mut buf = self.sized(24);
        buf[2..8].copy_from_slice(&f.clock);
        self.put_u16(&mut buf, 8, f.batt);
        self.put_u16(&mut buf, 10, f.c_sound);
        self.put_u16(&mut buf, 12, f.heading as u16);
        self.put_u16(&mut buf, 14, f.pitch as u16);
        self.put_u16(&mut buf, 16, f.roll as u16);
        self.put_u16(&mut buf, 18, f.temp);
        buf[20] = f.error;
        buf[21] = f.status;
        self.put_u16(&mut buf, 22, f.anain);
        self.record(SYSTEM, &buf)
    }

    pub fn data_header(&mut self, clock: [u8; 6], num_records: u16) -> usize {
        let mut buf = self.sized(38);
        buf[2..8].copy_from_slice(&clock);
        self.put_u16(&mut buf, 8, num_records);
        buf[10..13].copy_from_slice(&[10, 11, 12]);
        buf[14..17].copy_from_slice(&[90, 91, 92]);
        self.record(DATA_HEADER, &buf)
    }

    /// Check data with `nsamp` amplitude samples per beam; `nsamp` must be even.
    pub fn check_data(&mut self, nsamp: u16) -> usize {
        let mut buf = self.sized(6 + 3 * nsamp as usize);
        self.put_u16(&mut buf, 2, nsamp);
        self.put_u16(&mut buf, 4, 7);
        for (i, b) in buf[6..].iter_mut().enumerate() {
            *b = (i % 100) as u8;
        }
        self.record(CHECK_DATA, &buf)
    }

    /// Inertial record of sub-type `code` carrying `values` in the sub-type's field
    /// order.
    pub fn inertial(&mut self, code: u8, values: &[f32]) -> usize {
        let body_len = match code {
            0xc3 => 64,
            0xcc => 78,
            0xd3 => 42,
            _ => 4 * values.len(),
        };
        let mut buf = self.sized(4 + body_len);
        buf[2] = 1;
        buf[3] = code;
        for (i, v) in values.iter().enumerate() {
            self.put_f32(&mut buf, 4 + 4 * i, *v);
        }
        self.record(INERTIAL, &buf)
    }

    pub fn profile(&mut self, f: &ProfileFields) -> usize {
        let nbins = f.vel[0].len();
        let mut buf = self.sized(116 + 9 * nbins + nbins % 2);
        buf[2..8].copy_from_slice(&f.clock);
        self.put_u16(&mut buf, 12, f.batt);
        self.put_u16(&mut buf, 14, f.c_sound);
        self.put_u16(&mut buf, 16, f.heading);
        self.put_u16(&mut buf, 18, f.pitch);
        self.put_u16(&mut buf, 20, f.roll);
        buf[22] = f.pressure_msb;
        buf[23] = f.status;
        self.put_u16(&mut buf, 24, f.pressure_lsw);
        self.put_u16(&mut buf, 26, f.temp);
        for beam in 0..3 {
            for bin in 0..nbins {
                self.put_u16(&mut buf, 116 + 2 * (beam * nbins + bin), f.vel[beam][bin] as u16);
                buf[116 + 6 * nbins + beam * nbins + bin] = f.amp[beam][bin];
            }
        }
        self.record(PROFILE, &buf)
    }

    /// Append raw bytes that are not a record.
    pub fn garbage(&mut self, dat: &[u8]) -> &mut Self {
        self.dat.extend_from_slice(dat);
        self
    }

    pub fn len(&self) -> usize {
        self.dat.len()
    }

    pub fn build(&self) -> Vec<u8> {
        self.dat.clone()
    }
}

/// Raw values of the `k`th synthetic Vector sample.
pub fn vector_sample(k: usize) -> (SystemFields, VelocityFields) {
    let k16 = k as i16;
    let sys = SystemFields {
        clock: clock_at(k as u32),
        batt: 120 + k as u16,
        c_sound: 15000,
        heading: 1234,
        pitch: -56,
        roll: 78,
        temp: 2150,
        error: 0,
        status: 0,
        anain: 3,
    };
    let vel = VelocityFields {
        count: k as u8,
        pressure_msb: 1,
        pressure_lsw: 1000 + k as u16,
        anain1: 9,
        vel: [100 * k16 + 1, -200, 300 - k16],
        amp: [120, 121, 122],
        corr: [95, 96, 97],
    };
    (sys, vel)
}

/// A 1 Hz Vector file of `n` system/velocity record pairs.
pub fn vector_file(order: ByteOrder, n: usize) -> FileBuilder {
    let mut fb = FileBuilder::new(order);
    fb.header("VEC12345", 6000, UserSettings::default());
    for k in 0..n {
        let (sys, vel) = vector_sample(k);
        fb.system(sys);
        fb.velocity(vel);
    }
    fb
}
