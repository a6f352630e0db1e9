//! Conversion of raw decoded values into physical units.
//!
//! Runs once per encountered record type after decoding has finished and the buffer has
//! been cropped. Record types without a conversion pass through unchanged.
use std::ops::Range;

use ndarray::{ArrayD, Axis, IxDyn, Zip};
use serde::Serialize;
use tracing::{debug, warn};

use crate::buffer::{Column, ColumnSpec, Group, Kind, TimeSeriesBuffer};
use crate::header::InstrumentConfig;
use crate::record::RecordKind;
use crate::schema;

/// Standard gravity, used to convert inertial sensor accelerations from g.
pub const GRAVITY: f32 = 9.806_65;

/// AWAC head beam angle from vertical, degrees.
const AWAC_BEAM_ANGLE: f64 = 25.0;

/// Cell geometry of a profiling instrument, meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfileGeometry {
    pub cell_size: f64,
    pub blank_dist: f64,
}

/// Convert the columns written by records of `kind`. Returns the cell geometry when it
/// can be derived from profile data.
pub fn process(
    kind: RecordKind,
    buf: &mut TimeSeriesBuffer,
    config: &InstrumentConfig,
) -> Option<ProfileGeometry> {
    debug!(%kind, "converting to physical units");
    match kind {
        RecordKind::VelocityData => velocity(buf, config),
        RecordKind::SystemData => system(buf, config),
        RecordKind::InertialData => inertial(buf, config.fs),
        RecordKind::ProfileData => return profile(buf, config),
        _ => (),
    }
    None
}

/// Divide every floating point column in `specs` by its divisor.
pub fn scale(buf: &mut TimeSeriesBuffer, specs: &[ColumnSpec]) {
    for spec in specs {
        if spec.kind != Kind::F32 || spec.divisor == 1.0 {
            continue;
        }
        if let Some(arr) = buf.array_mut::<f32>(spec.name) {
            let divisor = spec.divisor;
            arr.mapv_inplace(|v| v / divisor);
        }
    }
}

fn velocity(buf: &mut TimeSeriesBuffer, config: &InstrumentConfig) {
    scale(buf, schema::VELOCITY);

    let vel_scale = config.user.vel_scale();
    if vel_scale != 1.0 {
        if let Some(vel) = buf.array_mut::<f32>("vel") {
            vel.mapv_inplace(|v| v * vel_scale);
        }
    }

    let (Some(msb), Some(lsw)) = (buf.remove("pressure_msb"), buf.remove("pressure_lsw")) else {
        return;
    };
    let (Some(msb), Some(lsw)) = (msb.array::<u8>(), lsw.array::<u16>()) else {
        return;
    };
    let pressure = Zip::from(msb)
        .and(lsw)
        .map_collect(|m, l| (f32::from(*m) * 65536.0 + f32::from(*l)) / 1000.0);
    buf.insert("pressure", Group::Data, "dbar", Column::F32(pressure));
}

/// Sample ranges of each burst. Without burst sampling the whole record is one segment.
fn segments(len: usize, nburst: usize) -> Vec<Range<usize>> {
    if nburst == 0 {
        return if len == 0 { Vec::new() } else { vec![0..len] };
    }
    (0..len)
        .step_by(nburst)
        .map(|start| start..(start + nburst).min(len))
        .collect()
}

/// Fill per-sample timestamps from the sparse real timestamps flagged in `anchors`.
///
/// Within each burst segment, two or more anchors are fit by least squares against the
/// sample index; a single anchor is extrapolated at the nominal rate `fs`; with none, the
/// segment is extrapolated from its first sample, so it stays NaN.
pub fn reconstruct_time(time: &mut [f64], anchors: &[bool], nburst: usize, fs: f64) {
    for seg in segments(time.len(), nburst) {
        let idx: Vec<usize> = seg.clone().filter(|i| anchors[*i]).collect();
        match idx.as_slice() {
            [] => {
                let t0 = time[seg.start];
                for i in seg.clone() {
                    time[i] = t0 + (i - seg.start) as f64 / fs;
                }
            }
            [k] => {
                let tk = time[*k];
                for i in seg {
                    time[i] = tk + (i as f64 - *k as f64) / fs;
                }
            }
            _ => {
                // Fit relative to the first anchor to keep epoch-sized values out of
                // the sums.
                let t_ref = time[idx[0]];
                let n = idx.len() as f64;
                let mean_x = idx.iter().map(|i| *i as f64).sum::<f64>() / n;
                let mean_y = idx.iter().map(|i| time[*i] - t_ref).sum::<f64>() / n;
                let mut sxy = 0.0;
                let mut sxx = 0.0;
                for i in &idx {
                    let dx = *i as f64 - mean_x;
                    sxy += dx * (time[*i] - t_ref - mean_y);
                    sxx += dx * dx;
                }
                let slope = sxy / sxx;
                let intercept = mean_y - slope * mean_x;
                for i in seg {
                    time[i] = t_ref + intercept + slope * i as f64;
                }
            }
        }
    }
}

/// Linearly interpolate NaN gaps, filling leading and trailing gaps with the nearest
/// valid value.
pub fn fill_gaps(vals: &mut [f64]) {
    let valid: Vec<usize> = (0..vals.len()).filter(|i| !vals[*i].is_nan()).collect();
    let (Some(first), Some(last)) = (valid.first().copied(), valid.last().copied()) else {
        return;
    };
    for i in 0..first {
        vals[i] = vals[first];
    }
    for i in last + 1..vals.len() {
        vals[i] = vals[last];
    }
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (va, vb) = (vals[a], vals[b]);
        for i in a + 1..b {
            vals[i] = va + (vb - va) * (i - a) as f64 / (b - a) as f64;
        }
    }
}

/// Linearly interpolate interior NaN gaps of `vals` against `t`. Leading and trailing
/// gaps are left as they are.
pub fn interp_gaps(vals: &mut [f32], t: &[f64]) {
    let valid: Vec<usize> = (0..vals.len()).filter(|i| !vals[*i].is_nan()).collect();
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b == a + 1 {
            continue;
        }
        let (va, vb) = (f64::from(vals[a]), f64::from(vals[b]));
        let span = t[b] - t[a];
        for i in a + 1..b {
            let frac = if span != 0.0 && span.is_finite() {
                (t[i] - t[a]) / span
            } else {
                (i - a) as f64 / (b - a) as f64
            };
            vals[i] = (va + (vb - va) * frac) as f32;
        }
    }
}

/// System data columns sampled only on system-data records.
const SPARSE_SYSTEM: [&str; 6] = ["batt", "c_sound", "heading", "pitch", "roll", "temp"];

/// Whether the instrument was pointing down, from bit 0 of the status byte of samples
/// carrying system data. Values between system samples are filled per burst, holding
/// the earlier state through each transition.
pub fn orientation_down(status: &[u8], anchors: &[bool], nburst: usize) -> Vec<bool> {
    let mut out = vec![false; status.len()];
    for seg in segments(status.len(), nburst) {
        let mut tmp: Vec<f64> = seg
            .clone()
            .map(|i| {
                if anchors[i] {
                    f64::from(status[i] & 1)
                } else {
                    f64::NAN
                }
            })
            .collect();
        fill_gaps(&mut tmp);
        for v in tmp.iter_mut() {
            if v.is_nan() {
                *v = 0.0;
            }
        }
        let slope: Vec<f64> = tmp.windows(2).map(|w| w[1] - w[0]).collect();
        for (i, s) in slope.iter().enumerate() {
            if *s < 0.0 {
                tmp[i + 1] = 1.0;
            }
        }
        for (i, s) in slope.iter().enumerate() {
            if *s > 0.0 {
                tmp[i] = 0.0;
            }
        }
        for (o, v) in out[seg].iter_mut().zip(tmp) {
            *o = v != 0.0;
        }
    }
    out
}

fn system(buf: &mut TimeSeriesBuffer, config: &InstrumentConfig) {
    scale(buf, schema::SYSTEM);

    let nburst = config.user.nburst as usize;
    let Some(time) = buf.array_mut::<f64>("time") else {
        return;
    };
    let anchors: Vec<bool> = time.iter().map(|t| !t.is_nan()).collect();
    let t = match time.as_slice_mut() {
        Some(time) => {
            reconstruct_time(time, &anchors, nburst, config.fs);
            time.to_vec()
        }
        None => {
            warn!("time column is not contiguous; leaving timestamps sparse");
            return;
        }
    };

    for name in SPARSE_SYSTEM {
        if let Some(vals) = buf.array_mut::<f32>(name).and_then(|a| a.as_slice_mut()) {
            interp_gaps(vals, &t);
        }
    }

    let Some(status) = buf.array::<u8>("status") else {
        return;
    };
    let status: Vec<u8> = status.iter().copied().collect();
    let down = orientation_down(&status, &anchors, nburst);
    let len = down.len();
    if let Ok(down) = ArrayD::from_shape_vec(IxDyn(&[len]), down) {
        buf.insert("orientation_down", Group::Data, "", Column::Bool(down));
    }
}

/// Rotate the sensor's native frame into the instrument frame: (x, y, z) becomes
/// (-z, y, x) along the first axis.
fn to_instrument_frame(arr: &mut ArrayD<f32>) {
    let x = arr.index_axis(Axis(0), 0).to_owned();
    let z = arr.index_axis(Axis(0), 2).to_owned();
    arr.index_axis_mut(Axis(0), 0).assign(&z.mapv(|v| -v));
    arr.index_axis_mut(Axis(0), 2).assign(&x);
}

fn inertial(buf: &mut TimeSeriesBuffer, fs: f64) {
    for spec in [schema::ACCEL, schema::ANGRT, schema::MAG, schema::ORIENTMAT] {
        if let Some(arr) = buf.array_mut::<f32>(spec.name) {
            to_instrument_frame(arr);
        }
    }

    // The orientation matrix is North-East-Down; convert to East-North-Up.
    if let Some(omat) = buf.array_mut::<f32>(schema::ORIENTMAT.name) {
        omat.index_axis_mut(Axis(1), 2).mapv_inplace(|v| -v);
        let north = omat.index_axis(Axis(1), 0).to_owned();
        let east = omat.index_axis(Axis(1), 1).to_owned();
        omat.index_axis_mut(Axis(1), 0).assign(&east);
        omat.index_axis_mut(Axis(1), 1).assign(&north);
    }

    if let Some(accel) = buf.array_mut::<f32>(schema::ACCEL.name) {
        accel.mapv_inplace(|v| v * GRAVITY);
    }

    // Delta angle and delta velocity become rates, per sample since the sensor
    // sub-type may change mid-file.
    let delta: Vec<bool> = match buf.remove(schema::IMU_DELTA.name) {
        Some(Column::Bool(arr)) => arr.iter().copied().collect(),
        _ => Vec::new(),
    };
    let fs = fs as f32;
    for spec in [schema::ANGRT, schema::ACCEL] {
        if let Some(arr) = buf.array_mut::<f32>(spec.name) {
            for (i, mut sample) in arr.axis_iter_mut(Axis(1)).enumerate() {
                if delta.get(i).copied().unwrap_or(false) {
                    sample.mapv_inplace(|v| v * fs);
                }
            }
        }
    }
}

/// Cell size coefficient per head frequency (kHz).
fn cell_coefficient(freq: u16) -> Option<f64> {
    match freq {
        2000 => Some(0.0239),
        1000 => Some(0.0478),
        600 => Some(0.0797),
        400 => Some(0.1195),
        _ => None,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn profile(buf: &mut TimeSeriesBuffer, config: &InstrumentConfig) -> Option<ProfileGeometry> {
    scale(buf, schema::PROFILE);

    let Some(coef) = cell_coefficient(config.head.freq) else {
        warn!(
            freq = config.head.freq,
            "unknown head frequency; cannot compute cell ranges"
        );
        return None;
    };
    let cos = AWAC_BEAM_ANGLE.to_radians().cos();
    let cell_size = f64::from(config.user.bin_length) / 256.0 * coef * cos;
    let blank_dist = f64::from(config.user.transmit.blank_distance) * 0.0229 * cos - cell_size;

    let nbins = config.nbins();
    let range: Vec<f64> = (0..nbins)
        .map(|i| round2((i + 1) as f64 * cell_size + blank_dist))
        .collect();
    if let Ok(range) = ArrayD::from_shape_vec(IxDyn(&[nbins]), range) {
        buf.insert_static("range", Group::Coords, "m", Column::F64(range));
    }
    Some(ProfileGeometry {
        cell_size: round2(cell_size),
        blank_dist: round2(blank_dist),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn burst_segments() {
        assert_eq!(segments(0, 0), Vec::<Range<usize>>::new());
        assert_eq!(segments(5, 0), vec![0..5]);
        assert_eq!(segments(5, 2), vec![0..2, 2..4, 4..5]);
        assert_eq!(segments(4, 2), vec![0..2, 2..4]);
    }

    #[test]
    fn time_regression_matches_anchors() {
        let fs = 8.0;
        let t0 = 1_339_497_015.0;
        let mut time = vec![f64::NAN; 32];
        // Real timestamps every 8 samples, at 1 second intervals
        for k in (0..32).step_by(8) {
            time[k] = t0 + (k / 8) as f64;
        }
        let anchors: Vec<bool> = time.iter().map(|t| !t.is_nan()).collect();
        reconstruct_time(&mut time, &anchors, 0, fs);

        for k in (0..32).step_by(8) {
            assert!((time[k] - (t0 + (k / 8) as f64)).abs() < EPS, "anchor {k}");
        }
        for w in time.windows(2) {
            assert!(w[1] > w[0], "monotonic: {w:?}");
        }
        assert!((time[31] - (t0 + 31.0 / fs)).abs() < EPS);
    }

    #[test]
    fn time_single_anchor_extrapolates() {
        let mut time = vec![f64::NAN; 4];
        time[2] = 100.0;
        let anchors = [false, false, true, false];
        reconstruct_time(&mut time, &anchors, 0, 2.0);
        assert_eq!(time, vec![99.0, 99.5, 100.0, 100.5]);
    }

    #[test]
    fn time_per_burst() {
        let mut time = vec![f64::NAN; 6];
        time[0] = 10.0;
        time[3] = 50.0;
        time[4] = 51.0;
        let anchors: Vec<bool> = time.iter().map(|t| !t.is_nan()).collect();
        reconstruct_time(&mut time, &anchors, 3, 1.0);
        assert_eq!(&time[..3], &[10.0, 11.0, 12.0]);
        assert!((time[5] - 52.0).abs() < EPS);
    }

    #[test]
    fn time_without_anchors_stays_nan() {
        let mut time = vec![f64::NAN; 3];
        reconstruct_time(&mut time, &[false; 3], 0, 1.0);
        assert!(time.iter().all(|t| t.is_nan()));
    }

    #[test]
    fn gaps_are_filled() {
        let mut vals = vec![f64::NAN, 1.0, f64::NAN, f64::NAN, 4.0, f64::NAN];
        fill_gaps(&mut vals);
        assert_eq!(vals, vec![1.0, 1.0, 2.0, 3.0, 4.0, 4.0]);

        let mut vals = vec![f64::NAN; 2];
        fill_gaps(&mut vals);
        assert!(vals.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn interior_gaps_follow_time() {
        let t = [0.0, 1.0, 3.0, 4.0, 5.0];
        let mut vals = [f32::NAN, 2.0, f32::NAN, 4.0, f32::NAN];
        interp_gaps(&mut vals, &t);
        assert!(vals[0].is_nan());
        assert!((vals[2] - 10.0 / 3.0).abs() < 1e-6);
        assert!(vals[4].is_nan());
    }

    #[test]
    fn orientation_switches_at_reporting_sample() {
        let status = [0u8, 0, 0, 0, 1, 0, 0, 0];
        let anchors = [true, false, false, false, true, false, false, false];
        let down = orientation_down(&status, &anchors, 0);
        assert_eq!(down, vec![false, false, false, false, true, true, true, true]);

        let status = [1u8, 0, 0, 0, 0, 0];
        let anchors = [true, false, false, true, false, false];
        let down = orientation_down(&status, &anchors, 0);
        assert_eq!(down, vec![true, true, true, true, false, false]);
    }

    #[test]
    fn inertial_frame_rotation() {
        let mut arr = ArrayD::from_shape_vec(IxDyn(&[3, 1]), vec![1.0f32, 2.0, 3.0]).unwrap();
        to_instrument_frame(&mut arr);
        assert_eq!(arr.as_slice().unwrap(), &[-3.0, 2.0, 1.0]);
    }

    #[test]
    fn cell_geometry_rounding() {
        assert_eq!(round2(1.234_9), 1.23);
        assert_eq!(cell_coefficient(1000), Some(0.0478));
        assert_eq!(cell_coefficient(6000), None);
    }
}
