//! Column definitions for each record type.
//!
//! Columns are allocated lazily the first time their record type is encountered, except
//! for [VECTOR_EAGER] which exists for every Vector file.
use crate::buffer::{ColumnSpec, Group, Kind, Shape};
use crate::record::InertialVariant;

const fn col(
    name: &'static str,
    group: Group,
    kind: Kind,
    shape: Shape,
    units: &'static str,
    divisor: f32,
) -> ColumnSpec {
    ColumnSpec {
        name,
        group,
        kind,
        shape,
        units,
        divisor,
    }
}

/// Allocated for every Vector file at schema initialization.
pub const VECTOR_EAGER: &[ColumnSpec] = &[col(
    "burst_start",
    Group::System,
    Kind::Bool,
    Shape::Scalar,
    "",
    1.0,
)];

pub const VELOCITY: &[ColumnSpec] = &[
    col("anain2_lsb", Group::System, Kind::U8, Shape::Scalar, "", 1.0),
    col("count", Group::System, Kind::U8, Shape::Scalar, "", 1.0),
    col("anain2_msb", Group::System, Kind::U8, Shape::Scalar, "", 1.0),
    col("anain1", Group::System, Kind::U16, Shape::Scalar, "", 1.0),
    col("pressure_msb", Group::Data, Kind::U8, Shape::Scalar, "", 1.0),
    col("pressure_lsw", Group::Data, Kind::U16, Shape::Scalar, "", 1.0),
    col("vel", Group::Data, Kind::F32, Shape::Vector, "m/s", 1000.0),
    col("amp", Group::Data, Kind::U8, Shape::Vector, "counts", 1.0),
    col("corr", Group::Data, Kind::U8, Shape::Vector, "%", 1.0),
];

pub const SYSTEM: &[ColumnSpec] = &[
    col("time", Group::Coords, Kind::F64, Shape::Scalar, "s", 1.0),
    col("batt", Group::System, Kind::F32, Shape::Scalar, "V", 10.0),
    col("error", Group::System, Kind::U8, Shape::Scalar, "", 1.0),
    col("status", Group::System, Kind::U8, Shape::Scalar, "", 1.0),
    col("anain", Group::System, Kind::U16, Shape::Scalar, "", 1.0),
    col("c_sound", Group::Data, Kind::F32, Shape::Scalar, "m/s", 10.0),
    col("heading", Group::Data, Kind::F32, Shape::Scalar, "deg", 10.0),
    col("pitch", Group::Data, Kind::F32, Shape::Scalar, "deg", 10.0),
    col("roll", Group::Data, Kind::F32, Shape::Scalar, "deg", 10.0),
    col("temp", Group::Data, Kind::F32, Shape::Scalar, "deg C", 100.0),
];

pub const PROFILE: &[ColumnSpec] = &[
    col("time", Group::Coords, Kind::F64, Shape::Scalar, "s", 1.0),
    col("error", Group::System, Kind::U16, Shape::Scalar, "", 1.0),
    col("anain1", Group::System, Kind::U16, Shape::Scalar, "", 1.0),
    col("batt", Group::System, Kind::F32, Shape::Scalar, "V", 10.0),
    col("status", Group::System, Kind::U8, Shape::Scalar, "", 1.0),
    col("c_sound", Group::Data, Kind::F32, Shape::Scalar, "m/s", 10.0),
    col("heading", Group::Data, Kind::F32, Shape::Scalar, "deg", 10.0),
    col("pitch", Group::Data, Kind::F32, Shape::Scalar, "deg", 10.0),
    col("roll", Group::Data, Kind::F32, Shape::Scalar, "deg", 10.0),
    col("pressure", Group::Data, Kind::F32, Shape::Scalar, "dbar", 1000.0),
    col("temp", Group::Data, Kind::F32, Shape::Scalar, "deg C", 100.0),
    col("vel", Group::Data, Kind::F32, Shape::Profile, "m/s", 1000.0),
    col("amp", Group::Data, Kind::U8, Shape::Profile, "counts", 1.0),
];

pub const ACCEL: ColumnSpec = col("accel", Group::Data, Kind::F32, Shape::Vector, "m/s^2", 1.0);
pub const ANGRT: ColumnSpec = col("angrt", Group::Data, Kind::F32, Shape::Vector, "rad/s", 1.0);
pub const MAG: ColumnSpec = col("mag", Group::Data, Kind::F32, Shape::Vector, "gauss", 1.0);
pub const ORIENTMAT: ColumnSpec = col("orientmat", Group::Data, Kind::F32, Shape::Matrix, "", 1.0);

/// Per-sample marker of inertial values that are deltas over one sample interval.
/// Consumed by unit conversion and removed from the output.
pub const IMU_DELTA: ColumnSpec = col("imu_delta", Group::System, Kind::Bool, Shape::Scalar, "", 1.0);

/// Columns carried by an inertial sensor sub-type.
#[must_use]
pub fn inertial(variant: InertialVariant) -> Vec<ColumnSpec> {
    let mut specs = vec![ACCEL, ANGRT];
    if variant.has_mag() {
        specs.push(MAG);
    }
    if variant.has_orientmat() {
        specs.push(ORIENTMAT);
    }
    specs
}
