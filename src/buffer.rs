//! Fixed-capacity column storage for decoded samples.
//!
//! The number of samples in a file is not known until it has been read, so columns are
//! allocated at an estimated capacity, written by sample index, and cropped once when
//! decoding ends. Columns are never reallocated while decoding.
use std::collections::BTreeMap;
use std::ops::Range;

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use serde::Serialize;

/// Output group a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Data,
    System,
    Coords,
}

impl Group {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Group::Data => "data",
            Group::System => "system",
            Group::Coords => "coords",
        }
    }
}

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    F64,
    F32,
    U8,
    U16,
    Bool,
}

/// Dimensions preceding the sample axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    /// One value per axis or beam.
    Vector,
    /// 3x3 matrix per sample.
    Matrix,
    /// One value per beam and depth bin.
    Profile,
}

impl Shape {
    fn dims(self, nbins: usize, len: usize) -> Vec<usize> {
        match self {
            Shape::Scalar => vec![len],
            Shape::Vector => vec![3, len],
            Shape::Matrix => vec![3, 3, len],
            Shape::Profile => vec![3, nbins, len],
        }
    }
}

/// Static description of a column: where it lives, how it is stored and how raw values
/// scale to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub group: Group,
    pub kind: Kind,
    pub shape: Shape,
    pub units: &'static str,
    /// Raw values are divided by this to get physical units.
    pub divisor: f32,
}

/// A typed array whose last axis is the sample axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    F64(ArrayD<f64>),
    F32(ArrayD<f32>),
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    Bool(ArrayD<bool>),
}

fn crop_array<T: Clone>(arr: &ArrayD<T>, range: Range<usize>) -> ArrayD<T> {
    let axis = Axis(arr.ndim() - 1);
    arr.slice_axis(axis, Slice::from(range)).to_owned()
}

impl Column {
    /// Allocate a column filled with its sentinel: NaN for floating point, zero or
    /// false otherwise.
    #[must_use]
    pub fn new(kind: Kind, dims: &[usize]) -> Self {
        let dims = IxDyn(dims);
        match kind {
            Kind::F64 => Column::F64(ArrayD::from_elem(dims, f64::NAN)),
            Kind::F32 => Column::F32(ArrayD::from_elem(dims, f32::NAN)),
            Kind::U8 => Column::U8(ArrayD::zeros(dims)),
            Kind::U16 => Column::U16(ArrayD::zeros(dims)),
            Kind::Bool => Column::Bool(ArrayD::from_elem(dims, false)),
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Column::F64(a) => a.shape(),
            Column::F32(a) => a.shape(),
            Column::U8(a) => a.shape(),
            Column::U16(a) => a.shape(),
            Column::Bool(a) => a.shape(),
        }
    }

    /// Length of the last axis.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape().last().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn crop(&mut self, range: Range<usize>) {
        match self {
            Column::F64(a) => *a = crop_array(a, range),
            Column::F32(a) => *a = crop_array(a, range),
            Column::U8(a) => *a = crop_array(a, range),
            Column::U16(a) => *a = crop_array(a, range),
            Column::Bool(a) => *a = crop_array(a, range),
        }
    }

    #[must_use]
    pub fn array<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::array(self)
    }

    /// Raw little-endian bytes of every element, in logical order.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Column::F64(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
            Column::F32(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
            Column::U8(a) => a.iter().copied().collect(),
            Column::U16(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
            Column::Bool(a) => a.iter().map(|v| u8::from(*v)).collect(),
        }
    }
}

/// Types that can be stored in a [Column].
pub trait Element: Copy {
    fn array(col: &Column) -> Option<&ArrayD<Self>>;
    fn array_mut(col: &mut Column) -> Option<&mut ArrayD<Self>>;
}

macro_rules! element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            fn array(col: &Column) -> Option<&ArrayD<Self>> {
                match col {
                    Column::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn array_mut(col: &mut Column) -> Option<&mut ArrayD<Self>> {
                match col {
                    Column::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

element!(f64, F64);
element!(f32, F32);
element!(u8, U8);
element!(u16, U16);
element!(bool, Bool);

/// A named column with its group and units.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub group: Group,
    pub units: &'static str,
    pub column: Column,
    // Whether the last axis is the sample axis
    per_sample: bool,
}

/// Named, grouped columns sharing one sample capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesBuffer {
    capacity: usize,
    nbins: usize,
    columns: BTreeMap<&'static str, Entry>,
}

impl TimeSeriesBuffer {
    #[must_use]
    pub fn new(capacity: usize, nbins: usize) -> Self {
        TimeSeriesBuffer {
            capacity,
            nbins,
            columns: BTreeMap::new(),
        }
    }

    /// Current sample capacity; the actual sample count once cropped.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate any columns in `specs` not already present. Returns the number
    /// allocated.
    pub fn ensure(&mut self, specs: &[ColumnSpec]) -> usize {
        let mut created = 0;
        for spec in specs {
            if self.columns.contains_key(spec.name) {
                continue;
            }
            let dims = spec.shape.dims(self.nbins, self.capacity);
            self.columns.insert(
                spec.name,
                Entry {
                    group: spec.group,
                    units: spec.units,
                    column: Column::new(spec.kind, &dims),
                    per_sample: true,
                },
            );
            created += 1;
        }
        created
    }

    /// Insert a derived per-sample column, replacing any existing one.
    pub fn insert(&mut self, name: &'static str, group: Group, units: &'static str, column: Column) {
        self.columns.insert(
            name,
            Entry {
                group,
                units,
                column,
                per_sample: true,
            },
        );
    }

    /// Insert a column that does not run along the sample axis, e.g., a range
    /// coordinate. It is never cropped.
    pub fn insert_static(&mut self, name: &'static str, group: Group, units: &'static str, column: Column) {
        self.columns.insert(
            name,
            Entry {
                group,
                units,
                column,
                per_sample: false,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        self.columns.remove(name).map(|e| e.column)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.columns.get(name)
    }

    #[must_use]
    pub fn array<T: Element>(&self, name: &str) -> Option<&ArrayD<T>> {
        self.columns.get(name).and_then(|e| T::array(&e.column))
    }

    pub fn array_mut<T: Element>(&mut self, name: &str) -> Option<&mut ArrayD<T>> {
        self.columns.get_mut(name).and_then(|e| T::array_mut(&mut e.column))
    }

    /// Write `value` at `index` of column `name`, the last index being the sample. Writes
    /// to missing columns, mismatched types or out-of-range indexes are dropped.
    pub fn put<T: Element>(&mut self, name: &str, index: &[usize], value: T) {
        if let Some(slot) = self.array_mut::<T>(name).and_then(|a| a.get_mut(index)) {
            *slot = value;
        }
    }

    /// Iterate columns as (name, entry) in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Entry)> {
        self.columns.iter().map(|(name, entry)| (*name, entry))
    }

    /// Crop every per-sample column to `range` along the sample axis. Columns whose
    /// sample axis does not equal the current capacity are left untouched.
    pub fn crop(&mut self, range: Range<usize>) {
        let end = range.end.min(self.capacity);
        let range = range.start.min(end)..end;
        for entry in self.columns.values_mut() {
            if entry.per_sample && entry.column.len() == self.capacity {
                entry.column.crop(range.clone());
            }
        }
        self.capacity = range.len();
    }
}

/// Estimate the maximum number of samples in a file of `file_size` bytes whose
/// spacing-measurement records are `spacing` bytes apart on average, with `multiplier`
/// samples per such record.
#[must_use]
pub fn estimate_capacity(file_size: u64, spacing: f64, multiplier: usize) -> usize {
    let records = if spacing > 0.0 {
        (file_size as f64 / spacing) as usize
    } else {
        file_size as usize
    };
    (records + 1) * multiplier.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ColumnSpec] = &[
        ColumnSpec {
            name: "vel",
            group: Group::Data,
            kind: Kind::F32,
            shape: Shape::Vector,
            units: "m/s",
            divisor: 1000.0,
        },
        ColumnSpec {
            name: "count",
            group: Group::System,
            kind: Kind::U8,
            shape: Shape::Scalar,
            units: "",
            divisor: 1.0,
        },
        ColumnSpec {
            name: "amp",
            group: Group::Data,
            kind: Kind::U8,
            shape: Shape::Profile,
            units: "counts",
            divisor: 1.0,
        },
    ];

    #[test]
    fn columns_are_allocated_with_sentinels() {
        let mut buf = TimeSeriesBuffer::new(10, 4);
        assert_eq!(buf.ensure(SPECS), 3);
        assert_eq!(buf.ensure(SPECS), 0, "existing columns are not reallocated");

        let vel = buf.array::<f32>("vel").unwrap();
        assert_eq!(vel.shape(), &[3, 10]);
        assert!(vel.iter().all(|v| v.is_nan()));

        let count = buf.array::<u8>("count").unwrap();
        assert_eq!(count.shape(), &[10]);
        assert!(count.iter().all(|v| *v == 0));

        assert_eq!(buf.array::<u8>("amp").unwrap().shape(), &[3, 4, 10]);
        assert!(buf.array::<f32>("count").is_none(), "wrong element type");
    }

    #[test]
    fn put_and_crop() {
        let mut buf = TimeSeriesBuffer::new(10, 1);
        buf.ensure(SPECS);
        buf.insert_static(
            "range",
            Group::Coords,
            "m",
            Column::F32(ArrayD::zeros(IxDyn(&[10]))),
        );
        for i in 0..4 {
            buf.put("vel", &[1, i], i as f32);
            buf.put("count", &[i], i as u8);
        }
        // out of range and missing columns are ignored
        buf.put("count", &[10], 1u8);
        buf.put("missing", &[0], 1u8);

        buf.crop(0..4);
        assert_eq!(buf.capacity(), 4);
        let vel = buf.array::<f32>("vel").unwrap();
        assert_eq!(vel.shape(), &[3, 4]);
        assert_eq!(vel[[1, 3].as_slice()], 3.0);
        assert!(vel[[0, 0].as_slice()].is_nan());
        assert_eq!(
            buf.array::<u8>("count").unwrap().as_slice().unwrap(),
            &[0, 1, 2, 3]
        );
        assert_eq!(buf.array::<f32>("range").unwrap().len(), 10);

        buf.crop(1..3);
        assert_eq!(
            buf.array::<u8>("count").unwrap().as_slice().unwrap(),
            &[1, 2]
        );
    }

    #[test]
    fn capacity_estimate() {
        assert_eq!(estimate_capacity(1000, 100.0, 1), 11);
        assert_eq!(estimate_capacity(1000, 100.0, 16), 176);
        assert_eq!(estimate_capacity(1050, 100.0, 0), 11);
    }
}
