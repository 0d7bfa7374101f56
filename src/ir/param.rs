//! Operator parameter records.
//!
//! Frontends describe operator parameters with a loosely-typed [`ParamRecord`]
//! (`key = value` pairs, serializable to JSON). Construction validates the
//! record exhaustively into a typed per-kind record such as [`Window2d`];
//! [`RecordReader`] is the helper every kind uses for that.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConstructError;
use crate::ir::axis::Axis;

/// A literal parameter value.
///
/// Serialized untagged: `3`, `[3, 3]`, `"H"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Pair(i64, i64),
    Axis(Axis),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "integer",
            ParamValue::Pair(..) => "pair",
            ParamValue::Axis(_) => "axis",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Pair(a, b) => write!(f, "({}, {})", a, b),
            ParamValue::Axis(a) => write!(f, "{}", a),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<(i64, i64)> for ParamValue {
    fn from((a, b): (i64, i64)) -> Self {
        ParamValue::Pair(a, b)
    }
}

impl From<Axis> for ParamValue {
    fn from(a: Axis) -> Self {
        ParamValue::Axis(a)
    }
}

/// Named parameter values, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamRecord {
    entries: BTreeMap<String, ParamValue>,
}

impl ParamRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for ParamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Record validation
// ---------------------------------------------------------------------------

/// Reads typed fields out of a [`ParamRecord`], remembering which keys were
/// consumed so that leftovers can be reported by [`RecordReader::finish`].
pub(crate) struct RecordReader<'a> {
    op: &'a str,
    record: &'a ParamRecord,
    consumed: Vec<&'static str>,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(op: &'a str, record: &'a ParamRecord) -> Self {
        Self {
            op,
            record,
            consumed: Vec::new(),
        }
    }

    fn require(&mut self, field: &'static str) -> Result<&'a ParamValue, ConstructError> {
        self.consumed.push(field);
        self.record
            .get(field)
            .ok_or_else(|| ConstructError::MissingParameter {
                op: self.op.to_owned(),
                field: field.to_owned(),
            })
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> ConstructError {
        ConstructError::InvalidParameter {
            op: self.op.to_owned(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    /// A non-negative integer pair. A scalar integer broadcasts to `(v, v)`.
    pub(crate) fn pair(&mut self, field: &'static str) -> Result<(usize, usize), ConstructError> {
        let (a, b) = match *self.require(field)? {
            ParamValue::Int(v) => (v, v),
            ParamValue::Pair(a, b) => (a, b),
            other => {
                return Err(self.invalid(
                    field,
                    format!("expected an integer pair, found {}", other.type_name()),
                ))
            }
        };
        let convert = |v: i64| {
            usize::try_from(v).map_err(|_| self.invalid(field, format!("component {} must not be negative", v)))
        };
        Ok((convert(a)?, convert(b)?))
    }

    pub(crate) fn axis(&mut self, field: &'static str) -> Result<Axis, ConstructError> {
        match *self.require(field)? {
            ParamValue::Axis(axis) => Ok(axis),
            other => Err(self.invalid(
                field,
                format!("expected an axis, found {}", other.type_name()),
            )),
        }
    }

    /// Rejects any key that no accessor asked for.
    pub(crate) fn finish(self) -> Result<(), ConstructError> {
        match self
            .record
            .iter()
            .find(|(k, _)| !self.consumed.iter().any(|c| c == k))
        {
            Some((key, _)) => Err(self.invalid(key, "unknown parameter")),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Window2d
// ---------------------------------------------------------------------------

/// Sliding-window parameters shared by 2-D convolution and pooling.
///
/// Components are stored as plain fields; `(kh, kw)` is the kernel size,
/// `(sh, sw)` the stride and `(ph, pw)` the zero padding on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window2d {
    pub kh: usize,
    pub kw: usize,
    pub sh: usize,
    pub sw: usize,
    pub ph: usize,
    pub pw: usize,
}

impl Window2d {
    pub fn new(ksize: (usize, usize), stride: (usize, usize), padding: (usize, usize)) -> Self {
        Self {
            kh: ksize.0,
            kw: ksize.1,
            sh: stride.0,
            sw: stride.1,
            ph: padding.0,
            pw: padding.1,
        }
    }

    pub fn ksize(&self) -> (usize, usize) {
        (self.kh, self.kw)
    }

    pub fn stride(&self) -> (usize, usize) {
        (self.sh, self.sw)
    }

    pub fn padding(&self) -> (usize, usize) {
        (self.ph, self.pw)
    }

    pub(crate) fn validate(&self, op: &str) -> Result<(), ConstructError> {
        let invalid = |field: &str, reason: &str| ConstructError::InvalidParameter {
            op: op.to_owned(),
            field: field.to_owned(),
            reason: reason.to_owned(),
        };
        if self.kh == 0 || self.kw == 0 {
            return Err(invalid("ksize", "kernel size components must be >= 1"));
        }
        if self.sh == 0 || self.sw == 0 {
            return Err(invalid("stride", "stride components must be >= 1"));
        }
        Ok(())
    }

    pub(crate) fn read(reader: &mut RecordReader<'_>, op: &str) -> Result<Self, ConstructError> {
        let ksize = reader.pair("ksize")?;
        let stride = reader.pair("stride")?;
        let padding = reader.pair("padding")?;
        let window = Window2d::new(ksize, stride, padding);
        window.validate(op)?;
        Ok(window)
    }

    pub(crate) fn write(&self, record: &mut ParamRecord) {
        record.insert("ksize", (self.kh as i64, self.kw as i64));
        record.insert("stride", (self.sh as i64, self.sw as i64));
        record.insert("padding", (self.ph as i64, self.pw as i64));
    }

    /// `extent + 2 * padding`, or `None` if that does not fit in `usize`.
    pub fn padded_extent(extent: usize, padding: usize) -> Option<usize> {
        padding.checked_mul(2)?.checked_add(extent)
    }

    /// `floor((extent + 2 * padding - kernel) / stride) + 1`, or `None` when the
    /// padded extent overflows or the kernel does not fit inside it.
    pub fn output_extent(extent: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
        Self::padded_extent(extent, padding)?
            .checked_sub(kernel)
            .map(|span| span / stride + 1)
    }
}
