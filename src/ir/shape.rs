//! Concrete tensor shapes keyed by axis.
//!
//! A `Shape` pairs an [`AxisOrder`] with one positive extent per axis of that
//! order. Lookups go through the order's position table, so `shape.get(axis)`
//! is O(1) regardless of layout.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShapeError;
use crate::ir::axis::{Axis, AxisOrder};

/// Extents keyed by axis, tied to one layout.
///
/// Invariants:
/// - `dims.len() == order.rank()`
/// - every extent is `> 0`
/// - the product of the extents fits in `usize`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawShape", into = "RawShape")]
pub struct Shape {
    order: AxisOrder,
    dims: Vec<usize>,
}

#[derive(Serialize, Deserialize)]
struct RawShape {
    order: AxisOrder,
    dims: Vec<usize>,
}

impl Shape {
    /// Positional constructor: `dims[i]` is the extent of `order.axes()[i]`.
    pub fn new(order: AxisOrder, dims: &[usize]) -> Result<Self, ShapeError> {
        if dims.len() != order.rank() {
            return Err(ShapeError::RankMismatch {
                expected: order.rank(),
                got: dims.len(),
                order,
            });
        }
        if let Some(pos) = dims.iter().position(|d| *d == 0) {
            return Err(ShapeError::ZeroExtent {
                axis: order.axes()[pos],
            });
        }
        if dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d)).is_none() {
            return Err(ShapeError::SizeOverflow { order });
        }
        Ok(Self {
            order,
            dims: dims.to_vec(),
        })
    }

    /// Keyed constructor: one `(axis, extent)` pair per axis of `order`, in any order.
    pub fn from_map(order: AxisOrder, extents: &[(Axis, usize)]) -> Result<Self, ShapeError> {
        let mut dims: Vec<Option<usize>> = vec![None; order.rank()];
        for &(axis, extent) in extents {
            let pos = order.position(axis).ok_or_else(|| ShapeError::UnexpectedAxis {
                axis,
                order: order.clone(),
            })?;
            if dims[pos].replace(extent).is_some() {
                return Err(ShapeError::DuplicateAxis { axis });
            }
        }
        let dims = order
            .iter()
            .zip(dims)
            .map(|(axis, d)| {
                d.ok_or_else(|| ShapeError::MissingAxis {
                    axis,
                    order: order.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Shape::new(order, &dims)
    }

    pub fn order(&self) -> &AxisOrder {
        &self.order
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Extent of `axis`, or `None` if the axis is not part of this layout.
    pub fn get(&self, axis: Axis) -> Option<usize> {
        self.order.position(axis).map(|pos| self.dims[pos])
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.order.contains(axis)
    }

    /// Total element count. Cannot overflow: `new` rejects shapes whose
    /// product does not fit.
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// `(axis, extent)` pairs in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, usize)> + '_ {
        self.order.iter().zip(self.dims.iter().copied())
    }

    /// This shape with `axis` removed from both the order and the extents.
    pub fn without_axis(&self, axis: Axis) -> Result<Shape, ShapeError> {
        let order = self.order.without(axis)?;
        let dims: Vec<usize> = self.iter().filter(|(a, _)| *a != axis).map(|(_, d)| d).collect();
        Shape::new(order, &dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (axis, extent)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", axis, extent)?;
        }
        write!(f, "}}")
    }
}

impl TryFrom<RawShape> for Shape {
    type Error = ShapeError;

    fn try_from(raw: RawShape) -> Result<Self, Self::Error> {
        Shape::new(raw.order, &raw.dims)
    }
}

impl From<Shape> for RawShape {
    fn from(shape: Shape) -> Self {
        RawShape {
            order: shape.order,
            dims: shape.dims,
        }
    }
}
