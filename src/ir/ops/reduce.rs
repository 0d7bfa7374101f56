//! Shape rule shared by the whole reduce family (ArgMin, ArgMax, Sum, ...).
//!
//! The reduced axis disappears from both the extents and the order; every
//! other axis keeps its extent and relative position. The reduction kind is
//! never consulted here.

use crate::error::{ApplyError, ShapeError};
use crate::ir::axis::Axis;
use crate::ir::ops::{extent, invalid_shape};
use crate::ir::shape::Shape;

pub(crate) fn infer(op: &str, axis: Axis, x: &Shape) -> Result<Shape, ApplyError> {
    extent(op, "x", x, axis)?;
    x.without_axis(axis).map_err(|e| match e {
        ShapeError::EmptyOrder => ApplyError::OrderMismatch {
            op: op.to_owned(),
            slot: "x",
            order: x.order().clone(),
            expected: "an order with at least two axes".to_owned(),
        },
        other => invalid_shape(op, other),
    })
}
