//! Axiswise bias / scale: `b` is a one-axis vector broadcast along `axis` of
//! `x`. Works in any layout; the output shape is `x`'s.

use crate::error::ApplyError;
use crate::ir::axis::Axis;
use crate::ir::ops::{expect_extent, extent};
use crate::ir::shape::Shape;

pub(crate) fn infer(op: &str, axis: Axis, x: &Shape, b: &Shape) -> Result<Shape, ApplyError> {
    let expected = extent(op, "x", x, axis)?;
    if !b.order().is(&[axis]) {
        return Err(ApplyError::OrderMismatch {
            op: op.to_owned(),
            slot: "b",
            order: b.order().clone(),
            expected: format!("the single-axis order {}", axis),
        });
    }
    expect_extent(op, "b", b, axis, expected)?;
    Ok(x.clone())
}
