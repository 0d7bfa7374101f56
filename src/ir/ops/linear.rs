//! Fully-connected layer without bias: `x` is `NC`, `w` holds `C` (in) and
//! `N` (out), output is `NC` with `(x[N], w[N])`.

use crate::error::ApplyError;
use crate::ir::axis::{Axis, AxisOrder, ORDER_NC};
use crate::ir::ops::{expect_extent, extent, invalid_shape};
use crate::ir::shape::Shape;

pub(crate) fn infer(op: &str, x: &Shape, w: &Shape) -> Result<Shape, ApplyError> {
    if !x.order().is(ORDER_NC) {
        return Err(ApplyError::UnsupportedLayout {
            op: op.to_owned(),
            slot: "x",
            order: x.order().clone(),
        });
    }
    if !w.order().has_axes(ORDER_NC) {
        return Err(ApplyError::OrderMismatch {
            op: op.to_owned(),
            slot: "w",
            order: w.order().clone(),
            expected: "a weight order over axes C, N".to_owned(),
        });
    }
    expect_extent(op, "w", w, Axis::C, extent(op, "x", x, Axis::C)?)?;

    let n = extent(op, "x", x, Axis::N)?;
    let c2 = extent(op, "w", w, Axis::N)?;
    Shape::new(AxisOrder::nc(), &[n, c2]).map_err(|e| invalid_shape(op, e))
}
