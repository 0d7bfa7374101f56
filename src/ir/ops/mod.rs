//! Per-family shape-inference rules.
//!
//! Each module exposes an `infer` function taking the operator name (for
//! diagnostics), the validated parameters, and the input shapes in slot
//! order. Rules only read shapes; allocation and wiring belong to the graph.

pub mod axiswise;
pub mod conv2d;
pub mod elementwise;
pub mod linear;
pub mod pooling;
pub mod reduce;

use crate::error::{ApplyError, ShapeError};
use crate::ir::axis::{Axis, AxisOrder, ORDER_NCHW, ORDER_NHWC};
use crate::ir::param::Window2d;
use crate::ir::shape::Shape;

/// The two activation layouts accepted by spatial operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpatialLayout {
    Nchw,
    Nhwc,
}

impl SpatialLayout {
    pub(crate) fn of(op: &str, slot: &'static str, order: &AxisOrder) -> Result<Self, ApplyError> {
        if order.is(ORDER_NCHW) {
            Ok(SpatialLayout::Nchw)
        } else if order.is(ORDER_NHWC) {
            Ok(SpatialLayout::Nhwc)
        } else {
            Err(ApplyError::UnsupportedLayout {
                op: op.to_owned(),
                slot,
                order: order.clone(),
            })
        }
    }

    pub(crate) fn order(self) -> AxisOrder {
        match self {
            SpatialLayout::Nchw => AxisOrder::nchw(),
            SpatialLayout::Nhwc => AxisOrder::nhwc(),
        }
    }

    pub(crate) fn shape(self, op: &str, n: usize, c: usize, h: usize, w: usize) -> Result<Shape, ApplyError> {
        let dims = match self {
            SpatialLayout::Nchw => [n, c, h, w],
            SpatialLayout::Nhwc => [n, h, w, c],
        };
        Shape::new(self.order(), &dims).map_err(|e| invalid_shape(op, e))
    }
}

/// Extent of `axis` in `shape`, or `AxisNotPresent` naming `slot`.
pub(crate) fn extent(op: &str, slot: &'static str, shape: &Shape, axis: Axis) -> Result<usize, ApplyError> {
    shape.get(axis).ok_or_else(|| ApplyError::AxisNotPresent {
        op: op.to_owned(),
        slot,
        axis,
        order: shape.order().clone(),
    })
}

/// Fails with `ShapeMismatch` unless `slot`'s extent on `axis` equals `expected`.
pub(crate) fn expect_extent(
    op: &str,
    slot: &'static str,
    shape: &Shape,
    axis: Axis,
    expected: usize,
) -> Result<(), ApplyError> {
    let got = extent(op, slot, shape, axis)?;
    if got != expected {
        return Err(ApplyError::ShapeMismatch {
            op: op.to_owned(),
            slot,
            axis,
            expected,
            got,
        });
    }
    Ok(())
}

/// Output spatial extents `(H2, W2)` of a sliding window over `x`.
pub(crate) fn window_output(op: &str, window: &Window2d, x: &Shape) -> Result<(usize, usize), ApplyError> {
    let h = extent(op, "x", x, Axis::H)?;
    let w = extent(op, "x", x, Axis::W)?;
    let h2 = window_axis(op, Axis::H, h, window.kh, window.sh, window.ph)?;
    let w2 = window_axis(op, Axis::W, w, window.kw, window.sw, window.pw)?;
    Ok((h2, w2))
}

fn window_axis(
    op: &str,
    axis: Axis,
    size: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> Result<usize, ApplyError> {
    let padded = Window2d::padded_extent(size, padding).ok_or_else(|| ApplyError::ExtentOverflow {
        op: op.to_owned(),
        axis,
        extent: size,
        padding,
    })?;
    padded
        .checked_sub(kernel)
        .map(|span| span / stride + 1)
        .ok_or_else(|| ApplyError::WindowTooLarge {
            op: op.to_owned(),
            axis,
            extent: size,
            kernel,
            padding,
        })
}

pub(crate) fn invalid_shape(op: &str, source: ShapeError) -> ApplyError {
    ApplyError::InvalidShape {
        op: op.to_owned(),
        source,
    }
}
