//! 2-D convolution without bias.
//!
//! Slots: `x` (activation, NCHW or NHWC) and `w` (weight). The weight carries
//! exactly the axes `H`, `W` (kernel), `C` (input channels) and `N` (output
//! channels), in any order.
//!
//! ```text
//! H2 = (H + 2*pH - kH) / sH + 1
//! W2 = (W + 2*pW - kW) / sW + 1
//! y  = (N, C2, H2, W2)  in x's layout, C2 = w[N]
//! ```

use crate::error::ApplyError;
use crate::ir::axis::{Axis, ORDER_NCHW};
use crate::ir::ops::{expect_extent, extent, window_output, SpatialLayout};
use crate::ir::param::Window2d;
use crate::ir::shape::Shape;

pub(crate) fn infer(op: &str, window: &Window2d, x: &Shape, w: &Shape) -> Result<Shape, ApplyError> {
    let layout = SpatialLayout::of(op, "x", x.order())?;

    if !w.order().has_axes(ORDER_NCHW) {
        return Err(ApplyError::OrderMismatch {
            op: op.to_owned(),
            slot: "w",
            order: w.order().clone(),
            expected: "a weight order over axes N, C, H, W".to_owned(),
        });
    }
    expect_extent(op, "w", w, Axis::H, window.kh)?;
    expect_extent(op, "w", w, Axis::W, window.kw)?;
    expect_extent(op, "w", w, Axis::C, extent(op, "x", x, Axis::C)?)?;

    let n = extent(op, "x", x, Axis::N)?;
    let c2 = extent(op, "w", w, Axis::N)?;
    let (h2, w2) = window_output(op, window, x)?;
    layout.shape(op, n, c2, h2, w2)
}
