//! 2-D max / average pooling.
//!
//! Same window arithmetic as convolution; channel and batch extents pass
//! through unchanged and the output keeps the input's layout.

use crate::error::ApplyError;
use crate::ir::axis::Axis;
use crate::ir::ops::{extent, window_output, SpatialLayout};
use crate::ir::param::Window2d;
use crate::ir::shape::Shape;

pub(crate) fn infer(op: &str, window: &Window2d, x: &Shape) -> Result<Shape, ApplyError> {
    let layout = SpatialLayout::of(op, "x", x.order())?;
    let n = extent(op, "x", x, Axis::N)?;
    let c = extent(op, "x", x, Axis::C)?;
    let (h2, w2) = window_output(op, window, x)?;
    layout.shape(op, n, c, h2, w2)
}
