use crate::error::ApplyError;
use crate::ir::ops::expect_extent;
use crate::ir::shape::Shape;

/// Activations: the output has exactly the input's shape.
pub(crate) fn infer_unary(x: &Shape) -> Shape {
    x.clone()
}

/// Elementwise sum of two tensors with identical layout and extents.
pub(crate) fn infer_sum(op: &str, x0: &Shape, x1: &Shape) -> Result<Shape, ApplyError> {
    if x0.order() != x1.order() {
        return Err(ApplyError::OrderMismatch {
            op: op.to_owned(),
            slot: "x1",
            order: x1.order().clone(),
            expected: format!("the order of slot 'x0' ({})", x0.order()),
        });
    }
    for (axis, extent) in x0.iter() {
        expect_extent(op, "x1", x1, axis, extent)?;
    }
    Ok(x0.clone())
}
