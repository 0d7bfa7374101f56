//! Convolution2D: output-shape arithmetic, weight validation and layout
//! handling, exercised through `Graph::apply`.

use transpile_ir::error::ApplyError;
use transpile_ir::ir::{Axis, AxisOrder, Graph, OpKind, Operator, ParamRecord, Shape, Window2d};

fn shape(order: AxisOrder, dims: &[usize]) -> Shape {
    Shape::new(order, dims).unwrap()
}

fn conv(name: &str, k: usize, s: usize, p: usize) -> Operator {
    Operator::convolution2d(name, Window2d::new((k, k), (s, s), (p, p))).unwrap()
}

/// Builds `x` (NCHW) and `w` (HWCN) and applies one convolution.
fn apply_conv(op: Operator, x: &[usize], w: &[usize]) -> (Graph, Result<Vec<transpile_ir::ir::VariableId>, ApplyError>) {
    let mut graph = Graph::new("conv");
    let xv = graph.add_input("x", shape(AxisOrder::nchw(), x)).unwrap();
    let wv = graph.add_constant("w", shape(AxisOrder::hwcn(), w)).unwrap();
    let result = graph.apply(op, &[xv, wv]);
    (graph, result)
}

// ---------------------------------------------------------------------------
// Output shapes
// ---------------------------------------------------------------------------

#[test]
fn test_same_padding_keeps_spatial_extent() {
    let (graph, result) = apply_conv(conv("conv1", 3, 1, 1), &[1, 3, 32, 32], &[3, 3, 3, 16]);
    let outputs = result.unwrap();
    assert_eq!(outputs.len(), 1);
    let y = graph.variable(outputs[0]).unwrap();
    assert_eq!(y.order(), &AxisOrder::nchw());
    assert_eq!(y.shape().get(Axis::N), Some(1));
    assert_eq!(y.shape().get(Axis::C), Some(16));
    assert_eq!(y.shape().get(Axis::H), Some(32));
    assert_eq!(y.shape().get(Axis::W), Some(32));
}

#[test]
fn test_strided_valid_convolution() {
    let (graph, result) = apply_conv(conv("conv1", 3, 2, 0), &[1, 3, 32, 32], &[3, 3, 3, 16]);
    let y = graph.variable(result.unwrap()[0]).unwrap();
    assert_eq!(y.shape().get(Axis::H), Some(15));
    assert_eq!(y.shape().get(Axis::W), Some(15));
}

#[test]
fn test_output_extent_formula_over_grid() {
    for h in [1usize, 2, 5, 8, 13] {
        for k in 1usize..=4 {
            for s in 1usize..=3 {
                for p in 0usize..=2 {
                    let op = Operator::convolution2d("c", Window2d::new((k, 1), (s, 1), (p, 0))).unwrap();
                    let (graph, result) = apply_conv(op, &[2, 3, h, 7], &[k, 1, 3, 5]);
                    if h + 2 * p < k {
                        let err = result.unwrap_err();
                        assert!(matches!(err, ApplyError::WindowTooLarge { axis: Axis::H, .. }), "{}", err);
                        assert!(err.is_shape_mismatch());
                        continue;
                    }
                    let y = graph.variable(result.unwrap()[0]).unwrap();
                    assert_eq!(y.shape().get(Axis::H), Some((h + 2 * p - k) / s + 1), "h={h} k={k} s={s} p={p}");
                    assert_eq!(y.shape().get(Axis::W), Some(7));
                    assert_eq!(y.shape().get(Axis::N), Some(2));
                    assert_eq!(y.shape().get(Axis::C), Some(5));
                }
            }
        }
    }
}

#[test]
fn test_asymmetric_window() {
    let op = Operator::convolution2d("c", Window2d::new((3, 5), (1, 2), (1, 0))).unwrap();
    let (graph, result) = apply_conv(op, &[1, 4, 10, 11], &[3, 5, 4, 8]);
    let y = graph.variable(result.unwrap()[0]).unwrap();
    assert_eq!(y.shape().dims(), &[1, 8, 10, 4]);
}

#[test]
fn test_nhwc_input_keeps_layout() {
    let mut graph = Graph::new("conv");
    let x = graph.add_input("x", shape(AxisOrder::nhwc(), &[2, 28, 28, 1])).unwrap();
    let w = graph.add_constant("w", shape(AxisOrder::nchw(), &[6, 1, 5, 5])).unwrap();
    let y = graph.apply_one(conv("c", 5, 1, 0), &[x, w]).unwrap();
    let y = graph.variable(y).unwrap();
    assert_eq!(y.order(), &AxisOrder::nhwc());
    assert_eq!(y.shape().dims(), &[2, 24, 24, 6]);
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn test_channel_mismatch_names_weight_and_axis() {
    let (graph, result) = apply_conv(conv("conv1", 3, 1, 1), &[1, 3, 32, 32], &[3, 3, 4, 16]);
    match result.unwrap_err() {
        ApplyError::ShapeMismatch { op, slot, axis, expected, got } => {
            assert_eq!(op, "conv1");
            assert_eq!(slot, "w");
            assert_eq!(axis, Axis::C);
            assert_eq!(expected, 3);
            assert_eq!(got, 4);
        }
        other => panic!("expected ShapeMismatch, got {:?}", other),
    }
    // Nothing was created.
    assert_eq!(graph.variables().len(), 2);
    assert!(graph.operators().is_empty());
    assert!(graph.operator_by_name("conv1").is_none());
}

#[test]
fn test_kernel_extent_mismatch() {
    let (_, result) = apply_conv(conv("conv1", 3, 1, 1), &[1, 3, 32, 32], &[5, 5, 3, 16]);
    assert!(matches!(
        result.unwrap_err(),
        ApplyError::ShapeMismatch { slot: "w", axis: Axis::H, expected: 3, got: 5, .. }
    ));
}

#[test]
fn test_unsupported_input_layout() {
    let mut graph = Graph::new("conv");
    let x = graph.add_input("x", shape(AxisOrder::cnhw(), &[3, 1, 32, 32])).unwrap();
    let w = graph.add_constant("w", shape(AxisOrder::hwcn(), &[3, 3, 3, 16])).unwrap();
    let err = graph.apply(conv("conv1", 3, 1, 1), &[x, w]).unwrap_err();
    assert!(matches!(err, ApplyError::UnsupportedLayout { slot: "x", .. }), "{}", err);
    assert!(graph.operators().is_empty());
}

#[test]
fn test_weight_with_wrong_axes() {
    let mut graph = Graph::new("conv");
    let x = graph.add_input("x", shape(AxisOrder::nchw(), &[1, 3, 8, 8])).unwrap();
    let w = graph.add_constant("w", shape(AxisOrder::nc(), &[16, 3])).unwrap();
    let err = graph.apply(conv("conv1", 1, 1, 0), &[x, w]).unwrap_err();
    assert!(matches!(err, ApplyError::OrderMismatch { slot: "w", .. }), "{}", err);
}

#[test]
fn test_wrong_arity() {
    let mut graph = Graph::new("conv");
    let x = graph.add_input("x", shape(AxisOrder::nchw(), &[1, 3, 8, 8])).unwrap();
    let err = graph.apply(conv("conv1", 1, 1, 0), &[x]).unwrap_err();
    assert!(matches!(err, ApplyError::ArityMismatch { expected: 2, got: 1, .. }));
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[test]
fn test_scalar_parameters_broadcast() {
    let record = ParamRecord::new()
        .with("ksize", 3i64)
        .with("stride", 2i64)
        .with("padding", 1i64);
    let op = Operator::construct("conv1", OpKind::Convolution2D, &record).unwrap();
    let expected = Window2d::new((3, 3), (2, 2), (1, 1));
    assert_eq!(op.params(), &transpile_ir::ir::OpParams::Convolution2D(expected));
}

#[test]
fn test_missing_and_invalid_parameters() {
    let record = ParamRecord::new().with("ksize", 3i64).with("stride", 1i64);
    let err = Operator::construct("conv1", OpKind::Convolution2D, &record).unwrap_err();
    assert_eq!(err.field(), Some("padding"));

    let record = ParamRecord::new()
        .with("ksize", (3i64, 0i64))
        .with("stride", 1i64)
        .with("padding", 0i64);
    let err = Operator::construct("conv1", OpKind::Convolution2D, &record).unwrap_err();
    assert_eq!(err.field(), Some("ksize"));

    let record = ParamRecord::new()
        .with("ksize", 3i64)
        .with("stride", 0i64)
        .with("padding", 0i64);
    let err = Operator::construct("conv1", OpKind::Convolution2D, &record).unwrap_err();
    assert_eq!(err.field(), Some("stride"));
}
