//! Weight memory layout over a graph's constants.

use transpile_ir::error::LayoutError;
use transpile_ir::ir::{Axis, AxisOrder, Graph, Operator, Shape, Window2d};
use transpile_ir::{Error, MemoryLayout};

fn conv_block() -> Graph {
    let mut graph = Graph::new("block");
    let x = graph
        .add_input("x", Shape::new(AxisOrder::nchw(), &[1, 3, 8, 8]).unwrap())
        .unwrap();
    let w = graph
        .add_constant("w", Shape::new(AxisOrder::hwcn(), &[3, 3, 3, 16]).unwrap())
        .unwrap();
    let b = graph
        .add_constant("b", Shape::new(AxisOrder::c(), &[16]).unwrap())
        .unwrap();
    let conv = Operator::convolution2d("conv", Window2d::new((3, 3), (1, 1), (1, 1))).unwrap();
    let h = graph.apply_one(conv, &[x, w]).unwrap();
    let y = graph.apply_one(Operator::axiswise_bias("bias", Axis::C).unwrap(), &[h, b]).unwrap();
    graph.mark_output(y).unwrap();
    graph
}

#[test]
fn test_constants_packed_in_creation_order() {
    let layout = MemoryLayout::for_constants(&conv_block()).unwrap();
    assert_eq!(layout.len(), 2);
    assert_eq!(layout.total_size, 3 * 3 * 3 * 16 + 16);

    let w = layout.get("w").unwrap();
    assert_eq!((w.offset, w.size), (0, 432));
    let b = layout.get("b").unwrap();
    assert_eq!((b.offset, b.size), (432, 16));
    assert!(layout.get("x").is_none());
}

#[test]
fn test_allocations_are_contiguous_and_disjoint() {
    let mut graph = Graph::new("many");
    for (i, c) in [4usize, 1, 7, 2, 9].into_iter().enumerate() {
        graph
            .add_constant(format!("k{}", i), Shape::new(AxisOrder::nc(), &[3, c]).unwrap())
            .unwrap();
    }
    let layout = MemoryLayout::for_constants(&graph).unwrap();
    let mut next = 0;
    for allocation in layout.by_offset() {
        assert_eq!(allocation.offset, next, "{}", allocation.name);
        next = allocation.end();
    }
    assert_eq!(next, layout.total_size);
}

#[test]
fn test_layout_json() {
    let layout = MemoryLayout::for_constants(&conv_block()).unwrap();
    let json = serde_json::to_value(&layout).unwrap();
    assert_eq!(json["total_size"], 448);
    assert_eq!(json["allocations"]["b"]["offset"], 432);
    let back: MemoryLayout = serde_json::from_value(json).unwrap();
    assert_eq!(back, layout);
}

#[test]
fn test_empty_graph_has_empty_layout() {
    let layout = MemoryLayout::for_constants(&Graph::new("empty")).unwrap();
    assert!(layout.is_empty());
    assert_eq!(layout.total_size, 0);
}

#[test]
fn test_total_size_overflow_is_an_error() {
    // Each constant alone fits in usize; the packed buffer does not.
    let quarter = 1usize << (usize::BITS - 2);
    let mut graph = Graph::new("huge");
    for name in ["k0", "k1", "k2", "k3"] {
        graph
            .add_constant(name, Shape::new(AxisOrder::nc(), &[quarter, 1]).unwrap())
            .unwrap();
    }
    let err = MemoryLayout::for_constants(&graph).unwrap_err();
    assert_eq!(
        err,
        LayoutError::SizeOverflow {
            graph: "huge".to_owned(),
            name: "k3".to_owned(),
        }
    );
    let err: Error = err.into();
    assert_eq!(err.diagnostic_code(), "E0600");
    assert!(err.to_string().starts_with("[layout error]"), "{}", err);
}
