//! transpile-ir: a typed computation-graph IR for neural-network transpilers.
//!
//! Construction pipeline:
//!
//! ```text
//! ParamRecord → Operator::construct → [Operator]
//!   → Graph::apply (validate + infer shapes) → [Graph] → GraphPassManager
//!   → MemoryLayout / printer → backend
//! ```
//!
//! Every tensor carries an explicit [`AxisOrder`](ir::AxisOrder) naming its
//! axes, so rules such as "the weight's input-channel extent matches the
//! input's channel extent" hold regardless of how each tensor is laid out in
//! memory.
//!
//! ```
//! use transpile_ir::ir::{AxisOrder, Graph, Operator, Shape, Window2d};
//!
//! let mut graph = Graph::new("net");
//! let x = graph.add_input("x", Shape::new(AxisOrder::nchw(), &[1, 3, 32, 32])?)?;
//! let w = graph.add_constant("w", Shape::new(AxisOrder::hwcn(), &[3, 3, 3, 16])?)?;
//! let conv = Operator::convolution2d("conv1", Window2d::new((3, 3), (1, 1), (1, 1)))?;
//! let y = graph.apply_one(conv, &[x, w])?;
//! assert_eq!(graph.variable(y).unwrap().shape().dims(), &[1, 16, 32, 32]);
//! # Ok::<(), transpile_ir::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod ir;
pub mod memory;
pub mod pass;
pub mod printer;

pub use config::GraphOptions;
pub use error::{Error, Result};
pub use memory::{Allocation, MemoryLayout};
pub use printer::emit_graph_text;

use crate::ir::graph::Graph;
use crate::pass::{GraphPassManager, ValidatePass};

/// Runs [`ValidatePass`] over `graph`.
///
/// Convenience for frontends that want the check without assembling a
/// pass manager of their own.
pub fn validate(graph: &mut Graph) -> Result<()> {
    let mut manager = GraphPassManager::new();
    manager.add_pass(ValidatePass);
    manager.run(graph).map_err(Error::from)
}
