//! Text emission for `Graph`.
//!
//! Output format (deterministic, operators in topological order):
//!
//! ```text
//! // graph: net
//!
//! graph net {
//!   input x: NCHW {N:1, C:3, H:32, W:32}
//!   const w: HWCN {H:3, W:3, C:3, N:16}
//!
//!   conv1 = Convolution2D(x=x, w=w) { ksize=(3, 3), padding=(1, 1), stride=(1, 1) }
//!     -> y=%v2: NCHW {N:1, C:16, H:32, W:32}
//!
//!   output %v2
//! }
//! ```

use std::fmt::{self, Write};

use crate::ir::graph::Graph;
use crate::ir::operator::OperatorNode;
use crate::ir::variable::{Variable, VariableId};

pub fn emit_graph_text(graph: &Graph) -> String {
    graph.to_string()
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// graph: {}", self.name)?;
        writeln!(f)?;
        writeln!(f, "graph {} {{", self.name)?;

        // Inputs and constants
        for id in self.inputs() {
            if let Some(var) = self.variable(*id) {
                writeln!(f, "  input {}", declaration(var))?;
            }
        }
        let mut any_declared = !self.inputs().is_empty();
        for var in self.constants() {
            writeln!(f, "  const {}", declaration(var))?;
            any_declared = true;
        }

        // Operators
        if any_declared && !self.operators().is_empty() {
            writeln!(f)?;
        }
        for id in self.topological_order() {
            if let Some(node) = self.operator(id) {
                self.write_node(f, node)?;
            }
        }

        // Outputs
        if any_declared || !self.operators().is_empty() {
            writeln!(f)?;
        }
        for id in self.outputs() {
            writeln!(f, "  output {}", self.label(*id))?;
        }

        writeln!(f, "}}")
    }
}

impl Graph {
    fn label(&self, id: VariableId) -> String {
        self.variable(id)
            .map(|v| v.label())
            .unwrap_or_else(|| id.to_string())
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, node: &OperatorNode) -> fmt::Result {
        let args: Vec<String> = node
            .inputs()
            .iter()
            .map(|(slot, id)| format!("{}={}", slot, self.label(*id)))
            .collect();
        let mut line = format!("  {} = {}({})", node.name(), node.kind(), args.join(", "));
        let record = node.params().to_record();
        if !record.is_empty() {
            write!(line, " {{ {} }}", record)?;
        }
        writeln!(f, "{}", line)?;

        for (slot, id) in node.outputs() {
            match self.variable(*id) {
                Some(var) => writeln!(f, "    -> {}={}: {} {}", slot, var.label(), var.order(), var.shape())?,
                None => writeln!(f, "    -> {}={}", slot, id)?,
            }
        }
        Ok(())
    }
}

fn declaration(var: &Variable) -> String {
    format!("{}: {} {}", var.label(), var.order(), var.shape())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::axis::AxisOrder;
    use crate::ir::operator::Operator;
    use crate::ir::shape::Shape;

    #[test]
    fn test_empty_graph() {
        let graph = Graph::new("empty");
        assert_eq!(emit_graph_text(&graph), "// graph: empty\n\ngraph empty {\n}\n");
    }

    #[test]
    fn test_relu_graph() {
        let mut graph = Graph::new("g");
        let x = graph
            .add_input("x", Shape::new(AxisOrder::nc(), &[1, 4]).unwrap())
            .unwrap();
        let y = graph.apply_one(Operator::relu("act").unwrap(), &[x]).unwrap();
        graph.mark_output(y).unwrap();
        let expected = "\
// graph: g

graph g {
  input x: NC {N:1, C:4}

  act = Relu(x=x)
    -> y=%v1: NC {N:1, C:4}

  output %v1
}
";
        assert_eq!(emit_graph_text(&graph), expected);
    }
}
