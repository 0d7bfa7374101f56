//! Graph invariant checker.
//!
//! Re-derives everything `Graph::apply` promises and rejects the graph at
//! the first disagreement. A graph built only through the public API always
//! passes; the pass exists so that downstream passes mutating the arena can
//! be checked after the fact.

use std::collections::HashSet;

use crate::error::PassError;
use crate::ir::graph::Graph;
use crate::ir::operator::OperatorId;
use crate::ir::shape::Shape;
use crate::ir::variable::{VariableId, VariableRole};
use crate::pass::GraphPass;

/// Validates arena invariants across the entire graph.
///
/// Checks:
/// 1. Ids match arena positions and operator names index the right node.
/// 2. Every node's slot maps match its kind's slot lists, in order.
/// 3. Producer and consumer links agree in both directions; consumer lists
///    hold no duplicates.
/// 4. Only intermediates have a producer, and every intermediate has one.
/// 5. Re-running shape inference reproduces each node's output shapes.
/// 6. The graph is acyclic, and graph inputs/outputs name existing variables.
pub struct ValidatePass;

impl GraphPass for ValidatePass {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn mutates(&self) -> bool {
        false
    }

    fn run(&mut self, graph: &mut Graph) -> Result<(), PassError> {
        check_variables(graph)?;
        check_operators(graph)?;
        check_boundary(graph)?;

        let order = graph.topological_order();
        if order.len() != graph.operators().len() {
            return Err(violation(
                graph,
                format!(
                    "only {} of {} operators can be ordered; the graph has a cycle",
                    order.len(),
                    graph.operators().len()
                ),
            ));
        }
        Ok(())
    }
}

fn violation(graph: &Graph, detail: String) -> PassError {
    PassError::InvariantViolation {
        graph: graph.name.clone(),
        detail,
    }
}

fn check_variables(graph: &Graph) -> Result<(), PassError> {
    for (index, var) in graph.variables().iter().enumerate() {
        if var.id() != VariableId::new(graph.id(), index) {
            return Err(violation(graph, format!("variable at index {} has id {}", index, var.id())));
        }

        match (var.role(), var.producer()) {
            (VariableRole::Intermediate, None) => {
                return Err(violation(graph, format!("intermediate {} has no producer", var.label())));
            }
            (VariableRole::Input | VariableRole::Constant, Some(op)) => {
                return Err(violation(
                    graph,
                    format!("{:?} variable {} claims producer {}", var.role(), var.label(), op),
                ));
            }
            (_, Some(op)) => {
                let node = graph.operator(op).ok_or_else(|| {
                    violation(graph, format!("{} names missing producer {}", var.label(), op))
                })?;
                if !node.outputs().iter().any(|(_, v)| *v == var.id()) {
                    return Err(violation(
                        graph,
                        format!("{} names producer '{}' which does not output it", var.label(), node.name()),
                    ));
                }
            }
            (_, None) => {}
        }

        let mut seen: HashSet<OperatorId> = HashSet::new();
        for op in var.consumers() {
            if !seen.insert(*op) {
                return Err(violation(graph, format!("{} lists consumer {} twice", var.label(), op)));
            }
            let node = graph.operator(*op).ok_or_else(|| {
                violation(graph, format!("{} names missing consumer {}", var.label(), op))
            })?;
            if !node.inputs().iter().any(|(_, v)| *v == var.id()) {
                return Err(violation(
                    graph,
                    format!("{} names consumer '{}' which does not read it", var.label(), node.name()),
                ));
            }
        }
    }
    Ok(())
}

fn check_operators(graph: &Graph) -> Result<(), PassError> {
    for (index, node) in graph.operators().iter().enumerate() {
        if node.id() != OperatorId::new(graph.id(), index) {
            return Err(violation(graph, format!("operator at index {} has id {}", index, node.id())));
        }
        match graph.operator_by_name(node.name()) {
            Some(found) if found.id() == node.id() => {}
            _ => {
                return Err(violation(
                    graph,
                    format!("operator name '{}' does not resolve to {}", node.name(), node.id()),
                ));
            }
        }

        let kind = node.kind();
        let input_slots: Vec<&str> = node.inputs().iter().map(|(s, _)| *s).collect();
        if input_slots != kind.input_slots() {
            return Err(violation(
                graph,
                format!(
                    "'{}' ({}) has input slots [{}], expected [{}]",
                    node.name(),
                    kind,
                    input_slots.join(", "),
                    kind.input_slots().join(", ")
                ),
            ));
        }
        let output_slots: Vec<&str> = node.outputs().iter().map(|(s, _)| *s).collect();
        if output_slots != kind.output_slots() {
            return Err(violation(
                graph,
                format!("'{}' ({}) has output slots [{}]", node.name(), kind, output_slots.join(", ")),
            ));
        }

        let mut shapes: Vec<&Shape> = Vec::with_capacity(node.inputs().len());
        for (slot, id) in node.inputs() {
            let var = graph.variable(*id).ok_or_else(|| {
                violation(graph, format!("'{}' slot '{}' reads missing variable {}", node.name(), slot, id))
            })?;
            if !var.consumers().contains(&node.id()) {
                return Err(violation(
                    graph,
                    format!("'{}' reads {} but is not among its consumers", node.name(), var.label()),
                ));
            }
            shapes.push(var.shape());
        }

        let inferred = node.params().infer(node.name(), &shapes).map_err(|e| {
            violation(graph, format!("'{}' no longer passes shape inference: {}", node.name(), e))
        })?;
        for ((slot, id), expected) in node.outputs().iter().zip(&inferred) {
            let var = graph.variable(*id).ok_or_else(|| {
                violation(graph, format!("'{}' slot '{}' writes missing variable {}", node.name(), slot, id))
            })?;
            if var.producer() != Some(node.id()) {
                return Err(violation(
                    graph,
                    format!("'{}' writes {} but is not its producer", node.name(), var.label()),
                ));
            }
            if var.shape() != expected {
                return Err(violation(
                    graph,
                    format!(
                        "'{}' slot '{}' holds {}, inference gives {}",
                        node.name(),
                        slot,
                        var.shape(),
                        expected
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_boundary(graph: &Graph) -> Result<(), PassError> {
    for id in graph.inputs() {
        match graph.variable(*id) {
            Some(var) if var.is_graph_input() => {}
            _ => return Err(violation(graph, format!("graph input {} is not an input variable", id))),
        }
    }
    for id in graph.outputs() {
        if graph.variable(*id).is_none() {
            return Err(violation(graph, format!("graph output {} does not exist", id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::axis::AxisOrder;
    use crate::ir::operator::Operator;

    fn chain() -> (Graph, VariableId, VariableId) {
        let mut graph = Graph::new("chain");
        let x = graph
            .add_input("x", Shape::new(AxisOrder::nc(), &[2, 8]).unwrap())
            .unwrap();
        let y = graph.apply_one(Operator::relu("relu").unwrap(), &[x]).unwrap();
        let z = graph.apply_one(Operator::relu("relu2").unwrap(), &[y]).unwrap();
        graph.mark_output(z).unwrap();
        (graph, x, y)
    }

    #[test]
    fn test_accepts_graph_built_through_api() {
        let (mut graph, _, _) = chain();
        assert!(ValidatePass.run(&mut graph).is_ok());
    }

    #[test]
    fn test_rejects_missing_consumer_link() {
        let (mut graph, x, _) = chain();
        graph.variables[x.index()].consumers.clear();
        let err = ValidatePass.run(&mut graph).unwrap_err();
        assert!(err.to_string().contains("not among its consumers"), "{}", err);
    }

    #[test]
    fn test_rejects_stale_output_shape() {
        let (mut graph, _, y) = chain();
        graph.variables[y.index()].shape = Shape::new(AxisOrder::nc(), &[2, 9]).unwrap();
        let err = ValidatePass.run(&mut graph).unwrap_err();
        assert!(err.to_string().contains("inference gives"), "{}", err);
    }

    #[test]
    fn test_rejects_cycle() {
        let (mut graph, x, _) = chain();
        // relu -> y -> relu2 -> z, then rewire relu to read z.
        let z = graph.operators[1].outputs[0].1;
        graph.operators[0].inputs[0].1 = z;
        graph.variables[x.index()].consumers.clear();
        let relu = graph.operators[0].id;
        graph.variables[z.index()].consumers.push(relu);
        let err = ValidatePass.run(&mut graph).unwrap_err();
        assert!(err.to_string().contains("cycle"), "{}", err);
    }

    #[test]
    fn test_rejects_consumer_minted_by_another_graph() {
        let (mut graph, x, _) = chain();
        let (other, _, _) = chain();
        let foreign = other.operators[0].id;
        assert_eq!(foreign.index(), graph.operators[0].id.index());
        graph.variables[x.index()].consumers[0] = foreign;
        let err = ValidatePass.run(&mut graph).unwrap_err();
        assert!(err.to_string().contains("missing consumer"), "{}", err);
    }
}
