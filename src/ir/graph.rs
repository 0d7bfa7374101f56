//! The computation graph: an arena of variables and operators.
//!
//! Nodes refer to each other through [`VariableId`] / [`OperatorId`] indices,
//! never through references, so producer/consumer links run both ways
//! without ownership cycles.
//!
//! The graph is acyclic by construction: [`Graph::apply`] only reads
//! variables that already exist and only writes variables it has just
//! created.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::config::GraphOptions;
use crate::error::{ApplyError, ConfigError, GraphError};
use crate::ir::operator::{Operator, OperatorId, OperatorNode};
use crate::ir::shape::Shape;
use crate::ir::variable::{Variable, VariableId, VariableRole};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique graph identity, carried by every id the graph mints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphId(u64);

impl GraphId {
    fn fresh() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Computation graph for one model.
///
/// Invariants:
/// - Every id the graph hands out carries its [`GraphId`]; ids minted by
///   another graph are never resolved, whatever their index.
/// - A variable id with index `n` refers to `variables[n]`, an operator id
///   with index `n` to `operators[n]`.
/// - Operator names are unique within the graph.
/// - Every operator node is fully wired; its outputs are `Intermediate`
///   variables whose producer is that node.
#[derive(Debug)]
pub struct Graph {
    pub name: String,
    id: GraphId,
    options: GraphOptions,
    pub(crate) variables: Vec<Variable>,
    pub(crate) operators: Vec<OperatorNode>,
    pub(crate) operator_index: HashMap<String, OperatorId>,
    variable_index: HashMap<String, VariableId>,
    inputs: Vec<VariableId>,
    outputs: Vec<VariableId>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: GraphId::fresh(),
            options: GraphOptions::default(),
            variables: Vec::new(),
            operators: Vec::new(),
            operator_index: HashMap::new(),
            variable_index: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_options(name: impl Into<String>, options: GraphOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let mut graph = Self::new(name);
        graph.options = options;
        Ok(graph)
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Declares a graph input (an activation supplied at run time).
    pub fn add_input(&mut self, name: impl Into<String>, shape: Shape) -> Result<VariableId, GraphError> {
        let id = self.add_named(name.into(), shape, VariableRole::Input)?;
        self.inputs.push(id);
        Ok(id)
    }

    /// Declares a constant, typically learned weights.
    pub fn add_constant(&mut self, name: impl Into<String>, shape: Shape) -> Result<VariableId, GraphError> {
        self.add_named(name.into(), shape, VariableRole::Constant)
    }

    fn add_named(&mut self, name: String, shape: Shape, role: VariableRole) -> Result<VariableId, GraphError> {
        if self.variable_index.contains_key(&name) {
            return Err(GraphError::DuplicateVariable {
                graph: self.name.clone(),
                name,
            });
        }
        if shape.rank() > self.options.max_rank {
            return Err(GraphError::RankLimit {
                graph: self.name.clone(),
                name,
                rank: shape.rank(),
                max: self.options.max_rank,
            });
        }
        let id = self.push_variable(Some(name.clone()), shape, role, None);
        self.variable_index.insert(name, id);
        Ok(id)
    }

    fn push_variable(
        &mut self,
        name: Option<String>,
        shape: Shape,
        role: VariableRole,
        producer: Option<OperatorId>,
    ) -> VariableId {
        let id = VariableId::new(self.id, self.variables.len());
        trace!(graph = %self.name, variable = %id, shape = %shape, ?role, "allocated variable");
        self.variables.push(Variable {
            id,
            name,
            shape,
            role,
            producer,
            consumers: Vec::new(),
        });
        id
    }

    /// Marks an existing variable as a graph output. Marking twice is a no-op.
    pub fn mark_output(&mut self, id: VariableId) -> Result<(), GraphError> {
        if self.variable(id).is_none() {
            return Err(GraphError::UnknownVariable {
                graph: self.name.clone(),
                id,
            });
        }
        if !self.outputs.contains(&id) {
            self.outputs.push(id);
        }
        Ok(())
    }

    /// Applies `op` to `inputs` (given in the kind's slot order).
    ///
    /// Validates the inputs, infers output shapes, allocates the output
    /// variables and wires the new operator node, all or nothing. Returns the
    /// output variables in slot order. On error the graph is left untouched.
    ///
    /// `op` is consumed, so one operator value can only ever be applied once;
    /// applying a clone under the same name fails with `DuplicateOperator`.
    pub fn apply(&mut self, op: Operator, inputs: &[VariableId]) -> Result<Vec<VariableId>, ApplyError> {
        let kind = op.kind();
        let result = self.try_apply(op, inputs);
        match &result {
            Ok(outputs) => {
                let shapes: Vec<String> = outputs
                    .iter()
                    .filter_map(|id| self.variable(*id))
                    .map(|v| v.shape().to_string())
                    .collect();
                debug!(graph = %self.name, %kind, outputs = ?shapes, "applied operator");
            }
            Err(e) => warn!(graph = %self.name, %kind, error = %e, "rejected operator"),
        }
        result
    }

    /// [`Graph::apply`] for single-output kinds.
    pub fn apply_one(&mut self, op: Operator, inputs: &[VariableId]) -> Result<VariableId, ApplyError> {
        let outputs = self.apply(op, inputs)?;
        Ok(outputs[0])
    }

    fn try_apply(&mut self, op: Operator, inputs: &[VariableId]) -> Result<Vec<VariableId>, ApplyError> {
        let (name, params) = op.into_parts();
        let kind = params.kind();
        let name = if name.is_empty() { self.fresh_name() } else { name };

        let slots = kind.input_slots();
        if inputs.len() != slots.len() {
            return Err(ApplyError::ArityMismatch {
                op: name,
                expected: slots.len(),
                got: inputs.len(),
                slots: slots.join(", "),
            });
        }
        if self.operator_index.contains_key(&name) {
            return Err(ApplyError::DuplicateOperator { op: name });
        }

        let mut shapes: Vec<&Shape> = Vec::with_capacity(inputs.len());
        for (slot, id) in slots.iter().zip(inputs) {
            let var = self.variable(*id).ok_or_else(|| ApplyError::UnknownVariable {
                op: name.clone(),
                slot: *slot,
                id: *id,
            })?;
            shapes.push(var.shape());
        }
        let output_shapes = params.infer(&name, &shapes)?;

        // Everything below is infallible: commit.
        let op_id = OperatorId::new(self.id, self.operators.len());
        let outputs: Vec<(&'static str, VariableId)> = kind
            .output_slots()
            .iter()
            .zip(output_shapes)
            .map(|(slot, shape)| {
                let id = self.push_variable(None, shape, VariableRole::Intermediate, Some(op_id));
                (*slot, id)
            })
            .collect();
        for id in inputs {
            let consumers = &mut self.variables[id.index()].consumers;
            if !consumers.contains(&op_id) {
                consumers.push(op_id);
            }
        }

        let result = outputs.iter().map(|(_, id)| *id).collect();
        self.operator_index.insert(name.clone(), op_id);
        self.operators.push(OperatorNode {
            id: op_id,
            name,
            params,
            inputs: slots.iter().copied().zip(inputs.iter().copied()).collect(),
            outputs,
        });
        Ok(result)
    }

    fn fresh_name(&self) -> String {
        let mut n = self.operators.len();
        loop {
            let candidate = format!("{}{}", self.options.auto_name_prefix, n);
            if !self.operator_index.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Resolves `id`, or `None` if it is out of range or minted by another graph.
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        if id.graph() != self.id {
            return None;
        }
        self.variables.get(id.index())
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&Variable> {
        let id = self.variable_index.get(name)?;
        self.variable(*id)
    }

    pub fn operator(&self, id: OperatorId) -> Option<&OperatorNode> {
        if id.graph() != self.id {
            return None;
        }
        self.operators.get(id.index())
    }

    pub fn operator_by_name(&self, name: &str) -> Option<&OperatorNode> {
        let id = self.operator_index.get(name)?;
        self.operator(*id)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Operators in application order (which is also a topological order).
    pub fn operators(&self) -> &[OperatorNode] {
        &self.operators
    }

    pub fn inputs(&self) -> &[VariableId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[VariableId] {
        &self.outputs
    }

    pub fn constants(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .iter()
            .filter(|v| v.role == VariableRole::Constant)
    }

    /// The operator that produced `id`, or `None` for inputs and constants.
    pub fn producer(&self, id: VariableId) -> Option<&OperatorNode> {
        self.variable(id)?.producer.and_then(|op| self.operator(op))
    }

    /// Operators reading `id`.
    pub fn consumers(&self, id: VariableId) -> impl Iterator<Item = &OperatorNode> {
        self.variable(id)
            .into_iter()
            .flat_map(|v| v.consumers.iter())
            .filter_map(|op| self.operator(*op))
    }

    /// Operator ids ordered so that every producer precedes its consumers.
    ///
    /// Kahn's algorithm; among ready operators the lowest id goes first, so
    /// the result is deterministic.
    pub fn topological_order(&self) -> Vec<OperatorId> {
        let mut indegree: Vec<usize> = self
            .operators
            .iter()
            .map(|node| self.predecessors(node).len())
            .collect();
        let mut ready: BTreeSet<OperatorId> = self
            .operators
            .iter()
            .filter(|node| indegree[node.id.index()] == 0)
            .map(|node| node.id)
            .collect();

        let mut order = Vec::with_capacity(self.operators.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for succ in self.successors(&self.operators[id.index()]) {
                let d = &mut indegree[succ.index()];
                *d -= 1;
                if *d == 0 {
                    ready.insert(succ);
                }
            }
        }
        order
    }

    /// Distinct operators producing an input of `node`.
    pub fn predecessors(&self, node: &OperatorNode) -> Vec<OperatorId> {
        let mut preds: Vec<OperatorId> = node
            .inputs
            .iter()
            .filter_map(|(_, v)| self.variable(*v).and_then(|v| v.producer))
            .collect();
        preds.sort();
        preds.dedup();
        preds
    }

    /// Distinct operators consuming an output of `node`.
    pub fn successors(&self, node: &OperatorNode) -> Vec<OperatorId> {
        let mut succs: Vec<OperatorId> = node
            .outputs
            .iter()
            .filter_map(|(_, v)| self.variable(*v))
            .flat_map(|v| v.consumers.iter().copied())
            .collect();
        succs.sort();
        succs.dedup();
        succs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::axis::{Axis, AxisOrder};

    fn nc(n: usize, c: usize) -> Shape {
        Shape::new(AxisOrder::nc(), &[n, c]).unwrap()
    }

    #[test]
    fn test_empty_graph() {
        let graph = Graph::new("g");
        assert!(graph.variables().is_empty());
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn test_ids_carry_their_graph() {
        let mut a = Graph::new("a");
        let mut b = Graph::new("b");
        assert_ne!(a.id(), b.id());
        let xa = a.add_input("x", nc(1, 2)).unwrap();
        let xb = b.add_input("x", nc(1, 2)).unwrap();
        assert_eq!(xa.index(), xb.index());
        assert_ne!(xa, xb);
        assert_eq!(xa.graph(), a.id());
        assert!(b.variable(xa).is_none());
        assert!(b.variable(xb).is_some());

        let ya = a.apply_one(Operator::relu("relu").unwrap(), &[xa]).unwrap();
        let op = a.producer(ya).unwrap().id();
        assert!(a.operator(op).is_some());
        assert!(b.operator(op).is_none());
    }

    #[test]
    fn test_duplicate_variable_names() {
        let mut graph = Graph::new("g");
        graph.add_input("x", nc(1, 2)).unwrap();
        assert!(matches!(
            graph.add_constant("x", nc(1, 2)),
            Err(GraphError::DuplicateVariable { .. })
        ));
    }

    #[test]
    fn test_rank_limit() {
        let options = GraphOptions {
            max_rank: 1,
            ..GraphOptions::default()
        };
        let mut graph = Graph::with_options("g", options).unwrap();
        assert!(matches!(
            graph.add_input("x", nc(1, 2)),
            Err(GraphError::RankLimit { rank: 2, max: 1, .. })
        ));
    }

    #[test]
    fn test_auto_names_skip_taken_names() {
        let mut graph = Graph::new("g");
        let x = graph.add_input("x", nc(1, 2)).unwrap();
        let y = graph.apply_one(Operator::relu("op1").unwrap(), &[x]).unwrap();
        let unnamed = Operator::unnamed(crate::ir::operator::OpParams::Activation(
            crate::ir::operator::Activation::Sigmoid,
        ))
        .unwrap();
        let z = graph.apply_one(unnamed, &[y]).unwrap();
        let node = graph.producer(z).unwrap();
        assert_eq!(node.name(), "op2");
    }

    #[test]
    fn test_same_variable_twice_is_one_consumer_edge() {
        let mut graph = Graph::new("g");
        let x = graph.add_input("x", nc(2, 3)).unwrap();
        let y = graph.apply_one(Operator::elementwise_sum("sum").unwrap(), &[x, x]).unwrap();
        assert_eq!(graph.variable(x).unwrap().consumers().len(), 1);
        assert_eq!(graph.variable(y).unwrap().shape(), &nc(2, 3));
        assert_eq!(graph.variable(y).unwrap().order().axes(), &[Axis::N, Axis::C]);
    }
}
