use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ir::axis::AxisOrder;
use crate::ir::graph::GraphId;
use crate::ir::operator::OperatorId;
use crate::ir::shape::Shape;

/// Opaque variable identifier: the owning graph plus an index into its
/// variable arena. Only [`Graph`](crate::ir::graph::Graph) mints these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId {
    graph: GraphId,
    index: u32,
}

impl VariableId {
    pub(crate) fn new(graph: GraphId, index: usize) -> Self {
        Self {
            graph,
            index: index as u32,
        }
    }

    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Position in the owning graph's variable arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%v{}", self.index)
    }
}

/// How a variable came into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableRole {
    /// Activation fed in by the caller at run time.
    Input,
    /// Learned weights or other data known at conversion time.
    Constant,
    /// Produced by exactly one operator.
    Intermediate,
}

/// A tensor value node.
///
/// The shape is fixed at creation. Only the consumer list grows, and only
/// when the owning graph applies an operator that reads this variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) id: VariableId,
    pub(crate) name: Option<String>,
    pub(crate) shape: Shape,
    pub(crate) role: VariableRole,
    pub(crate) producer: Option<OperatorId>,
    pub(crate) consumers: Vec<OperatorId>,
}

impl Variable {
    pub fn id(&self) -> VariableId {
        self.id
    }

    /// Set for inputs and constants; operator outputs are anonymous.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn order(&self) -> &AxisOrder {
        self.shape.order()
    }

    pub fn role(&self) -> VariableRole {
        self.role
    }

    /// `None` for graph inputs and constants.
    pub fn producer(&self) -> Option<OperatorId> {
        self.producer
    }

    /// Operators reading this variable, in application order, without duplicates.
    pub fn consumers(&self) -> &[OperatorId] {
        &self.consumers
    }

    pub fn is_graph_input(&self) -> bool {
        self.role == VariableRole::Input
    }

    /// Name if present, else the id (`%v3`).
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }
}
