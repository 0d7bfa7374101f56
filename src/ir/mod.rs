pub mod axis;
pub mod capability;
pub mod graph;
pub mod operator;
pub(crate) mod ops;
pub mod param;
pub mod shape;
pub mod variable;

pub use axis::{Axis, AxisOrder};
pub use capability::{Capability, CapabilitySet};
pub use graph::{Graph, GraphId};
pub use operator::{
    Activation, AxiswiseOp, OpKind, OpParams, Operator, OperatorId, OperatorNode, Pooling, Reduction,
};
pub use param::{ParamRecord, ParamValue, Window2d};
pub use shape::Shape;
pub use variable::{Variable, VariableId, VariableRole};
