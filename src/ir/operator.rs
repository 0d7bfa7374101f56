//! Operators: kinds, parameter variants, and graph nodes.
//!
//! An [`Operator`] is constructed with a name and validated parameters and
//! holds no wiring. Handing it to [`Graph::apply`](crate::ir::graph::Graph::apply)
//! runs shape inference and turns it into an [`OperatorNode`] whose input and
//! output maps are fully populated. There is no observable state in between.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ApplyError, ConstructError};
use crate::ir::axis::Axis;
use crate::ir::capability::{Capability, CapabilitySet};
use crate::ir::graph::GraphId;
use crate::ir::ops;
use crate::ir::param::{ParamRecord, RecordReader, Window2d};
use crate::ir::shape::Shape;
use crate::ir::variable::VariableId;

/// Opaque operator identifier, scoped to one graph like [`VariableId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperatorId {
    graph: GraphId,
    index: u32,
}

impl OperatorId {
    pub(crate) fn new(graph: GraphId, index: usize) -> Self {
        Self {
            graph,
            index: index as u32,
        }
    }

    pub fn graph(&self) -> GraphId {
        self.graph
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.index)
    }
}

// ---------------------------------------------------------------------------
// Kinds and capability tables
// ---------------------------------------------------------------------------

const WEIGHTED: CapabilitySet = CapabilitySet::empty()
    .with(Capability::HasLearnedWeights)
    .with(Capability::SupportsPostElementwise)
    .with(Capability::SupportsPostAxiswise);

const FUSABLE: CapabilitySet = CapabilitySet::empty()
    .with(Capability::SupportsPostElementwise)
    .with(Capability::SupportsPostAxiswise);

const ACTIVATION: CapabilitySet = FUSABLE
    .with(Capability::Elementwise)
    .with(Capability::Inplace);

const AXISWISE: CapabilitySet = WEIGHTED
    .with(Capability::Axiswise)
    .with(Capability::Inplace);

/// Fieldless discriminator naming every concrete operator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Convolution2D,
    MaxPooling2D,
    AveragePooling2D,
    Linear,
    AxiswiseBias,
    AxiswiseScale,
    Relu,
    Sigmoid,
    Tanh,
    Elu,
    ElementwiseSum,
    ArgMin,
    ArgMax,
    ReduceSum,
    ReduceMean,
    ReduceMax,
    ReduceMin,
    ReduceProd,
}

impl OpKind {
    pub const ALL: [OpKind; 18] = [
        OpKind::Convolution2D,
        OpKind::MaxPooling2D,
        OpKind::AveragePooling2D,
        OpKind::Linear,
        OpKind::AxiswiseBias,
        OpKind::AxiswiseScale,
        OpKind::Relu,
        OpKind::Sigmoid,
        OpKind::Tanh,
        OpKind::Elu,
        OpKind::ElementwiseSum,
        OpKind::ArgMin,
        OpKind::ArgMax,
        OpKind::ReduceSum,
        OpKind::ReduceMean,
        OpKind::ReduceMax,
        OpKind::ReduceMin,
        OpKind::ReduceProd,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            OpKind::Convolution2D => "Convolution2D",
            OpKind::MaxPooling2D => "MaxPooling2D",
            OpKind::AveragePooling2D => "AveragePooling2D",
            OpKind::Linear => "Linear",
            OpKind::AxiswiseBias => "AxiswiseBias",
            OpKind::AxiswiseScale => "AxiswiseScale",
            OpKind::Relu => "Relu",
            OpKind::Sigmoid => "Sigmoid",
            OpKind::Tanh => "Tanh",
            OpKind::Elu => "Elu",
            OpKind::ElementwiseSum => "ElementwiseSum",
            OpKind::ArgMin => "ArgMin",
            OpKind::ArgMax => "ArgMax",
            OpKind::ReduceSum => "ReduceSum",
            OpKind::ReduceMean => "ReduceMean",
            OpKind::ReduceMax => "ReduceMax",
            OpKind::ReduceMin => "ReduceMin",
            OpKind::ReduceProd => "ReduceProd",
        }
    }

    /// Capability tags declared by this kind. Depends on nothing but the kind.
    pub const fn capabilities(self) -> CapabilitySet {
        match self {
            OpKind::Convolution2D | OpKind::Linear => WEIGHTED,
            OpKind::MaxPooling2D | OpKind::AveragePooling2D => FUSABLE,
            OpKind::AxiswiseBias | OpKind::AxiswiseScale => AXISWISE,
            OpKind::Relu | OpKind::Sigmoid | OpKind::Tanh | OpKind::Elu => ACTIVATION,
            OpKind::ElementwiseSum => FUSABLE.with(Capability::Elementwise),
            OpKind::ArgMin
            | OpKind::ArgMax
            | OpKind::ReduceSum
            | OpKind::ReduceMean
            | OpKind::ReduceMax
            | OpKind::ReduceMin
            | OpKind::ReduceProd => CapabilitySet::empty(),
        }
    }

    pub const fn has_capability(self, cap: Capability) -> bool {
        self.capabilities().contains(cap)
    }

    /// Input slot names, in the order `apply` expects them.
    pub const fn input_slots(self) -> &'static [&'static str] {
        match self {
            OpKind::Convolution2D | OpKind::Linear => &["x", "w"],
            OpKind::AxiswiseBias | OpKind::AxiswiseScale => &["x", "b"],
            OpKind::ElementwiseSum => &["x0", "x1"],
            _ => &["x"],
        }
    }

    /// Output slot names, in the order `apply` returns them.
    pub const fn output_slots(self) -> &'static [&'static str] {
        &["y"]
    }

    pub fn from_name(name: &str) -> Option<OpKind> {
        OpKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpKind {
    type Err = ConstructError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpKind::from_name(s).ok_or_else(|| ConstructError::UnknownKind { kind: s.to_owned() })
    }
}

/// Numeric semantics of a reduce-family operator. Opaque to shape inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    ArgMin,
    ArgMax,
    Sum,
    Mean,
    Max,
    Min,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pooling {
    Max,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxiswiseOp {
    Bias,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Elu,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Validated parameters, one variant per operator family.
///
/// The variant selects the shape rule; sub-tags such as [`Reduction`] only
/// distinguish numeric semantics within a family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpParams {
    Convolution2D(Window2d),
    Pooling2D { pooling: Pooling, window: Window2d },
    Linear,
    Axiswise { op: AxiswiseOp, axis: Axis },
    Activation(Activation),
    ElementwiseSum,
    Reduce { reduction: Reduction, axis: Axis },
}

impl OpParams {
    pub fn kind(&self) -> OpKind {
        match self {
            OpParams::Convolution2D(_) => OpKind::Convolution2D,
            OpParams::Pooling2D { pooling: Pooling::Max, .. } => OpKind::MaxPooling2D,
            OpParams::Pooling2D { pooling: Pooling::Average, .. } => OpKind::AveragePooling2D,
            OpParams::Linear => OpKind::Linear,
            OpParams::Axiswise { op: AxiswiseOp::Bias, .. } => OpKind::AxiswiseBias,
            OpParams::Axiswise { op: AxiswiseOp::Scale, .. } => OpKind::AxiswiseScale,
            OpParams::Activation(Activation::Relu) => OpKind::Relu,
            OpParams::Activation(Activation::Sigmoid) => OpKind::Sigmoid,
            OpParams::Activation(Activation::Tanh) => OpKind::Tanh,
            OpParams::Activation(Activation::Elu) => OpKind::Elu,
            OpParams::ElementwiseSum => OpKind::ElementwiseSum,
            OpParams::Reduce { reduction, .. } => match reduction {
                Reduction::ArgMin => OpKind::ArgMin,
                Reduction::ArgMax => OpKind::ArgMax,
                Reduction::Sum => OpKind::ReduceSum,
                Reduction::Mean => OpKind::ReduceMean,
                Reduction::Max => OpKind::ReduceMax,
                Reduction::Min => OpKind::ReduceMin,
                Reduction::Prod => OpKind::ReduceProd,
            },
        }
    }

    /// Parses and validates `record` for `kind`. Every required field must be
    /// present and no unknown field may appear.
    pub fn from_record(op: &str, kind: OpKind, record: &ParamRecord) -> Result<Self, ConstructError> {
        let mut reader = RecordReader::new(op, record);
        let params = match kind {
            OpKind::Convolution2D => OpParams::Convolution2D(Window2d::read(&mut reader, op)?),
            OpKind::MaxPooling2D => OpParams::Pooling2D {
                pooling: Pooling::Max,
                window: Window2d::read(&mut reader, op)?,
            },
            OpKind::AveragePooling2D => OpParams::Pooling2D {
                pooling: Pooling::Average,
                window: Window2d::read(&mut reader, op)?,
            },
            OpKind::Linear => OpParams::Linear,
            OpKind::AxiswiseBias => OpParams::Axiswise {
                op: AxiswiseOp::Bias,
                axis: reader.axis("axis")?,
            },
            OpKind::AxiswiseScale => OpParams::Axiswise {
                op: AxiswiseOp::Scale,
                axis: reader.axis("axis")?,
            },
            OpKind::Relu => OpParams::Activation(Activation::Relu),
            OpKind::Sigmoid => OpParams::Activation(Activation::Sigmoid),
            OpKind::Tanh => OpParams::Activation(Activation::Tanh),
            OpKind::Elu => OpParams::Activation(Activation::Elu),
            OpKind::ElementwiseSum => OpParams::ElementwiseSum,
            OpKind::ArgMin => reduce(Reduction::ArgMin, &mut reader)?,
            OpKind::ArgMax => reduce(Reduction::ArgMax, &mut reader)?,
            OpKind::ReduceSum => reduce(Reduction::Sum, &mut reader)?,
            OpKind::ReduceMean => reduce(Reduction::Mean, &mut reader)?,
            OpKind::ReduceMax => reduce(Reduction::Max, &mut reader)?,
            OpKind::ReduceMin => reduce(Reduction::Min, &mut reader)?,
            OpKind::ReduceProd => reduce(Reduction::Prod, &mut reader)?,
        };
        reader.finish()?;
        Ok(params)
    }

    /// The loosely-typed form of these parameters; feeding it back through
    /// [`OpParams::from_record`] yields an equal value.
    pub fn to_record(&self) -> ParamRecord {
        let mut record = ParamRecord::new();
        match self {
            OpParams::Convolution2D(window) | OpParams::Pooling2D { window, .. } => {
                window.write(&mut record)
            }
            OpParams::Axiswise { axis, .. } | OpParams::Reduce { axis, .. } => {
                record.insert("axis", *axis)
            }
            OpParams::Linear | OpParams::Activation(_) | OpParams::ElementwiseSum => {}
        }
        record
    }

    fn validate(&self, op: &str) -> Result<(), ConstructError> {
        match self {
            OpParams::Convolution2D(window) | OpParams::Pooling2D { window, .. } => {
                window.validate(op)
            }
            _ => Ok(()),
        }
    }

    /// Runs the family's shape rule. `inputs` are in slot order and have
    /// already been checked against the kind's arity.
    pub(crate) fn infer(&self, op: &str, inputs: &[&Shape]) -> Result<Vec<Shape>, ApplyError> {
        let y = match (self, inputs) {
            (OpParams::Convolution2D(window), [x, w]) => ops::conv2d::infer(op, window, x, w)?,
            (OpParams::Pooling2D { window, .. }, [x]) => ops::pooling::infer(op, window, x)?,
            (OpParams::Linear, [x, w]) => ops::linear::infer(op, x, w)?,
            (OpParams::Axiswise { axis, .. }, [x, b]) => ops::axiswise::infer(op, *axis, x, b)?,
            (OpParams::Activation(_), [x]) => ops::elementwise::infer_unary(x),
            (OpParams::ElementwiseSum, [x0, x1]) => ops::elementwise::infer_sum(op, x0, x1)?,
            (OpParams::Reduce { axis, .. }, [x]) => ops::reduce::infer(op, *axis, x)?,
            _ => {
                let slots = self.kind().input_slots();
                return Err(ApplyError::ArityMismatch {
                    op: op.to_owned(),
                    expected: slots.len(),
                    got: inputs.len(),
                    slots: slots.join(", "),
                });
            }
        };
        Ok(vec![y])
    }
}

fn reduce(reduction: Reduction, reader: &mut RecordReader<'_>) -> Result<OpParams, ConstructError> {
    Ok(OpParams::Reduce {
        reduction,
        axis: reader.axis("axis")?,
    })
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// A constructed, not yet applied operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    name: String,
    params: OpParams,
}

impl Operator {
    /// Builds an operator of `kind` from a loosely-typed record.
    pub fn construct(
        name: impl Into<String>,
        kind: OpKind,
        record: &ParamRecord,
    ) -> Result<Self, ConstructError> {
        let name = checked_name(name.into())?;
        let params = OpParams::from_record(&name, kind, record)?;
        Ok(Self { name, params })
    }

    /// Builds an operator from typed parameters.
    pub fn new(name: impl Into<String>, params: OpParams) -> Result<Self, ConstructError> {
        let name = checked_name(name.into())?;
        params.validate(&name)?;
        Ok(Self { name, params })
    }

    /// Builds an operator whose name is assigned by the graph at apply time.
    pub fn unnamed(params: OpParams) -> Result<Self, ConstructError> {
        params.validate(params.kind().name())?;
        Ok(Self {
            name: String::new(),
            params,
        })
    }

    pub fn convolution2d(name: impl Into<String>, window: Window2d) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Convolution2D(window))
    }

    pub fn max_pooling2d(name: impl Into<String>, window: Window2d) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Pooling2D { pooling: Pooling::Max, window })
    }

    pub fn average_pooling2d(name: impl Into<String>, window: Window2d) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Pooling2D { pooling: Pooling::Average, window })
    }

    pub fn linear(name: impl Into<String>) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Linear)
    }

    pub fn axiswise_bias(name: impl Into<String>, axis: Axis) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Axiswise { op: AxiswiseOp::Bias, axis })
    }

    pub fn axiswise_scale(name: impl Into<String>, axis: Axis) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Axiswise { op: AxiswiseOp::Scale, axis })
    }

    pub fn activation(name: impl Into<String>, activation: Activation) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Activation(activation))
    }

    pub fn relu(name: impl Into<String>) -> Result<Self, ConstructError> {
        Self::activation(name, Activation::Relu)
    }

    pub fn elementwise_sum(name: impl Into<String>) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::ElementwiseSum)
    }

    pub fn reduce(name: impl Into<String>, reduction: Reduction, axis: Axis) -> Result<Self, ConstructError> {
        Self::new(name, OpParams::Reduce { reduction, axis })
    }

    pub fn arg_min(name: impl Into<String>, axis: Axis) -> Result<Self, ConstructError> {
        Self::reduce(name, Reduction::ArgMin, axis)
    }

    pub fn arg_max(name: impl Into<String>, axis: Axis) -> Result<Self, ConstructError> {
        Self::reduce(name, Reduction::ArgMax, axis)
    }

    /// Empty for operators built with [`Operator::unnamed`].
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OpKind {
        self.params.kind()
    }

    pub fn params(&self) -> &OpParams {
        &self.params
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.kind().capabilities()
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.kind().has_capability(cap)
    }

    pub fn to_record(&self) -> ParamRecord {
        self.params.to_record()
    }

    pub(crate) fn into_parts(self) -> (String, OpParams) {
        (self.name, self.params)
    }
}

fn checked_name(name: String) -> Result<String, ConstructError> {
    if name.trim().is_empty() {
        return Err(ConstructError::InvalidParameter {
            op: name,
            field: "name".to_owned(),
            reason: "operator name must not be empty".to_owned(),
        });
    }
    Ok(name)
}

// ---------------------------------------------------------------------------
// OperatorNode
// ---------------------------------------------------------------------------

/// An applied operator living in a graph.
///
/// Invariant: `inputs` and `outputs` hold exactly one entry per slot of the
/// kind, in slot order. They are set once, when the node is created.
#[derive(Debug, Clone)]
pub struct OperatorNode {
    pub(crate) id: OperatorId,
    pub(crate) name: String,
    pub(crate) params: OpParams,
    pub(crate) inputs: Vec<(&'static str, VariableId)>,
    pub(crate) outputs: Vec<(&'static str, VariableId)>,
}

impl OperatorNode {
    pub fn id(&self) -> OperatorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OpKind {
        self.params.kind()
    }

    pub fn params(&self) -> &OpParams {
        &self.params
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.kind().capabilities()
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.kind().has_capability(cap)
    }

    /// `(slot, variable)` pairs in slot order.
    pub fn inputs(&self) -> &[(&'static str, VariableId)] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[(&'static str, VariableId)] {
        &self.outputs
    }

    pub fn input(&self, slot: &str) -> Option<VariableId> {
        self.inputs.iter().find(|(s, _)| *s == slot).map(|(_, v)| *v)
    }

    pub fn output(&self, slot: &str) -> Option<VariableId> {
        self.outputs.iter().find(|(s, _)| *s == slot).map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_round_trips_its_name() {
        for kind in OpKind::ALL {
            assert_eq!(kind.name().parse::<OpKind>().unwrap(), kind);
            assert_eq!(kind.output_slots(), &["y"]);
        }
        assert!(matches!(
            "Deconvolution2D".parse::<OpKind>(),
            Err(ConstructError::UnknownKind { .. })
        ));
    }

    #[test]
    fn test_params_kind_matches_construct_kind() {
        let window = ParamRecord::new()
            .with("ksize", (3i64, 3i64))
            .with("stride", (1i64, 1i64))
            .with("padding", (0i64, 0i64));
        let axis = ParamRecord::new().with("axis", Axis::C);
        let empty = ParamRecord::new();
        for kind in OpKind::ALL {
            let record = match kind {
                OpKind::Convolution2D | OpKind::MaxPooling2D | OpKind::AveragePooling2D => &window,
                OpKind::Linear
                | OpKind::Relu
                | OpKind::Sigmoid
                | OpKind::Tanh
                | OpKind::Elu
                | OpKind::ElementwiseSum => &empty,
                _ => &axis,
            };
            let op = Operator::construct("op", kind, record).unwrap();
            assert_eq!(op.kind(), kind);
            assert_eq!(&op.to_record(), record);
        }
    }

    #[test]
    fn test_tags_depend_only_on_kind() {
        let a = Operator::convolution2d("a", Window2d::new((1, 1), (1, 1), (0, 0))).unwrap();
        let b = Operator::convolution2d("b", Window2d::new((7, 5), (2, 3), (3, 2))).unwrap();
        assert_eq!(a.capabilities(), b.capabilities());
        assert!(a.has_capability(Capability::HasLearnedWeights));
        assert!(!Operator::arg_min("m", Axis::H).unwrap().has_capability(Capability::HasLearnedWeights));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Operator::relu("  ").unwrap_err();
        assert_eq!(err.field(), Some("name"));
        let op = Operator::unnamed(OpParams::Activation(Activation::Tanh)).unwrap();
        assert_eq!(op.name(), "");
    }
}
