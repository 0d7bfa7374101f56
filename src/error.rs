use thiserror::Error;

use crate::ir::axis::{Axis, AxisOrder};
use crate::ir::variable::VariableId;

/// Top-level error type for graph construction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", format_error_pretty("shape error", &format!("{}", _0)))]
    Shape(#[from] ShapeError),

    #[error("{}", format_error_pretty("construction error", &format!("{}", _0)))]
    Construct(#[from] ConstructError),

    #[error("{}", format_error_pretty("apply error", &format!("{}", _0)))]
    Apply(#[from] ApplyError),

    #[error("{}", format_error_pretty("graph error", &format!("{}", _0)))]
    Graph(#[from] GraphError),

    #[error("{}", format_error_pretty("pass error", &format!("{}", _0)))]
    Pass(#[from] PassError),

    #[error("{}", format_error_pretty("pass error", &format!("{}", _0)))]
    Pipeline(#[from] PassFailure),

    #[error("{}", format_error_pretty("config error", &format!("{}", _0)))]
    Config(#[from] ConfigError),

    #[error("{}", format_error_pretty("layout error", &format!("{}", _0)))]
    Layout(#[from] LayoutError),
}

/// Convenience result alias over the top-level [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

fn format_error_pretty(category: &str, msg: &str) -> String {
    format!("[{}] {}", category, msg)
}

// ---------------------------------------------------------------------------
// Shape errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("axis order must contain at least one axis")]
    EmptyOrder,

    #[error("axis {axis} appears more than once in an axis order")]
    DuplicateAxis { axis: Axis },

    #[error("'{letter}' is not an axis letter (valid: N, C, H, W, T)")]
    UnknownAxisLetter { letter: char },

    #[error("order {order} has {expected} axes but {got} extents were given")]
    RankMismatch {
        order: AxisOrder,
        expected: usize,
        got: usize,
    },

    #[error("axis {axis} has extent 0; every extent must be positive")]
    ZeroExtent { axis: Axis },

    #[error("axis {axis} is not present in order {order}")]
    MissingAxis { axis: Axis, order: AxisOrder },

    #[error("extent given for axis {axis}, which is not part of order {order}")]
    UnexpectedAxis { axis: Axis, order: AxisOrder },

    #[error("shape over order {order} has more elements than fit in usize")]
    SizeOverflow { order: AxisOrder },
}

// ---------------------------------------------------------------------------
// Construction errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructError {
    #[error("operator '{op}' is missing required parameter '{field}'")]
    MissingParameter { op: String, field: String },

    #[error("operator '{op}' has an invalid parameter '{field}': {reason}")]
    InvalidParameter {
        op: String,
        field: String,
        reason: String,
    },

    #[error("unknown operator kind '{kind}'")]
    UnknownKind { kind: String },
}

impl ConstructError {
    /// The parameter field this error refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConstructError::MissingParameter { field, .. }
            | ConstructError::InvalidParameter { field, .. } => Some(field),
            ConstructError::UnknownKind { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Apply errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("operator '{op}' takes {expected} inputs ({slots}) but {got} were given")]
    ArityMismatch {
        op: String,
        expected: usize,
        got: usize,
        slots: String,
    },

    #[error("operator '{op}': slot '{slot}' refers to variable {id}, which does not belong to this graph")]
    UnknownVariable {
        op: String,
        slot: &'static str,
        id: VariableId,
    },

    #[error("an operator named '{op}' has already been applied to this graph")]
    DuplicateOperator { op: String },

    #[error("shape mismatch in operator '{op}': slot '{slot}' axis {axis} has extent {got}, expected {expected}")]
    ShapeMismatch {
        op: String,
        slot: &'static str,
        axis: Axis,
        expected: usize,
        got: usize,
    },

    #[error("shape mismatch in operator '{op}': axis {axis} is not present in slot '{slot}' (order {order})")]
    AxisNotPresent {
        op: String,
        slot: &'static str,
        axis: Axis,
        order: AxisOrder,
    },

    #[error("shape mismatch in operator '{op}': slot '{slot}' has order {order}, expected {expected}")]
    OrderMismatch {
        op: String,
        slot: &'static str,
        order: AxisOrder,
        expected: String,
    },

    #[error("shape mismatch in operator '{op}': window of {kernel} exceeds padded axis {axis} (extent {extent}, padding {padding})")]
    WindowTooLarge {
        op: String,
        axis: Axis,
        extent: usize,
        kernel: usize,
        padding: usize,
    },

    #[error("operator '{op}': padding {padding} on axis {axis} (extent {extent}) overflows usize")]
    ExtentOverflow {
        op: String,
        axis: Axis,
        extent: usize,
        padding: usize,
    },

    #[error("operator '{op}' does not support layout {order} on slot '{slot}'")]
    UnsupportedLayout {
        op: String,
        slot: &'static str,
        order: AxisOrder,
    },

    #[error("operator '{op}' produced an invalid shape: {source}")]
    InvalidShape {
        op: String,
        #[source]
        source: ShapeError,
    },
}

impl ApplyError {
    /// Name of the operator that rejected the application.
    pub fn op(&self) -> &str {
        match self {
            ApplyError::ArityMismatch { op, .. }
            | ApplyError::UnknownVariable { op, .. }
            | ApplyError::DuplicateOperator { op }
            | ApplyError::ShapeMismatch { op, .. }
            | ApplyError::AxisNotPresent { op, .. }
            | ApplyError::OrderMismatch { op, .. }
            | ApplyError::WindowTooLarge { op, .. }
            | ApplyError::ExtentOverflow { op, .. }
            | ApplyError::UnsupportedLayout { op, .. }
            | ApplyError::InvalidShape { op, .. } => op,
        }
    }

    /// True for every error that reports incompatible input shapes.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            ApplyError::ShapeMismatch { .. }
                | ApplyError::AxisNotPresent { .. }
                | ApplyError::OrderMismatch { .. }
                | ApplyError::WindowTooLarge { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("variable {id} does not belong to graph '{graph}'")]
    UnknownVariable { graph: String, id: VariableId },

    #[error("a variable named '{name}' already exists in graph '{graph}'")]
    DuplicateVariable { graph: String, name: String },

    #[error("variable '{name}' has rank {rank}, but graph '{graph}' allows at most {max}")]
    RankLimit {
        graph: String,
        name: String,
        rank: usize,
        max: usize,
    },
}

// ---------------------------------------------------------------------------
// Pass errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("graph '{graph}' violates an invariant: {detail}")]
    InvariantViolation { graph: String, detail: String },
}

/// A failed pipeline run, naming the pass responsible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassFailure {
    #[error("pass '{pass}' failed: {error}")]
    Failed {
        pass: &'static str,
        #[source]
        error: PassError,
    },

    #[error("pass '{pass}' left the graph inconsistent: {error}")]
    BrokeInvariants {
        pass: &'static str,
        #[source]
        error: PassError,
    },
}

impl PassFailure {
    pub fn pass(&self) -> &'static str {
        match self {
            PassFailure::Failed { pass, .. } | PassFailure::BrokeInvariants { pass, .. } => pass,
        }
    }

    pub fn error(&self) -> &PassError {
        match self {
            PassFailure::Failed { error, .. } | PassFailure::BrokeInvariants { error, .. } => error,
        }
    }
}

// ---------------------------------------------------------------------------
// Layout errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("constant '{name}' does not fit: graph '{graph}' needs more than usize::MAX elements")]
    SizeOverflow { graph: String, name: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse graph options: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid graph option '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Error {
    /// Returns a stable diagnostic code for this error.
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Error::Shape(s) => match s {
                ShapeError::EmptyOrder => "E0001",
                ShapeError::DuplicateAxis { .. } => "E0002",
                ShapeError::UnknownAxisLetter { .. } => "E0003",
                ShapeError::RankMismatch { .. } => "E0004",
                ShapeError::ZeroExtent { .. } => "E0005",
                ShapeError::MissingAxis { .. } => "E0006",
                ShapeError::UnexpectedAxis { .. } => "E0007",
                ShapeError::SizeOverflow { .. } => "E0008",
            },
            Error::Construct(c) => match c {
                ConstructError::MissingParameter { .. } => "E0100",
                ConstructError::InvalidParameter { .. } => "E0101",
                ConstructError::UnknownKind { .. } => "E0102",
            },
            Error::Apply(a) => match a {
                ApplyError::ArityMismatch { .. } => "E0200",
                ApplyError::UnknownVariable { .. } => "E0201",
                ApplyError::DuplicateOperator { .. } => "E0202",
                ApplyError::ShapeMismatch { .. } => "E0203",
                ApplyError::AxisNotPresent { .. } => "E0204",
                ApplyError::OrderMismatch { .. } => "E0205",
                ApplyError::WindowTooLarge { .. } => "E0206",
                ApplyError::UnsupportedLayout { .. } => "E0207",
                ApplyError::InvalidShape { .. } => "E0208",
                ApplyError::ExtentOverflow { .. } => "E0209",
            },
            Error::Graph(g) => match g {
                GraphError::UnknownVariable { .. } => "E0300",
                GraphError::DuplicateVariable { .. } => "E0301",
                GraphError::RankLimit { .. } => "E0302",
            },
            Error::Pass(_) => "E0400",
            Error::Pipeline(f) => match f {
                PassFailure::Failed { .. } => "E0401",
                PassFailure::BrokeInvariants { .. } => "E0402",
            },
            Error::Config(_) => "E0500",
            Error::Layout(_) => "E0600",
        }
    }
}
