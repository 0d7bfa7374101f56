//! Axis labels and the layouts built from them.
//!
//! Operators never address a tensor dimension by position. They ask a
//! [`Shape`](crate::ir::shape::Shape) for the extent of an [`Axis`], which is
//! what lets one shape rule serve both `NCHW` and `NHWC` tensors.
//!
//! The known layouts are plain `const` data; nothing here is mutable at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

/// Symbolic tensor dimension label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    /// Batch.
    N = 0,
    /// Channel.
    C = 1,
    /// Height.
    H = 2,
    /// Width.
    W = 3,
    /// Time / sequence position.
    T = 4,
}

impl Axis {
    /// Total number of axes
    pub const COUNT: usize = 5;

    pub const ALL: [Axis; Axis::COUNT] = [Axis::N, Axis::C, Axis::H, Axis::W, Axis::T];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn letter(self) -> char {
        match self {
            Axis::N => 'N',
            Axis::C => 'C',
            Axis::H => 'H',
            Axis::W => 'W',
            Axis::T => 'T',
        }
    }

    /// Long name, used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::N => "batch",
            Axis::C => "channel",
            Axis::H => "height",
            Axis::W => "width",
            Axis::T => "time",
        }
    }

    pub fn from_letter(letter: char) -> Option<Axis> {
        Axis::ALL.into_iter().find(|a| a.letter() == letter)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

// ---------------------------------------------------------------------------
// Known orders
// ---------------------------------------------------------------------------

pub const ORDER_C: &[Axis] = &[Axis::C];
pub const ORDER_NC: &[Axis] = &[Axis::N, Axis::C];
pub const ORDER_CN: &[Axis] = &[Axis::C, Axis::N];
pub const ORDER_NT: &[Axis] = &[Axis::N, Axis::T];
pub const ORDER_NTC: &[Axis] = &[Axis::N, Axis::T, Axis::C];
pub const ORDER_NCHW: &[Axis] = &[Axis::N, Axis::C, Axis::H, Axis::W];
pub const ORDER_NHWC: &[Axis] = &[Axis::N, Axis::H, Axis::W, Axis::C];
pub const ORDER_CNHW: &[Axis] = &[Axis::C, Axis::N, Axis::H, Axis::W];
pub const ORDER_CHWN: &[Axis] = &[Axis::C, Axis::H, Axis::W, Axis::N];
pub const ORDER_HWCN: &[Axis] = &[Axis::H, Axis::W, Axis::C, Axis::N];
pub const ORDER_HWNC: &[Axis] = &[Axis::H, Axis::W, Axis::N, Axis::C];

/// Every layout convention the IR recognises.
pub const KNOWN_ORDERS: &[&[Axis]] = &[
    ORDER_C, ORDER_NC, ORDER_CN, ORDER_NT, ORDER_NTC, ORDER_NCHW, ORDER_NHWC, ORDER_CNHW,
    ORDER_CHWN, ORDER_HWCN, ORDER_HWNC,
];

// ---------------------------------------------------------------------------
// AxisOrder
// ---------------------------------------------------------------------------

/// An ordered, duplicate-free sequence of axes: one physical layout.
///
/// Any such sequence is a valid `AxisOrder`; whether an operator accepts it is
/// a separate question answered by [`AxisOrder::is_known`] and the operator's
/// own layout check.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisOrder {
    axes: Vec<Axis>,
    /// `positions[axis.index()]` is the position of `axis` in `axes`.
    positions: [Option<u8>; Axis::COUNT],
}

impl AxisOrder {
    /// Builds an order, rejecting empty and duplicate-carrying sequences.
    pub fn new(axes: impl IntoIterator<Item = Axis>) -> Result<Self, ShapeError> {
        let axes: Vec<Axis> = axes.into_iter().collect();
        if axes.is_empty() {
            return Err(ShapeError::EmptyOrder);
        }
        let mut positions = [None; Axis::COUNT];
        for (pos, axis) in axes.iter().enumerate() {
            if positions[axis.index()].is_some() {
                return Err(ShapeError::DuplicateAxis { axis: *axis });
            }
            positions[axis.index()] = Some(pos as u8);
        }
        Ok(Self { axes, positions })
    }

    /// Builds an order from one of the `ORDER_*` constants.
    fn from_static(axes: &'static [Axis]) -> Self {
        let mut positions = [None; Axis::COUNT];
        for (pos, axis) in axes.iter().enumerate() {
            positions[axis.index()] = Some(pos as u8);
        }
        Self { axes: axes.to_vec(), positions }
    }

    pub fn c() -> Self {
        Self::from_static(ORDER_C)
    }

    pub fn nc() -> Self {
        Self::from_static(ORDER_NC)
    }

    pub fn cn() -> Self {
        Self::from_static(ORDER_CN)
    }

    pub fn nt() -> Self {
        Self::from_static(ORDER_NT)
    }

    pub fn ntc() -> Self {
        Self::from_static(ORDER_NTC)
    }

    pub fn nchw() -> Self {
        Self::from_static(ORDER_NCHW)
    }

    pub fn nhwc() -> Self {
        Self::from_static(ORDER_NHWC)
    }

    pub fn cnhw() -> Self {
        Self::from_static(ORDER_CNHW)
    }

    pub fn chwn() -> Self {
        Self::from_static(ORDER_CHWN)
    }

    pub fn hwcn() -> Self {
        Self::from_static(ORDER_HWCN)
    }

    pub fn hwnc() -> Self {
        Self::from_static(ORDER_HWNC)
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn iter(&self) -> impl Iterator<Item = Axis> + '_ {
        self.axes.iter().copied()
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    /// Position of `axis` in this order, in O(1).
    pub fn position(&self, axis: Axis) -> Option<usize> {
        self.positions[axis.index()].map(usize::from)
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.positions[axis.index()].is_some()
    }

    /// True if this order is exactly `axes`.
    pub fn is(&self, axes: &[Axis]) -> bool {
        self.axes == axes
    }

    /// True if this order holds the same axes as `axes`, in any order.
    pub fn has_axes(&self, axes: &[Axis]) -> bool {
        self.rank() == axes.len() && axes.iter().all(|a| self.contains(*a))
    }

    /// True if this order is one of [`KNOWN_ORDERS`].
    pub fn is_known(&self) -> bool {
        KNOWN_ORDERS.iter().any(|known| self.is(known))
    }

    /// This order with `axis` deleted; the remaining axes keep their order.
    pub fn without(&self, axis: Axis) -> Result<AxisOrder, ShapeError> {
        if !self.contains(axis) {
            return Err(ShapeError::MissingAxis {
                axis,
                order: self.clone(),
            });
        }
        AxisOrder::new(self.iter().filter(|a| *a != axis))
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in &self.axes {
            write!(f, "{}", axis)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AxisOrder({})", self)
    }
}

impl FromStr for AxisOrder {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes = s
            .chars()
            .map(|letter| Axis::from_letter(letter).ok_or(ShapeError::UnknownAxisLetter { letter }))
            .collect::<Result<Vec<_>, _>>()?;
        AxisOrder::new(axes)
    }
}

impl TryFrom<String> for AxisOrder {
    type Error = ShapeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AxisOrder> for String {
    fn from(order: AxisOrder) -> Self {
        order.to_string()
    }
}
