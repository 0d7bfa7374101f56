//! Capability tags declared by operator kinds.
//!
//! Tags are static metadata: each [`OpKind`](crate::ir::operator::OpKind)
//! declares a fixed [`CapabilitySet`] and later passes (fusion, weight
//! serialization, in-place scheduling) query it by set membership. A tag never
//! implies behaviour inside this crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cross-cutting property an operator kind may declare.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Capability {
    /// An elementwise operator may be fused after this one.
    SupportsPostElementwise = 0,
    /// An axiswise operator (bias, scale) may be fused after this one.
    SupportsPostAxiswise = 1,
    /// Carries learned weights that are serialized apart from activations.
    HasLearnedWeights = 2,
    /// Computes each output element from the same position of its inputs.
    Elementwise = 3,
    /// Broadcasts a one-axis operand along one axis of the input.
    Axiswise = 4,
    /// Output may reuse the input buffer.
    Inplace = 5,
}

impl Capability {
    /// Total number of capabilities
    pub const COUNT: usize = 6;

    pub const ALL: [Capability; Capability::COUNT] = [
        Capability::SupportsPostElementwise,
        Capability::SupportsPostAxiswise,
        Capability::HasLearnedWeights,
        Capability::Elementwise,
        Capability::Axiswise,
        Capability::Inplace,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::SupportsPostElementwise => "SupportsPostElementwise",
            Self::SupportsPostAxiswise => "SupportsPostAxiswise",
            Self::HasLearnedWeights => "HasLearnedWeights",
            Self::Elementwise => "Elementwise",
            Self::Axiswise => "Axiswise",
            Self::Inplace => "Inplace",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitset of capabilities.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self((1 << Capability::COUNT) - 1)
    }

    pub const fn single(cap: Capability) -> Self {
        Self(1 << cap as u8)
    }

    pub const fn with(self, cap: Capability) -> Self {
        Self(self.0 | (1 << cap as u8))
    }

    pub const fn contains(self, cap: Capability) -> bool {
        (self.0 & (1 << cap as u8)) != 0
    }

    pub const fn without(self, cap: Capability) -> Self {
        Self(self.0 & !(1 << cap as u8))
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn is_subset_of(self, other: Self) -> bool {
        (self.0 & other.0) == self.0
    }

    /// Members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Capability::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
