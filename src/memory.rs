//! Memory layout for learned weights.
//!
//! Constants are packed into one flat buffer in creation order. Offsets and
//! sizes count elements, not bytes; the element type is a backend concern.
//!
//! ```json
//! {
//!   "total_size": 448,
//!   "allocations": {
//!     "b": { "name": "b", "offset": 432, "size": 16 },
//!     "w": { "name": "w", "offset": 0, "size": 432 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LayoutError;
use crate::ir::graph::Graph;

/// One contiguous region of the weight buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

impl Allocation {
    /// One past the last element of this region.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLayout {
    pub total_size: usize,
    pub allocations: BTreeMap<String, Allocation>,
}

impl MemoryLayout {
    /// Lays out every constant of `graph` back to back, starting at offset 0.
    ///
    /// Fails with [`LayoutError::SizeOverflow`] when the buffer would need
    /// more than `usize::MAX` elements.
    pub fn for_constants(graph: &Graph) -> Result<Self, LayoutError> {
        let mut layout = MemoryLayout::default();
        for var in graph.constants() {
            let name = var.label();
            let size = var.shape().size();
            let offset = layout.total_size;
            layout.total_size = offset.checked_add(size).ok_or_else(|| LayoutError::SizeOverflow {
                graph: graph.name.clone(),
                name: name.clone(),
            })?;
            layout.allocations.insert(name.clone(), Allocation { name, offset, size });
        }
        debug!(
            graph = %graph.name,
            constants = layout.allocations.len(),
            total_size = layout.total_size,
            "computed weight layout"
        );
        Ok(layout)
    }

    pub fn get(&self, name: &str) -> Option<&Allocation> {
        self.allocations.get(name)
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Allocations sorted by offset.
    pub fn by_offset(&self) -> Vec<&Allocation> {
        let mut allocations: Vec<&Allocation> = self.allocations.values().collect();
        allocations.sort_by_key(|a| a.offset);
        allocations
    }
}
