//! Edit scripts: ordered structural operations over two sequences.
//!
//! A script is produced transiently by the engine and consumed exactly once
//! by translating each operation into a notification event. Operation
//! positions are expressed in the coordinate space of the list as it is
//! incrementally transformed: applying the operations in order turns the old
//! sequence into the new one without ever referencing an out-of-range
//! position.

use serde::{Deserialize, Serialize};

use lyst_types::Payload;

/// A single structural operation in an edit script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOp {
    /// `count` entries inserted at `position`.
    Inserted { position: usize, count: usize },
    /// `count` entries removed starting at `position`.
    Removed { position: usize, count: usize },
    /// The entry at `from` relocated to `to`.
    Moved { from: usize, to: usize },
    /// `count` aligned entries starting at `position` changed content,
    /// sharing one payload.
    Changed {
        position: usize,
        count: usize,
        payload: Option<Payload>,
    },
}

impl EditOp {
    /// The same operation with every position shifted up by `delta`.
    ///
    /// Used when a subrange diff is dispatched at an offset within a larger
    /// list.
    pub fn offset_by(&self, delta: usize) -> EditOp {
        match self {
            Self::Inserted { position, count } => Self::Inserted {
                position: position + delta,
                count: *count,
            },
            Self::Removed { position, count } => Self::Removed {
                position: position + delta,
                count: *count,
            },
            Self::Moved { from, to } => Self::Moved {
                from: from + delta,
                to: to + delta,
            },
            Self::Changed {
                position,
                count,
                payload,
            } => Self::Changed {
                position: position + delta,
                count: *count,
                payload: payload.clone(),
            },
        }
    }
}

/// The result of diffing two ordered entry sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditScript {
    /// The operations, in dispatch order.
    pub ops: Vec<EditOp>,
}

impl EditScript {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the sequences were identical.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Total number of inserted entries across all operations.
    pub fn insertions(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EditOp::Inserted { count, .. } => Some(count),
                _ => None,
            })
            .sum()
    }

    /// Total number of removed entries across all operations.
    pub fn removals(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EditOp::Removed { count, .. } => Some(count),
                _ => None,
            })
            .sum()
    }

    /// Number of move operations.
    pub fn moves(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, EditOp::Moved { .. }))
            .count()
    }

    /// Total number of changed positions across all operations.
    pub fn changes(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EditOp::Changed { count, .. } => Some(count),
                _ => None,
            })
            .sum()
    }
}
