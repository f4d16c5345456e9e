//! Structural change events.
//!
//! A [`GroupEvent`] describes one structural change to an ordered group:
//! positional inserts, removals, moves, content changes with an optional
//! payload, or a whole-group invalidation. Events are emitted after the
//! mutation that produced them, so positions are always in bounds for the
//! post-mutation state.

use serde::{Deserialize, Serialize};

/// Opaque fine-grained change description passed through to observers.
///
/// Comparable so that adjacent changed positions with equal payloads can be
/// batched into one ranged event.
pub type Payload = serde_json::Value;

/// A single structural change event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    /// One entry inserted at `position`.
    Inserted { position: usize },
    /// `count` entries inserted starting at `start`.
    RangeInserted { start: usize, count: usize },
    /// One entry removed from `position`.
    Removed { position: usize },
    /// `count` entries removed starting at `start`.
    RangeRemoved { start: usize, count: usize },
    /// The entry at `position` changed content.
    Changed {
        position: usize,
        payload: Option<Payload>,
    },
    /// `count` entries starting at `start` changed content, sharing one payload.
    RangeChanged {
        start: usize,
        count: usize,
        payload: Option<Payload>,
    },
    /// The entry at `from` relocated to `to`.
    Moved { from: usize, to: usize },
    /// The whole group should be considered changed. Carries no position.
    Invalidated,
}

impl GroupEvent {
    /// The same event with every position shifted up by `delta`.
    ///
    /// Used when a parent group relays a child's events, offset by the
    /// child's position within the parent. [`GroupEvent::Invalidated`]
    /// carries no position and is returned unchanged; relays special-case it.
    pub fn offset_by(&self, delta: usize) -> GroupEvent {
        match self {
            Self::Inserted { position } => Self::Inserted {
                position: position + delta,
            },
            Self::RangeInserted { start, count } => Self::RangeInserted {
                start: start + delta,
                count: *count,
            },
            Self::Removed { position } => Self::Removed {
                position: position + delta,
            },
            Self::RangeRemoved { start, count } => Self::RangeRemoved {
                start: start + delta,
                count: *count,
            },
            Self::Changed { position, payload } => Self::Changed {
                position: position + delta,
                payload: payload.clone(),
            },
            Self::RangeChanged {
                start,
                count,
                payload,
            } => Self::RangeChanged {
                start: start + delta,
                count: *count,
                payload: payload.clone(),
            },
            Self::Moved { from, to } => Self::Moved {
                from: from + delta,
                to: to + delta,
            },
            Self::Invalidated => Self::Invalidated,
        }
    }
}

impl std::fmt::Display for GroupEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserted { position } => write!(f, "inserted@{position}"),
            Self::RangeInserted { start, count } => write!(f, "inserted@{start}x{count}"),
            Self::Removed { position } => write!(f, "removed@{position}"),
            Self::RangeRemoved { start, count } => write!(f, "removed@{start}x{count}"),
            Self::Changed { position, .. } => write!(f, "changed@{position}"),
            Self::RangeChanged { start, count, .. } => write!(f, "changed@{start}x{count}"),
            Self::Moved { from, to } => write!(f, "moved@{from}->{to}"),
            Self::Invalidated => write!(f, "invalidated"),
        }
    }
}
