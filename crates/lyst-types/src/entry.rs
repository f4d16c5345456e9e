//! Entry capabilities and observer interfaces.
//!
//! An [`Entry`] is an opaque list element: it exposes a stable identity key,
//! a deep content-equality check, and an optional change payload describing
//! the difference to a candidate replacement. Entries that are themselves
//! observable containers (nested groups) additionally expose the
//! [`EventSource`] capability. The two capabilities form an interface pair;
//! there is no inheritance between them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GroupResult;
use crate::event::{GroupEvent, Payload};

/// Unique identifier for an event-emitting source (a group).
///
/// Allocated from a process-wide monotonic counter, so two live sources never
/// share an id. Used by observers to attribute relayed events to a child.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(u64);

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

impl SourceId {
    /// Allocate the next unique source id.
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "grp:{}", self.0)
    }
}

/// An opaque list element.
///
/// The core never inspects concrete entry types; it only consults these
/// predicates. Two entries are the same logical entity when their identity
/// keys are equal; identity-equal entries may still differ in content, in
/// which case [`Entry::change_payload`] may describe the difference.
pub trait Entry: Send + Sync {
    /// Stable, long-lived identity key for "is this the same logical entity".
    fn identity_key(&self) -> i64;

    /// Concrete-type escape hatch for [`Entry::content_eq`] implementations.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Deep content equality against another entry.
    ///
    /// Implementations typically downcast `other` through
    /// [`Entry::as_any`] and return `false` for foreign types.
    fn content_eq(&self, other: &dyn Entry) -> bool;

    /// Optional fine-grained description of the change from `self` to `new`.
    ///
    /// Only consulted for identity-equal pairs whose content differs. The
    /// payload is passed through to observers untouched.
    fn change_payload(&self, _new: &dyn Entry) -> Option<Payload> {
        None
    }

    /// The container capability, for entries that are themselves observable
    /// groups. Plain entries return `None`.
    fn as_source(&self) -> Option<&dyn EventSource> {
        None
    }
}

impl std::fmt::Debug for dyn Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("identity_key", &self.identity_key())
            .finish_non_exhaustive()
    }
}

/// Capability of an entry that emits structural change events.
///
/// A parent group registers itself as an observer of each observable child it
/// contains, and relays child events with positions offset by the child's
/// position in the parent.
pub trait EventSource: Send + Sync {
    /// Identifier carried by every event this source emits.
    fn source_id(&self) -> SourceId;

    /// Register an observer.
    ///
    /// Fails with [`GroupError::DuplicateObserver`] when the observer is
    /// already registered.
    ///
    /// [`GroupError::DuplicateObserver`]: crate::error::GroupError::DuplicateObserver
    fn register_observer(&self, observer: Arc<dyn GroupObserver>) -> GroupResult<()>;

    /// Unregister a previously registered observer.
    ///
    /// Fails with [`GroupError::ObserverNotFound`] when the observer is not
    /// registered.
    ///
    /// [`GroupError::ObserverNotFound`]: crate::error::GroupError::ObserverNotFound
    fn unregister_observer(&self, observer: &Arc<dyn GroupObserver>) -> GroupResult<()>;

    /// Returns `true` if `observer` is currently registered.
    ///
    /// Lets a prospective parent validate adoption before mutating any state.
    fn has_observer(&self, observer: &Arc<dyn GroupObserver>) -> bool;
}

/// Receiver of structural change events.
///
/// Delivery happens synchronously on the mutating thread, in reverse
/// registration order. An observer may unregister itself (or others) from
/// within `on_event`; the in-flight delivery is unaffected.
pub trait GroupObserver: Send + Sync {
    /// Handle one structural change event from `source`.
    fn on_event(&self, source: SourceId, event: &GroupEvent);
}

/// Identity equality: same logical entity.
pub fn same_identity(a: &dyn Entry, b: &dyn Entry) -> bool {
    a.identity_key() == b.identity_key()
}

/// Value equality used for positional lookup and removal.
///
/// The same allocation always compares equal; otherwise two entries are equal
/// when they share an identity key and their content compares equal.
pub fn entries_equal(a: &dyn Entry, b: &dyn Entry) -> bool {
    std::ptr::addr_eq(a, b) || (same_identity(a, b) && a.content_eq(b))
}
