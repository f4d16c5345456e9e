//! The ordered group: a mutable, observable, positional container.
//!
//! An [`OrderedGroup`] holds heterogeneous [`Entry`] values in a stable order
//! and emits a [`GroupEvent`] for every structural change it performs. Bulk
//! mutation goes through the difference engine, so observers receive the
//! minimal edit script rather than a blanket reset.
//!
//! Groups nest: a group is itself an [`Entry`] occupying one position in its
//! parent, and the parent registers itself as an observer of every observable
//! child, relaying child events with positions offset by the child's position.
//!
//! Reads are internally synchronized and never block each other. Compound
//! mutations assume a single mutating thread; locks are never held while
//! observers run.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use lyst_diff::{compute_edit_script, EditOp, EditScript};
use lyst_types::{
    entries_equal, same_identity, Entry, EventSource, GroupError, GroupEvent, GroupObserver,
    GroupResult, SourceId,
};

use crate::channel::NotificationChannel;

const CHILDREN_LOCK: &str = "children lock poisoned";

/// Mutable, observable, ordered collection of entries.
///
/// Always handled through `Arc`: the group hands itself out as an observer of
/// its observable children, which requires a self handle.
pub struct OrderedGroup {
    id: SourceId,
    children: RwLock<Vec<Arc<dyn Entry>>>,
    channel: NotificationChannel,
    weak_self: Weak<OrderedGroup>,
}

impl OrderedGroup {
    /// Create an empty group.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id: SourceId::next(),
            children: RwLock::new(Vec::new()),
            channel: NotificationChannel::new(),
            weak_self: weak.clone(),
        })
    }

    /// Create a group pre-populated with `entries`.
    ///
    /// No events are emitted for the initial contents; there is nobody
    /// registered to hear them yet.
    pub fn with_entries(entries: Vec<Arc<dyn Entry>>) -> GroupResult<Arc<Self>> {
        let group = Self::new();
        group.ensure_attachable(&entries, 0..0)?;
        group.attach_all(&entries)?;
        *group.children.write().expect(CHILDREN_LOCK) = entries;
        Ok(group)
    }

    /// Identifier carried by every event this group emits.
    pub fn source_id(&self) -> SourceId {
        self.id
    }

    /// Number of entries.
    pub fn item_count(&self) -> usize {
        self.children.read().expect(CHILDREN_LOCK).len()
    }

    /// Returns `true` if the group has no entries.
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.channel.observer_count()
    }

    /// The entry at `position`.
    pub fn get_item(&self, position: usize) -> GroupResult<Arc<dyn Entry>> {
        let children = self.children.read().expect(CHILDREN_LOCK);
        children
            .get(position)
            .cloned()
            .ok_or(GroupError::IndexOutOfRange {
                position,
                len: children.len(),
            })
    }

    /// Position of the first entry equal to `entry`, by allocation or by
    /// identity key plus content.
    pub fn position_of(&self, entry: &dyn Entry) -> Option<usize> {
        self.children
            .read()
            .expect(CHILDREN_LOCK)
            .iter()
            .position(|child| entries_equal(child.as_ref(), entry))
    }

    /// Append `entry` at the end.
    pub fn add(&self, entry: Arc<dyn Entry>) -> GroupResult<()> {
        self.ensure_attachable(std::slice::from_ref(&entry), 0..0)?;
        self.attach(entry.as_ref())?;
        let position = {
            let mut children = self.children.write().expect(CHILDREN_LOCK);
            children.push(entry);
            children.len() - 1
        };
        debug!(id = %self.id, position, "entry added");
        self.channel.emit(self.id, &GroupEvent::Inserted { position });
        Ok(())
    }

    /// Insert `entry` at `position`, shifting later entries up.
    pub fn add_at(&self, position: usize, entry: Arc<dyn Entry>) -> GroupResult<()> {
        let len = self.item_count();
        if position > len {
            return Err(GroupError::IndexOutOfRange { position, len });
        }
        self.ensure_attachable(std::slice::from_ref(&entry), 0..0)?;
        self.attach(entry.as_ref())?;
        self.children
            .write()
            .expect(CHILDREN_LOCK)
            .insert(position, entry);
        debug!(id = %self.id, position, "entry added");
        self.channel.emit(self.id, &GroupEvent::Inserted { position });
        Ok(())
    }

    /// Append `entries` at the end as one batch.
    ///
    /// An empty batch is a silent no-op.
    pub fn add_all(&self, entries: Vec<Arc<dyn Entry>>) -> GroupResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.ensure_attachable(&entries, 0..0)?;
        self.attach_all(&entries)?;
        let (start, count) = {
            let mut children = self.children.write().expect(CHILDREN_LOCK);
            let start = children.len();
            let count = entries.len();
            children.extend(entries);
            (start, count)
        };
        debug!(id = %self.id, start, count, "entries added");
        self.channel
            .emit(self.id, &GroupEvent::RangeInserted { start, count });
        Ok(())
    }

    /// Insert `entries` at `position` as one batch.
    ///
    /// An empty batch is a silent no-op.
    pub fn add_all_at(&self, position: usize, entries: Vec<Arc<dyn Entry>>) -> GroupResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let len = self.item_count();
        if position > len {
            return Err(GroupError::IndexOutOfRange { position, len });
        }
        self.ensure_attachable(&entries, 0..0)?;
        self.attach_all(&entries)?;
        let count = entries.len();
        {
            let mut children = self.children.write().expect(CHILDREN_LOCK);
            children.splice(position..position, entries);
        }
        debug!(id = %self.id, start = position, count, "entries added");
        self.channel.emit(
            self.id,
            &GroupEvent::RangeInserted {
                start: position,
                count,
            },
        );
        Ok(())
    }

    /// Remove the first entry equal to `entry`. A no-op if none matches.
    pub fn remove(&self, entry: &dyn Entry) {
        let removed = {
            let mut children = self.children.write().expect(CHILDREN_LOCK);
            let index = children
                .iter()
                .position(|child| entries_equal(child.as_ref(), entry));
            index.map(|index| (index, children.remove(index)))
        };
        let Some((position, removed)) = removed else {
            return;
        };
        self.detach(removed.as_ref());
        debug!(id = %self.id, position, "entry removed");
        self.channel.emit(self.id, &GroupEvent::Removed { position });
    }

    /// Remove every entry. A silent no-op on an empty group.
    pub fn remove_all(&self) {
        let removed = std::mem::take(&mut *self.children.write().expect(CHILDREN_LOCK));
        if removed.is_empty() {
            return;
        }
        for entry in &removed {
            self.detach(entry.as_ref());
        }
        debug!(id = %self.id, count = removed.len(), "all entries removed");
        self.channel.emit(
            self.id,
            &GroupEvent::RangeRemoved {
                start: 0,
                count: removed.len(),
            },
        );
    }

    /// Replace the entry at `position` with `entry`.
    ///
    /// This is a point operation, not a diff. The stored instance is swapped
    /// in every case; the event depends on how the pair compares:
    /// identity-equal with equal content is silent, identity-equal with
    /// differing content emits [`GroupEvent::Changed`] carrying the old
    /// entry's change payload, and an identity mismatch emits a removal
    /// followed by an insertion at the same position.
    pub fn replace(&self, position: usize, entry: Arc<dyn Entry>) -> GroupResult<()> {
        let current = self.get_item(position)?;
        let same_allocation = Arc::ptr_eq(&current, &entry);
        if !same_allocation {
            self.ensure_attachable(std::slice::from_ref(&entry), position..position + 1)?;
        }

        let identity_match = same_allocation || same_identity(current.as_ref(), entry.as_ref());
        let content_match = identity_match && current.content_eq(entry.as_ref());
        let payload = (identity_match && !content_match)
            .then(|| current.change_payload(entry.as_ref()))
            .flatten();

        {
            let mut children = self.children.write().expect(CHILDREN_LOCK);
            children[position] = entry.clone();
        }
        if !same_allocation {
            self.detach(current.as_ref());
            self.attach(entry.as_ref())?;
        }

        if !identity_match {
            self.channel.emit(self.id, &GroupEvent::Removed { position });
            self.channel.emit(self.id, &GroupEvent::Inserted { position });
        } else if !content_match {
            self.channel
                .emit(self.id, &GroupEvent::Changed { position, payload });
        }
        Ok(())
    }

    /// Replace the entries in `start..end` with `entries`, emitting the edit
    /// script for the subrange offset to group coordinates.
    ///
    /// Moves are not detected within a subrange replacement.
    pub fn replace_range(
        &self,
        start: usize,
        end: usize,
        entries: Vec<Arc<dyn Entry>>,
    ) -> GroupResult<()> {
        let len = self.item_count();
        if end > len {
            return Err(GroupError::IndexOutOfRange { position: end, len });
        }
        if start > end {
            return Err(GroupError::IndexOutOfRange {
                position: start,
                len: end,
            });
        }
        self.ensure_attachable(&entries, start..end)?;

        let (script, removed) = {
            let mut children = self.children.write().expect(CHILDREN_LOCK);
            let script = compute_edit_script(&children[start..end], &entries, false);
            let removed: Vec<Arc<dyn Entry>> =
                children.splice(start..end, entries.iter().cloned()).collect();
            (script, removed)
        };
        for old in &removed {
            self.detach(old.as_ref());
        }
        self.attach_all(&entries)?;
        debug!(
            id = %self.id,
            start,
            end,
            replacements = entries.len(),
            ops = script.len(),
            "range replaced"
        );
        self.dispatch(&script, start);
        Ok(())
    }

    /// Replace the whole contents with `entries`, emitting the minimal edit
    /// script between the old and new sequences. Moves are detected.
    ///
    /// Updating with equal contents emits nothing.
    pub fn update(&self, entries: Vec<Arc<dyn Entry>>) -> GroupResult<()> {
        self.update_detecting_moves(entries, true)
    }

    /// [`OrderedGroup::update`] with explicit control over move detection.
    ///
    /// With detection off, a relocated entry reports as a removal plus an
    /// insertion instead of a [`GroupEvent::Moved`].
    pub fn update_detecting_moves(
        &self,
        entries: Vec<Arc<dyn Entry>>,
        detect_moves: bool,
    ) -> GroupResult<()> {
        let len = self.item_count();
        self.ensure_attachable(&entries, 0..len)?;

        let (script, removed) = {
            let mut children = self.children.write().expect(CHILDREN_LOCK);
            let script = compute_edit_script(&children, &entries, detect_moves);
            let removed = std::mem::replace(&mut *children, entries.clone());
            (script, removed)
        };
        for old in &removed {
            self.detach(old.as_ref());
        }
        self.attach_all(&entries)?;
        debug!(
            id = %self.id,
            old = removed.len(),
            new = entries.len(),
            ops = script.len(),
            "updated"
        );
        self.dispatch(&script, 0);
        Ok(())
    }

    /// Signal that the whole group should be considered changed, without
    /// touching the contents.
    pub fn invalidate(&self) {
        self.channel.emit(self.id, &GroupEvent::Invalidated);
    }

    fn dispatch(&self, script: &EditScript, offset: usize) {
        for op in &script.ops {
            let event = match op.offset_by(offset) {
                EditOp::Inserted { position, count } => GroupEvent::RangeInserted {
                    start: position,
                    count,
                },
                EditOp::Removed { position, count } => GroupEvent::RangeRemoved {
                    start: position,
                    count,
                },
                EditOp::Moved { from, to } => GroupEvent::Moved { from, to },
                EditOp::Changed {
                    position,
                    count,
                    payload,
                } => GroupEvent::RangeChanged {
                    start: position,
                    count,
                    payload,
                },
            };
            self.channel.emit(self.id, &event);
        }
    }

    fn observer_handle(&self) -> Arc<dyn GroupObserver> {
        self.weak_self.upgrade().expect("group self handle dropped")
    }

    fn attach(&self, entry: &dyn Entry) -> GroupResult<()> {
        match entry.as_source() {
            Some(source) => source.register_observer(self.observer_handle()),
            None => Ok(()),
        }
    }

    fn detach(&self, entry: &dyn Entry) {
        let Some(source) = entry.as_source() else {
            return;
        };
        if let Some(me) = self.weak_self.upgrade() {
            let me: Arc<dyn GroupObserver> = me;
            let _ = source.unregister_observer(&me);
        }
    }

    fn attach_all(&self, entries: &[Arc<dyn Entry>]) -> GroupResult<()> {
        for (index, entry) in entries.iter().enumerate() {
            if let Err(err) = self.attach(entry.as_ref()) {
                for prior in &entries[..index] {
                    self.detach(prior.as_ref());
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Check that every observable entry in `entries` can be attached: no
    /// duplicate sources within the batch, never this group itself, and no
    /// source this group already observes, unless that observation belongs
    /// to a child in the `released` range and is dropped by the operation.
    /// Validated up front so mutations are all-or-nothing.
    fn ensure_attachable(
        &self,
        entries: &[Arc<dyn Entry>],
        released: Range<usize>,
    ) -> GroupResult<()> {
        let mut batch = HashSet::new();
        for entry in entries {
            let Some(source) = entry.as_source() else {
                continue;
            };
            let source = source.source_id();
            // A group observing itself would relay its own events forever.
            if source == self.id || !batch.insert(source) {
                return Err(GroupError::DuplicateObserver);
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        let released_sources: HashSet<SourceId> = {
            let children = self.children.read().expect(CHILDREN_LOCK);
            children[released]
                .iter()
                .filter_map(|child| child.as_source().map(|s| s.source_id()))
                .collect()
        };
        let me = self.observer_handle();
        for entry in entries {
            let Some(source) = entry.as_source() else {
                continue;
            };
            if released_sources.contains(&source.source_id()) {
                continue;
            }
            if source.has_observer(&me) {
                return Err(GroupError::DuplicateObserver);
            }
        }
        Ok(())
    }
}

impl Entry for OrderedGroup {
    fn identity_key(&self) -> i64 {
        self.id.as_u64() as i64
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn content_eq(&self, other: &dyn Entry) -> bool {
        other
            .as_any()
            .downcast_ref::<OrderedGroup>()
            .is_some_and(|o| o.id == self.id)
    }

    fn as_source(&self) -> Option<&dyn EventSource> {
        Some(self)
    }
}

impl EventSource for OrderedGroup {
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn register_observer(&self, observer: Arc<dyn GroupObserver>) -> GroupResult<()> {
        self.channel.register(observer)
    }

    fn unregister_observer(&self, observer: &Arc<dyn GroupObserver>) -> GroupResult<()> {
        self.channel.unregister(observer)
    }

    fn has_observer(&self, observer: &Arc<dyn GroupObserver>) -> bool {
        self.channel.is_registered(observer)
    }
}

impl GroupObserver for OrderedGroup {
    /// Relay a child's event, offset by the child's position. Invalidation
    /// carries no position and collapses to a one-entry ranged change at the
    /// child's position.
    fn on_event(&self, source: SourceId, event: &GroupEvent) {
        let position = {
            let children = self.children.read().expect(CHILDREN_LOCK);
            children.iter().position(|child| {
                child
                    .as_source()
                    .is_some_and(|s| s.source_id() == source)
            })
        };
        let Some(position) = position else {
            return;
        };
        let relayed = match event {
            GroupEvent::Invalidated => GroupEvent::RangeChanged {
                start: position,
                count: 1,
                payload: None,
            },
            other => other.offset_by(position),
        };
        self.channel.emit(self.id, &relayed);
    }
}

impl std::fmt::Debug for OrderedGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedGroup")
            .field("id", &self.id)
            .field("len", &self.item_count())
            .finish()
    }
}
