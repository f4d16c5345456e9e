//! Edit script computation.
//!
//! Alignment is a Myers diff (via the `similar` crate) over the sequences of
//! identity keys, which is diagonal-preserving and therefore deterministic:
//! equal-cost alignments prefer the longest unchanged prefix/suffix. Aligned
//! pairs are then checked with `content_eq`, and differing pairs produce
//! `Changed` operations carrying `change_payload(old, new)`.
//!
//! Operations are generated by walking the diff regions from the end of the
//! sequences backwards over a simulated working list, so every emitted
//! position is valid in the list state produced by the operations before it.
//! The diff itself is O(N*D); the dispatch walk is linear in the working
//! list per region.

use std::collections::HashMap;
use std::sync::Arc;

use similar::{capture_diff_slices, Algorithm, DiffOp};

use lyst_types::{Entry, Payload};

use crate::script::{EditOp, EditScript};

/// Compute the minimal edit script transforming `old` into `new`.
///
/// With `detect_moves`, an identity key removed exactly once and inserted
/// exactly once collapses into a single `Moved` operation (followed by a
/// `Changed` at the destination when the moved pair's content differs).
/// Never fails; identical sequences yield an empty script.
pub fn compute_edit_script(
    old: &[Arc<dyn Entry>],
    new: &[Arc<dyn Entry>],
    detect_moves: bool,
) -> EditScript {
    let old_keys: Vec<i64> = old.iter().map(|e| e.identity_key()).collect();
    let new_keys: Vec<i64> = new.iter().map(|e| e.identity_key()).collect();

    let regions = capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys);

    let moves = if detect_moves {
        movable_pairs(&regions, &old_keys, &new_keys)
    } else {
        HashMap::new()
    };

    let mut builder = ScriptBuilder {
        old,
        new,
        old_keys: &old_keys,
        new_keys: &new_keys,
        moves,
        working: (0..old.len()).map(Slot::Old).collect(),
        ops: Vec::new(),
    };

    for region in regions.iter().rev() {
        match *region {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => builder.retain(old_index, new_index, len),
            DiffOp::Delete {
                old_index, old_len, ..
            } => builder.delete(old_index, old_len),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => builder.insert(old_index, new_index, new_len),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                builder.delete(old_index, old_len);
                builder.insert(old_index, new_index, new_len);
            }
        }
    }

    debug_assert_eq!(
        builder.final_keys(),
        new_keys,
        "edit script does not reproduce the new sequence"
    );

    EditScript { ops: builder.ops }
}

/// Keys removed exactly once and inserted exactly once, mapped to their
/// (old position, new position) pair. Ambiguous keys stay remove+insert.
fn movable_pairs(
    regions: &[DiffOp],
    old_keys: &[i64],
    new_keys: &[i64],
) -> HashMap<i64, (usize, usize)> {
    let mut deleted: HashMap<i64, Vec<usize>> = HashMap::new();
    let mut inserted: HashMap<i64, Vec<usize>> = HashMap::new();

    for region in regions {
        match *region {
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                for j in old_index..old_index + old_len {
                    deleted.entry(old_keys[j]).or_default().push(j);
                }
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                for i in new_index..new_index + new_len {
                    inserted.entry(new_keys[i]).or_default().push(i);
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                for j in old_index..old_index + old_len {
                    deleted.entry(old_keys[j]).or_default().push(j);
                }
                for i in new_index..new_index + new_len {
                    inserted.entry(new_keys[i]).or_default().push(i);
                }
            }
            DiffOp::Equal { .. } => {}
        }
    }

    deleted
        .into_iter()
        .filter_map(|(key, old_positions)| {
            let [old_pos] = old_positions[..] else {
                return None;
            };
            let new_positions = inserted.get(&key)?;
            let [new_pos] = new_positions[..] else {
                return None;
            };
            Some((key, (old_pos, new_pos)))
        })
        .collect()
}

/// One slot of the simulated working list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    /// An original entry, by old position.
    Old(usize),
    /// An original entry aligned with (and replaced by) a new one.
    Kept { old: usize, new: usize },
    /// An entry introduced by the new sequence, by new position.
    Added(usize),
}

impl Slot {
    /// The old position this slot corresponds to, if any.
    fn old_position(&self) -> Option<usize> {
        match self {
            Slot::Old(j) | Slot::Kept { old: j, .. } => Some(*j),
            Slot::Added(_) => None,
        }
    }
}

struct ScriptBuilder<'a> {
    old: &'a [Arc<dyn Entry>],
    new: &'a [Arc<dyn Entry>],
    old_keys: &'a [i64],
    new_keys: &'a [i64],
    moves: HashMap<i64, (usize, usize)>,
    working: Vec<Slot>,
    ops: Vec<EditOp>,
}

impl ScriptBuilder<'_> {
    /// Current working-list position of the untouched old entry `j`.
    fn position_of_old(&self, j: usize) -> usize {
        self.working
            .iter()
            .position(|slot| *slot == Slot::Old(j))
            .expect("aligned old slot missing from working list")
    }

    /// Working-list position where entries belonging before old position `p`
    /// are inserted: just before the first slot still anchored at an old
    /// position >= `p`, or at the end.
    fn insertion_point(&self, p: usize) -> usize {
        self.working
            .iter()
            .position(|slot| slot.old_position().is_some_and(|j| j >= p))
            .unwrap_or(self.working.len())
    }

    /// Handle an aligned (identity-equal) region, emitting batched `Changed`
    /// operations for content differences.
    fn retain(&mut self, old_index: usize, new_index: usize, len: usize) {
        let base = self.position_of_old(old_index);

        // (start offset, count, payload) of the batch being accumulated.
        let mut batch: Option<(usize, usize, Option<Payload>)> = None;

        for off in (0..len).rev() {
            let j = old_index + off;
            let i = new_index + off;

            if self.old[j].content_eq(&*self.new[i]) {
                if let Some((start, count, payload)) = batch.take() {
                    self.push_changed(base + start, count, payload);
                }
            } else {
                let payload = self.old[j].change_payload(&*self.new[i]);
                match &mut batch {
                    Some((start, count, existing)) if *start == off + 1 && *existing == payload => {
                        *start = off;
                        *count += 1;
                    }
                    _ => {
                        if let Some((start, count, payload)) = batch.take() {
                            self.push_changed(base + start, count, payload);
                        }
                        batch = Some((off, 1, payload));
                    }
                }
            }

            self.working[base + off] = Slot::Kept { old: j, new: i };
        }

        if let Some((start, count, payload)) = batch.take() {
            self.push_changed(base + start, count, payload);
        }
    }

    fn push_changed(&mut self, position: usize, count: usize, payload: Option<Payload>) {
        self.ops.push(EditOp::Changed {
            position,
            count,
            payload,
        });
    }

    /// Handle a removed region. Entries retained for a move stay in the
    /// working list until the matching insertion consumes them.
    fn delete(&mut self, old_index: usize, old_len: usize) {
        // (working-list start, count) of the removal batch being accumulated.
        let mut batch: Option<(usize, usize)> = None;

        for j in (old_index..old_index + old_len).rev() {
            if self.moves.contains_key(&self.old_keys[j]) {
                if let Some((start, count)) = batch.take() {
                    self.flush_removed(start, count);
                }
                continue;
            }

            let wpos = self.position_of_old(j);
            match &mut batch {
                Some((start, count)) if *start == wpos + 1 => {
                    *start = wpos;
                    *count += 1;
                }
                _ => {
                    if let Some((start, count)) = batch.take() {
                        self.flush_removed(start, count);
                    }
                    batch = Some((wpos, 1));
                }
            }
        }

        if let Some((start, count)) = batch.take() {
            self.flush_removed(start, count);
        }
    }

    fn flush_removed(&mut self, start: usize, count: usize) {
        self.ops.push(EditOp::Removed {
            position: start,
            count,
        });
        self.working.drain(start..start + count);
    }

    /// Handle an inserted region. Move-eligible keys relocate their retained
    /// old slot instead of inserting; everything else inserts in batches.
    ///
    /// `anchor` tracks the leftmost working-list position this region has
    /// placed so far, so entries emitted later (lower new positions) land in
    /// front of their already-placed successors.
    fn insert(&mut self, old_index: usize, new_index: usize, new_len: usize) {
        let mut anchor: Option<usize> = None;
        // New positions of the pending insertion batch, in descending order.
        let mut batch: Vec<usize> = Vec::new();

        for i in (new_index..new_index + new_len).rev() {
            match self.moves.get(&self.new_keys[i]).copied() {
                Some((old_pos, _)) => {
                    anchor = self.flush_inserted(old_index, anchor, &mut batch);

                    let from = self.position_of_old(old_pos);
                    let point = anchor.unwrap_or_else(|| self.insertion_point(old_index));
                    let to = if from < point { point - 1 } else { point };

                    if from != to {
                        self.ops.push(EditOp::Moved { from, to });
                    }
                    self.working.remove(from);
                    self.working.insert(to, Slot::Added(i));
                    anchor = Some(to);

                    if !self.old[old_pos].content_eq(&*self.new[i]) {
                        let payload = self.old[old_pos].change_payload(&*self.new[i]);
                        self.push_changed(to, 1, payload);
                    }
                }
                None => batch.push(i),
            }
        }

        self.flush_inserted(old_index, anchor, &mut batch);
    }

    fn flush_inserted(
        &mut self,
        old_index: usize,
        anchor: Option<usize>,
        batch: &mut Vec<usize>,
    ) -> Option<usize> {
        if batch.is_empty() {
            return anchor;
        }

        let point = anchor.unwrap_or_else(|| self.insertion_point(old_index));
        self.ops.push(EditOp::Inserted {
            position: point,
            count: batch.len(),
        });
        for (k, i) in batch.drain(..).rev().enumerate() {
            self.working.insert(point + k, Slot::Added(i));
        }
        Some(point)
    }

    /// Identity keys of the fully transformed working list.
    fn final_keys(&self) -> Vec<i64> {
        self.working
            .iter()
            .map(|slot| match slot {
                Slot::Old(j) => self.old_keys[*j],
                Slot::Kept { new, .. } => self.new_keys[*new],
                Slot::Added(i) => self.new_keys[*i],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Entry with identity, string content, and an optional change payload.
    struct Cell {
        key: i64,
        content: String,
        payload: Option<Payload>,
    }

    impl Entry for Cell {
        fn identity_key(&self) -> i64 {
            self.key
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn content_eq(&self, other: &dyn Entry) -> bool {
            other
                .as_any()
                .downcast_ref::<Cell>()
                .is_some_and(|o| o.content == self.content)
        }

        fn change_payload(&self, _new: &dyn Entry) -> Option<Payload> {
            self.payload.clone()
        }
    }

    fn cell(key: i64, content: &str) -> Arc<dyn Entry> {
        Arc::new(Cell {
            key,
            content: content.to_string(),
            payload: None,
        })
    }

    fn cell_with_payload(key: i64, content: &str, payload: Payload) -> Arc<dyn Entry> {
        Arc::new(Cell {
            key,
            content: content.to_string(),
            payload: Some(payload),
        })
    }

    fn keys(entries: &[Arc<dyn Entry>]) -> Vec<i64> {
        entries.iter().map(|e| e.identity_key()).collect()
    }

    /// Replay a script over a key list, panicking on any out-of-range
    /// position. Inserted keys are unknowable from the script alone and
    /// are filled from a sentinel.
    fn replay(script: &EditScript, old: &[i64]) -> Vec<i64> {
        let mut list = old.to_vec();
        for op in &script.ops {
            match op {
                EditOp::Removed { position, count } => {
                    assert!(position + count <= list.len(), "removal out of range");
                    list.drain(*position..position + count);
                }
                EditOp::Inserted { position, count } => {
                    assert!(*position <= list.len(), "insertion out of range");
                    for _ in 0..*count {
                        list.insert(*position, i64::MIN);
                    }
                }
                EditOp::Moved { from, to } => {
                    assert!(*from < list.len(), "move source out of range");
                    let entry = list.remove(*from);
                    assert!(*to <= list.len(), "move target out of range");
                    list.insert(*to, entry);
                }
                EditOp::Changed {
                    position, count, ..
                } => {
                    assert!(position + count <= list.len(), "change out of range");
                }
            }
        }
        list
    }

    #[test]
    fn identical_sequences_yield_empty_script() {
        let old = vec![cell(1, "a"), cell(2, "b")];
        let new = vec![cell(1, "a"), cell(2, "b")];
        let script = compute_edit_script(&old, &new, true);
        assert!(script.is_empty());
    }

    #[test]
    fn empty_to_empty_yields_empty_script() {
        let script = compute_edit_script(&[], &[], true);
        assert!(script.is_empty());
    }

    #[test]
    fn empty_to_populated_is_one_insertion() {
        let new = vec![cell(1, "a"), cell(2, "b")];
        let script = compute_edit_script(&[], &new, true);
        assert_eq!(
            script.ops,
            vec![EditOp::Inserted {
                position: 0,
                count: 2
            }]
        );
    }

    #[test]
    fn populated_to_empty_is_one_removal() {
        let old = vec![cell(1, "a"), cell(2, "b"), cell(3, "c")];
        let script = compute_edit_script(&old, &[], true);
        assert_eq!(
            script.ops,
            vec![EditOp::Removed {
                position: 0,
                count: 3
            }]
        );
    }

    #[test]
    fn content_change_on_aligned_pair() {
        let old = vec![cell(1, "before")];
        let new = vec![cell(1, "after")];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(
            script.ops,
            vec![EditOp::Changed {
                position: 0,
                count: 1,
                payload: None,
            }]
        );
    }

    #[test]
    fn adjacent_changes_with_equal_payloads_batch() {
        let old = vec![cell(1, "x"), cell(2, "x")];
        let new = vec![cell(1, "y"), cell(2, "y")];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(
            script.ops,
            vec![EditOp::Changed {
                position: 0,
                count: 2,
                payload: None,
            }]
        );
    }

    #[test]
    fn distinct_payloads_stay_separate() {
        let old = vec![
            cell_with_payload(1, "old content1", json!("old1")),
            cell_with_payload(2, "old content2", json!("old2")),
        ];
        let new = vec![
            cell_with_payload(1, "new content1", json!("new1")),
            cell_with_payload(2, "new content2", json!("new2")),
        ];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(
            script.ops,
            vec![
                EditOp::Changed {
                    position: 1,
                    count: 1,
                    payload: Some(json!("old2")),
                },
                EditOp::Changed {
                    position: 0,
                    count: 1,
                    payload: Some(json!("old1")),
                },
            ]
        );
    }

    #[test]
    fn identity_swap_is_removal_then_insertion() {
        let old = vec![cell(1, "x")];
        let new = vec![cell(2, "x")];
        let script = compute_edit_script(&old, &new, false);
        assert_eq!(
            script.ops,
            vec![
                EditOp::Removed {
                    position: 0,
                    count: 1
                },
                EditOp::Inserted {
                    position: 0,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn adjacent_transposition_collapses_to_one_move() {
        let old = vec![cell(1, "a"), cell(2, "b"), cell(3, "c")];
        let new = vec![cell(2, "b"), cell(1, "a"), cell(3, "c")];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(script.moves(), 1);
        assert_eq!(script.changes(), 0);
        assert_eq!(script.insertions(), 0);
        assert_eq!(script.removals(), 0);
    }

    #[test]
    fn transposition_without_move_detection_falls_back() {
        let old = vec![cell(1, "a"), cell(2, "b"), cell(3, "c")];
        let new = vec![cell(2, "b"), cell(1, "a"), cell(3, "c")];
        let script = compute_edit_script(&old, &new, false);
        assert_eq!(script.moves(), 0);
        assert_eq!(script.insertions(), 1);
        assert_eq!(script.removals(), 1);
        assert_eq!(replay(&script, &keys(&old)).len(), new.len());
    }

    #[test]
    fn rotation_to_front_moves_the_tail_entry() {
        let old = vec![cell(1, "a"), cell(2, "b"), cell(3, "c")];
        let new = vec![cell(3, "c"), cell(1, "a"), cell(2, "b")];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(script.ops, vec![EditOp::Moved { from: 2, to: 0 }]);
        assert_eq!(replay(&script, &keys(&old)), keys(&new));
    }

    #[test]
    fn moved_entry_with_changed_content_also_changes() {
        let old = vec![cell(1, "a"), cell(2, "b"), cell(3, "c")];
        let new = vec![cell(3, "C"), cell(1, "a"), cell(2, "b")];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(script.moves(), 1);
        assert_eq!(script.changes(), 1);
        assert!(matches!(
            script.ops[..],
            [
                EditOp::Moved { from: 2, to: 0 },
                EditOp::Changed {
                    position: 0,
                    count: 1,
                    ..
                },
            ]
        ));
    }

    #[test]
    fn ambiguous_duplicate_keys_are_not_move_candidates() {
        // Key 1 is removed once but inserted twice; the ambiguity falls back
        // to remove+insert.
        let old = vec![cell(1, "x"), cell(2, "a"), cell(3, "b"), cell(4, "c")];
        let new = vec![
            cell(2, "a"),
            cell(3, "b"),
            cell(1, "x"),
            cell(4, "c"),
            cell(1, "x"),
        ];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(script.moves(), 0);
        assert_eq!(script.removals(), 1);
        assert_eq!(script.insertions(), 2);
        assert_eq!(replay(&script, &keys(&old)).len(), new.len());
    }

    #[test]
    fn interleaved_edits_keep_positions_valid() {
        let old = vec![cell(1, "a"), cell(10, "x"), cell(20, "y")];
        let new = vec![cell(10, "x"), cell(99, "q"), cell(20, "Y"), cell(1, "a")];
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(replay(&script, &keys(&old)).len(), new.len());
        assert_eq!(script.moves(), 1);
    }

    #[test]
    fn growing_replacement_in_the_middle() {
        let old = vec![cell(1, "c"), cell(2, "c"), cell(3, "c")];
        let new = vec![
            cell(1, "c"),
            cell(4, "c"),
            cell(5, "c"),
            cell(6, "c"),
            cell(7, "c"),
            cell(8, "c"),
        ];
        let script = compute_edit_script(&old, &new, false);
        assert_eq!(
            script.ops,
            vec![
                EditOp::Removed {
                    position: 1,
                    count: 2
                },
                EditOp::Inserted {
                    position: 1,
                    count: 5
                },
            ]
        );
    }

    #[test]
    fn long_mostly_unchanged_sequence_stays_small() {
        let old: Vec<Arc<dyn Entry>> = (0..2000).map(|k| cell(k, "stable")).collect();
        let mut new: Vec<Arc<dyn Entry>> = old.clone();
        new[700] = cell(700, "edited");
        new.remove(1500);
        let script = compute_edit_script(&old, &new, true);
        assert_eq!(script.changes(), 1);
        assert_eq!(script.removals(), 1);
        assert_eq!(script.len(), 2);
    }
}
