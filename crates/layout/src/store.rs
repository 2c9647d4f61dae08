//! Registry of layout entries.
//!
//! The store is owned by the pass engine. Producers never touch it directly:
//! they submit [`StoreCommand`]s which the engine applies, in submission
//! order, at the start of the next pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use crate::candidate::{EntryId, LayoutCandidate, ObjectKey, Placement};
use crate::result::LayoutResult;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    Add(Vec<(EntryId, LayoutCandidate)>),
    Remove(Vec<EntryId>),
    RemoveIdentities(Vec<String>),
    SetEnabled(Vec<EntryId>, bool),
    SetOverrides(BTreeSet<String>),
    Clear,
}

/// A candidate plus its evaluation state across passes.
///
/// The pass itself works on its own scratch state; what lands here is the
/// committed outcome of the last completed pass, which the next pass reads
/// to keep unchanged entries where they were.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub id: EntryId,
    pub candidate: LayoutCandidate,
    /// Producer-controlled switch (`set_enabled`).
    pub enabled: bool,
    /// Active in the last committed pass.
    pub current_enable: bool,
    /// Orientation held in the last committed pass.
    pub placement: Option<Placement>,
    /// Inputs changed since the last commit (new, resubmitted with different
    /// content, or toggled).
    pub changed: bool,
}

impl LayoutEntry {
    pub fn new(id: EntryId, candidate: LayoutCandidate) -> Self {
        Self {
            id,
            candidate,
            enabled: true,
            current_enable: false,
            placement: None,
            changed: true,
        }
    }

    /// Orientation the solver should try first: the committed one, as long
    /// as nothing about the entry changed.
    pub fn preferred_placement(&self) -> Option<Placement> {
        if self.changed || !self.current_enable {
            return None;
        }
        self.placement
    }

    pub fn key(&self) -> ObjectKey {
        match &self.candidate.identity {
            Some(identity) => ObjectKey::Identity(identity.clone()),
            None => ObjectKey::Entry(self.id),
        }
    }
}

#[derive(Debug, Default)]
pub struct EntryStore {
    entries: BTreeMap<EntryId, LayoutEntry>,
    identities: HashMap<String, EntryId>,
    overrides: BTreeSet<String>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&LayoutEntry> {
        self.entries.get(&id)
    }

    pub fn get_by_identity(&self, identity: &str) -> Option<&LayoutEntry> {
        self.identities
            .get(identity)
            .and_then(|id| self.entries.get(id))
    }

    /// Entries in ascending handle order.
    pub fn entries(&self) -> impl Iterator<Item = &LayoutEntry> {
        self.entries.values()
    }

    pub fn overrides(&self) -> &BTreeSet<String> {
        &self.overrides
    }

    pub fn is_override(&self, entry: &LayoutEntry) -> bool {
        entry
            .candidate
            .identity
            .as_ref()
            .is_some_and(|identity| self.overrides.contains(identity))
    }

    /// Applies one command. Returns `true` if anything changed.
    pub fn apply(&mut self, command: StoreCommand) -> bool {
        match command {
            StoreCommand::Add(batch) => {
                let mut changed = false;
                for (id, candidate) in batch {
                    changed |= self.insert(id, candidate);
                }
                changed
            }
            StoreCommand::Remove(ids) => {
                let mut changed = false;
                for id in ids {
                    changed |= self.remove(id);
                }
                changed
            }
            StoreCommand::RemoveIdentities(identities) => {
                let mut changed = false;
                for identity in identities {
                    if let Some(id) = self.identities.get(&identity).copied() {
                        changed |= self.remove(id);
                    }
                }
                changed
            }
            StoreCommand::SetEnabled(ids, enabled) => {
                let mut changed = false;
                for id in ids {
                    if let Some(entry) = self.entries.get_mut(&id)
                        && entry.enabled != enabled
                    {
                        entry.enabled = enabled;
                        entry.changed = true;
                        changed = true;
                    }
                }
                changed
            }
            StoreCommand::SetOverrides(overrides) => {
                if self.overrides == overrides {
                    false
                } else {
                    self.overrides = overrides;
                    true
                }
            }
            StoreCommand::Clear => {
                let changed = !self.entries.is_empty();
                self.entries.clear();
                self.identities.clear();
                changed
            }
        }
    }

    /// Last write wins: an identity already owned by another entry moves to
    /// the new one and the old entry is dropped.
    fn insert(&mut self, id: EntryId, candidate: LayoutCandidate) -> bool {
        let mut entry = LayoutEntry::new(id, candidate);
        if let Some(identity) = entry.candidate.identity.clone()
            && let Some(previous) = self.identities.insert(identity, id)
            && previous != id
            && let Some(old) = self.entries.remove(&previous)
        {
            trace!(old = previous.0, new = id.0, "identity resubmitted; replacing entry");
            // The replacement inherits the committed state so an identical
            // resubmission stays put.
            entry.changed = old.changed || old.candidate != entry.candidate;
            entry.current_enable = old.current_enable;
            entry.placement = old.placement;
        }
        self.entries.insert(id, entry);
        true
    }

    fn remove(&mut self, id: EntryId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        if let Some(identity) = &entry.candidate.identity
            && self.identities.get(identity) == Some(&id)
        {
            self.identities.remove(identity);
        }
        true
    }

    /// Writes a finished pass back into the entries and clears their
    /// `changed` flags. Returns how many entries changed enable state or
    /// orientation.
    pub fn commit(&mut self, result: &LayoutResult) -> usize {
        let mut transitions = 0;
        for entry in self.entries.values_mut() {
            let placement = match result.objects.get(&entry.key()) {
                Some(obj) if obj.entry == Some(entry.id) => Some(obj.placement),
                _ => None,
            };
            if placement.is_some() != entry.current_enable || placement != entry.placement {
                transitions += 1;
            }
            entry.current_enable = placement.is_some();
            entry.placement = placement;
            entry.changed = false;
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::{EntryStore, StoreCommand};
    use crate::candidate::{EntryId, LayoutCandidate, ObjectKey, Placement};
    use crate::result::{LayoutResult, PlacedObject};
    use foundation::math::{ConvexPolygon, Vec2, Vec3};
    use std::collections::BTreeSet;

    fn cand(identity: &str) -> LayoutCandidate {
        LayoutCandidate::point(Vec3::ZERO, 10.0, 10.0).with_identity(identity)
    }

    #[test]
    fn add_remove_and_lookup() {
        let mut store = EntryStore::new();
        assert!(store.apply(StoreCommand::Add(vec![
            (EntryId(1), cand("a")),
            (EntryId(2), LayoutCandidate::point(Vec3::ZERO, 1.0, 1.0)),
        ])));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_by_identity("a").map(|e| e.id), Some(EntryId(1)));
        assert_eq!(
            store.get(EntryId(2)).map(|e| e.key()),
            Some(ObjectKey::Entry(EntryId(2)))
        );

        assert!(store.apply(StoreCommand::Remove(vec![EntryId(1)])));
        assert!(store.get_by_identity("a").is_none());
        assert!(!store.apply(StoreCommand::Remove(vec![EntryId(1)])));
    }

    #[test]
    fn same_identity_in_one_batch_is_last_write_wins() {
        let mut store = EntryStore::new();
        store.apply(StoreCommand::Add(vec![
            (EntryId(1), cand("a").with_importance(1.0)),
            (EntryId(2), cand("a").with_importance(2.0)),
        ]));
        assert_eq!(store.len(), 1);
        let entry = store.get_by_identity("a").expect("entry");
        assert_eq!(entry.id, EntryId(2));
        assert_eq!(entry.candidate.importance, 2.0);
    }

    #[test]
    fn stale_remove_does_not_drop_replacement_identity() {
        let mut store = EntryStore::new();
        store.apply(StoreCommand::Add(vec![(EntryId(1), cand("a"))]));
        store.apply(StoreCommand::Add(vec![(EntryId(2), cand("a"))]));
        // Handle 1 is already gone; removing it must not unregister "a".
        assert!(!store.apply(StoreCommand::Remove(vec![EntryId(1)])));
        assert_eq!(store.get_by_identity("a").map(|e| e.id), Some(EntryId(2)));

        assert!(store.apply(StoreCommand::RemoveIdentities(vec!["a".into()])));
        assert!(store.is_empty());
    }

    #[test]
    fn enable_and_overrides_report_changes_only_once() {
        let mut store = EntryStore::new();
        store.apply(StoreCommand::Add(vec![(EntryId(1), cand("a"))]));
        assert!(store.apply(StoreCommand::SetEnabled(vec![EntryId(1)], false)));
        assert!(!store.apply(StoreCommand::SetEnabled(vec![EntryId(1)], false)));

        let overrides: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert!(store.apply(StoreCommand::SetOverrides(overrides.clone())));
        assert!(!store.apply(StoreCommand::SetOverrides(overrides)));
        let entry = store.get(EntryId(1)).expect("entry");
        assert!(store.is_override(entry));
    }

    fn placed(identity: &str, id: u64, placement: Placement) -> PlacedObject {
        PlacedObject {
            key: ObjectKey::Identity(identity.into()),
            entry: Some(EntryId(id)),
            placement,
            screen_pos: Vec2::ZERO,
            offset: Vec2::ZERO,
            rotation: 0.0,
            polygon: ConvexPolygon::centered_rect(10.0, 10.0),
            selection_polygon: ConvexPolygon::centered_rect(10.0, 10.0),
            world_anchor: Vec3::ZERO,
            importance: 0.0,
            is_override: false,
            cluster: None,
            content: None,
        }
    }

    fn result_with(objects: Vec<PlacedObject>) -> LayoutResult {
        LayoutResult {
            objects: objects.into_iter().map(|o| (o.key.clone(), o)).collect(),
            ..LayoutResult::default()
        }
    }

    #[test]
    fn commit_records_placement_and_clears_changed() {
        let mut store = EntryStore::new();
        store.apply(StoreCommand::Add(vec![(EntryId(1), cand("a")), (EntryId(2), cand("b"))]));
        let a = store.get(EntryId(1)).expect("entry");
        assert!(a.changed);
        assert_eq!(a.preferred_placement(), None);

        let result = result_with(vec![placed("a", 1, Placement::Right)]);
        assert_eq!(store.commit(&result), 1);
        let a = store.get(EntryId(1)).expect("entry");
        assert!(a.current_enable && !a.changed);
        assert_eq!(a.preferred_placement(), Some(Placement::Right));
        let b = store.get(EntryId(2)).expect("entry");
        assert!(!b.current_enable && !b.changed);
        assert_eq!(b.preferred_placement(), None);

        // Same outcome again: nothing transitions.
        assert_eq!(store.commit(&result), 0);

        store.apply(StoreCommand::SetEnabled(vec![EntryId(1)], false));
        assert_eq!(store.get(EntryId(1)).and_then(|e| e.preferred_placement()), None);
        assert_eq!(store.commit(&LayoutResult::default()), 1);
        assert!(!store.get(EntryId(1)).expect("entry").current_enable);
    }

    #[test]
    fn resubmission_keeps_committed_state_only_when_identical() {
        let mut store = EntryStore::new();
        store.apply(StoreCommand::Add(vec![(EntryId(1), cand("a"))]));
        store.commit(&result_with(vec![placed("a", 1, Placement::Above)]));

        store.apply(StoreCommand::Add(vec![(EntryId(2), cand("a"))]));
        let a = store.get_by_identity("a").expect("entry");
        assert_eq!(a.id, EntryId(2));
        assert_eq!(a.preferred_placement(), Some(Placement::Above));

        store.apply(StoreCommand::Add(vec![(EntryId(3), cand("a").with_importance(5.0))]));
        let a = store.get_by_identity("a").expect("entry");
        assert!(a.changed && a.current_enable);
        assert_eq!(a.preferred_placement(), None);
    }
}
