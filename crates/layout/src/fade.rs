//! Cross-pass diffing and fade bookkeeping.
//!
//! The scheduler compares consecutive results by [`ObjectKey`] and emits the
//! smallest change set that moves a drawable sink from one to the other.
//! Removed objects stay visually present until their fade-out window ends.

use std::collections::{BTreeMap, BTreeSet};

use foundation::math::{ConvexPolygon, Vec2, approx_eq};
use foundation::time::{Time, TimeSpan};

use crate::candidate::ObjectKey;
use crate::config::FadeSettings;
use crate::result::{LayoutResult, PlacedObject};

const POSITION_EPS_PX: f64 = 0.01;
const ROTATION_EPS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    Shown,
    Hidden,
    /// Absorbed into (member removed) or created as (cluster added) `cluster`.
    Clustered { cluster: ObjectKey },
    /// Released from (member added) or dissolution of (cluster removed) `cluster`.
    Declustered { cluster: ObjectKey },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddedObject {
    pub object: PlacedObject,
    pub fade: TimeSpan,
    pub reason: ChangeReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedObject {
    pub object: PlacedObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedObject {
    /// Last placed state, for drawing the fade-out.
    pub object: PlacedObject,
    pub fade: TimeSpan,
    pub reason: ChangeReason,
}

/// Minimal update for a drawable sink. Each list is in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub time: Time,
    pub added: Vec<AddedObject>,
    pub updated: Vec<UpdatedObject>,
    pub removed: Vec<RemovedObject>,
    /// Placement polygons of every active object, when debug boundaries are on.
    pub debug_boundaries: Option<Vec<ConvexPolygon>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FadeScheduler {
    active: BTreeSet<ObjectKey>,
    fading_in: BTreeMap<ObjectKey, TimeSpan>,
    fading_out: BTreeMap<ObjectKey, TimeSpan>,
}

impl FadeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs `next` against `prev` and records the resulting fades.
    pub fn diff(
        &mut self,
        prev: &LayoutResult,
        next: &LayoutResult,
        fades: FadeSettings,
        debug_boundaries: bool,
    ) -> ChangeSet {
        let t = next.time;
        let mut changes = ChangeSet {
            time: t,
            debug_boundaries: debug_boundaries.then(|| next.boundaries()),
            ..ChangeSet::default()
        };

        for (key, obj) in &next.objects {
            match prev.objects.get(key) {
                Some(before) => {
                    if moved(before, obj) {
                        changes.updated.push(UpdatedObject {
                            object: obj.clone(),
                        });
                    }
                }
                None => {
                    let (reason, duration) = added_reason(key, obj, prev, fades);
                    let fade = TimeSpan::starting_at(t, duration);
                    self.fading_out.remove(key);
                    self.fading_in.insert(key.clone(), fade);
                    changes.added.push(AddedObject {
                        object: obj.clone(),
                        fade,
                        reason,
                    });
                }
            }
        }

        for (key, obj) in &prev.objects {
            if next.objects.contains_key(key) {
                continue;
            }
            let (reason, duration) = removed_reason(key, prev, next, fades);
            let fade = TimeSpan::starting_at(t, duration);
            self.fading_in.remove(key);
            self.fading_out.insert(key.clone(), fade);
            changes.removed.push(RemovedObject {
                object: obj.clone(),
                fade,
                reason,
            });
        }

        self.active = next.objects.keys().cloned().collect();
        changes
    }

    /// Forgets fades whose window ended at or before `now`.
    pub fn expire(&mut self, now: Time) {
        self.fading_in.retain(|_, w| now.0 < w.end.0);
        self.fading_out.retain(|_, w| now.0 < w.end.0);
    }

    /// Some tracked window ended at or before `now` and can be expired.
    pub fn needs_expiry(&self, now: Time) -> bool {
        self.fading_in
            .values()
            .chain(self.fading_out.values())
            .any(|w| now.0 >= w.end.0)
    }

    pub fn has_active_fades(&self, now: Time) -> bool {
        self.fading_in
            .values()
            .chain(self.fading_out.values())
            .any(|w| now.0 < w.end.0)
    }

    /// Opacity in `[0, 1]` a sink should draw `key` with at `now`.
    pub fn visual_alpha(&self, key: &ObjectKey, now: Time) -> f64 {
        if self.active.contains(key) {
            return self
                .fading_in
                .get(key)
                .map_or(1.0, |w| w.progress(now));
        }
        match self.fading_out.get(key) {
            Some(w) if now.0 < w.end.0 => 1.0 - w.progress(now),
            _ => 0.0,
        }
    }

    /// Active, or still inside its fade-out window.
    pub fn is_visually_present(&self, key: &ObjectKey, now: Time) -> bool {
        self.active.contains(key)
            || self
                .fading_out
                .get(key)
                .is_some_and(|w| now.0 < w.end.0)
    }

    pub fn fading_out(&self) -> impl Iterator<Item = (&ObjectKey, &TimeSpan)> {
        self.fading_out.iter()
    }
}

fn moved(a: &PlacedObject, b: &PlacedObject) -> bool {
    !close(a.screen_pos, b.screen_pos)
        || !close(a.offset, b.offset)
        || !approx_eq(a.rotation, b.rotation, ROTATION_EPS)
}

fn close(a: Vec2, b: Vec2) -> bool {
    approx_eq(a.x, b.x, POSITION_EPS_PX) && approx_eq(a.y, b.y, POSITION_EPS_PX)
}

fn added_reason(
    key: &ObjectKey,
    obj: &PlacedObject,
    prev: &LayoutResult,
    fades: FadeSettings,
) -> (ChangeReason, f64) {
    if let Some(params) = &obj.cluster {
        let reason = ChangeReason::Clustered {
            cluster: key.clone(),
        };
        return (reason, fades.transition_in(params.animation_s));
    }
    if let Some(cluster) = prev.memberships.get(key) {
        let animation = prev.clusters.get(cluster).and_then(|c| c.params.animation_s);
        let reason = ChangeReason::Declustered {
            cluster: cluster.clone(),
        };
        return (reason, fades.transition_in(animation));
    }
    (ChangeReason::Shown, fades.fade_in())
}

fn removed_reason(
    key: &ObjectKey,
    prev: &LayoutResult,
    next: &LayoutResult,
    fades: FadeSettings,
) -> (ChangeReason, f64) {
    if let Some(cluster) = next.memberships.get(key) {
        let animation = next.clusters.get(cluster).and_then(|c| c.params.animation_s);
        let reason = ChangeReason::Clustered {
            cluster: cluster.clone(),
        };
        return (reason, fades.transition_out(animation));
    }
    if let Some(cluster) = prev.clusters.get(key) {
        let reason = ChangeReason::Declustered {
            cluster: key.clone(),
        };
        return (reason, fades.transition_out(cluster.params.animation_s));
    }
    (ChangeReason::Hidden, fades.fade_out())
}

#[cfg(test)]
mod tests {
    use super::{ChangeReason, FadeScheduler};
    use crate::candidate::{EntryId, ObjectKey, Placement};
    use crate::cluster::{ClusterParams, ClusterResult};
    use crate::config::FadeSettings;
    use crate::result::{LayoutResult, PlacedObject};
    use foundation::math::{ConvexPolygon, Vec2, Vec3};
    use foundation::time::Time;
    use std::sync::Arc;

    fn key(s: &str) -> ObjectKey {
        ObjectKey::Identity(s.into())
    }

    fn obj(k: &str, x: f64) -> PlacedObject {
        PlacedObject {
            key: key(k),
            entry: Some(EntryId(1)),
            placement: Placement::Center,
            screen_pos: Vec2::new(x, 10.0),
            offset: Vec2::ZERO,
            rotation: 0.0,
            polygon: ConvexPolygon::centered_rect(4.0, 4.0).translated(Vec2::new(x, 10.0)),
            selection_polygon: ConvexPolygon::centered_rect(4.0, 4.0).translated(Vec2::new(x, 10.0)),
            world_anchor: Vec3::ZERO,
            importance: 1.0,
            is_override: false,
            cluster: None,
            content: None,
        }
    }

    fn result(t: f64, objects: &[PlacedObject]) -> LayoutResult {
        LayoutResult {
            time: Time(t),
            objects: objects.iter().map(|o| (o.key.clone(), o.clone())).collect(),
            ..LayoutResult::default()
        }
    }

    fn fades() -> FadeSettings {
        FadeSettings {
            enabled: true,
            fade_in_s: 0.2,
            fade_out_s: 0.5,
        }
    }

    #[test]
    fn unchanged_objects_update_only_when_moved() {
        let mut s = FadeScheduler::new();
        let a = result(0.0, &[obj("a", 10.0), obj("b", 20.0)]);
        let b = result(1.0, &[obj("a", 10.001), obj("b", 25.0)]);
        let changes = s.diff(&a, &b, fades(), false);
        assert!(changes.added.is_empty() && changes.removed.is_empty());
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.updated[0].object.key, key("b"));
        assert_eq!(changes.debug_boundaries, None);
    }

    #[test]
    fn removed_objects_stay_present_exactly_until_fade_end() {
        let mut s = FadeScheduler::new();
        let shown = result(0.0, &[obj("a", 10.0)]);
        s.diff(&LayoutResult::default(), &shown, fades(), false);
        assert_eq!(s.visual_alpha(&key("a"), Time(0.1)), 0.5);

        let hidden = result(1.0, &[]);
        let changes = s.diff(&shown, &hidden, fades(), true);
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].reason, ChangeReason::Hidden);
        assert_eq!(changes.removed[0].fade.end, Time(1.5));
        assert_eq!(changes.debug_boundaries, Some(Vec::new()));

        assert!(s.is_visually_present(&key("a"), Time(1.49)));
        assert!(!s.is_visually_present(&key("a"), Time(1.5)));
        assert_eq!(s.visual_alpha(&key("a"), Time(1.25)), 0.5);
        assert!(s.has_active_fades(Time(1.2)));
        assert!(s.needs_expiry(Time(1.5)));
        s.expire(Time(1.5));
        assert!(!s.has_active_fades(Time(1.5)));
    }

    #[test]
    fn reviving_a_fading_object_starts_a_fresh_fade_in() {
        let mut s = FadeScheduler::new();
        let shown = result(0.0, &[obj("a", 10.0)]);
        let hidden = result(1.0, &[]);
        s.diff(&LayoutResult::default(), &shown, fades(), false);
        s.diff(&shown, &hidden, fades(), false);

        let again = result(1.1, &[obj("a", 10.0)]);
        let changes = s.diff(&hidden, &again, fades(), false);
        assert_eq!(changes.added[0].reason, ChangeReason::Shown);
        assert_eq!(changes.added[0].fade.start, Time(1.1));
        assert!(s.fading_out().next().is_none());
        assert!(s.is_visually_present(&key("a"), Time(5.0)));
    }

    #[test]
    fn disabled_fades_are_zero_length() {
        let mut s = FadeScheduler::new();
        let off = FadeSettings {
            enabled: false,
            ..fades()
        };
        let shown = result(0.0, &[obj("a", 10.0)]);
        let hidden = result(1.0, &[]);
        s.diff(&LayoutResult::default(), &shown, off, false);
        let changes = s.diff(&shown, &hidden, off, false);
        assert_eq!(changes.removed[0].fade.duration(), 0.0);
        assert!(!s.is_visually_present(&key("a"), Time(1.0)));
    }

    fn clustered(t: f64, members: &[&str]) -> LayoutResult {
        let ck = ObjectKey::Cluster("cluster-0-test".into());
        let params = Arc::new(ClusterParams::default());
        let mut badge = obj("unused", 50.0);
        badge.key = ck.clone();
        badge.entry = None;
        badge.cluster = Some(params.clone());
        let mut r = result(t, &[badge]);
        for m in members {
            r.memberships.insert(key(m), ck.clone());
        }
        r.clusters.insert(
            ck.clone(),
            ClusterResult {
                key: ck,
                group: 0,
                members: members.iter().map(|m| key(m)).collect(),
                member_ids: vec![EntryId(1), EntryId(2)],
                screen_pos: Vec2::new(50.0, 10.0),
                world_anchor: Vec3::ZERO,
                importance: 1.0,
                footprint: ConvexPolygon::centered_rect(4.0, 4.0),
                content: None,
                params,
                generated: true,
            },
        );
        r
    }

    #[test]
    fn cluster_transitions_use_the_matching_direction() {
        let uneven = FadeSettings {
            enabled: true,
            fade_in_s: 0.2,
            fade_out_s: 1.0,
        };
        let mut s = FadeScheduler::new();
        let loose = result(1.0, &[obj("a", 10.0), obj("b", 20.0)]);
        let merged = clustered(2.0, &["a", "b"]);

        let changes = s.diff(&loose, &merged, uneven, false);
        assert_eq!(changes.removed.len(), 2);
        for r in &changes.removed {
            assert!(matches!(r.reason, ChangeReason::Clustered { .. }));
            assert!((r.fade.duration() - 1.0).abs() < 1e-9);
        }
        assert_eq!(changes.added.len(), 1);
        assert!((changes.added[0].fade.duration() - 0.2).abs() < 1e-9);
        assert!(s.is_visually_present(&key("a"), Time(2.9)));
        assert!(!s.is_visually_present(&key("a"), Time(3.0)));

        let loose_again = result(5.0, &[obj("a", 10.0), obj("b", 20.0)]);
        let changes = s.diff(&merged, &loose_again, uneven, false);
        assert!(changes.added.iter().all(|a| (a.fade.duration() - 0.2).abs() < 1e-9));
        assert!(matches!(changes.removed[0].reason, ChangeReason::Declustered { .. }));
        assert!((changes.removed[0].fade.duration() - 1.0).abs() < 1e-9);
    }
}
