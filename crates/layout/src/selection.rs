use std::sync::Arc;

use foundation::math::{ConvexPolygon, Vec2, stable_total_cmp_f64};

use crate::candidate::{EntryId, ObjectKey};
use crate::result::LayoutResult;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectableObject {
    pub key: ObjectKey,
    pub entry: Option<EntryId>,
    pub polygon: ConvexPolygon,
    pub screen_pos: Vec2,
    pub importance: f64,
    /// Member keys when the object is a cluster.
    pub members: Vec<ObjectKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionHit {
    pub key: ObjectKey,
    pub entry: Option<EntryId>,
    /// Screen distance from the query point to the object's anchor.
    pub distance_px: f64,
}

/// Immutable picture of what can be selected after a pass.
///
/// Published as an `Arc` so UI threads can hit-test without touching the
/// engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSnapshot {
    objects: Arc<Vec<SelectableObject>>,
}

impl SelectionSnapshot {
    /// Clusters whose class is not selectable are left out.
    pub fn from_result(result: &LayoutResult) -> Self {
        let objects = result
            .objects
            .values()
            .filter(|o| o.cluster.as_ref().is_none_or(|p| p.selectable))
            .map(|o| SelectableObject {
                key: o.key.clone(),
                entry: o.entry,
                polygon: o.selection_polygon.clone(),
                screen_pos: o.screen_pos,
                importance: o.importance,
                members: result
                    .clusters
                    .get(&o.key)
                    .map(|c| c.members.clone())
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            objects: Arc::new(objects),
        }
    }

    /// Selectable objects in key order.
    pub fn objects(&self) -> &[SelectableObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects whose selection polygon contains `point`.
    ///
    /// Ordering contract: importance descending, then key ascending.
    pub fn hit_test(&self, point: Vec2) -> Vec<SelectionHit> {
        let mut hits: Vec<(&SelectableObject, f64)> = self
            .objects
            .iter()
            .filter(|o| o.polygon.contains(point))
            .map(|o| (o, (o.screen_pos - point).length()))
            .collect();
        hits.sort_by(|(a, _), (b, _)| {
            stable_total_cmp_f64(b.importance, a.importance).then_with(|| a.key.cmp(&b.key))
        });
        hits.into_iter()
            .map(|(o, d)| SelectionHit {
                key: o.key.clone(),
                entry: o.entry,
                distance_px: d,
            })
            .collect()
    }

    /// Closest anchor within `max_distance_px`; ties go to the lower key.
    pub fn nearest(&self, point: Vec2, max_distance_px: f64) -> Option<SelectionHit> {
        self.objects
            .iter()
            .map(|o| (o, (o.screen_pos - point).length()))
            .filter(|(_, d)| *d <= max_distance_px)
            .min_by(|(a, da), (b, db)| stable_total_cmp_f64(*da, *db).then_with(|| a.key.cmp(&b.key)))
            .map(|(o, d)| SelectionHit {
                key: o.key.clone(),
                entry: o.entry,
                distance_px: d,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::SelectionSnapshot;
    use crate::candidate::{EntryId, ObjectKey, Placement};
    use crate::cluster::ClusterParams;
    use crate::result::{LayoutResult, PlacedObject};
    use foundation::math::{ConvexPolygon, Vec2, Vec3};
    use std::sync::Arc;

    fn placed(key: ObjectKey, x: f64, importance: f64) -> PlacedObject {
        let poly = ConvexPolygon::centered_rect(20.0, 20.0).translated(Vec2::new(x, 0.0));
        PlacedObject {
            key,
            entry: Some(EntryId(1)),
            placement: Placement::Center,
            screen_pos: Vec2::new(x, 0.0),
            offset: Vec2::ZERO,
            rotation: 0.0,
            polygon: poly.clone(),
            selection_polygon: poly,
            world_anchor: Vec3::ZERO,
            importance,
            is_override: false,
            cluster: None,
            content: None,
        }
    }

    fn snapshot() -> SelectionSnapshot {
        let mut result = LayoutResult::default();
        for o in [
            placed(ObjectKey::Identity("a".into()), 0.0, 1.0),
            placed(ObjectKey::Identity("b".into()), 5.0, 3.0),
            placed(ObjectKey::Identity("c".into()), 40.0, 9.0),
        ] {
            result.objects.insert(o.key.clone(), o);
        }
        let mut hidden = placed(ObjectKey::Cluster("cluster-0-x".into()), 5.0, 99.0);
        hidden.entry = None;
        hidden.cluster = Some(Arc::new(ClusterParams {
            selectable: false,
            ..ClusterParams::default()
        }));
        result.objects.insert(hidden.key.clone(), hidden);
        SelectionSnapshot::from_result(&result)
    }

    #[test]
    fn hit_test_orders_by_importance_and_skips_unselectable_clusters() {
        let s = snapshot();
        assert_eq!(s.len(), 3);
        let keys: Vec<ObjectKey> = s.hit_test(Vec2::new(4.0, 0.0)).into_iter().map(|h| h.key).collect();
        assert_eq!(
            keys,
            vec![ObjectKey::Identity("b".into()), ObjectKey::Identity("a".into())]
        );
        assert!(s.hit_test(Vec2::new(100.0, 0.0)).is_empty());
    }

    #[test]
    fn nearest_respects_radius() {
        let s = snapshot();
        let hit = s.nearest(Vec2::new(30.0, 0.0), 15.0).expect("hit");
        assert_eq!(hit.key, ObjectKey::Identity("c".into()));
        assert_eq!(hit.distance_px, 10.0);
        assert!(s.nearest(Vec2::new(200.0, 0.0), 15.0).is_none());
    }
}
