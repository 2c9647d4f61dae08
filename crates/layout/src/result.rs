use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::math::{ConvexPolygon, Vec2, Vec3};
use foundation::time::Time;

use crate::candidate::{EntryId, ObjectKey, Placement};
use crate::cluster::{ClusterParams, ClusterResult};

/// An object that won screen space in a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub key: ObjectKey,
    /// `None` for synthesized clusters.
    pub entry: Option<EntryId>,
    pub placement: Placement,
    /// Projected anchor, screen pixels.
    pub screen_pos: Vec2,
    /// Orientation offset from the anchor (already rotated).
    pub offset: Vec2,
    /// Screen rotation, radians clockwise.
    pub rotation: f64,
    /// Final layout polygon on screen.
    pub polygon: ConvexPolygon,
    /// Final selection polygon on screen.
    pub selection_polygon: ConvexPolygon,
    pub world_anchor: Vec3,
    pub importance: f64,
    pub is_override: bool,
    /// Display parameters when this object is a cluster.
    pub cluster: Option<Arc<ClusterParams>>,
    /// Host content handle returned by the cluster generator.
    pub content: Option<u64>,
}

impl PlacedObject {
    pub fn is_cluster(&self) -> bool {
        self.key.is_cluster()
    }
}

/// Outcome of one completed pass.
///
/// Ordering contract: all maps iterate in `ObjectKey` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    pub time: Time,
    pub objects: BTreeMap<ObjectKey, PlacedObject>,
    /// Member key -> cluster key, for every member of every cluster formed in
    /// the pass (whether or not the cluster itself won space).
    pub memberships: BTreeMap<ObjectKey, ObjectKey>,
    pub clusters: BTreeMap<ObjectKey, ClusterResult>,
}

impl LayoutResult {
    pub fn is_active(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.objects.len()
    }

    /// Active objects that count toward the display cap.
    pub fn capped_count(&self) -> usize {
        self.objects.values().filter(|o| !o.is_override).count()
    }

    pub fn cluster_of(&self, member: &ObjectKey) -> Option<&ObjectKey> {
        self.memberships.get(member)
    }

    /// Layout polygons of all active objects, in key order.
    pub fn boundaries(&self) -> Vec<ConvexPolygon> {
        self.objects.values().map(|o| o.polygon.clone()).collect()
    }
}
