//! Proximity clustering of clusterable candidates.
//!
//! Runs after the main placement. Candidates of one cluster group whose
//! footprints lie within `proximity_px` of each other form a component; a
//! component large enough and containing at least one member that lost its
//! space is replaced by a synthesized cluster candidate.

use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::bounds::Aabb2;
use foundation::math::{ConvexPolygon, Vec2, Vec3};
use tracing::{trace, warn};

use crate::candidate::{EntryId, ObjectKey};
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::grid::OverlapGrid;

/// Display parameters shared by every cluster of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    /// Transition duration for member/cluster swaps; `None` uses the regular
    /// fade durations.
    pub animation_s: Option<f64>,
    pub selectable: bool,
    /// Footprint used when the generator produces nothing usable.
    pub size_px: Vec2,
    /// Opaque host handle for the shader animating member motion.
    pub motion_shader: Option<u64>,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            animation_s: None,
            selectable: true,
            size_px: Vec2::new(32.0, 32.0),
            motion_shader: None,
        }
    }
}

/// A member as seen by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMember {
    pub key: ObjectKey,
    pub id: EntryId,
    pub screen_pos: Vec2,
    pub world_anchor: Vec3,
    pub importance: f64,
}

/// What a generator hands back for one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterVisual {
    /// Screen footprint relative to the cluster anchor.
    pub footprint: ConvexPolygon,
    /// Host content handle (texture, drawable, ...), passed through untouched.
    pub content: Option<u64>,
}

/// Host hook producing cluster visuals.
///
/// Per pass the engine calls `start` once, `make_cluster` once per cluster in
/// deterministic order, then `end` once.
pub trait ClusterGenerator: Send {
    fn start(&mut self) {}

    fn make_cluster(
        &mut self,
        group: i32,
        members: &[ClusterMember],
    ) -> Result<ClusterVisual, ClusterError>;

    fn end(&mut self) {}

    fn params(&self, _group: i32) -> ClusterParams {
        ClusterParams::default()
    }
}

/// A clusterable candidate after the main placement.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInput {
    pub key: ObjectKey,
    pub id: EntryId,
    pub group: i32,
    /// Center-placement footprint on screen.
    pub bounds: Aabb2,
    pub screen_pos: Vec2,
    pub world_anchor: Vec3,
    pub importance: f64,
    pub placed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    pub key: ObjectKey,
    pub group: i32,
    /// Member keys, ascending.
    pub members: Vec<ObjectKey>,
    pub member_ids: Vec<EntryId>,
    pub screen_pos: Vec2,
    pub world_anchor: Vec3,
    pub importance: f64,
    pub footprint: ConvexPolygon,
    pub content: Option<u64>,
    pub params: Arc<ClusterParams>,
    /// `false` when the fallback footprint was used.
    pub generated: bool,
}

/// Groups `inputs` into clusters.
///
/// Returns member index lists, each sorted by member key; the lists are
/// ordered by group, then by first member key.
pub fn find_clusters(
    inputs: &[ClusterInput],
    config: &ClusterConfig,
    bounds: Aabb2,
    cells: usize,
) -> Vec<Vec<usize>> {
    let mut by_group: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, input) in inputs.iter().enumerate() {
        if input.group >= 0 {
            by_group.entry(input.group).or_default().push(i);
        }
    }

    let half = config.proximity_px * 0.5;
    let mut out = Vec::new();
    for (group, indices) in by_group {
        if indices.len() < config.min_members {
            continue;
        }

        let mut grid = OverlapGrid::new(bounds, cells);
        // grid slot -> position in `indices`
        let mut slots = Vec::with_capacity(indices.len());
        let mut rects = Vec::with_capacity(indices.len());
        for (local, &i) in indices.iter().enumerate() {
            let rect = inputs[i].bounds.expanded(half, half);
            if grid.force_insert(ConvexPolygon::from_aabb(&rect)).is_some() {
                slots.push(local);
                rects.push(rect);
            }
        }

        let mut sets = DisjointSet::new(indices.len());
        for (slot, rect) in rects.iter().enumerate() {
            for hit in grid.query(rect) {
                sets.union(slots[slot], slots[hit]);
            }
        }

        let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &local in &slots {
            components
                .entry(sets.find(local))
                .or_default()
                .push(indices[local]);
        }

        let mut found: Vec<Vec<usize>> = components
            .into_values()
            .filter(|members| {
                members.len() >= config.min_members && members.iter().any(|&i| !inputs[i].placed)
            })
            .map(|mut members| {
                members.sort_by(|&a, &b| inputs[a].key.cmp(&inputs[b].key));
                members
            })
            .collect();
        found.sort_by(|a, b| inputs[a[0]].key.cmp(&inputs[b[0]].key));
        trace!(group, clusters = found.len(), "cluster components");
        out.extend(found);
    }
    out
}

/// Synthesizes one cluster per component, driving the generator lifecycle.
pub fn build_clusters(
    components: &[Vec<usize>],
    inputs: &[ClusterInput],
    generator: &mut dyn ClusterGenerator,
    config: &ClusterConfig,
) -> Vec<ClusterResult> {
    generator.start();
    let mut params_by_group: BTreeMap<i32, Arc<ClusterParams>> = BTreeMap::new();
    let mut out = Vec::with_capacity(components.len());

    for component in components {
        let Some(&first) = component.first() else {
            continue;
        };
        let group = inputs[first].group;
        let params = params_by_group
            .entry(group)
            .or_insert_with(|| Arc::new(generator.params(group)))
            .clone();

        let members: Vec<ClusterMember> = component
            .iter()
            .map(|&i| ClusterMember {
                key: inputs[i].key.clone(),
                id: inputs[i].id,
                screen_pos: inputs[i].screen_pos,
                world_anchor: inputs[i].world_anchor,
                importance: inputs[i].importance,
            })
            .collect();
        let key = cluster_key(group, &members);

        let (footprint, content, generated) = match generator.make_cluster(group, &members) {
            Ok(visual) if usable(&visual.footprint) => (visual.footprint, visual.content, true),
            Ok(visual) => {
                warn!(cluster = %key, error = %ClusterError::EmptyContent, "using fallback footprint");
                (fallback(&params), visual.content, false)
            }
            Err(e) => {
                warn!(cluster = %key, error = %e, "using fallback footprint");
                (fallback(&params), None, false)
            }
        };

        let n = members.len() as f64;
        let screen_sum = members
            .iter()
            .fold(Vec2::ZERO, |acc, m| acc + m.screen_pos);
        let world_sum = members
            .iter()
            .fold(Vec3::ZERO, |acc, m| acc + m.world_anchor);
        let importance = members
            .iter()
            .map(|m| m.importance)
            .fold(f64::NEG_INFINITY, f64::max)
            + config.importance_boost;

        out.push(ClusterResult {
            key,
            group,
            members: members.iter().map(|m| m.key.clone()).collect(),
            member_ids: members.iter().map(|m| m.id).collect(),
            screen_pos: screen_sum.scale(1.0 / n),
            world_anchor: world_sum.scale(1.0 / n),
            importance,
            footprint,
            content,
            params,
            generated,
        });
    }

    generator.end();
    out
}

/// `cluster-{group}-{digest}` over the group and the sorted member keys.
pub fn cluster_key(group: i32, members: &[ClusterMember]) -> ObjectKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&group.to_le_bytes());
    for m in members {
        hasher.update(m.key.to_string().as_bytes());
        hasher.update(&[0]);
    }
    let hex = hasher.finalize().to_hex();
    ObjectKey::Cluster(format!("cluster-{group}-{}", &hex.as_str()[..16]))
}

fn usable(footprint: &ConvexPolygon) -> bool {
    let b = footprint.bounds();
    footprint.is_finite() && !b.is_empty() && b.width() > 0.0 && b.height() > 0.0
}

fn fallback(params: &ClusterParams) -> ConvexPolygon {
    ConvexPolygon::centered_rect(params.size_px.x.max(1.0), params.size_px.y.max(1.0))
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// The smaller root wins so component roots are stable.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}
