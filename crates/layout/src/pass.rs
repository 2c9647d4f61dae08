//! One layout pass: project, place, cluster, re-place, assemble.

use std::collections::{HashMap, HashSet};

use foundation::math::Vec3;
use runtime::{CancelToken, Cancelled};
use tracing::trace;

use crate::candidate::{EntryId, Placement, PlacementMask};
use crate::cluster::{ClusterGenerator, ClusterInput, ClusterResult, build_clusters, find_clusters};
use crate::config::LayoutConfig;
use crate::grid::OverlapGrid;
use crate::placement::{
    Outcome, PlacementInput, PlacementSource, RejectReason, SolveOutput, SolverParams, solve,
};
use crate::projection::{Projector, ScreenAnchor};
use crate::result::{LayoutResult, PlacedObject};
use crate::store::EntryStore;
use crate::view::ViewState;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub candidates: usize,
    pub visible: usize,
    pub placed: usize,
    pub rejected_overlap: usize,
    pub rejected_cap: usize,
    pub merged: usize,
    pub clusters: usize,
}

/// Lays out every entry in `store` against `view`.
///
/// Reads the store only; the caller commits the result.
pub fn compute_layout(
    store: &EntryStore,
    config: &LayoutConfig,
    generator: Option<&mut dyn ClusterGenerator>,
    view: &ViewState,
    token: &CancelToken,
) -> Result<(LayoutResult, PassStats), Cancelled> {
    let projector = Projector::new(view, config.screen_margin_fraction);
    let bounds = projector.bounds();

    let mut inputs = Vec::new();
    let mut anchors: HashMap<EntryId, ScreenAnchor> = HashMap::new();
    for entry in store.entries() {
        match projector.evaluate(&entry.candidate, entry.enabled) {
            Ok(anchor) => {
                let c = &entry.candidate;
                inputs.push(PlacementInput {
                    source: PlacementSource::Entry(entry.id),
                    key: entry.key(),
                    importance: c.importance,
                    is_override: store.is_override(entry),
                    merge_tag: c.merge_tag.clone(),
                    screen_pos: anchor.screen_pos,
                    rotation: anchor.rotation,
                    footprint: c.footprint.clone(),
                    placements: c.placements,
                    preferred: entry.preferred_placement(),
                });
                anchors.insert(entry.id, anchor);
            }
            Err(reason) => trace!(entry = entry.id.0, reason = reason.name(), "culled"),
        }
    }

    let params = SolverParams {
        cap: config.max_display(),
        spacing_px: config.placement_spacing_px,
    };
    let mut grid = OverlapGrid::new(bounds, config.grid_cells);
    let first = solve(&inputs, &mut grid, params, token)?;

    let mut clusters = match generator {
        Some(generator) if config.cluster.enabled => {
            let cluster_inputs = clusterable(store, &inputs, &first, &anchors, config);
            token.checkpoint()?;
            let components = find_clusters(&cluster_inputs, &config.cluster, bounds, config.grid_cells);
            if components.is_empty() {
                Vec::new()
            } else {
                build_clusters(&components, &cluster_inputs, generator, &config.cluster)
            }
        }
        _ => Vec::new(),
    };

    // A cluster that cannot be placed gives its members back; retry until
    // every remaining cluster fits.
    let (inputs, solved) = loop {
        if clusters.is_empty() {
            break (inputs, first);
        }
        token.checkpoint()?;
        let second = with_clusters(&inputs, &clusters);
        let mut grid = OverlapGrid::new(bounds, config.grid_cells);
        let solved = solve(&second, &mut grid, params, token)?;

        let rejected: HashSet<usize> = second
            .iter()
            .zip(&solved.outcomes)
            .filter_map(|(input, outcome)| match (input.source, outcome) {
                (PlacementSource::Cluster(ci), Outcome::Rejected(reason)) => {
                    trace!(key = %input.key, reason = reason.name(), "cluster dissolved");
                    Some(ci)
                }
                _ => None,
            })
            .collect();
        if rejected.is_empty() {
            break (second, solved);
        }
        clusters = clusters
            .into_iter()
            .enumerate()
            .filter(|(ci, _)| !rejected.contains(ci))
            .map(|(_, c)| c)
            .collect();
    };

    let stats = PassStats {
        candidates: store.len(),
        visible: anchors.len(),
        placed: solved.placed,
        rejected_overlap: solved.rejected_overlap,
        rejected_cap: solved.rejected_cap,
        merged: solved.merged,
        clusters: clusters.len(),
    };
    let result = assemble(store, view, &inputs, &solved, &anchors, clusters);
    Ok((result, stats))
}

/// First-pass inputs without cluster members, plus one input per cluster.
fn with_clusters(inputs: &[PlacementInput], clusters: &[ClusterResult]) -> Vec<PlacementInput> {
    let members: HashSet<EntryId> = clusters
        .iter()
        .flat_map(|c| c.member_ids.iter().copied())
        .collect();
    let mut out: Vec<PlacementInput> = inputs
        .iter()
        .filter(|i| !matches!(i.source, PlacementSource::Entry(id) if members.contains(&id)))
        .cloned()
        .collect();
    out.extend(clusters.iter().enumerate().map(|(ci, c)| PlacementInput {
        source: PlacementSource::Cluster(ci),
        key: c.key.clone(),
        importance: c.importance,
        is_override: false,
        merge_tag: None,
        screen_pos: c.screen_pos,
        rotation: 0.0,
        footprint: c.footprint.clone(),
        placements: PlacementMask::CENTER,
        preferred: None,
    }));
    out
}

/// Placed or overlap-rejected candidates with a cluster group. Capped and
/// merged candidates stay out.
fn clusterable(
    store: &EntryStore,
    inputs: &[PlacementInput],
    solved: &SolveOutput,
    anchors: &HashMap<EntryId, ScreenAnchor>,
    config: &LayoutConfig,
) -> Vec<ClusterInput> {
    let mut out = Vec::new();
    for (input, outcome) in inputs.iter().zip(&solved.outcomes) {
        let PlacementSource::Entry(id) = input.source else {
            continue;
        };
        let (Some(entry), Some(anchor)) = (store.get(id), anchors.get(&id)) else {
            continue;
        };
        if !entry.candidate.is_clusterable() {
            continue;
        }
        let placed = match outcome {
            Outcome::Placed(_) => true,
            Outcome::Rejected(RejectReason::Overlap) => false,
            Outcome::Rejected(_) => continue,
        };
        let (polygon, _) = input.polygon_at(Placement::Center, config.placement_spacing_px);
        out.push(ClusterInput {
            key: input.key.clone(),
            id,
            group: entry.candidate.cluster_group,
            bounds: polygon.bounds(),
            screen_pos: anchor.screen_pos,
            world_anchor: anchor.world_anchor,
            importance: input.importance,
            placed,
        });
    }
    out
}

fn assemble(
    store: &EntryStore,
    view: &ViewState,
    inputs: &[PlacementInput],
    solved: &SolveOutput,
    anchors: &HashMap<EntryId, ScreenAnchor>,
    clusters: Vec<ClusterResult>,
) -> LayoutResult {
    let mut result = LayoutResult {
        time: view.time,
        ..LayoutResult::default()
    };

    for (input, outcome) in inputs.iter().zip(&solved.outcomes) {
        let Outcome::Placed(placed) = outcome else {
            continue;
        };
        let object = match input.source {
            PlacementSource::Entry(id) => {
                let Some(entry) = store.get(id) else {
                    continue;
                };
                let selection_polygon = entry
                    .candidate
                    .selection_polygon()
                    .rotated(input.rotation)
                    .translated(input.screen_pos + placed.offset);
                PlacedObject {
                    key: input.key.clone(),
                    entry: Some(id),
                    placement: placed.placement,
                    screen_pos: input.screen_pos,
                    offset: placed.offset,
                    rotation: input.rotation,
                    polygon: placed.polygon.clone(),
                    selection_polygon,
                    world_anchor: anchors.get(&id).map_or(Vec3::ZERO, |a| a.world_anchor),
                    importance: input.importance,
                    is_override: input.is_override,
                    cluster: None,
                    content: None,
                }
            }
            PlacementSource::Cluster(ci) => {
                let Some(cluster) = clusters.get(ci) else {
                    continue;
                };
                PlacedObject {
                    key: cluster.key.clone(),
                    entry: None,
                    placement: placed.placement,
                    screen_pos: input.screen_pos,
                    offset: placed.offset,
                    rotation: 0.0,
                    polygon: placed.polygon.clone(),
                    selection_polygon: placed.polygon.clone(),
                    world_anchor: cluster.world_anchor,
                    importance: cluster.importance,
                    is_override: false,
                    cluster: Some(cluster.params.clone()),
                    content: cluster.content,
                }
            }
        };
        result.objects.insert(object.key.clone(), object);
    }

    for cluster in clusters {
        for member in &cluster.members {
            result.memberships.insert(member.clone(), cluster.key.clone());
        }
        result.clusters.insert(cluster.key.clone(), cluster);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::compute_layout;
    use crate::candidate::{EntryId, LayoutCandidate, ObjectKey};
    use crate::cluster::{ClusterGenerator, ClusterMember, ClusterVisual};
    use crate::config::LayoutConfig;
    use crate::error::ClusterError;
    use crate::store::{EntryStore, StoreCommand};
    use crate::view::ViewState;
    use foundation::math::{ConvexPolygon, Mat4, Vec3};
    use runtime::CancelToken;

    struct Badge;

    impl ClusterGenerator for Badge {
        fn make_cluster(
            &mut self,
            _group: i32,
            _members: &[ClusterMember],
        ) -> Result<ClusterVisual, ClusterError> {
            Ok(ClusterVisual {
                footprint: ConvexPolygon::centered_rect(20.0, 20.0),
                content: None,
            })
        }
    }

    fn view() -> ViewState {
        let vp = Mat4::orthographic(0.0, 400.0, 0.0, 300.0, -1000.0, 1000.0);
        ViewState::flat(vp, [400.0, 300.0], Vec3::new(200.0, 150.0, 100.0))
    }

    fn store(candidates: Vec<LayoutCandidate>) -> EntryStore {
        let mut store = EntryStore::new();
        store.apply(StoreCommand::Add(
            candidates
                .into_iter()
                .enumerate()
                .map(|(i, c)| (EntryId(i as u64 + 1), c))
                .collect(),
        ));
        store
    }

    #[test]
    fn dense_clusterable_candidates_collapse_into_one_cluster() {
        let at = Vec3::new(200.0, 150.0, 0.0);
        let s = store(vec![
            LayoutCandidate::point(at, 30.0, 30.0).with_identity("a").with_cluster_group(0).with_importance(1.0),
            LayoutCandidate::point(at, 30.0, 30.0).with_identity("b").with_cluster_group(0).with_importance(2.0),
            LayoutCandidate::point(at, 30.0, 30.0).with_identity("c").with_cluster_group(0).with_importance(3.0),
            LayoutCandidate::point(Vec3::new(50.0, 50.0, 0.0), 10.0, 10.0).with_identity("lone"),
        ]);
        let mut badge = Badge;
        let generator: &mut dyn ClusterGenerator = &mut badge;
        let (result, stats) = compute_layout(
            &s,
            &LayoutConfig::default(),
            Some(generator),
            &view(),
            &CancelToken::new(),
        )
        .expect("pass");

        assert_eq!(stats.clusters, 1);
        let (key, cluster) = result.clusters.iter().next().expect("cluster");
        assert!(result.is_active(key));
        assert_eq!(cluster.importance, 4.0);
        for m in ["a", "b", "c"] {
            let member = ObjectKey::Identity(m.into());
            assert!(!result.is_active(&member));
            assert_eq!(result.cluster_of(&member), Some(key));
        }
        assert!(result.is_active(&ObjectKey::Identity("lone".into())));
    }

    #[test]
    fn cluster_without_room_releases_its_members() {
        let s = store(vec![
            LayoutCandidate::point(Vec3::new(200.0, 150.0, 0.0), 20.0, 20.0)
                .with_identity("big")
                .with_importance(100.0),
            LayoutCandidate::point(Vec3::new(215.0, 150.0, 0.0), 10.0, 10.0)
                .with_identity("a")
                .with_cluster_group(0),
            LayoutCandidate::point(Vec3::new(215.0, 150.0, 0.0), 10.0, 10.0)
                .with_identity("b")
                .with_cluster_group(0),
        ]);
        let (plain, _) =
            compute_layout(&s, &LayoutConfig::default(), None, &view(), &CancelToken::new())
                .expect("pass");

        let mut badge = Badge;
        let generator: &mut dyn ClusterGenerator = &mut badge;
        let (clustered, stats) = compute_layout(
            &s,
            &LayoutConfig::default(),
            Some(generator),
            &view(),
            &CancelToken::new(),
        )
        .expect("pass");

        // The badge would overlap "big", so the members come back as before.
        assert_eq!(stats.clusters, 0);
        assert!(clustered.clusters.is_empty() && clustered.memberships.is_empty());
        assert!(clustered.is_active(&ObjectKey::Identity("a".into())));
        assert!(!clustered.is_active(&ObjectKey::Identity("b".into())));
        assert_eq!(
            clustered.objects.keys().collect::<Vec<_>>(),
            plain.objects.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn without_a_generator_nothing_clusters() {
        let at = Vec3::new(200.0, 150.0, 0.0);
        let s = store(vec![
            LayoutCandidate::point(at, 30.0, 30.0).with_identity("a").with_cluster_group(0),
            LayoutCandidate::point(at, 30.0, 30.0).with_identity("b").with_cluster_group(0),
        ]);
        let (result, stats) =
            compute_layout(&s, &LayoutConfig::default(), None, &view(), &CancelToken::new())
                .expect("pass");
        assert_eq!(stats.clusters, 0);
        assert_eq!(result.active_count(), 1);
        assert_eq!(stats.rejected_overlap, 1);
    }

    #[test]
    fn selection_polygon_follows_placement() {
        let s = store(vec![
            LayoutCandidate::point(Vec3::new(100.0, 100.0, 0.0), 10.0, 10.0)
                .with_selection_footprint(ConvexPolygon::centered_rect(30.0, 30.0)),
        ]);
        let (result, _) =
            compute_layout(&s, &LayoutConfig::default(), None, &view(), &CancelToken::new())
                .expect("pass");
        let obj = result.objects.values().next().expect("placed");
        assert!((obj.selection_polygon.bounds().width() - 30.0).abs() < 1e-9);
        assert!((obj.polygon.bounds().width() - 10.0).abs() < 1e-9);
        assert_eq!(obj.world_anchor, Vec3::new(100.0, 100.0, 0.0));
    }
}
