//! Property-based invariant tests for the layout engine.
//!
//! 1. Active non-override polygons never intersect.
//! 2. Submission order does not change the layout.
//! 3. The display cap is respected.
//! 4. Clustering is idempotent and membership is exclusive.

use std::collections::BTreeMap;

use foundation::math::{Mat4, Vec2, Vec3};
use foundation::time::Time;
use layout::pass::compute_layout;
use layout::store::{EntryStore, StoreCommand};
use layout::{
    ClusterError, ClusterGenerator, ClusterMember, ClusterVisual, EntryId, LayoutCandidate,
    LayoutConfig, LayoutManager, ObjectKey, PassOutcome, Placement, PlacementMask, ViewState,
};
use proptest::prelude::*;
use runtime::CancelToken;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Sample {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    importance: i32,
    rotation: f64,
    mask: u8,
    group: i32,
}

fn sample_strategy() -> impl Strategy<Value = Sample> {
    (
        0.0f64..400.0,
        0.0f64..300.0,
        4.0f64..60.0,
        4.0f64..30.0,
        0i32..10,
        prop_oneof![Just(0.0), 0.0f64..std::f64::consts::TAU],
        1u8..=31,
        -1i32..2,
    )
        .prop_map(|(x, y, w, h, importance, rotation, mask, group)| Sample {
            x,
            y,
            w,
            h,
            importance,
            rotation,
            mask,
            group,
        })
}

fn candidate(i: usize, s: &Sample) -> LayoutCandidate {
    LayoutCandidate::point(Vec3::new(s.x, s.y, 0.0), s.w, s.h)
        .with_identity(format!("c{i:03}"))
        .with_importance(f64::from(s.importance))
        .with_rotation(s.rotation, false)
        .with_placements(PlacementMask::from_bits(s.mask))
        .with_cluster_group(s.group)
}

fn view() -> ViewState {
    let vp = Mat4::orthographic(0.0, 400.0, 0.0, 300.0, -1000.0, 1000.0);
    ViewState::flat(vp, [400.0, 300.0], Vec3::new(200.0, 150.0, 100.0)).at(Time(0.0))
}

fn config(cap: i64) -> LayoutConfig {
    LayoutConfig {
        max_display_objects: cap,
        fade_enabled: false,
        min_pass_interval_s: 0.0,
        ..LayoutConfig::default()
    }
}

fn run(samples: &[Sample], order: &[usize], cap: i64) -> BTreeMap<ObjectKey, (Placement, Vec2)> {
    let m = LayoutManager::new(config(cap));
    m.add_candidates(order.iter().map(|&i| candidate(i, &samples[i])).collect());
    assert!(matches!(m.update_layout(&view()), PassOutcome::Completed(_)));
    m.current_result()
        .objects
        .values()
        .map(|o| (o.key.clone(), (o.placement, o.screen_pos)))
        .collect()
}

struct Badge;

impl ClusterGenerator for Badge {
    fn make_cluster(
        &mut self,
        _group: i32,
        members: &[ClusterMember],
    ) -> Result<ClusterVisual, ClusterError> {
        let side = 12.0 + members.len() as f64;
        Ok(ClusterVisual {
            footprint: foundation::math::ConvexPolygon::centered_rect(side, side),
            content: Some(members.len() as u64),
        })
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. No overlap
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn active_polygons_never_intersect(samples in proptest::collection::vec(sample_strategy(), 1..40)) {
        let m = LayoutManager::new(config(0));
        m.add_candidates(samples.iter().enumerate().map(|(i, s)| candidate(i, s)).collect());
        prop_assert!(matches!(m.update_layout(&view()), PassOutcome::Completed(_)));

        let result = m.current_result();
        let objects: Vec<_> = result.objects.values().filter(|o| !o.is_override).collect();
        for (i, a) in objects.iter().enumerate() {
            for b in &objects[i + 1..] {
                prop_assert!(
                    !a.polygon.intersects(&b.polygon),
                    "{} overlaps {}",
                    a.key,
                    b.key
                );
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn submission_order_does_not_matter(samples in proptest::collection::vec(sample_strategy(), 1..30)) {
        let forward: Vec<usize> = (0..samples.len()).collect();
        let backward: Vec<usize> = forward.iter().rev().copied().collect();
        prop_assert_eq!(run(&samples, &forward, 0), run(&samples, &backward, 0));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Cap
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cap_is_respected(
        samples in proptest::collection::vec(sample_strategy(), 1..40),
        cap in 1i64..10,
    ) {
        let order: Vec<usize> = (0..samples.len()).collect();
        let placed = run(&samples, &order, cap);
        prop_assert!(placed.len() as i64 <= cap);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Clustering idempotence and exclusivity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn clustering_is_idempotent_and_exclusive(samples in proptest::collection::vec(sample_strategy(), 1..40)) {
        let mut store = EntryStore::new();
        store.apply(StoreCommand::Add(
            samples
                .iter()
                .enumerate()
                .map(|(i, s)| (EntryId(i as u64 + 1), candidate(i, s)))
                .collect(),
        ));
        let config = config(0);
        let token = CancelToken::new();

        let mut first_gen = Badge;
        let g: &mut dyn ClusterGenerator = &mut first_gen;
        let (first, _) = compute_layout(&store, &config, Some(g), &view(), &token).expect("pass");
        let mut second_gen = Badge;
        let g: &mut dyn ClusterGenerator = &mut second_gen;
        let (second, _) = compute_layout(&store, &config, Some(g), &view(), &token).expect("pass");
        prop_assert_eq!(&first, &second);

        for (member, cluster) in &first.memberships {
            prop_assert!(!(first.is_active(member) && first.is_active(cluster)));
        }
    }
}
