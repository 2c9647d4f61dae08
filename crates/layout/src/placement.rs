//! Greedy, importance-ordered placement.
//!
//! Candidates are walked in a total order and each takes the first acceptable
//! orientation whose polygon fits in the overlap grid. Nothing is ever moved
//! once placed, so the result depends only on the sort order and the inputs.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use foundation::math::{ConvexPolygon, Vec2, stable_total_cmp_f64};
use runtime::{CancelToken, Cancelled};
use tracing::trace;

use crate::candidate::{EntryId, ObjectKey, Placement, PlacementMask};
use crate::grid::OverlapGrid;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlacementSource {
    Entry(EntryId),
    /// Index into the pass's synthesized clusters.
    Cluster(usize),
}

/// A visible candidate ready for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementInput {
    pub source: PlacementSource,
    pub key: ObjectKey,
    pub importance: f64,
    pub is_override: bool,
    pub merge_tag: Option<String>,
    pub screen_pos: Vec2,
    pub rotation: f64,
    /// Unrotated footprint relative to the anchor.
    pub footprint: ConvexPolygon,
    pub placements: PlacementMask,
    /// Orientation held in the previous pass, tried before the others.
    pub preferred: Option<Placement>,
}

impl PlacementInput {
    fn identity(&self) -> Option<&str> {
        match &self.key {
            ObjectKey::Identity(s) | ObjectKey::Cluster(s) => Some(s.as_str()),
            ObjectKey::Entry(_) => None,
        }
    }

    /// Screen polygon and rotated offset for `placement`.
    pub fn polygon_at(&self, placement: Placement, spacing: f64) -> (ConvexPolygon, Vec2) {
        let offset = offset_for(placement, &self.footprint, spacing).rotate(self.rotation);
        let polygon = self
            .footprint
            .rotated(self.rotation)
            .translated(self.screen_pos + offset);
        (polygon, offset)
    }

    /// Acceptable orientations in the order the solver tries them.
    pub fn attempt_order(&self) -> impl Iterator<Item = Placement> + '_ {
        let preferred = self.preferred.filter(|p| self.placements.contains(*p));
        preferred
            .into_iter()
            .chain(self.placements.iter().filter(move |p| Some(*p) != preferred))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The display cap was already reached.
    Cap,
    /// Every acceptable orientation overlapped something already placed.
    Overlap,
    /// Another candidate with the same merge tag came first.
    Merged,
    /// No acceptable orientation at all.
    NoPlacement,
}

impl RejectReason {
    pub fn name(self) -> &'static str {
        match self {
            RejectReason::Cap => "cap",
            RejectReason::Overlap => "overlap",
            RejectReason::Merged => "merged",
            RejectReason::NoPlacement => "no_placement",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub placement: Placement,
    /// Rotated orientation offset.
    pub offset: Vec2,
    pub polygon: ConvexPolygon,
    /// Override that fit nowhere and was inserted anyway.
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Placed(Placed),
    Rejected(RejectReason),
}

impl Outcome {
    pub fn placed(&self) -> Option<&Placed> {
        match self {
            Outcome::Placed(p) => Some(p),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<RejectReason> {
        match self {
            Outcome::Placed(_) => None,
            Outcome::Rejected(r) => Some(*r),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolverParams {
    /// Cap on placed non-override candidates.
    pub cap: Option<usize>,
    pub spacing_px: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOutput {
    /// One outcome per input, in input order.
    pub outcomes: Vec<Outcome>,
    pub placed: usize,
    pub rejected_overlap: usize,
    pub rejected_cap: usize,
    pub merged: usize,
}

/// Offset moving a centered footprint into the slot adjacent to the center
/// slot, before rotation.
pub fn offset_for(placement: Placement, footprint: &ConvexPolygon, spacing: f64) -> Vec2 {
    let b = footprint.bounds();
    let (w, h) = if b.is_empty() {
        (0.0, 0.0)
    } else {
        (b.width(), b.height())
    };
    match placement {
        Placement::Center => Vec2::ZERO,
        Placement::Right => Vec2::new(w + spacing, 0.0),
        Placement::Left => Vec2::new(-(w + spacing), 0.0),
        Placement::Above => Vec2::new(0.0, -(h + spacing)),
        Placement::Below => Vec2::new(0.0, h + spacing),
    }
}

/// Overrides first, then importance descending, then identity ascending
/// (anonymous last), then source ascending.
pub fn compare(a: &PlacementInput, b: &PlacementInput) -> Ordering {
    b.is_override
        .cmp(&a.is_override)
        .then_with(|| stable_total_cmp_f64(b.importance, a.importance))
        .then_with(|| match (a.identity(), b.identity()) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.source.cmp(&b.source))
}

/// Input indices in solver order.
pub fn sort_order(inputs: &[PlacementInput]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..inputs.len()).collect();
    order.sort_by(|&a, &b| compare(&inputs[a], &inputs[b]));
    order
}

/// Places `inputs` into `grid`.
///
/// Polls `token` once per candidate; on cancellation the grid is left
/// partially filled and must be discarded.
pub fn solve(
    inputs: &[PlacementInput],
    grid: &mut OverlapGrid,
    params: SolverParams,
    token: &CancelToken,
) -> Result<SolveOutput, Cancelled> {
    let mut out = SolveOutput {
        outcomes: vec![Outcome::Rejected(RejectReason::NoPlacement); inputs.len()],
        ..SolveOutput::default()
    };
    let mut seen_tags: BTreeSet<&str> = BTreeSet::new();
    let mut capped = 0usize;

    for i in sort_order(inputs) {
        token.checkpoint()?;
        let input = &inputs[i];

        if let Some(tag) = input.merge_tag.as_deref()
            && !seen_tags.insert(tag)
        {
            out.merged += 1;
            out.outcomes[i] = Outcome::Rejected(RejectReason::Merged);
            trace!(key = %input.key, tag, "merged");
            continue;
        }

        if !input.is_override
            && let Some(cap) = params.cap
            && capped >= cap
        {
            out.rejected_cap += 1;
            out.outcomes[i] = Outcome::Rejected(RejectReason::Cap);
            trace!(key = %input.key, cap, "display cap reached");
            continue;
        }

        let outcome = place_one(input, grid, params.spacing_px);
        match &outcome {
            Outcome::Placed(_) => {
                out.placed += 1;
                if !input.is_override {
                    capped += 1;
                }
            }
            Outcome::Rejected(reason) => {
                if *reason == RejectReason::Overlap {
                    out.rejected_overlap += 1;
                }
                trace!(key = %input.key, reason = reason.name(), "rejected");
            }
        }
        out.outcomes[i] = outcome;
    }
    Ok(out)
}

fn place_one(input: &PlacementInput, grid: &mut OverlapGrid, spacing: f64) -> Outcome {
    let mut first = None;
    for placement in input.attempt_order() {
        let (polygon, offset) = input.polygon_at(placement, spacing);
        if first.is_none() {
            first = Some((placement, polygon.clone(), offset));
        }
        if grid.insert(polygon.clone()) {
            return Outcome::Placed(Placed {
                placement,
                offset,
                polygon,
                forced: false,
            });
        }
    }

    let Some((placement, polygon, offset)) = first else {
        return Outcome::Rejected(RejectReason::NoPlacement);
    };
    if input.is_override && grid.force_insert(polygon.clone()).is_some() {
        return Outcome::Placed(Placed {
            placement,
            offset,
            polygon,
            forced: true,
        });
    }
    if polygon.is_empty() || !polygon.is_finite() {
        return Outcome::Rejected(RejectReason::NoPlacement);
    }
    Outcome::Rejected(RejectReason::Overlap)
}
