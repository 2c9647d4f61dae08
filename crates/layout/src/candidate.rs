use foundation::math::{ConvexPolygon, Vec3};
use foundation::time::TimeSpan;

/// Opaque handle for an entry in the store.
///
/// Handles are allocated in submission order and never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u64);

/// Cross-pass key used for diffing and fades.
///
/// Ordering contract: identities sort before anonymous entries, which sort
/// before clusters. Within a variant, natural ordering applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKey {
    Identity(String),
    Entry(EntryId),
    Cluster(String),
}

impl ObjectKey {
    pub fn is_cluster(&self) -> bool {
        matches!(self, ObjectKey::Cluster(_))
    }

    pub fn identity(&self) -> Option<&str> {
        match self {
            ObjectKey::Identity(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKey::Identity(s) => write!(f, "id:{s}"),
            ObjectKey::Entry(e) => write!(f, "entry:{}", e.0),
            ObjectKey::Cluster(s) => write!(f, "{s}"),
        }
    }
}

/// Orientation of a footprint relative to its anchor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placement {
    Center,
    Right,
    Left,
    Above,
    Below,
}

impl Placement {
    /// Order in which the solver tries orientations.
    pub const ORDER: [Placement; 5] = [
        Placement::Center,
        Placement::Right,
        Placement::Left,
        Placement::Above,
        Placement::Below,
    ];

    fn bit(self) -> u8 {
        match self {
            Placement::Center => 1 << 0,
            Placement::Left => 1 << 1,
            Placement::Right => 1 << 2,
            Placement::Above => 1 << 3,
            Placement::Below => 1 << 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Placement::Center => "center",
            Placement::Right => "right",
            Placement::Left => "left",
            Placement::Above => "above",
            Placement::Below => "below",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|p| p.name() == name)
    }
}

/// Set of acceptable orientations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PlacementMask(u8);

impl Default for PlacementMask {
    fn default() -> Self {
        Self::CENTER
    }
}

impl PlacementMask {
    pub const NONE: Self = Self(0);
    pub const CENTER: Self = Self(1 << 0);
    pub const LEFT: Self = Self(1 << 1);
    pub const RIGHT: Self = Self(1 << 2);
    pub const ABOVE: Self = Self(1 << 3);
    pub const BELOW: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, placement: Placement) -> bool {
        self.0 & placement.bit() != 0
    }

    pub fn with(self, placement: Placement) -> Self {
        Self(self.0 | placement.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Acceptable orientations in solver order.
    pub fn iter(self) -> impl Iterator<Item = Placement> {
        Placement::ORDER.into_iter().filter(move |p| self.contains(*p))
    }
}

impl std::ops::BitOr for PlacementMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl FromIterator<Placement> for PlacementMask {
    fn from_iter<T: IntoIterator<Item = Placement>>(iter: T) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// World-space anchor of a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    Point(Vec3),
    /// Ordered polyline; the footprint is laid out at the arc-length midpoint
    /// and follows the path direction there.
    Path(Vec<Vec3>),
}

impl Anchor {
    /// Point the footprint is attached to.
    pub fn reference_point(&self) -> Option<Vec3> {
        match self {
            Anchor::Point(p) => p.is_finite().then_some(*p),
            Anchor::Path(vertices) => path_midpoint(vertices).map(|(p, _)| p),
        }
    }

    /// Unit direction of the path at its midpoint. `None` for points and
    /// degenerate paths.
    pub fn path_direction(&self) -> Option<Vec3> {
        match self {
            Anchor::Point(_) => None,
            Anchor::Path(vertices) => path_midpoint(vertices).and_then(|(_, d)| d),
        }
    }
}

/// Camera height band in which a candidate is shown.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VisibleRange {
    pub min_height: f64,
    pub max_height: f64,
}

impl Default for VisibleRange {
    fn default() -> Self {
        Self::all()
    }
}

impl VisibleRange {
    pub fn new(min_height: f64, max_height: f64) -> Self {
        Self {
            min_height,
            max_height,
        }
    }

    pub fn all() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn contains(&self, height: f64) -> bool {
        height >= self.min_height && height <= self.max_height
    }
}

/// A decoration awaiting a screen position.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCandidate {
    /// Stable cross-pass identity. Anonymous candidates are keyed by handle.
    pub identity: Option<String>,
    pub anchor: Anchor,
    /// Higher wins contested space. `f64::INFINITY` is just a very high
    /// priority; use override identities for "always shown".
    pub importance: f64,
    pub placements: PlacementMask,
    /// Screen footprint in pixels relative to the anchor, unrotated.
    pub footprint: ConvexPolygon,
    /// Hit-test footprint; defaults to `footprint`.
    pub selection_footprint: Option<ConvexPolygon>,
    /// Radians, clockwise from the local up (north) direction.
    pub rotation: f64,
    pub keep_upright: bool,
    pub visible_range: VisibleRange,
    pub enable_window: TimeSpan,
    /// Negative values are not clusterable.
    pub cluster_group: i32,
    /// Candidates sharing a merge tag are coalesced; only the first in solver
    /// order is laid out.
    pub merge_tag: Option<String>,
}

impl LayoutCandidate {
    pub fn point(position: Vec3, width_px: f64, height_px: f64) -> Self {
        Self::with_anchor(Anchor::Point(position), width_px, height_px)
    }

    pub fn path(vertices: Vec<Vec3>, width_px: f64, height_px: f64) -> Self {
        Self::with_anchor(Anchor::Path(vertices), width_px, height_px)
    }

    fn with_anchor(anchor: Anchor, width_px: f64, height_px: f64) -> Self {
        Self {
            identity: None,
            anchor,
            importance: 0.0,
            placements: PlacementMask::CENTER,
            footprint: ConvexPolygon::centered_rect(width_px, height_px),
            selection_footprint: None,
            rotation: 0.0,
            keep_upright: false,
            visible_range: VisibleRange::all(),
            enable_window: TimeSpan::forever(),
            cluster_group: -1,
            merge_tag: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_placements(mut self, placements: PlacementMask) -> Self {
        self.placements = placements;
        self
    }

    pub fn with_footprint(mut self, footprint: ConvexPolygon) -> Self {
        self.footprint = footprint;
        self
    }

    pub fn with_selection_footprint(mut self, footprint: ConvexPolygon) -> Self {
        self.selection_footprint = Some(footprint);
        self
    }

    pub fn with_rotation(mut self, rotation: f64, keep_upright: bool) -> Self {
        self.rotation = rotation;
        self.keep_upright = keep_upright;
        self
    }

    pub fn with_visible_range(mut self, range: VisibleRange) -> Self {
        self.visible_range = range;
        self
    }

    pub fn with_enable_window(mut self, window: TimeSpan) -> Self {
        self.enable_window = window;
        self
    }

    pub fn with_cluster_group(mut self, group: i32) -> Self {
        self.cluster_group = group;
        self
    }

    pub fn with_merge_tag(mut self, tag: impl Into<String>) -> Self {
        self.merge_tag = Some(tag.into());
        self
    }

    pub fn is_clusterable(&self) -> bool {
        self.cluster_group >= 0
    }

    pub fn selection_polygon(&self) -> &ConvexPolygon {
        self.selection_footprint.as_ref().unwrap_or(&self.footprint)
    }
}

/// Arc-length midpoint of a polyline and the unit direction of the segment
/// containing it. Zero-length and non-finite segments are skipped.
fn path_midpoint(vertices: &[Vec3]) -> Option<(Vec3, Option<Vec3>)> {
    let mut total = 0.0;
    let mut segments: Vec<(Vec3, Vec3, f64)> = Vec::with_capacity(vertices.len());
    for pair in vertices.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if !a.is_finite() || !b.is_finite() {
            continue;
        }
        let len = (b - a).length();
        if !len.is_finite() || len <= 0.0 {
            continue;
        }
        total += len;
        segments.push((a, b, len));
    }
    if total <= 0.0 {
        let first = vertices.iter().copied().find(|v| v.is_finite())?;
        return Some((first, None));
    }

    let target = total * 0.5;
    let mut acc = 0.0;
    for (a, b, len) in &segments {
        if acc + len >= target {
            let t = (target - acc) / len;
            return Some((a.lerp(*b, t), (*b - *a).normalized()));
        }
        acc += len;
    }

    let (a, b, _) = segments.last()?;
    Some((*b, (*b - *a).normalized()))
}
