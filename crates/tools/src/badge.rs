use foundation::math::ConvexPolygon;
use layout::{ClusterError, ClusterGenerator, ClusterMember, ClusterParams, ClusterVisual};

const DIGIT_WIDTH_PX: f64 = 7.0;
const PADDING_PX: f64 = 12.0;
const HEIGHT_PX: f64 = 18.0;

/// Count badge: a box wide enough for the member count, with the count as
/// content handle.
#[derive(Debug, Default, Clone)]
pub struct CountBadge {
    pub animation_s: Option<f64>,
    built: usize,
}

impl CountBadge {
    pub fn new(animation_s: Option<f64>) -> Self {
        Self {
            animation_s,
            built: 0,
        }
    }

    /// Badges produced during the last pass.
    pub fn built(&self) -> usize {
        self.built
    }
}

impl ClusterGenerator for CountBadge {
    fn start(&mut self) {
        self.built = 0;
    }

    fn make_cluster(
        &mut self,
        _group: i32,
        members: &[ClusterMember],
    ) -> Result<ClusterVisual, ClusterError> {
        if members.is_empty() {
            return Err(ClusterError::EmptyContent);
        }
        let digits = members.len().to_string().len() as f64;
        self.built += 1;
        Ok(ClusterVisual {
            footprint: ConvexPolygon::centered_rect(PADDING_PX + digits * DIGIT_WIDTH_PX, HEIGHT_PX),
            content: Some(members.len() as u64),
        })
    }

    fn params(&self, _group: i32) -> ClusterParams {
        ClusterParams {
            animation_s: self.animation_s,
            ..ClusterParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CountBadge;
    use foundation::math::{Vec2, Vec3};
    use layout::{ClusterGenerator, ClusterMember, EntryId, ObjectKey};

    fn members(n: u64) -> Vec<ClusterMember> {
        (0..n)
            .map(|i| ClusterMember {
                key: ObjectKey::Entry(EntryId(i)),
                id: EntryId(i),
                screen_pos: Vec2::ZERO,
                world_anchor: Vec3::ZERO,
                importance: 0.0,
            })
            .collect()
    }

    #[test]
    fn badge_widens_with_digit_count() {
        let mut g = CountBadge::default();
        g.start();
        let small = g.make_cluster(0, &members(9)).expect("badge");
        let wide = g.make_cluster(0, &members(12)).expect("badge");
        assert_eq!(small.content, Some(9));
        assert!(wide.footprint.bounds().width() > small.footprint.bounds().width());
        assert_eq!(g.built(), 2);
    }

    #[test]
    fn empty_member_list_is_an_error() {
        let mut g = CountBadge::default();
        assert!(g.make_cluster(0, &[]).is_err());
    }
}
