use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on overlap grid cells per axis.
pub const MAX_GRID_CELLS: usize = 4096;

/// Layout engine configuration.
///
/// Every field has a default so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Cap on active non-override objects; `<= 0` means unlimited.
    pub max_display_objects: i64,
    pub fade_enabled: bool,
    pub fade_in_s: f64,
    pub fade_out_s: f64,
    /// Emit placement polygons as debug geometry with every change set.
    pub show_debug_boundaries: bool,
    /// Overlap grid cells per screen axis.
    pub grid_cells: usize,
    /// Fraction of the screen size added on every side before culling.
    pub screen_margin_fraction: f64,
    /// Gap between a center slot and its adjacent orientation slots.
    pub placement_spacing_px: f64,
    pub min_pass_interval_s: f64,
    pub cluster: ClusterConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_display_objects: 0,
            fade_enabled: true,
            fade_in_s: 0.2,
            fade_out_s: 0.2,
            show_debug_boundaries: false,
            grid_cells: 16,
            screen_margin_fraction: 0.1,
            placement_spacing_px: 2.0,
            min_pass_interval_s: 0.1,
            cluster: ClusterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub min_members: usize,
    /// Footprints closer than this (in pixels) join the same cluster.
    pub proximity_px: f64,
    /// Added to the most important member's importance.
    pub importance_boost: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_members: 2,
            proximity_px: 0.0,
            importance_boost: 1.0,
        }
    }
}

/// Fade durations actually applied by the diff scheduler.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FadeSettings {
    pub enabled: bool,
    pub fade_in_s: f64,
    pub fade_out_s: f64,
}

impl FadeSettings {
    pub fn fade_in(&self) -> f64 {
        if self.enabled { self.fade_in_s } else { 0.0 }
    }

    pub fn fade_out(&self) -> f64 {
        if self.enabled { self.fade_out_s } else { 0.0 }
    }

    /// Fade-in for a cluster transition; cluster classes may carry their
    /// own animation duration.
    pub fn transition_in(&self, animation_s: Option<f64>) -> f64 {
        match animation_s {
            Some(s) if self.enabled => s.max(0.0),
            _ => self.fade_in(),
        }
    }

    /// Fade-out counterpart of [`Self::transition_in`].
    pub fn transition_out(&self, animation_s: Option<f64>) -> f64 {
        match animation_s {
            Some(s) if self.enabled => s.max(0.0),
            _ => self.fade_out(),
        }
    }
}

impl LayoutConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("fade_in_s", self.fade_in_s)?;
        non_negative("fade_out_s", self.fade_out_s)?;
        non_negative("placement_spacing_px", self.placement_spacing_px)?;
        non_negative("min_pass_interval_s", self.min_pass_interval_s)?;
        non_negative("screen_margin_fraction", self.screen_margin_fraction)?;
        non_negative("cluster.proximity_px", self.cluster.proximity_px)?;
        non_negative("cluster.importance_boost", self.cluster.importance_boost)?;
        if self.grid_cells == 0 || self.grid_cells > MAX_GRID_CELLS {
            return Err(ConfigError::Invalid {
                field: "grid_cells",
                reason: format!("must be in 1..={MAX_GRID_CELLS}, got {}", self.grid_cells),
            });
        }
        if self.cluster.min_members < 2 {
            return Err(ConfigError::Invalid {
                field: "cluster.min_members",
                reason: format!("must be at least 2, got {}", self.cluster.min_members),
            });
        }
        Ok(())
    }

    /// Resets every field `validate` would reject to its default.
    pub fn sanitize(&mut self) {
        let d = Self::default();
        for (v, default) in [
            (&mut self.fade_in_s, d.fade_in_s),
            (&mut self.fade_out_s, d.fade_out_s),
            (&mut self.placement_spacing_px, d.placement_spacing_px),
            (&mut self.min_pass_interval_s, d.min_pass_interval_s),
            (&mut self.screen_margin_fraction, d.screen_margin_fraction),
            (&mut self.cluster.proximity_px, d.cluster.proximity_px),
            (&mut self.cluster.importance_boost, d.cluster.importance_boost),
        ] {
            if !(v.is_finite() && *v >= 0.0) {
                *v = default;
            }
        }
        if self.grid_cells == 0 || self.grid_cells > MAX_GRID_CELLS {
            self.grid_cells = d.grid_cells;
        }
        if self.cluster.min_members < 2 {
            self.cluster.min_members = d.cluster.min_members;
        }
    }

    pub fn max_display(&self) -> Option<usize> {
        usize::try_from(self.max_display_objects)
            .ok()
            .filter(|n| *n > 0)
    }

    pub fn fade_settings(&self) -> FadeSettings {
        FadeSettings {
            enabled: self.fade_enabled,
            fade_in_s: self.fade_in_s,
            fade_out_s: self.fade_out_s,
        }
    }
}

fn non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        reason: format!("must be a finite non-negative number, got {v}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{FadeSettings, LayoutConfig};
    use crate::error::ConfigError;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_uses_defaults() {
        let c = LayoutConfig::from_json_str(r#"{"max_display_objects": 50, "cluster": {"proximity_px": 4.0}}"#)
            .expect("config");
        assert_eq!(c.max_display(), Some(50));
        assert_eq!(c.cluster.proximity_px, 4.0);
        assert_eq!(c.cluster.min_members, 2);
        assert_eq!(c.fade_in_s, LayoutConfig::default().fade_in_s);
    }

    #[test]
    fn non_positive_cap_is_unlimited() {
        let mut c = LayoutConfig::default();
        assert_eq!(c.max_display(), None);
        c.max_display_objects = -3;
        assert_eq!(c.max_display(), None);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = LayoutConfig::from_json_str(r#"{"fade_out_s": -1.0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "fade_out_s", .. }));

        let err = LayoutConfig::from_json_str(r#"{"grid_cells": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "grid_cells", .. }));

        let err = LayoutConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn sanitize_restores_defaults_for_rejected_fields() {
        let mut c = LayoutConfig {
            grid_cells: usize::MAX,
            fade_in_s: f64::NAN,
            placement_spacing_px: -4.0,
            max_display_objects: 7,
            ..LayoutConfig::default()
        };
        c.cluster.min_members = 0;
        assert!(c.validate().is_err());

        c.sanitize();
        c.validate().expect("sanitized config is valid");
        let d = LayoutConfig::default();
        assert_eq!(c.grid_cells, d.grid_cells);
        assert_eq!(c.fade_in_s, d.fade_in_s);
        assert_eq!(c.placement_spacing_px, d.placement_spacing_px);
        assert_eq!(c.cluster.min_members, 2);
        assert_eq!(c.max_display_objects, 7);
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let mut c = LayoutConfig::default();
        c.show_debug_boundaries = true;
        let s = c.to_json_string().expect("json");
        assert_eq!(LayoutConfig::from_json_str(&s).expect("config"), c);
    }

    #[test]
    fn disabled_fades_are_instant() {
        let f = FadeSettings {
            enabled: false,
            fade_in_s: 1.0,
            fade_out_s: 2.0,
        };
        assert_eq!((f.fade_in(), f.fade_out(), f.transition_in(Some(3.0))), (0.0, 0.0, 0.0));
        assert_eq!(f.transition_out(Some(3.0)), 0.0);
        let on = FadeSettings { enabled: true, ..f };
        assert_eq!(on.transition_in(Some(3.0)), 3.0);
        assert_eq!(on.transition_out(Some(3.0)), 3.0);
        assert_eq!(on.transition_in(None), 1.0);
        assert_eq!(on.transition_out(None), 2.0);
    }
}
