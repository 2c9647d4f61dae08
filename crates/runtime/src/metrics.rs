use std::collections::BTreeMap;

/// Per-pass summary reported by the layout engine.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub candidates: usize,
    pub visible: usize,
    pub placed: usize,
    pub rejected_overlap: usize,
    pub rejected_cap: usize,
    pub clusters: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Deterministic metrics aggregation for layout passes.
///
/// Metrics must not depend on wall-clock time or unordered iteration.
/// This type uses sorted maps so snapshots have stable ordering.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LayoutMetrics {
    counters: BTreeMap<&'static str, u64>,
    histograms: BTreeMap<&'static str, Histogram>,
    last_pass: Option<PassReport>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    pub count: u64,
    pub sum: i64,
    pub min: i64,
    pub max: i64,
}

impl Histogram {
    pub fn record(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(&'static str, u64)>,
    pub histograms: Vec<(&'static str, Histogram)>,
    pub last_pass: Option<PassReport>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .iter()
            .find(|(k, _)| *k == name)
            .map_or(0, |(_, v)| *v)
    }
}

impl LayoutMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: &'static str, by: u64) {
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn histogram(&self, name: &str) -> Option<Histogram> {
        self.histograms.get(name).copied()
    }

    pub fn last_pass(&self) -> Option<PassReport> {
        self.last_pass
    }

    pub fn record_pass(&mut self, report: PassReport) {
        self.inc_counter("passes.completed", 1);
        self.inc_counter("objects.added", report.added as u64);
        self.inc_counter("objects.updated", report.updated as u64);
        self.inc_counter("objects.removed", report.removed as u64);
        self.record("pass.candidates", report.candidates);
        self.record("pass.visible", report.visible);
        self.record("pass.placed", report.placed);
        self.record("pass.rejected_overlap", report.rejected_overlap);
        self.record("pass.rejected_cap", report.rejected_cap);
        self.record("pass.clusters", report.clusters);
        self.last_pass = Some(report);
    }

    pub fn record_cancelled(&mut self) {
        self.inc_counter("passes.cancelled", 1);
    }

    pub fn record_skipped(&mut self, reason: &'static str) {
        self.inc_counter(reason, 1);
    }

    fn record(&mut self, name: &'static str, value: usize) {
        self.histograms
            .entry(name)
            .or_default()
            .record(i64::try_from(value).unwrap_or(i64::MAX));
    }

    /// Returns a stable, sorted snapshot suitable for logs/debug UI.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (*k, *v)).collect(),
            histograms: self.histograms.iter().map(|(k, v)| (*k, *v)).collect(),
            last_pass: self.last_pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Histogram, LayoutMetrics, PassReport};

    #[test]
    fn histogram_tracks_min_max_sum_count() {
        let mut h = Histogram::default();
        assert_eq!(h.mean(), None);
        h.record(5);
        h.record(-2);
        h.record(7);
        assert_eq!(h.count, 3);
        assert_eq!(h.sum, 10);
        assert_eq!(h.min, -2);
        assert_eq!(h.max, 7);
    }

    #[test]
    fn passes_accumulate_counters_and_histograms() {
        let mut m = LayoutMetrics::new();
        m.record_pass(PassReport {
            candidates: 10,
            placed: 4,
            added: 4,
            ..PassReport::default()
        });
        m.record_pass(PassReport {
            candidates: 12,
            placed: 6,
            added: 2,
            removed: 1,
            ..PassReport::default()
        });
        m.record_cancelled();

        assert_eq!(m.counter("passes.completed"), 2);
        assert_eq!(m.counter("passes.cancelled"), 1);
        assert_eq!(m.counter("objects.added"), 6);
        assert_eq!(m.counter("missing"), 0);
        let placed = m.histogram("pass.placed").expect("histogram");
        assert_eq!((placed.min, placed.max, placed.count), (4, 6, 2));
        assert_eq!(m.last_pass().map(|p| p.candidates), Some(12));
    }

    #[test]
    fn snapshot_is_stably_sorted() {
        let mut m = LayoutMetrics::new();
        m.record_skipped("passes.skipped.throttled");
        m.record_skipped("passes.skipped.busy");
        let snap = m.snapshot();
        assert_eq!(
            snap.counters,
            vec![
                ("passes.skipped.busy", 1),
                ("passes.skipped.throttled", 1)
            ]
        );
    }
}
