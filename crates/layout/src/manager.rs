//! Producer API and pass scheduling.
//!
//! Producers hold cloneable [`LayoutHandle`]s and never touch engine state:
//! every mutation is a [`Command`] on a channel the engine drains at the start
//! of each pass. Passes are single-flight; a second caller gets
//! `Skipped(Busy)` instead of waiting.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use foundation::time::Time;
use parking_lot::{Mutex, RwLock};
use runtime::{CancelToken, LayoutMetrics, MetricsSnapshot, PassReport, PassThrottle, ThrottleReason};
use tracing::{debug, warn};

use crate::candidate::{EntryId, LayoutCandidate, ObjectKey};
use crate::cluster::ClusterGenerator;
use crate::config::LayoutConfig;
use crate::error::ConfigError;
use crate::fade::{ChangeSet, FadeScheduler};
use crate::pass::compute_layout;
use crate::result::LayoutResult;
use crate::selection::SelectionSnapshot;
use crate::store::{EntryStore, StoreCommand};
use crate::view::ViewState;

/// A mutation queued for the next pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Store(StoreCommand),
    SetMaxDisplayObjects(i64),
    SetFadeEnabled(bool),
    SetFadeInTime(f64),
    SetFadeOutTime(f64),
    SetShowDebugBoundaries(bool),
    SetMinPassInterval(f64),
    DeferUntil(Time),
}

/// Cloneable, thread-safe producer endpoint. Never blocks on a pass.
#[derive(Debug, Clone)]
pub struct LayoutHandle {
    tx: Sender<Command>,
    next_id: Arc<AtomicU64>,
    pending: Arc<AtomicBool>,
}

impl LayoutHandle {
    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!("layout manager is gone; command dropped");
            return;
        }
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Queues `candidates` and returns their handles, in order.
    pub fn add_candidates(&self, candidates: Vec<LayoutCandidate>) -> Vec<EntryId> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let first = self
            .next_id
            .fetch_add(candidates.len() as u64, Ordering::Relaxed);
        let batch: Vec<(EntryId, LayoutCandidate)> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| (EntryId(first + i as u64), c))
            .collect();
        let ids = batch.iter().map(|(id, _)| *id).collect();
        self.send(Command::Store(StoreCommand::Add(batch)));
        ids
    }

    pub fn remove_candidates(&self, ids: &[EntryId]) {
        self.send(Command::Store(StoreCommand::Remove(ids.to_vec())));
    }

    pub fn remove_identities<I, S>(&self, identities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identities = identities.into_iter().map(Into::into).collect();
        self.send(Command::Store(StoreCommand::RemoveIdentities(identities)));
    }

    pub fn set_enabled(&self, ids: &[EntryId], enabled: bool) {
        self.send(Command::Store(StoreCommand::SetEnabled(ids.to_vec(), enabled)));
    }

    /// Replaces the set of identities that are always shown and exempt from
    /// the display cap.
    pub fn set_override_identities<I, S>(&self, identities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = identities.into_iter().map(Into::into).collect();
        self.send(Command::Store(StoreCommand::SetOverrides(set)));
    }

    pub fn clear(&self) {
        self.send(Command::Store(StoreCommand::Clear));
    }

    /// `n <= 0` removes the cap.
    pub fn set_max_display_objects(&self, n: i64) {
        self.send(Command::SetMaxDisplayObjects(n));
    }

    pub fn set_fade_enabled(&self, enabled: bool) {
        self.send(Command::SetFadeEnabled(enabled));
    }

    pub fn set_fade_in_time(&self, seconds: f64) {
        self.send(Command::SetFadeInTime(seconds));
    }

    pub fn set_fade_out_time(&self, seconds: f64) {
        self.send(Command::SetFadeOutTime(seconds));
    }

    pub fn set_show_debug_boundaries(&self, show: bool) {
        self.send(Command::SetShowDebugBoundaries(show));
    }

    pub fn set_min_pass_interval(&self, seconds: f64) {
        self.send(Command::SetMinPassInterval(seconds));
    }

    /// Suppresses passes while the view time is before `until`.
    pub fn defer_until(&self, until: Time) {
        self.send(Command::DeferUntil(until));
    }
}

/// Cancels whichever pass is in flight, from any thread.
#[derive(Debug, Clone, Default)]
pub struct PassCanceller {
    in_flight: Arc<Mutex<Option<CancelToken>>>,
}

impl PassCanceller {
    /// Returns `false` when no pass was running.
    pub fn cancel(&self) -> bool {
        match self.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.in_flight.lock() = Some(token.clone());
        token
    }

    fn finish(&self) {
        *self.in_flight.lock() = None;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass was running.
    Busy,
    Deferred,
    Throttled,
    /// Nothing changed since the last completed pass.
    UpToDate,
}

impl SkipReason {
    fn counter(self) -> &'static str {
        match self {
            SkipReason::Busy => "passes.busy",
            SkipReason::Deferred => "passes.deferred",
            SkipReason::Throttled => "passes.throttled",
            SkipReason::UpToDate => "passes.up_to_date",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Completed(ChangeSet),
    Skipped(SkipReason),
    /// The previous result stays current.
    Cancelled,
}

impl PassOutcome {
    pub fn changes(&self) -> Option<&ChangeSet> {
        match self {
            PassOutcome::Completed(c) => Some(c),
            _ => None,
        }
    }
}

/// Receives change sets from completed passes.
pub trait DrawableSink {
    fn apply(&mut self, changes: &ChangeSet);
}

/// Earliest enable-window edges after the last completed pass.
#[derive(Debug, Copy, Clone)]
struct WindowEdges {
    last: f64,
    next_start: f64,
    next_end: f64,
}

impl WindowEdges {
    fn scan(store: &EntryStore, now: Time) -> Self {
        let mut edges = Self {
            last: now.0,
            next_start: f64::INFINITY,
            next_end: f64::INFINITY,
        };
        for entry in store.entries() {
            let w = entry.candidate.enable_window;
            if w.start.0.is_finite() && w.start.0 > now.0 {
                edges.next_start = edges.next_start.min(w.start.0);
            }
            if w.end.0.is_finite() && w.end.0 >= now.0 {
                edges.next_end = edges.next_end.min(w.end.0);
            }
        }
        edges
    }

    fn crossed(&self, now: Time) -> bool {
        now.0 < self.last || now.0 >= self.next_start || now.0 > self.next_end
    }
}

struct Engine {
    rx: Receiver<Command>,
    store: EntryStore,
    config: LayoutConfig,
    throttle: PassThrottle,
    fades: FadeScheduler,
    generator: Option<Box<dyn ClusterGenerator>>,
    last_view: Option<ViewState>,
    last_result: Arc<LayoutResult>,
    edges: WindowEdges,
}

impl Engine {
    /// Returns `true` if the command can change the next layout.
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Store(c) => self.store.apply(c),
            Command::SetMaxDisplayObjects(n) => {
                std::mem::replace(&mut self.config.max_display_objects, n) != n
            }
            Command::SetFadeEnabled(enabled) => {
                self.config.fade_enabled = enabled;
                false
            }
            Command::SetFadeInTime(s) => {
                if valid_seconds("fade_in_s", s) {
                    self.config.fade_in_s = s;
                }
                false
            }
            Command::SetFadeOutTime(s) => {
                if valid_seconds("fade_out_s", s) {
                    self.config.fade_out_s = s;
                }
                false
            }
            Command::SetShowDebugBoundaries(show) => {
                std::mem::replace(&mut self.config.show_debug_boundaries, show) != show
            }
            Command::SetMinPassInterval(s) => {
                if valid_seconds("min_pass_interval_s", s) {
                    self.config.min_pass_interval_s = s;
                    self.throttle.set_min_interval(s);
                }
                false
            }
            Command::DeferUntil(until) => {
                self.throttle.defer_until(until);
                false
            }
        }
    }
}

fn valid_seconds(field: &'static str, s: f64) -> bool {
    let ok = s.is_finite() && s >= 0.0;
    if !ok {
        warn!(field, value = s, "ignoring invalid duration");
    }
    ok
}

struct Published {
    result: Arc<LayoutResult>,
    selection: SelectionSnapshot,
    fades: Arc<FadeScheduler>,
}

/// Owns the layout engine and runs passes against camera snapshots.
pub struct LayoutManager {
    handle: LayoutHandle,
    engine: Mutex<Engine>,
    canceller: PassCanceller,
    /// Commands were drained but no pass has completed since.
    dirty: AtomicBool,
    published: RwLock<Published>,
    metrics: Mutex<LayoutMetrics>,
}

impl LayoutManager {
    /// Out-of-range config values fall back to their defaults with a warning;
    /// use [`Self::from_json_config`] or [`LayoutConfig::validate`] to reject
    /// them instead.
    pub fn new(mut config: LayoutConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "invalid layout config; using defaults for rejected fields");
            config.sanitize();
        }
        let (tx, rx) = mpsc::channel();
        let handle = LayoutHandle {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(AtomicBool::new(false)),
        };
        let result = Arc::new(LayoutResult::default());
        Self {
            handle,
            engine: Mutex::new(Engine {
                rx,
                store: EntryStore::new(),
                throttle: PassThrottle::new(config.min_pass_interval_s),
                config,
                fades: FadeScheduler::new(),
                generator: None,
                last_view: None,
                last_result: result.clone(),
                edges: WindowEdges {
                    last: f64::NEG_INFINITY,
                    next_start: f64::INFINITY,
                    next_end: f64::INFINITY,
                },
            }),
            canceller: PassCanceller::default(),
            dirty: AtomicBool::new(false),
            published: RwLock::new(Published {
                result,
                selection: SelectionSnapshot::default(),
                fades: Arc::new(FadeScheduler::new()),
            }),
            metrics: Mutex::new(LayoutMetrics::new()),
        }
    }

    pub fn from_json_config(json: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(LayoutConfig::from_json_str(json)?))
    }

    /// Enables clustering with `generator`.
    pub fn with_cluster_generator(mut self, generator: impl ClusterGenerator + 'static) -> Self {
        self.engine.get_mut().generator = Some(Box::new(generator));
        self
    }

    pub fn handle(&self) -> LayoutHandle {
        self.handle.clone()
    }

    pub fn canceller(&self) -> PassCanceller {
        self.canceller.clone()
    }

    pub fn add_candidates(&self, candidates: Vec<LayoutCandidate>) -> Vec<EntryId> {
        self.handle.add_candidates(candidates)
    }

    pub fn remove_candidates(&self, ids: &[EntryId]) {
        self.handle.remove_candidates(ids);
    }

    pub fn remove_identities<I, S>(&self, identities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle.remove_identities(identities);
    }

    pub fn set_enabled(&self, ids: &[EntryId], enabled: bool) {
        self.handle.set_enabled(ids, enabled);
    }

    pub fn set_override_identities<I, S>(&self, identities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle.set_override_identities(identities);
    }

    pub fn set_max_display_objects(&self, n: i64) {
        self.handle.set_max_display_objects(n);
    }

    pub fn set_fade_enabled(&self, enabled: bool) {
        self.handle.set_fade_enabled(enabled);
    }

    pub fn set_fade_in_time(&self, seconds: f64) {
        self.handle.set_fade_in_time(seconds);
    }

    pub fn set_fade_out_time(&self, seconds: f64) {
        self.handle.set_fade_out_time(seconds);
    }

    pub fn set_show_debug_boundaries(&self, show: bool) {
        self.handle.set_show_debug_boundaries(show);
    }

    pub fn defer_until(&self, until: Time) {
        self.handle.defer_until(until);
    }

    /// Mutations submitted but not yet reflected in a completed pass.
    pub fn has_pending_changes(&self) -> bool {
        self.handle.pending.load(Ordering::SeqCst) || self.dirty.load(Ordering::SeqCst)
    }

    /// Cancels the pass in flight, if any.
    pub fn cancel_update(&self) -> bool {
        self.canceller.cancel()
    }

    pub fn current_result(&self) -> Arc<LayoutResult> {
        self.published.read().result.clone()
    }

    pub fn selection(&self) -> SelectionSnapshot {
        self.published.read().selection.clone()
    }

    pub fn visual_alpha(&self, key: &ObjectKey, now: Time) -> f64 {
        self.published.read().fades.visual_alpha(key, now)
    }

    pub fn is_visually_present(&self, key: &ObjectKey, now: Time) -> bool {
        self.published.read().fades.is_visually_present(key, now)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.lock().snapshot()
    }

    /// Runs one pass against `view` unless another is running, the throttle
    /// holds it back, or nothing changed.
    pub fn update_layout(&self, view: &ViewState) -> PassOutcome {
        let Some(mut engine) = self.engine.try_lock() else {
            debug!("layout pass already in flight");
            return self.skip(SkipReason::Busy);
        };
        let token = self.canceller.begin();
        let outcome = self.run_pass(&mut engine, view, &token);
        self.canceller.finish();
        outcome
    }

    /// [`Self::update_layout`], forwarding a completed change set to `sink`.
    pub fn update_and_flush(&self, view: &ViewState, sink: &mut dyn DrawableSink) -> PassOutcome {
        let outcome = self.update_layout(view);
        if let PassOutcome::Completed(changes) = &outcome {
            sink.apply(changes);
        }
        outcome
    }

    fn skip(&self, reason: SkipReason) -> PassOutcome {
        self.metrics.lock().record_skipped(reason.counter());
        PassOutcome::Skipped(reason)
    }

    fn run_pass(&self, engine: &mut Engine, view: &ViewState, token: &CancelToken) -> PassOutcome {
        let now = view.time;

        // Clear before draining: a command racing with the drain re-raises it.
        self.handle.pending.store(false, Ordering::SeqCst);
        let mut changed = false;
        while let Ok(command) = engine.rx.try_recv() {
            changed |= engine.apply(command);
        }
        if changed {
            self.dirty.store(true, Ordering::SeqCst);
        }

        match engine.throttle.check(now) {
            Err(ThrottleReason::Deferred) => return self.skip(SkipReason::Deferred),
            Err(ThrottleReason::Throttled) => return self.skip(SkipReason::Throttled),
            Ok(()) => {}
        }

        let up_to_date = !self.dirty.load(Ordering::SeqCst)
            && engine
                .last_view
                .as_ref()
                .is_some_and(|last| last.same_camera(view))
            && !engine.edges.crossed(now)
            && !engine.fades.needs_expiry(now);
        if up_to_date {
            return self.skip(SkipReason::UpToDate);
        }

        engine.fades.expire(now);
        let generator = match engine.generator.as_mut() {
            Some(g) => Some(&mut **g as &mut dyn ClusterGenerator),
            None => None,
        };
        let (result, stats) =
            match compute_layout(&engine.store, &engine.config, generator, view, token) {
                Ok(done) => done,
                Err(_) => {
                    debug!(time = now.0, "layout pass cancelled");
                    self.metrics.lock().record_cancelled();
                    return PassOutcome::Cancelled;
                }
            };

        let changes = engine.fades.diff(
            &engine.last_result,
            &result,
            engine.config.fade_settings(),
            engine.config.show_debug_boundaries,
        );
        // Zero-length windows are over as soon as they start.
        engine.fades.expire(now);
        let transitions = engine.store.commit(&result);
        engine.throttle.record_pass(now);
        engine.last_view = Some(view.clone());
        engine.edges = WindowEdges::scan(&engine.store, now);
        self.dirty.store(false, Ordering::SeqCst);

        let result = Arc::new(result);
        engine.last_result = result.clone();
        {
            let mut published = self.published.write();
            published.selection = SelectionSnapshot::from_result(&result);
            published.result = result;
            published.fades = Arc::new(engine.fades.clone());
        }

        let report = PassReport {
            candidates: stats.candidates,
            visible: stats.visible,
            placed: stats.placed,
            rejected_overlap: stats.rejected_overlap,
            rejected_cap: stats.rejected_cap,
            clusters: stats.clusters,
            added: changes.added.len(),
            updated: changes.updated.len(),
            removed: changes.removed.len(),
        };
        self.metrics.lock().record_pass(report);
        debug!(
            time = now.0,
            candidates = stats.candidates,
            visible = stats.visible,
            placed = stats.placed,
            clusters = stats.clusters,
            transitions,
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            "layout pass completed"
        );
        PassOutcome::Completed(changes)
    }
}
