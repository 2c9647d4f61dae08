use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use layout::{LayoutConfig, LayoutManager, PassOutcome, PlacedObject, SkipReason};
use serde::Serialize;
use tools::badge::CountBadge;
use tools::scene::Scene;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replays decoration scenes through the layout engine")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scene for a number of frames and print the outcome of each
    Run {
        /// Scene JSON file
        #[arg(long)]
        scene: PathBuf,

        /// Layout configuration JSON file (defaults apply otherwise)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of frames to simulate
        #[arg(long, default_value_t = 1)]
        frames: usize,

        /// Seconds between frames
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f64,

        /// Cluster transition duration in seconds
        #[arg(long)]
        cluster_animation: Option<f64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    match Args::parse().command {
        Command::Run {
            scene,
            config,
            frames,
            dt,
            cluster_animation,
        } => cmd_run(&scene, config.as_deref(), frames, dt, cluster_animation),
    }
}

fn cmd_run(
    scene_path: &Path,
    config_path: Option<&Path>,
    frames: usize,
    dt: f64,
    cluster_animation: Option<f64>,
) -> Result<(), String> {
    if !(dt.is_finite() && dt >= 0.0) {
        return Err(format!("--dt must be a non-negative number, got {dt}"));
    }
    let text = read(scene_path)?;
    let scene = Scene::from_json_str(&text)?;

    let manager = match config_path {
        Some(p) => LayoutManager::from_json_config(&read(p)?).map_err(|e| format!("config: {e}"))?,
        None => LayoutManager::new(LayoutConfig::default()),
    }
    .with_cluster_generator(CountBadge::new(cluster_animation));

    manager.add_candidates(scene.resolve(&scene.candidates)?);
    if !scene.override_identities.is_empty() {
        manager.set_override_identities(scene.override_identities.iter().cloned());
    }

    for frame in 0..frames {
        for event in scene.events_at(frame) {
            if !event.remove.is_empty() {
                manager.remove_identities(event.remove.iter().cloned());
            }
            if !event.add.is_empty() {
                manager.add_candidates(scene.resolve(&event.add)?);
            }
            if let Some(n) = event.max_display_objects {
                manager.set_max_display_objects(n);
            }
        }

        let t = frame as f64 * dt;
        let view = scene.camera.view_at(t)?;
        let report = FrameReport::new(frame, t, &manager.update_layout(&view));
        println!("{}", serde_json::to_string(&report).map_err(|e| format!("json: {e}"))?);
    }

    let result = manager.current_result();
    let placed: Vec<PlacementReport> = result.objects.values().map(PlacementReport::from).collect();
    info!(
        placed = placed.len(),
        clusters = result.clusters.len(),
        "scene finished"
    );
    let payload = serde_json::to_string_pretty(&placed).map_err(|e| format!("json: {e}"))?;
    println!("{payload}");
    Ok(())
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))
}

#[derive(Serialize)]
struct FrameReport {
    frame: usize,
    time: f64,
    outcome: &'static str,
    added: usize,
    updated: usize,
    removed: usize,
}

impl FrameReport {
    fn new(frame: usize, time: f64, outcome: &PassOutcome) -> Self {
        let (name, added, updated, removed) = match outcome {
            PassOutcome::Completed(c) => ("completed", c.added.len(), c.updated.len(), c.removed.len()),
            PassOutcome::Cancelled => ("cancelled", 0, 0, 0),
            PassOutcome::Skipped(reason) => (skip_name(*reason), 0, 0, 0),
        };
        Self {
            frame,
            time,
            outcome: name,
            added,
            updated,
            removed,
        }
    }
}

fn skip_name(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Busy => "busy",
        SkipReason::Deferred => "deferred",
        SkipReason::Throttled => "throttled",
        SkipReason::UpToDate => "up_to_date",
    }
}

#[derive(Serialize)]
struct PlacementReport {
    key: String,
    placement: &'static str,
    x: f64,
    y: f64,
    rotation: f64,
    importance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<u64>,
}

impl From<&PlacedObject> for PlacementReport {
    fn from(o: &PlacedObject) -> Self {
        let at = o.screen_pos + o.offset;
        Self {
            key: o.key.to_string(),
            placement: o.placement.name(),
            x: at.x,
            y: at.y,
            rotation: o.rotation,
            importance: o.importance,
            members: if o.is_cluster() { o.content } else { None },
        }
    }
}
