//! Screen-space decluttering for map and globe decorations.
//!
//! Producers submit [`LayoutCandidate`]s through a [`LayoutHandle`]; each
//! frame the host calls [`LayoutManager::update_layout`] with a camera
//! snapshot and receives a [`ChangeSet`] describing what to add, move, and
//! fade out.

pub mod candidate;
pub mod cluster;
pub mod config;
pub mod error;
pub mod fade;
pub mod grid;
pub mod manager;
pub mod pass;
pub mod placement;
pub mod projection;
pub mod result;
pub mod selection;
pub mod store;
pub mod view;

pub use candidate::{
    Anchor, EntryId, LayoutCandidate, ObjectKey, Placement, PlacementMask, VisibleRange,
};
pub use cluster::{ClusterGenerator, ClusterMember, ClusterParams, ClusterResult, ClusterVisual};
pub use config::{ClusterConfig, FadeSettings, LayoutConfig};
pub use error::{ClusterError, ConfigError};
pub use fade::{AddedObject, ChangeReason, ChangeSet, RemovedObject, UpdatedObject};
pub use manager::{
    Command, DrawableSink, LayoutHandle, LayoutManager, PassCanceller, PassOutcome, SkipReason,
};
pub use result::{LayoutResult, PlacedObject};
pub use selection::{SelectableObject, SelectionHit, SelectionSnapshot};
pub use view::{ViewMode, ViewState};
