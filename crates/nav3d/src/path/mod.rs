//! Path queries across the registry plus waypoint post-processing.
//!
//! - [`coordinator`]: request defaults and the direct-traversal shortcut
//! - [`region`]: partition and volume routing
//! - [`prune`]: greedy line-of-traversal pruning
//! - [`smoothing`]: centripetal Catmull-Rom subdivision

pub mod coordinator;
pub mod prune;
pub mod region;
pub mod smoothing;

pub use coordinator::{PathCoordinator, PathRequest};
pub use prune::prune_path;
pub use region::{PathResult, PathResultCode, RegionPathfinder};
pub use smoothing::{catmull_rom, smooth_path};
