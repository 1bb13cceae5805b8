//! Ray queries against built octrees.
//!
//! - [`raycaster`]: single-octree parametric traversal
//! - [`corridor`]: radius-aware traversal checks across partitions

pub mod corridor;
pub mod raycaster;

pub use corridor::{corridor_offsets, MultiPartitionRaycaster, PartitionSegment};
pub use raycaster::{impact_normal, RayTrace, RaycastHit, Raycaster};
