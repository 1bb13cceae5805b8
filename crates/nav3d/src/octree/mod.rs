//! Sparse layered voxel octree.
//!
//! Only occluded space grows nodes. A blocked cell is subdivided into all 8
//! children, so every layer is a set of complete sibling groups sorted by
//! Morton code. Layer 0 cells carry a 4×4×4 occupancy mask.
//!
//! ```text
//! layer N-1   [        root        ]          1 cell
//! layer 1     [ a ][ b ][ c ][ d ]...         node_size = leaf_size * 2
//! layer 0     [....][....][....]...           leaf_size = voxel_extent * 4
//!             └ 64 sub-voxels per leaf
//! ```
//!
//! # Module Structure
//!
//! - [`node`]: `Node` and `LeafNode` cells plus face-direction tables
//! - [`layer`]: one sorted resolution level
//! - [`volume`]: `OctreeVolume` storage, geometry and address resolution
//! - [`query`]: position lookup, neighbour expansion, random points
//! - [`serialize`]: versioned binary persistence

pub mod layer;
pub mod node;
pub mod query;
pub mod serialize;
pub mod volume;

// Re-exports
pub use layer::Layer;
pub use node::{LeafNode, Node, DIRECTION_COUNT, DIRECTION_OFFSETS, LEAF_RESOLUTION, LEAF_SUB_NODES};
pub use query::NeighbourList;
pub use serialize::{from_bytes, to_bytes, SerializationVersion};
pub use volume::{OctreeVolume, MAX_LAYER_COUNT};
