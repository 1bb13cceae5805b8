//! nav3d - Sparse voxel octree navigation for free-moving 3D agents
//!
//! Occluded space is voxelized into a layered sparse octree whose cells are
//! linked to their face neighbours. Path queries run A* or one of two
//! any-angle variants over those cells and are stitched across partitions
//! and volumes by a region router.
//!
//! # Features
//!
//! - **Sparse octree**: only blocked space is subdivided, down to 4×4×4
//!   sub-voxel leaves packed into a `u64`
//! - **Incremental rebuild**: re-query a dirty box and re-derive every layer
//! - **Parametric raycasting**: Revelles traversal with hit and counting modes
//! - **Search**: best-first, any-angle and lazy any-angle over one loop
//! - **Routing**: partition adjacency, portals, pruning and spline smoothing
//!
//! # Example
//!
//! ```ignore
//! use nav3d::{GenerationSettings, OccluderSet, OccluderShape, VolumeBuilder};
//!
//! let mut scene = OccluderSet::new();
//! scene.insert(OccluderShape::Box { center: Vec3::ZERO, half_extents: Vec3::splat(100.0) });
//!
//! let output = VolumeBuilder::new(&scene, GenerationSettings::default()).build(bounds)?;
//! let result = nav3d::search::find_path(&output.volume, start, end, Algorithm::LazyAnyAngle, &params);
//! ```

pub mod address;
pub mod bounds;
pub mod cancel;
pub mod error;
pub mod morton;
pub mod settings;

// Octree storage and queries
pub mod octree;
pub use octree::OctreeVolume;

// Scene geometry seen by the builder
pub mod occlusion;
pub use occlusion::{OccluderSet, OccluderShape, OcclusionQuery};

pub mod builder;
pub use builder::{BuildOutput, BuildStats, VolumeBuilder};

pub mod raycast;
pub use raycast::{MultiPartitionRaycaster, RaycastHit, Raycaster};

pub mod search;
pub use search::{Algorithm, NavPath, SearchOutcome, SearchParams, SearchResult};

pub mod registry;
pub use registry::{NavRegistry, PartitionId, VolumeId};

pub mod path;
pub use path::{PathCoordinator, PathRequest, PathResult, PathResultCode};

// Background generation
pub mod driver;
pub mod threading;
pub use driver::{GenerationDriver, GenerationEvent};

pub use address::NodeAddress;
pub use bounds::Aabb;
pub use cancel::CancellationToken;
pub use error::{BuildError, OcclusionError, SerializeError};
pub use settings::{GenerationSettings, Nav3dSettings, OcclusionFailurePolicy};

#[cfg(test)]
mod test_support;
