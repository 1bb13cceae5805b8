//! Error types for volume generation and persistence.

use thiserror::Error;

/// Failure reported by an occlusion-query capability.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OcclusionError {
  #[error("occluder {0} has invalid geometry")]
  InvalidGeometry(u32),
  #[error("occlusion query failed: {0}")]
  Query(String),
}

/// Reasons a volume build produced no usable data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
  #[error("build cancelled")]
  Cancelled,
  #[error("volume of size {size} yields {layers} layer(s) with leaf size {leaf_size}, at least 2 required")]
  TooFewLayers { size: f32, leaf_size: f32, layers: u32 },
  #[error("volume needs {layers} layers, at most {max} supported")]
  TooManyLayers { layers: u32, max: u32 },
  #[error("voxel extent must be positive, got {0}")]
  InvalidVoxelExtent(f32),
}

/// Failures while decoding serialized octree data.
#[derive(Debug, Error)]
pub enum SerializeError {
  #[error("unexpected end of data: needed {needed} bytes at offset {offset}")]
  Truncated { offset: usize, needed: usize },
  #[error("size prefix {declared} does not match payload length {actual}")]
  SizeMismatch { declared: usize, actual: usize },
  #[error("unsupported serialization version {0}")]
  UnsupportedVersion(u32),
  #[error("layer count {0} exceeds the supported maximum")]
  TooManyLayers(u8),
  #[error("navigation bounds are not a cube that can hold {layers} layers")]
  InvalidGeometry { layers: u8 },
  #[error("{leaves} leaves stored for {nodes} layer-0 nodes")]
  LeafCountMismatch { leaves: usize, nodes: usize },
  #[error("layer {layer} holds {count} nodes, more than an address can index")]
  TooManyNodes { layer: u8, count: usize },
  #[error("node {index} on layer {layer} has an out-of-range code or link")]
  InvalidNode { layer: u8, index: usize },
}
