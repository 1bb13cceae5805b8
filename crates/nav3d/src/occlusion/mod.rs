//! Occlusion-query capability consumed by the volume builder.
//!
//! The builder never inspects geometry itself. It asks an [`OcclusionQuery`]
//! for broad-phase candidates once per layer-1 cell, then narrows each leaf
//! and sub-voxel box against those candidates.

pub mod occluder_set;
pub mod tri_box;

use glam::Vec3;

use crate::bounds::Aabb;
use crate::error::OcclusionError;

pub use occluder_set::{Occluder, OccluderSet, OccluderShape};
pub use tri_box::{tri_box_overlap, triangle_set_overlaps_box};

/// Identifier of one occluder inside a query backend.
pub type OccluderId = u32;

/// Scene geometry as seen by the builder.
pub trait OcclusionQuery: Send + Sync {
  /// Occluders whose bounds may touch `bounds`.
  fn candidates(&self, bounds: &Aabb) -> Vec<OccluderId>;

  /// Whether anything occludes the box `center ± half_extents`.
  ///
  /// With `candidates` set only those occluders are tested.
  fn is_box_occluded(
    &self,
    center: Vec3,
    half_extents: Vec3,
    candidates: Option<&[OccluderId]>,
  ) -> Result<bool, OcclusionError>;
}

impl<Q: OcclusionQuery + ?Sized> OcclusionQuery for std::sync::Arc<Q> {
  fn candidates(&self, bounds: &Aabb) -> Vec<OccluderId> {
    (**self).candidates(bounds)
  }

  fn is_box_occluded(
    &self,
    center: Vec3,
    half_extents: Vec3,
    candidates: Option<&[OccluderId]>,
  ) -> Result<bool, OcclusionError> {
    (**self).is_box_occluded(center, half_extents, candidates)
  }
}
