//! In-memory occluder scene with static and dynamic shapes.

use std::collections::BTreeMap;

use glam::Vec3;

use super::{triangle_set_overlaps_box, OccluderId, OcclusionQuery};
use crate::bounds::Aabb;
use crate::error::OcclusionError;

/// Geometry of one occluder.
#[derive(Clone, Debug, PartialEq)]
pub enum OccluderShape {
  Box { center: Vec3, half_extents: Vec3 },
  Sphere { center: Vec3, radius: f32 },
  Triangles(Vec<[Vec3; 3]>),
}

impl OccluderShape {
  pub fn bounds(&self) -> Aabb {
    match self {
      OccluderShape::Box { center, half_extents } => Aabb::from_center_half_extents(*center, *half_extents),
      OccluderShape::Sphere { center, radius } => Aabb::from_center_half_extents(*center, Vec3::splat(*radius)),
      OccluderShape::Triangles(triangles) => Aabb::from_points(triangles.iter().flatten().copied())
        .unwrap_or(Aabb { min: Vec3::ZERO, max: Vec3::ZERO }),
    }
  }

  fn is_finite(&self) -> bool {
    match self {
      OccluderShape::Box { center, half_extents } => center.is_finite() && half_extents.is_finite(),
      OccluderShape::Sphere { center, radius } => center.is_finite() && radius.is_finite(),
      OccluderShape::Triangles(triangles) => triangles.iter().flatten().all(|v| v.is_finite()),
    }
  }

  /// Overlap with the box `center ± half_extents`. Touching does not count.
  pub fn overlaps_box(&self, center: Vec3, half_extents: Vec3) -> bool {
    let query = Aabb::from_center_half_extents(center, half_extents);
    match self {
      OccluderShape::Box { .. } => self.bounds().overlaps_strict(&query),
      OccluderShape::Sphere { center: c, radius } => query.distance_squared(*c) < radius * radius,
      OccluderShape::Triangles(triangles) => triangle_set_overlaps_box(center, half_extents, triangles),
    }
  }
}

/// One registered occluder.
#[derive(Clone, Debug, PartialEq)]
pub struct Occluder {
  pub shape: OccluderShape,
  /// Dynamic occluders move at runtime and trigger incremental rebuilds.
  pub dynamic: bool,
}

/// Scene of occluders keyed by stable ids.
#[derive(Clone, Debug, Default)]
pub struct OccluderSet {
  occluders: BTreeMap<OccluderId, Occluder>,
  next_id: OccluderId,
}

impl OccluderSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a static occluder.
  pub fn insert(&mut self, shape: OccluderShape) -> OccluderId {
    self.insert_occluder(Occluder { shape, dynamic: false })
  }

  /// Add a dynamic occluder.
  pub fn insert_dynamic(&mut self, shape: OccluderShape) -> OccluderId {
    self.insert_occluder(Occluder { shape, dynamic: true })
  }

  fn insert_occluder(&mut self, occluder: Occluder) -> OccluderId {
    let id = self.next_id;
    self.next_id += 1;
    self.occluders.insert(id, occluder);
    id
  }

  /// Remove an occluder, returning it so callers can rebuild its bounds.
  pub fn remove(&mut self, id: OccluderId) -> Option<Occluder> {
    self.occluders.remove(&id)
  }

  /// Replace an occluder's shape, returning the union of old and new bounds.
  pub fn update(&mut self, id: OccluderId, shape: OccluderShape) -> Option<Aabb> {
    let occluder = self.occluders.get_mut(&id)?;
    let old = occluder.shape.bounds();
    let new = shape.bounds();
    occluder.shape = shape;
    Some(Aabb {
      min: old.min.min(new.min),
      max: old.max.max(new.max),
    })
  }

  pub fn get(&self, id: OccluderId) -> Option<&Occluder> {
    self.occluders.get(&id)
  }

  pub fn iter(&self) -> impl Iterator<Item = (OccluderId, &Occluder)> {
    self.occluders.iter().map(|(id, occluder)| (*id, occluder))
  }

  pub fn len(&self) -> usize {
    self.occluders.len()
  }

  pub fn is_empty(&self) -> bool {
    self.occluders.is_empty()
  }

  pub fn dynamic_count(&self) -> usize {
    self.occluders.values().filter(|o| o.dynamic).count()
  }

  fn test(&self, id: OccluderId, occluder: &Occluder, center: Vec3, half_extents: Vec3) -> Result<bool, OcclusionError> {
    if !occluder.shape.is_finite() {
      return Err(OcclusionError::InvalidGeometry(id));
    }
    Ok(occluder.shape.overlaps_box(center, half_extents))
  }
}

impl OcclusionQuery for OccluderSet {
  fn candidates(&self, bounds: &Aabb) -> Vec<OccluderId> {
    self
      .occluders
      .iter()
      .filter(|(_, occluder)| occluder.shape.bounds().overlaps(bounds))
      .map(|(id, _)| *id)
      .collect()
  }

  fn is_box_occluded(
    &self,
    center: Vec3,
    half_extents: Vec3,
    candidates: Option<&[OccluderId]>,
  ) -> Result<bool, OcclusionError> {
    // Dynamic occluders are tested first; they are the ones most likely to
    // have moved into a cached cell.
    let ordered = self
      .occluders
      .iter()
      .filter(|(_, o)| o.dynamic)
      .chain(self.occluders.iter().filter(|(_, o)| !o.dynamic));
    match candidates {
      Some(ids) => {
        for &id in ids {
          // Candidates may reference occluders removed since caching
          let Some(occluder) = self.occluders.get(&id) else {
            continue;
          };
          if self.test(id, occluder, center, half_extents)? {
            return Ok(true);
          }
        }
        Ok(false)
      }
      None => {
        for (&id, occluder) in ordered {
          if self.test(id, occluder, center, half_extents)? {
            return Ok(true);
          }
        }
        Ok(false)
      }
    }
  }
}
