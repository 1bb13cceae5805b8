//! Scenes shared by unit tests.
//!
//! The standard world is a 1000-unit cube around the origin built with the
//! default 50-unit voxels: a 1600-unit navigation cube, 4 layers, 200-unit
//! leaves. The obstacle is a 200-unit cube at the origin, which covers
//! exactly 2×2×2 sub-voxels in each of the 8 leaves around the origin.

use glam::Vec3;

use crate::bounds::Aabb;
use crate::builder::VolumeBuilder;
use crate::occlusion::{OccluderSet, OccluderShape};
use crate::octree::OctreeVolume;
use crate::settings::GenerationSettings;

pub(crate) const OBSTACLE_HALF: f32 = 100.0;

pub(crate) fn world_bounds() -> Aabb {
  Aabb::new(Vec3::splat(-500.0), Vec3::splat(500.0))
}

pub(crate) fn cube(center: Vec3, half: f32) -> OccluderShape {
  OccluderShape::Box {
    center,
    half_extents: Vec3::splat(half),
  }
}

pub(crate) fn obstacle_scene() -> OccluderSet {
  let mut scene = OccluderSet::new();
  scene.insert(cube(Vec3::ZERO, OBSTACLE_HALF));
  scene
}

/// Sealed hollow shell whose cavity is exactly the leaf `[-400, -200]³`.
pub(crate) fn cavity_scene() -> OccluderSet {
  let mut scene = OccluderSet::new();
  let (lo, hi) = (-500.0, -100.0);
  for axis in 0..3 {
    for (a, b) in [(lo, -400.0), (-200.0, hi)] {
      let mut min = Vec3::splat(lo);
      let mut max = Vec3::splat(hi);
      min[axis] = a;
      max[axis] = b;
      scene.insert(OccluderShape::Box {
        center: (min + max) * 0.5,
        half_extents: (max - min) * 0.5,
      });
    }
  }
  scene
}

pub(crate) const CAVITY_CENTER: Vec3 = Vec3::splat(-300.0);

pub(crate) fn build(scene: &OccluderSet) -> OctreeVolume {
  build_in(scene, world_bounds())
}

pub(crate) fn build_in(scene: &OccluderSet, bounds: Aabb) -> OctreeVolume {
  VolumeBuilder::new(scene, GenerationSettings::default())
    .build(bounds)
    .expect("volume builds")
    .volume
}
