use glam::Vec3;

use super::*;
use crate::occlusion::{OccluderSet, OccluderShape};
use crate::settings::OcclusionFailurePolicy;
use crate::test_support::{build, cube, obstacle_scene, world_bounds};

fn builder(scene: &OccluderSet) -> VolumeBuilder<'_, OccluderSet> {
  VolumeBuilder::new(scene, GenerationSettings::default())
}

/// Backend whose every narrow-phase query fails.
struct BrokenQuery;

impl OcclusionQuery for BrokenQuery {
  fn candidates(&self, _bounds: &Aabb) -> Vec<OccluderId> {
    vec![0]
  }

  fn is_box_occluded(
    &self,
    _center: Vec3,
    _half_extents: Vec3,
    _candidates: Option<&[OccluderId]>,
  ) -> Result<bool, crate::error::OcclusionError> {
    Err(crate::error::OcclusionError::Query("backend offline".into()))
  }
}

// =============================================================================
// Full build
// =============================================================================

#[test]
fn test_empty_scene_builds_empty_volume() {
  let scene = OccluderSet::new();
  let output = builder(&scene).build(world_bounds()).unwrap();
  assert!(output.volume.is_valid());
  assert!(output.volume.is_empty());
  assert_eq!(output.stats.leaves_rasterized, 0);
}

#[test]
fn test_obstacle_build_stats() {
  let scene = obstacle_scene();
  let output = builder(&scene).build(world_bounds()).unwrap();
  let stats = output.stats;
  assert_eq!(stats.layer1_cells_cached, 8);
  assert_eq!(stats.leaves_rasterized, 64);
  assert_eq!(stats.failed_queries, 0);
  // 8 layer-1 cells, 8 leaves and 64 sub-voxels
  assert_eq!(stats.occluded_voxels, 8 + 8 + 64);
  let occluded: u32 = output.volume.leaves().iter().map(|l| l.occluded_count()).sum();
  assert_eq!(occluded, 64);
}

#[test]
fn test_build_is_idempotent() {
  let scene = obstacle_scene();
  let first = build(&scene);
  let second = build(&scene);
  assert_eq!(first, second);
}

#[test]
fn test_leaf_inside_obstacle_is_fully_occluded() {
  let mut scene = OccluderSet::new();
  scene.insert(cube(Vec3::ZERO, 250.0));
  let volume = build(&scene);
  let index = volume.layer(0).unwrap().find(volume.code_at(0, Vec3::splat(-100.0))).unwrap();
  assert!(volume.leaf(index).is_completely_occluded());
  // Solid leaves are never a neighbour target
  for node in volume.layer(0).unwrap().nodes() {
    for neighbour in node.neighbours {
      if neighbour.is_valid() && neighbour.layer() == 0 {
        assert!(!volume.leaf(neighbour.node()).is_completely_occluded());
      }
    }
  }
}

#[test]
fn test_sphere_and_triangle_occluders() {
  let mut scene = OccluderSet::new();
  scene.insert(OccluderShape::Sphere {
    center: Vec3::new(-300.0, 0.0, 0.0),
    radius: 60.0,
  });
  scene.insert(OccluderShape::Triangles(vec![[
    Vec3::new(250.0, -50.0, -50.0),
    Vec3::new(350.0, -50.0, -50.0),
    Vec3::new(300.0, 50.0, 50.0),
  ]]));
  let volume = build(&scene);
  assert!(volume.is_position_occluded(Vec3::new(-300.0, 10.0, 10.0)));
  assert!(volume.is_position_occluded(Vec3::new(300.0, 0.0, 0.0)));
  assert!(!volume.is_position_occluded(Vec3::new(0.0, 300.0, 0.0)));
}

#[test]
fn test_clearance_inflates_obstacles() {
  let scene = obstacle_scene();
  let settings = GenerationSettings {
    clearance: 30.0,
    ..GenerationSettings::DEFAULT
  };
  let volume = VolumeBuilder::new(&scene, settings).build(world_bounds()).unwrap().volume;
  // Sub-voxel [-150, -100] now lies within clearance of the obstacle face
  assert!(volume.is_position_occluded(Vec3::new(-125.0, 25.0, 25.0)));
  assert!(!volume.is_position_occluded(Vec3::new(-175.0, 25.0, 25.0)));
}

#[test]
fn test_too_small_volume_rejected() {
  let scene = obstacle_scene();
  let bounds = Aabb::new(Vec3::splat(-50.0), Vec3::splat(50.0));
  assert!(matches!(
    builder(&scene).build(bounds),
    Err(BuildError::TooFewLayers { .. })
  ));
}

#[test]
fn test_cancelled_build_returns_error() {
  let scene = obstacle_scene();
  let token = CancellationToken::new();
  token.cancel();
  let result = builder(&scene).with_cancellation(token).build(world_bounds());
  assert_eq!(result.unwrap_err(), BuildError::Cancelled);
}

// =============================================================================
// Occlusion failure policy
// =============================================================================

#[test]
fn test_fail_open_treats_errors_as_free() {
  let output = VolumeBuilder::new(&BrokenQuery, GenerationSettings::default())
    .build(world_bounds())
    .unwrap();
  assert!(output.volume.is_empty());
  assert!(output.stats.failed_queries > 0);
}

#[test]
fn test_fail_closed_treats_errors_as_occluded() {
  let settings = GenerationSettings {
    occlusion_failure_policy: OcclusionFailurePolicy::FailClosed,
    ..GenerationSettings::DEFAULT
  };
  let volume = VolumeBuilder::new(&BrokenQuery, settings).build(world_bounds()).unwrap().volume;
  assert!(!volume.is_empty());
  assert!(volume.leaves().iter().all(|l| l.is_completely_occluded()));
}

// =============================================================================
// Incremental rebuild
// =============================================================================

#[test]
fn test_rebuild_after_removal_reopens_space() {
  let mut scene = obstacle_scene();
  let moving = scene.insert_dynamic(cube(Vec3::new(-500.0, -500.0, -500.0), 100.0));
  let mut volume = build(&scene);
  assert!(volume.is_position_occluded(Vec3::splat(-525.0)));

  let removed = scene.remove(moving).unwrap();
  let before: Vec<_> = volume
    .layer(0)
    .unwrap()
    .nodes()
    .iter()
    .zip(volume.leaves())
    .filter(|(_, leaf)| !leaf.is_completely_free())
    .map(|(node, leaf)| (node.code, leaf.occupancy))
    .collect();

  let stats = builder(&scene).rebuild_in_bounds(&mut volume, removed.shape.bounds()).unwrap();
  assert!(stats.leaves_rasterized > 0);
  assert!(!volume.is_position_occluded(Vec3::splat(-525.0)));
  assert!(volume.is_position_occluded(Vec3::splat(-25.0)));

  // Leaves of the static obstacle are unchanged
  for (code, occupancy) in before {
    if morton::decode(code).max_element() >= 3 {
      let index = volume.layer(0).unwrap().find(code).unwrap();
      assert_eq!(volume.leaf(index).occupancy, occupancy);
    }
  }
  for layer in volume.layers() {
    assert!(layer.is_sorted());
  }
  assert_eq!(volume, build(&scene));
}

#[test]
fn test_rebuild_after_insertion_matches_full_build() {
  let mut scene = obstacle_scene();
  let mut volume = build(&scene);
  let id = scene.insert_dynamic(cube(Vec3::new(450.0, 450.0, -450.0), 60.0));
  let dirty = scene.get(id).unwrap().shape.bounds();
  builder(&scene).rebuild_in_bounds(&mut volume, dirty).unwrap();
  assert!(volume.is_position_occluded(Vec3::new(450.0, 450.0, -450.0)));
  assert_eq!(volume, build(&scene));
}

#[test]
fn test_rebuild_outside_volume_is_noop() {
  let scene = obstacle_scene();
  let mut volume = build(&scene);
  let before = volume.clone();
  let far = Aabb::new(Vec3::splat(5000.0), Vec3::splat(5100.0));
  let stats = builder(&scene).rebuild_in_bounds(&mut volume, far).unwrap();
  assert_eq!(stats, BuildStats::default());
  assert_eq!(volume, before);
}

#[test]
fn test_cancelled_rebuild_leaves_volume_untouched() {
  let mut scene = obstacle_scene();
  let mut volume = build(&scene);
  let before = volume.clone();
  scene.insert(cube(Vec3::splat(400.0), 50.0));
  let token = CancellationToken::new();
  token.cancel();
  let result = builder(&scene)
    .with_cancellation(token)
    .rebuild_in_bounds(&mut volume, Aabb::from_center_half_extents(Vec3::splat(400.0), Vec3::splat(50.0)));
  assert_eq!(result.unwrap_err(), BuildError::Cancelled);
  assert_eq!(volume, before);
}
