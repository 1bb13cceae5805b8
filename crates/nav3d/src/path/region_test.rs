use glam::{UVec3, Vec3};

use super::*;
use crate::bounds::Aabb;
use crate::occlusion::OccluderSet;
use crate::path::coordinator::{PathCoordinator, PathRequest};
use crate::registry::build_adjacency;
use crate::test_support::{build_in, cavity_scene, obstacle_scene, world_bounds, CAVITY_CENTER};

const START: Vec3 = Vec3::new(-450.0, 10.0, 10.0);
const END: Vec3 = Vec3::new(450.0, 10.0, 10.0);

fn raw_settings() -> Nav3dSettings {
  Nav3dSettings {
    smooth_paths: false,
    ..Nav3dSettings::DEFAULT
  }
}

/// World volume split into `divisions` partitions built against `scene`.
fn registry_with(scene: &OccluderSet, divisions: UVec3, link: bool) -> NavRegistry {
  let mut registry = NavRegistry::new();
  let volume = registry.add_volume(world_bounds());
  for id in registry.split_volume(volume, divisions) {
    let bounds = registry.partition(id).unwrap().bounds;
    registry.set_octree(id, build_in(scene, bounds));
  }
  if link {
    build_adjacency(&mut registry, 0.0);
  }
  registry
}

fn find(registry: &NavRegistry, settings: &Nav3dSettings, start: Vec3, end: Vec3) -> PathResult {
  let params = settings.search_params(0.0);
  RegionPathfinder::new(registry, settings, Algorithm::LazyAnyAngle, params).find_path(start, end, 3)
}

fn assert_free(registry: &NavRegistry, path: &NavPath) {
  for point in path.positions() {
    let Some(octree) = registry.partition_at(point).and_then(|id| registry.octree(id)) else {
      continue;
    };
    assert!(!octree.is_position_occluded(point), "{point:?} is occluded");
  }
}

fn assert_endpoints(result: &PathResult, start: Vec3, end: Vec3) {
  assert!(result.is_success(), "{:?}", result.code);
  assert_eq!(result.path.first(), Some(start));
  assert_eq!(result.path.last(), Some(end));
}

// =============================================================================
// Routing
// =============================================================================

#[test]
fn test_outside_every_partition_is_direct() {
  let registry = registry_with(&obstacle_scene(), UVec3::ONE, false);
  let (a, b) = (Vec3::splat(2000.0), Vec3::splat(3000.0));
  let result = find(&registry, &raw_settings(), a, b);
  assert_endpoints(&result, a, b);
  assert_eq!(result.path.len(), 2);
}

#[test]
fn test_single_partition_search() {
  let registry = registry_with(&obstacle_scene(), UVec3::ONE, false);
  let result = find(&registry, &raw_settings(), START, END);
  assert_endpoints(&result, START, END);
  assert!(result.path.len() >= 3);
  assert_free(&registry, &result.path);
  assert_eq!(result.segment_costs().len(), result.path.len() - 1);
}

#[test]
fn test_unbuilt_partition_is_invalid() {
  let mut registry = NavRegistry::new();
  let volume = registry.add_volume(world_bounds());
  registry.split_volume(volume, UVec3::ONE);
  let result = find(&registry, &raw_settings(), START, END);
  assert_eq!(result.code, PathResultCode::Invalid);
  assert!(result.path.is_empty());
}

#[test]
fn test_sealed_start_fails() {
  let registry = registry_with(&cavity_scene(), UVec3::ONE, false);
  let result = find(&registry, &raw_settings(), CAVITY_CENTER, Vec3::splat(450.0));
  assert_eq!(result.code, PathResultCode::Fail);
}

#[test]
fn test_route_through_portals() {
  let registry = registry_with(&obstacle_scene(), UVec3::new(2, 1, 1), true);
  let result = find(&registry, &raw_settings(), START, END);
  assert_endpoints(&result, START, END);
  assert_free(&registry, &result.path);
  assert!(result.path.positions().any(|p| p.x < 0.0));
  assert!(result.path.positions().any(|p| p.x > 0.0));
}

#[test]
fn test_geometric_fallback_without_adjacency() {
  let registry = registry_with(&obstacle_scene(), UVec3::new(2, 1, 1), false);
  let (start, end) = (Vec3::new(-450.0, 300.0, 10.0), Vec3::new(450.0, 300.0, 10.0));
  let result = find(&registry, &raw_settings(), start, end);
  assert_endpoints(&result, start, end);
  // Crosses at the point where the straight line leaves the first partition
  assert!(result.path.positions().any(|p| p.distance(Vec3::new(0.0, 300.0, 10.0)) < 1e-2));
}

#[test]
fn test_cross_volume_route() {
  let mut registry = registry_with(&obstacle_scene(), UVec3::ONE, false);
  let far_bounds = Aabb::new(Vec3::new(1000.0, -500.0, -500.0), Vec3::new(2000.0, 500.0, 500.0));
  let far = registry.add_volume(far_bounds);
  let far_partition = registry.split_volume(far, UVec3::ONE)[0];
  registry.set_octree(far_partition, build_in(&OccluderSet::new(), far_bounds));

  let (start, end) = (Vec3::new(-450.0, 300.0, 10.0), Vec3::new(1500.0, 300.0, 10.0));
  let result = find(&registry, &raw_settings(), start, end);
  assert_endpoints(&result, start, end);
  let points: Vec<Vec3> = result.path.positions().collect();
  assert!(points.iter().any(|p| p.distance(Vec3::new(500.0, 300.0, 10.0)) < 1e-2), "{points:?}");
  assert!(points.iter().any(|p| p.distance(Vec3::new(1000.0, 300.0, 10.0)) < 1e-2), "{points:?}");

  // No volume at the far end: exit leg plus a straight bridge
  let beyond = Vec3::new(5000.0, 300.0, 10.0);
  let result = find(&registry, &raw_settings(), start, beyond);
  assert_endpoints(&result, start, beyond);
}

// =============================================================================
// Post-processing
// =============================================================================

#[test]
fn test_smoothing_subdivides_segments() {
  let registry = registry_with(&obstacle_scene(), UVec3::ONE, false);
  let raw = find(&registry, &raw_settings(), START, END);
  let smoothed = find(&registry, &Nav3dSettings::DEFAULT, START, END);
  assert_endpoints(&smoothed, START, END);
  assert_eq!(smoothed.path.len(), (raw.path.len() - 1) * 3 + 1);
}

#[test]
fn test_pruning_never_adds_waypoints() {
  let registry = registry_with(&obstacle_scene(), UVec3::ONE, false);
  let raw = find(&registry, &raw_settings(), START, END);
  let pruned_settings = Nav3dSettings {
    prune_paths: true,
    ..raw_settings()
  };
  let pruned = find(&registry, &pruned_settings, START, END);
  assert_endpoints(&pruned, START, END);
  assert!(pruned.path.len() <= raw.path.len());
  assert!(pruned.path.len() >= 3);
}

#[test]
fn test_result_codes_from_search_outcomes() {
  assert_eq!(PathResultCode::from(SearchOutcome::Success), PathResultCode::Success);
  assert_eq!(PathResultCode::from(SearchOutcome::NoPath), PathResultCode::Fail);
  assert_eq!(PathResultCode::from(SearchOutcome::IterationLimitExceeded), PathResultCode::Fail);
  assert_eq!(PathResultCode::from(SearchOutcome::Error), PathResultCode::Error);
  assert_eq!(PathResultCode::from(SearchOutcome::InvalidVolumeData), PathResultCode::Invalid);
}

// =============================================================================
// Coordinator
// =============================================================================

#[test]
fn test_coordinator_resolves_defaults() {
  let registry = NavRegistry::new();
  let settings = Nav3dSettings {
    smoothing_subdivisions: 5,
    heuristic_scale: 1.5,
    ..Nav3dSettings::DEFAULT
  };
  let coordinator = PathCoordinator::new(&registry, settings);

  let request = PathRequest::new(START, END).with_agent_radius(20.0);
  let (algorithm, params, subdivisions) = coordinator.resolve(&request);
  assert_eq!(algorithm, Algorithm::LazyAnyAngle);
  assert_eq!(params, settings.search_params(20.0));
  assert_eq!(subdivisions, 5);

  let request = PathRequest {
    heuristic_scale: Some(3.0),
    use_node_size_compensation: Some(false),
    smoothing_subdivisions: Some(0),
    ..PathRequest::new(START, END).with_algorithm(Algorithm::BestFirst)
  };
  let (algorithm, params, subdivisions) = coordinator.resolve(&request);
  assert_eq!(algorithm, Algorithm::BestFirst);
  assert_eq!(params.heuristic_scale, 3.0);
  assert!(!params.use_node_size_compensation);
  assert_eq!(subdivisions, 0);
}

#[test]
fn test_coordinator_shortcuts_clear_lines() {
  let registry = registry_with(&obstacle_scene(), UVec3::ONE, false);
  let coordinator = PathCoordinator::new(&registry, raw_settings());
  let (a, b) = (Vec3::new(-450.0, 300.0, 10.0), Vec3::new(450.0, 300.0, 10.0));
  let result = coordinator.find_path(&PathRequest::new(a, b));
  assert_endpoints(&result, a, b);
  assert_eq!(result.path.len(), 2);

  let result = coordinator.find_path(&PathRequest::new(START, END));
  assert_endpoints(&result, START, END);
  assert!(result.path.len() >= 3);

  // Clear for a point, but a corner ray of the wide agent clips the obstacle
  let (a, b) = (Vec3::new(-450.0, 150.0, 150.0), Vec3::new(450.0, 150.0, 150.0));
  assert_eq!(coordinator.find_path(&PathRequest::new(a, b)).path.len(), 2);
  let result = coordinator.find_path(&PathRequest::new(a, b).with_agent_radius(100.0));
  assert!(result.path.len() > 2 || !result.is_success());
}
