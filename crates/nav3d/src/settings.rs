//! Runtime configuration for generation and pathfinding.

use serde::{Deserialize, Serialize};

use crate::search::{Algorithm, CostStrategy, HeuristicStrategy, SearchParams};

/// What the builder does when an occlusion query reports an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcclusionFailurePolicy {
  /// Treat the box as free.
  FailOpen,
  /// Treat the box as occluded.
  FailClosed,
}

/// Settings consumed by the volume builder.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  /// Edge length of one leaf sub-voxel. Leaves are 4 sub-voxels wide.
  pub voxel_extent: f32,
  /// Inflation applied to every occlusion test box.
  pub clearance: f32,
  /// Upper bound on concurrently running partition builds.
  pub max_simultaneous_jobs: usize,
  pub occlusion_failure_policy: OcclusionFailurePolicy,
}

impl GenerationSettings {
  pub const DEFAULT: Self = Self {
    voxel_extent: 50.0,
    clearance: 0.0,
    max_simultaneous_jobs: 4,
    occlusion_failure_policy: OcclusionFailurePolicy::FailOpen,
  };

  /// Edge length of a layer-0 leaf node.
  ///
  /// `leaf_size = voxel_extent * 4`
  #[inline]
  pub fn leaf_size(&self) -> f32 {
    self.voxel_extent * 4.0
  }
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Pathfinding defaults and post-processing switches.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nav3dSettings {
  pub default_algorithm: Algorithm,
  pub default_cost: CostStrategy,
  pub default_heuristic: HeuristicStrategy,
  pub heuristic_scale: f32,
  pub use_node_size_compensation: bool,
  pub smooth_paths: bool,
  pub smoothing_subdivisions: u32,
  /// Drop waypoints that have direct traversal to a later waypoint.
  pub prune_paths: bool,
  /// How far ahead the pruner looks from each waypoint.
  pub max_backscan: usize,
  /// Failed traversal checks allowed before pruning gives up.
  pub max_los_checks: usize,
  pub max_search_iterations: u32,
  pub max_parallel_volume_builds: usize,
  /// Gap tolerated between partitions considered adjacent (0 = voxel extent).
  pub adjacency_threshold: f32,
  /// Wall-clock budget for integrating finished builds per tick.
  pub max_chunk_time_seconds: f32,
}

impl Nav3dSettings {
  pub const DEFAULT: Self = Self {
    default_algorithm: Algorithm::LazyAnyAngle,
    default_cost: CostStrategy::Distance,
    default_heuristic: HeuristicStrategy::Euclidean,
    heuristic_scale: 1.0,
    use_node_size_compensation: true,
    smooth_paths: true,
    smoothing_subdivisions: 2,
    prune_paths: false,
    max_backscan: 64,
    max_los_checks: 512,
    max_search_iterations: 10_000,
    max_parallel_volume_builds: 4,
    adjacency_threshold: 0.0,
    max_chunk_time_seconds: 0.05,
  };

  /// Search parameters with every default filled in.
  pub fn search_params(&self, agent_radius: f32) -> SearchParams {
    SearchParams {
      agent_radius,
      cost: self.default_cost,
      heuristic: self.default_heuristic,
      heuristic_scale: self.heuristic_scale,
      use_node_size_compensation: self.use_node_size_compensation,
      max_iterations: self.max_search_iterations,
    }
  }
}

impl Default for Nav3dSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let settings = Nav3dSettings::default();
    assert_eq!(settings.default_algorithm, Algorithm::LazyAnyAngle);
    assert_eq!(settings.smoothing_subdivisions, 2);
    assert!(!settings.prune_paths);

    let generation = GenerationSettings::default();
    assert_eq!(generation.leaf_size(), 200.0);
    assert_eq!(generation.occlusion_failure_policy, OcclusionFailurePolicy::FailOpen);
  }

  #[test]
  fn test_search_params_carry_settings() {
    let settings = Nav3dSettings {
      heuristic_scale: 2.5,
      max_search_iterations: 42,
      ..Nav3dSettings::DEFAULT
    };
    let params = settings.search_params(30.0);
    assert_eq!(params.agent_radius, 30.0);
    assert_eq!(params.heuristic_scale, 2.5);
    assert_eq!(params.max_iterations, 42);
  }
}
