//! Entry point for path queries.

use glam::Vec3;
use tracing::debug;

use crate::raycast::MultiPartitionRaycaster;
use crate::registry::NavRegistry;
use crate::search::{Algorithm, CostStrategy, HeuristicStrategy, NavPath, SearchParams};
use crate::settings::Nav3dSettings;

use super::region::{PathResult, PathResultCode, RegionPathfinder};

/// A path query. Unset options fall back to [`Nav3dSettings`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PathRequest {
  pub start: Vec3,
  pub end: Vec3,
  pub agent_radius: f32,
  pub algorithm: Option<Algorithm>,
  pub cost: Option<CostStrategy>,
  pub heuristic: Option<HeuristicStrategy>,
  pub heuristic_scale: Option<f32>,
  pub use_node_size_compensation: Option<bool>,
  pub smoothing_subdivisions: Option<u32>,
}

impl PathRequest {
  pub fn new(start: Vec3, end: Vec3) -> Self {
    Self {
      start,
      end,
      ..Self::default()
    }
  }

  pub fn with_agent_radius(mut self, radius: f32) -> Self {
    self.agent_radius = radius;
    self
  }

  pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
    self.algorithm = Some(algorithm);
    self
  }
}

/// Stateless facade over the region pathfinder.
pub struct PathCoordinator<'a> {
  registry: &'a NavRegistry,
  settings: Nav3dSettings,
}

impl<'a> PathCoordinator<'a> {
  pub fn new(registry: &'a NavRegistry, settings: Nav3dSettings) -> Self {
    Self { registry, settings }
  }

  /// Search parameters of `request` with every unset option defaulted.
  pub fn resolve(&self, request: &PathRequest) -> (Algorithm, SearchParams, u32) {
    let settings = &self.settings;
    let params = SearchParams {
      agent_radius: request.agent_radius,
      cost: request.cost.unwrap_or(settings.default_cost),
      heuristic: request.heuristic.unwrap_or(settings.default_heuristic),
      heuristic_scale: request.heuristic_scale.unwrap_or(settings.heuristic_scale),
      use_node_size_compensation: request
        .use_node_size_compensation
        .unwrap_or(settings.use_node_size_compensation),
      max_iterations: settings.max_search_iterations,
    };
    let algorithm = request.algorithm.unwrap_or(settings.default_algorithm);
    let subdivisions = request.smoothing_subdivisions.unwrap_or(settings.smoothing_subdivisions);
    (algorithm, params, subdivisions)
  }

  pub fn find_path(&self, request: &PathRequest) -> PathResult {
    let (algorithm, params, subdivisions) = self.resolve(request);
    if MultiPartitionRaycaster::new(self.registry).has_line_of_traversal(request.start, request.end, request.agent_radius) {
      debug!("direct traversal clear");
      return PathResult {
        code: PathResultCode::Success,
        path: NavPath::direct(request.start, request.end),
      };
    }
    RegionPathfinder::new(self.registry, &self.settings, algorithm, params).find_path(request.start, request.end, subdivisions)
  }
}
