//! Request/response types shared by every search algorithm.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Which search strategy drives the shared search loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
  /// Plain A* over the octree graph.
  BestFirst,
  /// Theta*: line-of-sight check on every relaxation.
  AnyAngle,
  /// Lazy Theta*: line-of-sight check deferred until a node is expanded.
  LazyAnyAngle,
}

impl Algorithm {
  pub const ALL: [Algorithm; 3] = [Algorithm::BestFirst, Algorithm::AnyAngle, Algorithm::LazyAnyAngle];

  pub fn name(self) -> &'static str {
    match self {
      Algorithm::BestFirst => "best-first",
      Algorithm::AnyAngle => "any-angle",
      Algorithm::LazyAnyAngle => "lazy-any-angle",
    }
  }
}

/// Edge cost between two graph nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostStrategy {
  /// Euclidean distance between node positions.
  Distance,
  /// Every edge costs 1.
  Fixed,
}

impl CostStrategy {
  #[inline]
  pub fn cost(self, from: Vec3, to: Vec3) -> f32 {
    match self {
      CostStrategy::Distance => from.distance(to),
      CostStrategy::Fixed => 1.0,
    }
  }
}

/// Estimated remaining cost to the goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicStrategy {
  Euclidean,
  Manhattan,
}

impl HeuristicStrategy {
  #[inline]
  pub fn estimate(self, from: Vec3, goal: Vec3) -> f32 {
    match self {
      HeuristicStrategy::Euclidean => from.distance(goal),
      HeuristicStrategy::Manhattan => {
        let d = (goal - from).abs();
        d.x + d.y + d.z
      }
    }
  }
}

/// Fully resolved parameters of a single-volume search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchParams {
  pub agent_radius: f32,
  pub cost: CostStrategy,
  pub heuristic: HeuristicStrategy,
  pub heuristic_scale: f32,
  /// Discount coarse cells so the search prefers open space.
  pub use_node_size_compensation: bool,
  pub max_iterations: u32,
}

impl SearchParams {
  pub const DEFAULT: Self = Self {
    agent_radius: 0.0,
    cost: CostStrategy::Distance,
    heuristic: HeuristicStrategy::Euclidean,
    heuristic_scale: 1.0,
    use_node_size_compensation: true,
    max_iterations: 10_000,
  };
}

impl Default for SearchParams {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Result code of a single-volume search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchOutcome {
  Success,
  /// Open set exhausted before the goal was reached.
  NoPath,
  IterationLimitExceeded,
  /// The octree is missing or was never successfully built.
  InvalidVolumeData,
  /// Start or goal could not be resolved to a navigable cell.
  Error,
}

/// One waypoint of a path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathPoint {
  pub position: Vec3,
  /// Cost of the segment ending at this point (0 for the first point).
  pub cost: f32,
}

/// Ordered waypoints from start to end.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NavPath {
  pub points: Vec<PathPoint>,
}

impl NavPath {
  /// Build a path from positions, costing each segment by its length.
  pub fn from_positions(positions: impl IntoIterator<Item = Vec3>) -> Self {
    let mut points: Vec<PathPoint> = Vec::new();
    for position in positions {
      let cost = points.last().map_or(0.0, |prev| prev.position.distance(position));
      points.push(PathPoint { position, cost });
    }
    Self { points }
  }

  /// Straight two-point path.
  pub fn direct(start: Vec3, end: Vec3) -> Self {
    Self::from_positions([start, end])
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
    self.points.iter().map(|p| p.position)
  }

  pub fn first(&self) -> Option<Vec3> {
    self.points.first().map(|p| p.position)
  }

  pub fn last(&self) -> Option<Vec3> {
    self.points.last().map(|p| p.position)
  }

  /// Sum of per-segment costs.
  pub fn total_cost(&self) -> f32 {
    self.points.iter().map(|p| p.cost).sum()
  }

  /// Geometric length of the polyline.
  pub fn length(&self) -> f32 {
    self.points.windows(2).map(|w| w[0].position.distance(w[1].position)).sum()
  }

  /// Per-segment costs, one per consecutive waypoint pair.
  pub fn segment_costs(&self) -> Vec<f32> {
    self.points.iter().skip(1).map(|p| p.cost).collect()
  }
}

/// Counters collected while searching.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
  pub iterations: u32,
  pub expanded: u32,
  pub line_of_sight_checks: u32,
  pub reparented: u32,
}

/// Output of a single-volume search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
  pub outcome: SearchOutcome,
  pub path: NavPath,
  pub stats: SearchStats,
}

impl SearchResult {
  pub fn failed(outcome: SearchOutcome, stats: SearchStats) -> Self {
    Self { outcome, path: NavPath::default(), stats }
  }

  pub fn is_success(&self) -> bool {
    self.outcome == SearchOutcome::Success
  }
}
