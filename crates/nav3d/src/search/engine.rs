//! The search loop shared by every [`Algorithm`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use glam::Vec3;
use tracing::debug;

use crate::address::{LayerIndex, NodeAddress};
use crate::octree::{NeighbourList, OctreeVolume};
use crate::raycast::Raycaster;

use super::strategy::{AnyAngle, BestFirst, LazyAnyAngle, ParentOverride, PopAction, SearchStrategy};
use super::types::{Algorithm, NavPath, PathPoint, SearchOutcome, SearchParams, SearchResult, SearchStats};

/// Requested endpoints closer than this to the path's first/last waypoint
/// are not added again.
const ENDPOINT_TOLERANCE: f32 = 1.0;

/// Per-node search state.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NodeRecord {
  pub g: f32,
  pub f: f32,
  pub parent: NodeAddress,
  /// Graph predecessor and its cost, kept while `parent` is an unverified
  /// shortcut.
  pub via: Option<(NodeAddress, f32)>,
  pub closed: bool,
  pub position: Vec3,
}

impl NodeRecord {
  fn new(position: Vec3) -> Self {
    Self {
      g: f32::INFINITY,
      f: f32::INFINITY,
      parent: NodeAddress::INVALID,
      via: None,
      closed: false,
      position,
    }
  }
}

#[derive(Clone, Copy, Debug)]
struct OpenEntry {
  f: f32,
  address: NodeAddress,
}

impl PartialEq for OpenEntry {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for OpenEntry {
  // Min-heap on f
  fn cmp(&self, other: &Self) -> Ordering {
    other.f.total_cmp(&self.f).then_with(|| other.address.cmp(&self.address))
  }
}

/// Mutable state of one search run.
pub(crate) struct SearchContext<'a> {
  volume: &'a OctreeVolume,
  params: SearchParams,
  raycaster: Raycaster<'a>,
  records: HashMap<NodeAddress, NodeRecord>,
  open: BinaryHeap<OpenEntry>,
  goal: NodeAddress,
  goal_position: Vec3,
  start: NodeAddress,
  start_position: Vec3,
  /// Finest layer large enough for the agent.
  min_layer: LayerIndex,
  pub stats: SearchStats,
}

impl<'a> SearchContext<'a> {
  fn new(volume: &'a OctreeVolume, params: SearchParams, start: (NodeAddress, Vec3), goal: (NodeAddress, Vec3)) -> Self {
    Self {
      min_layer: volume.min_layer_for_agent_radius(params.agent_radius),
      volume,
      params,
      raycaster: Raycaster::new(volume),
      records: HashMap::new(),
      open: BinaryHeap::new(),
      start: start.0,
      start_position: start.1,
      goal: goal.0,
      goal_position: goal.1,
      stats: SearchStats::default(),
    }
  }

  #[inline]
  pub fn volume(&self) -> &'a OctreeVolume {
    self.volume
  }

  #[inline]
  pub fn goal(&self) -> NodeAddress {
    self.goal
  }

  /// Record of `address`, created on first access.
  pub fn record(&mut self, address: NodeAddress) -> &mut NodeRecord {
    let Self {
      volume,
      records,
      start,
      start_position,
      goal,
      goal_position,
      ..
    } = self;
    records.entry(address).or_insert_with(|| {
      let position = if address == *start {
        *start_position
      } else if address == *goal {
        *goal_position
      } else {
        volume.node_position(address).unwrap_or(Vec3::ZERO)
      };
      NodeRecord::new(position)
    })
  }

  pub fn existing(&self, address: NodeAddress) -> Option<&NodeRecord> {
    self.records.get(&address)
  }

  #[inline]
  pub fn position(&mut self, address: NodeAddress) -> Vec3 {
    self.record(address).position
  }

  #[inline]
  pub fn edge_cost(&self, from: Vec3, to: Vec3) -> f32 {
    self.params.cost.cost(from, to)
  }

  /// Clear straight corridor of the agent's radius between two nodes'
  /// positions.
  pub fn line_of_sight(&mut self, from: NodeAddress, to: NodeAddress) -> bool {
    let a = self.position(from);
    let b = self.position(to);
    self.stats.line_of_sight_checks += 1;
    !self.raycaster.is_corridor_blocked(a, b, self.params.agent_radius)
  }

  /// Priority of `address` reached with cost `g`.
  pub fn f_score(&self, address: NodeAddress, position: Vec3, g: f32) -> f32 {
    let h = self.params.heuristic.estimate(position, self.goal_position) * self.params.heuristic_scale;
    let f = g + h;
    if !self.params.use_node_size_compensation {
      return f;
    }
    let leaf = self.volume.node_size(0);
    let size = if self.volume.is_sub_voxel_address(address) {
      leaf
    } else {
      self.volume.node_size(address.layer())
    };
    if leaf <= 0.0 {
      return f;
    }
    f / (size / leaf).max(1.0)
  }

  pub fn push(&mut self, address: NodeAddress) {
    let record = *self.record(address);
    self.open.push(OpenEntry { f: record.f, address });
  }

  /// Assign `parent` and `g` to `address` and refresh its priority.
  pub fn set_parent(&mut self, address: NodeAddress, parent: NodeAddress, g: f32, via: Option<(NodeAddress, f32)>) {
    let position = self.position(address);
    let f = self.f_score(address, position, g);
    let record = self.record(address);
    record.parent = parent;
    record.g = g;
    record.f = f;
    record.via = via;
  }
}

/// Single-volume pathfinder.
pub struct PathSearch<'a> {
  volume: &'a OctreeVolume,
  params: SearchParams,
}

impl<'a> PathSearch<'a> {
  pub fn new(volume: &'a OctreeVolume, params: SearchParams) -> Self {
    Self { volume, params }
  }

  /// Find a path from `start` to `end` with the given algorithm.
  #[tracing::instrument(skip_all, name = "search::find_path", fields(algorithm = algorithm.name()))]
  pub fn find_path(&self, start: Vec3, end: Vec3, algorithm: Algorithm) -> SearchResult {
    let volume = self.volume;
    if !volume.is_valid() {
      return SearchResult::failed(SearchOutcome::InvalidVolumeData, SearchStats::default());
    }
    if volume.is_empty() {
      return self.finish(NavPath::from_positions([start, end]), SearchStats::default());
    }

    let min_layer = volume.min_layer_for_agent_radius(self.params.agent_radius);
    let (Some(start_address), Some(goal_address)) =
      (volume.address_at(start, min_layer), volume.address_at(end, min_layer))
    else {
      debug!(?start, ?end, "search endpoints not navigable");
      return SearchResult::failed(SearchOutcome::Error, SearchStats::default());
    };
    if start_address == goal_address {
      return self.finish(self.costed([start, end]), SearchStats::default());
    }

    let start_position = self.search_position(start_address, start);
    let goal_position = self.search_position(goal_address, end);
    let mut ctx = SearchContext::new(
      volume,
      self.params,
      (start_address, start_position),
      (goal_address, goal_position),
    );

    let outcome = match algorithm {
      Algorithm::BestFirst => run(&mut ctx, &mut BestFirst),
      Algorithm::AnyAngle => run(&mut ctx, &mut AnyAngle),
      Algorithm::LazyAnyAngle => run(&mut ctx, &mut LazyAnyAngle),
    };
    let stats = ctx.stats;
    if outcome != SearchOutcome::Success {
      debug!(?outcome, iterations = stats.iterations, "search failed");
      return SearchResult::failed(outcome, stats);
    }

    let mut positions = reconstruct(&mut ctx);
    if positions.first().map_or(true, |p| p.distance(start) > ENDPOINT_TOLERANCE) {
      positions.insert(0, start);
    } else if let Some(first) = positions.first_mut() {
      *first = start;
    }
    if positions.last().map_or(true, |p| p.distance(end) > ENDPOINT_TOLERANCE) {
      positions.push(end);
    } else if let Some(last) = positions.last_mut() {
      *last = end;
    }
    self.finish(self.costed(positions), stats)
  }

  /// The requested position when it lies inside the snapped cell, else the
  /// cell centre.
  fn search_position(&self, address: NodeAddress, requested: Vec3) -> Vec3 {
    match self.volume.node_bounds(address) {
      Some(bounds) if bounds.contains_point(requested) => requested,
      _ => self.volume.node_position(address).unwrap_or(requested),
    }
  }

  fn costed(&self, positions: impl IntoIterator<Item = Vec3>) -> NavPath {
    let mut points: Vec<PathPoint> = Vec::new();
    for position in positions {
      let cost = points.last().map_or(0.0, |prev| self.params.cost.cost(prev.position, position));
      points.push(PathPoint { position, cost });
    }
    NavPath { points }
  }

  fn finish(&self, path: NavPath, stats: SearchStats) -> SearchResult {
    SearchResult {
      outcome: SearchOutcome::Success,
      path,
      stats,
    }
  }
}

/// Convenience wrapper around [`PathSearch::find_path`].
pub fn find_path(volume: &OctreeVolume, start: Vec3, end: Vec3, algorithm: Algorithm, params: &SearchParams) -> SearchResult {
  PathSearch::new(volume, *params).find_path(start, end, algorithm)
}

fn run<S: SearchStrategy>(ctx: &mut SearchContext<'_>, strategy: &mut S) -> SearchOutcome {
  let start = ctx.start;
  let start_position = ctx.start_position;
  let start_f = ctx.f_score(start, start_position, 0.0);
  {
    let record = ctx.record(start);
    record.g = 0.0;
    record.f = start_f;
  }
  ctx.push(start);

  let mut neighbours = NeighbourList::new();
  while let Some(entry) = ctx.open.pop() {
    let Some(record) = ctx.existing(entry.address).copied() else {
      continue;
    };
    if record.closed || entry.f.to_bits() != record.f.to_bits() {
      continue;
    }
    if ctx.stats.iterations >= ctx.params.max_iterations {
      return SearchOutcome::IterationLimitExceeded;
    }
    ctx.stats.iterations += 1;

    let current = entry.address;
    if strategy.on_pop(ctx, current) == PopAction::Requeue {
      ctx.push(current);
      continue;
    }
    ctx.record(current).closed = true;
    ctx.stats.expanded += 1;
    if current == ctx.goal {
      return SearchOutcome::Success;
    }

    let current_g = ctx.record(current).g;
    let current_position = ctx.position(current);
    ctx.volume.neighbours(current, &mut neighbours);
    for &neighbour in neighbours.iter() {
      if neighbour.layer() < ctx.min_layer && neighbour != ctx.goal {
        continue;
      }
      if ctx.existing(neighbour).is_some_and(|r| r.closed) {
        continue;
      }
      let neighbour_position = ctx.position(neighbour);
      let graph_g = current_g + ctx.edge_cost(current_position, neighbour_position);
      let choice = strategy
        .try_shortcut(ctx, current, neighbour, graph_g)
        .unwrap_or(ParentOverride {
          parent: current,
          g: graph_g,
          via: None,
        });
      if choice.g < ctx.record(neighbour).g {
        ctx.set_parent(neighbour, choice.parent, choice.g, choice.via);
        ctx.push(neighbour);
      }
    }
  }
  SearchOutcome::NoPath
}

/// Goal-to-start parent walk, returned start first.
///
/// A graph edge between cells of different sizes can clip occluded space
/// when drawn centre to centre; such edges are bent through the centre of
/// the face the two cells share.
fn reconstruct(ctx: &mut SearchContext<'_>) -> Vec<Vec3> {
  let limit = ctx.records.len() + 1;
  let mut chain: Vec<(NodeAddress, Vec3)> = Vec::new();
  let mut current = ctx.goal;
  while current.is_valid() && chain.len() < limit {
    chain.push((current, ctx.position(current)));
    current = ctx.record(current).parent;
  }
  chain.reverse();

  let mut positions = Vec::with_capacity(chain.len());
  for (index, &(address, position)) in chain.iter().enumerate() {
    if index > 0 {
      let (previous, previous_position) = chain[index - 1];
      if ctx.raycaster.is_blocked(previous_position, position) {
        match shared_face_point(ctx.volume, previous, address) {
          Some(connector) => {
            if ctx.raycaster.is_blocked(previous_position, connector) || ctx.raycaster.is_blocked(connector, position) {
              debug!(?previous, ?address, "face connector still clips occluded space");
            }
            positions.push(connector);
          }
          None => debug!(?previous, ?address, "blocked segment between cells without a shared face"),
        }
      }
    }
    positions.push(position);
  }
  positions
}

/// Centre of the face shared by two touching cells.
fn shared_face_point(volume: &OctreeVolume, a: NodeAddress, b: NodeAddress) -> Option<Vec3> {
  let a = volume.node_bounds(a)?;
  let b = volume.node_bounds(b)?;
  let min = a.min.max(b.min);
  let max = a.max.min(b.max);
  let tolerance = volume.sub_voxel_size() * 1e-3;
  if (max - min).cmplt(Vec3::splat(-tolerance)).any() {
    return None;
  }
  Some((min + max) * 0.5)
}
