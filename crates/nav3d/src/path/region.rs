//! Routing across partitions and volumes.
//!
//! ```text
//! start/end in no partition ──────────▶ direct segment
//! same partition ─────────────────────▶ one octree search
//! same volume ────────────────────────▶ adjacency BFS, one search per
//!                                       partition joined at portals
//!                                       (ray-box fallback without a route)
//! different volumes ──────────────────▶ exit leg + bridge + entry leg
//! ```

use glam::Vec3;
use tracing::debug;

use crate::address::NodeAddress;
use crate::morton::MortonCode;
use crate::octree::OctreeVolume;
use crate::raycast::MultiPartitionRaycaster;
use crate::registry::{CompactPortal, NavRegistry, PartitionId, VolumeId};
use crate::search::{Algorithm, NavPath, PathSearch, SearchOutcome, SearchParams};
use crate::settings::Nav3dSettings;

use super::prune::prune_path;
use super::smoothing::smooth_path;

/// Partitions the geometric fallback may chain through.
const MAX_FALLBACK_DEPTH: u32 = 8;
/// Consecutive waypoints closer than this are merged.
const DUPLICATE_DISTANCE: f32 = 1e-3;

/// Result code of a routed path query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathResultCode {
  Success,
  /// No route exists or the search gave up.
  Fail,
  /// Endpoints could not be resolved.
  Error,
  /// Required octree data is missing or invalid.
  Invalid,
}

impl From<SearchOutcome> for PathResultCode {
  fn from(outcome: SearchOutcome) -> Self {
    match outcome {
      SearchOutcome::Success => PathResultCode::Success,
      SearchOutcome::NoPath | SearchOutcome::IterationLimitExceeded => PathResultCode::Fail,
      SearchOutcome::Error => PathResultCode::Error,
      SearchOutcome::InvalidVolumeData => PathResultCode::Invalid,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
  pub code: PathResultCode,
  pub path: NavPath,
}

impl PathResult {
  pub fn failed(code: PathResultCode) -> Self {
    Self {
      code,
      path: NavPath::default(),
    }
  }

  pub fn is_success(&self) -> bool {
    self.code == PathResultCode::Success
  }

  /// Cost of each segment, one per consecutive waypoint pair.
  pub fn segment_costs(&self) -> Vec<f32> {
    self.path.segment_costs()
  }
}

type Leg = Result<Vec<Vec3>, PathResultCode>;

/// Routes a query through the partitions of a [`NavRegistry`].
pub struct RegionPathfinder<'a> {
  registry: &'a NavRegistry,
  settings: &'a Nav3dSettings,
  algorithm: Algorithm,
  params: SearchParams,
}

impl<'a> RegionPathfinder<'a> {
  pub fn new(registry: &'a NavRegistry, settings: &'a Nav3dSettings, algorithm: Algorithm, params: SearchParams) -> Self {
    Self {
      registry,
      settings,
      algorithm,
      params,
    }
  }

  /// Route from `start` to `end`, then prune and smooth per the settings.
  #[tracing::instrument(skip_all, name = "region::find_path")]
  pub fn find_path(&self, start: Vec3, end: Vec3, smoothing_subdivisions: u32) -> PathResult {
    let raw = match self.route(start, end) {
      Ok(points) => points,
      Err(code) => {
        debug!(?code, ?start, ?end, "region route failed");
        return PathResult::failed(code);
      }
    };
    let mut points = dedup(raw);

    if self.settings.prune_paths {
      let raycaster = MultiPartitionRaycaster::new(self.registry);
      let radius = self.params.agent_radius;
      points = prune_path(
        &points,
        |a, b| raycaster.has_line_of_traversal(a, b, radius),
        self.settings.max_backscan,
        self.settings.max_los_checks,
      );
    }
    if self.settings.smooth_paths {
      points = smooth_path(&points, smoothing_subdivisions);
    }

    PathResult {
      code: PathResultCode::Success,
      path: NavPath::from_positions(points),
    }
  }

  fn route(&self, start: Vec3, end: Vec3) -> Leg {
    let registry = self.registry;
    let (start_partition, end_partition) = (registry.partition_at(start), registry.partition_at(end));
    if start_partition.is_none() && end_partition.is_none() {
      return Ok(vec![start, end]);
    }
    if let (Some(a), Some(b)) = (start_partition, end_partition) {
      if a == b {
        return self.search_in(a, start, end);
      }
    }

    let (start_volume, end_volume) = (registry.volume_at(start), registry.volume_at(end));
    if start_volume.is_some() && start_volume == end_volume {
      return self.route_in_volume(start, end);
    }
    self.route_across_volumes(start, end, start_volume, end_volume)
  }

  /// Exit the start volume, bridge the gap, enter the end volume.
  fn route_across_volumes(&self, start: Vec3, end: Vec3, start_volume: Option<VolumeId>, end_volume: Option<VolumeId>) -> Leg {
    let distance = start.distance(end);
    let dir = (end - start).normalize_or_zero();
    let mut points = Vec::new();

    let exit = match start_volume.and_then(|id| self.registry.volume(id)) {
      Some(volume) => {
        let exit = volume.bounds.closest_point(start + dir * distance * 2.0);
        points.extend(self.route_in_volume(start, exit)?);
        exit
      }
      None => {
        points.push(start);
        start
      }
    };

    match end_volume.and_then(|id| self.registry.volume(id)) {
      Some(volume) => {
        let entry = volume.bounds.closest_point(end - dir * distance * 2.0);
        points.push(exit);
        points.extend(self.route_in_volume(entry, end)?);
      }
      None => {
        points.push(exit);
        points.push(end);
      }
    }
    Ok(points)
  }

  fn route_in_volume(&self, start: Vec3, end: Vec3) -> Leg {
    let registry = self.registry;
    let (Some(a), Some(b)) = (registry.partition_at(start), registry.partition_at(end)) else {
      return Ok(vec![start, end]);
    };
    if a == b {
      return self.search_in(a, start, end);
    }
    match registry.adjacency_path(a, b) {
      Some(chain) => self.route_through_portals(&chain, start, end),
      None => self.route_geometric(a, b, start, end, 0, &mut vec![a]),
    }
  }

  /// One search per partition of `chain`, joined at portal cells.
  fn route_through_portals(&self, chain: &[PartitionId], start: Vec3, end: Vec3) -> Leg {
    let mut points = Vec::new();
    let mut current = start;
    for pair in chain.windows(2) {
      let (from, to) = (pair[0], pair[1]);
      let (local, remote) = self.portal_positions(from, to, current, end).ok_or(PathResultCode::Invalid)?;
      points.extend(self.search_in(from, current, local)?);
      current = remote;
    }
    let last = *chain.last().ok_or(PathResultCode::Error)?;
    points.extend(self.search_in(last, current, end)?);
    Ok(points)
  }

  /// Navigable positions on both sides of the portal from `from` into `to`
  /// that keeps the detour between `current` and `end` shortest.
  fn portal_positions(&self, from: PartitionId, to: PartitionId, current: Vec3, end: Vec3) -> Option<(Vec3, Vec3)> {
    let registry = self.registry;
    let link = registry.partition(from)?.adjacency_to(to)?;
    let local_tree = registry.octree(from)?;
    let remote_tree = registry.octree(to)?;
    link
      .portals
      .iter()
      .map(|portal: &CompactPortal| {
        let local = snap_leaf(local_tree, portal.local);
        let remote = snap_leaf(remote_tree, portal.remote);
        (current.distance(local) + remote.distance(end), local, remote)
      })
      .min_by(|a, b| a.0.total_cmp(&b.0))
      .map(|(_, local, remote)| (local, remote))
  }

  /// Walk the straight line partition by partition when no adjacency route
  /// exists.
  fn route_geometric(
    &self,
    current: PartitionId,
    target: PartitionId,
    from: Vec3,
    end: Vec3,
    depth: u32,
    visited: &mut Vec<PartitionId>,
  ) -> Leg {
    if current == target {
      return self.search_in(current, from, end);
    }
    if depth >= MAX_FALLBACK_DEPTH {
      return Err(PathResultCode::Fail);
    }
    let registry = self.registry;
    let partition = registry.partition(current).ok_or(PathResultCode::Invalid)?;
    let length = from.distance(end);
    let dir = (end - from).normalize_or_zero();
    let (_, exit_t) = partition
      .bounds
      .ray_intersection(from, dir, length)
      .ok_or(PathResultCode::Fail)?;

    let next = registry
      .partitions()
      .filter(|p| p.volume == partition.volume && !visited.contains(&p.id))
      .filter_map(|p| {
        let (enter, _) = p.bounds.ray_intersection(from, dir, length)?;
        Some((enter, p.id))
      })
      .filter(|(enter, _)| *enter + f32::EPSILON >= exit_t - 1.0)
      .min_by(|a, b| a.0.total_cmp(&b.0));
    let Some((enter_t, next)) = next else {
      return Err(PathResultCode::Fail);
    };

    let exit = from + dir * exit_t;
    let entry = from + dir * enter_t.max(exit_t);
    let mut points = self.search_in(current, from, exit)?;
    visited.push(next);
    points.extend(self.route_geometric(next, target, entry, end, depth + 1, visited)?);
    Ok(points)
  }

  /// Octree search inside one partition.
  fn search_in(&self, partition: PartitionId, start: Vec3, end: Vec3) -> Leg {
    let Some(octree) = self.registry.octree(partition) else {
      return Err(PathResultCode::Invalid);
    };
    if !octree.is_valid() {
      return Err(PathResultCode::Invalid);
    }
    if octree.is_empty() {
      return Ok(vec![start, end]);
    }
    let result = PathSearch::new(octree, self.params).find_path(start, end, self.algorithm);
    if !result.is_success() {
      return Err(result.outcome.into());
    }
    Ok(result.path.positions().collect())
  }
}

/// Navigable position closest to the centre of a leaf cell.
fn snap_leaf(octree: &OctreeVolume, code: MortonCode) -> Vec3 {
  let center = octree.position_from_code(0, code);
  if octree.is_empty() {
    return center;
  }
  octree
    .address_at(center, 0)
    .or_else(|| octree.nearest_navigable(center, 0))
    .filter(|address: &NodeAddress| address.is_valid())
    .and_then(|address| octree.node_position(address))
    .unwrap_or(center)
}

/// Concatenated legs without repeated waypoints.
fn dedup(points: Vec<Vec3>) -> Vec<Vec3> {
  let mut out: Vec<Vec3> = Vec::with_capacity(points.len());
  for point in points {
    if out.last().map_or(true, |last| last.distance(point) > DUPLICATE_DISTANCE) {
      out.push(point);
    }
  }
  out
}

#[cfg(test)]
#[path = "region_test.rs"]
mod region_test;
