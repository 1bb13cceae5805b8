//! Partition adjacency: shared faces and portal cells.

use glam::Vec3;
use tracing::debug;

use crate::bounds::Aabb;
use crate::morton::MortonCode;
use crate::octree::OctreeVolume;

use super::{CompactPortal, NavRegistry, PartitionAdjacency, PartitionId};

/// Samples per face axis are capped at this.
const MAX_FACE_SAMPLES: u32 = 16;
/// Portals kept per adjacency.
const MAX_PORTALS: usize = 8;

/// Face shared by two touching boxes.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SharedFace {
  axis: usize,
  /// +1 when `b` lies on the positive side of `a`.
  sign: f32,
  plane: f32,
  min: Vec3,
  max: Vec3,
}

impl SharedFace {
  fn normal(&self) -> Vec3 {
    let mut n = Vec3::ZERO;
    n[self.axis] = self.sign;
    n
  }

  fn center(&self) -> Vec3 {
    let mut c = (self.min + self.max) * 0.5;
    c[self.axis] = self.plane;
    c
  }
}

/// Face where `a` and `b` touch within `tolerance`, with positive area.
fn shared_face(a: &Aabb, b: &Aabb, tolerance: f32) -> Option<SharedFace> {
  let mut found = None;
  for axis in 0..3 {
    let (sign, plane) = if (b.min[axis] - a.max[axis]).abs() <= tolerance {
      (1.0, (a.max[axis] + b.min[axis]) * 0.5)
    } else if (a.min[axis] - b.max[axis]).abs() <= tolerance {
      (-1.0, (a.min[axis] + b.max[axis]) * 0.5)
    } else {
      continue;
    };
    let min = a.min.max(b.min);
    let max = a.max.min(b.max);
    let overlapping = (0..3).filter(|&o| o != axis).all(|o| max[o] - min[o] > tolerance);
    if overlapping {
      found = Some(SharedFace {
        axis,
        sign,
        plane,
        min,
        max,
      });
    }
  }
  found
}

/// Whether the leaf cell with `code` has at least one free sub-voxel.
fn leaf_passable(octree: &OctreeVolume, code: MortonCode) -> bool {
  match octree.layer(0).and_then(|layer| layer.find(code)) {
    Some(index) => !octree.leaf(index).is_completely_occluded(),
    None => true,
  }
}

/// Passable leaf pairs straddling `face`, closest to its centre first.
fn face_portals(face: &SharedFace, local: &OctreeVolume, remote: &OctreeVolume) -> Vec<CompactPortal> {
  let step = local.leaf_size().max(remote.leaf_size());
  if step <= 0.0 {
    return Vec::new();
  }
  let normal = face.normal();
  let center = face.center();
  let (u, v) = match face.axis {
    0 => (1, 2),
    1 => (0, 2),
    _ => (0, 1),
  };
  let samples = |o: usize| ((face.max[o] - face.min[o]) / step).ceil().clamp(1.0, MAX_FACE_SAMPLES as f32) as u32;
  let (nu, nv) = (samples(u), samples(v));

  let mut scored: Vec<(f32, CompactPortal)> = Vec::new();
  for i in 0..nu {
    for j in 0..nv {
      let mut point = center;
      point[u] = face.min[u] + (face.max[u] - face.min[u]) * (i as f32 + 0.5) / nu as f32;
      point[v] = face.min[v] + (face.max[v] - face.min[v]) * (j as f32 + 0.5) / nv as f32;
      let (Some(local_code), Some(remote_code)) = (
        local.leaf_code_at(point - normal * step * 0.5),
        remote.leaf_code_at(point + normal * step * 0.5),
      ) else {
        continue;
      };
      if !leaf_passable(local, local_code) || !leaf_passable(remote, remote_code) {
        continue;
      }
      let portal = CompactPortal {
        local: local_code,
        remote: remote_code,
      };
      if scored.iter().all(|(_, p)| *p != portal) {
        scored.push((point.distance_squared(center), portal));
      }
    }
  }
  scored.sort_by(|a, b| a.0.total_cmp(&b.0));
  scored.into_iter().take(MAX_PORTALS).map(|(_, p)| p).collect()
}

/// Rebuild every partition's adjacency list.
///
/// Partitions of the same volume whose bounds touch within `threshold`
/// (0 uses the sub-voxel size) and both carry a valid octree are linked in
/// both directions, provided at least one passable portal exists.
pub fn build_adjacency(registry: &mut NavRegistry, threshold: f32) {
  let ids: Vec<PartitionId> = registry.partitions.keys().copied().collect();
  let mut links: Vec<(PartitionId, PartitionAdjacency)> = Vec::new();

  for (i, &a_id) in ids.iter().enumerate() {
    for &b_id in &ids[i + 1..] {
      let (Some(a), Some(b)) = (registry.partition(a_id), registry.partition(b_id)) else {
        continue;
      };
      if a.volume != b.volume {
        continue;
      }
      let (Some(a_tree), Some(b_tree)) = (a.octree.as_ref(), b.octree.as_ref()) else {
        continue;
      };
      if !a_tree.is_valid() || !b_tree.is_valid() {
        continue;
      }
      let tolerance = if threshold > 0.0 {
        threshold
      } else {
        a_tree.sub_voxel_size().min(b_tree.sub_voxel_size()).max(f32::EPSILON)
      };
      let Some(face) = shared_face(&a.bounds, &b.bounds, tolerance) else {
        continue;
      };
      let forward = face_portals(&face, a_tree, b_tree);
      if forward.is_empty() {
        continue;
      }
      let backward = forward
        .iter()
        .map(|p| CompactPortal {
          local: p.remote,
          remote: p.local,
        })
        .collect();
      links.push((
        a_id,
        PartitionAdjacency {
          neighbour: b_id,
          shared_face_normal: face.normal(),
          portals: forward,
          weight: 1.0,
        },
      ));
      links.push((
        b_id,
        PartitionAdjacency {
          neighbour: a_id,
          shared_face_normal: -face.normal(),
          portals: backward,
          weight: 1.0,
        },
      ));
    }
  }

  for partition in registry.partitions.values_mut() {
    partition.adjacency.clear();
  }
  let count = links.len();
  for (owner, link) in links {
    if let Some(partition) = registry.partitions.get_mut(&owner) {
      partition.adjacency.push(link);
    }
  }
  debug!(links = count, "built partition adjacency");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_shared_face_between_touching_boxes() {
    let a = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
    let b = Aabb::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 10.0, 10.0));
    let face = shared_face(&a, &b, 0.1).expect("boxes touch");
    assert_eq!(face.axis, 0);
    assert_eq!(face.normal(), Vec3::X);
    assert_eq!(face.center(), Vec3::new(10.0, 5.0, 5.0));

    let reverse = shared_face(&b, &a, 0.1).expect("boxes touch");
    assert_eq!(reverse.normal(), -Vec3::X);
  }

  #[test]
  fn test_edge_contact_is_not_a_face() {
    let a = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
    let b = Aabb::new(Vec3::new(10.0, 10.0, 0.0), Vec3::new(20.0, 20.0, 10.0));
    assert!(shared_face(&a, &b, 0.1).is_none());
  }

  #[test]
  fn test_gap_beyond_tolerance() {
    let a = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
    let b = Aabb::new(Vec3::new(12.0, 0.0, 0.0), Vec3::new(20.0, 10.0, 10.0));
    assert!(shared_face(&a, &b, 1.0).is_none());
    assert!(shared_face(&a, &b, 2.5).is_some());
  }
}
