//! Traversal checks for agents with a radius, across partitions.
//!
//! ```text
//!        up
//!   o----+----o      a segment is clear when the centre ray and the four
//!   |    |    |      corner rays offset by `radius` are all unblocked in
//!   +----*----+ right  every partition they cross
//!   |    |    |
//!   o----+----o
//! ```

use glam::Vec3;

use crate::registry::{NavRegistry, PartitionId};

use super::Raycaster;

/// Direction whose |dot| with Z exceeds this uses X as the up reference.
const VERTICAL_THRESHOLD: f32 = 0.99;

/// Centre ray plus four corner offsets of the agent's cross-section.
pub fn corridor_offsets(direction: Vec3, radius: f32) -> [Vec3; 5] {
  let dir = direction.normalize_or_zero();
  if radius <= 0.0 || dir == Vec3::ZERO {
    return [Vec3::ZERO; 5];
  }
  let reference = if dir.dot(Vec3::Z).abs() > VERTICAL_THRESHOLD { Vec3::X } else { Vec3::Z };
  let right = dir.cross(reference).normalize();
  let up = dir.cross(right).normalize();
  [
    Vec3::ZERO,
    (right + up).normalize() * radius,
    (right - up).normalize() * radius,
    (-right + up).normalize() * radius,
    (-right - up).normalize() * radius,
  ]
}

impl Raycaster<'_> {
  /// Whether an agent of `radius` moving from `from` to `to` touches
  /// occluded space in this octree. A zero radius fires the centre ray only.
  pub fn is_corridor_blocked(&self, from: Vec3, to: Vec3, radius: f32) -> bool {
    let offsets = corridor_offsets(to - from, radius);
    let rays = if radius > 0.0 { &offsets[..] } else { &offsets[..1] };
    rays
      .iter()
      .any(|offset| self.is_blocked(from + *offset, to + *offset))
  }
}

/// Piece of a segment inside one partition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartitionSegment {
  pub partition: PartitionId,
  /// Parameter along the full segment where this piece starts, in [0, 1].
  pub t_enter: f32,
  pub from: Vec3,
  pub to: Vec3,
}

/// Ray queries spanning every partition of a [`NavRegistry`].
#[derive(Clone, Copy)]
pub struct MultiPartitionRaycaster<'a> {
  registry: &'a NavRegistry,
}

impl<'a> MultiPartitionRaycaster<'a> {
  pub fn new(registry: &'a NavRegistry) -> Self {
    Self { registry }
  }

  /// Clip `from -> to` against every partition, ordered from `from`.
  pub fn segments(&self, from: Vec3, to: Vec3) -> Vec<PartitionSegment> {
    let delta = to - from;
    let length = delta.length();
    let mut segments: Vec<PartitionSegment> = Vec::new();
    for partition in self.registry.partitions() {
      if length <= f32::EPSILON {
        if partition.bounds.contains_point(from) {
          segments.push(PartitionSegment {
            partition: partition.id,
            t_enter: 0.0,
            from,
            to,
          });
        }
        continue;
      }
      let dir = delta / length;
      if let Some((t0, t1)) = partition.bounds.ray_intersection(from, dir, length) {
        segments.push(PartitionSegment {
          partition: partition.id,
          t_enter: t0 / length,
          from: from + dir * t0,
          to: from + dir * t1,
        });
      }
    }
    segments.sort_by(|a, b| a.t_enter.total_cmp(&b.t_enter));
    segments
  }

  /// Whether an agent of `radius` can move straight from `from` to `to`.
  ///
  /// Segments touching no partition, or crossing a partition without an
  /// octree, are reported blocked. Empty octrees never block.
  pub fn has_line_of_traversal(&self, from: Vec3, to: Vec3, radius: f32) -> bool {
    let segments = self.segments(from, to);
    if segments.is_empty() {
      return false;
    }
    for segment in &segments {
      let Some(octree) = self.registry.octree(segment.partition) else {
        return false;
      };
      if !octree.is_valid() {
        return false;
      }
      if octree.is_empty() {
        continue;
      }
      if Raycaster::new(octree).is_corridor_blocked(segment.from, segment.to, radius) {
        return false;
      }
    }
    true
  }
}
