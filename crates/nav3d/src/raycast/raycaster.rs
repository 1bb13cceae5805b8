//! Parametric octree ray traversal (Revelles et al.).
//!
//! The ray is mirrored about the volume centre until every direction
//! component is positive; the flipped axes are kept in a 3-bit mask and
//! XOR-ed into child indices so traversal always walks octants in ray order.
//! Leaves are tested against the un-mirrored world-space ray.

use glam::Vec3;

use crate::address::NodeAddress;
use crate::bounds::Aabb;
use crate::octree::OctreeVolume;

/// Direction components smaller than this are nudged to it, keeping their sign.
const NEAR_ZERO: f32 = 1e-4;

/// First blocking contact along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
  /// Distance from the ray origin.
  pub distance: f32,
  pub impact_point: Vec3,
  /// Axis-aligned normal of the face that was hit.
  pub impact_normal: Vec3,
  /// Leaf (and sub-voxel) that blocked the ray.
  pub address: NodeAddress,
}

/// Result of a counting trace.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayTrace {
  pub hit: Option<RaycastHit>,
  /// Occluded sub-voxels crossed by the segment.
  pub occluded_voxels: u32,
}

/// Parametric entry/exit values of a ray against one octree cell.
#[derive(Clone, Copy, Debug)]
struct OctreeRay {
  t0: Vec3,
  t1: Vec3,
}

impl OctreeRay {
  #[inline]
  fn mid(&self) -> Vec3 {
    (self.t0 + self.t1) * 0.5
  }

  #[inline]
  fn intersects(&self) -> bool {
    self.t0.max_element() < self.t1.min_element()
  }

  #[inline]
  fn in_range(&self, length: f32) -> bool {
    self.t1.min_element() >= 0.0 && self.t0.max_element() <= length
  }

  /// Sub-ray of octant `child` (bit 0 X, bit 1 Y, bit 2 Z).
  #[inline]
  fn child(&self, child: u8, mid: Vec3) -> Self {
    let mut t0 = self.t0;
    let mut t1 = self.t1;
    for axis in 0..3 {
      if child & (1 << axis) != 0 {
        t0[axis] = mid[axis];
      } else {
        t1[axis] = mid[axis];
      }
    }
    Self { t0, t1 }
  }

  /// Octant the ray enters first.
  fn first_child(&self, mid: Vec3) -> u8 {
    let t0 = self.t0;
    let mut child = 0u8;
    if t0.x > t0.y && t0.x > t0.z {
      // Entry through the YZ plane
      if mid.y < t0.x {
        child |= 2;
      }
      if mid.z < t0.x {
        child |= 4;
      }
    } else if t0.y >= t0.x && t0.y > t0.z {
      // XZ plane
      if mid.x < t0.y {
        child |= 1;
      }
      if mid.z < t0.y {
        child |= 4;
      }
    } else {
      // XY plane
      if mid.x < t0.z {
        child |= 1;
      }
      if mid.y < t0.z {
        child |= 2;
      }
    }
    child
  }
}

/// Octant visited after `child`, or 8 when the ray leaves the parent.
#[inline]
fn next_child(child: u8, exit: Vec3) -> u8 {
  let step = |bit: u8| if child & bit != 0 { 8 } else { child | bit };
  if exit.x < exit.y {
    if exit.x < exit.z {
      return step(1);
    }
  } else if exit.y < exit.z {
    return step(2);
  }
  step(4)
}

/// Normal of the cube face nearest to `impact`.
pub fn impact_normal(center: Vec3, impact: Vec3) -> Vec3 {
  let d = impact - center;
  let a = d.abs();
  if a.x >= a.y && a.x >= a.z {
    Vec3::new(d.x.signum(), 0.0, 0.0)
  } else if a.y >= a.z {
    Vec3::new(0.0, d.y.signum(), 0.0)
  } else {
    Vec3::new(0.0, 0.0, d.z.signum())
  }
}

struct TraceState {
  from: Vec3,
  dir: Vec3,
  length: f32,
  mirror: u8,
  counting: bool,
  trace: RayTrace,
}

impl TraceState {
  fn record(&mut self, hit: RaycastHit) {
    if self.trace.hit.map_or(true, |best| hit.distance < best.distance) {
      self.trace.hit = Some(hit);
    }
  }
}

/// Ray queries against one octree.
#[derive(Clone, Copy)]
pub struct Raycaster<'a> {
  volume: &'a OctreeVolume,
}

impl<'a> Raycaster<'a> {
  pub fn new(volume: &'a OctreeVolume) -> Self {
    Self { volume }
  }

  /// First occluded voxel on the segment `from -> to`.
  pub fn trace(&self, from: Vec3, to: Vec3) -> Option<RaycastHit> {
    self.run(from, to, false).hit
  }

  /// Whether the segment is blocked.
  #[inline]
  pub fn is_blocked(&self, from: Vec3, to: Vec3) -> bool {
    self.trace(from, to).is_some()
  }

  /// Walk the whole segment, counting every occluded sub-voxel it crosses.
  pub fn trace_counting(&self, from: Vec3, to: Vec3) -> RayTrace {
    self.run(from, to, true)
  }

  pub fn count_occluded_voxels(&self, from: Vec3, to: Vec3) -> u32 {
    self.trace_counting(from, to).occluded_voxels
  }

  fn run(&self, from: Vec3, to: Vec3, counting: bool) -> RayTrace {
    let volume = self.volume;
    if !volume.is_valid() || volume.is_empty() {
      return RayTrace::default();
    }
    let delta = to - from;
    let length = delta.length();
    if length <= f32::EPSILON {
      return RayTrace::default();
    }
    let dir = delta / length;

    let bounds = volume.nav_bounds();
    let center = bounds.center();
    let mut origin = from;
    let mut d = dir;
    let mut mirror = 0u8;
    for axis in 0..3 {
      if d[axis].abs() < NEAR_ZERO {
        d[axis] = NEAR_ZERO.copysign(d[axis]);
      }
      if d[axis] < 0.0 {
        origin[axis] = 2.0 * center[axis] - origin[axis];
        d[axis] = -d[axis];
        mirror |= 1 << axis;
      }
    }

    let ray = OctreeRay {
      t0: (bounds.min - origin) / d,
      t1: (bounds.max - origin) / d,
    };
    let mut state = TraceState {
      from,
      dir,
      length,
      mirror,
      counting,
      trace: RayTrace::default(),
    };
    if ray.intersects() && ray.in_range(length) {
      self.traverse(ray, NodeAddress::new(volume.top_layer(), 0, 0), &mut state);
    }
    state.trace
  }

  /// Returns true when traversal should stop.
  fn traverse(&self, ray: OctreeRay, address: NodeAddress, state: &mut TraceState) -> bool {
    if !ray.in_range(state.length) {
      return false;
    }
    if address.layer() == 0 {
      return self.test_leaf(address, state);
    }
    let node = self.volume.node(address);
    if !node.has_children() {
      return false;
    }

    let mid = ray.mid();
    let first = node.first_child;
    let mut child = ray.first_child(mid);
    while child < 8 {
      let sub = ray.child(child, mid);
      let octant = (child ^ state.mirror) as u32;
      let child_address = NodeAddress::new(first.layer(), first.node() + octant, 0);
      if self.traverse(sub, child_address, state) {
        return true;
      }
      child = next_child(child, sub.t1);
    }
    false
  }

  fn test_leaf(&self, address: NodeAddress, state: &mut TraceState) -> bool {
    let volume = self.volume;
    let leaf = volume.leaf(address.node());
    if leaf.is_completely_free() {
      return false;
    }
    let Some(leaf_center) = volume.leaf_position(address.node()) else {
      return false;
    };
    let leaf_box = Aabb::from_center_half_extents(leaf_center, Vec3::splat(volume.leaf_size() * 0.5));
    let Some((leaf_enter, _)) = leaf_box.ray_intersection(state.from, state.dir, state.length) else {
      return false;
    };

    if leaf.is_completely_occluded() && !state.counting {
      let impact = state.from + state.dir * leaf_enter;
      state.record(RaycastHit {
        distance: leaf_enter,
        impact_point: impact,
        impact_normal: impact_normal(leaf_center, impact),
        address,
      });
      return true;
    }

    let half = Vec3::splat(volume.sub_voxel_size() * 0.5);
    let mut closest: Option<(f32, u8, Vec3)> = None;
    for sub in 0..64u8 {
      if !leaf.is_occluded(sub) {
        continue;
      }
      let sub_center = volume.sub_voxel_position(leaf_center, sub);
      let sub_box = Aabb::from_center_half_extents(sub_center, half);
      if let Some((t, _)) = sub_box.ray_intersection(state.from, state.dir, state.length) {
        state.trace.occluded_voxels += 1;
        if closest.map_or(true, |(best, _, _)| t < best) {
          closest = Some((t, sub, sub_center));
        }
      }
    }

    let Some((distance, sub, sub_center)) = closest else {
      return false;
    };
    let impact = state.from + state.dir * distance;
    state.record(RaycastHit {
      distance,
      impact_point: impact,
      impact_normal: impact_normal(sub_center, impact),
      address: address.with_sub_node(sub),
    });
    !state.counting
  }
}
