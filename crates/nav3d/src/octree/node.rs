//! Octree cells: interior nodes and 4×4×4 leaf occupancy masks.

use glam::{IVec3, UVec3};

use crate::address::{NodeAddress, SubNodeIndex};
use crate::morton::{self, MortonCode};

/// Number of face neighbours per cell.
pub const DIRECTION_COUNT: usize = 6;

/// Face directions in neighbour-link order.
pub const DIRECTION_OFFSETS: [IVec3; DIRECTION_COUNT] = [
  IVec3::new(1, 0, 0),  // +X
  IVec3::new(-1, 0, 0), // -X
  IVec3::new(0, 1, 0),  // +Y
  IVec3::new(0, -1, 0), // -Y
  IVec3::new(0, 0, 1),  // +Z
  IVec3::new(0, 0, -1), // -Z
];

/// Sub-voxels per leaf axis.
pub const LEAF_RESOLUTION: u32 = 4;
/// Sub-voxels per leaf.
pub const LEAF_SUB_NODES: usize = 64;

/// Axis (0 = X, 1 = Y, 2 = Z) of a face direction.
#[inline]
pub const fn direction_axis(direction: usize) -> usize {
  direction / 2
}

/// True for +X, +Y, +Z.
#[inline]
pub const fn direction_is_positive(direction: usize) -> bool {
  direction % 2 == 0
}

/// Octants of a subdivided neighbour that touch a cell looking in `direction`.
///
/// Looking towards +X the touching face of the neighbour is its -X side, so
/// the children with the X bit clear are returned.
pub fn touching_child_octants(direction: usize) -> impl Iterator<Item = u8> {
  let bit = 1u8 << direction_axis(direction);
  let want_set = !direction_is_positive(direction);
  (0..8u8).filter(move |octant| (octant & bit != 0) == want_set)
}

/// Sub-voxels of a neighbouring leaf that touch a cell looking in `direction`.
pub fn touching_leaf_sub_nodes(direction: usize) -> impl Iterator<Item = SubNodeIndex> {
  let axis = direction_axis(direction);
  let face = if direction_is_positive(direction) { 0 } else { LEAF_RESOLUTION - 1 };
  (0..LEAF_SUB_NODES as u8).filter(move |&sub| sub_node_coords(sub)[axis] == face)
}

/// Grid coordinates of a sub-voxel inside its leaf.
#[inline]
pub fn sub_node_coords(sub: SubNodeIndex) -> UVec3 {
  morton::decode(sub as MortonCode)
}

/// Sub-voxel index of grid coordinates inside a leaf.
#[inline]
pub fn sub_node_index(coords: UVec3) -> SubNodeIndex {
  debug_assert!(coords.cmplt(UVec3::splat(LEAF_RESOLUTION)).all());
  morton::encode(coords) as SubNodeIndex
}

/// One octree cell above the leaf resolution (or the cell shape of a leaf).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
  /// Spatial key inside the node's layer.
  pub code: MortonCode,
  pub parent: NodeAddress,
  /// First of 8 consecutive children, or the leaf on layer 0.
  /// Invalid when the cell is not subdivided.
  pub first_child: NodeAddress,
  /// Face neighbours in [`DIRECTION_OFFSETS`] order.
  pub neighbours: [NodeAddress; DIRECTION_COUNT],
}

impl Node {
  /// Returned by lookups that miss.
  pub const INVALID: Self = Self {
    code: MortonCode::MAX,
    parent: NodeAddress::INVALID,
    first_child: NodeAddress::INVALID,
    neighbours: [NodeAddress::INVALID; DIRECTION_COUNT],
  };

  pub fn new(code: MortonCode) -> Self {
    Self {
      code,
      ..Self::INVALID
    }
  }

  /// Subdivided cells are the only ones with finer data below them.
  #[inline]
  pub fn has_children(&self) -> bool {
    self.first_child.is_valid()
  }
}

/// 4×4×4 occupancy bitmask of a leaf cell, indexed by sub-voxel Morton code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafNode {
  pub occupancy: u64,
  pub parent: NodeAddress,
}

impl LeafNode {
  pub const EMPTY: Self = Self {
    occupancy: 0,
    parent: NodeAddress::INVALID,
  };

  pub fn new(occupancy: u64) -> Self {
    Self {
      occupancy,
      ..Self::EMPTY
    }
  }

  #[inline]
  pub fn is_completely_free(&self) -> bool {
    self.occupancy == 0
  }

  #[inline]
  pub fn is_completely_occluded(&self) -> bool {
    self.occupancy == u64::MAX
  }

  #[inline]
  pub fn is_occluded(&self, sub: SubNodeIndex) -> bool {
    self.occupancy & (1u64 << sub) != 0
  }

  #[inline]
  pub fn set_occluded(&mut self, sub: SubNodeIndex) {
    self.occupancy |= 1u64 << sub;
  }

  /// Free sub-voxel indices in ascending order.
  pub fn free_sub_nodes(&self) -> impl Iterator<Item = SubNodeIndex> + '_ {
    (0..LEAF_SUB_NODES as u8).filter(move |&sub| !self.is_occluded(sub))
  }

  pub fn occluded_count(&self) -> u32 {
    self.occupancy.count_ones()
  }
}

impl Default for LeafNode {
  fn default() -> Self {
    Self::EMPTY
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_touching_child_octants() {
    let plus_x: Vec<u8> = touching_child_octants(0).collect();
    assert_eq!(plus_x, vec![0, 2, 4, 6]);
    let minus_x: Vec<u8> = touching_child_octants(1).collect();
    assert_eq!(minus_x, vec![1, 3, 5, 7]);
    let plus_z: Vec<u8> = touching_child_octants(4).collect();
    assert_eq!(plus_z, vec![0, 1, 2, 3]);
    let minus_y: Vec<u8> = touching_child_octants(3).collect();
    assert_eq!(minus_y, vec![2, 3, 6, 7]);
  }

  #[test]
  fn test_touching_leaf_sub_nodes() {
    for direction in 0..DIRECTION_COUNT {
      let subs: Vec<u8> = touching_leaf_sub_nodes(direction).collect();
      assert_eq!(subs.len(), 16, "direction {direction}");
    }
    // +X neighbour is entered on its x == 0 face
    let plus_x: Vec<u8> = touching_leaf_sub_nodes(0).collect();
    assert!(plus_x.iter().all(|&s| sub_node_coords(s).x == 0));
    assert!(plus_x.contains(&0) && plus_x.contains(&54));
    let minus_z: Vec<u8> = touching_leaf_sub_nodes(5).collect();
    assert!(minus_z.iter().all(|&s| sub_node_coords(s).z == 3));
    assert!(minus_z.contains(&63));
  }

  #[test]
  fn test_sub_node_index_round_trip() {
    for sub in 0..64u8 {
      assert_eq!(sub_node_index(sub_node_coords(sub)), sub);
    }
  }

  #[test]
  fn test_leaf_occupancy() {
    let mut leaf = LeafNode::EMPTY;
    assert!(leaf.is_completely_free());
    leaf.set_occluded(5);
    assert!(leaf.is_occluded(5));
    assert!(!leaf.is_occluded(4));
    assert_eq!(leaf.occluded_count(), 1);
    assert_eq!(leaf.free_sub_nodes().count(), 63);
    assert!(LeafNode::new(u64::MAX).is_completely_occluded());
  }

  #[test]
  fn test_node_has_children() {
    let mut node = Node::new(12);
    assert!(!node.has_children());
    node.first_child = NodeAddress::new(0, 8, 0);
    assert!(node.has_children());
  }
}
