//! Read-only queries over a built octree: position lookup, neighbour
//! expansion and random sampling.

use glam::{IVec3, Vec3};
use rand::Rng;
use smallvec::SmallVec;

use crate::address::{LayerIndex, NodeAddress, SubNodeIndex};
use crate::morton;

use super::node::{
  sub_node_coords, sub_node_index, touching_child_octants, touching_leaf_sub_nodes, DIRECTION_COUNT,
  DIRECTION_OFFSETS, LEAF_RESOLUTION,
};
use super::volume::OctreeVolume;

/// Neighbour list sized for the common case of a few faces with subdivision.
pub type NeighbourList = SmallVec<[NodeAddress; 32]>;

/// Positions within this distance outside the bounds still resolve.
const BOUNDS_TOLERANCE: f32 = 1.0;

impl OctreeVolume {
  /// Resolve a world position to the navigable cell containing it.
  ///
  /// Descends from the coarsest layer; the first childless node at or above
  /// `min_layer` wins. Inside a partially occluded leaf the position's own
  /// sub-voxel is used when free, otherwise the nearest free sub-voxel of the
  /// same leaf. When that fails the whole octree is scanned for the nearest
  /// navigable cell. Returns `None` outside the navigation bounds.
  pub fn address_at(&self, position: Vec3, min_layer: LayerIndex) -> Option<NodeAddress> {
    if !self.is_valid() || !self.nav_bounds().expand(BOUNDS_TOLERANCE).contains_point(position) {
      return None;
    }
    let top = self.top_layer();
    let min_layer = min_layer.min(top);
    if self.is_empty() {
      return Some(NodeAddress::new(top, 0, 0));
    }

    let mut layer = top;
    loop {
      let code = self.code_at(layer, position);
      // Siblings are materialized together, so a miss means malformed data
      let Some(index) = self.layer(layer).and_then(|l| l.find(code)) else {
        break;
      };
      let address = NodeAddress::new(layer, index, 0);
      let node = self.node(address);
      if !node.has_children() {
        return Some(address);
      }
      if layer == 0 {
        if let Some(sub) = self.free_sub_node_near(index, position) {
          return Some(address.with_sub_node(sub));
        }
        break;
      }
      if layer == min_layer {
        break;
      }
      layer -= 1;
    }

    self.nearest_navigable(position, min_layer)
  }

  /// Sub-voxel containing `position` if free, else the nearest free one.
  fn free_sub_node_near(&self, leaf_index: u32, position: Vec3) -> Option<SubNodeIndex> {
    let leaf = self.leaf(leaf_index);
    if leaf.is_completely_occluded() {
      return None;
    }
    let leaf_center = self.leaf_position(leaf_index)?;
    let sub = self.sub_node_at(leaf_center, position);
    if !leaf.is_occluded(sub) {
      return Some(sub);
    }
    leaf.free_sub_nodes().min_by(|&a, &b| {
      let da = self.sub_voxel_position(leaf_center, a).distance_squared(position);
      let db = self.sub_voxel_position(leaf_center, b).distance_squared(position);
      da.total_cmp(&db)
    })
  }

  /// Sub-voxel of the leaf centred at `leaf_center` containing `position`,
  /// clamped to the leaf.
  fn sub_node_at(&self, leaf_center: Vec3, position: Vec3) -> SubNodeIndex {
    let leaf_min = leaf_center - Vec3::splat(self.leaf_size() * 0.5);
    let local = ((position - leaf_min) / self.sub_voxel_size())
      .floor()
      .clamp(Vec3::ZERO, Vec3::splat((LEAF_RESOLUTION - 1) as f32))
      .as_uvec3();
    sub_node_index(local)
  }

  /// Brute-force scan for the navigable cell closest to `position`.
  pub fn nearest_navigable(&self, position: Vec3, min_layer: LayerIndex) -> Option<NodeAddress> {
    if !self.is_valid() {
      return None;
    }
    if self.is_empty() {
      return Some(NodeAddress::new(self.top_layer(), 0, 0));
    }
    let mut best: Option<(f32, NodeAddress)> = None;
    let mut consider = |address: NodeAddress, center: Vec3| {
      let distance = center.distance_squared(position);
      if best.map_or(true, |(d, _)| distance < d) {
        best = Some((distance, address));
      }
    };

    for (layer_index, layer) in self.layers().iter().enumerate().skip(min_layer as usize) {
      let layer_index = layer_index as LayerIndex;
      for (node_index, node) in layer.nodes().iter().enumerate() {
        let address = NodeAddress::new(layer_index, node_index as u32, 0);
        let center = self.position_from_code(layer_index, node.code);
        if !node.has_children() {
          consider(address, center);
        } else if layer_index == 0 {
          for sub in self.leaf(node_index as u32).free_sub_nodes() {
            consider(address.with_sub_node(sub), self.sub_voxel_position(center, sub));
          }
        }
      }
    }
    best.map(|(_, address)| address)
  }

  /// Whether the finest cell containing `position` is occluded.
  ///
  /// Positions outside the navigation bounds are reported free.
  pub fn is_position_occluded(&self, position: Vec3) -> bool {
    if !self.is_valid() || self.is_empty() || !self.nav_bounds().contains_point(position) {
      return false;
    }
    let mut layer = self.top_layer();
    loop {
      let code = self.code_at(layer, position);
      let Some(index) = self.layer(layer).and_then(|l| l.find(code)) else {
        return false;
      };
      let node = self.node(NodeAddress::new(layer, index, 0));
      if !node.has_children() {
        return false;
      }
      if layer == 0 {
        let Some(center) = self.leaf_position(index) else {
          return false;
        };
        return self.leaf(index).is_occluded(self.sub_node_at(center, position));
      }
      layer -= 1;
    }
  }

  /// Collect the navigable cells sharing a face with `address`.
  ///
  /// Subdivided neighbours are descended so only their cells touching the
  /// shared face are returned.
  pub fn neighbours(&self, address: NodeAddress, out: &mut NeighbourList) {
    out.clear();
    if !self.contains_address(address) {
      return;
    }
    let node = *self.node(address);
    if address.layer() == 0 && node.has_children() {
      self.leaf_neighbours(address, out);
      return;
    }

    for direction in 0..DIRECTION_COUNT {
      let neighbour = node.neighbours[direction];
      if !neighbour.is_valid() {
        continue;
      }
      self.push_face_cells(neighbour, direction, out);
    }
  }

  /// Neighbours of one sub-voxel inside a partially occluded leaf.
  fn leaf_neighbours(&self, address: NodeAddress, out: &mut NeighbourList) {
    let node = *self.node(address);
    let leaf = self.leaf(address.node());
    let coords = sub_node_coords(address.sub_node()).as_ivec3();
    let max = LEAF_RESOLUTION as i32;

    for (direction, offset) in DIRECTION_OFFSETS.iter().enumerate() {
      let target = coords + *offset;
      if target.cmpge(IVec3::ZERO).all() && target.cmplt(IVec3::splat(max)).all() {
        let sub = sub_node_index(target.as_uvec3());
        if !leaf.is_occluded(sub) {
          out.push(address.with_sub_node(sub));
        }
        continue;
      }

      let neighbour = node.neighbours[direction];
      if !neighbour.is_valid() {
        continue;
      }
      if neighbour.layer() > 0 {
        out.push(neighbour);
        continue;
      }
      let neighbour_leaf = self.leaf(neighbour.node());
      if neighbour_leaf.is_completely_free() {
        out.push(neighbour);
      } else if !neighbour_leaf.is_completely_occluded() {
        // Wrap onto the opposite face of the neighbouring leaf
        let wrapped = target.rem_euclid(IVec3::splat(max)).as_uvec3();
        let sub = sub_node_index(wrapped);
        if !neighbour_leaf.is_occluded(sub) {
          out.push(neighbour.with_sub_node(sub));
        }
      }
    }
  }

  /// Push `neighbour`, or its cells touching the face seen from `direction`.
  fn push_face_cells(&self, neighbour: NodeAddress, direction: usize, out: &mut NeighbourList) {
    let mut pending: SmallVec<[NodeAddress; 16]> = SmallVec::new();
    pending.push(neighbour);

    while let Some(current) = pending.pop() {
      let node = self.node(current);
      if !node.has_children() {
        if self.contains_address(current) {
          out.push(current);
        }
        continue;
      }
      if current.layer() == 0 {
        let leaf = self.leaf(current.node());
        out.extend(
          touching_leaf_sub_nodes(direction)
            .filter(|&sub| !leaf.is_occluded(sub))
            .map(|sub| current.with_sub_node(sub)),
        );
        continue;
      }
      let first = node.first_child;
      for octant in touching_child_octants(direction) {
        pending.push(NodeAddress::new(first.layer(), first.node() + octant as u32, 0));
      }
    }
  }

  /// Every navigable leaf-resolution cell at or below `address`.
  pub fn free_cells_under(&self, address: NodeAddress, out: &mut Vec<NodeAddress>) {
    if !self.contains_address(address) {
      return;
    }
    let node = self.node(address);
    if !node.has_children() {
      out.push(address);
      return;
    }
    if address.layer() == 0 {
      out.extend(self.leaf(address.node()).free_sub_nodes().map(|sub| address.with_sub_node(sub)));
      return;
    }
    let first = node.first_child;
    for octant in 0..8u32 {
      self.free_cells_under(NodeAddress::new(first.layer(), first.node() + octant, 0), out);
    }
  }

  /// Uniformly random point inside a randomly chosen navigable cell.
  ///
  /// An empty volume samples its whole navigation bounds.
  pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec3> {
    if !self.is_valid() {
      return None;
    }
    let bounds = if self.is_empty() {
      self.nav_bounds()
    } else {
      let mut cells = Vec::new();
      self.free_cells_under(NodeAddress::new(self.top_layer(), 0, 0), &mut cells);
      if cells.is_empty() {
        return None;
      }
      let cell = cells[rng.random_range(0..cells.len())];
      self.node_bounds(cell)?
    };
    let t = Vec3::new(rng.random(), rng.random(), rng.random());
    Some(bounds.min + bounds.size() * t)
  }

  /// Morton code of the leaf cell containing `position`.
  pub fn leaf_code_at(&self, position: Vec3) -> Option<morton::MortonCode> {
    if !self.is_valid() || !self.nav_bounds().expand(BOUNDS_TOLERANCE).contains_point(position) {
      return None;
    }
    Some(self.code_at(0, position))
  }
}
