//! The layered sparse voxel octree of one partition.

use glam::{UVec3, Vec3};

use crate::address::{LayerIndex, NodeAddress, NodeIndex, MAX_NODE_INDEX};
use crate::bounds::Aabb;
use crate::error::BuildError;
use crate::morton::{self, MortonCode};

use super::layer::Layer;
use super::node::{sub_node_coords, LeafNode, Node, LEAF_RESOLUTION};

/// Deepest octree supported: 10 coordinate bits per axis on the leaf layer.
pub const MAX_LAYER_COUNT: u32 = 11;

/// Navigation data of one partition.
///
/// Layer 0 holds one [`Node`] per materialized leaf, and `leaves[i]` is the
/// occupancy of `layers[0].nodes()[i]`. Space without a node above layer 0
/// is free.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeVolume {
  source_bounds: Aabb,
  nav_bounds: Aabb,
  layers: Vec<Layer>,
  leaves: Vec<LeafNode>,
  valid: bool,
}

impl OctreeVolume {
  /// Lay out an empty octree covering `source_bounds`.
  ///
  /// The navigation bounds are the smallest cube of `leaf_size * 2^n` that
  /// covers the source bounds, centred on them.
  pub fn with_geometry(source_bounds: Aabb, voxel_extent: f32) -> Result<Self, BuildError> {
    if !(voxel_extent > 0.0) {
      return Err(BuildError::InvalidVoxelExtent(voxel_extent));
    }
    let leaf_size = voxel_extent * LEAF_RESOLUTION as f32;
    let volume_size = source_bounds.size().max_element();
    let ratio = volume_size / leaf_size;
    let exponent = if ratio <= 1.0 {
      0
    } else {
      (ratio.log2() - 1e-5).ceil().max(0.0) as u32
    };
    let layer_count = exponent + 1;
    if layer_count < 2 {
      return Err(BuildError::TooFewLayers {
        size: volume_size,
        leaf_size,
        layers: layer_count,
      });
    }
    if layer_count > MAX_LAYER_COUNT {
      return Err(BuildError::TooManyLayers {
        layers: layer_count,
        max: MAX_LAYER_COUNT,
      });
    }

    let nav_size = leaf_size * (1u32 << exponent) as f32;
    let nav_bounds = Aabb::from_center_half_extents(source_bounds.center(), Vec3::splat(nav_size * 0.5));
    let layers = (0..layer_count)
      .map(|layer| {
        let edge = 1u32 << (exponent - layer);
        Layer::new(edge, nav_size / edge as f32)
      })
      .collect();

    Ok(Self {
      source_bounds,
      nav_bounds,
      layers,
      leaves: Vec::new(),
      valid: true,
    })
  }

  /// A volume that failed to build. Every query against it misses.
  pub fn invalid(source_bounds: Aabb) -> Self {
    Self {
      source_bounds,
      nav_bounds: source_bounds,
      layers: Vec::new(),
      leaves: Vec::new(),
      valid: false,
    }
  }

  /// Reassemble a volume from stored parts. Validity is derived from the
  /// layer count.
  pub(crate) fn from_parts(source_bounds: Aabb, nav_bounds: Aabb, layer_nodes: Vec<Vec<Node>>, leaves: Vec<LeafNode>) -> Self {
    let layer_count = layer_nodes.len() as u32;
    let nav_size = nav_bounds.size().x;
    let layers = layer_nodes
      .into_iter()
      .enumerate()
      .map(|(layer, nodes)| {
        let edge = 1u32 << (layer_count - 1 - layer as u32);
        let mut l = Layer::new(edge, nav_size / edge as f32);
        *l.nodes_mut() = nodes;
        l
      })
      .collect();
    Self {
      source_bounds,
      nav_bounds,
      layers,
      leaves,
      valid: layer_count > 0,
    }
  }

  pub(crate) fn set_contents(&mut self, layer_nodes: Vec<Vec<Node>>, leaves: Vec<LeafNode>) {
    debug_assert_eq!(layer_nodes.len(), self.layers.len());
    for (layer, nodes) in self.layers.iter_mut().zip(layer_nodes) {
      *layer.nodes_mut() = nodes;
    }
    self.leaves = leaves;
  }

  pub(crate) fn clear_contents(&mut self) {
    for layer in &mut self.layers {
      layer.nodes_mut().clear();
    }
    self.leaves.clear();
  }

  pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
    &mut self.layers
  }

  pub(crate) fn mark_invalid(&mut self) {
    self.clear_contents();
    self.valid = false;
  }

  // ---------------------------------------------------------------------------
  // Accessors
  // ---------------------------------------------------------------------------

  #[inline]
  pub fn is_valid(&self) -> bool {
    self.valid && !self.layers.is_empty()
  }

  /// No layer holds a node. Check [`Self::is_valid`] first.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.layers.iter().all(Layer::is_empty)
  }

  #[inline]
  pub fn source_bounds(&self) -> Aabb {
    self.source_bounds
  }

  #[inline]
  pub fn nav_bounds(&self) -> Aabb {
    self.nav_bounds
  }

  #[inline]
  pub fn layer_count(&self) -> u32 {
    self.layers.len() as u32
  }

  /// Index of the coarsest layer.
  #[inline]
  pub fn top_layer(&self) -> LayerIndex {
    self.layers.len().saturating_sub(1) as LayerIndex
  }

  #[inline]
  pub fn layers(&self) -> &[Layer] {
    &self.layers
  }

  #[inline]
  pub fn layer(&self, layer: LayerIndex) -> Option<&Layer> {
    self.layers.get(layer as usize)
  }

  #[inline]
  pub fn leaves(&self) -> &[LeafNode] {
    &self.leaves
  }

  /// Leaf occupancy, or an empty sentinel when out of range.
  #[inline]
  pub fn leaf(&self, index: NodeIndex) -> &LeafNode {
    self.leaves.get(index as usize).unwrap_or(&LeafNode::EMPTY)
  }

  /// Node at an address, or [`Node::INVALID`] when it does not resolve.
  #[inline]
  pub fn node(&self, address: NodeAddress) -> &Node {
    if !address.is_valid() {
      return &Node::INVALID;
    }
    self
      .layer(address.layer())
      .and_then(|layer| layer.node(address.node()))
      .unwrap_or(&Node::INVALID)
  }

  /// Whether the address points at an existing node.
  #[inline]
  pub fn contains_address(&self, address: NodeAddress) -> bool {
    address.is_valid()
      && self
        .layer(address.layer())
        .is_some_and(|layer| (address.node() as usize) < layer.len())
  }

  /// Total node count across all layers.
  pub fn node_count(&self) -> usize {
    self.layers.iter().map(Layer::len).sum()
  }

  // ---------------------------------------------------------------------------
  // Geometry
  // ---------------------------------------------------------------------------

  /// Edge length of a layer-0 leaf.
  #[inline]
  pub fn leaf_size(&self) -> f32 {
    self.node_size(0)
  }

  /// Edge length of one leaf sub-voxel.
  #[inline]
  pub fn sub_voxel_size(&self) -> f32 {
    self.leaf_size() / LEAF_RESOLUTION as f32
  }

  #[inline]
  pub fn node_size(&self, layer: LayerIndex) -> f32 {
    self.layer(layer).map_or(0.0, Layer::node_size)
  }

  /// Half the node edge length of a layer.
  #[inline]
  pub fn layer_extent(&self, layer: LayerIndex) -> f32 {
    self.node_size(layer) * 0.5
  }

  /// `layer / layer_count`, used to scale per-layer visual or cost tweaks.
  pub fn layer_ratio(&self, layer: LayerIndex) -> f32 {
    if self.layers.is_empty() {
      return 0.0;
    }
    layer as f32 / self.layers.len() as f32
  }

  /// Finest layer whose cells fit an agent of the given radius.
  pub fn min_layer_for_agent_radius(&self, agent_radius: f32) -> LayerIndex {
    if !self.is_valid() {
      return 0;
    }
    let diameter = agent_radius * 2.0;
    self
      .layers
      .iter()
      .position(|layer| layer.node_size() >= diameter)
      .map_or(self.top_layer(), |layer| layer as LayerIndex)
  }

  /// Centre of the cell with `code` on `layer`.
  pub fn position_from_code(&self, layer: LayerIndex, code: MortonCode) -> Vec3 {
    let size = self.node_size(layer);
    let coords = morton::decode(code).as_vec3();
    self.nav_bounds.min + coords * size + Vec3::splat(size * 0.5)
  }

  /// Cell coordinates containing `position` on `layer`, clamped to the grid.
  pub fn cell_coords(&self, layer: LayerIndex, position: Vec3) -> UVec3 {
    let Some(l) = self.layer(layer) else {
      return UVec3::ZERO;
    };
    let local = (position - self.nav_bounds.min) / l.node_size();
    let max = (l.edge() - 1) as f32;
    local.floor().clamp(Vec3::ZERO, Vec3::splat(max)).as_uvec3()
  }

  /// Morton code of the cell containing `position` on `layer`.
  #[inline]
  pub fn code_at(&self, layer: LayerIndex, position: Vec3) -> MortonCode {
    morton::encode(self.cell_coords(layer, position))
  }

  /// Code of the ancestor of `code` (on `from`) that lives on layer `to`.
  #[inline]
  pub fn parent_code_at_layer(code: MortonCode, from: LayerIndex, to: LayerIndex) -> MortonCode {
    debug_assert!(to >= from);
    morton::ancestor(code, (to - from) as u32)
  }

  /// Address of the node with `code` on `layer`, invalid when absent.
  pub fn address_from_morton_code(&self, layer: LayerIndex, code: MortonCode) -> NodeAddress {
    self
      .layer(layer)
      .and_then(|l| l.find(code))
      .map_or(NodeAddress::INVALID, |index| NodeAddress::new(layer, index, 0))
  }

  /// Whether the address refers to a sub-voxel rather than a whole leaf.
  #[inline]
  pub fn is_sub_voxel_address(&self, address: NodeAddress) -> bool {
    address.layer() == 0 && self.node(address).has_children()
  }

  /// World-space centre of the cell an address names.
  ///
  /// On layer 0 a partially occluded leaf is addressed per sub-voxel, a free
  /// leaf as a whole. The synthetic top address of an empty volume resolves
  /// to the volume centre.
  pub fn node_position(&self, address: NodeAddress) -> Option<Vec3> {
    if !address.is_valid() || !self.is_valid() {
      return None;
    }
    if self.is_empty() && address.layer() == self.top_layer() {
      return Some(self.nav_bounds.center());
    }
    let node = self.layer(address.layer())?.node(address.node())?;
    let center = self.position_from_code(address.layer(), node.code);
    if address.layer() == 0 && node.has_children() {
      Some(self.sub_voxel_position(center, address.sub_node()))
    } else {
      Some(center)
    }
  }

  /// Centre of a sub-voxel given its leaf centre.
  #[inline]
  pub fn sub_voxel_position(&self, leaf_center: Vec3, sub: u8) -> Vec3 {
    let sub_size = self.sub_voxel_size();
    let leaf_min = leaf_center - Vec3::splat(self.leaf_size() * 0.5);
    leaf_min + sub_node_coords(sub).as_vec3() * sub_size + Vec3::splat(sub_size * 0.5)
  }

  /// Half edge length of the cell an address names.
  pub fn node_extent(&self, address: NodeAddress) -> f32 {
    if self.is_sub_voxel_address(address) {
      self.sub_voxel_size() * 0.5
    } else {
      self.layer_extent(address.layer())
    }
  }

  /// World-space box of the cell an address names.
  pub fn node_bounds(&self, address: NodeAddress) -> Option<Aabb> {
    let center = self.node_position(address)?;
    if self.is_empty() {
      return Some(self.nav_bounds);
    }
    Some(Aabb::from_center_half_extents(center, Vec3::splat(self.node_extent(address))))
  }

  /// Centre of the layer-0 node at `index`.
  pub fn leaf_position(&self, index: NodeIndex) -> Option<Vec3> {
    let node = self.layer(0)?.node(index)?;
    Some(self.position_from_code(0, node.code))
  }

  /// Whether an address names a cell agents may occupy.
  pub fn is_navigable(&self, address: NodeAddress) -> bool {
    if !address.is_valid() || !self.is_valid() {
      return false;
    }
    if self.is_empty() {
      return address.layer() == self.top_layer() && address.node() == 0;
    }
    if !self.contains_address(address) {
      return false;
    }
    let node = self.node(address);
    if address.layer() > 0 {
      return !node.has_children();
    }
    let leaf = self.leaf(address.node());
    if leaf.is_completely_free() {
      true
    } else {
      !leaf.is_occluded(address.sub_node())
    }
  }

  /// Every layer's node count fits the 22-bit node field of an address.
  pub(crate) fn fits_address_space(&self) -> bool {
    self.layers.iter().all(|layer| layer.len() <= MAX_NODE_INDEX as usize + 1)
  }
}
