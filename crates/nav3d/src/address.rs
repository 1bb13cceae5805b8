//! Bit-packed octree cell addresses.
//!
//! ```text
//! bit  31      28 27                       6 5        0
//!      [ layer  ][        node index        ][  sub    ]
//!        4 bits           22 bits              6 bits
//! ```
//!
//! Layer 15 is reserved as the invalid sentinel. The sub-node field is only
//! meaningful on layer 0, where it selects one of the 64 sub-voxels of a leaf.

use std::fmt;

/// Octree layer index (0 = leaves).
pub type LayerIndex = u8;
/// Index into a layer's node array.
pub type NodeIndex = u32;
/// Index of a sub-voxel inside a leaf (0..64).
pub type SubNodeIndex = u8;

const LAYER_BITS: u32 = 4;
const NODE_BITS: u32 = 22;
const SUB_BITS: u32 = 6;

const SUB_SHIFT: u32 = 0;
const NODE_SHIFT: u32 = SUB_BITS;
const LAYER_SHIFT: u32 = SUB_BITS + NODE_BITS;

const LAYER_MASK: u32 = (1 << LAYER_BITS) - 1;
const NODE_MASK: u32 = (1 << NODE_BITS) - 1;
const SUB_MASK: u32 = (1 << SUB_BITS) - 1;

/// Layer value marking an address as invalid.
pub const INVALID_LAYER: LayerIndex = 15;

/// Largest node index representable in an address.
pub const MAX_NODE_INDEX: NodeIndex = NODE_MASK;

/// Pack a `(layer, node, sub)` triple into a single integer.
///
/// Out-of-range components are masked, so callers must validate first.
#[inline]
pub const fn encode_address(layer: LayerIndex, node: NodeIndex, sub: SubNodeIndex) -> u32 {
  ((layer as u32 & LAYER_MASK) << LAYER_SHIFT)
    | ((node & NODE_MASK) << NODE_SHIFT)
    | ((sub as u32 & SUB_MASK) << SUB_SHIFT)
}

/// Unpack an integer produced by [`encode_address`].
#[inline]
pub const fn decode_address(raw: u32) -> (LayerIndex, NodeIndex, SubNodeIndex) {
  (
    ((raw >> LAYER_SHIFT) & LAYER_MASK) as LayerIndex,
    (raw >> NODE_SHIFT) & NODE_MASK,
    ((raw >> SUB_SHIFT) & SUB_MASK) as SubNodeIndex,
  )
}

/// Address of one octree cell (or one leaf sub-voxel on layer 0).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress(u32);

impl NodeAddress {
  /// The invalid sentinel.
  pub const INVALID: Self = Self(encode_address(INVALID_LAYER, 0, 0));

  /// Create an address from its components.
  #[inline]
  pub fn new(layer: LayerIndex, node: NodeIndex, sub: SubNodeIndex) -> Self {
    debug_assert!(layer < INVALID_LAYER, "layer {layer} is reserved");
    debug_assert!(node <= MAX_NODE_INDEX, "node index {node} overflows 22 bits");
    debug_assert!(sub < 64, "sub-node index {sub} out of range");
    Self(encode_address(layer, node, sub))
  }

  /// Reinterpret a packed integer as an address.
  #[inline]
  pub const fn from_raw(raw: u32) -> Self {
    Self(raw)
  }

  /// The packed integer form.
  #[inline]
  pub const fn raw(self) -> u32 {
    self.0
  }

  #[inline]
  pub const fn layer(self) -> LayerIndex {
    decode_address(self.0).0
  }

  #[inline]
  pub const fn node(self) -> NodeIndex {
    decode_address(self.0).1
  }

  #[inline]
  pub const fn sub_node(self) -> SubNodeIndex {
    decode_address(self.0).2
  }

  #[inline]
  pub const fn is_valid(self) -> bool {
    self.layer() != INVALID_LAYER
  }

  /// Same cell with a different sub-node.
  #[inline]
  pub fn with_sub_node(self, sub: SubNodeIndex) -> Self {
    Self::new(self.layer(), self.node(), sub)
  }
}

impl Default for NodeAddress {
  fn default() -> Self {
    Self::INVALID
  }
}

impl fmt::Debug for NodeAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_valid() {
      write!(f, "NodeAddress({}:{}:{})", self.layer(), self.node(), self.sub_node())
    } else {
      f.write_str("NodeAddress(invalid)")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_round_trip() {
    for &(layer, node, sub) in &[
      (0u8, 0u32, 0u8),
      (0, 1, 63),
      (3, 12345, 17),
      (14, MAX_NODE_INDEX, 63),
      (7, 4_000_000, 0),
    ] {
      let raw = encode_address(layer, node, sub);
      assert_eq!(decode_address(raw), (layer, node, sub));

      let address = NodeAddress::new(layer, node, sub);
      assert_eq!(address.layer(), layer);
      assert_eq!(address.node(), node);
      assert_eq!(address.sub_node(), sub);
      assert!(address.is_valid());
    }
  }

  #[test]
  fn test_bit_layout() {
    assert_eq!(encode_address(1, 0, 0), 1 << 28);
    assert_eq!(encode_address(0, 1, 0), 1 << 6);
    assert_eq!(encode_address(0, 0, 1), 1);
  }

  #[test]
  fn test_invalid_sentinel() {
    assert!(!NodeAddress::INVALID.is_valid());
    assert_eq!(NodeAddress::INVALID.layer(), INVALID_LAYER);
    assert_eq!(NodeAddress::INVALID.raw(), 0xF000_0000);
    assert_eq!(NodeAddress::default(), NodeAddress::INVALID);
    // Any node/sub payload on the sentinel layer is still invalid
    assert!(!NodeAddress::from_raw(encode_address(INVALID_LAYER, 42, 5)).is_valid());
  }

  #[test]
  fn test_with_sub_node() {
    let address = NodeAddress::new(0, 99, 0).with_sub_node(21);
    assert_eq!(address.node(), 99);
    assert_eq!(address.sub_node(), 21);
  }
}
