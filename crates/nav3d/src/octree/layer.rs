//! One resolution level of the octree.

use crate::address::NodeIndex;
use crate::morton::MortonCode;

use super::node::Node;

/// Nodes of one layer, strictly ascending by Morton code.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
  nodes: Vec<Node>,
  /// Cells per axis at this resolution.
  edge: u32,
  /// Edge length of one cell.
  node_size: f32,
}

impl Layer {
  pub fn new(edge: u32, node_size: f32) -> Self {
    Self {
      nodes: Vec::new(),
      edge,
      node_size,
    }
  }

  #[inline]
  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  #[inline]
  pub(crate) fn nodes_mut(&mut self) -> &mut Vec<Node> {
    &mut self.nodes
  }

  #[inline]
  pub fn node(&self, index: NodeIndex) -> Option<&Node> {
    self.nodes.get(index as usize)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Binary search for a node by Morton code.
  #[inline]
  pub fn find(&self, code: MortonCode) -> Option<NodeIndex> {
    self
      .nodes
      .binary_search_by_key(&code, |node| node.code)
      .ok()
      .map(|index| index as NodeIndex)
  }

  #[inline]
  pub fn edge(&self) -> u32 {
    self.edge
  }

  /// Cell count of a fully populated layer.
  ///
  /// `max_nodes = edge³`
  #[inline]
  pub fn max_nodes(&self) -> u64 {
    (self.edge as u64).pow(3)
  }

  #[inline]
  pub fn node_size(&self) -> f32 {
    self.node_size
  }

  /// Half the node edge length.
  #[inline]
  pub fn node_extent(&self) -> f32 {
    self.node_size * 0.5
  }

  /// Sorted-by-code invariant that binary search depends on.
  pub fn is_sorted(&self) -> bool {
    self.nodes.windows(2).all(|w| w[0].code < w[1].code)
  }
}
