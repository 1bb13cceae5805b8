//! Derive every layer, link and neighbour rope from a set of leaf masks.
//!
//! Shared by the full build and the incremental rebuild. No occlusion
//! queries happen here: a layer-1 cell is blocked when any of its leaves has
//! an occupied sub-voxel, and blocked codes propagate upward by parent code.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::warn;

use crate::address::{LayerIndex, NodeAddress};
use crate::morton::{self, MortonCode};
use crate::octree::{LeafNode, Node, OctreeVolume, DIRECTION_COUNT, DIRECTION_OFFSETS};

/// Leaf occupancy keyed by layer-0 Morton code.
pub(crate) type LeafMasks = BTreeMap<MortonCode, u64>;

/// Rebuild `volume`'s layers from `leaf_masks`.
///
/// Leaves whose layer-1 parent ends up unblocked are dropped; missing
/// siblings of blocked cells are materialized as free leaves. A layer that
/// outgrows the node field of [`NodeAddress`] invalidates the volume.
pub(crate) fn assemble(volume: &mut OctreeVolume, leaf_masks: &LeafMasks) {
  let count = volume.layer_count() as usize;
  debug_assert!(count >= 2);
  let top = count - 1;

  // blocked[l] = codes on layer l that have children
  let mut blocked: Vec<Vec<MortonCode>> = vec![Vec::new(); count];
  blocked[1] = leaf_masks
    .iter()
    .filter(|(_, mask)| **mask != 0)
    .map(|(code, _)| morton::parent(*code))
    .collect();
  blocked[1].dedup();
  for layer in 2..count {
    let mut parents: Vec<MortonCode> = blocked[layer - 1].iter().map(|&c| morton::parent(c)).collect();
    parents.dedup();
    blocked[layer] = parents;
  }

  let mut layer_nodes: Vec<Vec<Node>> = vec![Vec::new(); count];
  if blocked[1].is_empty() {
    volume.set_contents(layer_nodes, Vec::new());
    return;
  }

  layer_nodes[top] = vec![Node::new(0)];
  for layer in (0..top).rev() {
    layer_nodes[layer] = blocked[layer + 1]
      .iter()
      .flat_map(|&code| (0..8u8).map(move |octant| Node::new(morton::child(code, octant))))
      .collect();
  }

  // Parent and first-child links
  for layer in 1..count {
    let (lower, upper) = layer_nodes.split_at_mut(layer);
    let children = &mut lower[layer - 1];
    let parents = &mut upper[0];
    for (index, node) in parents.iter_mut().enumerate() {
      if blocked[layer].binary_search(&node.code).is_err() {
        continue;
      }
      let Ok(first) = children.binary_search_by_key(&morton::first_child(node.code), |n| n.code) else {
        continue;
      };
      node.first_child = NodeAddress::new((layer - 1) as LayerIndex, first as u32, 0);
      let parent = NodeAddress::new(layer as LayerIndex, index as u32, 0);
      for child in &mut children[first..first + 8] {
        child.parent = parent;
      }
    }
  }

  let mut leaves = Vec::with_capacity(layer_nodes[0].len());
  for (index, node) in layer_nodes[0].iter_mut().enumerate() {
    let occupancy = leaf_masks.get(&node.code).copied().unwrap_or(0);
    if occupancy != 0 {
      node.first_child = NodeAddress::new(0, index as u32, 0);
    }
    leaves.push(LeafNode {
      occupancy,
      parent: node.parent,
    });
  }

  volume.set_contents(layer_nodes, leaves);
  if !volume.fits_address_space() {
    warn!(nodes = volume.node_count(), "octree exceeds the address space");
    volume.mark_invalid();
    return;
  }
  build_neighbour_links(volume);
}

/// Fill the six face ropes of every node, coarsest layer first.
pub(crate) fn build_neighbour_links(volume: &mut OctreeVolume) {
  for layer in (0..volume.layer_count() as LayerIndex).rev() {
    let len = volume.layer(layer).map_or(0, |l| l.len());
    let links: Vec<[NodeAddress; DIRECTION_COUNT]> = {
      let view = &*volume;
      (0..len)
        .into_par_iter()
        .map(|index| {
          let mut neighbours = [NodeAddress::INVALID; DIRECTION_COUNT];
          for (direction, slot) in neighbours.iter_mut().enumerate() {
            *slot = find_neighbour(view, layer, index as u32, direction);
          }
          neighbours
        })
        .collect()
    };
    if let Some(target) = volume.layers_mut().get_mut(layer as usize) {
      for (node, neighbours) in target.nodes_mut().iter_mut().zip(links) {
        node.neighbours = neighbours;
      }
    }
  }
}

/// Same-layer face neighbour, or the closest existing ancestor-level cell
/// covering it. Invalid at the volume boundary or next to a solid leaf.
pub(crate) fn find_neighbour(volume: &OctreeVolume, layer: LayerIndex, index: u32, direction: usize) -> NodeAddress {
  let mut layer = layer;
  let mut index = index;
  loop {
    let Some(current) = volume.layer(layer) else {
      return NodeAddress::INVALID;
    };
    let Some(node) = current.node(index) else {
      return NodeAddress::INVALID;
    };
    let coords = morton::decode(node.code).as_ivec3() + DIRECTION_OFFSETS[direction];
    let Some(code) = morton::encode_checked(coords, current.edge()) else {
      return NodeAddress::INVALID;
    };
    if let Some(found) = current.find(code) {
      if layer == 0 && volume.leaf(found).is_completely_occluded() {
        return NodeAddress::INVALID;
      }
      return NodeAddress::new(layer, found, 0);
    }
    // Neighbour lies outside our parent and is not subdivided this deep
    if !node.parent.is_valid() {
      return NodeAddress::INVALID;
    }
    layer = node.parent.layer();
    index = node.parent.node();
  }
}
