//! Versioned, size-prefixed binary form of an [`OctreeVolume`].
//!
//! ```text
//! u32  total byte size (including this prefix)
//! u32  version
//! f32×6 source bounds (min, max)
//! f32×6 navigation bounds (min, max)
//! u8   layer count
//! per layer:  u32 node count, nodes { u64 code, u32 parent, u32 first child, u32×6 neighbours }
//! u32  leaf count, leaves { u64 occupancy, u32 parent }
//! ```
//!
//! All values are little-endian. Validity is not stored; a loaded volume is
//! valid when it has at least one layer. Decoded layers are checked before
//! use: codes must fit their layer, links must point at stored nodes and
//! there is one leaf per layer-0 node.

use glam::Vec3;

use crate::address::{NodeAddress, MAX_NODE_INDEX};
use crate::bounds::Aabb;
use crate::error::SerializeError;

use super::node::{LeafNode, Node, DIRECTION_COUNT};
use super::volume::{OctreeVolume, MAX_LAYER_COUNT};

/// Format revisions understood by [`from_bytes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum SerializationVersion {
  Initial = 1,
}

impl SerializationVersion {
  pub const LATEST: Self = Self::Initial;

  fn from_u32(value: u32) -> Option<Self> {
    match value {
      1 => Some(Self::Initial),
      _ => None,
    }
  }
}

/// Encode a volume into a standalone byte block.
pub fn to_bytes(volume: &OctreeVolume) -> Vec<u8> {
  let mut out = Vec::with_capacity(64 + volume.node_count() * 44 + volume.leaves().len() * 12);
  out.extend_from_slice(&0u32.to_le_bytes());
  out.extend_from_slice(&(SerializationVersion::LATEST as u32).to_le_bytes());
  write_bounds(&mut out, volume.source_bounds());
  write_bounds(&mut out, volume.nav_bounds());

  let layer_count = if volume.is_valid() { volume.layer_count() } else { 0 };
  out.push(layer_count as u8);
  for layer in volume.layers().iter().take(layer_count as usize) {
    out.extend_from_slice(&(layer.len() as u32).to_le_bytes());
    for node in layer.nodes() {
      out.extend_from_slice(&node.code.to_le_bytes());
      out.extend_from_slice(&node.parent.raw().to_le_bytes());
      out.extend_from_slice(&node.first_child.raw().to_le_bytes());
      for neighbour in &node.neighbours {
        out.extend_from_slice(&neighbour.raw().to_le_bytes());
      }
    }
  }

  let leaves = if layer_count > 0 { volume.leaves() } else { &[] };
  out.extend_from_slice(&(leaves.len() as u32).to_le_bytes());
  for leaf in leaves {
    out.extend_from_slice(&leaf.occupancy.to_le_bytes());
    out.extend_from_slice(&leaf.parent.raw().to_le_bytes());
  }

  let total = out.len() as u32;
  out[..4].copy_from_slice(&total.to_le_bytes());
  out
}

/// Decode a block written by [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Result<OctreeVolume, SerializeError> {
  let mut reader = Reader { bytes, offset: 0 };
  let declared = reader.u32()? as usize;
  if declared != bytes.len() {
    return Err(SerializeError::SizeMismatch {
      declared,
      actual: bytes.len(),
    });
  }
  let version = reader.u32()?;
  SerializationVersion::from_u32(version).ok_or(SerializeError::UnsupportedVersion(version))?;

  let source_bounds = reader.bounds()?;
  let nav_bounds = reader.bounds()?;
  let layer_count = reader.u8()?;
  if layer_count as u32 > MAX_LAYER_COUNT {
    return Err(SerializeError::TooManyLayers(layer_count));
  }

  let mut layers = Vec::with_capacity(layer_count as usize);
  for _ in 0..layer_count {
    let count = reader.u32()? as usize;
    let mut nodes = Vec::with_capacity(count.min(bytes.len() / 44));
    for _ in 0..count {
      let mut node = Node::new(reader.u64()?);
      node.parent = NodeAddress::from_raw(reader.u32()?);
      node.first_child = NodeAddress::from_raw(reader.u32()?);
      for direction in 0..DIRECTION_COUNT {
        node.neighbours[direction] = NodeAddress::from_raw(reader.u32()?);
      }
      nodes.push(node);
    }
    layers.push(nodes);
  }

  let leaf_count = reader.u32()? as usize;
  let mut leaves = Vec::with_capacity(leaf_count.min(bytes.len() / 12));
  for _ in 0..leaf_count {
    let mut leaf = LeafNode::new(reader.u64()?);
    leaf.parent = NodeAddress::from_raw(reader.u32()?);
    leaves.push(leaf);
  }

  validate(nav_bounds, &layers, &leaves)?;
  Ok(OctreeVolume::from_parts(source_bounds, nav_bounds, layers, leaves))
}

/// Reject decoded data that would index outside the stored arrays.
fn validate(nav_bounds: Aabb, layers: &[Vec<Node>], leaves: &[LeafNode]) -> Result<(), SerializeError> {
  let count = layers.len();
  if count == 0 {
    if !leaves.is_empty() {
      return Err(SerializeError::LeafCountMismatch {
        leaves: leaves.len(),
        nodes: 0,
      });
    }
    return Ok(());
  }

  let size = nav_bounds.size();
  let is_cube = size.is_finite()
    && size.x > 0.0
    && (size.x - size.y).abs() <= size.x * 1e-4
    && (size.x - size.z).abs() <= size.x * 1e-4;
  if count < 2 || !is_cube || layers[count - 1].len() > 1 {
    return Err(SerializeError::InvalidGeometry { layers: count as u8 });
  }
  if leaves.len() != layers[0].len() {
    return Err(SerializeError::LeafCountMismatch {
      leaves: leaves.len(),
      nodes: layers[0].len(),
    });
  }

  let lens: Vec<usize> = layers.iter().map(Vec::len).collect();
  for (layer, nodes) in layers.iter().enumerate() {
    if nodes.len() > MAX_NODE_INDEX as usize + 1 {
      return Err(SerializeError::TooManyNodes {
        layer: layer as u8,
        count: nodes.len(),
      });
    }
    let edge = 1u64 << (count - 1 - layer);
    let code_limit = edge * edge * edge;
    for (index, node) in nodes.iter().enumerate() {
      let sorted = index == 0 || nodes[index - 1].code < node.code;
      let linked = link_in_range(node.parent, &lens)
        && node.neighbours.iter().all(|&n| link_in_range(n, &lens))
        && child_in_range(layer, index, node.first_child, &lens);
      if node.code >= code_limit || !sorted || !linked {
        return Err(SerializeError::InvalidNode {
          layer: layer as u8,
          index,
        });
      }
    }
  }
  if let Some(index) = leaves.iter().position(|leaf| !link_in_range(leaf.parent, &lens)) {
    return Err(SerializeError::InvalidNode { layer: 0, index });
  }
  Ok(())
}

fn link_in_range(address: NodeAddress, lens: &[usize]) -> bool {
  !address.is_valid()
    || (address.sub_node() == 0 && lens.get(address.layer() as usize).is_some_and(|&len| (address.node() as usize) < len))
}

/// Leaves point at their own occupancy; interior nodes at 8 stored children.
fn child_in_range(layer: usize, index: usize, child: NodeAddress, lens: &[usize]) -> bool {
  if !child.is_valid() {
    return true;
  }
  if child.sub_node() != 0 {
    return false;
  }
  if layer == 0 {
    return child.layer() == 0 && child.node() as usize == index;
  }
  child.layer() as usize == layer - 1 && child.node() as usize + 8 <= lens[layer - 1]
}

fn write_bounds(out: &mut Vec<u8>, bounds: Aabb) {
  for v in bounds.min.to_array().into_iter().chain(bounds.max.to_array()) {
    out.extend_from_slice(&v.to_le_bytes());
  }
}

struct Reader<'a> {
  bytes: &'a [u8],
  offset: usize,
}

impl<'a> Reader<'a> {
  fn take<const N: usize>(&mut self) -> Result<[u8; N], SerializeError> {
    let end = self.offset + N;
    let slice = self.bytes.get(self.offset..end).ok_or(SerializeError::Truncated {
      offset: self.offset,
      needed: N,
    })?;
    self.offset = end;
    let mut buf = [0u8; N];
    buf.copy_from_slice(slice);
    Ok(buf)
  }

  fn u8(&mut self) -> Result<u8, SerializeError> {
    Ok(self.take::<1>()?[0])
  }

  fn u32(&mut self) -> Result<u32, SerializeError> {
    self.take().map(u32::from_le_bytes)
  }

  fn u64(&mut self) -> Result<u64, SerializeError> {
    self.take().map(u64::from_le_bytes)
  }

  fn f32(&mut self) -> Result<f32, SerializeError> {
    self.take().map(f32::from_le_bytes)
  }

  fn vec3(&mut self) -> Result<Vec3, SerializeError> {
    Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
  }

  fn bounds(&mut self) -> Result<Aabb, SerializeError> {
    let min = self.vec3()?;
    let max = self.vec3()?;
    Ok(Aabb { min, max })
  }
}
