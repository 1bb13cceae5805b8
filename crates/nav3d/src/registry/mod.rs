//! Navigation volumes, their partitions and the partition-adjacency graph.
//!
//! A volume is a region of the world split into axis-aligned partitions;
//! each partition owns at most one [`OctreeVolume`]. Everything is keyed by
//! small integer ids so routes can be expressed without references into the
//! registry.

mod adjacency;

use std::collections::{BTreeMap, HashMap, VecDeque};

use glam::{UVec3, Vec3};

use crate::bounds::Aabb;
use crate::morton::MortonCode;
use crate::octree::OctreeVolume;

pub use adjacency::build_adjacency;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(pub u32);

/// Pair of layer-0 cells facing each other across a shared partition face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactPortal {
  /// Leaf code in the owning partition's octree.
  pub local: MortonCode,
  /// Leaf code in the neighbour's octree.
  pub remote: MortonCode,
}

/// Directed link from one partition to a touching one.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionAdjacency {
  pub neighbour: PartitionId,
  /// Unit normal of the shared face, pointing towards the neighbour.
  pub shared_face_normal: Vec3,
  /// Passable cell pairs, closest to the face centre first.
  pub portals: Vec<CompactPortal>,
  pub weight: f32,
}

#[derive(Clone, Debug)]
pub struct Partition {
  pub id: PartitionId,
  pub volume: VolumeId,
  pub bounds: Aabb,
  pub octree: Option<OctreeVolume>,
  pub adjacency: Vec<PartitionAdjacency>,
}

impl Partition {
  pub fn adjacency_to(&self, neighbour: PartitionId) -> Option<&PartitionAdjacency> {
    self.adjacency.iter().find(|a| a.neighbour == neighbour)
  }
}

#[derive(Clone, Debug)]
pub struct NavVolume {
  pub id: VolumeId,
  pub bounds: Aabb,
  pub partitions: Vec<PartitionId>,
}

/// Owner of every loaded volume and partition.
#[derive(Clone, Debug, Default)]
pub struct NavRegistry {
  volumes: BTreeMap<VolumeId, NavVolume>,
  partitions: BTreeMap<PartitionId, Partition>,
  next_volume: u32,
  next_partition: u32,
}

impl NavRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_volume(&mut self, bounds: Aabb) -> VolumeId {
    let id = VolumeId(self.next_volume);
    self.next_volume += 1;
    self.volumes.insert(
      id,
      NavVolume {
        id,
        bounds,
        partitions: Vec::new(),
      },
    );
    id
  }

  /// Register a partition inside `volume`. `None` if the volume is unknown.
  pub fn add_partition(&mut self, volume: VolumeId, bounds: Aabb) -> Option<PartitionId> {
    let owner = self.volumes.get_mut(&volume)?;
    let id = PartitionId(self.next_partition);
    self.next_partition += 1;
    owner.partitions.push(id);
    self.partitions.insert(
      id,
      Partition {
        id,
        volume,
        bounds,
        octree: None,
        adjacency: Vec::new(),
      },
    );
    Some(id)
  }

  /// Split a volume into a regular grid of partitions.
  pub fn split_volume(&mut self, volume: VolumeId, divisions: UVec3) -> Vec<PartitionId> {
    let Some(bounds) = self.volumes.get(&volume).map(|v| v.bounds) else {
      return Vec::new();
    };
    let divisions = divisions.max(UVec3::ONE);
    let step = bounds.size() / divisions.as_vec3();
    let mut ids = Vec::with_capacity((divisions.x * divisions.y * divisions.z) as usize);
    for z in 0..divisions.z {
      for y in 0..divisions.y {
        for x in 0..divisions.x {
          let min = bounds.min + step * UVec3::new(x, y, z).as_vec3();
          if let Some(id) = self.add_partition(volume, Aabb::new(min, min + step)) {
            ids.push(id);
          }
        }
      }
    }
    ids
  }

  /// Drop a partition and every adjacency pointing at it.
  pub fn remove_partition(&mut self, id: PartitionId) -> Option<Partition> {
    let removed = self.partitions.remove(&id)?;
    if let Some(volume) = self.volumes.get_mut(&removed.volume) {
      volume.partitions.retain(|p| *p != id);
    }
    for partition in self.partitions.values_mut() {
      partition.adjacency.retain(|a| a.neighbour != id);
    }
    Some(removed)
  }

  /// Attach a built octree. Returns false for an unknown partition.
  pub fn set_octree(&mut self, id: PartitionId, octree: OctreeVolume) -> bool {
    match self.partitions.get_mut(&id) {
      Some(partition) => {
        partition.octree = Some(octree);
        true
      }
      None => false,
    }
  }

  pub fn volume(&self, id: VolumeId) -> Option<&NavVolume> {
    self.volumes.get(&id)
  }

  pub fn volumes(&self) -> impl Iterator<Item = &NavVolume> {
    self.volumes.values()
  }

  pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
    self.partitions.get(&id)
  }

  pub fn partition_mut(&mut self, id: PartitionId) -> Option<&mut Partition> {
    self.partitions.get_mut(&id)
  }

  pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
    self.partitions.values()
  }

  pub fn partition_count(&self) -> usize {
    self.partitions.len()
  }

  /// Octree of a partition, if built.
  pub fn octree(&self, id: PartitionId) -> Option<&OctreeVolume> {
    self.partitions.get(&id).and_then(|p| p.octree.as_ref())
  }

  /// Lowest-id partition whose bounds contain `point`.
  pub fn partition_at(&self, point: Vec3) -> Option<PartitionId> {
    self
      .partitions
      .values()
      .find(|p| p.bounds.contains_point(point))
      .map(|p| p.id)
  }

  /// Lowest-id volume whose bounds contain `point`.
  pub fn volume_at(&self, point: Vec3) -> Option<VolumeId> {
    self
      .volumes
      .values()
      .find(|v| v.bounds.contains_point(point))
      .map(|v| v.id)
  }

  /// Fewest-hops partition chain from `from` to `to`, both included.
  pub fn adjacency_path(&self, from: PartitionId, to: PartitionId) -> Option<Vec<PartitionId>> {
    if !self.partitions.contains_key(&from) || !self.partitions.contains_key(&to) {
      return None;
    }
    if from == to {
      return Some(vec![from]);
    }
    let mut came_from: HashMap<PartitionId, PartitionId> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
      let Some(partition) = self.partitions.get(&current) else {
        continue;
      };
      for link in &partition.adjacency {
        let next = link.neighbour;
        if next == from || came_from.contains_key(&next) {
          continue;
        }
        came_from.insert(next, current);
        if next == to {
          let mut chain = vec![to];
          let mut cursor = to;
          while let Some(&previous) = came_from.get(&cursor) {
            chain.push(previous);
            cursor = previous;
          }
          chain.reverse();
          return Some(chain);
        }
        queue.push_back(next);
      }
    }
    None
  }
}
