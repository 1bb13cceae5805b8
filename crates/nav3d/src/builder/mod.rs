//! Volume builder: turns occlusion queries into an [`OctreeVolume`].
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ cache layer-1    │──▶│ mark blocked     │──▶│ rasterize leaves │
//! │ broad-phase      │   │ layer-1 cells    │   │ 64 sub-voxels    │
//! │ candidates       │   │ (narrow test)    │   │ under blocked    │
//! └──────────────────┘   └──────────────────┘   └────────┬─────────┘
//!                                                        ▼
//!                        ┌──────────────────┐   ┌──────────────────┐
//!                        │ neighbour ropes  │◀──│ assemble layers  │
//!                        │ (coarse → fine)  │   │ parent/child     │
//!                        └──────────────────┘   └──────────────────┘
//! ```
//!
//! Each stage polls the [`CancellationToken`]; a cancelled build returns
//! [`BuildError::Cancelled`] and its partial volume is dropped.
//!
//! # Usage
//!
//! ```ignore
//! let builder = VolumeBuilder::new(&scene, GenerationSettings::default());
//! let output = builder.build(bounds)?;
//! assert!(output.volume.is_valid());
//! ```

mod assemble;
mod sampler;
mod rebuild;

use glam::Vec3;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::bounds::Aabb;
use crate::cancel::CancellationToken;
use crate::error::BuildError;
use crate::morton::{self, MortonCode};
use crate::occlusion::{OccluderId, OcclusionQuery};
use crate::octree::{OctreeVolume, LEAF_SUB_NODES};
use crate::settings::GenerationSettings;

use assemble::{assemble, LeafMasks};
use sampler::OcclusionSampler;

/// Counters collected during a build or rebuild.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
  /// Boxes reported occluded (layer-1 cells, leaves and sub-voxels).
  pub occluded_voxels: u64,
  /// Candidate occluders handed to narrow-phase tests.
  pub candidate_objects: u64,
  /// Layer-1 cells with at least one broad-phase candidate.
  pub layer1_cells_cached: u64,
  pub leaves_rasterized: u64,
  /// Occlusion queries that returned an error.
  pub failed_queries: u64,
  pub elapsed_us: u64,
}

/// A finished build.
#[derive(Clone, Debug)]
pub struct BuildOutput {
  pub volume: OctreeVolume,
  pub stats: BuildStats,
}

/// Builds octrees for partitions against one occlusion backend.
pub struct VolumeBuilder<'a, Q: OcclusionQuery + ?Sized> {
  query: &'a Q,
  settings: GenerationSettings,
  token: CancellationToken,
}

impl<'a, Q: OcclusionQuery + ?Sized> VolumeBuilder<'a, Q> {
  pub fn new(query: &'a Q, settings: GenerationSettings) -> Self {
    Self {
      query,
      settings,
      token: CancellationToken::new(),
    }
  }

  /// Poll `token` instead of a private one.
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.token = token;
    self
  }

  pub fn settings(&self) -> &GenerationSettings {
    &self.settings
  }

  /// Full generation pass over `source_bounds`.
  #[tracing::instrument(skip_all, name = "builder::build")]
  pub fn build(&self, source_bounds: Aabb) -> Result<BuildOutput, BuildError> {
    let start = Instant::now();
    let mut volume = OctreeVolume::with_geometry(source_bounds, self.settings.voxel_extent).map_err(|err| {
      warn!(%err, ?source_bounds, "rejecting volume");
      err
    })?;
    let sampler = OcclusionSampler::new(self.query, &self.settings, &self.token);
    self.check_cancelled()?;

    let search_bounds = volume.nav_bounds().expand(self.settings.clearance);
    if self.query.candidates(&search_bounds).is_empty() {
      debug!(?source_bounds, "no occluders overlap volume");
      return Ok(BuildOutput {
        volume,
        stats: BuildStats {
          elapsed_us: start.elapsed().as_micros() as u64,
          ..BuildStats::default()
        },
      });
    }

    let cache = {
      let _span = tracing::info_span!("cache_layer1_overlaps").entered();
      self.cache_layer1_overlaps(&volume, &sampler)
    };
    self.check_cancelled()?;

    let blocked = {
      let _span = tracing::info_span!("first_pass").entered();
      first_pass(&volume, &cache, &sampler)
    };
    self.check_cancelled()?;

    let leaf_masks = {
      let _span = tracing::info_span!("rasterize_leaves").entered();
      rasterize_initial_layer(&volume, &blocked, &cache, &sampler)
    };
    self.check_cancelled()?;

    {
      let _span = tracing::info_span!("assemble_layers").entered();
      assemble(&mut volume, &leaf_masks);
    }
    self.check_cancelled()?;

    let stats = BuildStats {
      occluded_voxels: sampler.occluded_count(),
      candidate_objects: sampler.candidate_count(),
      layer1_cells_cached: cache.iter().filter(|c| !c.is_empty()).count() as u64,
      leaves_rasterized: leaf_masks.len() as u64,
      failed_queries: sampler.failure_count(),
      elapsed_us: start.elapsed().as_micros() as u64,
    };
    info!(
      layers = volume.layer_count(),
      nodes = volume.node_count(),
      leaves = volume.leaves().len(),
      elapsed_us = stats.elapsed_us,
      "built navigation volume"
    );
    Ok(BuildOutput { volume, stats })
  }

  fn check_cancelled(&self) -> Result<(), BuildError> {
    if self.token.is_cancelled() {
      debug!("build cancelled");
      return Err(BuildError::Cancelled);
    }
    Ok(())
  }

  /// Broad-phase candidates for every layer-1 cell, indexed by Morton code.
  fn cache_layer1_overlaps(&self, volume: &OctreeVolume, sampler: &OcclusionSampler<'_, Q>) -> Vec<Vec<OccluderId>> {
    let Some(layer1) = volume.layer(1) else {
      return Vec::new();
    };
    let extent = layer1.node_extent() + sampler.clearance();
    (0..layer1.max_nodes() as usize)
      .into_par_iter()
      .map(|code| {
        if sampler.is_cancelled() {
          return Vec::new();
        }
        let center = volume.position_from_code(1, code as MortonCode);
        sampler.query().candidates(&Aabb::from_center_half_extents(center, Vec3::splat(extent)))
      })
      .collect()
  }
}

/// Layer-1 codes whose cell is occluded, ascending.
fn first_pass<Q: OcclusionQuery + ?Sized>(
  volume: &OctreeVolume,
  cache: &[Vec<OccluderId>],
  sampler: &OcclusionSampler<'_, Q>,
) -> Vec<MortonCode> {
  let extent = volume.layer_extent(1);
  (0..cache.len())
    .into_par_iter()
    .filter(|&code| {
      let candidates = &cache[code];
      !candidates.is_empty()
        && sampler.is_occluded(volume.position_from_code(1, code as MortonCode), extent, Some(candidates))
    })
    .map(|code| code as MortonCode)
    .collect()
}

/// Occupancy of the 8 leaves under every blocked layer-1 cell.
fn rasterize_initial_layer<Q: OcclusionQuery + ?Sized>(
  volume: &OctreeVolume,
  blocked: &[MortonCode],
  cache: &[Vec<OccluderId>],
  sampler: &OcclusionSampler<'_, Q>,
) -> LeafMasks {
  let leaf_extent = volume.layer_extent(0);
  let cells: Vec<(MortonCode, u64)> = blocked
    .par_iter()
    .flat_map_iter(|&parent| {
      let candidates = &cache[parent as usize];
      (0..8u8).map(move |octant| {
        let code = morton::child(parent, octant);
        let center = volume.position_from_code(0, code);
        let mask = if sampler.is_occluded(center, leaf_extent, Some(candidates)) {
          rasterize_leaf(volume, center, Some(candidates), sampler)
        } else {
          0
        };
        (code, mask)
      })
    })
    .collect();
  cells.into_iter().collect()
}

/// Occupancy mask of the leaf centred at `center`.
pub(crate) fn rasterize_leaf<Q: OcclusionQuery + ?Sized>(
  volume: &OctreeVolume,
  center: Vec3,
  candidates: Option<&[OccluderId]>,
  sampler: &OcclusionSampler<'_, Q>,
) -> u64 {
  let sub_extent = volume.sub_voxel_size() * 0.5;
  let mut mask = 0u64;
  for sub in 0..LEAF_SUB_NODES as u8 {
    if sampler.is_cancelled() {
      return mask;
    }
    if sampler.is_occluded(volume.sub_voxel_position(center, sub), sub_extent, candidates) {
      mask |= 1u64 << sub;
    }
  }
  mask
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_test;
