//! Incremental dirty-region rebuild.

use glam::Vec3;
use rayon::prelude::*;
use tracing::{debug, warn};
use web_time::Instant;

use super::assemble::{assemble, LeafMasks};
use super::sampler::OcclusionSampler;
use super::{rasterize_leaf, BuildStats, VolumeBuilder};
use crate::bounds::Aabb;
use crate::error::BuildError;
use crate::morton::{self, MortonCode};
use crate::occlusion::OcclusionQuery;
use crate::octree::OctreeVolume;

impl<'a, Q: OcclusionQuery + ?Sized> VolumeBuilder<'a, Q> {
  /// Re-query occlusion for the leaf cells intersecting `dirty` and
  /// propagate the change through every layer.
  ///
  /// Leaves outside `dirty` keep their masks. On cancellation `volume` is
  /// left untouched.
  #[tracing::instrument(skip_all, name = "builder::rebuild_in_bounds")]
  pub fn rebuild_in_bounds(&self, volume: &mut OctreeVolume, dirty: Aabb) -> Result<BuildStats, BuildError> {
    let start = Instant::now();
    if !volume.is_valid() {
      warn!("skipping rebuild of invalid volume");
      return Ok(BuildStats::default());
    }
    let nav_bounds = volume.nav_bounds();
    if !nav_bounds.overlaps(&dirty) {
      return Ok(BuildStats::default());
    }
    let region = Aabb {
      min: dirty.min.max(nav_bounds.min),
      max: dirty.max.min(nav_bounds.max),
    };

    let lo = volume.cell_coords(0, region.min);
    let hi = volume.cell_coords(0, region.max);
    let mut cells: Vec<MortonCode> = Vec::new();
    for z in lo.z..=hi.z {
      for y in lo.y..=hi.y {
        for x in lo.x..=hi.x {
          cells.push(morton::encode(glam::UVec3::new(x, y, z)));
        }
      }
    }

    let sampler = OcclusionSampler::new(self.query, &self.settings, &self.token);
    let leaf_extent = volume.layer_extent(0);
    let query_extent = Vec3::splat(leaf_extent + self.settings.clearance);
    let view = &*volume;
    let updated: Vec<(MortonCode, u64)> = cells
      .par_iter()
      .map(|&code| {
        let center = view.position_from_code(0, code);
        let candidates = sampler
          .query()
          .candidates(&Aabb::from_center_half_extents(center, query_extent));
        let mask = if sampler.is_occluded(center, leaf_extent, Some(&candidates)) {
          rasterize_leaf(view, center, Some(&candidates), &sampler)
        } else {
          0
        };
        (code, mask)
      })
      .collect();
    self.check_cancelled()?;

    let mut masks: LeafMasks = volume
      .layer(0)
      .map(|layer| {
        layer
          .nodes()
          .iter()
          .zip(volume.leaves())
          .filter(|(_, leaf)| !leaf.is_completely_free())
          .map(|(node, leaf)| (node.code, leaf.occupancy))
          .collect()
      })
      .unwrap_or_default();
    for &(code, mask) in &updated {
      if mask == 0 {
        masks.remove(&code);
      } else {
        masks.insert(code, mask);
      }
    }
    assemble(volume, &masks);

    let stats = BuildStats {
      occluded_voxels: sampler.occluded_count(),
      candidate_objects: sampler.candidate_count(),
      layer1_cells_cached: 0,
      leaves_rasterized: updated.len() as u64,
      failed_queries: sampler.failure_count(),
      elapsed_us: start.elapsed().as_micros() as u64,
    };
    debug!(leaves = updated.len(), elapsed_us = stats.elapsed_us, "rebuilt dirty region");
    Ok(stats)
  }
}
