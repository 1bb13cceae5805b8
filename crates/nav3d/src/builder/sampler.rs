//! Occlusion tests with clearance, failure policy and statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::occlusion::{OccluderId, OcclusionQuery};
use crate::settings::{GenerationSettings, OcclusionFailurePolicy};

/// Wraps an [`OcclusionQuery`] for one build run.
pub(crate) struct OcclusionSampler<'a, Q: ?Sized> {
  query: &'a Q,
  clearance: f32,
  policy: OcclusionFailurePolicy,
  token: &'a CancellationToken,
  occluded: AtomicU64,
  candidates: AtomicU64,
  failures: AtomicU64,
}

impl<'a, Q: OcclusionQuery + ?Sized> OcclusionSampler<'a, Q> {
  pub fn new(query: &'a Q, settings: &GenerationSettings, token: &'a CancellationToken) -> Self {
    Self {
      query,
      clearance: settings.clearance,
      policy: settings.occlusion_failure_policy,
      token,
      occluded: AtomicU64::new(0),
      candidates: AtomicU64::new(0),
      failures: AtomicU64::new(0),
    }
  }

  #[inline]
  pub fn query(&self) -> &Q {
    self.query
  }

  #[inline]
  pub fn clearance(&self) -> f32 {
    self.clearance
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Whether the cube `center ± (extent + clearance)` is occluded.
  ///
  /// An empty candidate list means nothing can occlude the box. Cancellation
  /// reports every box as free so loops drain quickly.
  pub fn is_occluded(&self, center: Vec3, extent: f32, candidates: Option<&[OccluderId]>) -> bool {
    if self.token.is_cancelled() {
      return false;
    }
    if let Some(ids) = candidates {
      if ids.is_empty() {
        return false;
      }
      self.candidates.fetch_add(ids.len() as u64, Ordering::Relaxed);
    }

    let half_extents = Vec3::splat(extent + self.clearance);
    match self.query.is_box_occluded(center, half_extents, candidates) {
      Ok(true) => {
        self.occluded.fetch_add(1, Ordering::Relaxed);
        true
      }
      Ok(false) => false,
      Err(err) => {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(%err, ?center, extent, policy = ?self.policy, "occlusion query failed");
        match self.policy {
          OcclusionFailurePolicy::FailOpen => false,
          OcclusionFailurePolicy::FailClosed => {
            self.occluded.fetch_add(1, Ordering::Relaxed);
            true
          }
        }
      }
    }
  }

  pub fn occluded_count(&self) -> u64 {
    self.occluded.load(Ordering::Relaxed)
  }

  pub fn candidate_count(&self) -> u64 {
    self.candidates.load(Ordering::Relaxed)
  }

  pub fn failure_count(&self) -> u64 {
    self.failures.load(Ordering::Relaxed)
  }
}
