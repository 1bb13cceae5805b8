//! Cooperative cancellation for background builds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag polled by long-running build steps.
///
/// Clones observe the same flag, so one token can be handed to every task of
/// a single generation run while other runs keep their own.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
  flag: Arc<AtomicBool>,
}

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation.
  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Relaxed);
  }

  /// Clear a previous request so the token can be reused.
  pub fn reset(&self) {
    self.flag.store(false, Ordering::Relaxed);
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::Relaxed)
  }
}
