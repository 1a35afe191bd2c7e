//! Routing counters.
//!
//! A process-wide allocator cannot log through the heap it manages,
//! so observability is a set of relaxed counters sampled on demand.

use core::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct Counters {
    pool_hits: AtomicUsize,
    exhausted_fallbacks: AtomicUsize,
    large_bypass: AtomicUsize,
    pool_releases: AtomicUsize,
    backing_releases: AtomicUsize,
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            pool_hits: AtomicUsize::new(0),
            exhausted_fallbacks: AtomicUsize::new(0),
            large_bypass: AtomicUsize::new(0),
            pool_releases: AtomicUsize::new(0),
            backing_releases: AtomicUsize::new(0),
        }
    }

    pub fn hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exhausted(&self) {
        self.exhausted_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn large(&self) {
        self.large_bypass.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pool_release(&self) {
        self.pool_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backing_release(&self) {
        self.backing_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RouteStats {
        RouteStats {
            pool_hits: self.pool_hits.load(Ordering::Relaxed),
            exhausted_fallbacks: self.exhausted_fallbacks.load(Ordering::Relaxed),
            large_bypass: self.large_bypass.load(Ordering::Relaxed),
            pool_releases: self.pool_releases.load(Ordering::Relaxed),
            backing_releases: self.backing_releases.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the routing decisions taken so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Small requests served from the pool.
    pub pool_hits: usize,
    /// Small requests that fell through to the backing tier because
    /// the pool was exhausted or could not be built.
    pub exhausted_fallbacks: usize,
    /// Requests larger than the chunk size, routed straight to the
    /// backing tier.
    pub large_bypass: usize,
    /// Releases returned to the pool.
    pub pool_releases: usize,
    /// Releases forwarded to the backing tier.
    pub backing_releases: usize,
}
