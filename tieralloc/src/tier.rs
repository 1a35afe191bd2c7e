//! Tier-routing front end.

use crate::backend::{BackingAlloc, SystemBackend};
use crate::pal;
use crate::slab::{SlabPool, SlabPoolBuilder};
use crate::stats::{Counters, RouteStats};
use core::alloc::{GlobalAlloc, Layout};
use core::cmp;
use core::ptr;
use spin::Once;

/// Largest alignment the system heap guarantees without an aligned
/// entry point.
#[cfg(target_pointer_width = "64")]
pub const MIN_ALIGN: usize = 16;
#[cfg(not(target_pointer_width = "64"))]
pub const MIN_ALIGN: usize = 8;

/// Two-tier allocation front end.
///
/// Requests no larger than the pool's chunk size are served from a
/// [`SlabPool`]; everything else goes to the backing tier `B`,
/// including small requests once the pool is exhausted. The two
/// tiers are indistinguishable to callers except in performance.
///
/// The pool is built behind a one-time barrier on first use; if its
/// reservation fails the front end degrades to a pure pass-through.
pub struct TieredAllocator<B: BackingAlloc> {
    pool: Once<Option<SlabPool>>,
    config: SlabPoolBuilder,
    backend: B,
    counters: Counters,
}

/// The system-backed tier stack, usable as `#[global_allocator]`.
pub type TierAlloc = TieredAllocator<SystemBackend>;

impl TierAlloc {
    /// Default-geometry allocator over the process heap.
    pub const fn new() -> Self {
        Self::with_backend(SlabPoolBuilder::new(), SystemBackend::new())
    }
}

impl Default for TierAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BackingAlloc> TieredAllocator<B> {
    /// Allocator with injected pool geometry and backing tier.
    pub const fn with_backend(config: SlabPoolBuilder, backend: B) -> Self {
        Self {
            pool: Once::new(),
            config,
            backend,
            counters: Counters::new(),
        }
    }

    fn pool(&self) -> Option<&SlabPool> {
        self.pool.call_once(|| self.config.build().ok()).as_ref()
    }

    /// Pool view without forcing construction; a pointer cannot be
    /// pool-owned before the pool exists.
    fn built_pool(&self) -> Option<&SlabPool> {
        self.pool.get().and_then(|slot| slot.as_ref())
    }

    /// Allocates `size` bytes of uninitialized memory.
    ///
    /// Requests that fit a chunk are served from the pool while it
    /// has free chunks; exhaustion silently falls through to the
    /// backing tier. Null only when the backing tier itself fails,
    /// and that failure is propagated unchanged.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        if size <= self.config.chunk_size {
            if let Some(pool) = self.pool() {
                if let Some(chunk) = pool.acquire() {
                    self.counters.hit();
                    return chunk.as_ptr();
                }
            }
            self.counters.exhausted();
        } else {
            self.counters.large();
        }
        self.backend.allocate(size)
    }

    /// Allocates a zero-filled array of `count` elements of `size`
    /// bytes, always from the backing tier.
    ///
    /// The pool hands out uninitialized chunks and never participates
    /// in zeroed requests, whatever the requested size.
    pub fn zero_allocate(&self, count: usize, size: usize) -> *mut u8 {
        self.backend.zero_allocate(count, size)
    }

    /// Resizes `ptr` to `new_size`, always through the backing tier.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation obtained from the
    /// *backing* tier of this allocator. Pool chunks carry no size
    /// metadata, so a pool-issued pointer cannot be resized here; the
    /// [`GlobalAlloc`] impl, which receives the old layout, is the
    /// surface that can move those.
    pub unsafe fn resize(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        self.backend.resize(ptr, new_size)
    }

    /// Releases `ptr`; null is a no-op.
    ///
    /// The pool gets first refusal by address range, everything else
    /// is forwarded to the backing tier.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation obtained from this
    /// allocator, pointing at the start of that allocation.
    pub unsafe fn release(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if let Some(pool) = self.built_pool() {
            if pool.release(ptr) {
                self.counters.pool_release();
                return;
            }
        }
        self.counters.backing_release();
        self.backend.release(ptr);
    }

    /// Chunk size the routing decision is made against.
    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Free chunks remaining in the pool; `None` until a small
    /// request has forced pool construction, or if the reservation
    /// failed.
    pub fn free_chunks(&self) -> Option<usize> {
        self.built_pool().map(SlabPool::free_chunks)
    }

    /// Routing counters accumulated so far.
    pub fn stats(&self) -> RouteStats {
        self.counters.snapshot()
    }
}

unsafe impl GlobalAlloc for TierAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > MIN_ALIGN {
            return pal::aligned(layout.size(), layout.align());
        }
        if layout.align() > self.config.chunk_size {
            // Chunks are only chunk_size-aligned; skip the pool.
            return self.backend.allocate(layout.size());
        }
        self.allocate(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.release(ptr)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > MIN_ALIGN {
            let ptr = pal::aligned(layout.size(), layout.align());
            if !ptr.is_null() {
                ptr::write_bytes(ptr, 0, layout.size());
            }
            return ptr;
        }
        self.zero_allocate(1, layout.size())
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let pool_owned = self.built_pool().map_or(false, |pool| pool.contains(ptr));
        if !pool_owned && layout.align() <= MIN_ALIGN {
            return self.resize(ptr, new_size);
        }
        // The layout recovers what the pointer alone cannot tell us:
        // move the block through allocate/copy/release.
        let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
        let new_ptr = self.alloc(new_layout);
        if !new_ptr.is_null() {
            ptr::copy_nonoverlapping(ptr, new_ptr, cmp::min(layout.size(), new_size));
            self.release(ptr);
        }
        new_ptr
    }
}
