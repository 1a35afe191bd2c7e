//! Fixed-capacity slab pool.

use crate::error::{AllocError, Result};
use crate::freelist::FreeList;
use crate::pal;
use core::mem;
use core::ptr::NonNull;
use spin::Mutex;

/// Default pool geometry: 512K chunks of 16 bytes, about 8 MiB.
pub const POOL_CHUNKS: usize = 512 * 1024;
pub const CHUNK_SIZE: usize = 16;

/// A fixed arena of uniformly sized chunks handed out through an
/// intrusive free list.
///
/// The backing region is reserved once and kept for the life of the
/// pool. Chunks carry no header: a free chunk is a free-list node, an
/// in-use chunk is opaque bytes, and ownership on release is decided
/// purely by address range.
#[derive(Debug)]
pub struct SlabPool {
    base: usize,
    chunk_size: usize,
    capacity: usize,
    free: Mutex<FreeList>,
}

impl SlabPool {
    /// Builds the default-geometry pool.
    pub fn new() -> Result<Self> {
        SlabPoolBuilder::new().build()
    }

    fn from_parts(base: usize, chunks: usize, chunk_size: usize) -> Self {
        let mut free = FreeList::new();
        // Thread every chunk in array order: chunk i links to chunk
        // i + 1, the last chunk terminates the list, the head ends up
        // at chunk 0.
        for i in (0..chunks).rev() {
            unsafe { free.push((base + i * chunk_size) as *mut u8) };
        }
        Self {
            base,
            chunk_size,
            capacity: chunks,
            free: Mutex::new(free),
        }
    }

    /// Pops one uninitialized chunk, or `None` when the pool is
    /// exhausted. Exhaustion is an expected outcome the caller
    /// absorbs by moving to the next tier.
    pub fn acquire(&self) -> Option<NonNull<u8>> {
        self.free.lock().pop()
    }

    /// Returns `ptr`'s chunk to the free list if this pool owns it.
    ///
    /// Ownership is a pure address-range test; `false` means the
    /// pointer belongs to another tier and the caller keeps routing.
    /// A pointer strictly inside a chunk rather than at its start is
    /// a caller error this pool cannot detect past a debug build.
    pub fn release(&self, ptr: *mut u8) -> bool {
        if !self.contains(ptr) {
            return false;
        }
        debug_assert_eq!((ptr as usize - self.base) % self.chunk_size, 0);
        unsafe { self.free.lock().push(ptr) };
        true
    }

    /// Address-range ownership over `[base, base + capacity * chunk_size)`.
    pub fn contains(&self, ptr: *mut u8) -> bool {
        let addr = ptr as usize;
        addr >= self.base && addr < self.base + self.capacity * self.chunk_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Chunks currently on the free list; `capacity - free_chunks`
    /// are in use.
    pub fn free_chunks(&self) -> usize {
        self.free.lock().len()
    }
}

/// Builder for pools with non-default geometry.
#[derive(Debug, Clone, Copy)]
pub struct SlabPoolBuilder {
    pub(crate) chunks: usize,
    pub(crate) chunk_size: usize,
}

impl SlabPoolBuilder {
    pub const fn new() -> Self {
        Self {
            chunks: POOL_CHUNKS,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub const fn chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    pub const fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Reserves the region and threads the free list.
    ///
    /// A free chunk stores its next link in word 0, so the chunk size
    /// must be a power of two no smaller than a `usize`.
    pub fn build(&self) -> Result<SlabPool> {
        if self.chunks == 0
            || !self.chunk_size.is_power_of_two()
            || self.chunk_size < mem::size_of::<usize>()
        {
            return Err(AllocError::ELAYOUT);
        }
        let len = self
            .chunks
            .checked_mul(self.chunk_size)
            .ok_or(AllocError::ELAYOUT)?;
        let base = unsafe { pal::map(len) };
        if base.is_null() {
            return Err(AllocError::ENOMEM);
        }
        Ok(SlabPool::from_parts(base as usize, self.chunks, self.chunk_size))
    }
}

impl Default for SlabPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::boxed::Box;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    fn tiny(chunks: usize) -> SlabPool {
        SlabPoolBuilder::new().chunks(chunks).build().unwrap()
    }

    #[test]
    fn builder_rejects_bad_geometry() {
        let no_chunks = SlabPoolBuilder::new().chunks(0).build();
        assert_eq!(no_chunks.unwrap_err(), AllocError::ELAYOUT);

        let odd_chunk = SlabPoolBuilder::new().chunk_size(24).build();
        assert_eq!(odd_chunk.unwrap_err(), AllocError::ELAYOUT);

        let narrow_chunk = SlabPoolBuilder::new()
            .chunk_size(mem::size_of::<usize>() / 2)
            .build();
        assert_eq!(narrow_chunk.unwrap_err(), AllocError::ELAYOUT);
    }

    #[test]
    fn fresh_pool_is_fully_free() {
        let pool = tiny(8);
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.chunk_size(), CHUNK_SIZE);
        assert_eq!(pool.free_chunks(), 8);
    }

    #[test]
    fn chunks_are_threaded_in_array_order() {
        let pool = tiny(4);
        let p0 = pool.acquire().unwrap().as_ptr() as usize;
        let p1 = pool.acquire().unwrap().as_ptr() as usize;
        let p2 = pool.acquire().unwrap().as_ptr() as usize;
        let p3 = pool.acquire().unwrap().as_ptr() as usize;
        assert_eq!(p1 - p0, CHUNK_SIZE);
        assert_eq!(p2 - p1, CHUNK_SIZE);
        assert_eq!(p3 - p2, CHUNK_SIZE);
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn acquire_tracks_accounting_until_exhaustion() {
        let pool = tiny(4);
        let mut held = Vec::new();
        for i in 0..4 {
            assert_eq!(pool.free_chunks(), 4 - i);
            held.push(pool.acquire().unwrap());
        }
        assert_eq!(pool.free_chunks(), 0);
        assert!(pool.acquire().is_none());

        for (i, chunk) in held.into_iter().enumerate() {
            assert!(pool.release(chunk.as_ptr()));
            assert_eq!(pool.free_chunks(), i + 1);
        }
    }

    #[test]
    fn release_is_lifo() {
        let pool = tiny(4);
        let _a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let _c = pool.acquire().unwrap();

        assert!(pool.release(b.as_ptr()));
        assert_eq!(pool.acquire().unwrap(), b);
    }

    #[test]
    fn ownership_boundary_is_half_open() {
        let pool = tiny(4);
        let mut lowest = usize::MAX;
        for _ in 0..4 {
            lowest = lowest.min(pool.acquire().unwrap().as_ptr() as usize);
        }
        let end = lowest + 4 * CHUNK_SIZE;
        assert!(pool.contains(lowest as *mut u8));
        assert!(pool.contains((end - 1) as *mut u8));
        assert!(!pool.contains(end as *mut u8));
        assert!(!pool.contains((lowest - 1) as *mut u8));
        // One past the end must be refused and routed onward.
        assert!(!pool.release(end as *mut u8));
    }

    #[test]
    fn foreign_pointers_are_not_owned() {
        let pool = tiny(4);
        let foreign = Box::new(0u64);
        let ptr = Box::into_raw(foreign);
        assert!(!pool.release(ptr as *mut u8));
        drop(unsafe { Box::from_raw(ptr) });
    }

    #[test]
    fn concurrent_acquire_never_double_issues() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 64;

        let pool = Arc::new(tiny(THREADS * PER_THREAD));
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let tag = t as u8 + 1;
                    let mut held = Vec::new();
                    while held.len() < PER_THREAD {
                        let chunk = pool.acquire().expect("pool sized for all threads");
                        unsafe { core::ptr::write_bytes(chunk.as_ptr(), tag, CHUNK_SIZE) };
                        held.push(chunk);
                    }
                    // A chunk issued to two threads at once would get
                    // its tag clobbered by the other holder.
                    for chunk in &held {
                        let bytes =
                            unsafe { core::slice::from_raw_parts(chunk.as_ptr(), CHUNK_SIZE) };
                        assert!(bytes.iter().all(|&b| b == tag));
                    }
                    held.into_iter()
                        .map(|c| c.as_ptr() as usize)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut issued = Vec::new();
        for handle in handles {
            for addr in handle.join().unwrap() {
                assert!(seen.insert(addr), "chunk issued twice");
                issued.push(addr);
            }
        }
        assert_eq!(pool.free_chunks(), 0);
        for addr in issued {
            assert!(pool.release(addr as *mut u8));
        }
        assert_eq!(pool.free_chunks(), THREADS * PER_THREAD);
    }

    #[test]
    fn concurrent_churn_preserves_accounting() {
        const THREADS: usize = 4;
        const CAPACITY: usize = 128;
        const STEPS: usize = 10_000;

        let pool = Arc::new(tiny(CAPACITY));
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut rng = 0x9E37_79B9_7F4A_7C15u64.wrapping_mul(t as u64 + 1) | 1;
                    let mut held = Vec::new();
                    for _ in 0..STEPS {
                        rng = rng
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        if held.is_empty() || rng & 1 == 0 {
                            if let Some(chunk) = pool.acquire() {
                                held.push(chunk);
                            }
                        } else {
                            let idx = (rng >> 32) as usize % held.len();
                            let chunk = held.swap_remove(idx);
                            assert!(pool.release(chunk.as_ptr()));
                        }
                    }
                    for chunk in held {
                        assert!(pool.release(chunk.as_ptr()));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.free_chunks(), CAPACITY);
    }
}
