//! Two-tier heap allocator: a fixed-size slab pool in front of a
//! general-purpose backing allocator.
//!
//! Small requests are served from a pre-reserved arena of uniform
//! chunks; large requests, and small ones once the arena is
//! exhausted, pass through to the backing tier. [`TierAlloc`] is a
//! drop-in `#[global_allocator]`.

#![no_std]

mod backend;
mod error;
mod freelist;
mod pal;
mod slab;
mod stats;
mod tier;

pub use backend::{BackingAlloc, SystemBackend};
pub use error::{AllocError, Result};
pub use slab::{SlabPool, SlabPoolBuilder, CHUNK_SIZE, POOL_CHUNKS};
pub use stats::RouteStats;
pub use tier::{TierAlloc, TieredAllocator, MIN_ALIGN};
