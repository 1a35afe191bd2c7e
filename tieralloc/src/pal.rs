//! platform layer over page mappings and the system heap

use core::mem;
use core::ptr;

#[cfg(all(target_os = "linux", feature = "hugepage"))]
const MAP_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_HUGETLB;
#[cfg(not(all(target_os = "linux", feature = "hugepage")))]
const MAP_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

/// Reserves `len` bytes of zero-filled read-write memory, or null if
/// the reservation fails. The mapping is never returned to the
/// operating system.
///
/// # Safety
///
/// safe if `len` is nonzero
#[cfg(unix)]
pub unsafe fn map(len: usize) -> *mut u8 {
    let ptr = libc::mmap(
        ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        MAP_FLAGS,
        -1,
        0,
    );
    if ptr == libc::MAP_FAILED {
        return ptr::null_mut();
    }
    ptr as *mut u8
}

/// Over-aligned allocation on the system heap. The returned memory
/// belongs to the backing tier and is released through the ordinary
/// `free` path.
///
/// # Safety
///
/// safe if `size` is nonzero and `align` is a power of two
#[cfg(unix)]
pub unsafe fn aligned(size: usize, align: usize) -> *mut u8 {
    debug_assert!(align.is_power_of_two());
    // posix_memalign additionally wants at least pointer alignment.
    let align = align.max(mem::size_of::<*mut libc::c_void>());
    let mut out: *mut libc::c_void = ptr::null_mut();
    if libc::posix_memalign(&mut out, align, size) != 0 {
        return ptr::null_mut();
    }
    out as *mut u8
}
