//! Alignment arithmetic for 16-byte vector loads.

/// Bytes consumed by one vector load.
pub const VECTOR_WIDTH: usize = 16;

const ALIGN_MASK: usize = VECTOR_WIDTH - 1;

/// Rounds `n` down to a multiple of [`VECTOR_WIDTH`].
#[inline(always)]
pub const fn round_down(n: usize) -> usize {
    n & !ALIGN_MASK
}

/// Rounds `n` up to a multiple of [`VECTOR_WIDTH`].
#[inline(always)]
pub const fn round_up(n: usize) -> usize {
    (n + ALIGN_MASK) & !ALIGN_MASK
}

/// Whether `ptr` sits on a vector boundary.
#[inline(always)]
pub fn is_aligned(ptr: *const u8) -> bool {
    (ptr as usize) & ALIGN_MASK == 0
}

/// Bytes from `ptr` up to, not including, the next vector boundary.
///
/// Zero when `ptr` is already aligned, otherwise in `1..VECTOR_WIDTH`.
#[inline(always)]
pub fn bytes_until_aligned(ptr: *const u8) -> usize {
    let addr = ptr as usize;
    round_up(addr) - addr
}
