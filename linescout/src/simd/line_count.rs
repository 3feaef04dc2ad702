//! Newline counting kernels.
//!
//! Every vector kernel splits the region three ways:
//!
//! 1. **Prologue.** When the region does not start on a 16-byte boundary, one
//!    unaligned load covers the first 16 bytes but only the bytes up to the
//!    boundary are compared. The cursor advances by exactly that many bytes, so
//!    nothing is counted twice. Regions shorter than one vector are scanned a
//!    byte at a time instead, since a full load would run past their end.
//! 2. **Body.** Aligned 16-byte loads while at least 16 bytes remain.
//! 3. **Epilogue.** The last 0 to 15 bytes, one at a time.
//!
//! No load ever touches a byte outside the region. The unsafe code in this
//! crate that reads through raw vector loads lives here and nowhere else.

/// Newline counting function bound by the dispatcher.
///
/// Vector variants are `#[target_feature]` functions, hence `unsafe`: they may
/// only be called on a CPU that has the features they were compiled for.
pub(crate) type CountLinesFn = unsafe fn(&[u8]) -> usize;

const NEWLINE: u8 = b'\n';

/// Counts newlines one byte at a time.
///
/// Bound on CPUs without SSE2 and on non-x86 targets; also the reference the
/// vector kernels are tested against.
pub fn count_lines_portable(region: &[u8]) -> usize {
    region.iter().filter(|&&b| b == NEWLINE).count()
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub(crate) mod x86 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    use super::{count_lines_portable, NEWLINE};
    use crate::simd::align::{bytes_until_aligned, is_aligned, round_down, VECTOR_WIDTH};
    use crate::simd::popcount::{Kernighan, PopCount16, Popcnt};

    /// Byte-equality compare producing one mask bit per byte.
    trait NewlineCompare {
        /// Bits for all 16 bytes of `chunk`.
        unsafe fn full(chunk: __m128i, needle: __m128i) -> u16;

        /// Bits for the first `len` bytes of `chunk` only, `len` in `1..16`.
        unsafe fn leading(chunk: __m128i, needle: __m128i, len: usize) -> u16;
    }

    /// `pcmpeqb` + `pmovmskb`, masking off the unwanted high bits afterwards.
    struct Sse2Compare;

    /// `pcmpestrm` with an explicit operand length, so the hardware ignores
    /// the bytes past `len`.
    struct Sse42Compare;

    impl NewlineCompare for Sse2Compare {
        #[inline(always)]
        unsafe fn full(chunk: __m128i, needle: __m128i) -> u16 {
            _mm_movemask_epi8(_mm_cmpeq_epi8(chunk, needle)) as u16
        }

        #[inline(always)]
        unsafe fn leading(chunk: __m128i, needle: __m128i, len: usize) -> u16 {
            debug_assert!(len > 0 && len < VECTOR_WIDTH);
            Self::full(chunk, needle) & (((1u32 << len) - 1) as u16)
        }
    }

    const CMPESTRM_MODE: i32 = _SIDD_UBYTE_OPS | _SIDD_CMP_EQUAL_EACH | _SIDD_BIT_MASK;

    impl NewlineCompare for Sse42Compare {
        #[inline(always)]
        unsafe fn full(chunk: __m128i, needle: __m128i) -> u16 {
            let mask = _mm_cmpestrm::<CMPESTRM_MODE>(chunk, 16, needle, 16);
            _mm_cvtsi128_si32(mask) as u16
        }

        #[inline(always)]
        unsafe fn leading(chunk: __m128i, needle: __m128i, len: usize) -> u16 {
            debug_assert!(len > 0 && len < VECTOR_WIDTH);
            // Bytes past `len` are invalid in the first operand but valid in
            // the needle, which EQUAL_EACH reports as a mismatch.
            let mask = _mm_cmpestrm::<CMPESTRM_MODE>(chunk, len as i32, needle, 16);
            _mm_cvtsi128_si32(mask) as u16
        }
    }

    #[inline(always)]
    unsafe fn count_lines_vectorized<C: NewlineCompare, P: PopCount16>(region: &[u8]) -> usize {
        let len = region.len();
        let base = region.as_ptr();
        let needle = _mm_set1_epi8(NEWLINE as i8);
        let mut count = 0usize;
        let mut pos = 0usize;

        let head = bytes_until_aligned(base);
        if head != 0 {
            if len >= VECTOR_WIDTH {
                // SAFETY: the region holds at least VECTOR_WIDTH bytes from `base`.
                let chunk = _mm_loadu_si128(base as *const __m128i);
                count += P::count(C::leading(chunk, needle, head)) as usize;
                pos = head;
            } else {
                let stop = head.min(len);
                count += count_lines_portable(&region[..stop]);
                pos = stop;
            }
        }

        let body_end = pos + round_down(len - pos);
        while pos < body_end {
            let ptr = base.add(pos);
            debug_assert!(is_aligned(ptr));
            // SAFETY: `ptr` is aligned and `pos + VECTOR_WIDTH <= body_end <= len`.
            let chunk = _mm_load_si128(ptr as *const __m128i);
            count += P::count(C::full(chunk, needle)) as usize;
            pos += VECTOR_WIDTH;
        }

        count + count_lines_portable(&region[pos..])
    }

    /// # Safety
    ///
    /// Requires SSE2, SSE4.2 and POPCNT.
    #[target_feature(enable = "sse2,sse4.2,popcnt")]
    pub(crate) unsafe fn count_lines_sse42_popcnt(region: &[u8]) -> usize {
        count_lines_vectorized::<Sse42Compare, Popcnt>(region)
    }

    /// # Safety
    ///
    /// Requires SSE2 and SSE4.2.
    #[target_feature(enable = "sse2,sse4.2")]
    pub(crate) unsafe fn count_lines_sse42_no_popcnt(region: &[u8]) -> usize {
        count_lines_vectorized::<Sse42Compare, Kernighan>(region)
    }

    /// # Safety
    ///
    /// Requires SSE2 and POPCNT.
    #[target_feature(enable = "sse2,popcnt")]
    pub(crate) unsafe fn count_lines_sse2_popcnt(region: &[u8]) -> usize {
        count_lines_vectorized::<Sse2Compare, Popcnt>(region)
    }

    /// # Safety
    ///
    /// Requires SSE2.
    #[target_feature(enable = "sse2")]
    pub(crate) unsafe fn count_lines_sse2_no_popcnt(region: &[u8]) -> usize {
        count_lines_vectorized::<Sse2Compare, Kernighan>(region)
    }
}
