//! Set-bit counting for the 16-bit match masks produced by one vector compare.

/// Counts the set bits in `bits` by repeatedly clearing the lowest set bit.
///
/// Loops once per set bit, so never more than 16 times. Correct on every
/// target regardless of feature detection, which makes it the reference the
/// hardware path is tested against.
#[inline]
pub fn popcount16_portable(mut bits: u16) -> u32 {
    let mut count = 0;
    while bits != 0 {
        bits &= bits - 1;
        count += 1;
    }
    count
}

/// Counts the set bits in `bits` with the `popcnt` instruction.
///
/// # Safety
///
/// The running CPU must support `popcnt`.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "popcnt")]
pub unsafe fn popcount16_popcnt(bits: u16) -> u32 {
    bits.count_ones()
}

/// Counts the set bits in `bits` with the best primitive this CPU offers.
pub fn popcount16(bits: u16) -> u32 {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        if super::dispatch::cpu_features().popcnt {
            // SAFETY: popcnt support was just confirmed.
            return unsafe { popcount16_popcnt(bits) };
        }
    }
    popcount16_portable(bits)
}

/// Bit-count strategy the vector kernels are instantiated with.
///
/// Kernels are monomorphized per strategy, so the choice costs nothing per call.
pub(crate) trait PopCount16 {
    fn count(bits: u16) -> u32;
}

/// Lowers to a single `popcnt` when inlined into a `popcnt`-enabled kernel.
pub(crate) struct Popcnt;

/// Iterative fallback for CPUs without `popcnt`.
pub(crate) struct Kernighan;

impl PopCount16 for Popcnt {
    #[inline(always)]
    fn count(bits: u16) -> u32 {
        bits.count_ones()
    }
}

impl PopCount16 for Kernighan {
    #[inline(always)]
    fn count(bits: u16) -> u32 {
        popcount16_portable(bits)
    }
}
