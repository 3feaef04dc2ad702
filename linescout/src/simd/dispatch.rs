//! One-time CPU feature detection and binding of the newline counter.
//!
//! The first call into [`count_lines`] or [`line_counter`] probes the CPU and
//! binds a function pointer to the best compiled kernel. Every later call goes
//! straight through that pointer; detection is never repeated. The binding is
//! immutable once made, so worker threads read it without synchronization
//! beyond the init-once check.
//!
//! A CPU lacking every accelerated feature, or a target with no vector kernels
//! compiled in, binds [`Variant::Portable`]. Missing features cost speed, never
//! correctness.
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use tracing::debug;

use super::line_count::{self, CountLinesFn};

static CPU_FEATURES: Lazy<CpuFeatures> = Lazy::new(CpuFeatures::detect);

static LINE_COUNTER: Lazy<LineCounter> = Lazy::new(|| {
    let features = cpu_features();
    let counter = LineCounter::bind(Variant::select(features));
    debug!(
        variant = %counter.variant(),
        ?features,
        "Bound newline counter"
    );
    counter
});

/// Instruction-set extensions the kernels care about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuFeatures {
    pub sse2: bool,
    pub sse4_2: bool,
    pub popcnt: bool,
}

impl CpuFeatures {
    /// Probes the running CPU.
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            Self {
                sse2: is_x86_feature_detected!("sse2"),
                sse4_2: is_x86_feature_detected!("sse4.2"),
                popcnt: is_x86_feature_detected!("popcnt"),
            }
        }

        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            Self::default()
        }
    }
}

/// Compiled newline-counting kernels, one per meaningful feature combination.
///
/// The name spells out exactly which features the kernel was compiled for, so
/// the detection result and the bound kernel cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Variant {
    Sse42Popcnt,
    Sse42NoPopcnt,
    Sse2Popcnt,
    Sse2NoPopcnt,
    Portable,
}

impl Variant {
    /// Every variant, fastest first.
    pub const ALL: [Variant; 5] = [
        Variant::Sse42Popcnt,
        Variant::Sse42NoPopcnt,
        Variant::Sse2Popcnt,
        Variant::Sse2NoPopcnt,
        Variant::Portable,
    ];

    /// Picks the fastest variant `features` can run.
    pub fn select(features: CpuFeatures) -> Self {
        Self::ALL
            .into_iter()
            .find(|v| v.is_supported_by(features))
            .unwrap_or(Variant::Portable)
    }

    /// Whether a CPU with `features` can execute this variant, and whether
    /// this build carries its kernel.
    pub fn is_supported_by(self, features: CpuFeatures) -> bool {
        let compiled = cfg!(any(target_arch = "x86", target_arch = "x86_64"));
        match self {
            Variant::Sse42Popcnt => {
                compiled && features.sse2 && features.sse4_2 && features.popcnt
            }
            Variant::Sse42NoPopcnt => compiled && features.sse2 && features.sse4_2,
            Variant::Sse2Popcnt => compiled && features.sse2 && features.popcnt,
            Variant::Sse2NoPopcnt => compiled && features.sse2,
            Variant::Portable => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Variant::Sse42Popcnt => "sse4.2+popcnt",
            Variant::Sse42NoPopcnt => "sse4.2",
            Variant::Sse2Popcnt => "sse2+popcnt",
            Variant::Sse2NoPopcnt => "sse2",
            Variant::Portable => "portable",
        }
    }

    fn kernel(self) -> CountLinesFn {
        match self {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Variant::Sse42Popcnt => line_count::x86::count_lines_sse42_popcnt,
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Variant::Sse42NoPopcnt => line_count::x86::count_lines_sse42_no_popcnt,
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Variant::Sse2Popcnt => line_count::x86::count_lines_sse2_popcnt,
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Variant::Sse2NoPopcnt => line_count::x86::count_lines_sse2_no_popcnt,
            _ => line_count::count_lines_portable,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A newline counter bound to one kernel.
///
/// Only constructible for a variant the running CPU supports, which is what
/// makes [`LineCounter::count_lines`] safe to call.
#[derive(Clone, Copy)]
pub struct LineCounter {
    variant: Variant,
    kernel: CountLinesFn,
}

impl fmt::Debug for LineCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineCounter")
            .field("variant", &self.variant)
            .finish()
    }
}

impl LineCounter {
    /// Binds the fastest variant for this CPU.
    pub fn detect() -> Self {
        Self::bind(Variant::select(cpu_features()))
    }

    /// Binds `variant` if this CPU can run it.
    pub fn with_variant(variant: Variant) -> Option<Self> {
        variant
            .is_supported_by(cpu_features())
            .then(|| Self::bind(variant))
    }

    fn bind(variant: Variant) -> Self {
        Self {
            variant,
            kernel: variant.kernel(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Counts `'\n'` bytes in `region`.
    #[inline]
    pub fn count_lines(&self, region: &[u8]) -> usize {
        // SAFETY: `kernel` was bound for a variant `cpu_features()` supports.
        unsafe { (self.kernel)(region) }
    }
}

impl Default for LineCounter {
    fn default() -> Self {
        *line_counter()
    }
}

/// Features of the running CPU, probed once per process.
pub fn cpu_features() -> CpuFeatures {
    *CPU_FEATURES
}

/// The process-wide counter bound on first use.
pub fn line_counter() -> &'static LineCounter {
    &LINE_COUNTER
}

/// Counts `'\n'` bytes in `region` with the process-wide counter.
#[inline]
pub fn count_lines(region: &[u8]) -> usize {
    LINE_COUNTER.count_lines(region)
}
