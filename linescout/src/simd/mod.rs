//! SIMD newline counting.
//!
//! Match offsets become line numbers by counting `'\n'` bytes between the
//! previous match and the current one. That count runs once per match, so it
//! is vectorized: [`line_count`] holds the kernels, [`align`] the boundary
//! arithmetic they share, [`popcount`] the mask bit-count, and [`dispatch`]
//! picks a kernel for the running CPU once per process.
pub mod align;
pub mod dispatch;
pub mod line_count;
pub mod popcount;

pub use dispatch::{count_lines, cpu_features, line_counter, CpuFeatures, LineCounter, Variant};
pub use line_count::count_lines_portable;
pub use popcount::{popcount16, popcount16_portable};
