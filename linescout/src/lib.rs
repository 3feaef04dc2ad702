pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod queue;
pub mod results;
pub mod search;
pub mod simd;
pub mod walker;

pub use config::{CliOverrides, ScanConfig};
pub use errors::{ScanError, ScanResult};
pub use filters::{DirExclusionFilter, FileTypeFilter};
pub use queue::{file_queue, FileQueueConsumer, FileQueueProducer};
pub use results::{FileResult, Match, SearchOutput};
pub use search::search;
pub use simd::{count_lines, cpu_features, line_counter, CpuFeatures, LineCounter, Variant};
pub use walker::{DirExclusion, FileInclusion, Globber, WalkSummary};
