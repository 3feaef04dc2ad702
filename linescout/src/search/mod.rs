/// Parallel search built on the walker, the handoff queue and the line counter.
///
/// [`search`] runs the whole pipeline. The pieces are public for callers that
/// want to drive them directly:
///
/// - [`PatternMatcher`] finds byte ranges in a buffer;
/// - [`LineCursor`] turns increasing offsets into line numbers;
/// - [`FileProcessor`] reads one file and produces its [`crate::FileResult`].
pub mod cursor;
pub mod engine;
pub mod matcher;
pub mod processor;

pub use cursor::LineCursor;
pub use engine::{globber_for, search};
pub use matcher::PatternMatcher;
pub use processor::FileProcessor;
