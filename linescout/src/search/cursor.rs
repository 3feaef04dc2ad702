//! Forward-only conversion of byte offsets to line numbers.
use memchr::memrchr;

use crate::simd::{line_counter, LineCounter};

/// Turns increasing byte offsets within one buffer into 1-based line numbers.
///
/// Each query only counts the newlines between the previous query and this
/// one, so resolving every match in a file costs one pass over the bytes in
/// total. Queries must not go backwards: debug builds assert it, release builds
/// answer with the current line, which is wrong but never reads out of bounds.
#[derive(Debug)]
pub struct LineCursor<'a> {
    buffer: &'a [u8],
    counter: LineCounter,
    prev_end: usize,
    line: usize,
    line_start: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_counter(buffer, *line_counter())
    }

    /// Uses a specific counter variant instead of the process-wide binding.
    pub fn with_counter(buffer: &'a [u8], counter: LineCounter) -> Self {
        Self {
            buffer,
            counter,
            prev_end: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Line holding the byte at `offset`. An offset past the end is clamped.
    pub fn line_of(&mut self, offset: usize) -> usize {
        let offset = offset.min(self.buffer.len());
        debug_assert!(
            offset >= self.prev_end,
            "line query went backwards: {offset} < {}",
            self.prev_end
        );
        if offset > self.prev_end {
            let region = &self.buffer[self.prev_end..offset];
            let newlines = self.counter.count_lines(region);
            if newlines > 0 {
                if let Some(last) = memrchr(b'\n', region) {
                    self.line_start = self.prev_end + last + 1;
                }
            }
            self.line += newlines;
            self.prev_end = offset;
        }
        self.line
    }

    /// Offset where the line of the latest query begins.
    pub fn line_start(&self) -> usize {
        self.line_start
    }

    /// Offset the next query counts from.
    pub fn position(&self) -> usize {
        self.prev_end
    }
}
