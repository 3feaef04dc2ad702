use memchr::memchr;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tracing::{trace, warn};

use super::cursor::LineCursor;
use super::matcher::PatternMatcher;
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::results::{FileResult, Match};

// Constants for file processing
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Bytes of one file, either read into memory or mapped
enum FileBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Owned(bytes) => bytes.as_slice(),
            FileBytes::Mapped(mmap) => &mmap[..],
        }
    }
}

/// Reads files and turns pattern matches into line-numbered [`Match`]es
#[derive(Debug, Clone)]
pub struct FileProcessor {
    matcher: PatternMatcher,
    metrics: ScanMetrics,
}

impl FileProcessor {
    /// Creates a new FileProcessor sharing the matcher's metrics
    pub fn new(matcher: PatternMatcher) -> Self {
        let metrics = matcher.metrics().clone();
        Self { matcher, metrics }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    fn read_small_file(&self, path: &Path) -> ScanResult<FileBytes> {
        trace!("Using simple file processing for: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| ScanError::from_io(path, e))?;
        Ok(FileBytes::Owned(bytes))
    }

    fn read_file_buffered(&self, path: &Path, size_hint: u64) -> ScanResult<FileBytes> {
        trace!("Using buffered file processing for: {}", path.display());
        let file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = Vec::with_capacity(size_hint as usize);
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ScanError::from_io(path, e))?;
        Ok(FileBytes::Owned(bytes))
    }

    fn read_mmap_file(&self, path: &Path) -> ScanResult<FileBytes> {
        trace!("Using memory mapping for: {}", path.display());
        let file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
        // SAFETY: the mapping is only read, and lives no longer than this scan.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ScanError::from_io(path, e))?;
        Ok(FileBytes::Mapped(mmap))
    }

    fn read(&self, path: &Path) -> ScanResult<FileBytes> {
        match path.metadata() {
            Ok(metadata) => {
                let size = metadata.len();
                self.metrics.record_file_processing(size);

                if size < SMALL_FILE_THRESHOLD {
                    self.read_small_file(path)
                } else if size >= LARGE_FILE_THRESHOLD {
                    self.read_mmap_file(path)
                } else {
                    self.read_file_buffered(path, size)
                }
            }
            Err(e) => {
                warn!("Failed to get metadata for {}: {}", path.display(), e);
                self.read_file_buffered(path, 0)
            }
        }
    }

    /// Processes a file and returns any matches found
    pub fn process_file(&self, path: &Path) -> ScanResult<FileResult> {
        trace!("Processing file: {}", path.display());

        let bytes = self.read(path)?;
        let matches = if bytes.is_empty() {
            Vec::new()
        } else {
            self.find_matches(&bytes)
        };

        Ok(FileResult {
            path: path.to_path_buf(),
            matches,
        })
    }

    /// Finds matches in `buffer` and numbers them by line
    ///
    /// Each line is located and decoded once, however many matches it holds,
    /// and those matches share its text.
    pub fn find_matches(&self, buffer: &[u8]) -> Vec<Match> {
        let ranges = self.matcher.find_matches(buffer);
        if ranges.is_empty() {
            return Vec::new();
        }

        let mut cursor = LineCursor::new(buffer);
        let mut line: Option<LineText> = None;
        let mut matches = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            let line_number = cursor.line_of(start);
            let current = match line.take() {
                Some(current) if start < current.newline => current,
                _ => LineText::new(buffer, cursor.line_start()),
            };

            // Columns stop at the line end, before any `\r`
            let raw_start = (start - current.start).min(current.len);
            let raw_end = (end - current.start).min(current.len);
            matches.push(Match {
                line_number,
                line_content: Arc::clone(&current.text),
                start: current.column(raw_start, false),
                end: current.column(raw_end, true),
            });
            line = Some(current);
        }

        self.metrics.record_lines_resolved(matches.len() as u64);
        matches
    }
}

/// Length of U+FFFD in UTF-8
const REPLACEMENT_LEN: usize = char::REPLACEMENT_CHARACTER.len_utf8();

/// An invalid UTF-8 sequence and where its replacement sits in the text
#[derive(Debug)]
struct InvalidRun {
    raw_start: usize,
    raw_end: usize,
    decoded: usize,
}

/// One line of the buffer, decoded once and shared by its matches
#[derive(Debug)]
struct LineText {
    /// Buffer offset of the first byte
    start: usize,
    /// Bytes in the line, without the `\n` or a trailing `\r`
    len: usize,
    /// Buffer offset of the terminating `\n`, or the buffer length
    newline: usize,
    text: Arc<str>,
    invalid: Vec<InvalidRun>,
}

impl LineText {
    fn new(buffer: &[u8], start: usize) -> Self {
        let newline = memchr(b'\n', &buffer[start..]).map_or(buffer.len(), |n| start + n);
        let mut bytes = &buffer[start..newline];
        if let Some(stripped) = bytes.strip_suffix(b"\r") {
            bytes = stripped;
        }
        let (text, invalid) = decode_lossy(bytes);
        Self {
            start,
            len: bytes.len(),
            newline,
            text,
            invalid,
        }
    }

    /// Maps a byte offset in the raw line to one in `text`.
    ///
    /// An offset inside an invalid sequence lands before its replacement
    /// character, or after it with `round_up`.
    fn column(&self, raw: usize, round_up: bool) -> usize {
        let before = self.invalid.partition_point(|run| run.raw_start <= raw);
        let Some(run) = before.checked_sub(1).map(|i| &self.invalid[i]) else {
            return raw;
        };
        if raw >= run.raw_end {
            run.decoded + REPLACEMENT_LEN + (raw - run.raw_end)
        } else if raw > run.raw_start && round_up {
            run.decoded + REPLACEMENT_LEN
        } else {
            run.decoded
        }
    }
}

/// Decodes like [`String::from_utf8_lossy`], also recording where each
/// replacement character went.
fn decode_lossy(bytes: &[u8]) -> (Arc<str>, Vec<InvalidRun>) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (Arc::from(text), Vec::new());
    }

    let mut text = String::with_capacity(bytes.len() + REPLACEMENT_LEN);
    let mut invalid = Vec::new();
    let mut raw = 0;
    while raw < bytes.len() {
        let rest = &bytes[raw..];
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                break;
            }
            Err(e) => {
                let valid_len = e.valid_up_to();
                text.push_str(std::str::from_utf8(&rest[..valid_len]).unwrap_or_default());
                let bad_len = e.error_len().unwrap_or(rest.len() - valid_len);
                invalid.push(InvalidRun {
                    raw_start: raw + valid_len,
                    raw_end: raw + valid_len + bad_len,
                    decoded: text.len(),
                });
                text.push(char::REPLACEMENT_CHARACTER);
                raw += valid_len + bad_len;
            }
        }
    }
    (Arc::from(text), invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn processor(patterns: &[&str]) -> FileProcessor {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        FileProcessor::new(PatternMatcher::new(&patterns, false).unwrap())
    }

    #[test]
    fn test_line_numbers_and_columns() {
        let processor = processor(&["needle"]);
        let matches = processor.find_matches(b"hay\nhay needle hay\n\nneedle\n");

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(&*matches[0].line_content, "hay needle hay");
        assert_eq!((matches[0].start, matches[0].end), (4, 10));
        assert_eq!(matches[1].line_number, 4);
        assert_eq!((matches[1].start, matches[1].end), (0, 6));
    }

    #[test]
    fn test_crlf_is_trimmed_from_line_content() {
        let processor = processor(&["b"]);
        let matches = processor.find_matches(b"a\r\nb\r\nc");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(&*matches[0].line_content, "b");
    }

    #[test]
    fn test_multiline_match_end_clamped_to_line() {
        let processor = processor(&[r"two\nthree"]);
        let matches = processor.find_matches(b"one two\nthree");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line_number, 1);
        assert_eq!((matches[0].start, matches[0].end), (4, 7));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let processor = processor(&["key"]);
        let matches = processor.find_matches(b"\xff key\n");
        assert_eq!(matches.len(), 1);
        assert_eq!(&*matches[0].line_content, "\u{FFFD} key");
    }

    #[test]
    fn test_columns_index_decoded_line() {
        let processor = processor(&["key"]);
        let buffer = b"a\xff\xfe key \xc3 key\xe2\x82\n";
        let matches = processor.find_matches(buffer);

        assert_eq!(matches.len(), 2);
        assert_eq!(
            &*matches[0].line_content,
            String::from_utf8_lossy(&buffer[..buffer.len() - 1])
        );
        for m in &matches {
            assert_eq!(&m.line_content[m.start..m.end], "key");
        }
    }

    #[test]
    fn test_long_line_matches_share_line_text() {
        let processor = processor(&["hit"]);
        let line = "hit.....".repeat(25_000);
        let buffer = format!("first\n{line}\nlast hit\n");
        let matches = processor.find_matches(buffer.as_bytes());

        assert_eq!(matches.len(), 25_001);
        let long = &matches[..25_000];
        assert!(long.iter().all(|m| m.line_number == 2));
        assert!(long
            .iter()
            .all(|m| Arc::ptr_eq(&m.line_content, &long[0].line_content)));
        assert_eq!(long[0].line_content.len(), line.len());
        assert_eq!((long[24_999].start, long[24_999].end), (199_992, 199_995));

        let last = &matches[25_000];
        assert_eq!(last.line_number, 3);
        assert_eq!(&*last.line_content, "last hit");
        assert_eq!((last.start, last.end), (5, 8));
    }

    #[test]
    fn test_empty_file_has_no_matches() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("empty.txt");
        File::create(&file_path).unwrap();

        let result = processor(&["x"]).process_file(&file_path).unwrap();
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let dir = tempdir().unwrap();
        let result = processor(&["x"]).process_file(&dir.path().join("gone.txt"));
        assert!(matches!(result, Err(ScanError::FileNotFound(_))));
    }

    #[test]
    fn test_each_read_strategy_gives_same_line_numbers() {
        let dir = tempdir().unwrap();
        let line = "This is a test line with pattern_123 and another pattern_456\n";

        // Sizes below, between and above the strategy thresholds
        for repeat in [10usize, 1_000, 180_000] {
            let file_path = dir.path().join(format!("sized_{repeat}.txt"));
            let mut file = File::create(&file_path).unwrap();
            for _ in 0..repeat {
                file.write_all(line.as_bytes()).unwrap();
            }
            drop(file);

            let processor = processor(&[r"pattern_\d+"]);
            let result = processor.process_file(&file_path).unwrap();

            assert_eq!(result.matches.len(), 2 * repeat);
            let first = &result.matches[0];
            let last = &result.matches[result.matches.len() - 1];
            assert_eq!(first.line_number, 1);
            assert_eq!(last.line_number, repeat);
            assert_eq!(&last.line_content[last.start..last.end], "pattern_456");
            assert!(result
                .matches
                .windows(2)
                .all(|w| w[0].line_number <= w[1].line_number));
        }
    }

    #[test]
    fn test_varying_line_lengths() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("boundary_test.txt");
        let mut content = String::new();
        for i in 0..2000 {
            content.push_str(&format!("Line {} with pattern_split", i));
            if i % 3 == 0 {
                content.push_str(" extra text to vary line length");
            }
            content.push('\n');
        }
        std::fs::write(&file_path, content).unwrap();

        let result = processor(&["pattern_split"])
            .process_file(&file_path)
            .unwrap();

        assert_eq!(result.matches.len(), 2000);
        for (i, m) in result.matches.iter().enumerate() {
            assert_eq!(m.line_number, i + 1);
            assert!(m.line_content.starts_with(&format!("Line {} ", i)));
        }
    }

    #[test]
    fn test_metrics_record_strategy_and_lines() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("small.txt");
        std::fs::write(&file_path, "a x\nb x\n").unwrap();

        let processor = processor(&["x"]);
        processor.process_file(&file_path).unwrap();

        let stats = processor.metrics().get_stats();
        assert_eq!(stats.small_files, 1);
        assert_eq!(stats.bytes_scanned, 8);
        assert_eq!(stats.lines_resolved, 2);
    }
}
