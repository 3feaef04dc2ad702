/// Search result types.
///
/// Everything here is plain owned data produced by the workers and aggregated
/// by the engine, and serializes directly for `--json` output.
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::walker::WalkSummary;

/// Represents a single match in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// The 1-based line number where the match starts
    pub line_number: usize,
    /// The content of the line containing the match, lossily decoded and
    /// shared by every match on that line
    pub line_content: Arc<str>,
    /// Byte offset of the match start within `line_content`
    pub start: usize,
    /// Byte offset of the match end within `line_content`, clamped to the line end
    pub end: usize,
}

/// Represents all matches found in a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    /// The path to the file
    pub path: PathBuf,
    /// All matches found in the file, in file order
    pub matches: Vec<Match>,
}

/// Represents the complete search results
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutput {
    /// Results per file with at least one match, sorted by path
    pub file_results: Vec<FileResult>,
    /// Total number of matches found
    pub total_matches: usize,
    /// Total number of files with matches
    pub files_with_matches: usize,
    /// Total number of files the workers read
    pub files_scanned: usize,
    /// What the directory walk found
    pub walk: WalkSummary,
}

impl SearchOutput {
    /// Creates a new empty search result
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a file result to the search results
    pub fn add_file_result(&mut self, file_result: FileResult) {
        if file_result.matches.is_empty() {
            return;
        }
        self.total_matches += file_result.matches.len();
        self.files_with_matches += 1;
        self.file_results.push(file_result);
    }

    /// Orders file results by path so output does not depend on worker timing.
    pub fn sort_by_path(&mut self) {
        self.file_results.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn has_matches(&self) -> bool {
        self.total_matches > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(line_number: usize, line_content: &str, start: usize, end: usize) -> Match {
        Match {
            line_number,
            line_content: line_content.into(),
            start,
            end,
        }
    }

    #[test]
    fn test_match_creation() {
        let m = m(42, "Hello, world!", 0, 5);

        assert_eq!(m.line_number, 42);
        assert_eq!(&m.line_content[m.start..m.end], "Hello");
    }

    #[test]
    fn test_search_output_new() {
        let result = SearchOutput::new();
        assert_eq!(result.total_matches, 0);
        assert_eq!(result.files_scanned, 0);
        assert_eq!(result.files_with_matches, 0);
        assert!(result.file_results.is_empty());
        assert!(!result.has_matches());
    }

    #[test]
    fn test_add_file_result() {
        let mut result = SearchOutput::new();

        result.add_file_result(FileResult {
            path: PathBuf::from("test1.txt"),
            matches: vec![m(1, "Hello", 0, 5), m(2, "Hello again", 0, 5)],
        });
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.files_with_matches, 1);

        // Files without matches are not kept
        result.add_file_result(FileResult {
            path: PathBuf::from("test2.txt"),
            matches: vec![],
        });
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.files_with_matches, 1);
        assert_eq!(result.file_results.len(), 1);
        assert!(result.has_matches());
    }

    #[test]
    fn test_sort_by_path() {
        let mut result = SearchOutput::new();
        for name in ["b.txt", "c/a.txt", "a.txt"] {
            result.add_file_result(FileResult {
                path: PathBuf::from(name),
                matches: vec![m(1, "x", 0, 1)],
            });
        }
        result.sort_by_path();

        let paths: Vec<_> = result.file_results.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("c/a.txt")
            ]
        );
    }

    #[test]
    fn test_serializes_to_json() {
        let mut result = SearchOutput::new();
        result.files_scanned = 3;
        result.add_file_result(FileResult {
            path: PathBuf::from("src/lib.rs"),
            matches: vec![m(7, "// TODO: split", 3, 7)],
        });

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["total_matches"], 1);
        assert_eq!(json["files_scanned"], 3);
        assert_eq!(json["file_results"][0]["matches"][0]["line_number"], 7);
        assert_eq!(json["walk"]["files_found"], 0);
    }
}
