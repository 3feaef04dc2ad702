/// Concrete file and directory policies plugged into the walker.
///
/// [`FileTypeFilter`] decides which regular files are worth scanning and
/// [`DirExclusionFilter`] decides which subtrees are pruned. Both are built
/// once from configuration and shared read-only across the walk.
use glob::Pattern;
use std::ffi::OsStr;
use std::path::Path;

use crate::errors::{ScanError, ScanResult};
use crate::walker::{DirExclusion, FileInclusion};

/// Version-control metadata directories pruned unless configured otherwise.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".bzr",
    "CVS",
    "_darcs",
    "RCS",
    "SCCS",
    "autom4te.cache",
];

/// Checks if a file should be included in the search based on its extension
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => {
            if let Some(ext) = path.extension() {
                if let Some(ext_str) = ext.to_str() {
                    return exts
                        .iter()
                        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext_str));
                }
            }
            false
        }
    }
}

/// Checks if a file is likely to be binary
pub fn is_likely_binary(path: &Path) -> bool {
    // Common binary file extensions
    const BINARY_EXTENSIONS: &[&str] = &[
        "exe", "dll", "so", "dylib", "a", "lib", "bin", "obj", "o", "class", "jar", "war", "ear",
        "pyc", "png", "jpg", "jpeg", "gif", "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx",
        "zip", "tar", "gz", "bz2", "xz", "7z", "rar",
    ];

    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return BINARY_EXTENSIONS
                .iter()
                .any(|&bin_ext| bin_ext.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

fn compile_globs(patterns: &[String]) -> ScanResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ScanError::config_error(format!("bad glob '{p}': {e}")))
        })
        .collect()
}

/// Decides which files are scanned, by name.
#[derive(Debug, Clone, Default)]
pub struct FileTypeFilter {
    extensions: Option<Vec<String>>,
    ignore_files: Vec<Pattern>,
}

impl FileTypeFilter {
    /// `extensions` restricts scanning to those extensions when given;
    /// `ignore_files` are glob patterns matched against the file name.
    pub fn new(extensions: Option<Vec<String>>, ignore_files: &[String]) -> ScanResult<Self> {
        Ok(Self {
            extensions,
            ignore_files: compile_globs(ignore_files)?,
        })
    }

    /// Determines if a file should be included in the search
    pub fn accepts(&self, file_name: &OsStr) -> bool {
        let path = Path::new(file_name);
        if is_likely_binary(path) || !has_valid_extension(path, &self.extensions) {
            return false;
        }
        let name = file_name.to_string_lossy();
        !self.ignore_files.iter().any(|p| p.matches(&name))
    }
}

impl FileInclusion for FileTypeFilter {
    fn should_scan(&self, file_name: &OsStr) -> bool {
        self.accepts(file_name)
    }
}

/// Prunes directories by name or path.
///
/// A pattern without `/` is matched against the directory name alone. A
/// pattern containing `/` is matched against the whole path with separators
/// normalised to `/`, so `**/build/out` works on every platform.
#[derive(Debug, Clone, Default)]
pub struct DirExclusionFilter {
    by_name: Vec<Pattern>,
    by_path: Vec<Pattern>,
}

impl DirExclusionFilter {
    pub fn new(patterns: &[String]) -> ScanResult<Self> {
        let (by_path, by_name): (Vec<String>, Vec<String>) =
            patterns.iter().cloned().partition(|p| p.contains('/'));
        Ok(Self {
            by_name: compile_globs(&by_name)?,
            by_path: compile_globs(&by_path)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.by_path.is_empty()
    }

    pub fn excludes(&self, path: &Path, dir_name: &OsStr) -> bool {
        let name = dir_name.to_string_lossy();
        if self.by_name.iter().any(|p| p.matches(&name)) {
            return true;
        }
        if self.by_path.is_empty() {
            return false;
        }
        let normalized = path.to_string_lossy().replace('\\', "/");
        self.by_path.iter().any(|p| p.matches(&normalized))
    }
}

impl DirExclusion for DirExclusionFilter {
    fn should_exclude(&self, path: &Path, dir_name: &OsStr) -> bool {
        self.excludes(path, dir_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_has_valid_extension() {
        let path = Path::new("test.rs");
        let extensions = Some(vec!["rs".to_string()]);
        assert!(has_valid_extension(path, &extensions));

        let path = Path::new("test.py");
        assert!(!has_valid_extension(path, &extensions));

        let path = Path::new("test.RS"); // Test case insensitivity
        assert!(has_valid_extension(path, &extensions));

        let path = Path::new("test"); // No extension
        assert!(!has_valid_extension(path, &extensions));

        let dotted = Some(vec![".rs".to_string()]);
        assert!(has_valid_extension(Path::new("lib.rs"), &dotted));

        assert!(has_valid_extension(Path::new("test.rs"), &None));
    }

    #[test]
    fn test_is_likely_binary() {
        assert!(is_likely_binary(Path::new("test.exe")));
        assert!(is_likely_binary(Path::new("test.dll")));
        assert!(is_likely_binary(Path::new("test.png")));
        assert!(is_likely_binary(Path::new("test.PDF"))); // Test case insensitivity
        assert!(!is_likely_binary(Path::new("test.rs")));
        assert!(!is_likely_binary(Path::new("test.txt")));
        assert!(!is_likely_binary(Path::new("test")));
    }

    #[test]
    fn test_file_type_filter() {
        let filter = FileTypeFilter::new(Some(strings(&["txt"])), &[]).unwrap();
        assert!(filter.should_scan(OsStr::new("a.txt")));
        assert!(!filter.should_scan(OsStr::new("b.log")));
        assert!(filter.should_scan(OsStr::new("c.TXT")));

        let filter = FileTypeFilter::new(None, &strings(&["*.min.js", "test_[0-4].txt"])).unwrap();
        assert!(filter.should_scan(OsStr::new("app.js")));
        assert!(!filter.should_scan(OsStr::new("app.min.js")));
        assert!(!filter.should_scan(OsStr::new("test_3.txt")));
        assert!(filter.should_scan(OsStr::new("test_5.txt")));
        assert!(!filter.should_scan(OsStr::new("image.png")));
    }

    #[test]
    fn test_file_type_filter_rejects_bad_glob() {
        let result = FileTypeFilter::new(None, &strings(&["[unclosed"]));
        assert!(matches!(result, Err(ScanError::ConfigError(_))));
    }

    #[test]
    fn test_dir_exclusion_by_name() {
        let filter = DirExclusionFilter::new(&strings(&["target", "node_*"])).unwrap();
        assert!(filter.should_exclude(Path::new("proj/target"), OsStr::new("target")));
        assert!(filter.should_exclude(Path::new("web/node_modules"), OsStr::new("node_modules")));
        assert!(!filter.should_exclude(Path::new("proj/src"), OsStr::new("src")));
        assert!(!filter.should_exclude(Path::new("proj/targets"), OsStr::new("targets")));
    }

    #[test]
    fn test_dir_exclusion_by_path() {
        let filter = DirExclusionFilter::new(&strings(&["**/build/out"])).unwrap();
        assert!(filter.should_exclude(Path::new("a/build/out"), OsStr::new("out")));
        assert!(!filter.should_exclude(Path::new("a/dist/out"), OsStr::new("out")));
        assert!(!filter.should_exclude(Path::new("a/build"), OsStr::new("build")));
    }

    #[test]
    fn test_default_exclusions() {
        let filter = DirExclusionFilter::new(&crate::ScanConfig::default().exclude_dirs).unwrap();
        assert!(!filter.is_empty());
        for dir in DEFAULT_EXCLUDED_DIRS {
            assert!(filter.should_exclude(Path::new(dir), OsStr::new(dir)), "{dir}");
        }
        assert!(!filter.should_exclude(Path::new(".github"), OsStr::new(".github")));
        assert!(DirExclusionFilter::new(&[]).unwrap().is_empty());
    }
}
