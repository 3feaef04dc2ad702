use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{ScanError, ScanResult};
use crate::filters::DEFAULT_EXCLUDED_DIRS;
use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Configuration for a scan.
///
/// # Configuration Locations
///
/// Files are layered, later ones overriding earlier ones:
/// 1. Global `$XDG_CONFIG_HOME/linescout/config.yaml`
/// 2. Local `.linescout.yaml` in the current directory
/// 3. Custom config file given with `--config`
///
/// Command-line values are applied last through [`ScanConfig::merge_with_cli`].
/// Only values actually given on the command line override the files.
///
/// # Configuration Format
///
/// ```yaml
/// # Search patterns (literal or regex)
/// patterns: ["TODO", "FIXME"]
///
/// # Where to start
/// roots: ["src", "tests"]
/// recurse_subdirs: true
///
/// # Only scan these extensions
/// file_extensions: ["rs", "toml"]
///
/// # File name globs to skip
/// ignore_files: ["*.min.js"]
///
/// # Directory name globs, or path globs when they contain '/'
/// exclude_dirs: [".git", "target", "**/generated/out"]
///
/// ignore_case: false
/// stats_only: false
/// thread_count: 8
/// queue_capacity: 1024
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// The search patterns; a match of any of them counts
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Files or directories to scan, in order
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,

    /// Whether to descend below the roots
    #[serde(default = "default_true")]
    pub recurse_subdirs: bool,

    /// Optional list of file extensions to include (e.g., ["rs", "toml"])
    /// If None, all non-binary file extensions are included
    #[serde(default)]
    pub file_extensions: Option<Vec<String>>,

    /// Glob patterns matched against file names to skip
    #[serde(default)]
    pub ignore_files: Vec<String>,

    /// Glob patterns for directories whose subtree is skipped
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    #[serde(default)]
    pub ignore_case: bool,

    /// Whether to only show statistics instead of individual matches
    #[serde(default)]
    pub stats_only: bool,

    /// Number of scanning worker threads
    /// Defaults to number of CPU cores if not specified
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Paths the walker may queue ahead of the workers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_true() -> bool {
    true
}

fn default_exclude_dirs() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect()
}

pub fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_queue_capacity() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_QUEUE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            roots: default_roots(),
            recurse_subdirs: true,
            file_extensions: None,
            ignore_files: Vec::new(),
            exclude_dirs: default_exclude_dirs(),
            ignore_case: false,
            stats_only: false,
            thread_count: default_thread_count(),
            queue_capacity: default_queue_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl ScanConfig {
    /// Default configuration searching `roots` for `patterns`.
    pub fn new<P, R>(patterns: P, roots: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<PathBuf>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Loads configuration from the default locations
    pub fn load() -> ScanResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    ///
    /// The specific file must exist; the default locations are optional.
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("linescout").join("config.yaml")),
            Some(PathBuf::from(".linescout.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ScanError::config_error(e.to_string()))
    }

    /// Merges CLI arguments with configuration file values
    ///
    /// Every value set in `cli` wins; unset ones keep the file value.
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(patterns) = cli.patterns.filter(|p| !p.is_empty()) {
            self.patterns = patterns;
        }
        if let Some(roots) = cli.roots.filter(|r| !r.is_empty()) {
            self.roots = roots;
        }
        if let Some(recurse) = cli.recurse_subdirs {
            self.recurse_subdirs = recurse;
        }
        if cli.file_extensions.is_some() {
            self.file_extensions = cli.file_extensions;
        }
        if let Some(ignore_files) = cli.ignore_files {
            self.ignore_files = ignore_files;
        }
        if let Some(exclude_dirs) = cli.exclude_dirs {
            self.exclude_dirs = exclude_dirs;
        }
        if let Some(ignore_case) = cli.ignore_case {
            self.ignore_case = ignore_case;
        }
        if let Some(stats_only) = cli.stats_only {
            self.stats_only = stats_only;
        }
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if let Some(capacity) = cli.queue_capacity {
            self.queue_capacity = capacity;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }
}

/// Values given on the command line; `None` means not given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub patterns: Option<Vec<String>>,
    pub roots: Option<Vec<PathBuf>>,
    pub recurse_subdirs: Option<bool>,
    pub file_extensions: Option<Vec<String>>,
    pub ignore_files: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
    pub ignore_case: Option<bool>,
    pub stats_only: Option<bool>,
    pub thread_count: Option<NonZeroUsize>,
    pub queue_capacity: Option<NonZeroUsize>,
    pub log_level: Option<String>,
}
