//! Directory walker feeding the file queue.
//!
//! The [`Globber`] walks each root depth-first, following symlinks, and pushes
//! every regular file the [`FileInclusion`] predicate accepts onto the queue the
//! moment it is found. Directories are pruned when the [`DirExclusion`]
//! predicate matches them or, with recursion off, when they sit below a root.
//!
//! Failures come in three strengths:
//!
//! - a root that cannot be opened stops the run before anything is walked;
//! - an entry that cannot be read, or vanished mid-walk, is logged and skipped;
//! - an error not tied to any entry stops the walk where it happened.
//!
//! Fatal outcomes are returned from [`Globber::run`] rather than stored
//! anywhere, and the queue is closed on every exit so workers never wait on a
//! walker that has already given up.
use ignore::{DirEntry, Walk, WalkBuilder};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::errors::{ScanError, ScanResult};
use crate::queue::FileQueueProducer;

/// Decides whether a regular file is scanned, by name.
pub trait FileInclusion: Send + Sync {
    fn should_scan(&self, file_name: &OsStr) -> bool;
}

/// Decides whether a directory's subtree is skipped, by path and name.
pub trait DirExclusion: Send + Sync {
    fn should_exclude(&self, path: &Path, dir_name: &OsStr) -> bool;
}

impl<F> FileInclusion for F
where
    F: Fn(&OsStr) -> bool + Send + Sync,
{
    fn should_scan(&self, file_name: &OsStr) -> bool {
        self(file_name)
    }
}

impl<F> DirExclusion for F
where
    F: Fn(&Path, &OsStr) -> bool + Send + Sync,
{
    fn should_exclude(&self, path: &Path, dir_name: &OsStr) -> bool {
        self(path, dir_name)
    }
}

/// What a completed walk found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkSummary {
    /// Files accepted and enqueued
    pub files_found: usize,
    /// Directories whose subtree was skipped
    pub dirs_pruned: usize,
    /// Directories, or entries within them, that could not be read
    pub unreadable_dirs: usize,
}

/// How a walk error is handled
#[derive(Debug, PartialEq, Eq)]
enum WalkFault {
    /// Symlink cycle or dangling symlink; nothing to scan there.
    Ignorable(PathBuf),
    /// An entry could not be opened or listed, or vanished after being listed.
    Unreadable(PathBuf),
    /// No entry to blame; the iteration itself failed.
    Fatal { path: PathBuf, message: String },
}

/// Walks root paths and streams accepted files into the queue
pub struct Globber {
    roots: Vec<PathBuf>,
    recurse_subdirs: bool,
    inclusion: Arc<dyn FileInclusion>,
    exclusion: Arc<dyn DirExclusion>,
}

impl Globber {
    pub fn new(
        roots: Vec<PathBuf>,
        inclusion: Arc<dyn FileInclusion>,
        exclusion: Arc<dyn DirExclusion>,
    ) -> Self {
        Self {
            roots,
            recurse_subdirs: true,
            inclusion,
            exclusion,
        }
    }

    /// Whether to descend below the roots. On by default.
    pub fn recurse_subdirs(mut self, recurse: bool) -> Self {
        self.recurse_subdirs = recurse;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Checks every root can be opened as a directory or a file.
    ///
    /// Returns the first root that cannot.
    pub fn validate_roots(&self) -> ScanResult<()> {
        for root in &self.roots {
            if fs::read_dir(root).is_err() && File::open(root).is_err() {
                return Err(ScanError::invalid_root(root));
            }
        }
        Ok(())
    }

    /// Walks every root in order, pushing accepted files onto `producer`.
    ///
    /// The producer is closed when this returns, whatever the outcome. Nothing
    /// is walked if any root fails validation.
    pub fn run(&self, producer: FileQueueProducer) -> ScanResult<WalkSummary> {
        self.run_with(producer, |root, pruned| self.build_walk(root, pruned))
    }

    /// [`Globber::run`] over whatever walk `walk_for` produces for each root.
    fn run_with<F, I>(&self, mut producer: FileQueueProducer, walk_for: F) -> ScanResult<WalkSummary>
    where
        F: Fn(&Path, Arc<AtomicUsize>) -> I,
        I: IntoIterator<Item = Result<DirEntry, ignore::Error>>,
    {
        let outcome = self.walk_all(&producer, &walk_for);
        producer.close();
        outcome
    }

    fn walk_all<F, I>(&self, producer: &FileQueueProducer, walk_for: &F) -> ScanResult<WalkSummary>
    where
        F: Fn(&Path, Arc<AtomicUsize>) -> I,
        I: IntoIterator<Item = Result<DirEntry, ignore::Error>>,
    {
        self.validate_roots()?;

        let mut summary = WalkSummary::default();
        for root in &self.roots {
            self.walk_root(root, producer, &mut summary, walk_for)?;
        }

        info!(
            "Walk complete: {} files found, {} directories pruned, {} unreadable",
            summary.files_found, summary.dirs_pruned, summary.unreadable_dirs
        );
        Ok(summary)
    }

    /// Depth-first walk of one root. Excluded directories bump `pruned`.
    fn build_walk(&self, root: &Path, pruned: Arc<AtomicUsize>) -> Walk {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(true)
            .max_depth(if self.recurse_subdirs { None } else { Some(1) });

        let exclusion = Arc::clone(&self.exclusion);
        builder.filter_entry(move |entry| {
            let excluded = entry.depth() > 0
                && is_dir(entry)
                && exclusion.should_exclude(entry.path(), entry.file_name());
            if excluded {
                trace!("Excluding directory: {}", entry.path().display());
                pruned.fetch_add(1, Ordering::Relaxed);
            }
            !excluded
        });
        builder.build()
    }

    fn walk_root<F, I>(
        &self,
        root: &Path,
        producer: &FileQueueProducer,
        summary: &mut WalkSummary,
        walk_for: &F,
    ) -> ScanResult<()>
    where
        F: Fn(&Path, Arc<AtomicUsize>) -> I,
        I: IntoIterator<Item = Result<DirEntry, ignore::Error>>,
    {
        debug!("Walking root: {}", root.display());

        // The walker never filters depth 0, so excluded roots are caught here.
        if root.is_dir() && self.exclusion.should_exclude(root, root_name(root)) {
            debug!("Root {} is excluded", root.display());
            summary.dirs_pruned += 1;
            return Ok(());
        }

        let pruned = Arc::new(AtomicUsize::new(0));
        for result in walk_for(root, Arc::clone(&pruned)) {
            match result {
                Ok(entry) => self.visit(entry, producer, summary)?,
                Err(err) => match classify(&err, root) {
                    WalkFault::Ignorable(path) => {
                        trace!("Ignoring {}: {}", path.display(), err);
                    }
                    WalkFault::Unreadable(path) => {
                        warn!("Unable to read \"{}\", skipping: {}", path.display(), err);
                        summary.unreadable_dirs += 1;
                    }
                    WalkFault::Fatal { path, message } => {
                        summary.dirs_pruned += pruned.load(Ordering::Relaxed);
                        return Err(ScanError::traversal_aborted(path, message));
                    }
                },
            }
        }

        summary.dirs_pruned += pruned.load(Ordering::Relaxed);
        Ok(())
    }

    fn visit(
        &self,
        entry: DirEntry,
        producer: &FileQueueProducer,
        summary: &mut WalkSummary,
    ) -> ScanResult<()> {
        let Some(file_type) = entry.file_type() else {
            return Ok(());
        };

        if file_type.is_file() {
            if self.inclusion.should_scan(entry.file_name()) {
                trace!("Enqueueing file: {}", entry.path().display());
                producer
                    .push(entry.into_path())
                    .map_err(|_| ScanError::QueueClosed)?;
                summary.files_found += 1;
            }
        } else if file_type.is_dir() && !self.recurse_subdirs && entry.depth() > 0 {
            // max_depth already keeps the walker out; count it as pruned.
            summary.dirs_pruned += 1;
        }
        Ok(())
    }
}

fn is_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|ft| ft.is_dir())
}

/// Name a root is matched under: its last component, or the path as given
/// for roots like `.` or `/`.
fn root_name(root: &Path) -> &OsStr {
    root.file_name().unwrap_or(root.as_os_str())
}

/// Errors naming an entry only cost that entry; anything else is fatal.
fn classify(err: &ignore::Error, root: &Path) -> WalkFault {
    match fault_path(err) {
        Some(path) if is_loop(err) || is_dangling_symlink(path) => {
            WalkFault::Ignorable(path.to_path_buf())
        }
        Some(path) => WalkFault::Unreadable(path.to_path_buf()),
        None => WalkFault::Fatal {
            path: root.to_path_buf(),
            message: err.to_string(),
        },
    }
}

fn fault_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            fault_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child),
        ignore::Error::Partial(errs) => errs.iter().find_map(fault_path),
        _ => None,
    }
}

fn is_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_loop(err),
        _ => false,
    }
}

fn is_dangling_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) && fs::metadata(path).is_err()
}
