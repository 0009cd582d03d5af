use crate::config::BackupConfig;
use crate::error::IncbakError;
use crate::filter;
use crate::signal::StopSignal;
use crate::staleness::needs_copy;
use crate::utils::{copy_timestamps, format_size, relative_destination, temp_copy_path};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// A failure attributed to a single path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub path: PathBuf,
    pub message: String,
}

impl RunError {
    fn from_error(path: &Path, error: &IncbakError) -> Self {
        Self {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}

/// Outcome of one pass over the source tree
#[derive(Debug, Clone)]
pub struct RunResult {
    pub files_copied: usize,
    pub bytes_copied: u64,
    pub errors: Vec<RunError>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// False if the pass was cancelled before the walk finished
    pub completed: bool,
}

impl RunResult {
    pub fn new() -> Self {
        let now = Local::now();
        Self {
            files_copied: 0,
            bytes_copied: 0,
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
            completed: false,
        }
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn summary(&self) -> String {
        let files = if self.files_copied == 1 {
            "1 file copied".to_string()
        } else {
            format!("{} files copied", self.files_copied)
        };

        let mut summary = format!("{files} ({})", format_size(self.bytes_copied));
        if !self.errors.is_empty() {
            summary.push_str(&format!(", {} error(s)", self.errors.len()));
        }
        if !self.completed {
            summary.push_str(", cancelled");
        }
        summary
    }

    fn finish(mut self, completed: bool) -> Self {
        self.completed = completed;
        self.finished_at = Local::now();
        self
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-file notifications emitted while a pass is in progress
#[derive(Debug)]
pub enum SyncEvent<'a> {
    Copied { source: &'a Path, destination: &'a Path },
    Failed(&'a RunError),
}

/// Mirror new and modified files from the source root into the backup root.
///
/// The stop signal is checked before every file; a copy that has started
/// always runs to completion. Only an unreadable source root ends the pass
/// with an error, every other failure is recorded and the walk continues.
pub fn synchronize(
    config: &BackupConfig,
    stop: &StopSignal,
    on_event: &mut dyn FnMut(SyncEvent<'_>),
) -> RunResult {
    let mut result = RunResult::new();
    let source_root = config.source_root.as_path();

    info!(
        source = %source_root.display(),
        backup = %config.backup_root.display(),
        "Starting backup pass"
    );

    if let Err(source) = fs::read_dir(source_root) {
        let failure = IncbakError::SourceRootUnreadable {
            path: source_root.to_path_buf(),
            source,
        };
        record_failure(&mut result, source_root, &failure, on_event);
        return result.finish(true);
    }

    let mut walker = Walker::new(config);

    for entry in WalkDir::new(source_root).sort_by_file_name() {
        if stop.is_requested() {
            info!(
                files_copied = result.files_copied,
                "Stop requested, ending backup pass early"
            );
            return result.finish(false);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(source_root).to_path_buf();
                if e.depth() == 0 {
                    let failure = IncbakError::SourceRootUnreadable {
                        path: path.clone(),
                        source: e.into(),
                    };
                    record_failure(&mut result, &path, &failure, on_event);
                    return result.finish(true);
                }
                let failure = IncbakError::FileCopyFailed {
                    path: path.clone(),
                    source: e.into(),
                };
                record_failure(&mut result, &path, &failure, on_event);
                continue;
            }
        };

        if !is_copyable_file(&entry) {
            continue;
        }

        walker.process(entry.path(), &mut result, on_event);
    }

    info!(
        files_copied = result.files_copied,
        errors = result.errors.len(),
        "Backup pass finished"
    );
    result.finish(true)
}

/// Regular files, and symlinks that resolve to regular files
fn is_copyable_file(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    file_type.is_symlink()
        && fs::metadata(entry.path())
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
}

fn record_failure(
    result: &mut RunResult,
    path: &Path,
    failure: &IncbakError,
    on_event: &mut dyn FnMut(SyncEvent<'_>),
) {
    if failure.is_recoverable() {
        warn!("{failure}");
    } else {
        error!("{failure}");
    }
    let run_error = RunError::from_error(path, failure);
    on_event(SyncEvent::Failed(&run_error));
    result.errors.push(run_error);
}

/// Per-pass state for mapping and copying individual files
struct Walker<'c> {
    config: &'c BackupConfig,
    created_dirs: HashSet<PathBuf>,
    failed_dirs: HashSet<PathBuf>,
}

impl<'c> Walker<'c> {
    fn new(config: &'c BackupConfig) -> Self {
        Self {
            config,
            created_dirs: HashSet::new(),
            failed_dirs: HashSet::new(),
        }
    }

    fn process(
        &mut self,
        source: &Path,
        result: &mut RunResult,
        on_event: &mut dyn FnMut(SyncEvent<'_>),
    ) {
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        if !filter::matches(&file_name, &self.config.extension_filters) {
            debug!(path = %source.display(), "Skipping filtered file");
            return;
        }

        let Some(destination) =
            relative_destination(&self.config.source_root, &self.config.backup_root, source)
        else {
            return;
        };

        if let Some(parent) = destination.parent() {
            if let Err(failure) = self.ensure_dir(parent) {
                if let Some(failure) = failure {
                    record_failure(result, source, &failure, on_event);
                }
                return;
            }
        }

        match needs_copy(source, &destination) {
            Ok(false) => {
                debug!(path = %source.display(), "Backup is up to date");
                return;
            }
            Ok(true) => {}
            Err(e) => {
                let failure = IncbakError::FileCopyFailed {
                    path: source.to_path_buf(),
                    source: e,
                };
                record_failure(result, source, &failure, on_event);
                return;
            }
        }

        match copy_file_to_backup(source, &destination) {
            Ok(bytes) => {
                result.files_copied += 1;
                result.bytes_copied += bytes;
                debug!(
                    source = %source.display(),
                    destination = %destination.display(),
                    "Backed up file"
                );
                on_event(SyncEvent::Copied {
                    source,
                    destination: &destination,
                });
            }
            Err(failure) => {
                record_failure(result, source, &failure, on_event);
            }
        }
    }

    /// Create `dir` once per pass.
    ///
    /// `Err(Some(_))` reports a fresh failure; `Err(None)` means the directory
    /// already failed for an earlier file and was reported then.
    fn ensure_dir(&mut self, dir: &Path) -> std::result::Result<(), Option<IncbakError>> {
        if self.created_dirs.contains(dir) {
            return Ok(());
        }
        if self.failed_dirs.contains(dir) {
            return Err(None);
        }

        match fs::create_dir_all(dir) {
            Ok(()) => {
                self.created_dirs.insert(dir.to_path_buf());
                Ok(())
            }
            Err(source) => {
                self.failed_dirs.insert(dir.to_path_buf());
                Err(Some(IncbakError::DirectoryCreateFailed {
                    path: dir.to_path_buf(),
                    source,
                }))
            }
        }
    }
}

/// Copy one file with its modification time, replacing `destination` atomically.
///
/// Returns the number of bytes copied.
fn copy_file_to_backup(source: &Path, destination: &Path) -> crate::Result<u64> {
    let temp_path = temp_copy_path(destination);

    let copied = fs::copy(source, &temp_path)
        .and_then(|bytes| copy_timestamps(source, &temp_path).map(|_| bytes))
        .and_then(|bytes| fs::rename(&temp_path, destination).map(|_| bytes));

    copied.map_err(|source_err| {
        let _ = fs::remove_file(&temp_path);
        IncbakError::FileCopyFailed {
            path: source.to_path_buf(),
            source: source_err,
        }
    })
}
