use crate::error::IncbakError;
use crate::Result;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Validate that a path is an existing, readable directory and return its canonical form
pub fn validate_directory(path: &Path, label: &str) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(IncbakError::config_invalid(format!("{label} is not set")));
    }

    let metadata = fs::metadata(path).map_err(|e| {
        IncbakError::config_invalid(format!("{label} {} is not accessible: {e}", path.display()))
    })?;

    if !metadata.is_dir() {
        return Err(IncbakError::config_invalid(format!(
            "{label} {} is not a directory",
            path.display()
        )));
    }

    path.canonicalize().map_err(|e| {
        IncbakError::config_invalid(format!("{label} {} cannot be resolved: {e}", path.display()))
    })
}

/// Map a path under `source_root` onto the same relative path under `backup_root`.
///
/// Returns `None` if `path` is not inside `source_root`.
pub fn relative_destination(source_root: &Path, backup_root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(source_root)
        .ok()
        .map(|relative| backup_root.join(relative))
}

/// Copy the modification time of `source` onto `dest`
pub fn copy_timestamps(source: &Path, dest: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    set_file_mtime(dest, FileTime::from_last_modification_time(&metadata))
}

/// Temporary sibling path used to stage a copy before it replaces `dest`.
///
/// The name has a bounded length regardless of `dest`, so files whose names
/// are already near the file system limit can still be staged.
pub fn temp_copy_path(dest: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let parent = dest.parent().unwrap_or(Path::new("."));
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);

    parent.join(format!(".incbak_tmp_{}_{sequence}", std::process::id()))
}

/// Format byte size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes < THRESHOLD {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    format!("{size:.1} {unit}")
}

/// Format a countdown as `1h 2m 3s`, `2m 3s` or `3s`
pub fn format_countdown(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_directory() {
        let dir = tempdir().unwrap();
        let canonical = validate_directory(dir.path(), "Source").unwrap();
        assert!(canonical.is_absolute());
        assert!(canonical.is_dir());
    }

    #[test]
    fn test_validate_directory_rejects_files_and_missing_paths() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "x").unwrap();

        match validate_directory(&file_path, "Source").unwrap_err() {
            IncbakError::ConfigInvalid { message } => assert!(message.contains("not a directory")),
            other => panic!("Expected ConfigInvalid, got {other:?}"),
        }

        let missing = dir.path().join("missing");
        assert!(matches!(
            validate_directory(&missing, "Backup"),
            Err(IncbakError::ConfigInvalid { .. })
        ));

        match validate_directory(Path::new(""), "Backup").unwrap_err() {
            IncbakError::ConfigInvalid { message } => assert!(message.contains("not set")),
            other => panic!("Expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_relative_destination() {
        let source_root = Path::new("/data/src");
        let backup_root = Path::new("/mnt/backup");

        assert_eq!(
            relative_destination(source_root, backup_root, Path::new("/data/src/a/b.txt")),
            Some(PathBuf::from("/mnt/backup/a/b.txt"))
        );
        assert_eq!(
            relative_destination(source_root, backup_root, Path::new("/elsewhere/b.txt")),
            None
        );
    }

    #[test]
    fn test_relative_destination_only_strips_the_prefix() {
        // The root name repeated deeper in the tree must survive the mapping
        let source_root = Path::new("/data/src");
        let backup_root = Path::new("/mnt/backup");

        assert_eq!(
            relative_destination(
                source_root,
                backup_root,
                Path::new("/data/src/data/src/notes.txt")
            ),
            Some(PathBuf::from("/mnt/backup/data/src/notes.txt"))
        );
    }

    #[test]
    fn test_copy_timestamps() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let dest = dir.path().join("dest.txt");
        fs::write(&source, "a").unwrap();
        fs::write(&dest, "a").unwrap();

        set_file_mtime(&source, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
        copy_timestamps(&source, &dest).unwrap();

        let source_mtime = fs::metadata(&source).unwrap().modified().unwrap();
        let dest_mtime = fs::metadata(&dest).unwrap().modified().unwrap();
        assert_eq!(source_mtime, dest_mtime);
    }

    #[test]
    fn test_temp_copy_path() {
        let temp = temp_copy_path(Path::new("/backup/sub/file.txt"));
        assert_eq!(temp.parent(), Some(Path::new("/backup/sub")));

        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".incbak_tmp_"));
        assert!(!name.contains("file.txt"));

        let long_name = format!("{}.txt", "x".repeat(250));
        let long_temp = temp_copy_path(&Path::new("/backup").join(&long_name));
        assert!(long_temp.file_name().unwrap().len() < 64);
        assert_ne!(temp_copy_path(Path::new("/backup/a")), temp_copy_path(Path::new("/backup/a")));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "0s");
        assert_eq!(format_countdown(59), "59s");
        assert_eq!(format_countdown(60), "1m 0s");
        assert_eq!(format_countdown(125), "2m 5s");
        assert_eq!(format_countdown(3600), "1h 0m 0s");
        assert_eq!(format_countdown(3725), "1h 2m 5s");
    }
}
