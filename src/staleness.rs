use std::fs;
use std::io;
use std::path::Path;

/// Decide whether `source` has to be (re)copied to `dest`.
///
/// True when `dest` is missing or `source` was modified strictly later.
/// Equal timestamps count as up to date.
pub fn needs_copy(source: &Path, dest: &Path) -> io::Result<bool> {
    let dest_modified = match fs::metadata(dest) {
        Ok(metadata) => metadata.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };

    let source_modified = fs::metadata(source)?.modified()?;
    Ok(source_modified > dest_modified)
}
