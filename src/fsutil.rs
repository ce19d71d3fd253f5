use std::{fs, io::Write, path::Path};

use tempfile::NamedTempFile;

/// Write `contents` to a temp file beside `path`, then rename it over `path`.
///
/// A crash before the rename leaves nothing at `path`, so an existence check on
/// `path` never sees a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
