//! Atomic file write helpers.
//!
//! Uses a temp file + rename pattern. On Windows, rename-over-existing fails,
//! so we use a backup-and-restore fallback to avoid data loss when overwriting.
//! Report files are the primary output of a scan; a crash mid-write must
//! never leave a half-written findings.json behind.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `bytes` to `path` atomically, creating parent directories as needed.
pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    // Persist (rename) - handle Windows where rename fails if target exists.
    if let Err(err) = tmp.persist(path) {
        if path.exists() {
            // Windows fallback: backup and restore.
            let backup_path = path.with_extension("bak");
            let _ = fs::remove_file(&backup_path);
            fs::rename(path, &backup_path)?;

            if let Err(rename_err) = err.file.persist(path) {
                let _ = fs::rename(&backup_path, path);
                return Err(rename_err.error);
            }
            if let Err(e) = fs::remove_file(&backup_path) {
                tracing::warn!(
                    path = %backup_path.display(),
                    "Failed to remove .bak after atomic write: {e}"
                );
            }
        } else {
            return Err(err.error);
        }
    }

    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: impl AsRef<Path>, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    atomic_write(path, &bytes)
}
