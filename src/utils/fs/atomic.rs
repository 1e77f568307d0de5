//! Atomic file write operations using temp-and-rename strategy.
//!
//! Project and lock documents are only ever replaced through these helpers,
//! so a crash mid-write leaves the previous content in place.

use crate::utils::fs::dirs::ensure_dir;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Safely writes a string to a file using atomic operations.
///
/// Convenience wrapper around [`atomic_write`].
///
/// # Examples
///
/// ```rust,no_run
/// use projkit_cli::utils::fs::safe_write;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// safe_write(Path::new("projkit.toml"), "name = \"demo\"\n")?;
/// # Ok(())
/// # }
/// ```
pub fn safe_write(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// 1. Writes content to a sibling temporary file (`<name>.tmp`)
/// 2. Syncs the temporary file to disk
/// 3. Renames the temporary file over the target path
///
/// Parent directories are created when missing.
///
/// # Errors
///
/// Returns an error if any step fails; the target file is untouched in that case.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let temp_path = temp_path_for(path);

    {
        let mut file = fs::File::create(&temp_path).with_context(|| {
            format!(
                "Failed to create temp file: {}\n\nCheck file permissions and that directory exists",
                temp_path.display()
            )
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

// The project and lock documents share a stem, so append rather than replace the extension.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_safe_write_creates_parent_dirs() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("nested").join("dir").join("projkit.toml");

        safe_write(&file, "name = \"demo\"\n").unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "name = \"demo\"\n");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("projkit.lock");

        atomic_write(&file, b"first").unwrap();
        atomic_write(&file, b"second").unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), b"second");
    }

    #[test]
    fn test_temp_files_do_not_collide_for_shared_stem() {
        let a = temp_path_for(Path::new("/p/projkit.toml"));
        let b = temp_path_for(Path::new("/p/projkit.lock"));
        assert_ne!(a, b);
        assert_eq!(a, Path::new("/p/projkit.toml.tmp"));
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("projkit.toml");
        safe_write(&file, "x = 1\n").unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
