//! Collision-safe naming for received content.
//!
//! Received files and extracted directories never overwrite anything that
//! already exists. When the desired name is taken, a compact local timestamp
//! (`YYYYmmddHHMMSS`) is appended to the stem:
//!
//! ```text
//! report.pdf  ->  report-20261019143005.pdf
//! photos      ->  photos-20261019143005
//! ```
//!
//! If the timestamped name is taken as well (two arrivals within the same
//! second), a counter is appended: `report-20261019143005-1.pdf`. The search
//! is bounded. Nothing reserves the returned name, so two concurrent callers
//! can still be handed the same path between the check and the create.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{Error, Result};

/// Format of the timestamp appended on collision.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Upper bound on counter suffixes tried after the timestamped name.
const MAX_COUNTER_ATTEMPTS: u32 = 1000;

/// Resolve a collision-safe path for a file named `desired` inside `dir`.
///
/// Returns `dir/desired` unchanged when nothing exists there. The returned
/// path is only a candidate: once the counter search is exhausted it may
/// already exist, and another writer may claim it first. Callers must create
/// it with `create_new` and treat failure as an error, never overwrite.
#[must_use]
pub fn resolve(dir: &Path, desired: &str) -> PathBuf {
    let candidate = dir.join(desired);
    if !exists(&candidate) {
        return candidate;
    }

    let desired_path = Path::new(desired);
    let stem = desired_path
        .file_stem()
        .map_or_else(|| desired.to_string(), |s| s.to_string_lossy().to_string());
    let ext = desired_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    with_timestamp(dir, &stem, &ext)
}

/// Resolve a collision-safe path for a directory named `name` inside `parent`.
///
/// Directory names are never split into stem and extension.
#[must_use]
pub fn resolve_dir(parent: &Path, name: &str) -> PathBuf {
    let candidate = parent.join(name);
    if !exists(&candidate) {
        return candidate;
    }
    with_timestamp(parent, name, "")
}

fn with_timestamp(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let stamped = format!("{stem}-{}", Local::now().format(TIMESTAMP_FORMAT));
    with_stamp(dir, &stamped, ext)
}

fn with_stamp(dir: &Path, stamped: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stamped}{ext}"));
    if !exists(&candidate) {
        return candidate;
    }

    for n in 1..=MAX_COUNTER_ATTEMPTS {
        let candidate = dir.join(format!("{stamped}-{n}{ext}"));
        if !exists(&candidate) {
            return candidate;
        }
    }

    tracing::warn!(
        name = %stamped,
        "No free name after {MAX_COUNTER_ATTEMPTS} attempts, falling back to last candidate"
    );
    dir.join(format!("{stamped}-{MAX_COUNTER_ATTEMPTS}{ext}"))
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Reduce a peer-supplied file name to a safe, single path component.
///
/// Directory components are stripped (both `/` and `\` separators), so a
/// name like `../../etc/passwd` becomes `passwd`.
///
/// # Errors
///
/// Returns `InvalidInput` if nothing usable remains.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return Err(Error::InvalidInput(format!("unusable file name '{name}'")));
    }

    Ok(last.to_string())
}

/// Format a byte count for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_free_name_unchanged() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve(dir.path(), "a.txt"), dir.path().join("a.txt"));
    }

    #[test]
    fn test_resolve_three_distinct_names() {
        let dir = TempDir::new().unwrap();

        let first = resolve(dir.path(), "a.txt");
        assert_eq!(first, dir.path().join("a.txt"));
        std::fs::write(&first, b"1").unwrap();

        let second = resolve(dir.path(), "a.txt");
        assert_ne!(second, first);
        let second_name = second.file_name().unwrap().to_string_lossy().to_string();
        assert!(second_name.starts_with("a-"));
        assert!(second_name.ends_with(".txt"));
        std::fs::write(&second, b"2").unwrap();

        let third = resolve(dir.path(), "a.txt");
        assert_ne!(third, first);
        assert_ne!(third, second);
        assert!(!third.exists());
    }

    #[test]
    fn test_counter_search_is_bounded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-x.txt"), b"").unwrap();
        for n in 1..=MAX_COUNTER_ATTEMPTS {
            std::fs::write(dir.path().join(format!("a-x-{n}.txt")), b"").unwrap();
        }

        let resolved = with_stamp(dir.path(), "a-x", ".txt");
        assert_eq!(resolved, dir.path().join(format!("a-x-{MAX_COUNTER_ATTEMPTS}.txt")));
        assert!(resolved.exists());

        let created = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&resolved);
        assert!(created.is_err());

        std::fs::remove_file(dir.path().join("a-x-7.txt")).unwrap();
        assert_eq!(with_stamp(dir.path(), "a-x", ".txt"), dir.path().join("a-x-7.txt"));
    }

    #[test]
    fn test_resolve_without_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README"), b"x").unwrap();

        let resolved = resolve(dir.path(), "README");
        let name = resolved.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("README-"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_resolve_dir_keeps_dots() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("v1.2")).unwrap();

        let resolved = resolve_dir(dir.path(), "v1.2");
        let name = resolved.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("v1.2-"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\a.txt").unwrap(), "a.txt");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("dir/").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
