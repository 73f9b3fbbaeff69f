//! Zip archive support for multi-file and directory transfers.
//!
//! Several paths, or a directory, travel as one zip archive. The archive is a
//! transient [`ArchiveBlob`]: it lives in the system temp directory and is
//! removed when the blob is dropped, whether the transfer succeeded or not.
//!
//! ## Entry layout
//!
//! Entries are stored relative to a common ancestor so extraction reproduces
//! the original shape:
//!
//! | Input | Entries |
//! |-------|---------|
//! | `notes.txt` | `notes.txt` |
//! | `photos/` | `a.jpg`, `trip/b.jpg` |
//! | `dirA/`, `dirB/` | `dirA/...`, `dirB/...` |
//!
//! Entries are written in sorted order with fixed timestamps, so the same
//! inputs produce the same archive bytes.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use tempfile::TempPath;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::naming;

/// Name used for archives built from more than one input.
pub const GENERIC_ARCHIVE_NAME: &str = "lanshare.zip";

/// Signature of a zip local file header.
const LOCAL_FILE_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// Signature of the end-of-central-directory record (empty archive).
const EMPTY_ARCHIVE_SIGNATURE: [u8; 4] = *b"PK\x05\x06";

/// A temporary archive owned by a single send or receive operation.
///
/// The underlying file is deleted when the blob is dropped.
#[derive(Debug)]
pub struct ArchiveBlob {
    path: TempPath,
    suggested_name: String,
}

impl ArchiveBlob {
    /// Path of the archive on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name the archive should carry on the wire.
    #[must_use]
    pub fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    /// Size of the archive in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

/// Whether a set of paths must travel as an archive.
///
/// True when compression is forced, when more than one path is given, or
/// when the single path is a directory.
#[must_use]
pub fn needs_archive(paths: &[PathBuf], force: bool) -> bool {
    force || paths.len() > 1 || paths.first().is_some_and(|p| p.is_dir())
}

/// Compress a set of files and directories into a temporary archive.
///
/// # Errors
///
/// Returns `InvalidInput` for an empty set, `FileNotFound` for a missing
/// path, or an I/O / archive error if writing fails.
pub fn compress(paths: &[PathBuf]) -> Result<ArchiveBlob> {
    if paths.is_empty() {
        return Err(Error::InvalidInput("nothing to compress".to_string()));
    }

    let roots = paths
        .iter()
        .map(|p| {
            p.canonicalize()
                .map_err(|_| Error::FileNotFound(p.display().to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let suggested_name = match roots.as_slice() {
        [single] => single.file_stem().map_or_else(
            || GENERIC_ARCHIVE_NAME.to_string(),
            |stem| format!("{}.zip", stem.to_string_lossy()),
        ),
        _ => GENERIC_ARCHIVE_NAME.to_string(),
    };

    let (file, path) = tempfile::Builder::new()
        .prefix("lanshare")
        .suffix(".zip")
        .tempfile()?
        .into_parts();

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let single = roots.len() == 1;

    for root in &roots {
        let base = if single && root.is_dir() {
            root.as_path()
        } else {
            root.parent().unwrap_or(root)
        };

        if root.is_dir() {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                let Ok(relative) = entry.path().strip_prefix(base) else {
                    continue;
                };
                let Some(name) = entry_name(relative) else {
                    continue;
                };

                if entry.file_type().is_dir() {
                    zip.add_directory(name, options)?;
                } else if entry.path().is_file() {
                    zip.start_file(name, options)?;
                    let mut source = File::open(entry.path())?;
                    std::io::copy(&mut source, &mut zip)?;
                } else {
                    tracing::debug!(path = %entry.path().display(), "Skipping non-regular entry");
                }
            }
        } else {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| Error::InvalidInput(format!("no file name: {}", root.display())))?;
            zip.start_file(name, options)?;
            let mut source = File::open(root)?;
            std::io::copy(&mut source, &mut zip)?;
        }
    }

    zip.finish()?;

    tracing::debug!(
        archive = %path.display(),
        name = %suggested_name,
        inputs = roots.len(),
        "Created archive"
    );

    Ok(ArchiveBlob {
        path,
        suggested_name,
    })
}

/// Build a zip entry name (forward slashes) from a relative path.
fn entry_name(relative: &Path) -> Option<String> {
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Extract an archive into a new directory next to it.
///
/// The directory is named after the archive's stem; if that name is taken a
/// timestamp is appended. Returns the canonical path of the new directory.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or extraction fails. A
/// partially extracted directory is removed.
pub fn decompress(archive: &Path) -> Result<PathBuf> {
    let parent = archive.parent().unwrap_or_else(|| Path::new("."));
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidInput(format!("no archive name: {}", archive.display())))?;

    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;

    let dir = naming::resolve_dir(parent, &stem);
    std::fs::create_dir(&dir)?;

    if let Err(e) = zip.extract(&dir) {
        let _ = std::fs::remove_dir_all(&dir);
        return Err(e.into());
    }

    let dir = dir.canonicalize()?;
    tracing::debug!(archive = %archive.display(), dir = %dir.display(), "Extracted archive");
    Ok(dir)
}

/// Check whether a file is structurally a zip archive.
///
/// Looks at the leading signature and the central directory; the file
/// extension plays no part.
#[must_use]
pub fn is_archive(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };

    let mut signature = [0u8; 4];
    if file.read_exact(&mut signature).is_err() {
        return false;
    }
    if signature != LOCAL_FILE_SIGNATURE && signature != EMPTY_ARCHIVE_SIGNATURE {
        return false;
    }
    if file.seek(SeekFrom::Start(0)).is_err() {
        return false;
    }

    ZipArchive::new(BufReader::new(file)).is_ok()
}

/// Run [`compress`] on the blocking thread pool.
pub async fn compress_async(paths: Vec<PathBuf>) -> Result<ArchiveBlob> {
    blocking(move || compress(&paths)).await
}

/// Run [`decompress`] on the blocking thread pool.
pub async fn decompress_async(archive: PathBuf) -> Result<PathBuf> {
    blocking(move || decompress(&archive)).await
}

/// Run [`is_archive`] on the blocking thread pool.
pub async fn is_archive_async(path: PathBuf) -> bool {
    blocking(move || Ok(is_archive(&path))).await.unwrap_or(false)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("archive task failed: {e}")))?
}
