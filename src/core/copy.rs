use anyhow::{Result, anyhow, bail};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use super::models::PackageDir;
use crate::config::CopySet;
use crate::error::PackError;

/// Buffer size for file I/O operations
const BUFFER_SIZE: usize = 128 * 1024;

/// Totals for one copy operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub bytes: u64,
}

impl std::ops::AddAssign for CopyStats {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Copy the configured folders and files from `source` into every package.
///
/// Folders merge into whatever is already in the package; files of the same
/// name are overwritten. A missing source entry fails the step.
pub async fn copy_source(
    source: &Path,
    packages: &[PackageDir],
    copy_set: &CopySet,
) -> Result<CopyStats> {
    for name in copy_set.folders.iter().chain(copy_set.files.iter()) {
        let path = source.join(name);
        if !path.exists() {
            return Err(PackError::MissingSource(path).into());
        }
    }

    let mut total = CopyStats::default();

    for package in packages {
        let span = info_span!("copy_source", target = package.target.goos());
        let source = source.to_path_buf();
        let root = package.root.clone();
        let copy_set = copy_set.clone();

        let stats = tokio::task::spawn_blocking(move || -> Result<CopyStats> {
            let _entered = span.enter();
            let mut stats = CopyStats::default();
            for folder in &copy_set.folders {
                stats += copy_tree(&source.join(folder), &root.join(folder))?;
            }
            for file in &copy_set.files {
                let bytes = copy_single_file(&source.join(file), &root.join(file))?;
                stats += CopyStats { files: 1, bytes };
            }
            info!(files = stats.files, bytes = stats.bytes, "Source copied");
            Ok(stats)
        })
        .await??;

        total += stats;
    }

    Ok(total)
}

/// Result of scanning a directory
struct ScanResult {
    files: Vec<PathBuf>,
    /// Parents before children
    directories: Vec<PathBuf>,
}

/// Recursively copy `source` into `destination`, merging with existing
/// content. File permissions and timestamps follow the source; directories
/// keep the default mode so read-only source trees stay writable in the
/// package.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<CopyStats> {
    let scan = scan_directory(source)?;

    fs::create_dir_all(destination)
        .map_err(|e| anyhow!("Failed to create {}: {}", destination.display(), e))?;

    for dir in &scan.directories {
        let target = destination.join(relative_to(source, dir)?);
        fs::create_dir_all(&target)
            .map_err(|e| anyhow!("Failed to create {}: {}", target.display(), e))?;
    }

    let mut stats = CopyStats::default();
    for file in &scan.files {
        let target = destination.join(relative_to(source, file)?);
        stats.bytes += copy_single_file(file, &target)?;
        stats.files += 1;
    }

    debug!(
        source = %source.display(),
        destination = %destination.display(),
        files = stats.files,
        bytes = stats.bytes,
        "Tree copied"
    );
    Ok(stats)
}

fn relative_to<'a>(base: &Path, path: &'a Path) -> Result<&'a Path> {
    path.strip_prefix(base)
        .map_err(|_| anyhow!("{} is not under {}", path.display(), base.display()))
}

// Symlinks are followed so linked resources land in the package as files
fn scan_directory(root: &Path) -> Result<ScanResult> {
    let mut scan = ScanResult {
        files: Vec::new(),
        directories: Vec::new(),
    };

    for entry in WalkDir::new(root).follow_links(true).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.loop_ancestor().is_some() => {
                bail!("Symlink loop in {}: {}", root.display(), e);
            }
            Err(e) if e.depth() == 0 => {
                bail!("Failed to read directory {}: {}", root.display(), e);
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            scan.directories.push(entry.into_path());
        } else if file_type.is_file() {
            scan.files.push(entry.into_path());
        }
    }

    Ok(scan)
}

/// Copy one file, overwriting `dest`, and carry over permissions and timestamps.
fn copy_single_file(source: &Path, dest: &Path) -> Result<u64> {
    let source_metadata = fs::metadata(source)
        .map_err(|e| anyhow!("Failed to read metadata of {}: {}", source.display(), e))?;
    if !source_metadata.is_file() {
        bail!("{} is not a regular file", source.display());
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    // A read-only copy from an earlier run cannot be opened for writing
    if dest.is_file() {
        fs::remove_file(dest)?;
    }

    let mut reader = BufReader::with_capacity(
        BUFFER_SIZE,
        File::open(source).map_err(|e| anyhow!("Failed to open {}: {}", source.display(), e))?,
    );
    let mut writer = BufWriter::with_capacity(
        BUFFER_SIZE,
        File::create(dest).map_err(|e| anyhow!("Failed to create {}: {}", dest.display(), e))?,
    );

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut bytes_written: u64 = 0;
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
        bytes_written += bytes_read as u64;
    }
    writer.flush()?;
    drop(writer);

    if let Err(e) = fs::set_permissions(dest, source_metadata.permissions()) {
        debug!(dest = %dest.display(), error = %e, "Failed to set file permissions");
    }

    let atime = filetime::FileTime::from_last_access_time(&source_metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&source_metadata);
    if let Err(e) = filetime::set_file_times(dest, atime, mtime) {
        debug!(dest = %dest.display(), error = %e, "Failed to preserve file timestamps");
    }

    Ok(bytes_written)
}
