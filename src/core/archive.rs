use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use super::models::PackageDir;
use crate::config::Compression;

/// Summary of one written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    pub path: PathBuf,
    pub entries: u64,
}

/// Zip the package directory into `<package>.zip` next to it.
pub async fn zip_package(package: &PackageDir, compression: Compression) -> Result<ArchiveResult> {
    let root = package.root.clone();
    let zip_path = package.zip_path();

    let result = tokio::task::spawn_blocking(move || zip_directory(&root, &zip_path, compression))
        .await??;

    info!(
        target_os = package.target.goos(),
        archive = %result.path.display(),
        entries = result.entries,
        "Package zipped"
    );
    Ok(result)
}

/// Write every regular file below `dir` into a new archive at `zip_path`,
/// named by its path relative to `dir` with `/` separators.
pub fn zip_directory(dir: &Path, zip_path: &Path, compression: Compression) -> Result<ArchiveResult> {
    let file = File::create(zip_path)
        .with_context(|| format!("Failed to create {}", zip_path.display()))?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));

    let method = match compression {
        Compression::Deflated => CompressionMethod::Deflated,
        Compression::Stored => CompressionMethod::Stored,
    };
    let base_options = SimpleFileOptions::default().compression_method(method);

    let mut entries = 0u64;
    // Sorted so the same tree always yields the same archive layout
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = archive_name(dir, entry.path())?;
        let metadata = entry.metadata()?;
        let options = with_permissions(base_options, &metadata)
            .large_file(metadata.len() >= u32::MAX as u64);

        debug!(entry = %name, size = metadata.len(), "Adding to archive");
        writer.start_file(name.as_str(), options)?;
        let mut reader = BufReader::new(File::open(entry.path())?);
        io::copy(&mut reader, &mut writer)?;
        entries += 1;
    }

    writer.finish()?.flush()?;

    Ok(ArchiveResult {
        path: zip_path.to_path_buf(),
        entries,
    })
}

fn archive_name(base: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| anyhow!("{} is not under {}", path.display(), base.display()))?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(unix)]
fn with_permissions(options: SimpleFileOptions, metadata: &std::fs::Metadata) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    options.unix_permissions(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn with_permissions(options: SimpleFileOptions, _metadata: &std::fs::Metadata) -> SimpleFileOptions {
    options
}
