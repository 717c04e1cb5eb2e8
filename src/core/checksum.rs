use anyhow::{Result, anyhow};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hash a file using BLAKE3, streaming in chunks
pub fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let file = std::fs::File::open(path)
        .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;

    let mut reader = std::io::BufReader::with_capacity(128 * 1024, file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; 128 * 1024];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Write `<archive>.blake3` containing `<hex>  <file name>`, the layout
/// `b3sum --check` reads.
pub fn write_checksum(archive: &Path) -> Result<PathBuf> {
    let hash = hash_file(archive)?;
    let file_name = archive
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", archive.display()))?
        .to_string_lossy();

    let mut sidecar = archive.as_os_str().to_owned();
    sidecar.push(".blake3");
    let sidecar = PathBuf::from(sidecar);

    std::fs::write(&sidecar, format!("{}  {}\n", hash.to_hex(), file_name))
        .map_err(|e| anyhow!("Failed to write {}: {}", sidecar.display(), e))?;

    debug!(archive = %archive.display(), hash = %hash.to_hex(), "Checksum written");
    Ok(sidecar)
}
