//! Go toolchain archives: naming, download and extraction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span};

use super::models::{ArchiveKind, TargetOs};
use crate::error::PackError;
use crate::logging::LogThrottle;

/// A published Go release for one OS/architecture pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainArchive {
    pub version: String,
    pub os: TargetOs,
    pub arch: String,
}

impl ToolchainArchive {
    pub fn new(version: &str, os: TargetOs, arch: &str) -> Self {
        Self {
            version: version.to_string(),
            os,
            arch: arch.to_string(),
        }
    }

    pub fn kind(&self) -> ArchiveKind {
        self.os.archive_kind()
    }

    /// e.g. `go1.14.1.linux-amd64.tar.gz`
    pub fn file_name(&self) -> String {
        format!(
            "go{}.{}-{}.{}",
            self.version,
            self.os.goos(),
            self.arch,
            self.kind().extension()
        )
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.file_name())
    }
}

/// Source of toolchain archive bytes.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Downloads archives over HTTPS.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let total_bytes = response.content_length();
        let mut body = Vec::with_capacity(total_bytes.unwrap_or(0) as usize);
        let mut throttle = LogThrottle::new(Duration::from_secs(2));

        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Download of {} interrupted", url))?
        {
            body.extend_from_slice(&chunk);
            if throttle.should_log() {
                debug!(
                    downloaded = body.len(),
                    total = total_bytes.unwrap_or(0),
                    "Downloading"
                );
            }
        }

        Ok(body)
    }
}

/// Unpack `bytes` into `dir`. Go archives carry a top-level `go/` folder, so
/// the compiler ends up at `dir/go/bin/go`.
pub fn extract(bytes: &[u8], kind: ArchiveKind, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    match kind {
        ArchiveKind::Zip => {
            let mut archive =
                zip::ZipArchive::new(Cursor::new(bytes)).context("Invalid zip archive")?;
            archive
                .extract(dir)
                .with_context(|| format!("Failed to extract zip into {}", dir.display()))?;
        }
        ArchiveKind::TarGz => {
            let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
            archive.set_preserve_permissions(true);
            archive
                .unpack(dir)
                .with_context(|| format!("Failed to extract tar.gz into {}", dir.display()))?;
        }
    }
    Ok(())
}

/// Download `archive` and extract it into `dir`.
pub async fn install(
    fetcher: &dyn ArchiveFetcher,
    archive: &ToolchainArchive,
    base_url: &str,
    dir: &Path,
) -> Result<()> {
    let url = archive.url(base_url);
    let span = info_span!("toolchain", os = archive.os.goos(), arch = %archive.arch);

    async {
        info!(url = %url, destination = %dir.display(), "Fetching Go toolchain");
        let bytes = fetcher.fetch(&url).await?;
        info!(bytes = bytes.len(), "Extracting Go toolchain");

        let kind = archive.kind();
        let dir: PathBuf = dir.to_path_buf();
        tokio::task::spawn_blocking(move || extract(&bytes, kind, &dir)).await??;
        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}
