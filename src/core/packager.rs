use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use super::archive;
use super::checksum;
use super::compiler::{self, BuildSettings};
use super::copy;
use super::deps;
use super::layout;
use super::models::PackageDir;
use super::notifications::PackageEvent;
use super::toolchain::{self, ToolchainArchive};
use crate::context::AppContext;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub packages: Vec<PackageDir>,
    pub binaries: Vec<PathBuf>,
    pub archives: Vec<PathBuf>,
    pub checksums: Vec<PathBuf>,
    pub duration_secs: u64,
}

/// Drives the packaging steps in order for every selected target.
pub struct Packager {
    ctx: AppContext,
}

impl Packager {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> Result<PackageReport> {
        let config = &self.ctx.config;
        let targets = config.system.targets();

        self.notify(PackageEvent::Started {
            product: config.settings.product.clone(),
            go_version: config.go_version.clone(),
            targets: targets.iter().map(|t| t.goos().to_string()).collect(),
            destination: config.destination.clone(),
        })
        .await;

        let result = self.run_steps().await;

        match &result {
            Ok(report) => {
                self.notify(PackageEvent::Completed {
                    product: config.settings.product.clone(),
                    archives: report.archives.clone(),
                    duration_secs: report.duration_secs,
                })
                .await
            }
            Err(e) => {
                error!(error = format!("{:#}", e), "Packaging failed");
                self.notify(PackageEvent::Failed {
                    product: config.settings.product.clone(),
                    error: format!("{:#}", e),
                })
                .await
            }
        }

        result
    }

    async fn run_steps(&self) -> Result<PackageReport> {
        let config = &self.ctx.config;
        let settings = &config.settings;
        let start_time = Instant::now();

        info!("Creating package directories");
        let packages = layout::create_package_dirs(
            &config.destination,
            &settings.product,
            &config.system.targets(),
        )?;

        info!("Creating Go directories");
        layout::create_toolchain_dirs(&packages)?;

        info!(source = %config.source.display(), "Copying source tree");
        let copied = copy::copy_source(&config.source, &packages, &settings.copy)
            .await
            .context("Failed to copy source tree")?;
        info!(files = copied.files, bytes = copied.bytes, "Copy complete");

        info!(version = %config.go_version, "Fetching Go toolchains");
        for package in &packages {
            let archive =
                ToolchainArchive::new(&config.go_version, package.target, &settings.arch);
            toolchain::install(
                self.ctx.fetcher.as_ref(),
                &archive,
                &settings.download_base_url,
                &package.goroot(),
            )
            .await
            .with_context(|| format!("Failed to fetch Go for {}", package.target.goos()))?;
        }

        info!("Fetching Go dependencies");
        deps::clone_dependencies(self.ctx.runner.as_ref(), &packages, &settings.dependency)
            .await?;

        info!(product = %settings.product, "Compiling");
        let build = BuildSettings {
            source: &config.source,
            arch: &settings.arch,
            go_version: &config.go_version,
            download_base_url: &settings.download_base_url,
            prefetch_module: &settings.prefetch_module,
            entry_point: &settings.entry_point,
            product: &settings.product,
        };
        let binaries = compiler::compile_packages(
            self.ctx.runner.as_ref(),
            self.ctx.fetcher.as_ref(),
            &packages,
            &build,
            &self.ctx.host,
        )
        .await?;

        if let Some(first) = packages.first() {
            let go_temp = first.go_temp();
            if go_temp.exists() {
                info!(path = %go_temp.display(), "Cleaning up before zipping");
                tokio::fs::remove_dir_all(&go_temp)
                    .await
                    .with_context(|| format!("Failed to remove {}", go_temp.display()))?;
            }
        }

        info!("Zipping up the packages");
        let mut archives = Vec::with_capacity(packages.len());
        let mut checksums = Vec::new();
        for package in &packages {
            let zipped = archive::zip_package(package, settings.compression)
                .await
                .with_context(|| format!("Failed to zip {}", package.root.display()))?;

            if settings.checksums {
                let zip_path = zipped.path.clone();
                checksums.push(
                    tokio::task::spawn_blocking(move || checksum::write_checksum(&zip_path))
                        .await??,
                );
            }
            archives.push(zipped.path);
        }

        let duration_secs = start_time.elapsed().as_secs();
        info!(
            packages = packages.len(),
            duration_secs = duration_secs,
            "Packaging complete"
        );

        Ok(PackageReport {
            packages,
            binaries,
            archives,
            checksums,
            duration_secs,
        })
    }

    async fn notify(&self, event: PackageEvent) {
        if let Some(notifier) = &self.ctx.notifier {
            if let Err(e) = notifier.notify(event).await {
                warn!(error = %e, "Failed to send notification");
            }
        }
    }
}
