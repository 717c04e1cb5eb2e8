//! Cross-compiling the server with the Go toolchain.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{Instrument, info, info_span};

use super::models::{PackageDir, TargetOs, go_binary_in, goarch_for};
use super::runner::{CommandRunner, CommandSpec};
use super::toolchain::{self, ArchiveFetcher, ToolchainArchive};
use crate::error::PackError;

/// The machine running the packager.
#[derive(Debug, Clone, Copy)]
pub struct Host {
    pub os: Option<TargetOs>,
    pub goarch: Option<&'static str>,
    raw_os: &'static str,
    raw_arch: &'static str,
}

impl Host {
    pub fn current() -> Self {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn from_rust(os: &'static str, arch: &'static str) -> Self {
        Self {
            os: TargetOs::from_rust_os(os),
            goarch: goarch_for(arch),
            raw_os: os,
            raw_arch: arch,
        }
    }

    fn unsupported(&self) -> PackError {
        PackError::UnsupportedHost {
            os: self.raw_os,
            arch: self.raw_arch,
        }
    }
}

/// Where the compiler binary comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerPlan {
    /// A package targets the host, so its bundled toolchain can run here.
    Bundled { go: PathBuf },
    /// Download the host toolchain into `dir` and remove it before zipping.
    Temporary { dir: PathBuf, archive: ToolchainArchive },
}

impl CompilerPlan {
    pub fn go_binary(&self) -> PathBuf {
        match self {
            Self::Bundled { go } => go.clone(),
            Self::Temporary { dir, .. } => go_binary_in(dir),
        }
    }
}

/// Pick a compiler the host can execute.
pub fn plan_compiler(
    packages: &[PackageDir],
    arch: &str,
    go_version: &str,
    host: &Host,
) -> Result<CompilerPlan> {
    let Some(first) = packages.first() else {
        bail!("No packages to compile");
    };
    let (Some(host_os), Some(host_arch)) = (host.os, host.goarch) else {
        return Err(host.unsupported().into());
    };

    if host_arch == arch {
        if let Some(package) = packages.iter().find(|p| p.target == host_os) {
            return Ok(CompilerPlan::Bundled {
                go: package.bundled_go(),
            });
        }
    }

    Ok(CompilerPlan::Temporary {
        dir: first.go_temp(),
        archive: ToolchainArchive::new(go_version, host_os, host_arch),
    })
}

/// `go get <module>` against the package's own GOPATH.
pub fn prefetch_command(go: &Path, package: &PackageDir, arch: &str, module: &str) -> CommandSpec {
    CommandSpec::new(go)
        .arg("get")
        .arg(module)
        .env("GOPATH", package.gopath())
        .env("GOOS", package.target.goos())
        .env("GOARCH", arch)
}

/// Stripped, path-trimmed build of `<source>/<entry_point>` into the package.
pub fn build_command(
    go: &Path,
    package: &PackageDir,
    arch: &str,
    source: &Path,
    entry_point: &str,
    product: &str,
) -> CommandSpec {
    CommandSpec::new(go)
        .arg("build")
        .arg("-ldflags=-s -w")
        .arg("-trimpath")
        .arg("-o")
        .arg(package.binary_path(product))
        .arg(source.join(entry_point))
        .env("GOOS", package.target.goos())
        .env("GOARCH", arch)
        .current_dir(source)
}

/// Settings shared by every build in a run.
pub struct BuildSettings<'a> {
    pub source: &'a Path,
    pub arch: &'a str,
    pub go_version: &'a str,
    pub download_base_url: &'a str,
    pub prefetch_module: &'a str,
    pub entry_point: &'a str,
    pub product: &'a str,
}

/// Fetch a temporary toolchain if needed, then prefetch and build for every
/// package. Returns the compiled binaries in package order.
pub async fn compile_packages(
    runner: &dyn CommandRunner,
    fetcher: &dyn ArchiveFetcher,
    packages: &[PackageDir],
    settings: &BuildSettings<'_>,
    host: &Host,
) -> Result<Vec<PathBuf>> {
    let plan = plan_compiler(packages, settings.arch, settings.go_version, host)?;

    if let CompilerPlan::Temporary { dir, archive } = &plan {
        info!(path = %dir.display(), "No bundled toolchain runs on this host, fetching a temporary one");
        toolchain::install(fetcher, archive, settings.download_base_url, dir)
            .await
            .context("Failed to fetch temporary Go toolchain")?;
    }

    let go = plan.go_binary();
    let mut binaries = Vec::with_capacity(packages.len());

    for package in packages {
        let span = info_span!("compile", target_os = package.target.goos(), arch = settings.arch);

        async {
            info!(module = settings.prefetch_module, "Fetching build dependency");
            runner
                .run(&prefetch_command(
                    &go,
                    package,
                    settings.arch,
                    settings.prefetch_module,
                ))
                .await
                .with_context(|| format!("Failed to fetch {}", settings.prefetch_module))?;

            let output = package.binary_path(settings.product);
            info!(output = %output.display(), "Compiling");
            runner
                .run(&build_command(
                    &go,
                    package,
                    settings.arch,
                    settings.source,
                    settings.entry_point,
                    settings.product,
                ))
                .await
                .with_context(|| format!("Failed to compile for {}", package.target.goos()))?;

            binaries.push(output);
            Ok::<(), anyhow::Error>(())
        }
        .instrument(span)
        .await?;
    }

    Ok(binaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ArchiveKind;
    use crate::core::runner::testing::RecordingRunner;
    use crate::core::toolchain::testing::{MemoryFetcher, fake_toolchain};
    use std::ffi::OsString;
    use tempfile::tempdir;

    fn packages(root: &Path, targets: &[TargetOs]) -> Vec<PackageDir> {
        targets
            .iter()
            .map(|&t| PackageDir::new(root, "DeimosC2", t))
            .collect()
    }

    #[test]
    fn prefers_package_matching_host() {
        let pkgs = packages(
            Path::new("/out"),
            &[TargetOs::Windows, TargetOs::Linux, TargetOs::Darwin],
        );
        let host = Host::from_rust("linux", "x86_64");

        let plan = plan_compiler(&pkgs, "amd64", "1.14.1", &host).unwrap();

        assert_eq!(
            plan,
            CompilerPlan::Bundled {
                go: pkgs[1].bundled_go()
            }
        );
    }

    #[test]
    fn falls_back_to_temporary_toolchain_in_first_package() {
        let pkgs = packages(Path::new("/out"), &[TargetOs::Windows]);
        let host = Host::from_rust("macos", "x86_64");

        let plan = plan_compiler(&pkgs, "amd64", "1.14.1", &host).unwrap();

        assert_eq!(
            plan,
            CompilerPlan::Temporary {
                dir: pkgs[0].go_temp(),
                archive: ToolchainArchive::new("1.14.1", TargetOs::Darwin, "amd64"),
            }
        );
    }

    #[test]
    fn architecture_mismatch_needs_temporary_toolchain() {
        let pkgs = packages(Path::new("/out"), &[TargetOs::Linux]);
        let host = Host::from_rust("linux", "aarch64");

        let plan = plan_compiler(&pkgs, "amd64", "1.21.0", &host).unwrap();

        assert!(matches!(
            plan,
            CompilerPlan::Temporary { ref archive, .. } if archive.arch == "arm64"
        ));
    }

    #[test]
    fn unsupported_host_is_an_error() {
        let pkgs = packages(Path::new("/out"), &[TargetOs::Linux]);
        let host = Host::from_rust("freebsd", "x86_64");

        let err = plan_compiler(&pkgs, "amd64", "1.14.1", &host).unwrap_err();

        assert!(matches!(
            err.downcast::<PackError>().unwrap(),
            PackError::UnsupportedHost { os: "freebsd", .. }
        ));
    }

    #[test]
    fn build_command_sets_target_env_and_output() {
        let pkg = PackageDir::new(Path::new("/out"), "DeimosC2", TargetOs::Windows);
        let go = PathBuf::from("/out/DeimosC2_linux/goroot/go/bin/go");

        let spec = build_command(&go, &pkg, "amd64", Path::new("/src"), "c2/main.go", "DeimosC2");

        let args: Vec<_> = spec.args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            [
                "build",
                "-ldflags=-s -w",
                "-trimpath",
                "-o",
                "/out/DeimosC2_windows/DeimosC2.exe",
                "/src/c2/main.go",
            ]
        );
        assert_eq!(spec.env_value("GOOS"), Some(&OsString::from("windows")));
        assert_eq!(spec.env_value("GOARCH"), Some(&OsString::from("amd64")));
        assert_eq!(spec.env_value("GOPATH"), None);
        assert_eq!(spec.cwd.as_deref(), Some(Path::new("/src")));
    }

    #[test]
    fn prefetch_command_uses_package_gopath() {
        let pkg = PackageDir::new(Path::new("/out"), "DeimosC2", TargetOs::Darwin);

        let spec = prefetch_command(
            Path::new("go"),
            &pkg,
            "amd64",
            "github.com/lucas-clemente/quic-go",
        );

        assert_eq!(spec.args, ["get", "github.com/lucas-clemente/quic-go"].map(OsString::from));
        assert_eq!(
            spec.env_value("GOPATH"),
            Some(&pkg.gopath().into_os_string())
        );
        assert_eq!(spec.env_value("GOOS"), Some(&OsString::from("darwin")));
    }

    #[tokio::test]
    async fn compile_fetches_host_toolchain_when_no_package_matches() {
        let temp = tempdir().unwrap();
        let pkgs = packages(temp.path(), &[TargetOs::Windows]);
        let host = Host::from_rust("linux", "x86_64");
        let base = "https://dl.test/go";

        let mut fetcher = MemoryFetcher::default();
        fetcher.archives.insert(
            format!("{}/go1.14.1.linux-amd64.tar.gz", base),
            fake_toolchain(ArchiveKind::TarGz, "go"),
        );
        let runner = RecordingRunner::default();
        let settings = BuildSettings {
            source: Path::new("/src"),
            arch: "amd64",
            go_version: "1.14.1",
            download_base_url: base,
            prefetch_module: "github.com/lucas-clemente/quic-go",
            entry_point: "c2/main.go",
            product: "DeimosC2",
        };

        let binaries = compile_packages(&runner, &fetcher, &pkgs, &settings, &host)
            .await
            .unwrap();

        assert_eq!(binaries, vec![pkgs[0].binary_path("DeimosC2")]);
        assert!(pkgs[0].go_temp().join("go/bin/go").exists());

        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.program == go_binary_in(&pkgs[0].go_temp())));
        assert_eq!(commands[0].args[0], "get");
        assert_eq!(commands[1].args[0], "build");
    }
}
