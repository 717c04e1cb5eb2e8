use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Operating systems a package can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    Windows,
    Linux,
    Darwin,
}

impl TargetOs {
    /// Value passed to the compiler as `GOOS`.
    pub fn goos(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }

    pub fn archive_kind(&self) -> ArchiveKind {
        match self {
            Self::Windows => ArchiveKind::Zip,
            Self::Linux | Self::Darwin => ArchiveKind::TarGz,
        }
    }

    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::Darwin => "",
        }
    }

    /// The OS this binary was compiled for, if Go publishes a toolchain for it.
    pub fn host() -> Option<Self> {
        Self::from_rust_os(std::env::consts::OS)
    }

    pub fn from_rust_os(os: &str) -> Option<Self> {
        match os {
            "windows" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::Darwin),
            _ => None,
        }
    }
}

/// Map a Rust `target_arch` name to the matching `GOARCH`.
pub fn goarch_for(rust_arch: &str) -> Option<&'static str> {
    match rust_arch {
        "x86_64" => Some("amd64"),
        "x86" => Some("386"),
        "aarch64" => Some("arm64"),
        "arm" => Some("armv6l"),
        _ => None,
    }
}

/// Container format of a published Go toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

/// Which targets a run packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SystemSelection {
    #[value(alias = "windows")]
    #[serde(alias = "windows")]
    Win,
    #[value(alias = "linux")]
    #[serde(alias = "linux")]
    Lin,
    #[value(aliases = ["darwin", "macos"])]
    #[serde(alias = "darwin", alias = "macos")]
    Mac,
    All,
}

impl SystemSelection {
    pub fn targets(&self) -> Vec<TargetOs> {
        match self {
            Self::Win => vec![TargetOs::Windows],
            Self::Lin => vec![TargetOs::Linux],
            Self::Mac => vec![TargetOs::Darwin],
            Self::All => vec![TargetOs::Windows, TargetOs::Linux, TargetOs::Darwin],
        }
    }
}

/// One per-OS output directory and the paths derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDir {
    pub target: TargetOs,
    pub root: PathBuf,
}

impl PackageDir {
    pub fn new(destination: &Path, product: &str, target: TargetOs) -> Self {
        Self {
            target,
            root: destination.join(format!("{}_{}", product, target.goos())),
        }
    }

    pub fn goroot(&self) -> PathBuf {
        self.root.join("goroot")
    }

    pub fn gopath(&self) -> PathBuf {
        self.root.join("gopath")
    }

    /// Scratch toolchain for the host, removed before zipping.
    pub fn go_temp(&self) -> PathBuf {
        self.root.join("goTemp")
    }

    /// Compiler inside this package's bundled toolchain.
    pub fn bundled_go(&self) -> PathBuf {
        go_binary_in(&self.goroot())
    }

    pub fn dependency_path(&self, import_path: &str) -> PathBuf {
        let mut path = self.gopath().join("src");
        for part in import_path.split('/') {
            path.push(part);
        }
        path
    }

    pub fn binary_path(&self, product: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", product, self.target.exe_suffix()))
    }

    /// `<root>.zip`, next to the package directory.
    pub fn zip_path(&self) -> PathBuf {
        let mut name = self.root.clone().into_os_string();
        name.push(".zip");
        PathBuf::from(name)
    }
}

/// `go/bin/go` below an extracted toolchain directory.
pub fn go_binary_in(dir: &Path) -> PathBuf {
    dir.join("go")
        .join("bin")
        .join(format!("go{}", std::env::consts::EXE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_selection_keeps_windows_linux_darwin_order() {
        assert_eq!(
            SystemSelection::All.targets(),
            vec![TargetOs::Windows, TargetOs::Linux, TargetOs::Darwin]
        );
        assert_eq!(SystemSelection::Mac.targets(), vec![TargetOs::Darwin]);
    }

    #[test]
    fn package_paths_follow_product_and_goos() {
        let pkg = PackageDir::new(Path::new("/out"), "DeimosC2", TargetOs::Windows);
        assert_eq!(pkg.root, PathBuf::from("/out/DeimosC2_windows"));
        assert_eq!(pkg.goroot(), PathBuf::from("/out/DeimosC2_windows/goroot"));
        assert_eq!(pkg.zip_path(), PathBuf::from("/out/DeimosC2_windows.zip"));
        assert_eq!(
            pkg.binary_path("DeimosC2"),
            PathBuf::from("/out/DeimosC2_windows/DeimosC2.exe")
        );

        let linux = PackageDir::new(Path::new("/out"), "DeimosC2", TargetOs::Linux);
        assert_eq!(
            linux.binary_path("DeimosC2"),
            PathBuf::from("/out/DeimosC2_linux/DeimosC2")
        );
    }

    #[test]
    fn dependency_path_splits_import_path() {
        let pkg = PackageDir::new(Path::new("/out"), "DeimosC2", TargetOs::Linux);
        assert_eq!(
            pkg.dependency_path("golang.org/x/sys"),
            PathBuf::from("/out/DeimosC2_linux/gopath/src/golang.org/x/sys")
        );
    }

    #[test]
    fn rust_names_map_to_go_names() {
        assert_eq!(TargetOs::from_rust_os("macos"), Some(TargetOs::Darwin));
        assert_eq!(TargetOs::from_rust_os("freebsd"), None);
        assert_eq!(goarch_for("x86_64"), Some("amd64"));
        assert_eq!(goarch_for("aarch64"), Some("arm64"));
    }

    #[test]
    fn archive_kind_per_os() {
        assert_eq!(TargetOs::Windows.archive_kind().extension(), "zip");
        assert_eq!(TargetOs::Darwin.archive_kind().extension(), "tar.gz");
    }
}
