use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::models::{PackageDir, TargetOs};

/// Create one package directory per target under `destination`.
///
/// Existing directories are reused. The returned list keeps target order and
/// is what every later step iterates over.
pub fn create_package_dirs(
    destination: &Path,
    product: &str,
    targets: &[TargetOs],
) -> Result<Vec<PackageDir>> {
    let mut packages = Vec::with_capacity(targets.len());

    for &target in targets {
        let package = PackageDir::new(destination, product, target);
        fs::create_dir_all(&package.root).with_context(|| {
            format!(
                "Failed to create package directory {}",
                package.root.display()
            )
        })?;
        debug!(target = target.goos(), path = %package.root.display(), "Package directory ready");
        packages.push(package);
    }

    Ok(packages)
}

/// Create `goroot/` and `gopath/` inside every package.
pub fn create_toolchain_dirs(packages: &[PackageDir]) -> Result<()> {
    for package in packages {
        for dir in [package.goroot(), package.gopath()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_one_directory_per_target_in_order() {
        let temp = tempdir().unwrap();
        let targets = [TargetOs::Windows, TargetOs::Linux, TargetOs::Darwin];

        let packages = create_package_dirs(temp.path(), "DeimosC2", &targets).unwrap();

        let names: Vec<_> = packages
            .iter()
            .map(|p| p.root.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            ["DeimosC2_windows", "DeimosC2_linux", "DeimosC2_darwin"]
        );
        assert!(packages.iter().all(|p| p.root.is_dir()));
    }

    #[test]
    fn rerun_reuses_existing_directories() {
        let temp = tempdir().unwrap();
        let first = create_package_dirs(temp.path(), "DeimosC2", &[TargetOs::Linux]).unwrap();
        fs::write(first[0].root.join("keep.txt"), b"x").unwrap();

        let second = create_package_dirs(temp.path(), "DeimosC2", &[TargetOs::Linux]).unwrap();
        assert_eq!(first, second);
        assert!(second[0].root.join("keep.txt").exists());
    }

    #[test]
    fn toolchain_dirs_exist_in_every_package() {
        let temp = tempdir().unwrap();
        let packages = create_package_dirs(
            temp.path(),
            "DeimosC2",
            &[TargetOs::Windows, TargetOs::Darwin],
        )
        .unwrap();

        create_toolchain_dirs(&packages).unwrap();
        create_toolchain_dirs(&packages).unwrap();

        for package in &packages {
            assert!(package.goroot().is_dir());
            assert!(package.gopath().is_dir());
        }
    }
}
