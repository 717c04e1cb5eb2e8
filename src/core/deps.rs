use anyhow::{Context, Result};
use tracing::{Instrument, info, info_span};

use super::models::PackageDir;
use super::runner::{CommandRunner, CommandSpec};
use crate::config::DependencyConfig;

/// `git clone` the dependency repository into every package's GOPATH.
///
/// A package that already holds a clone (a `.git` directory at the target)
/// is left alone so reruns do not fail on a non-empty directory.
pub async fn clone_dependencies(
    runner: &dyn CommandRunner,
    packages: &[PackageDir],
    dependency: &DependencyConfig,
) -> Result<()> {
    for package in packages {
        let target = package.dependency_path(&dependency.import_path);
        let span = info_span!("dependency", target_os = package.target.goos());

        async {
            if target.join(".git").exists() {
                info!(path = %target.display(), "Dependency already cloned");
                return Ok(());
            }

            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;

            info!(repo = %dependency.repo, path = %target.display(), "Cloning dependency");
            runner
                .run(&clone_command(&dependency.repo, &target))
                .await
                .with_context(|| format!("Failed to clone {}", dependency.repo))
        }
        .instrument(span)
        .await?;
    }
    Ok(())
}

pub fn clone_command(repo: &str, target: &std::path::Path) -> CommandSpec {
    CommandSpec::new("git")
        .arg("clone")
        .arg(repo)
        .arg(target.as_os_str())
}
