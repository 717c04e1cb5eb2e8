use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::models::SystemSelection;
use crate::error::PackError;

pub const DEFAULT_CONFIG_FILE: &str = "c2pack.toml";
const ENV_PREFIX: &str = "C2PACK_";

static GO_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+(\.\d+)?((rc|beta)\d+)?$").expect("static regex is valid")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemSelection>,
    /// `GOARCH` for every package.
    pub arch: String,
    /// Prefix of package directories and name of the compiled binary.
    pub product: String,
    pub download_base_url: String,
    /// Module fetched with `go get` before each build.
    pub prefetch_module: String,
    /// Main package of the server, relative to the source root.
    pub entry_point: String,
    pub compression: Compression,
    pub checksums: bool,
    pub verbose: bool,
    pub json_logs: bool,
    // Tables last so the TOML output stays valid.
    pub dependency: DependencyConfig,
    pub copy: CopySet,
    pub notifications: NotificationConfig,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            source: None,
            destination: None,
            go_version: None,
            system: None,
            arch: "amd64".to_string(),
            product: "DeimosC2".to_string(),
            download_base_url: "https://dl.google.com/go".to_string(),
            prefetch_module: "github.com/lucas-clemente/quic-go".to_string(),
            entry_point: "c2/main.go".to_string(),
            compression: Compression::Deflated,
            checksums: true,
            verbose: false,
            json_logs: false,
            dependency: DependencyConfig::default(),
            copy: CopySet::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Repository cloned into every package's GOPATH.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    pub repo: String,
    /// Import path the clone lives under, relative to `gopath/src`.
    pub import_path: String,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            repo: "https://github.com/golang/sys.git".to_string(),
            import_path: "golang.org/x/sys".to_string(),
        }
    }
}

/// Folders and files copied verbatim from the source root into each package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySet {
    pub folders: Vec<String>,
    pub files: Vec<String>,
}

impl Default for CopySet {
    fn default() -> Self {
        Self {
            folders: ["agents", "archives", "droppers", "lib", "modules", "resources"]
                .map(String::from)
                .to_vec(),
            files: ["requirements.txt", "go.mod", "go.sum"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Deflated,
    Stored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    #[default]
    None,
    Slack,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub channel: NotificationChannelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
}

/// A configuration with every required setting present and checked.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub go_version: String,
    pub system: SystemSelection,
    pub settings: PackConfig,
}

impl PackConfig {
    /// Layer defaults, the TOML file, `C2PACK_*` variables and command line
    /// overrides, in that order.
    pub fn new<T: Serialize>(config_file: Option<&Path>, cli_args: Option<&T>) -> Result<Self> {
        let file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::from(Serialized::defaults(PackConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(args) = cli_args {
            figment = figment.merge(Serialized::defaults(args));
        }

        figment
            .extract()
            .with_context(|| format!("Failed to load configuration ({})", file.display()))
    }

    pub fn resolve(self) -> Result<ResolvedConfig, PackError> {
        let source = self
            .source
            .clone()
            .ok_or(PackError::MissingSetting("source"))?;
        let destination = self
            .destination
            .clone()
            .ok_or(PackError::MissingSetting("destination"))?;
        let go_version = self
            .go_version
            .clone()
            .ok_or(PackError::MissingSetting("go_version"))?;
        let system = self.system.ok_or(PackError::MissingSetting("system"))?;

        if !GO_VERSION.is_match(&go_version) {
            return Err(PackError::InvalidGoVersion(go_version));
        }
        if !source.exists() {
            return Err(PackError::MissingSource(source));
        }
        // Builds run with the source as working directory and Go rejects a
        // relative GOPATH, so both roots are pinned to the caller's directory
        let source = absolute(source)?;
        let destination = absolute(destination)?;

        Ok(ResolvedConfig {
            source,
            destination,
            go_version,
            system,
            settings: self,
        })
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf, PackError> {
    std::path::absolute(&path).map_err(|source| PackError::InvalidPath { path, source })
}

/// Write the built-in defaults as TOML for editing.
pub fn write_default(path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(&PackConfig::default()).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}
