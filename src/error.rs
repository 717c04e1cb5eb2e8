use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failures the packager reports by kind. Everything else travels as
/// `anyhow::Error` with context naming the step.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),

    #[error("invalid Go version `{0}` (expected something like 1.14.1)")]
    InvalidGoVersion(String),

    #[error("source path does not exist: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("cannot make {} absolute: {source}", .path.display())]
    InvalidPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no Go toolchain is published for host {os}/{arch}")]
    UnsupportedHost {
        os: &'static str,
        arch: &'static str,
    },

    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("download of {url} failed with HTTP {status}")]
    Download { url: String, status: u16 },
}
