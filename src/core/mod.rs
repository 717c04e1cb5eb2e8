pub mod archive;
pub mod checksum;
pub mod compiler;
pub mod copy;
pub mod deps;
pub mod layout;
pub mod models;
pub mod notifications;
pub mod packager;
pub mod runner;
pub mod toolchain;

pub use models::{PackageDir, SystemSelection, TargetOs};
pub use packager::{PackageReport, Packager};
pub use runner::{CommandRunner, CommandSpec, ProcessRunner};
pub use toolchain::{ArchiveFetcher, HttpFetcher, ToolchainArchive};
