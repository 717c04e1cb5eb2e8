use anyhow::{Context, Result};
use c2pack::config::{self, Compression, PackConfig};
use c2pack::core::{Packager, SystemSelection};
use c2pack::{context, logging};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "c2pack")]
#[command(about = "Stages, cross-compiles and zips the C2 server for distribution", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one zip per target OS
    Package(PackageArgs),
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(default_value = config::DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

#[derive(Args, Serialize)]
struct PackageArgs {
    /// Root of the server source tree
    #[serde(rename = "source", skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    src: Option<PathBuf>,

    /// Directory the packages and zips are written to
    #[serde(rename = "destination", skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    dst: Option<PathBuf>,

    /// Go release to bundle (e.g. 1.14.1)
    #[serde(rename = "go_version", skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    govers: Option<String>,

    /// Target OS to package for
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, value_enum)]
    system: Option<SystemSelection>,

    /// GOARCH for every package
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    arch: Option<String>,

    /// Package directory prefix and binary name
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    product: Option<String>,

    /// Zip entry compression
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, value_enum)]
    compression: Option<Compression>,

    /// Skip the .blake3 file next to each zip
    #[serde(skip_serializing_if = "is_true")]
    #[arg(long = "no-checksums", action = ArgAction::SetFalse)]
    checksums: bool,

    #[serde(skip_serializing_if = "is_false")]
    #[arg(long)]
    verbose: bool,

    #[serde(skip_serializing_if = "is_false")]
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file
    #[serde(skip)]
    #[arg(long)]
    config: Option<PathBuf>,
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Package(args) => {
            let config = PackConfig::new(args.config.as_deref(), Some(args))?;
            logging::init(logging::LogConfig {
                json: config.json_logs,
                verbose: config.verbose,
            });
            run_package(config).await.context("Packaging failed")?
        }
        Commands::InitConfig { path } => {
            config::write_default(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

async fn run_package(config: PackConfig) -> Result<()> {
    let resolved = config.resolve()?;
    let ctx = context::AppContext::new(resolved);
    let report = Packager::new(ctx).run().await?;

    for archive in &report.archives {
        println!("{}", archive.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn package_args(argv: &[&str]) -> PackageArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Package(args) => args,
            Commands::InitConfig { .. } => panic!("expected package"),
        }
    }

    #[test]
    fn compression_flag_reaches_config() {
        let args = package_args(&[
            "c2pack",
            "package",
            "--src",
            "DeimosC2",
            "--dst",
            "dist",
            "--govers",
            "1.14.1",
            "--system",
            "lin",
            "--compression",
            "stored",
            "--no-checksums",
        ]);

        let config = PackConfig::new(Some(Path::new("absent.toml")), Some(&args)).unwrap();

        assert_eq!(config.compression, Compression::Stored);
        assert!(!config.checksums);
        assert_eq!(config.go_version.as_deref(), Some("1.14.1"));
        assert_eq!(config.system, Some(SystemSelection::Lin));
    }

    #[test]
    fn omitted_flags_keep_defaults() {
        let args = package_args(&["c2pack", "package", "--system", "all"]);

        let config = PackConfig::new(Some(Path::new("absent.toml")), Some(&args)).unwrap();

        assert_eq!(config.compression, Compression::Deflated);
        assert!(config.checksums);
        assert!(config.source.is_none());
    }

    #[test]
    fn unknown_compression_is_rejected() {
        assert!(
            Cli::try_parse_from(["c2pack", "package", "--compression", "lzma"]).is_err()
        );
    }
}
