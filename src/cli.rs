// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `batchdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "batchdag",
    version,
    about = "Compile pipeline documents into rendered scripts and a costed task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Pipeline directory tree holding app definitions and module
    /// dependency specs.
    #[arg(long, value_name = "DIR")]
    pub pipeline: PathBuf,

    /// Build parameter document (YAML).
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Workspace for rendered scripts, graph and digest.
    ///
    /// Overrides `CommonParameters.WORKSPACE` from the build document.
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Instance catalog document; the builtin catalog is used when
    /// omitted.
    #[arg(long, value_name = "PATH")]
    pub instances: Option<PathBuf>,

    /// Discard the persisted graph and rebuild it from scratch.
    #[arg(long)]
    pub overwrite: bool,

    /// Render and report, but write no scripts, graph or digest.
    #[arg(long)]
    pub dry_run: bool,

    /// Resource digest output path.
    ///
    /// Default: `depends.txt` in the workspace.
    #[arg(long, value_name = "PATH")]
    pub digest: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BATCHDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
