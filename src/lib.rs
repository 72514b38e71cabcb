// src/lib.rs

pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod graph;
pub mod instance;
pub mod logging;
pub mod registry;
pub mod render;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::cli::CliArgs;
use crate::graph::{BuildOptions, BuildReport};
use crate::instance::InstanceCatalog;
use crate::registry::Registry;

/// Persisted graph file name within the workspace.
const GRAPH_FILE: &str = "graph.json";

/// Default resource digest file name within the workspace.
const DIGEST_FILE: &str = "depends.txt";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - build parameter document loading
/// - the app registry (pipeline tree walk + alias resolution)
/// - the instance catalog
/// - the phased graph compiler
pub fn run(args: CliArgs) -> Result<()> {
    let build = config::load_build_doc(&args.config)?;
    let registry = Registry::load(&args.pipeline)?;

    let catalog = match &args.instances {
        Some(path) => InstanceCatalog::from_path(path)?,
        None => InstanceCatalog::builtin(),
    };

    let workspace = args
        .workspace
        .clone()
        .or_else(|| build.common_parameters.workspace.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let graph_path = workspace.join(GRAPH_FILE);
    let digest_path = args.digest.clone().unwrap_or_else(|| workspace.join(DIGEST_FILE));

    let opts = BuildOptions {
        workspace,
        graph_path,
        digest_path,
        overwrite: args.overwrite,
        dry_run: args.dry_run,
    };

    let report = graph::compile(&registry, &build, &catalog, &opts)?;

    if args.dry_run {
        print_dry_run(&report);
    } else {
        info!(
            project = %build.common_parameters.contract_id,
            tasks = report.tasks,
            edges = report.edges,
            "build complete"
        );
        println!(
            "compiled project '{}': {} tasks, {} dependency edges",
            build.common_parameters.contract_id, report.tasks, report.edges
        );
    }

    Ok(())
}

/// Dry-run output: renderings and their would-be instance assignments.
fn print_dry_run(report: &BuildReport) {
    println!("batchdag dry-run");
    for ra in &report.rendered {
        println!("  module {} / app {} -> instance {}", ra.module, ra.app, ra.instance);
        for rendering in &ra.renderings {
            println!("    - {} ({})", rendering.name, rendering.script.display());
        }
    }
    println!("{} renderings total", report.tasks);
}
