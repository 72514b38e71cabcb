// src/graph/digest.rs

//! Resource digest: one tab-separated line per dependency edge,
//! `upstreamScript:upstreamMem<TAB>downstreamScript:downstreamMem`,
//! consumed by the external resource monitor. Pure over the persisted
//! edge set; identical output for an unchanged graph.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::graph::store::GraphStore;

/// Render the digest text. Edge order follows the (sorted) edge set, so
/// the output is deterministic.
pub fn digest_lines(store: &GraphStore) -> String {
    let mut out = String::new();
    for (up, down) in &store.edges {
        let up = &store.tasks[*up];
        let down = &store.tasks[*down];
        let _ = writeln!(
            out,
            "{}:{}\t{}:{}",
            up.script.display(),
            up.mem,
            down.script.display(),
            down.mem
        );
    }
    out
}

/// Write the digest file, creating parent directories. An empty edge set
/// produces an empty file.
pub fn write_digest(store: &GraphStore, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating digest directory {parent:?}"))?;
    }
    fs::write(path, digest_lines(store)).with_context(|| format!("writing digest {path:?}"))
}
