// src/config/loader.rs

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::expand;
use crate::config::model::{BuildDoc, DependDoc};

/// Load the build parameter document: expand directives, then deserialize
/// into the typed model. Semantic validation (dependency keys, plan
/// ownership) happens separately in [`crate::config::validate`].
pub fn load_build_doc(path: impl AsRef<Path>) -> Result<BuildDoc> {
    let path = path.as_ref();
    let value = expand::load_document(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("invalid build parameter document {path:?}"))
}

/// Load a module's dependency spec document.
pub fn load_depend_doc(path: impl AsRef<Path>) -> Result<DependDoc> {
    let path = path.as_ref();
    let value = expand::load_document(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("invalid dependency spec document {path:?}"))
}
