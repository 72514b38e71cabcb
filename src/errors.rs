// src/errors.rs

//! Crate-wide error types.
//!
//! Configuration errors are fatal: they abort the whole build and are
//! propagated unchanged through `anyhow` to the top level. Recoverable
//! conditions (duplicate mappings, duplicate script paths, unresolvable
//! upstream names) are handled where they occur and logged as warnings;
//! they never appear here.

use std::path::PathBuf;

use thiserror::Error;

pub use anyhow::{Error, Result};

/// Fatal configuration errors. Any of these terminates the compiler run
/// with no partial success.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown parameter type '{ty}' (expected integer, number, float, string, flag, boolean or array)")]
    UnknownParamType { ty: String },

    #[error("malformed range directive '{text}' in {doc}: expected '<start>..<stop>' with integer bounds")]
    MalformedRange { text: String, doc: PathBuf },

    #[error("malformed plan directive '{text}': expected ';'-separated elements or '~case|control@method'")]
    MalformedPlan { text: String },

    #[error("malformed mapping directive '{text}': expected '<local>:<remote>'")]
    MalformedMapping { text: String },

    #[error("unresolved reference '{path}' in {doc}")]
    RefNotFound { path: String, doc: PathBuf },

    #[error("module '{module}', app '{app}': missing required `depends` key")]
    MissingDepends { module: String, app: String },

    #[error("module '{module}' references app '{app}' which is neither a known app nor aliased from one")]
    UnresolvedApp { module: String, app: String },

    #[error("upstream app '{upstream}' of '{app}' is declared by no module's dependency spec")]
    NoUpstreamOwner { app: String, upstream: String },

    #[error("upstream app '{upstream}' of '{app}' is declared by multiple modules: {}", .candidates.join(", "))]
    AmbiguousUpstream {
        app: String,
        upstream: String,
        candidates: Vec<String>,
    },

    #[error("ambiguous plan ownership: list-valued parameters in more than one app block: {}", .apps.join(", "))]
    AmbiguousPlan { apps: Vec<String> },

    #[error("no proper instance found for cpu={cpu}, mem={mem}")]
    NoInstance { cpu: u32, mem: String },

    #[error("no proper instance found with name '{name}'")]
    InstanceNotFound { name: String },

    #[error("invalid memory size '{text}': expected a number with optional M/G suffix")]
    InvalidMemSize { text: String },

    #[error("dependency cycle detected involving task '{script}'")]
    DependencyCycle { script: String },
}
