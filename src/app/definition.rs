// src/app/definition.rs

//! App definition documents: a reusable, parameterised command-line tool
//! description loaded from an app root directory.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::app::files::FileSpec;
use crate::app::params::ParameterSpec;
use crate::config::expand;

/// Root for generated data-file paths (file declarations without an
/// explicit path).
pub const DATA_ROOT: &str = "/data";

#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub image: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resources {
    #[serde(default = "default_cpu")]
    pub cpu: u32,

    /// Memory requirement in document form, e.g. `512M` or `8G`.
    #[serde(default = "default_mem")]
    pub mem: String,

    #[serde(default)]
    pub disk: Option<String>,

    #[serde(default)]
    pub network: Option<String>,

    #[serde(default)]
    pub port: Vec<u16>,
}

fn default_cpu() -> u32 {
    1
}

fn default_mem() -> String {
    "1G".to_string()
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            mem: default_mem(),
            disk: None,
            network: None,
            port: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub container: Option<Container>,

    #[serde(default)]
    pub resources: Resources,
}

/// A parsed app definition. Immutable once loaded; aliasing clones it
/// under a new identity with an empty script set.
#[derive(Debug, Clone, Deserialize)]
pub struct AppDefinition {
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub requirements: Requirements,

    #[serde(default)]
    pub inputs: BTreeMap<String, FileSpec>,

    #[serde(default)]
    pub outputs: BTreeMap<String, FileSpec>,

    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,

    #[serde(default)]
    pub cmd_template: String,

    /// Names of scripts rendered from this definition in this build.
    #[serde(skip)]
    pub scripts: Vec<String>,
}

impl AppDefinition {
    /// Load the definition document found in `dir`. The directory name is
    /// the app's name.
    pub fn load(dir: &Path, doc_name: &str) -> Result<Self> {
        let doc_path = dir.join(doc_name);
        let value = expand::load_document(&doc_path)?;
        let mut def: AppDefinition = serde_json::from_value(value)
            .with_context(|| format!("invalid app definition in {doc_path:?}"))?;

        def.name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let data_root = Path::new(DATA_ROOT);
        for spec in def.inputs.values_mut().chain(def.outputs.values_mut()) {
            spec.resolve_path(data_root);
        }

        Ok(def)
    }

    /// Clone this definition under a new name with a fresh script set.
    pub fn clone_as_alias(&self, name: &str) -> Self {
        let mut clone = self.clone();
        clone.name = name.to_string();
        clone.scripts = Vec::new();
        clone
    }
}
