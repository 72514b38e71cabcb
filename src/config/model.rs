// src/config/model.rs

//! Typed models for the three document kinds the compiler consumes:
//!
//! - the build parameter document (one per build)
//! - per-module dependency specs (`depend.yaml`)
//! - app definitions live in [`crate::app::definition`]
//!
//! Unknown top-level shapes are rejected at load time: anything in the
//! build document that is not one of the shared blocks must be a module
//! block mapping app names to parameter maps.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// The build parameter document.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildDoc {
    #[serde(rename = "CommonParameters")]
    pub common_parameters: CommonParameters,

    #[serde(rename = "Samples", default)]
    pub samples: Vec<Sample>,

    /// Sample groupings for contrast-style plans; carried verbatim into
    /// the render context.
    #[serde(rename = "Groups", default)]
    pub groups: Option<Value>,

    #[serde(rename = "CommonData", default)]
    pub common_data: Option<Map<String, Value>>,

    /// Every remaining top-level key is a module block: app name →
    /// parameter overrides (possibly empty).
    #[serde(flatten)]
    pub modules: BTreeMap<String, BTreeMap<String, Option<Map<String, Value>>>>,
}

impl BuildDoc {
    /// The app blocks of one module, with absent blocks normalised to
    /// empty maps.
    pub fn module_apps(&self, module: &str) -> Vec<(String, Map<String, Value>)> {
        self.modules
            .get(module)
            .map(|apps| {
                apps.iter()
                    .map(|(name, block)| (name.clone(), block.clone().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Union of field names across all declared samples.
    pub fn sample_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = vec!["sample_name".to_string()];
        for sample in &self.samples {
            for key in sample.fields.keys() {
                if !fields.iter().any(|f| f == key) {
                    fields.push(key.clone());
                }
            }
        }
        fields
    }
}

/// `CommonParameters` block. Project identity plus backend knobs; extra
/// keys are kept and exposed to templates.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonParameters {
    #[serde(rename = "ContractID")]
    pub contract_id: String,

    #[serde(default)]
    pub project_description: String,

    #[serde(rename = "WORKSPACE", default)]
    pub workspace: Option<String>,

    #[serde(rename = "MAX_JOB", default)]
    pub max_job: Option<u32>,

    #[serde(rename = "BACKEND", default)]
    pub backend: Option<String>,

    #[serde(rename = "MNS", default)]
    pub mns: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One declared sample: a name plus free-form per-sample fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    pub sample_name: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Sample {
    /// All fields including `sample_name`, for overlaying onto a render
    /// context.
    pub fn context_fields(&self) -> Map<String, Value> {
        let mut out = self.fields.clone();
        out.insert("sample_name".to_string(), Value::String(self.sample_name.clone()));
        out
    }
}

/// A per-module dependency spec document.
#[derive(Debug, Clone, Deserialize)]
pub struct DependDoc {
    /// Module name; the directory name is used when absent.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(flatten)]
    pub apps: BTreeMap<String, DependEntry>,
}

/// One app entry inside a module's dependency spec.
#[derive(Debug, Clone, Deserialize)]
pub struct DependEntry {
    /// Script path template, relative to the workspace. May reference
    /// sample fields.
    pub sh_file: String,

    /// Upstream app names. Required; `None` here is a fatal
    /// configuration error surfaced during validation.
    #[serde(default)]
    pub depends: Option<Vec<String>>,

    /// Parameter defaults applied under the build document's overrides.
    #[serde(default)]
    pub defaults: Option<Map<String, Value>>,

    /// Resource overrides applied over the app definition.
    #[serde(default)]
    pub cpu: Option<u32>,

    #[serde(default)]
    pub mem: Option<String>,

    /// Explicit instance assignment; bypasses cheapest-fit selection.
    #[serde(default)]
    pub instance: Option<String>,

    /// Source app to clone when this name is not a registered app.
    #[serde(default)]
    pub alias: Option<String>,
}
