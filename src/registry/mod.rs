// src/registry/mod.rs

//! App registry: walks a pipeline directory tree, loads every app
//! definition and module dependency spec, and resolves app aliasing.
//!
//! Walk rules:
//! - a directory containing `app.yaml` is an app root; it is loaded and
//!   not descended into further
//! - a directory containing `depend.yaml` registers a module and is still
//!   descended into for nested apps

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::app::AppDefinition;
use crate::config::loader::load_depend_doc;
use crate::config::model::DependEntry;
use crate::errors::ConfigError;

pub const APP_DOC: &str = "app.yaml";
pub const DEPEND_DOC: &str = "depend.yaml";

/// A module registered from a `depend.yaml` document.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub name: String,
    pub dir: PathBuf,
    pub apps: BTreeMap<String, DependEntry>,
}

/// All apps and modules found under one pipeline root.
#[derive(Debug, Default)]
pub struct Registry {
    pub apps: BTreeMap<String, AppDefinition>,
    pub modules: BTreeMap<String, ModuleSpec>,

    /// App names skipped because their alias hint had no source app.
    /// Dependency resolution treats edges to these as warnings, not
    /// errors.
    pub skipped: BTreeSet<String>,
}

impl Registry {
    /// Walk the pipeline tree and load everything, then resolve aliases.
    pub fn load(pipeline_root: &Path) -> Result<Self> {
        let mut registry = Registry::default();

        let mut it = WalkDir::new(pipeline_root).follow_links(true).into_iter();
        while let Some(entry) = it.next() {
            let entry = entry.with_context(|| format!("walking pipeline tree {pipeline_root:?}"))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();

            if dir.join(APP_DOC).is_file() {
                let def = AppDefinition::load(dir, APP_DOC)?;
                debug!(app = %def.name, dir = ?dir, "registered app");
                if registry.apps.insert(def.name.clone(), def).is_some() {
                    warn!(dir = ?dir, "duplicate app name; later definition wins");
                }
                it.skip_current_dir();
                continue;
            }

            if dir.join(DEPEND_DOC).is_file() {
                let doc = load_depend_doc(dir.join(DEPEND_DOC))?;
                let name = doc.name.clone().unwrap_or_else(|| {
                    dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
                });
                debug!(module = %name, dir = ?dir, "registered module");
                registry.modules.insert(
                    name.clone(),
                    ModuleSpec { name, dir: dir.to_path_buf(), apps: doc.apps },
                );
            }
        }

        registry.resolve_aliases()?;
        Ok(registry)
    }

    /// Resolve app names referenced by dependency specs but absent from
    /// the registry.
    ///
    /// - `alias` present and its source registered: clone the source under
    ///   the new name with a fresh script set.
    /// - `alias` present but its source missing: warn and skip the app;
    ///   dependency resolution later reports the gaps.
    /// - no `alias`: fatal configuration error.
    fn resolve_aliases(&mut self) -> Result<()> {
        let mut clones: Vec<AppDefinition> = Vec::new();

        for spec in self.modules.values() {
            for (app_name, entry) in &spec.apps {
                if self.apps.contains_key(app_name)
                    || clones.iter().any(|c| &c.name == app_name)
                {
                    continue;
                }
                match &entry.alias {
                    Some(source) => match self.apps.get(source) {
                        Some(def) => {
                            debug!(app = %app_name, source = %source, "aliasing app");
                            clones.push(def.clone_as_alias(app_name));
                        }
                        None => {
                            warn!(
                                module = %spec.name,
                                app = %app_name,
                                source = %source,
                                "alias source not registered; skipping app"
                            );
                            self.skipped.insert(app_name.clone());
                        }
                    },
                    None => {
                        return Err(ConfigError::UnresolvedApp {
                            module: spec.name.clone(),
                            app: app_name.clone(),
                        }
                        .into());
                    }
                }
            }
        }

        for clone in clones {
            self.apps.insert(clone.name.clone(), clone);
        }
        Ok(())
    }

    /// Materialise an app for one module: clone the definition and apply
    /// the module's resource overrides and parameter defaults.
    pub fn materialize(&self, module: &str, app: &str) -> Result<AppDefinition> {
        let entry = self.depend_entry(module, app)?;
        let mut def = self
            .apps
            .get(app)
            .ok_or_else(|| ConfigError::UnresolvedApp {
                module: module.to_string(),
                app: app.to_string(),
            })?
            .clone();

        if let Some(cpu) = entry.cpu {
            def.requirements.resources.cpu = cpu;
        }
        if let Some(mem) = &entry.mem {
            def.requirements.resources.mem = mem.clone();
        }
        if let Some(defaults) = &entry.defaults {
            for (key, value) in defaults {
                if let Some(spec) = def.parameters.get_mut(key) {
                    spec.default = Some(value.clone());
                }
            }
        }

        Ok(def)
    }

    pub fn depend_entry(&self, module: &str, app: &str) -> Result<&DependEntry> {
        self.modules
            .get(module)
            .and_then(|m| m.apps.get(app))
            .ok_or_else(|| {
                ConfigError::UnresolvedApp { module: module.to_string(), app: app.to_string() }
                    .into()
            })
    }

    /// Modules whose dependency spec declares `app`.
    pub fn owners_of(&self, app: &str) -> Vec<&str> {
        self.modules
            .values()
            .filter(|m| m.apps.contains_key(app))
            .map(|m| m.name.as_str())
            .collect()
    }
}
