// src/config/validate.rs

use anyhow::Result;
use tracing::warn;

use crate::config::model::BuildDoc;
use crate::errors::ConfigError;
use crate::registry::Registry;
use crate::render;

/// Semantic validation run before any rendering or persistence.
///
/// Checks:
/// - every module/app dependency entry carries the required `depends` key
/// - at most one app block per module owns plan (list-valued) parameters
/// - module blocks in the build document correspond to registered modules
///   (a missing module is only a warning; the block is skipped later)
pub fn validate_build(build: &BuildDoc, registry: &Registry) -> Result<()> {
    for spec in registry.modules.values() {
        for (app_name, entry) in &spec.apps {
            if entry.depends.is_none() {
                return Err(ConfigError::MissingDepends {
                    module: spec.name.clone(),
                    app: app_name.clone(),
                }
                .into());
            }
        }
    }

    for module_name in build.modules.keys() {
        if !registry.modules.contains_key(module_name) {
            warn!(module = %module_name, "build document names a module with no dependency spec");
            continue;
        }
        let apps = build.module_apps(module_name);
        render::plan_owner(&apps, |name| registry.materialize(module_name, name).ok())?;
    }

    Ok(())
}
