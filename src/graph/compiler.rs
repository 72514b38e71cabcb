// src/graph/compiler.rs

//! The build orchestrator: a strict phase sequence
//!
//! `LOAD → RENDER_APPS → PERSIST_STRUCTURE → PERSIST_DEPENDENCIES →
//! EMIT_DIGEST`
//!
//! Each phase's writes are durable before the next phase reads them.
//! Structure and dependency writes go to a staging file next to the graph
//! path; the staging file is renamed over the real graph only once the
//! edge set is complete and acyclic, so a failed build leaves the prior
//! persisted graph untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::app::AppDefinition;
use crate::config::model::{BuildDoc, DependEntry};
use crate::config::validate::validate_build;
use crate::errors::ConfigError;
use crate::graph::digest;
use crate::graph::store::{GraphStore, Project};
use crate::instance::InstanceCatalog;
use crate::registry::Registry;
use crate::render::{self, Rendering, sample_bound_script};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub workspace: PathBuf,
    pub graph_path: PathBuf,
    pub digest_path: PathBuf,
    /// Discard and recreate the persisted graph instead of extending it.
    pub overwrite: bool,
    /// Render in memory and report; persist nothing.
    pub dry_run: bool,
}

/// One module/app pair after rendering, with everything later phases
/// need.
#[derive(Debug, Clone)]
pub struct RenderedApp {
    pub module: String,
    pub app: String,
    pub def: AppDefinition,
    pub entry: DependEntry,
    /// Merged parameter block (dependency-spec defaults under build
    /// document overrides).
    pub block: Map<String, Value>,
    pub instance: String,
    pub renderings: Vec<Rendering>,
}

#[derive(Debug)]
pub struct BuildReport {
    pub rendered: Vec<RenderedApp>,
    pub tasks: usize,
    pub edges: usize,
}

/// Run the whole build.
pub fn compile(
    registry: &Registry,
    build: &BuildDoc,
    catalog: &InstanceCatalog,
    opts: &BuildOptions,
) -> Result<BuildReport> {
    validate_build(build, registry)?;

    info!(phase = "render_apps", "rendering module/app pairs");
    let rendered = render_apps(registry, build, catalog, opts)?;

    if opts.dry_run {
        let tasks = rendered.iter().map(|r| r.renderings.len()).sum();
        return Ok(BuildReport { rendered, tasks, edges: 0 });
    }

    let staging = opts.graph_path.with_extension("building.json");

    info!(phase = "persist_structure", "persisting project structure");
    let mut store = open_store(build, opts)?;
    persist_structure(&mut store, &rendered, &opts.workspace);
    store.save(&staging)?;

    info!(phase = "persist_dependencies", "persisting dependency edges");
    persist_dependencies(&mut store, registry, build, &rendered, &staging)?;
    fs::rename(&staging, &opts.graph_path)
        .with_context(|| format!("committing graph {:?}", opts.graph_path))?;

    info!(phase = "emit_digest", path = ?opts.digest_path, "emitting resource digest");
    digest::write_digest(&store, &opts.digest_path)?;

    Ok(BuildReport {
        tasks: store.tasks.len(),
        edges: store.edges.len(),
        rendered,
    })
}

/// `RENDER_APPS`: render every module/app pair declared in the build
/// document (shared blocks excluded by the typed model) and write the
/// script files.
fn render_apps(
    registry: &Registry,
    build: &BuildDoc,
    catalog: &InstanceCatalog,
    opts: &BuildOptions,
) -> Result<Vec<RenderedApp>> {
    let mut out = Vec::new();

    for module_name in build.modules.keys() {
        let Some(mspec) = registry.modules.get(module_name) else {
            continue;
        };
        for (app_name, block) in build.module_apps(module_name) {
            if registry.skipped.contains(&app_name) {
                warn!(module = %module_name, app = %app_name, "app was skipped during registration; not rendering");
                continue;
            }
            let Some(entry) = mspec.apps.get(&app_name) else {
                warn!(module = %module_name, app = %app_name, "no dependency entry for app; not rendering");
                continue;
            };

            let mut def = registry.materialize(module_name, &app_name)?;
            let resources = &def.requirements.resources;
            let instance = catalog
                .select(resources.cpu, &resources.mem, entry.instance.as_deref())?
                .name
                .clone();

            let merged = render::merged_block(entry, &block);
            let renderings = render::render_app(&def, entry, build, &block)?;
            def.scripts = renderings.iter().map(|r| r.script.to_string_lossy().into_owned()).collect();

            if !opts.dry_run {
                for rendering in &renderings {
                    let path = opts.workspace.join(&rendering.script);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("creating script directory {parent:?}"))?;
                    }
                    fs::write(&path, &rendering.content)
                        .with_context(|| format!("writing script {path:?}"))?;
                    debug!(script = ?path, "wrote script");
                }
            }

            out.push(RenderedApp {
                module: module_name.clone(),
                app: app_name.clone(),
                def,
                entry: entry.clone(),
                block: merged,
                instance,
                renderings,
            });
        }
    }

    Ok(out)
}

/// Open the persisted graph according to the overwrite/incremental mode.
fn open_store(build: &BuildDoc, opts: &BuildOptions) -> Result<GraphStore> {
    let project = Project {
        name: build.common_parameters.contract_id.clone(),
        description: build.common_parameters.project_description.clone(),
    };

    if opts.overwrite {
        if opts.graph_path.exists() {
            fs::remove_file(&opts.graph_path)
                .with_context(|| format!("removing graph {:?}", opts.graph_path))?;
        }
        return Ok(GraphStore::new(project));
    }

    if opts.graph_path.exists() {
        let store = GraphStore::load(&opts.graph_path)?;
        if store.project.name != project.name {
            warn!(
                existing = %store.project.name,
                requested = %project.name,
                "persisted graph belongs to a different project; starting fresh"
            );
            return Ok(GraphStore::new(project));
        }
        return Ok(store);
    }

    Ok(GraphStore::new(project))
}

/// `PERSIST_STRUCTURE`: module, app-record and task rows plus mapping
/// dedup.
fn persist_structure(store: &mut GraphStore, rendered: &[RenderedApp], workspace: &Path) {
    for ra in rendered {
        let module_id = store.ensure_module(&ra.module);
        let resources = &ra.def.requirements.resources;
        let app_id = store.add_app(
            module_id,
            &ra.app,
            resources.cpu,
            &resources.mem,
            resources.disk.clone(),
            &ra.instance,
        );

        for rendering in &ra.renderings {
            let script = workspace.join(&rendering.script);
            let Some(task_id) = store.add_task(app_id, script.clone(), rendering.sample.clone())
            else {
                warn!(script = ?script, "duplicate script path; skipping task");
                continue;
            };

            for (name, value) in &ra.block {
                let Value::Object(obj) = value else { continue };
                let (Some(local), Some(oss)) = (
                    obj.get("local").and_then(Value::as_str),
                    obj.get("oss").and_then(Value::as_str),
                ) else {
                    continue;
                };
                let is_write = ra.def.outputs.contains_key(name);
                let is_immediate = obj.get("immediate").and_then(Value::as_bool).unwrap_or(false);
                let (source, destination) =
                    if is_write { (local, oss) } else { (oss, local) };
                let mapping =
                    store.find_or_insert_mapping(name, source, destination, is_write, is_immediate);
                store.attach_mapping(task_id, mapping);
            }
        }
    }
}

/// `PERSIST_DEPENDENCIES`: resolve every declared upstream to its owning
/// module and link tasks, module by module, committing each module's
/// edges before resolving the next.
fn persist_dependencies(
    store: &mut GraphStore,
    registry: &Registry,
    build: &BuildDoc,
    rendered: &[RenderedApp],
    staging: &Path,
) -> Result<()> {
    for module_name in build.modules.keys() {
        let module_apps: Vec<&RenderedApp> =
            rendered.iter().filter(|r| &r.module == module_name).collect();
        if module_apps.is_empty() {
            continue;
        }

        for ra in module_apps {
            let upstreams = ra.entry.depends.clone().unwrap_or_default();
            for upstream in &upstreams {
                let Some(owner) = resolve_owner(registry, module_name, &ra.app, upstream)? else {
                    continue;
                };
                link_app(store, registry, build, ra, upstream, &owner)?;
            }
        }

        store.check_acyclic()?;
        store.save(staging)?;
        debug!(module = %module_name, "dependency edges committed");
    }

    Ok(())
}

/// The module owning an upstream app: same-module declarations take
/// precedence; otherwise exactly one other module must declare it.
fn resolve_owner(
    registry: &Registry,
    module: &str,
    app: &str,
    upstream: &str,
) -> Result<Option<String>> {
    if let Some(mspec) = registry.modules.get(module) {
        if mspec.apps.contains_key(upstream) {
            return Ok(Some(module.to_string()));
        }
    }

    let owners = registry.owners_of(upstream);
    match owners.len() {
        1 => Ok(Some(owners[0].to_string())),
        0 => {
            if registry.skipped.contains(upstream) || !registry.apps.contains_key(upstream) {
                warn!(app = %app, upstream = %upstream, "upstream app not registered; no edge created");
                Ok(None)
            } else {
                Err(ConfigError::NoUpstreamOwner {
                    app: app.to_string(),
                    upstream: upstream.to_string(),
                }
                .into())
            }
        }
        _ => Err(ConfigError::AmbiguousUpstream {
            app: app.to_string(),
            upstream: upstream.to_string(),
            candidates: owners.into_iter().map(str::to_string).collect(),
        }
        .into()),
    }
}

/// Link one app to one upstream app: sample-by-sample when both script
/// templates are sample-bound, full cross-linking otherwise.
fn link_app(
    store: &mut GraphStore,
    registry: &Registry,
    build: &BuildDoc,
    ra: &RenderedApp,
    upstream: &str,
    owner: &str,
) -> Result<()> {
    let up_entry = registry.depend_entry(owner, upstream)?;

    let Some(down_module) = store.module_by_name(&ra.module) else {
        warn!(module = %ra.module, "module has no persisted structure; no edges created");
        return Ok(());
    };
    let Some(up_module) = store.module_by_name(owner) else {
        warn!(module = %owner, upstream = %upstream, "upstream module has no persisted structure; no edges created");
        return Ok(());
    };

    let up_tasks = store.tasks_of_app(up_module, upstream);
    if up_tasks.is_empty() {
        warn!(upstream = %upstream, "upstream app has no persisted tasks; no edges created");
        return Ok(());
    }

    let both_bound = sample_bound_script(&ra.entry.sh_file) && sample_bound_script(&up_entry.sh_file);
    if both_bound {
        for sample in &build.samples {
            let down = store.task_for_sample(down_module, &ra.app, &sample.sample_name);
            let up = store.task_for_sample(up_module, upstream, &sample.sample_name);
            if let (Some(down), Some(up)) = (down, up) {
                store.add_edge(up, down);
            }
        }
    } else {
        let down_tasks = store.tasks_of_app(down_module, &ra.app);
        for down in &down_tasks {
            for up in &up_tasks {
                store.add_edge(*up, *down);
            }
        }
    }

    Ok(())
}
