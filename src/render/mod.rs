// src/render/mod.rs

//! Command template rendering.
//!
//! An app's `cmd_template` is rendered against a merged namespace built
//! from `CommonData`/`CommonParameters`, the sample's fields and the
//! module/app parameter block. Expansion axis, in priority order:
//!
//! 1. per-sample: the command or script-path template references a
//!    sample field, so there is one rendering per declared sample
//! 2. per-plan: list-valued parameters in exactly one app block form the
//!    dimensions of a cross product, one rendering per point
//! 3. neither: a single rendering
//!
//! Declared parameters contribute their *formatted* command-line token
//! under the parameter name; declared inputs/outputs contribute their
//! resolved paths.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context as _, Result};
use regex::Regex;
use serde_json::{Map, Value};
use tera::{Context, Tera};
use tracing::warn;

use crate::app::AppDefinition;
use crate::app::params::scalar_text;
use crate::config::model::{BuildDoc, DependEntry};
use crate::errors::ConfigError;

/// Separator between `key.value` pairs in plan variant names.
const PLAN_PAIR_SEP: &str = "-";

/// One rendered output unit.
#[derive(Debug, Clone)]
pub struct Rendering {
    /// Display name: `<sample>.<app>`, `<app>.<plan label>` or the app
    /// name.
    pub name: String,
    pub content: String,
    /// Script path relative to the workspace (the rendered `sh_file`).
    pub script: PathBuf,
    /// Bound sample name for per-sample renderings.
    pub sample: Option<String>,
}

fn expr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(.*?)\}\}|\{%(.*?)%\}").unwrap())
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap())
}

/// Identifiers referenced inside a template's expression and statement
/// blocks.
fn template_identifiers(source: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for caps in expr_re().captures_iter(source) {
        let inner = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
        for ident in ident_re().find_iter(inner) {
            out.insert(ident.as_str().to_string());
        }
    }
    out
}

/// Whether a template references any per-sample field.
pub fn references_sample(source: &str, sample_fields: &[String]) -> bool {
    let idents = template_identifiers(source);
    sample_fields.iter().any(|f| idents.contains(f))
}

/// Whether a script-path template is parameterised by the sample name.
/// Dependency linking uses this to decide per-sample vs cross linking.
pub fn sample_bound_script(sh_file: &str) -> bool {
    template_identifiers(sh_file).contains("sample_name")
}

/// The plan dimensions of one app block: keys with list values (unless
/// the parameter itself is array-typed) and `{elements: [...]}` plan
/// scalars.
pub fn plan_axes(def: &AppDefinition, block: &Map<String, Value>) -> Vec<(String, Vec<Value>)> {
    let mut axes = Vec::new();
    for (key, value) in block {
        let is_array_param =
            def.parameters.get(key).map(|p| p.ty == crate::app::ParamType::Array).unwrap_or(false);
        match value {
            Value::Array(items) if !is_array_param && !items.is_empty() => {
                axes.push((key.clone(), items.clone()));
            }
            Value::Object(obj) => {
                if let Some(Value::Array(items)) = obj.get("elements") {
                    axes.push((key.clone(), items.clone()));
                }
            }
            _ => {}
        }
    }
    axes
}

/// Render one module/app pair across its expansion axis.
pub fn render_app(
    def: &AppDefinition,
    entry: &DependEntry,
    build: &BuildDoc,
    block: &Map<String, Value>,
) -> Result<Vec<Rendering>> {
    let base = base_context(build);
    let block = merged_block(entry, block);
    let sample_fields = build.sample_fields();

    let per_sample = !build.samples.is_empty()
        && (references_sample(&def.cmd_template, &sample_fields)
            || references_sample(&entry.sh_file, &sample_fields));

    if per_sample {
        let mut out = Vec::with_capacity(build.samples.len());
        for sample in &build.samples {
            let mut ctx = base.clone();
            for (k, v) in sample.context_fields() {
                ctx.insert(k, v);
            }
            overlay_app(&mut ctx, def, &block);
            let content = render_one(&def.cmd_template, &ctx, &def.name)?;
            let script = render_one(&entry.sh_file, &ctx, &def.name)?;
            out.push(Rendering {
                name: format!("{}.{}", sample.sample_name, def.name),
                content,
                script: PathBuf::from(script),
                sample: Some(sample.sample_name.clone()),
            });
        }
        return Ok(out);
    }

    let axes = plan_axes(def, &block);
    if !axes.is_empty() {
        let mut out = Vec::new();
        for point in cross_product(&axes) {
            let mut point_block = block.clone();
            let mut label_pairs = Vec::with_capacity(point.len());
            for (key, value) in &point {
                point_block.insert(key.clone(), value.clone());
                label_pairs.push(format!("{key}.{}", escape_component(&scalar_text(value))));
            }
            let label = label_pairs.join(PLAN_PAIR_SEP);

            let mut ctx = base.clone();
            overlay_app(&mut ctx, def, &point_block);
            let content = render_one(&def.cmd_template, &ctx, &def.name)?;
            let script = render_one(&entry.sh_file, &ctx, &def.name)?;
            out.push(Rendering {
                name: format!("{}.{label}", def.name),
                content,
                script: with_variant(&script, &label),
                sample: None,
            });
        }
        return Ok(out);
    }

    let mut ctx = base;
    overlay_app(&mut ctx, def, &block);
    let content = render_one(&def.cmd_template, &ctx, &def.name)?;
    let script = render_one(&entry.sh_file, &ctx, &def.name)?;
    Ok(vec![Rendering {
        name: def.name.clone(),
        content,
        script: PathBuf::from(script),
        sample: None,
    }])
}

/// Shared context: `CommonData`, then the `CommonParameters` fields under
/// their document names, then `Groups` when present.
fn base_context(build: &BuildDoc) -> Map<String, Value> {
    let mut ctx = build.common_data.clone().unwrap_or_default();

    let cp = &build.common_parameters;
    ctx.insert("ContractID".to_string(), Value::String(cp.contract_id.clone()));
    ctx.insert(
        "project_description".to_string(),
        Value::String(cp.project_description.clone()),
    );
    if let Some(ws) = &cp.workspace {
        ctx.insert("WORKSPACE".to_string(), Value::String(ws.clone()));
    }
    if let Some(max_job) = cp.max_job {
        ctx.insert("MAX_JOB".to_string(), Value::Number(max_job.into()));
    }
    if let Some(backend) = &cp.backend {
        ctx.insert("BACKEND".to_string(), Value::String(backend.clone()));
    }
    if let Some(mns) = &cp.mns {
        ctx.insert("MNS".to_string(), Value::String(mns.clone()));
    }
    for (k, v) in &cp.extra {
        ctx.insert(k.clone(), v.clone());
    }

    if let Some(groups) = &build.groups {
        ctx.insert("Groups".to_string(), groups.clone());
    }

    ctx
}

/// Dependency-spec defaults underlaid beneath the build document's app
/// block.
pub fn merged_block(entry: &DependEntry, block: &Map<String, Value>) -> Map<String, Value> {
    let mut out = entry.defaults.clone().unwrap_or_default();
    for (k, v) in block {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Overlay an app's parameter block onto the context: raw values first,
/// then formatted tokens for declared parameters and resolved paths for
/// declared files.
fn overlay_app(ctx: &mut Map<String, Value>, def: &AppDefinition, block: &Map<String, Value>) {
    for (k, v) in block {
        ctx.insert(k.clone(), v.clone());
    }

    for (name, spec) in &def.parameters {
        let formatted = spec.format(block.get(name));
        ctx.insert(name.clone(), Value::String(formatted));
    }

    for (name, file) in def.inputs.iter().chain(def.outputs.iter()) {
        let supplied = block.get(name);
        let path = match supplied {
            Some(Value::Object(obj)) => obj.get("local").map(scalar_text),
            Some(other) => Some(scalar_text(other)),
            None => file.path().map(str::to_string),
        };
        if let Some(path) = path {
            // Best-effort check on caller-supplied input paths only;
            // generated paths exist only at run time.
            if supplied.is_some()
                && def.inputs.contains_key(name)
                && !Path::new(&path).exists()
            {
                warn!(app = %def.name, input = %name, path = %path, "input path does not exist");
            }
            ctx.insert(name.clone(), Value::String(path));
        }
    }
}

fn render_one(template: &str, ctx: &Map<String, Value>, app: &str) -> Result<String> {
    let context = Context::from_serialize(ctx)
        .with_context(|| format!("building template context for app '{app}'"))?;
    Tera::one_off(template, &context, false)
        .with_context(|| format!("rendering template of app '{app}'"))
}

/// All points of the cross product over the plan dimensions, in axis
/// order.
fn cross_product(axes: &[(String, Vec<Value>)]) -> Vec<Vec<(String, Value)>> {
    let mut points: Vec<Vec<(String, Value)>> = vec![Vec::new()];
    for (key, values) in axes {
        let mut next = Vec::with_capacity(points.len() * values.len());
        for point in &points {
            for value in values {
                let mut extended = point.clone();
                extended.push((key.clone(), value.clone()));
                next.push(extended);
            }
        }
        points = next;
    }
    points
}

/// Escape characters that would collide with path separators in variant
/// names.
fn escape_component(text: &str) -> String {
    text.replace(['/', '\\'], "_")
}

/// `shell/app.sh` + `k.v` → `shell/app.k.v.sh`
fn with_variant(script: &str, label: &str) -> PathBuf {
    let path = Path::new(script);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => path.with_file_name(format!(
            "{}.{label}.{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        )),
        _ => PathBuf::from(format!("{script}.{label}")),
    }
}

/// Find the single app block in a module allowed to own plan dimensions.
/// More than one is a fatal ambiguity.
pub fn plan_owner(
    apps: &[(String, Map<String, Value>)],
    lookup_def: impl Fn(&str) -> Option<AppDefinition>,
) -> Result<Option<String>> {
    let mut owners = Vec::new();
    for (name, block) in apps {
        if let Some(def) = lookup_def(name) {
            if !plan_axes(&def, block).is_empty() {
                owners.push(name.clone());
            }
        }
    }
    match owners.len() {
        0 | 1 => Ok(owners.pop()),
        _ => Err(ConfigError::AmbiguousPlan { apps: owners }.into()),
    }
}
