// src/config/expand.rs

//! Document expansion: resolves the composition directives recognised in
//! every configuration document (app definitions, dependency specs, build
//! parameter documents).
//!
//! Directives are YAML local tags on scalars:
//!
//! - `!include <path>`: splice another document in, path relative to the
//!   including document's directory unless absolute
//! - `!range <start>..<stop>`: inclusive integer sequence
//! - `!ref <dotted.keys>`: value of a sibling field in the same document
//! - `!mapping <local>:<remote>`: a `{local, oss}` transfer pair
//! - `!plan a;b;c` or `!plan ~case|control@method`: combinatorial plan
//!
//! Expansion is pure apart from reading included files. `!ref` is resolved
//! in a second pass against the document's own fully-expanded tree, so a
//! field may reference a sibling defined before or after it.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_yaml::Value;
use serde_yaml::value::TaggedValue;

use crate::errors::ConfigError;

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(-?\d+)\.\.(-?\d+)\s*$").unwrap())
}

fn contrast_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^~([^|]+)\|([^@]+)@(.+)$").unwrap())
}

/// Load a document and return it with every directive resolved, converted
/// to the JSON value model used by the rest of the crate.
pub fn load_document(path: impl AsRef<Path>) -> Result<serde_json::Value> {
    let value = expand_file(path.as_ref())?;
    Ok(to_json(value))
}

/// Load and expand a document, keeping the YAML value model.
pub fn expand_file(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading document {path:?}"))?;
    let parsed: Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing YAML from {path:?}"))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let expanded = expand(parsed, base_dir, path)?;

    // Second pass: `!ref` lookups against the document's own top level.
    let root = expanded.clone();
    resolve_refs(expanded, &root, path, 0)
}

/// First pass: includes, ranges, mappings and plans. `!ref` scalars are
/// left in place for the second pass.
fn expand(value: Value, base_dir: &Path, doc: &Path) -> Result<Value> {
    match value {
        Value::Tagged(tagged) => expand_tagged(*tagged, base_dir, doc),
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, expand(v, base_dir, doc)?);
            }
            Ok(Value::Mapping(out))
        }
        Value::Sequence(seq) => {
            let items = seq
                .into_iter()
                .map(|v| expand(v, base_dir, doc))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Sequence(items))
        }
        other => Ok(other),
    }
}

fn expand_tagged(tagged: TaggedValue, base_dir: &Path, doc: &Path) -> Result<Value> {
    let tag = tagged.tag.to_string();
    match tag.trim_start_matches('!') {
        "include" => {
            let rel = scalar_text(&tagged.value);
            let target = Path::new(&rel);
            let target = if target.is_absolute() {
                target.to_path_buf()
            } else {
                base_dir.join(target)
            };
            expand_file(&target).with_context(|| format!("including {target:?} from {doc:?}"))
        }
        "range" => expand_range(&tagged.value, doc),
        "mapping" => expand_mapping(&tagged.value),
        "plan" => expand_plan(&tagged.value),
        // Resolved in the second pass, once the whole tree is known.
        "ref" => Ok(Value::Tagged(Box::new(tagged))),
        other => {
            tracing::warn!(tag = %other, doc = ?doc, "unrecognised document tag; keeping value as-is");
            expand(tagged.value, base_dir, doc)
        }
    }
}

fn expand_range(value: &Value, doc: &Path) -> Result<Value> {
    let text = scalar_text(value);
    let caps = range_re().captures(&text).ok_or_else(|| ConfigError::MalformedRange {
        text: text.clone(),
        doc: doc.to_path_buf(),
    })?;
    let start: i64 = caps[1].parse().with_context(|| format!("range start in '{text}'"))?;
    let stop: i64 = caps[2].parse().with_context(|| format!("range stop in '{text}'"))?;
    let items = (start..=stop).map(|n| Value::Number(n.into())).collect();
    Ok(Value::Sequence(items))
}

fn expand_mapping(value: &Value) -> Result<Value> {
    let text = scalar_text(value);
    let (local, remote) = text
        .split_once(':')
        .filter(|(l, r)| !l.is_empty() && !r.is_empty())
        .ok_or_else(|| ConfigError::MalformedMapping { text: text.clone() })?;

    let mut out = serde_yaml::Mapping::new();
    out.insert("local".into(), Value::String(local.to_string()));
    out.insert("oss".into(), Value::String(remote.to_string()));
    Ok(Value::Mapping(out))
}

fn expand_plan(value: &Value) -> Result<Value> {
    let text = scalar_text(value);

    if let Some(caps) = contrast_re().captures(&text) {
        let mut out = serde_yaml::Mapping::new();
        out.insert("case".into(), Value::String(caps[1].to_string()));
        out.insert("control".into(), Value::String(caps[2].to_string()));
        out.insert("method".into(), Value::String(caps[3].to_string()));
        return Ok(Value::Mapping(out));
    }

    if text.contains(';') {
        let elements = text
            .split(';')
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.trim().to_string()))
            .collect();
        let mut out = serde_yaml::Mapping::new();
        out.insert("elements".into(), Value::Sequence(elements));
        return Ok(Value::Mapping(out));
    }

    Err(ConfigError::MalformedPlan { text }.into())
}

/// Second pass: substitute every `!ref` scalar with the value found by
/// walking its dotted key path from the document root.
fn resolve_refs(value: Value, root: &Value, doc: &Path, depth: usize) -> Result<Value> {
    if depth > 16 {
        bail!("reference loop while resolving document {doc:?}");
    }
    match value {
        Value::Tagged(tagged) if tagged.tag.to_string().trim_start_matches('!') == "ref" => {
            let path = scalar_text(&tagged.value);
            let target = lookup(root, &path).ok_or_else(|| ConfigError::RefNotFound {
                path: path.clone(),
                doc: doc.to_path_buf(),
            })?;
            resolve_refs(target.clone(), root, doc, depth + 1)
        }
        Value::Tagged(tagged) => {
            // Unknown tags survived the first pass; resolve inside them.
            resolve_refs(tagged.value, root, doc, depth)
        }
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, resolve_refs(v, root, doc, depth)?);
            }
            Ok(Value::Mapping(out))
        }
        Value::Sequence(seq) => {
            let items = seq
                .into_iter()
                .map(|v| resolve_refs(v, root, doc, depth))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Sequence(items))
        }
        other => Ok(other),
    }
}

/// Walk a dotted key path (`a.b.c`) into a mapping tree.
pub fn lookup<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in dotted.split('.') {
        match current {
            Value::Mapping(map) => {
                current = map.get(key)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

/// Convert an expanded YAML tree into the JSON value model. Non-string
/// mapping keys are stringified.
pub fn to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::Number(u.into())
            } else {
                serde_json::Number::from_f64(n.as_f64().unwrap_or(0.0))
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => serde_json::Value::String(s),
        Value::Sequence(seq) => serde_json::Value::Array(seq.into_iter().map(to_json).collect()),
        Value::Mapping(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => s,
                    other => scalar_text(&other),
                };
                out.insert(key, to_json(v));
            }
            serde_json::Value::Object(out)
        }
        Value::Tagged(tagged) => to_json(tagged.value),
    }
}
