// src/instance.rs

//! Compute instance catalog and cheapest-fit selection.
//!
//! The catalog is read-only reference data: either the builtin table or a
//! YAML document passed on the command line. It is loaded once at process
//! start and shared by reference.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::errors::ConfigError;

/// One selectable compute shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub name: String,
    pub cpu: u32,
    /// Memory in document form, e.g. `8G`.
    pub mem: String,
    #[serde(default)]
    pub disk_type: Option<String>,
    #[serde(default)]
    pub disk_size: Option<u32>,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct InstanceCatalog {
    rows: Vec<Instance>,
}

impl InstanceCatalog {
    pub fn new(rows: Vec<Instance>) -> Self {
        Self { rows }
    }

    /// Load a catalog document: a YAML list of instance rows.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading instance catalog {path:?}"))?;
        let rows: Vec<Instance> = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing instance catalog {path:?}"))?;
        Ok(Self { rows })
    }

    /// The builtin catalog used when no document is supplied.
    pub fn builtin() -> Self {
        let rows = [
            ("ecs.sn1ne.large", 2, "4G", 0.42),
            ("ecs.sn2ne.large", 2, "8G", 0.56),
            ("ecs.sn1ne.xlarge", 4, "8G", 0.84),
            ("ecs.sn2ne.xlarge", 4, "16G", 1.12),
            ("ecs.sn1ne.2xlarge", 8, "16G", 1.68),
            ("ecs.sn2ne.2xlarge", 8, "32G", 2.24),
            ("ecs.sn2ne.4xlarge", 16, "64G", 4.48),
            ("ecs.se1.8xlarge", 32, "128G", 8.96),
        ];
        Self::new(
            rows.iter()
                .map(|(name, cpu, mem, price)| Instance {
                    name: name.to_string(),
                    cpu: *cpu,
                    mem: mem.to_string(),
                    disk_type: Some("cloud_efficiency".to_string()),
                    disk_size: Some(40),
                    price: *price,
                })
                .collect(),
        )
    }

    /// Pick an instance for a task.
    ///
    /// With an explicit name, look it up; otherwise the lowest-price row
    /// satisfying `cpu` and `mem`, ties broken by catalog order.
    pub fn select(&self, cpu: u32, mem: &str, explicit: Option<&str>) -> Result<&Instance> {
        if let Some(name) = explicit {
            return self
                .rows
                .iter()
                .find(|row| row.name == name)
                .ok_or_else(|| ConfigError::InstanceNotFound { name: name.to_string() }.into());
        }

        let wanted = mem_to_gib(mem)?;
        let mut best: Option<&Instance> = None;
        for row in &self.rows {
            if row.cpu < cpu || mem_to_gib(&row.mem)? < wanted {
                continue;
            }
            if best.map(|b| row.price < b.price).unwrap_or(true) {
                best = Some(row);
            }
        }
        best.ok_or_else(|| {
            ConfigError::NoInstance { cpu, mem: mem.to_string() }.into()
        })
    }
}

/// Normalise a memory size to GiB: `512M` → 0.5, `8G` → 8.0, bare numbers
/// are GiB.
pub fn mem_to_gib(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let (digits, scale) = match trimmed.chars().last() {
        Some('M') | Some('m') => (&trimmed[..trimmed.len() - 1], 1.0 / 1024.0),
        Some('G') | Some('g') => (&trimmed[..trimmed.len() - 1], 1.0),
        _ => (trimmed, 1.0),
    };
    let value: f64 = digits
        .parse()
        .map_err(|_| ConfigError::InvalidMemSize { text: text.to_string() })?;
    Ok(value * scale)
}
