// src/graph/store.rs

//! Persisted build entities: Project, Modules, AppRecords, Tasks,
//! Mappings and the task dependency edge set.
//!
//! The store is an arena keyed by integer ids with edges as id pairs, so
//! the whole graph serialises to a single JSON document and acyclicity is
//! a plain graph check. Writes go to a temporary file in the same
//! directory followed by a rename, so a crashed build never leaves a
//! half-written graph file.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub type ModuleId = usize;
pub type AppId = usize;
pub type TaskId = usize;
pub type MappingId = usize;

/// One pipeline build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
}

/// Named grouping of app records and tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRow {
    pub id: ModuleId,
    pub name: String,
}

/// Build-time materialisation of an app definition inside one module,
/// with resolved resources and instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRow {
    pub id: AppId,
    pub module: ModuleId,
    pub name: String,
    pub cpu: u32,
    pub mem: String,
    pub disk: Option<String>,
    pub instance: String,
}

/// Task lifecycle state. The compiler always writes `Pending`; downstream
/// schedulers own every later transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Finished,
    Failed,
}

/// One rendered script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: TaskId,
    pub module: ModuleId,
    pub app: AppId,
    pub app_name: String,
    /// Absolute script path; unique within the project.
    pub script: PathBuf,
    pub sample: Option<String>,
    pub cpu: u32,
    pub mem: String,
    pub instance: String,
    pub status: TaskStatus,
    pub mappings: Vec<MappingId>,
}

/// A file-transfer declaration attached to a task. Deduplicated by the
/// full tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    pub id: MappingId,
    pub name: String,
    pub source: String,
    pub destination: String,
    pub is_write: bool,
    pub is_immediate: bool,
}

/// The whole persisted graph for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStore {
    pub project: Project,
    pub modules: Vec<ModuleRow>,
    pub apps: Vec<AppRow>,
    pub tasks: Vec<TaskRow>,
    pub mappings: Vec<MappingRow>,
    /// `(upstream task, downstream task)` pairs.
    pub edges: BTreeSet<(TaskId, TaskId)>,
}

impl GraphStore {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            modules: Vec::new(),
            apps: Vec::new(),
            tasks: Vec::new(),
            mappings: Vec::new(),
            edges: BTreeSet::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading graph {path:?}"))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing graph {path:?}"))
    }

    /// Durable save: temp file in the target directory, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating graph directory {parent:?}"))?;
        }
        let tmp = path.with_extension("tmp");
        let raw = serde_json::to_string_pretty(self).context("serialising graph")?;
        fs::write(&tmp, raw).with_context(|| format!("writing graph {tmp:?}"))?;
        fs::rename(&tmp, path).with_context(|| format!("committing graph {path:?}"))?;
        Ok(())
    }

    /// Find or create the module row for `name`.
    pub fn ensure_module(&mut self, name: &str) -> ModuleId {
        if let Some(row) = self.modules.iter().find(|m| m.name == name) {
            return row.id;
        }
        let id = self.modules.len();
        self.modules.push(ModuleRow { id, name: name.to_string() });
        id
    }

    pub fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        self.modules.iter().find(|m| m.name == name).map(|m| m.id)
    }

    /// Find or create the app record for `(module, name)`, refreshing its
    /// resolved resources on reuse.
    pub fn add_app(
        &mut self,
        module: ModuleId,
        name: &str,
        cpu: u32,
        mem: &str,
        disk: Option<String>,
        instance: &str,
    ) -> AppId {
        if let Some(row) = self.apps.iter_mut().find(|a| a.module == module && a.name == name) {
            row.cpu = cpu;
            row.mem = mem.to_string();
            row.disk = disk;
            row.instance = instance.to_string();
            return row.id;
        }
        let id = self.apps.len();
        self.apps.push(AppRow {
            id,
            module,
            name: name.to_string(),
            cpu,
            mem: mem.to_string(),
            disk,
            instance: instance.to_string(),
        });
        id
    }

    /// Create a task row with resources copied from its app record.
    ///
    /// Returns `None` when a task with the same script path already
    /// exists in the project; the caller logs and skips it.
    pub fn add_task(
        &mut self,
        app: AppId,
        script: PathBuf,
        sample: Option<String>,
    ) -> Option<TaskId> {
        if self.tasks.iter().any(|t| t.script == script) {
            return None;
        }
        let app_row = &self.apps[app];
        let id = self.tasks.len();
        self.tasks.push(TaskRow {
            id,
            module: app_row.module,
            app,
            app_name: app_row.name.clone(),
            script,
            sample,
            cpu: app_row.cpu,
            mem: app_row.mem.clone(),
            instance: app_row.instance.clone(),
            status: TaskStatus::Pending,
            mappings: Vec::new(),
        });
        Some(id)
    }

    /// Dedup by the full tuple: an identical mapping resolves to the
    /// existing row instead of inserting a second one.
    pub fn find_or_insert_mapping(
        &mut self,
        name: &str,
        source: &str,
        destination: &str,
        is_write: bool,
        is_immediate: bool,
    ) -> MappingId {
        if let Some(row) = self.mappings.iter().find(|m| {
            m.name == name
                && m.source == source
                && m.destination == destination
                && m.is_write == is_write
                && m.is_immediate == is_immediate
        }) {
            return row.id;
        }
        let id = self.mappings.len();
        self.mappings.push(MappingRow {
            id,
            name: name.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            is_write,
            is_immediate,
        });
        id
    }

    pub fn attach_mapping(&mut self, task: TaskId, mapping: MappingId) {
        let mappings = &mut self.tasks[task].mappings;
        if !mappings.contains(&mapping) {
            mappings.push(mapping);
        }
    }

    pub fn add_edge(&mut self, upstream: TaskId, downstream: TaskId) {
        self.edges.insert((upstream, downstream));
    }

    /// Task ids of one app within one module.
    pub fn tasks_of_app(&self, module: ModuleId, app_name: &str) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.module == module && t.app_name == app_name)
            .map(|t| t.id)
            .collect()
    }

    /// The task of one app in one module bound to a specific sample.
    pub fn task_for_sample(&self, module: ModuleId, app_name: &str, sample: &str) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|t| {
                t.module == module && t.app_name == app_name && t.sample.as_deref() == Some(sample)
            })
            .map(|t| t.id)
    }

    /// Verify the dependency relation is a DAG.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();
        for task in &self.tasks {
            graph.add_node(task.id);
        }
        for (up, down) in &self.edges {
            graph.add_edge(*up, *down, ());
        }
        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let script = self
                    .tasks
                    .get(cycle.node_id())
                    .map(|t| t.script.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("task {}", cycle.node_id()));
                Err(ConfigError::DependencyCycle { script }.into())
            }
        }
    }
}
