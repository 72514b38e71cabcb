// src/app/files.rs

//! Input/output file declarations for apps.

use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

/// Item rules for multi-file declarations.
#[derive(Debug, Clone, Deserialize)]
pub struct FileItemSpec {
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    " ".to_string()
}

/// One input or output file declaration.
///
/// When no explicit `path` is given, a path is synthesised once at load
/// time from the data root, a random 32-character identifier and the first
/// declared format; re-resolving afterwards is a no-op.
#[derive(Debug, Clone, Deserialize)]
pub struct FileSpec {
    #[serde(rename = "type", default)]
    pub ty: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_items")]
    pub minitems: u32,

    #[serde(default = "default_items")]
    pub maxitems: u32,

    /// One or more file extensions; the first one names generated paths.
    #[serde(default)]
    pub formats: Vec<String>,

    #[serde(default)]
    pub item: Option<FileItemSpec>,

    /// Caller-supplied path; generated when absent.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_items() -> u32 {
    1
}

impl FileSpec {
    /// Fill in a generated path if the caller supplied none. Idempotent.
    pub fn resolve_path(&mut self, data_root: &Path) {
        if self.path.is_some() {
            return;
        }
        let ext = self.formats.first().map(String::as_str).unwrap_or("data");
        let id = Uuid::new_v4().simple().to_string();
        self.path = Some(data_root.join(format!("{id}.{ext}")).to_string_lossy().into_owned());
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}
