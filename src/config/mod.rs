// src/config/mod.rs

//! Configuration documents for batchdag.
//!
//! Responsibilities:
//! - Expand composition directives in any document (`expand.rs`).
//! - Define the typed document models (`model.rs`).
//! - Load documents from disk (`loader.rs`).
//! - Validate semantic invariants before compilation (`validate.rs`).

pub mod expand;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_build_doc, load_depend_doc};
pub use model::{BuildDoc, CommonParameters, DependDoc, DependEntry, Sample};
pub use validate::validate_build;
