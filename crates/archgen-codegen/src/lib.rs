//! Compiles an archgen IR graph into a Cargo workspace.
//!
//! This crate provides the concrete builder scopes behind the
//! `archgen_core::builder` traits and the driver that runs the compilation
//! passes over a frozen graph.
//!
//! # Modules
//!
//! - [`error`] -- Error types for all compilation failure modes
//! - [`workspace`], [`module`], [`graph`] -- The three nested builder scopes
//! - [`imports`] -- Collision-safe import aliasing
//! - [`manifest`] -- `Cargo.toml` manifests and the version policy
//! - [`render`] -- Pure text rendering of generated sources
//! - [`nodes`] -- Stock IR nodes
//! - [`compiler`] -- The pass driver

pub mod compiler;
pub mod error;
pub mod graph;
pub mod imports;
pub mod manifest;
pub mod module;
pub mod nodes;
pub mod render;
pub mod workspace;

pub use compiler::compile;
pub use error::CodegenError;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options controlling the compilation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Directory the workspace is generated into.
    pub output_dir: PathBuf,

    /// Prefix for generated module names.
    pub module_prefix: String,

    /// Short name of the application module; the module itself is
    /// `<module_prefix>_<app_name>`.
    pub app_name: String,

    /// Version given to generated modules.
    pub module_version: String,

    /// Rust edition of generated modules.
    pub edition: String,

    /// Version of `archgen-runtime` generated processes depend on.
    pub runtime_version: String,

    /// Depend on `archgen-runtime` by path instead of version.
    pub runtime_path: Option<PathBuf>,

    /// Remove an existing output directory before generating.
    pub clean: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            output_dir: PathBuf::from("./build/"),
            module_prefix: "archgen".to_string(),
            app_name: "app".to_string(),
            module_version: "0.1.0".to_string(),
            edition: "2021".to_string(),
            runtime_version: "0.1".to_string(),
            runtime_path: None,
            clean: false,
        }
    }
}

impl CompileOptions {
    /// Parses options from TOML; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, CodegenError> {
        Ok(toml::from_str(text)?)
    }
}

/// One module of a generated workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// Dependency names from the module's manifest; empty for copied modules.
    pub dependencies: Vec<String>,
    /// Whether the module was copied from an existing crate.
    pub copied: bool,
}

/// Result of a successful compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    /// Root of the generated workspace.
    pub workspace_dir: PathBuf,

    /// Every module in the workspace, in creation order.
    pub modules: Vec<ModuleSummary>,

    /// Generated files relative to `workspace_dir`, sorted.
    pub files: Vec<PathBuf>,

    /// Instances the generated process gets at startup.
    pub instances: Vec<String>,

    /// Every declared instance, dependencies first.
    pub declarations: Vec<String>,

    /// blake3 digest of every generated file's path and contents, hex.
    pub digest: String,

    /// Time taken for compilation in milliseconds.
    pub compilation_time_ms: u64,
}
