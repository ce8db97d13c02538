//! Builder-scope contracts handed to capability handlers.
//!
//! Compilation runs inside three nested scopes: a workspace (the whole
//! output tree) owns modules, and a module owns graph scopes (one generated
//! namespace file each). Every scope keeps its own visited-set, so a node is
//! handled at most once per scope even when many paths reach it, while the
//! same node is still handled independently by each scope it takes part in.
//!
//! The concrete scopes live in `archgen-codegen`; handlers only see these
//! traits.

use std::path::{Path, PathBuf};

use crate::code::{Constructor, TypeName};
use crate::error::BuildError;
use crate::graph::IrGraph;
use crate::id::NodeId;

/// Per-scope visited-set.
pub trait VisitTracker {
    /// Marks `id` as visited in this scope and returns whether it already was.
    fn visited(&mut self, id: NodeId) -> bool;

    /// Whether `id` was visited in this scope, without marking it.
    fn has_visited(&self, id: NodeId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub path: PathBuf,
    /// Prefix prepended to generated module names, e.g. `archgen`.
    pub module_prefix: String,
}

/// A module registered in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModule {
    pub name: String,
    pub path: PathBuf,
    pub version: String,
    /// `true` when copied from an existing crate rather than generated.
    pub copied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub module: String,
    pub name: String,
    /// Directory holding the package's files.
    pub path: PathBuf,
    /// Rust path to the package, e.g. `archgen_app::wiring`.
    pub use_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInfo {
    pub module: String,
    pub package: String,
    pub file_path: PathBuf,
    /// Rust path to the generated file's module, e.g. `archgen_app::wiring::app`.
    pub use_path: String,
}

/// The root scope: the whole generated workspace.
pub trait WorkspaceBuilder: VisitTracker {
    fn info(&self) -> WorkspaceInfo;

    fn graph(&self) -> &IrGraph;

    /// Runs the whole-module pass over every not-yet-visited node.
    fn visit(&mut self, nodes: &[NodeId]) -> Result<(), BuildError>;

    /// Copies the Cargo package at `source` into the workspace as
    /// `<prefix>_<short_name>` and returns the copy's path.
    fn add_local_module(&mut self, short_name: &str, source: &Path) -> Result<PathBuf, BuildError>;

    /// Like [`add_local_module`](Self::add_local_module) with `relative`
    /// resolved against `base`.
    fn add_local_module_relative(
        &mut self,
        short_name: &str,
        base: &Path,
        relative: &Path,
    ) -> Result<PathBuf, BuildError>;

    /// Creates an empty module with a manifest. Creating the same name and
    /// version again is a no-op.
    fn create_module(&mut self, name: &str, version: &str) -> Result<PathBuf, BuildError>;

    fn local_module(&self, name: &str) -> Option<LocalModule>;

    /// Opens a module scope for a module already in the workspace.
    fn module_scope<'a>(
        &'a mut self,
        name: &str,
    ) -> Result<Box<dyn ModuleBuilder + 'a>, BuildError>;
}

/// One buildable unit with its own dependency manifest.
pub trait ModuleBuilder: VisitTracker {
    fn info(&self) -> ModuleInfo;

    fn graph(&self) -> &IrGraph;

    /// Runs the manifest, interface and function passes over every
    /// not-yet-visited node, each pass completing before the next starts.
    fn visit(&mut self, nodes: &[NodeId]) -> Result<(), BuildError>;

    /// Adds a versioned dependency to the manifest.
    fn require(&mut self, name: &str, version: &str) -> Result<(), BuildError>;

    /// Adds a path dependency on another module in the workspace.
    fn require_local(&mut self, name: &str) -> Result<(), BuildError>;

    /// Depends on whatever workspace modules `ty` mentions.
    fn require_type(&mut self, ty: &TypeName) -> Result<(), BuildError>;

    /// Creates (or reopens) a package directory.
    fn create_package(&mut self, name: &str) -> Result<PackageInfo, BuildError>;

    /// Writes a source file into a package and returns its path.
    fn add_file(&mut self, package: &str, file: &str, contents: &str)
        -> Result<PathBuf, BuildError>;

    fn workspace(&mut self) -> &mut dyn WorkspaceBuilder;

    /// Opens a graph scope writing `<package>/<file>.rs`.
    fn graph_scope<'a>(
        &'a mut self,
        package: &str,
        file: &str,
    ) -> Result<Box<dyn GraphBuilder + 'a>, BuildError>;
}

/// One generated namespace file of instantiation snippets.
pub trait GraphBuilder: VisitTracker {
    fn info(&self) -> GraphInfo;

    fn graph(&self) -> &IrGraph;

    /// Runs the instantiation pass over every not-yet-visited node.
    fn visit(&mut self, nodes: &[NodeId]) -> Result<(), BuildError>;

    /// Registers `path` and returns the alias to use in generated text.
    fn import(&mut self, path: &str) -> String;

    /// Imports every module `ty` mentions and returns its rendered name.
    fn import_type(&mut self, ty: &TypeName) -> Result<String, BuildError>;

    /// Declares a named build function body. `dependencies` are the nodes
    /// whose instances the body fetches from the container.
    fn declare(&mut self, name: &str, body: &str, dependencies: &[NodeId])
        -> Result<(), BuildError>;

    /// Declares a build function that calls `constructor` with one container
    /// lookup per node in `arguments`.
    fn declare_constructor(
        &mut self,
        name: &str,
        constructor: &Constructor,
        arguments: &[NodeId],
    ) -> Result<(), BuildError>;

    fn module(&mut self) -> &mut dyn ModuleBuilder;

    /// Renders and writes the namespace file. Returns the declared instance
    /// names, dependencies first.
    fn finish(self: Box<Self>) -> Result<Vec<String>, BuildError>;
}
