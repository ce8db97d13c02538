//! The workspace scope: the whole generated output tree.
//!
//! Source files are written as soon as they are added. Manifests, package
//! indexes and the workspace `Cargo.toml` are written once, in
//! [`Workspace::finish`], after every pass has had its chance to add
//! dependencies.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};

use archgen_core::builder::{
    LocalModule, ModuleBuilder, VisitTracker, WorkspaceBuilder, WorkspaceInfo,
};
use archgen_core::capability::{self, Capability};
use archgen_core::error::BuildError;
use archgen_core::graph::IrGraph;
use archgen_core::id::NodeId;
use archgen_core::names;

use crate::error::CodegenError;
use crate::manifest::{self, Manifest};
use crate::module::ModuleScope;
use crate::render;
use crate::{CompileOptions, ModuleSummary};

/// Directories never copied out of a local module.
const SKIP_DIRS: [&str; 2] = ["target", ".git"];

/// Bookkeeping for one module in the workspace.
#[derive(Debug)]
pub(crate) struct ModuleState {
    /// Directory name under the workspace root.
    pub dir_name: String,
    pub path: PathBuf,
    pub version: String,
    /// `None` for modules copied from an existing crate.
    pub manifest: Option<Manifest>,
    /// package -> file module names, in creation order.
    pub packages: IndexMap<String, IndexSet<String>>,
    /// Where a copied module came from.
    pub source: Option<PathBuf>,
}

/// The root builder scope.
pub struct Workspace<'g> {
    graph: &'g IrGraph,
    root: PathBuf,
    prefix: String,
    edition: String,
    pub(crate) modules: IndexMap<String, ModuleState>,
    written: IndexSet<PathBuf>,
    visited: HashSet<NodeId>,
}

impl<'g> Workspace<'g> {
    /// Creates a workspace rooted at `options.output_dir`, which must exist.
    pub fn new(graph: &'g IrGraph, options: &CompileOptions) -> Self {
        Workspace {
            graph,
            root: options.output_dir.clone(),
            prefix: options.module_prefix.clone(),
            edition: options.edition.clone(),
            modules: IndexMap::new(),
            written: IndexSet::new(),
            visited: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The graph with the workspace's own lifetime, for child scopes.
    pub(crate) fn ir(&self) -> &'g IrGraph {
        self.graph
    }

    pub(crate) fn scope_path(&self) -> String {
        format!("workspace {}", self.root.display())
    }

    /// Opens a scope on a generated module.
    pub fn open_module(&mut self, name: &str) -> Result<ModuleScope<'_, 'g>, BuildError> {
        let state = self.module_state(name)?;
        if state.manifest.is_none() {
            return Err(BuildError::InvalidDirectory {
                path: state.path.clone(),
                reason: format!("module '{name}' was copied from an existing crate and is read-only"),
            });
        }
        Ok(ModuleScope::new(self, name))
    }

    pub(crate) fn module_state(&self, name: &str) -> Result<&ModuleState, BuildError> {
        self.modules.get(name).ok_or_else(|| BuildError::ModuleNotFound {
            name: name.to_string(),
        })
    }

    pub(crate) fn module_state_mut(&mut self, name: &str) -> Result<&mut ModuleState, BuildError> {
        self.modules
            .get_mut(name)
            .ok_or_else(|| BuildError::ModuleNotFound {
                name: name.to_string(),
            })
    }

    /// The module already occupying the directory `dir_name`, if any.
    fn dir_owner(&self, dir_name: &str) -> Option<(&String, &ModuleState)> {
        self.modules.iter().find(|(_, state)| state.dir_name == dir_name)
    }

    /// Fails if `dir_name` is taken by a module other than `name`.
    fn claim_dir(&self, name: &str, dir_name: &str) -> Result<(), BuildError> {
        match self.dir_owner(dir_name) {
            Some((owner, state)) if owner != name => {
                tracing::warn!(module = %name, owner = %owner, dir = %dir_name, "directory already taken");
                Err(BuildError::ModuleExists {
                    name: name.to_string(),
                    path: state.path.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Writes `contents` to `path`, creating parent directories, and records
    /// it as generated output.
    pub(crate) fn write_file(&mut self, path: &Path, contents: &str) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::write(path, contents).map_err(|e| BuildError::io(path, e))?;
        self.written.insert(path.to_path_buf());
        Ok(())
    }

    fn copy_dir(&mut self, from: &Path, to: &Path) -> Result<(), BuildError> {
        fs::create_dir_all(to).map_err(|e| BuildError::io(to, e))?;
        let mut entries: Vec<_> = fs::read_dir(from)
            .map_err(|e| BuildError::io(from, e))?
            .collect::<Result<_, _>>()
            .map_err(|e| BuildError::io(from, e))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let src = entry.path();
            let dest = to.join(entry.file_name());
            let file_type = entry.file_type().map_err(|e| BuildError::io(&src, e))?;
            if file_type.is_dir() {
                let skip = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| SKIP_DIRS.contains(&n));
                if !skip {
                    self.copy_dir(&src, &dest)?;
                }
            } else {
                fs::copy(&src, &dest).map_err(|e| BuildError::io(&src, e))?;
                self.written.insert(dest);
            }
        }
        Ok(())
    }

    /// Every file written so far, relative to the workspace root, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .written
            .iter()
            .map(|p| p.strip_prefix(&self.root).unwrap_or(p).to_path_buf())
            .collect();
        files.sort();
        files
    }

    /// Writes manifests, package indexes and crate roots of generated
    /// modules plus the workspace manifest. Returns one summary per module.
    pub fn finish(&mut self) -> Result<Vec<ModuleSummary>, CodegenError> {
        let mut outputs = Vec::new();
        let mut summaries = Vec::new();

        for (name, state) in &self.modules {
            let dependencies = match &state.manifest {
                Some(manifest) => {
                    outputs.push((state.path.join("Cargo.toml"), manifest.to_toml()?));
                    let src = state.path.join("src");
                    for (package, files) in &state.packages {
                        let files: Vec<String> = files.iter().cloned().collect();
                        outputs.push((
                            src.join(package).join("mod.rs"),
                            render::package_index(&files),
                        ));
                    }
                    let packages: Vec<String> = state.packages.keys().cloned().collect();
                    outputs.push((src.join("lib.rs"), render::crate_root(&packages)));
                    manifest.dependencies.keys().cloned().collect()
                }
                None => Vec::new(),
            };
            summaries.push(ModuleSummary {
                name: name.clone(),
                version: state.version.clone(),
                path: state.path.clone(),
                dependencies,
                copied: state.source.is_some(),
            });
        }

        let members: Vec<String> = self.modules.values().map(|m| m.dir_name.clone()).collect();
        outputs.push((self.root.join("Cargo.toml"), manifest::workspace_toml(&members)?));

        for (path, contents) in outputs {
            self.write_file(&path, &contents)?;
        }
        tracing::info!(
            root = %self.root.display(),
            modules = summaries.len(),
            files = self.written.len(),
            "workspace finished"
        );
        Ok(summaries)
    }
}

/// Wraps a handler failure with the node, pass and scope it happened in.
/// Errors that already carry that context pass through unchanged, so the
/// innermost failing node is reported.
pub(crate) fn pass_error(
    graph: &IrGraph,
    node: NodeId,
    capability: Capability,
    scope: String,
    err: BuildError,
) -> BuildError {
    match err {
        err @ BuildError::Pass { .. } => err,
        err => BuildError::Pass {
            node: graph.qualified_name(node),
            capability,
            scope,
            source: Box::new(err),
        },
    }
}

impl VisitTracker for Workspace<'_> {
    fn visited(&mut self, id: NodeId) -> bool {
        !self.visited.insert(id)
    }

    fn has_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }
}

impl<'g> WorkspaceBuilder for Workspace<'g> {
    fn info(&self) -> WorkspaceInfo {
        WorkspaceInfo {
            path: self.root.clone(),
            module_prefix: self.prefix.clone(),
        }
    }

    fn graph(&self) -> &IrGraph {
        self.graph
    }

    fn visit(&mut self, nodes: &[NodeId]) -> Result<(), BuildError> {
        let graph = self.graph;
        for &id in nodes {
            if self.visited(id) {
                continue;
            }
            let node = graph.get(id).map_err(|_| BuildError::UnknownNode { id })?;
            if let Some(handler) = capability::provides_module(node) {
                tracing::debug!(node = %graph.qualified_name(id), "adding module to workspace");
                let scope = self.scope_path();
                handler
                    .add_to_workspace(id, self)
                    .map_err(|e| pass_error(graph, id, Capability::ProvidesModule, scope, e))?;
            }
        }
        Ok(())
    }

    fn add_local_module(&mut self, short_name: &str, source: &Path) -> Result<PathBuf, BuildError> {
        if !source.join("Cargo.toml").is_file() {
            return Err(BuildError::InvalidDirectory {
                path: source.to_path_buf(),
                reason: "not a Cargo package (no Cargo.toml)".to_string(),
            });
        }
        let (name, version) = manifest::read_package(source)?;
        if let Some(existing) = self.modules.get(&name) {
            if existing.source.as_deref() == Some(source) {
                return Ok(existing.path.clone());
            }
            return Err(BuildError::ModuleExists {
                name,
                path: existing.path.clone(),
            });
        }

        let dir_name = names::crate_name(&self.prefix, short_name);
        self.claim_dir(&name, &dir_name)?;
        let dest = self.root.join(&dir_name);
        self.copy_dir(source, &dest)?;
        tracing::info!(module = %name, from = %source.display(), to = %dest.display(), "copied local module");

        self.modules.insert(
            name,
            ModuleState {
                dir_name,
                path: dest.clone(),
                version,
                manifest: None,
                packages: IndexMap::new(),
                source: Some(source.to_path_buf()),
            },
        );
        Ok(dest)
    }

    fn add_local_module_relative(
        &mut self,
        short_name: &str,
        base: &Path,
        relative: &Path,
    ) -> Result<PathBuf, BuildError> {
        let source = base.join(relative);
        self.add_local_module(short_name, &source)
    }

    fn create_module(&mut self, name: &str, version: &str) -> Result<PathBuf, BuildError> {
        if let Some(existing) = self.modules.get(name) {
            if existing.manifest.is_some() && existing.version == version {
                return Ok(existing.path.clone());
            }
            return Err(BuildError::ModuleExists {
                name: name.to_string(),
                path: existing.path.clone(),
            });
        }

        self.claim_dir(name, name)?;
        let path = self.root.join(name);
        let src = path.join("src");
        fs::create_dir_all(&src).map_err(|e| BuildError::io(&src, e))?;
        tracing::info!(module = %name, version = %version, "created module");

        self.modules.insert(
            name.to_string(),
            ModuleState {
                dir_name: name.to_string(),
                path: path.clone(),
                version: version.to_string(),
                manifest: Some(Manifest::new(name, version, &self.edition)),
                packages: IndexMap::new(),
                source: None,
            },
        );
        Ok(path)
    }

    fn local_module(&self, name: &str) -> Option<LocalModule> {
        self.modules.get(name).map(|state| LocalModule {
            name: name.to_string(),
            path: state.path.clone(),
            version: state.version.clone(),
            copied: state.source.is_some(),
        })
    }

    fn module_scope<'a>(
        &'a mut self,
        name: &str,
    ) -> Result<Box<dyn ModuleBuilder + 'a>, BuildError> {
        Ok(Box::new(self.open_module(name)?))
    }
}
