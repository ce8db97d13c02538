//! The module scope: one generated crate with its own manifest.

use std::collections::HashSet;
use std::path::PathBuf;

use archgen_core::builder::{
    GraphBuilder, ModuleBuilder, ModuleInfo, PackageInfo, VisitTracker, WorkspaceBuilder,
};
use archgen_core::capability::{self, Capability};
use archgen_core::code::TypeName;
use archgen_core::error::BuildError;
use archgen_core::graph::IrGraph;
use archgen_core::id::NodeId;
use archgen_core::names;

use crate::graph::GraphScope;
use crate::manifest::Manifest;
use crate::workspace::{pass_error, Workspace};

/// Passes a module scope runs, in order.
const MODULE_PASSES: [Capability; 3] = [
    Capability::RequiresPackage,
    Capability::GeneratesInterfaces,
    Capability::GeneratesFuncs,
];

pub struct ModuleScope<'w, 'g> {
    workspace: &'w mut Workspace<'g>,
    graph: &'g IrGraph,
    name: String,
    visited: HashSet<NodeId>,
}

impl<'w, 'g> ModuleScope<'w, 'g> {
    pub(crate) fn new(workspace: &'w mut Workspace<'g>, name: &str) -> Self {
        let graph = workspace.ir();
        ModuleScope {
            workspace,
            graph,
            name: name.to_string(),
            visited: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn scope_path(&self) -> String {
        format!("{} > module {}", self.workspace.scope_path(), self.name)
    }

    pub(crate) fn ir(&self) -> &'g IrGraph {
        self.graph
    }

    pub fn manifest(&self) -> Result<&Manifest, BuildError> {
        let state = self.workspace.module_state(&self.name)?;
        state
            .manifest
            .as_ref()
            .ok_or_else(|| BuildError::ModuleNotFound {
                name: self.name.clone(),
            })
    }

    fn manifest_mut(&mut self) -> Result<&mut Manifest, BuildError> {
        let name = self.name.clone();
        self.workspace
            .module_state_mut(&name)?
            .manifest
            .as_mut()
            .ok_or(BuildError::ModuleNotFound { name })
    }

    /// Adds a versioned dependency with features.
    pub fn require_features(
        &mut self,
        name: &str,
        version: &str,
        features: &[&str],
    ) -> Result<(), BuildError> {
        if self.manifest_mut()?.require_features(name, version, features)? {
            tracing::debug!(module = %self.name, dependency = %name, version = %version, "added dependency");
        }
        Ok(())
    }

    /// Adds a path dependency outside the workspace.
    pub fn require_path(&mut self, name: &str, path: &str) -> Result<(), BuildError> {
        if self.manifest_mut()?.require_path(name, path)? {
            tracing::debug!(module = %self.name, dependency = %name, path = %path, "added dependency");
        }
        Ok(())
    }

    /// Writes a file directly under the module's `src/`, e.g. `main.rs`.
    pub fn add_source_file(&mut self, file: &str, contents: &str) -> Result<PathBuf, BuildError> {
        let path = self.workspace.module_state(&self.name)?.path.join("src").join(file);
        self.workspace.write_file(&path, contents)?;
        tracing::debug!(module = %self.name, file = %file, "wrote source file");
        Ok(path)
    }

    /// Opens a graph scope writing `<package>/<file>.rs`.
    pub fn open_graph(
        &mut self,
        package: &str,
        file: &str,
    ) -> Result<GraphScope<'_, 'w, 'g>, BuildError> {
        let info = self.create_package(package)?;
        let file = names::snake_name(file);
        Ok(GraphScope::new(self, info, &file))
    }

    /// The workspace module a Rust crate path segment refers to, if any.
    fn workspace_module_for(&self, crate_root: &str) -> Option<String> {
        self.workspace
            .modules
            .keys()
            .find(|m| m.replace('-', "_") == crate_root)
            .cloned()
    }

    fn dispatch(&mut self, id: NodeId, pass: Capability) -> Result<(), BuildError> {
        let graph = self.graph;
        let node = graph.get(id).map_err(|_| BuildError::UnknownNode { id })?;
        let result = match pass {
            Capability::RequiresPackage => match capability::requires_package(node) {
                Some(handler) => handler.add_requirements(id, self),
                None => return Ok(()),
            },
            Capability::GeneratesInterfaces => match capability::generates_interfaces(node) {
                Some(handler) => handler.generate_interfaces(id, self),
                None => return Ok(()),
            },
            Capability::GeneratesFuncs => match capability::generates_funcs(node) {
                Some(handler) => handler.generate_funcs(id, self),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };
        tracing::debug!(node = %graph.qualified_name(id), pass = %pass, module = %self.name, "ran pass");
        result.map_err(|e| pass_error(graph, id, pass, self.scope_path(), e))
    }
}

impl VisitTracker for ModuleScope<'_, '_> {
    fn visited(&mut self, id: NodeId) -> bool {
        !self.visited.insert(id)
    }

    fn has_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }
}

impl<'w, 'g> ModuleBuilder for ModuleScope<'w, 'g> {
    fn info(&self) -> ModuleInfo {
        let (version, path) = match self.workspace.module_state(&self.name) {
            Ok(state) => (state.version.clone(), state.path.clone()),
            Err(_) => (String::new(), PathBuf::new()),
        };
        ModuleInfo {
            name: self.name.clone(),
            version,
            path,
        }
    }

    fn graph(&self) -> &IrGraph {
        self.graph
    }

    fn visit(&mut self, nodes: &[NodeId]) -> Result<(), BuildError> {
        let mut fresh = Vec::new();
        for &id in nodes {
            if self.graph.node(id).is_none() {
                return Err(BuildError::UnknownNode { id });
            }
            if !self.visited(id) {
                fresh.push(id);
            }
        }
        for pass in MODULE_PASSES {
            for &id in &fresh {
                self.dispatch(id, pass)?;
            }
        }
        Ok(())
    }

    fn require(&mut self, name: &str, version: &str) -> Result<(), BuildError> {
        if self.manifest_mut()?.require(name, version)? {
            tracing::debug!(module = %self.name, dependency = %name, version = %version, "added dependency");
        }
        Ok(())
    }

    fn require_local(&mut self, name: &str) -> Result<(), BuildError> {
        if name == self.name {
            return Ok(());
        }
        let path = format!("../{}", self.workspace.module_state(name)?.dir_name);
        self.require_path(name, &path)
    }

    fn require_type(&mut self, ty: &TypeName) -> Result<(), BuildError> {
        let roots: Vec<String> = ty
            .modules()
            .into_iter()
            .filter_map(|m| m.split("::").next())
            .filter(|root| *root != "crate")
            .filter_map(|root| self.workspace_module_for(root))
            .collect();
        for module in roots {
            self.require_local(&module)?;
        }
        Ok(())
    }

    fn create_package(&mut self, name: &str) -> Result<PackageInfo, BuildError> {
        let package = names::snake_name(name);
        let state = self.workspace.module_state_mut(&self.name)?;
        let path = state.path.join("src").join(&package);
        if !state.packages.contains_key(&package) {
            std::fs::create_dir_all(&path).map_err(|e| BuildError::io(&path, e))?;
            state.packages.insert(package.clone(), Default::default());
            tracing::debug!(module = %self.name, package = %package, "created package");
        }
        Ok(PackageInfo {
            module: self.name.clone(),
            use_path: format!("{}::{}", self.name.replace('-', "_"), package),
            name: package,
            path,
        })
    }

    fn add_file(
        &mut self,
        package: &str,
        file: &str,
        contents: &str,
    ) -> Result<PathBuf, BuildError> {
        let package = names::snake_name(package);
        let stem = match file.strip_suffix(".rs") {
            Some(stem) if !stem.is_empty() && stem != "mod" => stem.to_string(),
            _ => {
                return Err(BuildError::Capability(format!(
                    "cannot add '{file}' to package '{package}': expected a non-index .rs file"
                )))
            }
        };
        let module = self.name.clone();
        let state = self.workspace.module_state_mut(&module)?;
        let files = state
            .packages
            .get_mut(&package)
            .ok_or_else(|| BuildError::PackageNotFound {
                module: module.clone(),
                package: package.clone(),
            })?;
        if !files.insert(stem) {
            return Err(BuildError::FileExists {
                module,
                package,
                file: file.to_string(),
            });
        }
        let path = state.path.join("src").join(&package).join(file);

        self.workspace.write_file(&path, contents)?;
        tracing::debug!(module = %module, package = %package, file = %file, "wrote file");
        Ok(path)
    }

    fn workspace(&mut self) -> &mut dyn WorkspaceBuilder {
        &mut *self.workspace
    }

    fn graph_scope<'a>(
        &'a mut self,
        package: &str,
        file: &str,
    ) -> Result<Box<dyn GraphBuilder + 'a>, BuildError> {
        Ok(Box::new(self.open_graph(package, file)?))
    }
}
