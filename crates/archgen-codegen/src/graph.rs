//! The graph scope: one generated namespace file.
//!
//! Instantiable nodes declare named build functions here. On
//! [`GraphScope::finish`] the declarations are ordered so every instance
//! follows the instances it depends on, rendered into one file with a
//! `define` function, and written into the owning module.

use std::collections::HashSet;

use indexmap::IndexMap;

use archgen_core::builder::{GraphBuilder, GraphInfo, ModuleBuilder, PackageInfo, VisitTracker};
use archgen_core::capability::{self, Capability};
use archgen_core::code::{Constructor, TypeName};
use archgen_core::error::BuildError;
use archgen_core::graph::IrGraph;
use archgen_core::id::NodeId;

use crate::imports::Imports;
use crate::module::ModuleScope;
use crate::render::{self, Binding, Declared};
use crate::workspace::pass_error;

#[derive(Debug, Clone)]
struct Declaration {
    body: String,
    dependencies: Vec<String>,
}

pub struct GraphScope<'m, 'w, 'g> {
    module: &'m mut ModuleScope<'w, 'g>,
    graph: &'g IrGraph,
    package: PackageInfo,
    file: String,
    imports: Imports,
    declarations: IndexMap<String, Declaration>,
    visited: HashSet<NodeId>,
}

impl<'m, 'w, 'g> GraphScope<'m, 'w, 'g> {
    pub(crate) fn new(module: &'m mut ModuleScope<'w, 'g>, package: PackageInfo, file: &str) -> Self {
        let graph = module.ir();
        let imports = Imports::new(&format!("crate::{}::{}", package.name, file));
        GraphScope {
            module,
            graph,
            package,
            file: file.to_string(),
            imports,
            declarations: IndexMap::new(),
            visited: HashSet::new(),
        }
    }

    fn scope_path(&self) -> String {
        format!(
            "{} > graph {}/{}.rs",
            self.module.scope_path(),
            self.package.name,
            self.file
        )
    }

    /// Rust path of the namespace file from outside its crate.
    pub fn use_path(&self) -> String {
        format!("{}::{}", self.package.use_path, self.file)
    }

    /// Instance names declared so far, in declaration order.
    pub fn declared(&self) -> Vec<String> {
        self.declarations.keys().cloned().collect()
    }

    /// Declaration indexes ordered so dependencies come first. Ties keep
    /// declaration order. Dependencies declared elsewhere are ignored.
    fn ordered(&self) -> Result<Vec<usize>, BuildError> {
        fn walk(
            scope: &GraphScope<'_, '_, '_>,
            idx: usize,
            done: &mut HashSet<usize>,
            active: &mut Vec<usize>,
            order: &mut Vec<usize>,
        ) -> Result<(), BuildError> {
            if done.contains(&idx) {
                return Ok(());
            }
            if active.contains(&idx) {
                let name = scope
                    .declarations
                    .get_index(idx)
                    .map(|(n, _)| n.as_str())
                    .unwrap_or_default();
                return Err(BuildError::Capability(format!(
                    "declarations form a dependency cycle through '{name}'"
                )));
            }
            active.push(idx);
            if let Some((_, decl)) = scope.declarations.get_index(idx) {
                for dep in &decl.dependencies {
                    if let Some(dep_idx) = scope.declarations.get_index_of(dep) {
                        walk(scope, dep_idx, done, active, order)?;
                    }
                }
            }
            active.pop();
            done.insert(idx);
            order.push(idx);
            Ok(())
        }

        let mut done = HashSet::new();
        let mut active = Vec::new();
        let mut order = Vec::with_capacity(self.declarations.len());
        for idx in 0..self.declarations.len() {
            walk(self, idx, &mut done, &mut active, &mut order)?;
        }
        Ok(order)
    }

    /// Renders and writes the namespace file and returns the declared
    /// instance names, dependencies first.
    pub fn finish(mut self) -> Result<Vec<String>, BuildError> {
        let order = self.ordered()?;
        let mut names = Vec::with_capacity(order.len());
        let mut declared = Vec::with_capacity(order.len());
        for idx in order {
            if let Some((name, decl)) = self.declarations.get_index(idx) {
                names.push(name.clone());
                declared.push(Declared {
                    name,
                    body: &decl.body,
                });
            }
        }
        let text = render::namespace_file(&self.imports, &declared);
        let file = format!("{}.rs", self.file);
        let package = self.package.name.clone();
        self.module.add_file(&package, &file, &text)?;
        tracing::info!(
            module = %self.module.name(),
            file = %file,
            instances = names.len(),
            "wrote namespace"
        );
        Ok(names)
    }
}

impl VisitTracker for GraphScope<'_, '_, '_> {
    fn visited(&mut self, id: NodeId) -> bool {
        !self.visited.insert(id)
    }

    fn has_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }
}

impl<'m, 'w, 'g> GraphBuilder for GraphScope<'m, 'w, 'g> {
    fn info(&self) -> GraphInfo {
        GraphInfo {
            module: self.package.module.clone(),
            package: self.package.name.clone(),
            file_path: self.package.path.join(format!("{}.rs", self.file)),
            use_path: self.use_path(),
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
            if let Some(handler) = capability::instantiable(node) {
                tracing::debug!(node = %graph.qualified_name(id), "adding instantiation");
                handler
                    .add_instantiation(id, self)
                    .map_err(|e| pass_error(graph, id, Capability::Instantiable, self.scope_path(), e))?;
            }
        }
        Ok(())
    }

    fn import(&mut self, path: &str) -> String {
        self.imports.add(path)
    }

    fn import_type(&mut self, ty: &TypeName) -> Result<String, BuildError> {
        self.module.require_type(ty)?;
        Ok(self.imports.qualify(ty))
    }

    fn declare(
        &mut self,
        name: &str,
        body: &str,
        dependencies: &[NodeId],
    ) -> Result<(), BuildError> {
        if self.declarations.contains_key(name) {
            return Err(BuildError::DuplicateDeclaration {
                name: name.to_string(),
            });
        }
        let mut deps = Vec::with_capacity(dependencies.len());
        for &id in dependencies {
            if self.graph.node(id).is_none() {
                return Err(BuildError::UnknownNode { id });
            }
            deps.push(self.graph.instance_name(id));
        }
        self.declarations.insert(
            name.to_string(),
            Declaration {
                body: body.to_string(),
                dependencies: deps,
            },
        );
        Ok(())
    }

    fn declare_constructor(
        &mut self,
        name: &str,
        constructor: &Constructor,
        arguments: &[NodeId],
    ) -> Result<(), BuildError> {
        let func = &constructor.func;
        if func.is_async {
            return Err(BuildError::Capability(format!(
                "constructor {}::{} is async; build functions are synchronous",
                constructor.module, func.name
            )));
        }
        if func.arguments.len() != arguments.len() {
            return Err(BuildError::Capability(format!(
                "constructor {}::{} takes {} argument(s) but '{name}' has {}",
                constructor.module,
                func.name,
                func.arguments.len(),
                arguments.len()
            )));
        }

        let alias = self.import(&constructor.module);
        let call = format!("{alias}::{}", func.name);
        let mut bindings = Vec::with_capacity(arguments.len());
        for (&arg, var) in arguments.iter().zip(&func.arguments) {
            if self.graph.node(arg).is_none() {
                return Err(BuildError::UnknownNode { id: arg });
            }
            bindings.push(Binding {
                instance: self.graph.instance_name(arg),
                ty: self.import_type(&var.ty)?,
            });
        }
        if let Some(ret) = &func.returns {
            self.module.require_type(ret)?;
        }

        let body = render::constructor_body(&call, constructor, &bindings);
        self.declare(name, &body, arguments)
    }

    fn module(&mut self) -> &mut dyn ModuleBuilder {
        &mut *self.module
    }

    fn finish(self: Box<Self>) -> Result<Vec<String>, BuildError> {
        (*self).finish()
    }
}
