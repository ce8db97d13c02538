//! Top-level compilation pipeline orchestrating the full flow:
//! validation -> closure -> whole-module pass -> module passes ->
//! instantiation pass -> process entry -> workspace finalization -> digest.
//!
//! The [`compile`] function is the main entry point. Every pass runs over
//! the dependency-first closure of the roots, and each scope only handles a
//! node the first time it sees it, so shared nodes are generated once.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use archgen_core::builder::{GraphBuilder, ModuleBuilder, WorkspaceBuilder};
use archgen_core::capability;
use archgen_core::error::BuildError;
use archgen_core::graph::IrGraph;
use archgen_core::id::NodeId;
use archgen_core::names;

use crate::error::CodegenError;
use crate::module::ModuleScope;
use crate::workspace::Workspace;
use crate::{render, CompileOptions, CompileResult};

/// Package holding the generated namespace file.
pub const WIRING_PACKAGE: &str = "wiring";

/// Compile a frozen IR graph into a Cargo workspace.
///
/// Orchestrates the full pipeline:
/// 1. Validate the graph is frozen and the roots exist
/// 2. Compute the closure of the roots, dependencies first
/// 3. Prepare the output directory
/// 4. Run the whole-module pass at workspace scope
/// 5. Create the application module with its runtime dependencies
/// 6. Run the manifest, interface and function passes at module scope
/// 7. Run the instantiation pass in the `wiring` graph scope
/// 8. Write the process entry point
/// 9. Write manifests, package indexes and the workspace manifest
/// 10. Digest the generated files
///
/// The first failing handler aborts compilation; its error names the node,
/// the pass and the scope.
pub fn compile(
    graph: &IrGraph,
    roots: &[NodeId],
    options: &CompileOptions,
) -> Result<CompileResult, CodegenError> {
    let start = Instant::now();

    // 1. Validate input
    if !graph.is_frozen() {
        return Err(CodegenError::GraphNotFrozen);
    }
    if roots.is_empty() {
        return Err(CodegenError::NoRoots);
    }
    if let Some(&id) = roots.iter().find(|id| graph.node(**id).is_none()) {
        return Err(CodegenError::RootNotFound { id });
    }

    // 2. Closure
    let closure = graph.closure(roots)?;
    tracing::info!(roots = roots.len(), nodes = closure.len(), "compiling graph");

    // 3. Output directory
    prepare_output_dir(&options.output_dir, options.clean)?;

    // 4. Whole-module contributions
    let mut workspace = Workspace::new(graph, options);
    workspace.visit(&closure)?;

    // 5. Application module
    let app = names::crate_name(&options.module_prefix, &options.app_name);
    workspace.create_module(&app, &options.module_version)?;
    let namespace = graph
        .namespaces
        .get(graph.root_namespace())
        .map_or_else(|| options.app_name.clone(), |ns| ns.name.clone());

    let (declarations, instances) = {
        let mut module = workspace.open_module(&app)?;
        add_runtime_dependencies(&mut module, options)?;

        // 6. Module passes
        module.visit(&closure)?;

        // 7. Instantiation
        let mut scope = module.open_graph(WIRING_PACKAGE, &namespace)?;
        scope.visit(&closure)?;
        let use_path = scope.use_path();
        let declarations = scope.finish()?;

        // 8. Process entry point
        let instances: Vec<String> = instantiable_roots(graph, roots)
            .into_iter()
            .filter(|name| declarations.contains(name))
            .collect();
        module.add_source_file("main.rs", &render::process_entry(&use_path, &instances))?;
        (declarations, instances)
    };

    // 9. Finalize
    let modules = workspace.finish()?;
    let files = workspace.files();

    // 10. Digest
    let digest = digest(&options.output_dir, &files)?;
    let compilation_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        modules = modules.len(),
        files = files.len(),
        instances = instances.len(),
        digest = %digest,
        elapsed_ms = compilation_time_ms,
        "compilation finished"
    );

    Ok(CompileResult {
        workspace_dir: options.output_dir.clone(),
        modules,
        files,
        instances,
        declarations,
        digest,
        compilation_time_ms,
    })
}

/// Instance names of the roots that can be built at runtime, in root order.
pub fn instantiable_roots(graph: &IrGraph, roots: &[NodeId]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for &id in roots {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if capability::instantiable(node).is_some() {
            let name = graph.instance_name(id);
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn add_runtime_dependencies(
    module: &mut ModuleScope<'_, '_>,
    options: &CompileOptions,
) -> Result<(), BuildError> {
    match &options.runtime_path {
        Some(path) => module.require_path("archgen-runtime", &path.display().to_string())?,
        None => module.require("archgen-runtime", &options.runtime_version)?,
    }
    module.require_features("tokio", "1", &["full"])?;
    module.require("tracing", "0.1")?;
    module.require("tracing-subscriber", "0.3")
}

fn prepare_output_dir(dir: &Path, clean: bool) -> Result<(), CodegenError> {
    if dir.is_file() {
        return Err(BuildError::InvalidDirectory {
            path: dir.to_path_buf(),
            reason: "output path is a file".to_string(),
        }
        .into());
    }
    if clean && dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| CodegenError::io(dir, e))?;
        tracing::info!(dir = %dir.display(), "removed previous output");
    }
    fs::create_dir_all(dir).map_err(|e| CodegenError::io(dir, e))
}

/// blake3 over each file's relative path, length and contents, in the given
/// (sorted) order.
fn digest(root: &Path, files: &[PathBuf]) -> Result<String, CodegenError> {
    let mut hasher = blake3::Hasher::new();
    for file in files {
        let path = root.join(file);
        let bytes = fs::read(&path).map_err(|e| CodegenError::io(&path, e))?;
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::ConfigValue;

    fn options(dir: &Path) -> CompileOptions {
        CompileOptions {
            output_dir: dir.to_path_buf(),
            ..CompileOptions::default()
        }
    }

    #[test]
    fn unfrozen_graph_is_rejected() {
        let out = tempfile::tempdir().unwrap();
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let cfg = graph.add_node(root, ConfigValue::new("cfg", "x"), &[]).unwrap();

        let err = compile(&graph, &[cfg], &options(out.path())).unwrap_err();
        assert!(matches!(err, CodegenError::GraphNotFrozen));
    }

    #[test]
    fn missing_root_is_rejected() {
        let out = tempfile::tempdir().unwrap();
        let mut graph = IrGraph::new("app");
        graph.freeze();

        assert!(matches!(
            compile(&graph, &[], &options(out.path())),
            Err(CodegenError::NoRoots)
        ));
        assert!(matches!(
            compile(&graph, &[NodeId(7)], &options(out.path())),
            Err(CodegenError::RootNotFound { id }) if id == NodeId(7)
        ));
    }

    #[test]
    fn output_path_that_is_a_file_is_rejected() {
        let out = tempfile::tempdir().unwrap();
        let file = out.path().join("taken");
        fs::write(&file, "x").unwrap();

        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let cfg = graph.add_node(root, ConfigValue::new("cfg", "x"), &[]).unwrap();
        graph.freeze();

        let err = compile(&graph, &[cfg], &options(&file)).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::Build(BuildError::InvalidDirectory { .. })
        ));
    }

    #[test]
    fn clean_removes_stale_files() {
        let out = tempfile::tempdir().unwrap();
        let stale = out.path().join("stale.txt");
        fs::write(&stale, "old").unwrap();

        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let cfg = graph.add_node(root, ConfigValue::new("cfg", "x"), &[]).unwrap();
        graph.freeze();

        let opts = CompileOptions {
            clean: true,
            ..options(out.path())
        };
        compile(&graph, &[cfg], &opts).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn config_root_becomes_startup_instance() {
        let out = tempfile::tempdir().unwrap();
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let cfg = graph
            .add_node(root, ConfigValue::new("greeting", "hello"), &[])
            .unwrap();
        graph.freeze();

        let result = compile(&graph, &[cfg], &options(out.path())).unwrap();
        assert_eq!(result.instances, vec!["greeting"]);
        assert_eq!(result.declarations, vec!["greeting"]);
        assert_eq!(result.digest.len(), 64);

        let main = fs::read_to_string(out.path().join("archgen_app/src/main.rs")).unwrap();
        assert!(main.contains("archgen_app::wiring::app::define(&mut graph);"));
        assert!(main.contains("container.get(\"greeting\")?;"));
    }
}
