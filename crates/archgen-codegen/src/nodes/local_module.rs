use std::path::PathBuf;

use archgen_core::builder::WorkspaceBuilder;
use archgen_core::capability::{Capability, CapabilitySet, ProvidesModule};
use archgen_core::error::BuildError;
use archgen_core::id::NodeId;
use archgen_core::node::IrNode;

/// An existing Cargo package copied wholesale into the workspace.
///
/// The copy lands in `<prefix>_<short_name>` and keeps its own package
/// name, so services can find it with `require_local(<package name>)`.
#[derive(Debug, Clone)]
pub struct LocalModuleNode {
    name: String,
    short_name: String,
    source: PathBuf,
    /// Resolves `source` against this directory when set.
    base: Option<PathBuf>,
}

impl LocalModuleNode {
    pub fn new(name: &str, short_name: &str, source: impl Into<PathBuf>) -> Self {
        LocalModuleNode {
            name: name.to_string(),
            short_name: short_name.to_string(),
            source: source.into(),
            base: None,
        }
    }

    /// Like [`new`](Self::new) with `relative` resolved against `base` at
    /// compile time.
    pub fn relative(
        name: &str,
        short_name: &str,
        base: impl Into<PathBuf>,
        relative: impl Into<PathBuf>,
    ) -> Self {
        LocalModuleNode {
            name: name.to_string(),
            short_name: short_name.to_string(),
            source: relative.into(),
            base: Some(base.into()),
        }
    }
}

impl IrNode for LocalModuleNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "LocalModule"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ProvidesModule])
    }

    fn as_provides_module(&self) -> Option<&dyn ProvidesModule> {
        Some(self)
    }
}

impl ProvidesModule for LocalModuleNode {
    fn add_to_workspace(
        &self,
        _this: NodeId,
        workspace: &mut dyn WorkspaceBuilder,
    ) -> Result<(), BuildError> {
        match &self.base {
            Some(base) => workspace.add_local_module_relative(&self.short_name, base, &self.source)?,
            None => workspace.add_local_module(&self.short_name, &self.source)?,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, CompileOptions};
    use archgen_core::graph::IrGraph;

    #[test]
    fn relative_source_is_resolved_against_base() {
        let base = tempfile::tempdir().unwrap();
        let src = base.path().join("crates/models");
        std::fs::create_dir_all(src.join("src")).unwrap();
        std::fs::write(
            src.join("Cargo.toml"),
            "[package]\nname = \"models\"\nversion = \"0.2.0\"\n",
        )
        .unwrap();
        std::fs::write(src.join("src/lib.rs"), "pub struct User;\n").unwrap();
        std::fs::create_dir_all(src.join("target/debug")).unwrap();
        std::fs::write(src.join("target/debug/junk"), "x").unwrap();

        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let node = graph
            .add_node(
                root,
                LocalModuleNode::relative("models", "models", base.path(), "crates/models"),
                &[],
            )
            .unwrap();
        graph.freeze();

        let out = tempfile::tempdir().unwrap();
        let options = CompileOptions {
            output_dir: out.path().to_path_buf(),
            ..CompileOptions::default()
        };
        let result = compile(&graph, &[node], &options).unwrap();

        assert!(out.path().join("archgen_models/src/lib.rs").is_file());
        assert!(!out.path().join("archgen_models/target").exists());
        let models = &result.modules[0];
        assert_eq!(models.name, "models");
        assert_eq!(models.version, "0.2.0");
        assert!(models.copied);
        assert!(result.instances.is_empty());
    }
}
