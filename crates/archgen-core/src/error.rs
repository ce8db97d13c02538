//! Core error types for archgen-core.
//!
//! Uses `thiserror` for structured, matchable error variants. [`CoreError`]
//! covers graph construction; [`BuildError`] covers capability dispatch and
//! builder scopes during compilation.

use std::path::PathBuf;

use thiserror::Error;

use crate::capability::Capability;
use crate::id::{NamespaceId, NodeId};

/// Errors raised while assembling an IR graph.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node with the same name already exists in the namespace.
    #[error("duplicate name '{name}' in namespace '{namespace}'")]
    DuplicateName { namespace: String, name: String },

    /// Node and namespace names must be non-empty and free of `.`.
    #[error("invalid name: '{name}'")]
    InvalidName { name: String },

    /// A NodeId was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A NamespaceId was not found in the namespace tree.
    #[error("namespace not found: NamespaceId({id})", id = id.0)]
    NamespaceNotFound { id: NamespaceId },

    /// A node declares a capability without one of its prerequisites.
    #[error("node '{node}' declares {capability} but not its prerequisite {requires}")]
    MissingPrerequisite {
        node: String,
        capability: Capability,
        requires: Capability,
    },

    /// The declared capability set and the exposed contract accessors disagree.
    #[error("node '{node}' capability mismatch for {capability}: {reason}")]
    CapabilityMismatch {
        node: String,
        capability: Capability,
        reason: &'static str,
    },

    /// Adding the edge would make a node (transitively) contain itself.
    #[error("cycle: {path}")]
    Cycle { path: String },

    /// The graph was frozen and no longer accepts mutations.
    #[error("graph is frozen")]
    Frozen,
}

/// Errors raised by builder scopes and capability handlers during compilation.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Filesystem failure at a specific path.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two different versions were required for the same dependency.
    #[error("module '{module}' requires '{dependency}' at both {existing} and {requested}")]
    VersionConflict {
        module: String,
        dependency: String,
        existing: String,
        requested: String,
    },

    /// A module already exists in the workspace with a different version or origin.
    #[error("module '{name}' already exists at {}", path.display())]
    ModuleExists { name: String, path: PathBuf },

    /// The named module was never created in this workspace.
    #[error("module not found: '{name}'")]
    ModuleNotFound { name: String },

    /// A generated file was already written into the package.
    #[error("file '{file}' already exists in package '{package}' of module '{module}'")]
    FileExists {
        module: String,
        package: String,
        file: String,
    },

    /// The named package was never created in its module.
    #[error("package '{package}' not found in module '{module}'")]
    PackageNotFound { module: String, package: String },

    /// The output or source directory cannot be used.
    #[error("invalid directory {}: {reason}", path.display())]
    InvalidDirectory { path: PathBuf, reason: String },

    /// An instance name was declared twice in one graph scope.
    #[error("instance '{name}' declared twice")]
    DuplicateDeclaration { name: String },

    /// A handler referenced a node id that does not exist.
    #[error("unknown node: NodeId({id})", id = id.0)]
    UnknownNode { id: NodeId },

    /// A node does not expose a service interface where one is required.
    #[error("node '{node}' does not provide a service interface")]
    NotAService { node: String },

    /// Handler-specific failure.
    #[error("{0}")]
    Capability(String),

    /// A handler failed; records which node, pass and scope it happened in.
    #[error("{capability} failed for node '{node}' in {scope}: {source}")]
    Pass {
        node: String,
        capability: Capability,
        scope: String,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Wraps an `io::Error` with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the innermost error, skipping `Pass` wrappers.
    pub fn root_cause(&self) -> &BuildError {
        match self {
            BuildError::Pass { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_error_reports_node_and_scope() {
        let err = BuildError::Pass {
            node: "app.user_db".into(),
            capability: Capability::GeneratesFuncs,
            scope: "workspace > module archgen_app".into(),
            source: Box::new(BuildError::Capability("template failed".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("app.user_db"));
        assert!(msg.contains("module archgen_app"));
        assert!(msg.contains("template failed"));
    }

    #[test]
    fn root_cause_unwraps_nested_passes() {
        let inner = BuildError::DuplicateDeclaration { name: "a".into() };
        let err = BuildError::Pass {
            node: "b".into(),
            capability: Capability::Instantiable,
            scope: "graph".into(),
            source: Box::new(BuildError::Pass {
                node: "a".into(),
                capability: Capability::Instantiable,
                scope: "graph".into(),
                source: Box::new(inner),
            }),
        };
        assert!(matches!(
            err.root_cause(),
            BuildError::DuplicateDeclaration { name } if name == "a"
        ));
    }
}
