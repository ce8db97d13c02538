//! Codegen error types covering all compilation failure modes.

use std::path::PathBuf;

use archgen_core::error::{BuildError, CoreError};
use archgen_core::id::NodeId;

/// Errors that can occur while compiling an IR graph into a workspace.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// The graph was not frozen before compilation.
    #[error("graph must be frozen before compilation")]
    GraphNotFrozen,

    /// No roots were given, so there is nothing to compile.
    #[error("no root nodes given")]
    NoRoots,

    /// A root id does not exist in the graph.
    #[error("root node not found: NodeId({id})", id = id.0)]
    RootNotFound { id: NodeId },

    /// Graph structure issue found while walking it.
    #[error("invalid graph: {0}")]
    Graph(#[from] CoreError),

    /// A pass or builder operation failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Options could not be parsed.
    #[error("invalid options: {0}")]
    Options(#[from] toml::de::Error),

    /// A manifest could not be serialized.
    #[error("cannot serialize manifest: {0}")]
    Manifest(#[from] toml::ser::Error),

    /// Filesystem I/O error at a known path.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CodegenError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodegenError::Io {
            path: path.into(),
            source,
        }
    }

    /// The underlying build failure, with any `Pass` wrappers removed.
    pub fn build_root_cause(&self) -> Option<&BuildError> {
        match self {
            CodegenError::Build(err) => Some(err.root_cause()),
            _ => None,
        }
    }
}
