//! Error types for the runtime container.

/// Boxed error returned by build functions and task run loops.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error a supervised task's run loop returns.
pub type TaskError = BoxError;

/// Errors from defining and getting instances.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// No build function is registered under the name.
    #[error("unknown instance '{name}'")]
    NotFound { name: String },

    /// The build function failed. Nothing is cached, so a later get retries.
    #[error("failed to build '{name}': {source}")]
    Build {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The instance exists but holds a different type than requested.
    #[error("instance '{name}' is a {actual}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The instance depends on itself.
    #[error("cyclic dependency while building '{name}': {chain}")]
    CyclicDependency { name: String, chain: String },

    /// `Graph::build` was called outside a tokio runtime.
    #[error("no tokio runtime: {0}")]
    NoRuntime(String),
}

impl RuntimeError {
    /// Name of the instance the error is about, if any.
    pub fn instance(&self) -> Option<&str> {
        match self {
            RuntimeError::NotFound { name }
            | RuntimeError::Build { name, .. }
            | RuntimeError::TypeMismatch { name, .. }
            | RuntimeError::CyclicDependency { name, .. } => Some(name),
            RuntimeError::NoRuntime(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_keeps_source() {
        let err = RuntimeError::Build {
            name: "frontend.users".to_string(),
            source: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to build 'frontend.users': connection refused"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection refused"));
        assert_eq!(err.instance(), Some("frontend.users"));
    }

    #[test]
    fn no_runtime_has_no_instance() {
        assert_eq!(RuntimeError::NoRuntime("x".into()).instance(), None);
    }
}
