//! Error types for graph recording, compilation and execution.

use thiserror::Error;

use crate::backend::BackendError;
use crate::render_graph::ResourceHandle;

/// Errors that can occur while recording, compiling or executing a graph.
///
/// Record-time errors (`InvalidDescriptor`, `UnknownHandle`) are returned from
/// the declaring call. Compile-time errors (`CyclicDependency`,
/// `OrphanedWrite`) abort the frame before any backend work is issued.
/// `CallbackFailure` is the only variant raised after backend work started.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("invalid descriptor for '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },
    #[error("unknown resource handle {0}")]
    UnknownHandle(ResourceHandle),
    #[error("cyclic dependency between passes: {}", .passes.join(", "))]
    CyclicDependency { passes: Vec<String> },
    #[error("pass '{pass}' writes '{resource}' but nothing reads it")]
    OrphanedWrite { pass: String, resource: String },
    #[error("cannot {operation} while graph is {state}")]
    InvalidGraphState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("pass '{pass}' failed: {source}")]
    CallbackFailure {
        pass: String,
        #[source]
        source: PassError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised from inside a pass execution callback.
#[derive(Error, Debug)]
pub enum PassError {
    #[error("resource {0} was not declared by this pass")]
    UndeclaredResource(ResourceHandle),
    #[error("resource {0} has no backing")]
    NotMaterialized(ResourceHandle),
    #[error("no camera is bound to this frame")]
    NoCamera,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("{0}")]
    Failed(String),
}

impl PassError {
    pub fn failed(message: impl Into<String>) -> Self {
        PassError::Failed(message.into())
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Return type of pass execution callbacks.
pub type PassResult = Result<(), PassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphError::CyclicDependency {
            passes: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic dependency between passes: a, b");

        let err = GraphError::InvalidGraphState {
            operation: "add a pass",
            state: "compiled",
        };
        assert_eq!(err.to_string(), "cannot add a pass while graph is compiled");

        let err = GraphError::CallbackFailure {
            pass: "Base Pass".to_string(),
            source: PassError::failed("shader missing"),
        };
        assert_eq!(err.to_string(), "pass 'Base Pass' failed: shader missing");
    }

    #[test]
    fn test_backend_error_converts() {
        let err: GraphError = BackendError::OutOfMemory.into();
        assert!(matches!(err, GraphError::Backend(BackendError::OutOfMemory)));
    }
}
