//! Errors surfaced to callers of the runtime.
//!
//! Only two failures ever escape the engine: asking for a workflow that was
//! never registered, and an execution that finished in the failed state.
//! Everything smaller (an individual store, locate, tool, or format call
//! inside a composite step) is contained in that step's result as an
//! `error_*` key and never becomes a Rust error at this boundary.

use thiserror::Error;

/// Failures returned by [`crate::executor::WorkflowEngine::execute`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The requested workflow name has no registration.
    #[error("workflow '{name}' not found")]
    WorkflowNotFound {
        /// Name the caller asked for.
        name: String,
    },
    /// A step handler raised an error that terminated the execution.
    ///
    /// The execution record was still persisted to memory at
    /// `executions/{execution_id}` before this was returned.
    #[error("execution '{execution_id}' failed: {message}")]
    ExecutionFailed {
        /// Identifier of the failed execution.
        execution_id: String,
        /// Message captured from the escaping step-handler error.
        message: String,
    },
}
