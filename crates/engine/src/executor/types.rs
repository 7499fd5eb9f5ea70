//! Execution records and outcomes.
//!
//! One [`ExecutionRecord`] exists per `execute()` call. It is mutated only by
//! the engine driving that call, then persisted into the memory store as a
//! procedural item at `executions/{execution_id}` and never touched again.

use chrono::{DateTime, Utc};
use opal_types::{ExecutionStatus, StepKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serializable copy of an authored step, embedded in the step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step kind as authored.
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Raw step body as authored.
    pub body: String,
}

/// One entry in the ordered step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLogEntry {
    /// Zero-based index of the step in the workflow.
    pub step_index: usize,
    /// The authored step.
    pub step: StepRecord,
    /// The handler's result value, including any contained `error_*` keys.
    pub result: Value,
    /// When the step finished.
    pub timestamp: DateTime<Utc>,
}

/// Audit entry for one memory sub-operation inside a memory_operation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum MemoryOpRecord {
    /// A successful `store(path, expr)`.
    Store {
        /// Target path.
        path: String,
        /// Id of the stored item.
        memory_id: String,
        /// When the store happened.
        timestamp: DateTime<Utc>,
    },
    /// A `locate(query)` and how many items it returned.
    Locate {
        /// Free-text query.
        query: String,
        /// Number of items returned.
        results_count: usize,
        /// When the locate happened.
        timestamp: DateTime<Utc>,
    },
}

/// Audit entry for one tool invocation inside a tool_call step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool registry name.
    pub tool: String,
    /// Evaluated positional arguments.
    pub args: Vec<Value>,
    /// The tool's return value.
    pub result: Value,
    /// When the call resolved.
    pub timestamp: DateTime<Utc>,
}

/// The full mutable state threaded through one `execute()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique id for this execution.
    pub execution_id: String,
    /// Name of the workflow being executed.
    pub workflow_name: String,
    /// When the execution started.
    pub start_time: DateTime<Utc>,
    /// When the execution reached a terminal state.
    pub end_time: Option<DateTime<Utc>>,
    /// Immutable snapshot of the caller-provided input.
    pub input_context: Map<String, Value>,
    /// Working context mutated by successive steps.
    pub current_context: Map<String, Value>,
    /// Ordered step log.
    pub steps_executed: Vec<StepLogEntry>,
    /// Memory sub-operation audit log.
    pub memory_operations: Vec<MemoryOpRecord>,
    /// Tool invocation audit log.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Lifecycle state.
    pub status: ExecutionStatus,
    /// The escaping handler error, when status is failed.
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Creates a pending record snapshotting the input context.
    pub fn new(execution_id: String, workflow_name: &str, input: Map<String, Value>) -> Self {
        Self {
            execution_id,
            workflow_name: workflow_name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            input_context: input.clone(),
            current_context: input,
            steps_executed: Vec::new(),
            memory_operations: Vec::new(),
            tool_calls: Vec::new(),
            status: ExecutionStatus::Pending,
            error: None,
        }
    }
}

/// Summary returned to the caller of `execute()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Unique id for this execution; the record is retrievable at
    /// `executions/{execution_id}`.
    pub execution_id: String,
    /// Final working context.
    pub result: Map<String, Value>,
    /// Terminal lifecycle state.
    pub status: ExecutionStatus,
    /// Wall-clock duration of the execution in seconds.
    pub duration_seconds: f64,
    /// Number of steps that ran (including ones with contained errors).
    pub steps_executed: usize,
}
