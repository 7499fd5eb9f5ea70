//! Workflow interpretation.
//!
//! [`WorkflowEngine`] owns the workflow and tool registries (no process-wide
//! state) and drives the execution lifecycle per call:
//! `Pending -> Running -> {Completed | Failed}`. Steps run strictly
//! sequentially within one execution; distinct executions may run
//! concurrently against the same shared [`MemoryStore`]. Whatever the
//! outcome, the finished execution record is persisted back into memory as a
//! procedural item, so executions are themselves recallable memories.

mod step;
pub mod types;

use std::sync::{Arc, RwLock};

use chrono::Utc;
use indexmap::IndexMap;
use opal_types::{ExecutionStatus, MemoryType, WorkflowDefinition};
use serde_json::{Map, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::memory::MemoryStore;
use crate::script::{StepProgram, compile_step};
use crate::tools::{Tool, ToolRegistry};
pub use types::{ExecutionOutcome, ExecutionRecord, MemoryOpRecord, StepLogEntry, StepRecord, ToolCallRecord};

/// A registered workflow with its step programs compiled ahead of time.
#[derive(Debug, Clone)]
struct CompiledWorkflow {
    definition: WorkflowDefinition,
    programs: Vec<StepProgram>,
}

/// Interprets registered workflows against a shared memory store.
pub struct WorkflowEngine {
    memory: Arc<MemoryStore>,
    workflows: RwLock<IndexMap<String, CompiledWorkflow>>,
    tools: ToolRegistry,
}

impl WorkflowEngine {
    /// Creates an engine bound to a memory store.
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self {
            memory,
            workflows: RwLock::new(IndexMap::new()),
            tools: ToolRegistry::new(),
        }
    }

    /// The memory store executions read from and persist into.
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Registers a workflow, compiling every step body once.
    pub fn register_workflow(&self, definition: WorkflowDefinition) {
        let programs = definition.steps.iter().map(compile_step).collect();
        let name = definition.name.clone();
        info!(name, steps = definition.steps.len(), "registered workflow");
        self.workflows
            .write()
            .expect("workflow table lock poisoned")
            .insert(name, CompiledWorkflow { definition, programs });
    }

    /// Registers a tool under a name.
    pub fn register_tool(&self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        self.tools.register(name, tool);
    }

    /// Registered workflow names in registration order.
    pub fn workflow_names(&self) -> Vec<String> {
        self.workflows
            .read()
            .expect("workflow table lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Registered tool names in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.names()
    }

    /// Executes a registered workflow against an input context.
    ///
    /// The input is snapshotted and copied into the working context; each
    /// step's map-shaped result merges into that context, visible to later
    /// steps of the same execution. A handler-level error stops the run at
    /// the failing step without rolling back earlier mutations. In both
    /// terminal states the execution record is persisted at
    /// `executions/{execution_id}` before this returns, and a failed run
    /// re-signals as [`RuntimeError::ExecutionFailed`].
    pub async fn execute(&self, workflow_name: &str, input: Map<String, Value>) -> Result<ExecutionOutcome, RuntimeError> {
        let workflow = self
            .workflows
            .read()
            .expect("workflow table lock poisoned")
            .get(workflow_name)
            .cloned()
            .ok_or_else(|| RuntimeError::WorkflowNotFound {
                name: workflow_name.to_string(),
            })?;

        let execution_id = Uuid::new_v4().to_string();
        let mut record = ExecutionRecord::new(execution_id.clone(), workflow_name, input);
        record.status = ExecutionStatus::Running;
        info!(execution_id, workflow_name, "execution started");

        for (step_index, program) in workflow.programs.iter().enumerate() {
            match step::run_program(program, &mut record, &self.memory, &self.tools).await {
                Ok(result) => {
                    if let Value::Object(updates) = &result {
                        for (key, value) in updates {
                            record.current_context.insert(key.clone(), value.clone());
                        }
                    }
                    let authored = &workflow.definition.steps[step_index];
                    record.steps_executed.push(StepLogEntry {
                        step_index,
                        step: StepRecord {
                            kind: authored.kind,
                            body: authored.body.clone(),
                        },
                        result,
                        timestamp: Utc::now(),
                    });
                }
                Err(err) => {
                    error!(execution_id, step_index, %err, "execution failed");
                    record.status = ExecutionStatus::Failed;
                    record.error = Some(err.to_string());
                    break;
                }
            }
        }

        if record.status != ExecutionStatus::Failed {
            record.status = ExecutionStatus::Completed;
        }
        record.end_time = Some(Utc::now());

        self.persist_record(&record);

        let duration_seconds = record
            .end_time
            .map(|end| (end - record.start_time).num_milliseconds() as f64 / 1000.0)
            .unwrap_or_default();

        if record.status == ExecutionStatus::Failed {
            return Err(RuntimeError::ExecutionFailed {
                execution_id,
                message: record.error.unwrap_or_else(|| "unknown step failure".to_string()),
            });
        }

        Ok(ExecutionOutcome {
            execution_id,
            result: record.current_context,
            status: record.status,
            duration_seconds,
            steps_executed: record.steps_executed.len(),
        })
    }

    fn persist_record(&self, record: &ExecutionRecord) {
        let path = format!("executions/{}", record.execution_id);
        match serde_json::to_value(record) {
            Ok(content) => {
                self.memory.store(&path, content, MemoryType::Procedural, None);
            }
            Err(err) => {
                // The execution itself already finished; losing the audit
                // copy is logged, not escalated.
                error!(execution_id = %record.execution_id, %err, "failed to persist execution record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_types::{StepKind, WorkflowStep};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(Arc::new(MemoryStore::new()))
    }

    fn input(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let engine = engine();
        let err = engine.execute("ghost", Map::new()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::WorkflowNotFound { name } if name == "ghost"));
    }

    #[tokio::test]
    async fn greet_workflow_completes_and_persists_its_record() {
        let engine = engine();
        engine.register_workflow(WorkflowDefinition::new(
            "greet",
            vec![WorkflowStep::new(StepKind::Action, "say hi")],
        ));

        let outcome = engine
            .execute("greet", input(&[("user_input", json!("hello"))]))
            .await
            .expect("greet completes");
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.steps_executed, 1);

        let item = engine
            .memory()
            .retrieve(&format!("executions/{}", outcome.execution_id))
            .expect("execution record stored");
        assert_eq!(item.memory_type, MemoryType::Procedural);
        assert_eq!(item.content["workflow_name"], json!("greet"));
        assert_eq!(item.content["status"], json!("completed"));
    }

    #[tokio::test]
    async fn step_results_merge_into_later_steps_context() {
        let engine = engine();
        engine.register_tool(
            "answer",
            Arc::new(crate::tools::FnTool(|_args: Vec<Value>| -> anyhow::Result<Value> { Ok(json!(41)) })),
        );
        engine.register_workflow(WorkflowDefinition::new(
            "chain",
            vec![
                WorkflowStep::new(StepKind::ToolCall, "answer()"),
                WorkflowStep::new(StepKind::MemoryOperation, "store('computed', tool_answer)"),
            ],
        ));

        let outcome = engine.execute("chain", Map::new()).await.unwrap();
        assert!(outcome.result.contains_key("stored_computed"));
        assert_eq!(
            engine.memory().retrieve("computed").unwrap().content,
            json!(41),
            "second step must see the first step's tool result"
        );
    }

    #[tokio::test]
    async fn contained_sub_errors_do_not_stop_later_steps() {
        let engine = engine();
        engine.register_workflow(WorkflowDefinition::new(
            "resilient",
            vec![
                WorkflowStep::new(StepKind::MemoryOperation, "store('broken', unbound_reference)"),
                WorkflowStep::new(StepKind::Action, "still runs"),
            ],
        ));

        let outcome = engine.execute("resilient", Map::new()).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.steps_executed, 2);
        assert!(outcome.result.contains_key("error_broken"));
    }

    #[tokio::test]
    async fn identical_executions_differ_only_in_ids() {
        let engine = engine();
        engine.register_workflow(WorkflowDefinition::new(
            "twice",
            vec![WorkflowStep::new(StepKind::Conditional, "IF flag THEN proceed")],
        ));

        let first = engine.execute("twice", input(&[("flag", json!(true))])).await.unwrap();
        let second = engine.execute("twice", input(&[("flag", json!(true))])).await.unwrap();
        assert_ne!(first.execution_id, second.execution_id);

        // Contexts match once the per-run timestamps inside action echoes are
        // stripped.
        let strip = |mut result: Map<String, Value>| {
            result.remove("timestamp");
            result
        };
        assert_eq!(strip(first.result), strip(second.result));
    }
}
