//! Workflow definitions and execution lifecycle states.
//!
//! A workflow is an ordered list of typed steps written in a small constrained
//! step language. The raw step bodies defined here are compiled into an
//! executable program by the engine at registration time; these models only
//! capture the authored shape.

use serde::{Deserialize, Serialize};

/// Discriminator deciding which handler interprets a step body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// `store(...)` / `locate(...)` invocations against the memory store.
    MemoryOperation,
    /// `name(args...)` invocations against the tool registry.
    ToolCall,
    /// `IF <cond> THEN <action> [ELSE <action>]`.
    Conditional,
    /// `FOR <var> IN <iterable> DO <action>`.
    Loop,
    /// `format(template, data)` placeholder substitution.
    FormatOperation,
    /// Free-form action body echoed with the current context.
    #[default]
    Action,
}

/// A single authored workflow step: a kind plus the raw body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Which handler interprets the body.
    #[serde(default, rename = "type")]
    pub kind: StepKind,
    /// Raw step-language text, e.g. `store('last_input', user_input)`.
    #[serde(default, alias = "content")]
    pub body: String,
}

impl WorkflowStep {
    /// Convenience constructor used heavily by tests and embedding hosts.
    pub fn new(kind: StepKind, body: impl Into<String>) -> Self {
        Self { kind, body: body.into() }
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Canonical workflow name used for lookups.
    #[serde(default)]
    pub name: String,
    /// Steps executed strictly in order.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    /// Build a definition from a name and steps.
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self { name: name.into(), steps }
    }
}

/// Lifecycle state of one `execute()` call.
///
/// The machine is `Pending -> Running -> {Completed | Failed}`; both end
/// states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created but not yet started.
    Pending,
    /// Steps are being interpreted.
    Running,
    /// All steps executed without a handler-level error.
    Completed,
    /// A handler-level error terminated the execution.
    Failed,
}

impl ExecutionStatus {
    /// True once the execution can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}
