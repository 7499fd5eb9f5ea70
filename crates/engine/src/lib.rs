//! # Opal Engine
//!
//! The Opal engine interprets agent workflows against a path-addressed,
//! relevance-ranked memory store. Workflows are ordered lists of typed steps
//! written in a small constrained step language; executing one threads a
//! mutable context through the steps, dispatches each to a handler, and
//! records the finished execution back into memory as a procedural item, so
//! executions are themselves recallable memories.
//!
//! ## Key Features
//!
//! - **Path-addressed memory**: store, retrieve, update, and delete items by
//!   logical path, with a keyword index kept consistent on every mutation
//! - **Ranked retrieval**: `locate` blends keyword overlap, recency decay,
//!   and access-frequency boosts into one relevance score
//! - **Compiled step programs**: step bodies parse once at registration into
//!   a tagged AST, never per execution
//! - **Failure isolation**: individual store/locate/tool/format calls inside
//!   a step are contained as `error_*` result keys; only a handler-level
//!   error fails the execution
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use opal_engine::{MemoryStore, WorkflowEngine};
//! use opal_types::{StepKind, WorkflowDefinition, WorkflowStep};
//! use serde_json::{Map, json};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), opal_engine::RuntimeError> {
//! let engine = WorkflowEngine::new(Arc::new(MemoryStore::new()));
//! engine.register_workflow(WorkflowDefinition::new(
//!     "greet",
//!     vec![WorkflowStep::new(StepKind::Action, "say hi")],
//! ));
//!
//! let mut input = Map::new();
//! input.insert("user_input".to_string(), json!("hello"));
//! let outcome = engine.execute("greet", input).await?;
//! assert_eq!(outcome.steps_executed, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`memory`**: the store, keyword extraction, and relevance scoring
//! - **`resolve`**: token-to-value expression resolution
//! - **`script`**: step mini-language compilation
//! - **`executor`**: the workflow engine and its step handlers
//! - **`tools`** / **`templates`**: tool registry and response formatting
//! - **`runtime`**: per-agent facade over all of the above

pub mod error;
pub mod executor;
pub mod memory;
pub mod resolve;
pub mod runtime;
pub mod script;
pub mod templates;
pub mod tools;

pub use error::RuntimeError;
pub use executor::{ExecutionOutcome, ExecutionRecord, WorkflowEngine};
pub use memory::{DEFAULT_LOCATE_LIMIT, DEFAULT_LOCATE_TYPES, MemoryStore};
pub use runtime::AgentRuntime;
pub use script::{StepProgram, compile_step};
pub use templates::FormatManager;
pub use tools::{FnTool, Tool, ToolRegistry, builtin_tools};
