//! Runtime facade tying the memory store, workflow engine, and response
//! formats together for one agent.
//!
//! [`AgentRuntime`] is the embedding surface: hosts seed memory paths,
//! register workflows, formats, and tools on an instance they own, then feed
//! it user requests. Request processing never propagates an error to the
//! caller; failures come back as an error-shaped response value so the
//! conversation loop keeps running.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use opal_types::{LocatedMemory, MemoryType, WorkflowDefinition};
use serde_json::{Map, Value, json};
use tracing::{error, info};
use uuid::Uuid;

use crate::executor::WorkflowEngine;
use crate::memory::{DEFAULT_LOCATE_LIMIT, MemoryStore};
use crate::templates::FormatManager;
use crate::tools::{Tool, builtin_tools};

/// One agent's runtime: shared memory, an engine, and response formats.
pub struct AgentRuntime {
    agent_id: String,
    memory: Arc<MemoryStore>,
    engine: WorkflowEngine,
    formats: RwLock<FormatManager>,
    conversation_count: RwLock<usize>,
}

impl AgentRuntime {
    /// Creates a runtime with an empty store and the built-in tools
    /// (`log`, `timestamp`, `uuid`) already registered.
    pub fn new(agent_id: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        let memory = Arc::new(MemoryStore::new());
        let engine = WorkflowEngine::new(Arc::clone(&memory));
        for (name, tool) in builtin_tools() {
            engine.register_tool(name, tool);
        }
        info!(agent_id, "agent runtime created");
        Self {
            agent_id,
            memory,
            engine,
            formats: RwLock::new(FormatManager::new()),
            conversation_count: RwLock::new(0),
        }
    }

    /// This agent's identifier.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The shared memory store.
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// The workflow engine.
    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Seeds semantic memory from a path-to-content map.
    pub fn seed_memory(&self, paths: Map<String, Value>) {
        for (path, content) in paths {
            self.memory.store(&path, content, MemoryType::Semantic, None);
        }
    }

    /// Registers a workflow on this instance.
    pub fn register_workflow(&self, definition: WorkflowDefinition) {
        self.engine.register_workflow(definition);
    }

    /// Registers a tool on this instance.
    pub fn register_tool(&self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        self.engine.register_tool(name, tool);
    }

    /// Registers a named response format.
    pub fn register_format(&self, format_type: impl Into<String>, template: impl Into<String>) {
        self.formats
            .write()
            .expect("format manager lock poisoned")
            .register_format(format_type, template);
    }

    /// Processes one user request end to end.
    ///
    /// Builds a processing context, pulls relevant memories into it, selects
    /// and executes a workflow, formats the response, and records the
    /// conversation as episodic memory at `conversations/{request_id}`.
    pub async fn process_request(&self, user_input: &str, extra_context: Option<Map<String, Value>>, format_type: &str) -> Value {
        let request_id = Uuid::new_v4().to_string();
        let started = std::time::Instant::now();

        let mut context = Map::new();
        context.insert("request_id".to_string(), Value::String(request_id.clone()));
        context.insert("user_input".to_string(), Value::String(user_input.to_string()));
        context.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));
        if let Some(extra) = extra_context {
            for (key, value) in extra {
                context.insert(key, value);
            }
        }

        let relevant = self.memory.locate(user_input, None, DEFAULT_LOCATE_LIMIT);
        let memories_used = relevant.len();
        let located: Vec<LocatedMemory> = relevant
            .into_iter()
            .map(|item| LocatedMemory {
                path: item.path,
                content: item.content,
                r#type: item.memory_type.as_str().to_string(),
            })
            .collect();
        context.insert("relevant_memories".to_string(), json!(located));

        let workflow_name = self.select_workflow(user_input);
        let outcome = match self.engine.execute(&workflow_name, context.clone()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(request_id, %err, "request processing failed");
                return json!({
                    "response": format!("I apologize, but I encountered an error while processing your request: {err}"),
                    "metadata": {
                        "request_id": request_id,
                        "processing_time": started.elapsed().as_secs_f64(),
                        "status": "error",
                        "error": err.to_string(),
                    }
                });
            }
        };

        let mut response_data = outcome.result.clone();
        let content = outcome
            .result
            .get("user_input")
            .cloned()
            .unwrap_or_else(|| Value::String(user_input.to_string()));
        response_data.insert("content".to_string(), content);
        response_data.insert("workflow".to_string(), Value::String(workflow_name.clone()));
        response_data.insert("request_id".to_string(), Value::String(request_id.clone()));
        response_data.insert("processing_time".to_string(), json!(started.elapsed().as_secs_f64()));
        response_data.insert("memories_used".to_string(), json!(memories_used));

        let formatted = self
            .formats
            .read()
            .expect("format manager lock poisoned")
            .format_response(&Value::Object(response_data), format_type);

        let conversation = json!({
            "request_id": request_id.clone(),
            "user_input": user_input,
            "agent_response": formatted.clone(),
            "context": Value::Object(context),
            "workflow_used": workflow_name.clone(),
            "memories_accessed": memories_used,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.memory
            .store(&format!("conversations/{request_id}"), conversation, MemoryType::Episodic, None);
        *self.conversation_count.write().expect("conversation counter lock poisoned") += 1;

        json!({
            "response": formatted,
            "metadata": {
                "request_id": request_id,
                "workflow": workflow_name,
                "processing_time": started.elapsed().as_secs_f64(),
                "memories_used": memories_used,
                "status": "success",
            }
        })
    }

    /// Picks a workflow for a request: a registered name mentioned in the
    /// input wins, otherwise the first registered workflow.
    fn select_workflow(&self, user_input: &str) -> String {
        let names = self.engine.workflow_names();
        let lowered = user_input.to_lowercase();
        names
            .iter()
            .find(|name| lowered.contains(&name.to_lowercase()))
            .or_else(|| names.first())
            .cloned()
            .unwrap_or_else(|| "default".to_string())
    }

    /// Snapshot of the agent's overall state.
    pub fn agent_status(&self) -> Value {
        json!({
            "agent_id": self.agent_id,
            "status": "active",
            "uptime": Utc::now().to_rfc3339(),
            "memory": self.memory.memory_map(),
            "workflows": self.engine.workflow_names(),
            "formats": self.formats.read().expect("format manager lock poisoned").format_names(),
            "conversation_count": *self.conversation_count.read().expect("conversation counter lock poisoned"),
            "tools": self.engine.tool_names(),
        })
    }
}
