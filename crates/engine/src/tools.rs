//! Tool registry and built-in tools.
//!
//! A tool is an async callable taking positional JSON arguments and returning
//! a structured value or an error. The registry is owned by the engine
//! instance that created it; there is no process-wide table. Failures must be
//! catchable per call, so `call` returns `anyhow::Result` and the tool-call
//! handler contains errors as `error_*` keys instead of aborting the step.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::resolve::format_value;

/// An invokable tool. Implementations may suspend; the calling execution
/// awaits the result without blocking other executions.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with positional arguments.
    async fn call(&self, args: Vec<Value>) -> Result<Value>;
}

/// Adapter lifting a plain synchronous closure into a [`Tool`].
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(Vec<Value>) -> Result<Value> + Send + Sync,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value> {
        (self.0)(args)
    }
}

/// Name-keyed tool table, preserving registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<IndexMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a tool under a name.
    pub fn register(&self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        info!(name, "registered tool");
        self.tools.write().expect("tool registry lock poisoned").insert(name, tool);
    }

    /// Looks up a tool, returning a handle the caller can await outside any lock.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().expect("tool registry lock poisoned").get(name).cloned()
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tools.read().expect("tool registry lock poisoned").keys().cloned().collect()
    }
}

/// `log(message, level?)`: emits a tracing event and echoes the message.
struct LogTool;

#[async_trait]
impl Tool for LogTool {
    async fn call(&self, args: Vec<Value>) -> Result<Value> {
        let message = args.first().map(format_value).unwrap_or_default();
        let level = args.get(1).map(format_value).unwrap_or_else(|| "info".to_string());
        match level.to_ascii_lowercase().as_str() {
            "error" => tracing::error!("{message}"),
            "warn" | "warning" => tracing::warn!("{message}"),
            "debug" => tracing::debug!("{message}"),
            _ => tracing::info!("{message}"),
        }
        Ok(Value::String(format!("Logged: {message}")))
    }
}

/// `timestamp(format?)`: current time rendered through a strftime format.
struct TimestampTool;

#[async_trait]
impl Tool for TimestampTool {
    async fn call(&self, args: Vec<Value>) -> Result<Value> {
        let format = args.first().map(format_value).unwrap_or_else(|| "%Y-%m-%d %H:%M:%S".to_string());
        Ok(Value::String(Utc::now().format(&format).to_string()))
    }
}

/// `uuid()`: a fresh v4 identifier.
struct UuidTool;

#[async_trait]
impl Tool for UuidTool {
    async fn call(&self, _args: Vec<Value>) -> Result<Value> {
        Ok(Value::String(Uuid::new_v4().to_string()))
    }
}

/// The built-in tools every runtime instance starts with.
pub fn builtin_tools() -> Vec<(&'static str, Arc<dyn Tool>)> {
    vec![
        ("log", Arc::new(LogTool) as Arc<dyn Tool>),
        ("timestamp", Arc::new(TimestampTool)),
        ("uuid", Arc::new(UuidTool)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fn_tool_adapts_closures() {
        let tool = FnTool(|args: Vec<Value>| Ok(json!({"echo": args})));
        let result = tool.call(vec![json!(1), json!("two")]).await.unwrap();
        assert_eq!(result, json!({"echo": [1, "two"]}));
    }

    #[tokio::test]
    async fn registry_lookup_and_names() {
        let registry = ToolRegistry::new();
        for (name, tool) in builtin_tools() {
            registry.register(name, tool);
        }
        assert_eq!(registry.names(), vec!["log", "timestamp", "uuid"]);
        assert!(registry.get("uuid").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn uuid_tool_returns_unique_ids() {
        let tool = UuidTool;
        let first = tool.call(vec![]).await.unwrap();
        let second = tool.call(vec![]).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn log_tool_echoes_message() {
        let result = LogTool.call(vec![json!("hello"), json!("debug")]).await.unwrap();
        assert_eq!(result, json!("Logged: hello"));
    }
}
