//! Step handlers.
//!
//! Each handler interprets one compiled [`StepProgram`] against the current
//! execution record and returns the step's result value. Sub-operation
//! failures (an individual store, tool call, or format substitution) are
//! contained here as `error_*` keys; only an error escaping a handler as
//! `Err` terminates the execution.

use anyhow::Result;
use chrono::Utc;
use opal_types::{LocatedMemory, MemoryType};
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use crate::executor::types::{ExecutionRecord, MemoryOpRecord, ToolCallRecord};
use crate::memory::{DEFAULT_LOCATE_LIMIT, MemoryStore};
use crate::resolve::{evaluate, evaluate_strict, is_truthy};
use crate::script::{FormatCall, MemoryOp, StepProgram, ToolInvocation};
use crate::templates;
use crate::tools::ToolRegistry;

/// Dispatches one compiled step to its handler.
pub(crate) async fn run_program(
    program: &StepProgram,
    record: &mut ExecutionRecord,
    memory: &MemoryStore,
    tools: &ToolRegistry,
) -> Result<Value> {
    match program {
        StepProgram::MemoryOps(ops) => run_memory_ops(ops, record, memory),
        StepProgram::ToolCalls(calls) => run_tool_calls(calls, record, tools).await,
        StepProgram::If {
            condition,
            then_action,
            else_action,
        } => Ok(run_conditional(condition, then_action, else_action.as_deref(), &record.current_context)),
        StepProgram::For { var, iterable, action } => Ok(run_loop(var, iterable, action, &record.current_context)),
        StepProgram::Format(calls) => Ok(run_format(calls, &record.current_context)),
        StepProgram::Action(body) => Ok(run_action(body, &record.current_context)),
    }
}

fn run_memory_ops(ops: &[MemoryOp], record: &mut ExecutionRecord, memory: &MemoryStore) -> Result<Value> {
    let mut result = Map::new();

    for op in ops {
        match op {
            MemoryOp::Store { path, expr } => match evaluate_strict(expr, &record.current_context) {
                Ok(data) => {
                    let memory_id = memory.store(path, data, MemoryType::Semantic, None);
                    record.memory_operations.push(MemoryOpRecord::Store {
                        path: path.clone(),
                        memory_id: memory_id.clone(),
                        timestamp: Utc::now(),
                    });
                    result.insert(format!("stored_{path}"), Value::String(memory_id));
                }
                Err(err) => {
                    error!(path, %err, "store operation failed");
                    result.insert(format!("error_{path}"), Value::String(err.to_string()));
                }
            },
            MemoryOp::Locate { query } => {
                let items = memory.locate(query, None, DEFAULT_LOCATE_LIMIT);
                record.memory_operations.push(MemoryOpRecord::Locate {
                    query: query.clone(),
                    results_count: items.len(),
                    timestamp: Utc::now(),
                });
                let located: Vec<LocatedMemory> = items
                    .into_iter()
                    .map(|item| LocatedMemory {
                        path: item.path,
                        content: item.content,
                        r#type: item.memory_type.as_str().to_string(),
                    })
                    .collect();
                match serde_json::to_value(located) {
                    Ok(value) => {
                        result.insert(format!("located_{query}"), value);
                    }
                    Err(err) => {
                        error!(query, %err, "locate serialization failed");
                        result.insert(format!("error_{query}"), Value::String(err.to_string()));
                    }
                }
            }
        }
    }

    Ok(Value::Object(result))
}

async fn run_tool_calls(calls: &[ToolInvocation], record: &mut ExecutionRecord, tools: &ToolRegistry) -> Result<Value> {
    let mut result = Map::new();

    for invocation in calls {
        let name = &invocation.name;
        let Some(tool) = tools.get(name) else {
            warn!(name, "tool not found in registry");
            result.insert(format!("error_{name}"), Value::String(format!("Tool not found: {name}")));
            continue;
        };

        let args = parse_tool_args(&invocation.args, &record.current_context);
        match tool.call(args.clone()).await {
            Ok(tool_result) => {
                record.tool_calls.push(ToolCallRecord {
                    tool: name.clone(),
                    args,
                    result: tool_result.clone(),
                    timestamp: Utc::now(),
                });
                result.insert(format!("tool_{name}"), tool_result);
            }
            Err(err) => {
                error!(name, %err, "tool call failed");
                result.insert(format!("error_{name}"), Value::String(err.to_string()));
            }
        }
    }

    Ok(Value::Object(result))
}

fn parse_tool_args(raw: &str, context: &Map<String, Value>) -> Vec<Value> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|arg| evaluate(arg, context)).collect()
}

fn run_conditional(condition: &str, then_action: &str, else_action: Option<&str>, context: &Map<String, Value>) -> Value {
    let resolved = evaluate(condition, context);
    if is_truthy(&resolved) {
        run_action(then_action, context)
    } else if let Some(action) = else_action {
        run_action(action, context)
    } else {
        json!({"condition_result": false, "action_taken": null})
    }
}

fn run_loop(var: &str, iterable: &str, action: &str, context: &Map<String, Value>) -> Value {
    let resolved = evaluate(iterable, context);
    let Value::Array(items) = resolved else {
        warn!(iterable, "loop iterable did not resolve to a list");
        return json!({"error": format!("loop iterable '{iterable}' did not resolve to a list")});
    };

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        // Each iteration sees a fork of the context with the loop variable
        // bound; fork mutations never reach the parent context.
        let mut fork = context.clone();
        fork.insert(var.to_string(), item);
        results.push(run_action(action, &fork));
    }

    json!({ "loop_results": results })
}

fn run_format(calls: &[FormatCall], context: &Map<String, Value>) -> Value {
    let mut result = Map::new();

    for call in calls {
        let data = evaluate(&call.data_expr, context);
        match templates::render(&call.template, &data) {
            Ok(formatted) => {
                result.insert("formatted_output".to_string(), Value::String(formatted));
            }
            Err(err) => {
                error!(template = %call.template, %err, "format operation failed");
                result.insert("error".to_string(), Value::String(err.to_string()));
            }
        }
    }

    Value::Object(result)
}

fn run_action(body: &str, context: &Map<String, Value>) -> Value {
    json!({
        "action": body,
        "context": Value::Object(context.clone()),
        "timestamp": Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::compile_step;
    use opal_types::{StepKind, WorkflowStep};
    use pretty_assertions::assert_eq;

    fn record_with(context: &[(&str, Value)]) -> ExecutionRecord {
        let input: Map<String, Value> = context.iter().map(|(key, value)| (key.to_string(), value.clone())).collect();
        ExecutionRecord::new("exec-test".into(), "test", input)
    }

    #[tokio::test]
    async fn store_with_unbound_reference_is_contained() {
        let memory = MemoryStore::new();
        let tools = ToolRegistry::new();
        let mut record = record_with(&[]);
        let program = compile_step(&WorkflowStep::new(StepKind::MemoryOperation, "store('target', missing_key)"));

        let result = run_program(&program, &mut record, &memory, &tools).await.unwrap();
        let errors = result.get("error_target").expect("contained error key");
        assert!(errors.as_str().unwrap().contains("missing_key"));
        assert!(memory.is_empty(), "failed store must not persist anything");
    }

    #[tokio::test]
    async fn store_and_locate_round_trip_through_step() {
        let memory = MemoryStore::new();
        let tools = ToolRegistry::new();
        let mut record = record_with(&[("user_input", json!("remember the launch checklist"))]);

        let store_program = compile_step(&WorkflowStep::new(StepKind::MemoryOperation, "store('last_input', user_input)"));
        let stored = run_program(&store_program, &mut record, &memory, &tools).await.unwrap();
        assert!(stored.get("stored_last_input").is_some());
        assert_eq!(record.memory_operations.len(), 1);

        let locate_program = compile_step(&WorkflowStep::new(StepKind::MemoryOperation, "locate('launch checklist')"));
        let located = run_program(&locate_program, &mut record, &memory, &tools).await.unwrap();
        let hits = located.get("located_launch checklist").unwrap().as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["path"], json!("last_input"));
    }

    #[tokio::test]
    async fn unknown_tool_is_contained() {
        let memory = MemoryStore::new();
        let tools = ToolRegistry::new();
        let mut record = record_with(&[]);
        let program = compile_step(&WorkflowStep::new(StepKind::ToolCall, "nonexistent('arg')"));

        let result = run_program(&program, &mut record, &memory, &tools).await.unwrap();
        assert_eq!(result["error_nonexistent"], json!("Tool not found: nonexistent"));
        assert!(record.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn conditional_false_without_else_reports_and_mutates_nothing() {
        let context = record_with(&[("flag", json!(false))]);
        let result = run_conditional("flag", "should not run", None, &context.current_context);
        assert_eq!(result, json!({"condition_result": false, "action_taken": null}));
    }

    #[tokio::test]
    async fn conditional_picks_else_branch() {
        let record = record_with(&[("flag", json!(""))]);
        let result = run_conditional("flag", "then branch", Some("else branch"), &record.current_context);
        assert_eq!(result["action"], json!("else branch"));
    }

    #[tokio::test]
    async fn loop_forks_do_not_leak_the_variable() {
        let record = record_with(&[]);
        let result = run_loop("item", "[1, 2, 3]", "process", &record.current_context);
        let results = result["loop_results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["context"]["item"], json!(1));
        assert_eq!(results[2]["context"]["item"], json!(3));
        assert!(!record.current_context.contains_key("item"));
    }

    #[tokio::test]
    async fn loop_over_non_list_is_contained() {
        let record = record_with(&[("scalar", json!(7))]);
        let result = run_loop("x", "scalar", "noop", &record.current_context);
        assert!(result.get("error").is_some());
    }

    #[tokio::test]
    async fn format_missing_key_is_contained() {
        let record = record_with(&[("profile", json!({"other": 1}))]);
        let calls = vec![FormatCall {
            template: "Hello {name}".into(),
            data_expr: "profile".into(),
        }];
        let result = run_format(&calls, &record.current_context);
        assert!(result.get("error").is_some());
        assert!(result.get("formatted_output").is_none());
    }

    #[tokio::test]
    async fn action_echoes_body_and_context() {
        let record = record_with(&[("key", json!("value"))]);
        let result = run_action("say hi", &record.current_context);
        assert_eq!(result["action"], json!("say hi"));
        assert_eq!(result["context"]["key"], json!("value"));
        assert!(result["timestamp"].is_string());
    }
}
