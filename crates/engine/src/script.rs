//! Step mini-language compilation.
//!
//! Step bodies are authored in a small constrained pseudo-language:
//!
//! ```text
//! store('path', expr)  locate('query')          # memory_operation
//! tool_name(arg1, arg2)                         # tool_call
//! IF cond THEN action [ELSE action]             # conditional
//! FOR var IN iterable DO action                 # loop
//! format('template {key}', expr)                # format_operation
//! anything else                                 # action
//! ```
//!
//! Bodies are compiled once at workflow registration into a [`StepProgram`]
//! and never re-parsed per execution. The grammar is matched by targeted
//! sub-pattern extraction: one invocation per matched group, and argument
//! expressions may not contain nested parentheses. A conditional or loop body
//! that does not match its grammar degrades to an [`StepProgram::Action`],
//! the catch-all the runtime defines for unrecognized bodies.

use once_cell::sync::Lazy;
use opal_types::{StepKind, WorkflowStep};
use regex::Regex;
use tracing::warn;

static STORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"store\s*\(\s*["']([^"']+)["']\s*,\s*(.+?)\)"#).expect("store pattern compiles"));
static LOCATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"locate\s*\(\s*["']([^"']+)["']\s*\)"#).expect("locate pattern compiles"));
static TOOL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\s*\(\s*(.*?)\s*\)").expect("tool pattern compiles"));
static IF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*IF\s+(.+?)\s+THEN\s+(.+?)(?:\s+ELSE\s+(.+?))?\s*$").expect("if pattern compiles"));
static FOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*FOR\s+(\w+)\s+IN\s+(.+?)\s+DO\s+(.+?)\s*$").expect("for pattern compiles"));
static FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"format\s*\(\s*["']([^"']+)["']\s*,\s*(.+?)\)"#).expect("format pattern compiles"));

/// One parsed memory-operation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOp {
    /// `store('path', expr)` — evaluate `expr` and persist it under `path`.
    Store {
        /// Target logical path.
        path: String,
        /// Raw expression evaluated against the current context.
        expr: String,
    },
    /// `locate('query')` — ranked retrieval against the memory store.
    Locate {
        /// Free-text query.
        query: String,
    },
}

/// One parsed tool invocation: a registry name plus raw comma-separated args.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Tool registry name.
    pub name: String,
    /// Raw argument list text, split and evaluated at call time.
    pub args: String,
}

/// One parsed `format('template', expr)` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCall {
    /// Template text with `{key}` placeholders.
    pub template: String,
    /// Raw data expression evaluated against the current context.
    pub data_expr: String,
}

/// Executable form of one workflow step, compiled at registration time.
#[derive(Debug, Clone, PartialEq)]
pub enum StepProgram {
    /// Zero or more store/locate invocations, executed in body order.
    MemoryOps(Vec<MemoryOp>),
    /// Zero or more tool invocations.
    ToolCalls(Vec<ToolInvocation>),
    /// A conditional with an optional else branch.
    If {
        /// Raw condition expression.
        condition: String,
        /// Action body run when the condition is truthy.
        then_action: String,
        /// Action body run when the condition is falsy, if present.
        else_action: Option<String>,
    },
    /// A loop binding each element of an iterable to a variable.
    For {
        /// Loop variable name.
        var: String,
        /// Raw iterable expression.
        iterable: String,
        /// Action body run once per element against a context fork.
        action: String,
    },
    /// Zero or more format invocations.
    Format(Vec<FormatCall>),
    /// Raw action body echoed with the current context at execution time.
    Action(String),
}

/// Compiles a step body into its executable program.
pub fn compile_step(step: &WorkflowStep) -> StepProgram {
    match step.kind {
        StepKind::MemoryOperation => StepProgram::MemoryOps(parse_memory_ops(&step.body)),
        StepKind::ToolCall => StepProgram::ToolCalls(parse_tool_calls(&step.body)),
        StepKind::Conditional => parse_conditional(&step.body).unwrap_or_else(|| {
            warn!(body = %step.body, "conditional step did not match IF/THEN grammar, treating as action");
            StepProgram::Action(step.body.clone())
        }),
        StepKind::Loop => parse_loop(&step.body).unwrap_or_else(|| {
            warn!(body = %step.body, "loop step did not match FOR/IN/DO grammar, treating as action");
            StepProgram::Action(step.body.clone())
        }),
        StepKind::FormatOperation => StepProgram::Format(parse_format_calls(&step.body)),
        StepKind::Action => StepProgram::Action(step.body.clone()),
    }
}

fn parse_memory_ops(body: &str) -> Vec<MemoryOp> {
    // Body order matters for audit logs, so stores and locates are merged by
    // their match offsets rather than concatenated per pattern.
    let mut ops: Vec<(usize, MemoryOp)> = STORE_RE
        .captures_iter(body)
        .map(|captures| {
            let offset = captures.get(0).map(|m| m.start()).unwrap_or_default();
            let op = MemoryOp::Store {
                path: captures[1].to_string(),
                expr: captures[2].trim().to_string(),
            };
            (offset, op)
        })
        .collect();

    ops.extend(LOCATE_RE.captures_iter(body).map(|captures| {
        let offset = captures.get(0).map(|m| m.start()).unwrap_or_default();
        (offset, MemoryOp::Locate { query: captures[1].to_string() })
    }));

    ops.sort_by_key(|(offset, _)| *offset);
    ops.into_iter().map(|(_, op)| op).collect()
}

fn parse_tool_calls(body: &str) -> Vec<ToolInvocation> {
    TOOL_RE
        .captures_iter(body)
        .map(|captures| ToolInvocation {
            name: captures[1].to_string(),
            args: captures[2].trim().to_string(),
        })
        .collect()
}

fn parse_conditional(body: &str) -> Option<StepProgram> {
    let captures = IF_RE.captures(body)?;
    Some(StepProgram::If {
        condition: captures[1].trim().to_string(),
        then_action: captures[2].trim().to_string(),
        else_action: captures.get(3).map(|m| m.as_str().trim().to_string()),
    })
}

fn parse_loop(body: &str) -> Option<StepProgram> {
    let captures = FOR_RE.captures(body)?;
    Some(StepProgram::For {
        var: captures[1].to_string(),
        iterable: captures[2].trim().to_string(),
        action: captures[3].trim().to_string(),
    })
}

fn parse_format_calls(body: &str) -> Vec<FormatCall> {
    FORMAT_RE
        .captures_iter(body)
        .map(|captures| FormatCall {
            template: captures[1].to_string(),
            data_expr: captures[2].trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn step(kind: StepKind, body: &str) -> WorkflowStep {
        WorkflowStep::new(kind, body)
    }

    #[test]
    fn compiles_store_and_locate_in_body_order() {
        let program = compile_step(&step(
            StepKind::MemoryOperation,
            "locate('user preferences') store('last_input', user_input)",
        ));
        assert_eq!(
            program,
            StepProgram::MemoryOps(vec![
                MemoryOp::Locate {
                    query: "user preferences".into()
                },
                MemoryOp::Store {
                    path: "last_input".into(),
                    expr: "user_input".into()
                },
            ])
        );
    }

    #[test]
    fn memory_body_without_invocations_compiles_to_empty_ops() {
        let program = compile_step(&step(StepKind::MemoryOperation, "nothing to see"));
        assert_eq!(program, StepProgram::MemoryOps(vec![]));
    }

    #[test]
    fn compiles_tool_calls_with_raw_args() {
        let program = compile_step(&step(StepKind::ToolCall, "log('starting', 'info') uuid()"));
        assert_eq!(
            program,
            StepProgram::ToolCalls(vec![
                ToolInvocation {
                    name: "log".into(),
                    args: "'starting', 'info'".into()
                },
                ToolInvocation {
                    name: "uuid".into(),
                    args: String::new()
                },
            ])
        );
    }

    #[test]
    fn compiles_conditional_with_and_without_else() {
        let with_else = compile_step(&step(StepKind::Conditional, "IF ready THEN launch ELSE wait"));
        assert_eq!(
            with_else,
            StepProgram::If {
                condition: "ready".into(),
                then_action: "launch".into(),
                else_action: Some("wait".into()),
            }
        );

        let without_else = compile_step(&step(StepKind::Conditional, "if ready then launch"));
        assert_eq!(
            without_else,
            StepProgram::If {
                condition: "ready".into(),
                then_action: "launch".into(),
                else_action: None,
            }
        );
    }

    #[test]
    fn malformed_conditional_degrades_to_action() {
        let program = compile_step(&step(StepKind::Conditional, "WHENEVER possible"));
        assert_eq!(program, StepProgram::Action("WHENEVER possible".into()));
    }

    #[test]
    fn compiles_loop() {
        let program = compile_step(&step(StepKind::Loop, "FOR item IN [1,2,3] DO process the item"));
        assert_eq!(
            program,
            StepProgram::For {
                var: "item".into(),
                iterable: "[1,2,3]".into(),
                action: "process the item".into(),
            }
        );
    }

    #[test]
    fn compiles_format_call() {
        let program = compile_step(&step(StepKind::FormatOperation, "format('Hello {name}', profile)"));
        assert_eq!(
            program,
            StepProgram::Format(vec![FormatCall {
                template: "Hello {name}".into(),
                data_expr: "profile".into(),
            }])
        );
    }

    #[test]
    fn action_body_passes_through() {
        let program = compile_step(&step(StepKind::Action, "say hi"));
        assert_eq!(program, StepProgram::Action("say hi".into()));
    }
}
