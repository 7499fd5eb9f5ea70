//! # Expression Resolution
//!
//! Resolves a raw step-language token against an execution context into a
//! typed JSON value. The precedence chain is strict and each tier is a pure
//! function, so individual tiers are testable in isolation:
//!
//! 1. exact key match in the context (variables always win, even when the
//!    name looks like a literal);
//! 2. quoted string literal (`'...'` or `"..."`);
//! 3. numeric literal (a `.` makes it a float, otherwise an integer);
//! 4. boolean literal (`true`/`false`, case-insensitive);
//! 5. JSON array literal (`[...]`);
//! 6. fallback: the trimmed raw token as an opaque string.
//!
//! [`evaluate`] never fails; the fallback tier guarantees some value for any
//! input. [`evaluate_strict`] is the one deliberate exception: it rejects a
//! bare identifier that resolved through no tier but the fallback, so that a
//! `store(path, expr)` referencing an unbound context key surfaces an error
//! instead of silently persisting the identifier's name.

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("identifier pattern compiles"));

/// Tier 1: exact variable lookup in the execution context.
pub fn lookup_variable(token: &str, context: &Map<String, Value>) -> Option<Value> {
    context.get(token).cloned()
}

/// Tier 2: single- or double-quoted string literal.
pub fn parse_quoted_literal(token: &str) -> Option<Value> {
    let stripped = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| token.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))?;
    Some(Value::String(stripped.to_string()))
}

/// Tier 3: numeric literal. A decimal point selects float parsing.
pub fn parse_numeric_literal(token: &str) -> Option<Value> {
    if token.contains('.') {
        let float = token.parse::<f64>().ok()?;
        serde_json::Number::from_f64(float).map(Value::Number)
    } else {
        token.parse::<i64>().ok().map(Value::from)
    }
}

/// Tier 4: case-insensitive boolean literal.
pub fn parse_boolean_literal(token: &str) -> Option<Value> {
    match token.to_ascii_lowercase().as_str() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Tier 5: JSON array literal, parsed structurally.
pub fn parse_array_literal(token: &str) -> Option<Value> {
    if !(token.starts_with('[') && token.ends_with(']')) {
        return None;
    }
    serde_json::from_str::<Value>(token).ok().filter(Value::is_array)
}

fn resolve_literal(token: &str) -> Option<Value> {
    parse_quoted_literal(token)
        .or_else(|| parse_numeric_literal(token))
        .or_else(|| parse_boolean_literal(token))
        .or_else(|| parse_array_literal(token))
}

/// Resolves a token to a value, never failing.
///
/// Unrecognized input falls through to tier 6 and comes back as the trimmed
/// raw token wrapped in a string.
pub fn evaluate(token: &str, context: &Map<String, Value>) -> Value {
    let trimmed = token.trim();
    lookup_variable(trimmed, context)
        .or_else(|| resolve_literal(trimmed))
        .unwrap_or_else(|| Value::String(trimmed.to_string()))
}

/// Like [`evaluate`], but rejects unbound bare identifiers.
///
/// Multi-word or punctuated tokens still fall back to opaque strings; only a
/// token shaped like a variable name that matches no context key and no
/// literal tier is treated as an error.
pub fn evaluate_strict(token: &str, context: &Map<String, Value>) -> Result<Value> {
    let trimmed = token.trim();
    if let Some(value) = lookup_variable(trimmed, context) {
        return Ok(value);
    }
    if let Some(value) = resolve_literal(trimmed) {
        return Ok(value);
    }
    if IDENTIFIER_RE.is_match(trimmed) {
        bail!("unbound context reference '{trimmed}'");
    }
    Ok(Value::String(trimmed.to_string()))
}

/// Truthiness of a resolved value, used by conditional steps.
///
/// Null and false are falsy; numbers are falsy at zero; strings, arrays, and
/// maps are falsy when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Renders a value for embedding in formatted text.
///
/// Strings stay bare, scalars use their display form, null becomes the empty
/// string, and structured values fall back to compact JSON.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
