//! Placeholder substitution and named response formats.
//!
//! Templates use `{key}` placeholders. Map-shaped data substitutes each
//! placeholder from the matching key; scalar data substitutes a single
//! `{data}` placeholder. A missing key is an `Err`, never a panic; the
//! format-operation handler contains it as an `error` field in the step
//! result, and [`FormatManager::format_response`] falls back to a plain
//! rendering.

use anyhow::{Result, bail};
use chrono::Utc;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{error, info};

use crate::resolve::format_value;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern compiles"));

/// Substitutes `{key}` placeholders in a template from the given data.
///
/// Map data binds each placeholder by key; any other value binds only the
/// `{data}` placeholder. Fails on the first placeholder with no binding.
pub fn render(template: &str, data: &Value) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut last_end = 0;

    for captures in PLACEHOLDER_RE.captures_iter(template) {
        let whole = captures.get(0).expect("capture 0 always present");
        let key = &captures[1];
        output.push_str(&template[last_end..whole.start()]);

        let bound = match data {
            Value::Object(map) => map.get(key),
            scalar if key == "data" => Some(scalar),
            _ => None,
        };
        match bound {
            Some(value) => output.push_str(&format_value(value)),
            None => bail!("template placeholder '{{{key}}}' has no binding"),
        }
        last_end = whole.end();
    }

    output.push_str(&template[last_end..]);
    Ok(output)
}

/// Registry of named response templates with sensible defaults.
#[derive(Debug, Clone)]
pub struct FormatManager {
    formats: IndexMap<String, String>,
}

impl Default for FormatManager {
    fn default() -> Self {
        let mut formats = IndexMap::new();
        formats.insert("interaction".to_string(), "Response: {content}\nTimestamp: {timestamp}".to_string());
        formats.insert("analysis".to_string(), "Analysis:\n{analysis}\n\nConclusion: {conclusion}".to_string());
        formats.insert("result".to_string(), "Result: {result}\nStatus: {status}".to_string());
        Self { formats }
    }
}

impl FormatManager {
    /// Creates a manager holding the default templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a named template.
    pub fn register_format(&mut self, format_type: impl Into<String>, template: impl Into<String>) {
        let format_type = format_type.into();
        info!(format_type, "registered format");
        self.formats.insert(format_type, template.into());
    }

    /// Names of all registered templates, in registration order.
    pub fn format_names(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }

    /// Renders data through a named template.
    ///
    /// Unknown names fall back to the `interaction` template. Map data gets
    /// default `timestamp` and `status` values filled in when absent; scalar
    /// data is rendered as `content`. A template failure degrades to a plain
    /// `Response: ...` line rather than propagating.
    pub fn format_response(&self, data: &Value, format_type: &str) -> String {
        let template = self
            .formats
            .get(format_type)
            .or_else(|| self.formats.get("interaction"))
            .cloned()
            .unwrap_or_else(|| "Response: {content}".to_string());

        let bound = match data {
            Value::Object(map) => {
                let mut filled = map.clone();
                filled
                    .entry("timestamp".to_string())
                    .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
                filled.entry("status".to_string()).or_insert_with(|| Value::String("success".into()));
                Value::Object(filled)
            }
            scalar => {
                let mut map = serde_json::Map::new();
                map.insert("content".to_string(), Value::String(format_value(scalar)));
                map.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));
                map.insert("status".to_string(), Value::String("success".into()));
                Value::Object(map)
            }
        };

        match render(&template, &bound) {
            Ok(text) => text,
            Err(err) => {
                error!(%err, format_type, "format template failed, falling back");
                format!("Response: {}", format_value(data))
            }
        }
    }
}
