//! Built-in minimal query engine.
//!
//! The real query language is an external collaborator behind the
//! [`QueryEngine`] trait; this engine exists so the binary is usable
//! without one. It understands exactly two query forms:
//!
//! - a dotted field path over the root document (`a.b.0`), and
//! - a single backend function call with JSON-literal arguments
//!   (`redis_get("c1", "greeting")`), dispatched through the shared
//!   [`FunctionRegistry`].
//!
//! Anything else is rejected at `prepare` time.

use async_trait::async_trait;
use quarry_query::{DataError, FunctionRegistry, QueryEngine, Result};
use serde_json::Value;
use std::sync::Arc;

enum Plan {
    /// Field-path selection from the root document
    Select(Vec<String>),
    /// One function call dispatched by name
    Call { function: String, args: Vec<Value> },
}

pub struct SelectEngine {
    document: Value,
    functions: Arc<FunctionRegistry>,
    plan: Option<Plan>,
}

impl SelectEngine {
    pub fn new(document: Value, functions: Arc<FunctionRegistry>) -> Self {
        Self {
            document,
            functions,
            plan: None,
        }
    }
}

#[async_trait]
impl QueryEngine for SelectEngine {
    fn prepare(&mut self, query: &str) -> Result<()> {
        self.plan = Some(parse(query)?);
        Ok(())
    }

    async fn exec(&mut self) -> Result<Value> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| DataError::invalid_query("exec called before prepare"))?;

        match plan {
            Plan::Select(path) => Ok(select(&self.document, path)),
            Plan::Call { function, args } => self.functions.call(function, args).await,
        }
    }
}

fn parse(query: &str) -> Result<Plan> {
    let query = query.trim();
    if query.is_empty() {
        return Err(DataError::invalid_query("empty query"));
    }

    if let Some(open) = query.find('(') {
        let function = query[..open].trim();
        if function.is_empty()
            || !function
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DataError::InvalidQuery(format!(
                "invalid function name: {:?}",
                function
            )));
        }
        let Some(inner) = query[open + 1..].strip_suffix(')') else {
            return Err(DataError::InvalidQuery(format!(
                "unterminated function call: {:?}",
                query
            )));
        };

        Ok(Plan::Call {
            function: function.to_string(),
            args: parse_args(inner)?,
        })
    } else {
        let segments: Vec<String> = query.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(DataError::InvalidQuery(format!(
                "invalid field path: {:?}",
                query
            )));
        }
        Ok(Plan::Select(segments))
    }
}

/// Split a comma-separated argument list into JSON literals, honoring
/// nesting and string quoting so object literals stay intact.
fn parse_args(inner: &str) -> Result<Vec<Value>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in inner.chars() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            '{' | '[' => {
                depth += 1;
                current.push(c);
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current);
    }

    args.into_iter()
        .map(|raw| {
            let raw = raw.trim();
            serde_json::from_str(raw).map_err(|e| {
                DataError::InvalidQuery(format!("invalid argument literal {:?}: {}", raw, e))
            })
        })
        .collect()
}

/// Walk a field path; a missing step yields `null`, not an error
fn select(document: &Value, path: &[String]) -> Value {
    let mut current = document;
    for segment in path {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(value) => value,
                None => return Value::Null,
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(value) => value,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}
