use crate::error::{DataError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// The opaque query-engine collaborator.
///
/// The core hands an engine the query text and receives a structured
/// result; grammar, coercion, and function semantics all live behind
/// this boundary. Syntax and semantic errors surface from `prepare`,
/// runtime errors (including backend resolution failures) from `exec`.
#[async_trait]
pub trait QueryEngine: Send {
    fn prepare(&mut self, query: &str) -> Result<()>;

    async fn exec(&mut self) -> Result<Value>;
}

/// An engine-callable function contributed by a backend module,
/// e.g. `redis_get` or `mongo_find`. Arguments and results are plain
/// JSON values so engines stay decoupled from backend types.
#[async_trait]
pub trait QueryFunction: Send + Sync {
    fn name(&self) -> &'static str;

    async fn call(&self, args: &[Value]) -> Result<Value>;
}

/// Registry of engine-callable functions.
///
/// This is the channel through which a query reaches backends: backend
/// plugins register their functions here at startup and engines
/// dispatch by name during `exec`.
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<dyn QueryFunction>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a function under its own name, replacing any prior one
    pub async fn register(&self, function: Arc<dyn QueryFunction>) {
        let name = function.name();
        let mut functions = self.functions.write().await;

        if functions.insert(name.to_string(), function).is_some() {
            warn!("Replacing query function: {}", name);
        } else {
            debug!("Registered query function: {}", name);
        }
    }

    /// Look up a function by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn QueryFunction>> {
        let functions = self.functions.read().await;
        functions.get(name).cloned()
    }

    /// Dispatch a call by name
    pub async fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let function = self
            .get(name)
            .await
            .ok_or_else(|| DataError::UnknownFunction(name.to_string()))?;
        function.call(args).await
    }

    /// List registered function names
    pub async fn names(&self) -> Vec<String> {
        let functions = self.functions.read().await;
        functions.keys().cloned().collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a required string argument, with a function-qualified error
pub fn string_arg(function: &str, args: &[Value], index: usize) -> Result<String> {
    match args.get(index) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(DataError::InvalidQuery(format!(
            "{}: argument {} must be a string, got {}",
            function, index, other
        ))),
        None => Err(DataError::InvalidQuery(format!(
            "{}: missing argument {}",
            function, index
        ))),
    }
}

/// Extract an optional trailing argument
pub fn optional_arg(args: &[Value], index: usize) -> Option<Value> {
    args.get(index).cloned()
}
