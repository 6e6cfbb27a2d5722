//! The query pipeline driver: configure backends, load the root
//! document, run the query, persist the result.
//!
//! Steps are strictly sequential and the first failure aborts the run;
//! configuration is applied before any query input is read, and the
//! destination file is only ever created from a complete result.

use crate::engine::SelectEngine;
use quarry_query::{
    configure_backends, BackendConfig, BackendPlugin, DataError, PluginContext, QueryEngine,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Pipeline-level error taxonomy, one variant per failing stage
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Startup configuration failed; no query work was attempted
    #[error("Configuration error: {0}")]
    Configuration(#[source] DataError),

    /// Source document unreadable or not valid JSON
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Query text unreadable
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Query failed to compile
    #[error("Query compile error: {0}")]
    Compile(#[source] DataError),

    /// Query failed at execution time (includes backend resolution
    /// failures surfaced by query functions)
    #[error("Query execution error: {0}")]
    Exec(#[source] DataError),

    /// Result could not be serialized or written
    #[error("Output error: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

pub struct RunOptions {
    pub query: PathBuf,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub configurations: Option<PathBuf>,
    /// Single CLI-supplied address per backend kind
    pub overrides: HashMap<String, String>,
}

/// Run one query to completion.
///
/// Returns the result value (also written to the destination path) so
/// callers and tests can inspect it.
pub async fn run(opts: &RunOptions, plugins: &[Arc<dyn BackendPlugin>]) -> Result<Value> {
    // Startup configuration comes first: a malformed configuration
    // aborts before the query or source files are ever opened.
    let ctx = PluginContext::new();
    let config = match &opts.configurations {
        Some(path) => BackendConfig::from_file(path).map_err(PipelineError::Configuration)?,
        None => BackendConfig::default(),
    };
    configure_backends(plugins, &config, &opts.overrides, &ctx)
        .await
        .map_err(PipelineError::Configuration)?;

    let raw = fs::read_to_string(&opts.source)
        .map_err(|e| PipelineError::InvalidInput(format!("{}: {}", opts.source.display(), e)))?;
    let document: Value = serde_json::from_str(&raw)
        .map_err(|e| PipelineError::InvalidInput(format!("{}: {}", opts.source.display(), e)))?;

    let query = fs::read_to_string(&opts.query)
        .map_err(|e| PipelineError::InvalidQuery(format!("{}: {}", opts.query.display(), e)))?;

    let mut engine = SelectEngine::new(document, ctx.functions.clone());
    engine.prepare(&query).map_err(PipelineError::Compile)?;
    debug!("Query prepared");

    let result = engine.exec().await.map_err(PipelineError::Exec)?;
    debug!("Query executed");

    write_result(&opts.destination, &result)?;
    info!("Result written to {}", opts.destination.display());

    let _ = ctx.registry.close_all().await;
    Ok(result)
}

/// Serialize the result and move it into place atomically, so a failed
/// run never leaves a partial destination file.
fn write_result(destination: &Path, result: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(result)
        .map_err(|e| PipelineError::Output(e.to_string()))?;

    let staged = destination.with_extension("tmp");
    fs::write(&staged, rendered.as_bytes())
        .map_err(|e| PipelineError::Output(format!("{}: {}", staged.display(), e)))?;
    fs::rename(&staged, destination)
        .map_err(|e| PipelineError::Output(format!("{}: {}", destination.display(), e)))?;

    Ok(())
}
