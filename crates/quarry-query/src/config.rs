use crate::error::{DataError, Result};
use crate::plugin::{BackendPlugin, PluginContext};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reserved connection name for the single CLI-supplied address of a kind
pub const DEFAULT_CONNECTION: &str = "";

/// Backend configuration map: kind -> connection name -> address.
///
/// YAML form, one mapping per backend kind:
///
/// ```yaml
/// redis:
///   c1: "redis://localhost:6379"
/// mongo:
///   main: "mongodb://localhost:27017"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(flatten)]
    pub kinds: HashMap<String, HashMap<String, String>>,
}

impl BackendConfig {
    /// Parse a YAML configuration string
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| DataError::InvalidConfiguration(format!("invalid YAML: {}", e)))
    }

    /// Read and parse a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DataError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&raw)
    }
}

/// The resolved connections of one backend kind, handed to its plugin.
///
/// `connections` maps name to address with file/flag precedence already
/// applied; `single` marks the CLI single-connection mode, where the
/// resolver ignores the requested name.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    pub connections: HashMap<String, String>,
    pub single: bool,
}

impl ConnectionSet {
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Apply the startup configuration: one `init` call per plugin, in
/// list order.
///
/// Precedence per kind: file entries register under their listed names;
/// a CLI-supplied address (`overrides`) registers under the reserved
/// default name [`DEFAULT_CONNECTION`] and wins over a file entry of
/// that name. A kind present in neither source still has its plugin
/// initialized so that its query functions exist and fail with
/// `NoBackendConfigured` instead of being unknown.
///
/// Runs once before any query work; tables are never mutated afterward.
pub async fn configure_backends(
    plugins: &[Arc<dyn BackendPlugin>],
    config: &BackendConfig,
    overrides: &HashMap<String, String>,
    ctx: &PluginContext,
) -> Result<()> {
    for plugin in plugins {
        let kind = plugin.kind();
        let file_entries = config.kinds.get(kind);
        let flag = overrides.get(kind);

        let mut connections = file_entries.cloned().unwrap_or_default();
        if let Some(address) = flag {
            if connections
                .insert(DEFAULT_CONNECTION.to_string(), address.clone())
                .is_some()
            {
                warn!(
                    "Command-line {} address overrides the default connection from the configuration file",
                    kind
                );
            }
        }

        let set = ConnectionSet {
            single: file_entries.is_none() && flag.is_some(),
            connections,
        };

        if set.is_empty() {
            debug!("No {} connections configured", kind);
        } else {
            debug!("Configuring {} {} connection(s)", set.connections.len(), kind);
        }

        plugin.init(ctx, &set).await?;
    }

    Ok(())
}
