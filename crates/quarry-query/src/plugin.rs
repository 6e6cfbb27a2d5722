use crate::config::ConnectionSet;
use crate::engine::FunctionRegistry;
use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::resolver::ConnectionManagers;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared services handed to every backend plugin at initialization
pub struct PluginContext {
    pub registry: Arc<ConnectionRegistry>,
    pub managers: Arc<ConnectionManagers>,
    pub functions: Arc<FunctionRegistry>,
}

impl PluginContext {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            managers: Arc::new(ConnectionManagers::new()),
            functions: Arc::new(FunctionRegistry::new()),
        }
    }
}

impl Default for PluginContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A backend-integration module.
///
/// The entrypoint supplies an explicit plugin list and the
/// configuration loader calls `init` once per plugin during startup —
/// there is no self-registration on load, so the set of active backends
/// is an inspectable value and initialization order is fixed.
///
/// `init` always registers the plugin's query functions. Connection
/// factories and the kind's resolver are installed only when the
/// [`ConnectionSet`] is non-empty; an unconfigured kind keeps its
/// functions callable but failing with `NoBackendConfigured`.
#[async_trait]
pub trait BackendPlugin: Send + Sync {
    /// Backend kind this plugin serves (`"redis"`, `"mongo"`, ...)
    fn kind(&self) -> &'static str;

    async fn init(&self, ctx: &PluginContext, connections: &ConnectionSet) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_starts_empty() {
        let ctx = PluginContext::new();
        assert!(ctx.managers.kinds().await.is_empty());
        assert!(ctx.functions.names().await.is_empty());
    }
}
