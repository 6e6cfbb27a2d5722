use crate::error::{DataError, Result};
use crate::registry::ConnectionRegistry;
use crate::traits::DataSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Connection manager callback: turns a connection name into a live
/// backend client at query-execution time.
///
/// A backend-integration module installs one of these per kind through
/// [`ConnectionManagers::register`]. Most delegate to the shared
/// [`ConnectionRegistry`] (see [`RegistryResolver`]), but the protocol
/// also permits a pre-bound client that ignores the name entirely
/// ([`StaticResolver`]).
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Arc<dyn DataSource>>;
}

/// Per-kind table of active connection resolvers.
///
/// Exactly one resolver is active per kind at a time. Registration is a
/// startup-time operation; replacing an existing resolver is allowed
/// but logged, never a silent side effect of call order.
pub struct ConnectionManagers {
    resolvers: RwLock<HashMap<String, Arc<dyn ConnectionResolver>>>,
}

impl ConnectionManagers {
    pub fn new() -> Self {
        Self {
            resolvers: RwLock::new(HashMap::new()),
        }
    }

    /// Install the resolver for a backend kind, replacing any prior one
    pub async fn register(&self, kind: &str, resolver: Arc<dyn ConnectionResolver>) {
        let mut resolvers = self.resolvers.write().await;

        if resolvers.insert(kind.to_string(), resolver).is_some() {
            warn!("Replacing connection resolver for kind: {}", kind);
        } else {
            debug!("Registered connection resolver for kind: {}", kind);
        }
    }

    /// Resolve a named connection of the given kind.
    ///
    /// Fails with `NoBackendConfigured` when no resolver was installed
    /// for the kind; this surfaces as a query execution error, never a
    /// panic.
    pub async fn resolve(&self, kind: &str, name: &str) -> Result<Arc<dyn DataSource>> {
        let resolver = {
            let resolvers = self.resolvers.read().await;
            resolvers.get(kind).cloned()
        };

        match resolver {
            Some(resolver) => resolver.resolve(name).await,
            None => Err(DataError::NoBackendConfigured(kind.to_string())),
        }
    }

    /// Check whether a resolver is active for a kind
    pub async fn has_kind(&self, kind: &str) -> bool {
        let resolvers = self.resolvers.read().await;
        resolvers.contains_key(kind)
    }

    /// List kinds with an active resolver
    pub async fn kinds(&self) -> Vec<String> {
        let resolvers = self.resolvers.read().await;
        resolvers.keys().cloned().collect()
    }
}

impl Default for ConnectionManagers {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolver that delegates to the shared [`ConnectionRegistry`].
///
/// In pass-through mode the requested name is looked up as-is. A pinned
/// resolver always resolves one fixed entry regardless of the requested
/// name, which is the single-CLI-connection mode: only one connection
/// exists, so the name carries no information.
pub struct RegistryResolver {
    kind: String,
    registry: Arc<ConnectionRegistry>,
    pinned: Option<String>,
}

impl RegistryResolver {
    pub fn new(kind: impl Into<String>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            kind: kind.into(),
            registry,
            pinned: None,
        }
    }

    pub fn pinned(
        kind: impl Into<String>,
        registry: Arc<ConnectionRegistry>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            registry,
            pinned: Some(name.into()),
        }
    }
}

#[async_trait]
impl ConnectionResolver for RegistryResolver {
    async fn resolve(&self, name: &str) -> Result<Arc<dyn DataSource>> {
        let effective = self.pinned.as_deref().unwrap_or(name);
        self.registry.resolve(&self.kind, effective).await
    }
}

/// Resolver returning one pre-bound client for every name
pub struct StaticResolver {
    source: Arc<dyn DataSource>,
}

impl StaticResolver {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ConnectionResolver for StaticResolver {
    async fn resolve(&self, _name: &str) -> Result<Arc<dyn DataSource>> {
        Ok(self.source.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::source_factory;
    use crate::traits::Capability;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        label: &'static str,
    }

    #[async_trait]
    impl DataSource for FakeSource {
        fn source_type(&self) -> &'static str {
            self.label
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::KeyValue]
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unconfigured_kind_fails() {
        let managers = ConnectionManagers::new();
        let err = managers.resolve("redis", "c1").await.unwrap_err();
        assert!(matches!(err, DataError::NoBackendConfigured(kind) if kind == "redis"));
    }

    #[tokio::test]
    async fn test_replacement_leaves_latest_resolver() {
        let managers = ConnectionManagers::new();

        let first: Arc<dyn ConnectionResolver> =
            Arc::new(StaticResolver::new(Arc::new(FakeSource { label: "first" })));
        let second: Arc<dyn ConnectionResolver> = Arc::new(StaticResolver::new(Arc::new(
            FakeSource { label: "second" },
        )));

        managers.register("redis", first).await;
        managers.register("redis", second).await;

        let source = managers.resolve("redis", "anything").await.unwrap();
        assert_eq!(source.source_type(), "second");
        assert_eq!(managers.kinds().await.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_resolver_passes_name_through() {
        let registry = Arc::new(ConnectionRegistry::new());
        registry
            .register(
                "redis",
                "c1",
                source_factory(|| async {
                    Ok(Arc::new(FakeSource { label: "c1" }) as Arc<dyn DataSource>)
                }),
            )
            .await
            .unwrap();

        let resolver = RegistryResolver::new("redis", registry);
        assert_eq!(resolver.resolve("c1").await.unwrap().source_type(), "c1");

        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(matches!(err, DataError::UnknownConnection { .. }));
    }

    #[tokio::test]
    async fn test_pinned_resolver_ignores_name() {
        let registry = Arc::new(ConnectionRegistry::new());
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = constructions.clone();
        registry
            .register(
                "redis",
                "",
                source_factory(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(FakeSource { label: "default" }) as Arc<dyn DataSource>)
                    }
                }),
            )
            .await
            .unwrap();

        let resolver = RegistryResolver::pinned("redis", registry, "");
        let a = resolver.resolve("c1").await.unwrap();
        let b = resolver.resolve("totally-different").await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }
}
