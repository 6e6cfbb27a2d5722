use crate::error::{DataError, Result};
use crate::traits::DataSource;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

/// Async factory producing one live backend connection
pub type SourceFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn DataSource>>> + Send + Sync>;

/// Box an async closure into a [`SourceFactory`]
pub fn source_factory<F, Fut>(f: F) -> SourceFactory
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn DataSource>>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as BoxFuture<'static, Result<Arc<dyn DataSource>>>)
}

struct Entry {
    factory: SourceFactory,
    cell: OnceCell<Arc<dyn DataSource>>,
}

/// Singleton registry of named backend connections.
///
/// Each `(kind, name)` pair maps to a factory and at most one live
/// instance. The factory runs lazily on first [`resolve`] and at most
/// once per entry even under concurrent first access; construction
/// failures are not cached, so a later `resolve` retries.
///
/// Kinds are open-ended strings (`"redis"`, `"mongo"`, ...), never a
/// fixed enum, so new backend modules need no changes here.
///
/// [`resolve`]: ConnectionRegistry::resolve
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<(String, String), Arc<Entry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Install a factory for `(kind, name)`.
    ///
    /// Registration is startup-only and collisions are programming
    /// errors, so an existing entry fails with `DuplicateRegistration`
    /// instead of being silently overwritten.
    pub async fn register(&self, kind: &str, name: &str, factory: SourceFactory) -> Result<()> {
        let mut entries = self.entries.write().await;
        let key = (kind.to_string(), name.to_string());

        if entries.contains_key(&key) {
            return Err(DataError::DuplicateRegistration {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }

        entries.insert(
            key,
            Arc::new(Entry {
                factory,
                cell: OnceCell::new(),
            }),
        );
        debug!("Registered {} connection {:?}", kind, name);
        Ok(())
    }

    /// Resolve the connection for `(kind, name)`, constructing it on
    /// first use.
    ///
    /// Concurrent callers racing on an unconstructed entry all wait on
    /// a single factory invocation and receive the same instance. A
    /// failed invocation caches nothing and surfaces the factory error
    /// to every waiter that observes it.
    pub async fn resolve(&self, kind: &str, name: &str) -> Result<Arc<dyn DataSource>> {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(&(kind.to_string(), name.to_string())).cloned()
        };

        let entry = entry.ok_or_else(|| DataError::UnknownConnection {
            kind: kind.to_string(),
            name: name.to_string(),
        })?;

        let source = entry
            .cell
            .get_or_try_init(|| {
                debug!("Constructing {} connection {:?}", kind, name);
                (entry.factory)()
            })
            .await?;

        Ok(source.clone())
    }

    /// Check whether a factory exists for `(kind, name)`
    pub async fn contains(&self, kind: &str, name: &str) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(&(kind.to_string(), name.to_string()))
    }

    /// List registered connection names for a kind
    pub async fn names(&self, kind: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        entries
            .keys()
            .filter(|(k, _)| k == kind)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Close every materialized connection
    pub async fn close_all(&self) -> Result<()> {
        let entries = self.entries.read().await;

        for ((kind, name), entry) in entries.iter() {
            if let Some(source) = entry.cell.get() {
                debug!("Closing {} connection {:?}", kind, name);
                let _ = source.close().await;
            }
        }

        Ok(())
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
