//! Redis integration module for quarry.
//!
//! Provides the key-value cache backend: a [`RedisSource`] client
//! wrapper and the [`RedisPlugin`] that wires configured connections
//! into the resolution layer and registers the `redis_get` /
//! `redis_exists` query functions.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quarry_query_redis::RedisSource;
//!
//! # async fn example() -> quarry_query::Result<()> {
//! let source = RedisSource::connect("redis://localhost:6379").await?;
//! let value = source.get("greeting").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use quarry_query::{
    string_arg, BackendPlugin, Capability, ConnectionManagers, ConnectionSet, DataError,
    DataSource, PluginContext, QueryFunction, RegistryResolver, Result, DEFAULT_CONNECTION,
};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Backend kind served by this module
pub const KIND: &str = "redis";

/// Redis cache-store client
pub struct RedisSource {
    connection: ConnectionManager,
    url: String,
}

impl RedisSource {
    /// Connect to a Redis server.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn connect(url: &str) -> Result<Self> {
        debug!("Creating Redis source for URL: {}", url);

        let client = redis::Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            DataError::ConnectionFailed(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            DataError::ConnectionFailed(format!("Failed to connect to Redis: {}", e))
        })?;

        debug!("Redis client created successfully");

        Ok(Self {
            connection,
            url: url.to_string(),
        })
    }

    /// Fetch the value stored under a key, if any
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(key).await.map_err(|e: RedisError| {
            error!("GET {} failed: {}", key, e);
            DataError::QueryFailed(format!("GET {} failed: {}", key, e))
        })?;

        Ok(value)
    }

    /// Check whether a key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();

        let exists: bool = conn.exists(key).await.map_err(|e: RedisError| {
            error!("EXISTS {} failed: {}", key, e);
            DataError::QueryFailed(format!("EXISTS {} failed: {}", key, e))
        })?;

        Ok(exists)
    }

    /// Connection URL this source was created from
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataSource for RedisSource {
    fn source_type(&self) -> &'static str {
        KIND
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::KeyValue]
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing Redis source");
        // Connection manager handles cleanup automatically
        Ok(())
    }
}

/// Interpret a stored payload as JSON where possible.
///
/// Cached values are often serialized JSON; anything that does not
/// parse is returned verbatim as a JSON string.
fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// `redis_get(connection, key)` - value under `key`, `null` if missing
struct RedisGet {
    managers: Arc<ConnectionManagers>,
}

#[async_trait]
impl QueryFunction for RedisGet {
    fn name(&self) -> &'static str {
        "redis_get"
    }

    async fn call(&self, args: &[Value]) -> Result<Value> {
        let connection = string_arg(self.name(), args, 0)?;
        let key = string_arg(self.name(), args, 1)?;

        let source = self.managers.resolve(KIND, &connection).await?;
        let redis = source.downcast_ref::<RedisSource>().ok_or_else(|| {
            DataError::QueryFailed(format!("connection {:?} is not a redis source", connection))
        })?;

        match redis.get(&key).await? {
            Some(raw) => Ok(parse_payload(&raw)),
            None => Ok(Value::Null),
        }
    }
}

/// `redis_exists(connection, key)` - whether `key` is present
struct RedisExists {
    managers: Arc<ConnectionManagers>,
}

#[async_trait]
impl QueryFunction for RedisExists {
    fn name(&self) -> &'static str {
        "redis_exists"
    }

    async fn call(&self, args: &[Value]) -> Result<Value> {
        let connection = string_arg(self.name(), args, 0)?;
        let key = string_arg(self.name(), args, 1)?;

        let source = self.managers.resolve(KIND, &connection).await?;
        let redis = source.downcast_ref::<RedisSource>().ok_or_else(|| {
            DataError::QueryFailed(format!("connection {:?} is not a redis source", connection))
        })?;

        Ok(Value::Bool(redis.exists(&key).await?))
    }
}

/// Backend plugin wiring Redis into the resolution layer
pub struct RedisPlugin;

impl RedisPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RedisPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendPlugin for RedisPlugin {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn init(&self, ctx: &PluginContext, connections: &ConnectionSet) -> Result<()> {
        ctx.functions
            .register(Arc::new(RedisGet {
                managers: ctx.managers.clone(),
            }))
            .await;
        ctx.functions
            .register(Arc::new(RedisExists {
                managers: ctx.managers.clone(),
            }))
            .await;

        if connections.is_empty() {
            debug!("Redis plugin loaded without connections; resolver not installed");
            return Ok(());
        }

        for (name, address) in &connections.connections {
            let address = address.clone();
            ctx.registry
                .register(
                    KIND,
                    name,
                    quarry_query::source_factory(move || {
                        let address = address.clone();
                        async move {
                            let source = RedisSource::connect(&address).await?;
                            Ok(Arc::new(source) as Arc<dyn DataSource>)
                        }
                    }),
                )
                .await?;
        }

        let resolver = if connections.single {
            RegistryResolver::pinned(KIND, ctx.registry.clone(), DEFAULT_CONNECTION)
        } else {
            RegistryResolver::new(KIND, ctx.registry.clone())
        };
        ctx.managers.register(KIND, Arc::new(resolver)).await;

        debug!(
            "Redis plugin configured {} connection(s)",
            connections.connections.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_payload("42"), json!(42));
        assert_eq!(parse_payload("plain text"), json!("plain text"));
    }

    #[test]
    fn test_plugin_kind() {
        assert_eq!(RedisPlugin::new().kind(), KIND);
    }

    #[tokio::test]
    async fn test_functions_registered_without_connections() {
        let ctx = PluginContext::new();
        RedisPlugin::new()
            .init(&ctx, &ConnectionSet::default())
            .await
            .unwrap();

        let mut names = ctx.functions.names().await;
        names.sort();
        assert_eq!(names, vec!["redis_exists", "redis_get"]);
        assert!(!ctx.managers.has_kind(KIND).await);
    }

    #[tokio::test]
    async fn test_get_without_configuration_fails_cleanly() {
        let ctx = PluginContext::new();
        RedisPlugin::new()
            .init(&ctx, &ConnectionSet::default())
            .await
            .unwrap();

        let err = ctx
            .functions
            .call("redis_get", &[json!("c1"), json!("key")])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NoBackendConfigured(kind) if kind == KIND));
    }

    #[tokio::test]
    async fn test_argument_validation() {
        let ctx = PluginContext::new();
        RedisPlugin::new()
            .init(&ctx, &ConnectionSet::default())
            .await
            .unwrap();

        let err = ctx
            .functions
            .call("redis_get", &[json!("c1")])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidQuery(_)));

        let err = ctx
            .functions
            .call("redis_exists", &[json!(1), json!("key")])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_named_connection_mode_installs_passthrough_resolver() {
        let ctx = PluginContext::new();
        let mut connections = HashMap::new();
        connections.insert("c1".to_string(), "redis://localhost:6379".to_string());

        RedisPlugin::new()
            .init(
                &ctx,
                &ConnectionSet {
                    connections,
                    single: false,
                },
            )
            .await
            .unwrap();

        assert!(ctx.managers.has_kind(KIND).await);
        assert!(ctx.registry.contains(KIND, "c1").await);

        // Nothing connects until first resolution; an unknown name must
        // fail without touching the network.
        let err = ctx.managers.resolve(KIND, "c9").await.unwrap_err();
        assert!(matches!(err, DataError::UnknownConnection { .. }));
    }
}
