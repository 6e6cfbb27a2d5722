//! MongoDB integration module for quarry.
//!
//! Provides the document-store backend: a [`MongoSource`] client
//! wrapper and the [`MongoPlugin`] that wires configured connections
//! into the resolution layer and registers the `mongo_find` /
//! `mongo_find_one` query functions.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quarry_query_mongodb::MongoSource;
//!
//! # async fn example() -> quarry_query::Result<()> {
//! let source = MongoSource::connect("mongodb://localhost:27017").await?;
//! let doc = source.find_one("mydb", "users", None).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::Document, options::ClientOptions, Client};
use quarry_query::{
    optional_arg, string_arg, BackendPlugin, Capability, ConnectionManagers, ConnectionSet,
    DataError, DataSource, PluginContext, QueryFunction, RegistryResolver, Result,
    DEFAULT_CONNECTION,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Backend kind served by this module
pub const KIND: &str = "mongo";

/// MongoDB document-store client
pub struct MongoSource {
    client: Client,
    url: String,
}

impl MongoSource {
    /// Connect to a MongoDB deployment.
    ///
    /// # Arguments
    ///
    /// * `url` - MongoDB connection URL (e.g., "mongodb://localhost:27017")
    pub async fn connect(url: &str) -> Result<Self> {
        debug!("Creating MongoDB source for URL: {}", url);

        let client_options = ClientOptions::parse(url).await.map_err(|e| {
            error!("Failed to parse MongoDB URL: {}", e);
            DataError::ConnectionFailed(format!("Failed to parse MongoDB URL: {}", e))
        })?;

        let client = Client::with_options(client_options).map_err(|e| {
            error!("Failed to create MongoDB client: {}", e);
            DataError::ConnectionFailed(format!("Failed to create MongoDB client: {}", e))
        })?;

        // Test connection
        client.list_database_names().await.map_err(|e| {
            error!("Failed to connect to MongoDB: {}", e);
            DataError::ConnectionFailed(format!("Failed to connect to MongoDB: {}", e))
        })?;

        debug!("MongoDB client created successfully");

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Find documents matching a filter, as JSON
    pub async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: Option<Value>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>> {
        let collection = self.client.database(database).collection::<Document>(collection);
        let filter = filter_document(filter)?;

        let mut find = collection.find(filter);
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        let mut cursor = find.await.map_err(|e| {
            error!("find failed: {}", e);
            DataError::QueryFailed(format!("find failed: {}", e))
        })?;

        let mut documents = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(|e| {
            error!("cursor read failed: {}", e);
            DataError::QueryFailed(format!("cursor read failed: {}", e))
        })? {
            documents.push(document_to_json(document)?);
        }

        Ok(documents)
    }

    /// Find a single matching document, as JSON
    pub async fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: Option<Value>,
    ) -> Result<Option<Value>> {
        let collection = self.client.database(database).collection::<Document>(collection);
        let filter = filter_document(filter)?;

        let document = collection.find_one(filter).await.map_err(|e| {
            error!("find_one failed: {}", e);
            DataError::QueryFailed(format!("find_one failed: {}", e))
        })?;

        document.map(document_to_json).transpose()
    }

    /// Connection URL this source was created from
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataSource for MongoSource {
    fn source_type(&self) -> &'static str {
        KIND
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Document]
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing MongoDB source");
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// Convert a JSON filter into a BSON document; `None` matches everything
fn filter_document(filter: Option<Value>) -> Result<Document> {
    match filter {
        None | Some(Value::Null) => Ok(Document::new()),
        Some(value) => bson::to_document(&value)
            .map_err(|e| DataError::InvalidQuery(format!("invalid filter: {}", e))),
    }
}

fn document_to_json(document: Document) -> Result<Value> {
    serde_json::to_value(document).map_err(|e| DataError::SerializationError(e.to_string()))
}

/// `mongo_find(connection, database, collection, filter?)` - matching
/// documents as a JSON array
struct MongoFind {
    managers: Arc<ConnectionManagers>,
}

#[async_trait]
impl QueryFunction for MongoFind {
    fn name(&self) -> &'static str {
        "mongo_find"
    }

    async fn call(&self, args: &[Value]) -> Result<Value> {
        let connection = string_arg(self.name(), args, 0)?;
        let database = string_arg(self.name(), args, 1)?;
        let collection = string_arg(self.name(), args, 2)?;
        let filter = optional_arg(args, 3);

        let source = self.managers.resolve(KIND, &connection).await?;
        let mongo = source.downcast_ref::<MongoSource>().ok_or_else(|| {
            DataError::QueryFailed(format!("connection {:?} is not a mongo source", connection))
        })?;

        let documents = mongo.find(&database, &collection, filter, None).await?;
        Ok(Value::Array(documents))
    }
}

/// `mongo_find_one(connection, database, collection, filter?)` - first
/// matching document, `null` if none
struct MongoFindOne {
    managers: Arc<ConnectionManagers>,
}

#[async_trait]
impl QueryFunction for MongoFindOne {
    fn name(&self) -> &'static str {
        "mongo_find_one"
    }

    async fn call(&self, args: &[Value]) -> Result<Value> {
        let connection = string_arg(self.name(), args, 0)?;
        let database = string_arg(self.name(), args, 1)?;
        let collection = string_arg(self.name(), args, 2)?;
        let filter = optional_arg(args, 3);

        let source = self.managers.resolve(KIND, &connection).await?;
        let mongo = source.downcast_ref::<MongoSource>().ok_or_else(|| {
            DataError::QueryFailed(format!("connection {:?} is not a mongo source", connection))
        })?;

        Ok(mongo
            .find_one(&database, &collection, filter)
            .await?
            .unwrap_or(Value::Null))
    }
}

/// Backend plugin wiring MongoDB into the resolution layer
pub struct MongoPlugin;

impl MongoPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MongoPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendPlugin for MongoPlugin {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn init(&self, ctx: &PluginContext, connections: &ConnectionSet) -> Result<()> {
        ctx.functions
            .register(Arc::new(MongoFind {
                managers: ctx.managers.clone(),
            }))
            .await;
        ctx.functions
            .register(Arc::new(MongoFindOne {
                managers: ctx.managers.clone(),
            }))
            .await;

        if connections.is_empty() {
            debug!("MongoDB plugin loaded without connections; resolver not installed");
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
                            let source = MongoSource::connect(&address).await?;
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
            "MongoDB plugin configured {} connection(s)",
            connections.connections.len()
        );
        Ok(())
    }
}
