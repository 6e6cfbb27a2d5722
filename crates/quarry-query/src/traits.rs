use crate::error::Result;
use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capabilities supported by a backend source
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Capability {
    /// Key-value pairs (Redis, etc.)
    KeyValue,
    /// Document-based (MongoDB, etc.)
    Document,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::KeyValue => write!(f, "key-value"),
            Capability::Document => write!(f, "document"),
        }
    }
}

/// Core trait that every live backend connection must implement.
///
/// Resolvers hand these out as `Arc<dyn DataSource>`; backend query
/// functions downcast back to their concrete client type. A single
/// `DataSource` is expected to be internally connection-pool-capable,
/// so the registry never holds more than one per connection name.
#[async_trait]
pub trait DataSource: Send + Sync + Downcast {
    /// Get the type name of this data source
    fn source_type(&self) -> &'static str;

    /// Get all capabilities supported by this source
    fn capabilities(&self) -> Vec<Capability>;

    /// Check if a specific capability is supported
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Close the connection gracefully
    async fn close(&self) -> Result<()>;
}

impl_downcast!(DataSource);

impl fmt::Debug for dyn DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("source_type", &self.source_type())
            .finish()
    }
}
