//! # quarry-query
//!
//! Core abstractions for resolving named backend connections from
//! within a query.
//!
//! A query may reference external backends by name ("read key X from
//! cache c1"). This crate provides the resolution layer between the
//! query engine and those backends:
//!
//! - **ConnectionRegistry**: singleton store of named, lazily
//!   constructed backend clients — at most one live instance per
//!   (kind, name), constructed at most once even under concurrent
//!   first access
//! - **ConnectionManagers**: the registration protocol — one active
//!   resolver per backend kind, installed by backend plugins at
//!   startup and consulted by their query functions at execution time
//! - **FunctionRegistry**: the engine-callable functions backend
//!   modules contribute (`redis_get`, `mongo_find`, ...)
//! - **BackendPlugin**: the explicit initialization contract for
//!   backend-integration modules
//! - **BackendConfig / configure_backends**: the startup configuration
//!   loader (YAML file and/or per-kind CLI address)
//!
//! The query language itself is an external collaborator behind the
//! [`QueryEngine`] trait: the core supplies the root document and query
//! text, and receives a structured result.
//!
//! ## Backend Implementation
//!
//! To integrate a new backend kind:
//!
//! 1. Wrap the client in a struct implementing [`DataSource`]
//! 2. Implement [`BackendPlugin`]: register one registry factory per
//!    configured connection, install the kind's resolver, and register
//!    the kind's query functions
//! 3. Add the plugin to the entrypoint's plugin list
//!
//! Backend crates:
//! - `quarry-query-redis` - key-value cache store
//! - `quarry-query-mongodb` - document store

pub mod config;
pub mod engine;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod traits;

// Re-export commonly used items
pub use config::{configure_backends, BackendConfig, ConnectionSet, DEFAULT_CONNECTION};
pub use engine::{optional_arg, string_arg, FunctionRegistry, QueryEngine, QueryFunction};
pub use error::{DataError, Result};
pub use plugin::{BackendPlugin, PluginContext};
pub use registry::{source_factory, ConnectionRegistry, SourceFactory};
pub use resolver::{ConnectionManagers, ConnectionResolver, RegistryResolver, StaticResolver};
pub use traits::{Capability, DataSource};
