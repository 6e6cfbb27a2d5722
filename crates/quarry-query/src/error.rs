use thiserror::Error;

/// Unified error type for connection resolution and backend operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Connection establishment failed (authentication, network, etc.)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A query referenced a backend kind with no active resolver
    #[error("No {0} backend configured")]
    NoBackendConfigured(String),

    /// No connection factory was registered for this (kind, name) pair
    #[error("Unknown {kind} connection: {name:?}")]
    UnknownConnection { kind: String, name: String },

    /// A factory already exists for this (kind, name) pair
    #[error("Connection already registered: {kind} {name:?}")]
    DuplicateRegistration { kind: String, name: String },

    /// A query invoked a function that no backend module registered
    #[error("Unknown query function: {0}")]
    UnknownFunction(String),

    /// Backend operation failed at execution time
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Invalid query syntax or parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Entity or key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DataError {
    /// Create a connection failure error with custom message
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        DataError::ConnectionFailed(msg.into())
    }

    /// Create a "query failed" error with custom message
    pub fn query_failed(msg: impl Into<String>) -> Self {
        DataError::QueryFailed(msg.into())
    }

    /// Create an invalid query error
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        DataError::InvalidQuery(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DataError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
