//! Library surface of the quarry binary: the pipeline driver and the
//! built-in selection engine, exposed for integration tests.

pub mod engine;
pub mod pipeline;
