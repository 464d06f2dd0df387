//! Errors from running benchmarks.

use crate::config::ConfigError;
use crate::objectstore::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Define all the kinds of errors a benchmark run can end with.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Talking to the object store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// There is nothing to fetch.
    #[error("container {0} has no objects to fetch")]
    EmptyContainer(String),

    /// Deleted objects were still listed when we gave up waiting.
    #[error("container {container} still not empty after waiting {waited:?}")]
    Timeout {
        /// Container being emptied.
        container: String,
        /// How long we waited.
        waited: Duration,
    },

    /// Command line options make no sense.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}
