//! # Runtime Error Types
//!
//! Errors raised while constructing or configuring the runtime.
//!
//! Hot paths never return these: allocation exhaustion, interface mismatches
//! and absent strings are reported as `None`.

use thiserror::Error;

/// Errors that can occur while setting up runtime structures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A pool was configured to hold zero objects per block.
    #[error("pool capacity must be greater than zero")]
    ZeroCapacity,

    /// The block size for a pool does not describe a valid allocation.
    #[error("block layout overflow: {object_count} objects of {object_size} bytes")]
    LayoutOverflow {
        /// Size of one cell in bytes.
        object_size: usize,
        /// Number of cells per block.
        object_count: usize,
    },

    /// Configuration failed to parse or validate.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
}

/// Result type for runtime setup operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
