//! Error types for the dynamic bit vector.
//!
//! Core operations fail fast on precondition violations; these variants cover
//! the checked entry points, configuration, and operation-log parsing.

use thiserror::Error;

/// Error variants for dynamic bit vector operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An index was provided that is out of the structure's bounds.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// A selection query was performed for a rank that does not exist.
    #[error("invalid selection: rank {0} not found")]
    InvalidSelection(usize),

    /// A tree configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation log contained no initial length.
    #[error("operation log is empty")]
    EmptyLog,

    /// An opcode at `offset` is missing one or more operands.
    #[error("operation log truncated: opcode at offset {offset} is missing operands")]
    TruncatedLog {
        /// Position of the incomplete opcode in the flat log.
        offset: usize,
    },

    /// A structural check found cached state that disagrees with the data.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// A specialized Result type for bit vector operations.
pub type Result<T> = std::result::Result<T, Error>;
