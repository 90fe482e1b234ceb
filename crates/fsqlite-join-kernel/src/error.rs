//! Error kinds for the join-kernel compiler.
//!
//! Shape and type errors surface at compile-factory time; once a strategy
//! and hash index are built, probing is total and never returns an error
//! (a miss is a `None`, not an `Err`).

use std::sync::Arc;

use crate::types::TypeTag;

/// Crate-local result alias, mirroring the `Result<T>` aliases other
/// FrankenSQLite crates export around their local error enum.
pub type Result<T> = std::result::Result<T, JoinKernelError>;

/// Why a `(type_vector, join_channel_indices)` shape was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidShapeReason {
    /// `type_vector` has no columns at all.
    #[error("type vector is empty")]
    EmptyTypeVector,
    /// A join-channel index does not address a column in `type_vector`.
    #[error("join-channel index {index} out of bounds for type vector of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Errors produced while compiling or sizing a join kernel.
#[derive(Debug, thiserror::Error)]
pub enum JoinKernelError {
    /// The shape itself is malformed.
    #[error("invalid join shape: {0}")]
    InvalidShape(InvalidShapeReason),

    /// A column type in the type vector has no registered capability record.
    #[error("unsupported column type: no capability record registered for {tag:?}")]
    UnsupportedType { tag: TypeTag },

    /// The specialization backend failed to produce a working strategy;
    /// the root cause is preserved unchanged.
    #[error("specialization backend failed to compile a strategy")]
    Compilation {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The hash index cannot be sized for the requested row count.
    #[error("hash index cannot be sized for {requested_rows} rows (max addressable {max_rows})")]
    Capacity { requested_rows: u64, max_rows: u64 },
}

/// A cheaply-cloneable handle to a [`JoinKernelError`], used where the same
/// compilation failure must be replayed to every caller that raced on a
/// single-flight cache miss.
pub type SharedJoinKernelError = Arc<JoinKernelError>;
