//! Columnar hash-join kernel compiler.
//!
//! Given a join's *shape* — its column type vector and the subset of
//! channels carrying the join key — this crate compiles a specialized
//! [`strategy::PagesHashStrategy`] once per shape, memoizes it in a
//! [`cache::SpecializationCache`], and builds an in-memory, open-addressed
//! [`hash_index::InMemoryJoinHash`] over the join build side for O(1)
//! expected-time probing.
//!
//! Row addresses pack `(batch_index, position_in_batch)` into a single
//! `u64` ([`page::pack_address`]); join-key equality is null-aware in the
//! sense that two NULLs match each other (never SQL's three-valued logic),
//! and row hashes fold NULL join-key columns to zero.

pub mod cache;
pub mod config;
pub mod error;
pub mod hash_index;
pub mod kernel;
pub mod lookup_source;
pub mod page;
pub mod strategy;
pub mod types;

pub use cache::SpecializationCache;
pub use config::JoinKernelConfig;
pub use error::{InvalidShapeReason, JoinKernelError, Result, SharedJoinKernelError};
pub use hash_index::{InMemoryJoinHash, MAX_ROWS};
pub use kernel::compile_lookup_source_factory;
pub use lookup_source::{LookupSource, LookupSourceFactory, OperatorContext};
pub use page::{pack_address, unpack_address, BatchList, Page, EMPTY_ADDRESS};
pub use strategy::{JoinChannelIndices, JoinShape, PagesHashStrategy};
pub use types::{
    BlockBuilder, BooleanBlock, BooleanBuilder, BooleanType, BytesBlock, BytesBuilder, BytesType, ColumnBlock, ColumnTypeOps,
    Float64Block, Float64Builder, Float64Type, Int32Block, Int32Builder, Int32Type, Int64Block, Int64Builder, Int64Type,
    PageBuilder, TypeRegistry, TypeTag,
};
