//! The compiled probe-time artifact: a fully built [`LookupSource`] plus the
//! [`LookupSourceFactory`] that builds one per join build side.

use std::sync::Arc;

use tracing::debug_span;

use crate::error::Result;
use crate::hash_index::InMemoryJoinHash;
use crate::page::{unpack_address, Page};
use crate::strategy::{JoinChannelIndices, PagesHashStrategy};
use crate::types::{ColumnBlock, ColumnTypeOps, PageBuilder};

/// Opaque per-query context supplied by the caller at build time.
///
/// This crate never inspects `query_id`; it only threads it through
/// `tracing` spans so probe-side diagnostics can be correlated with the
/// build that produced them.
#[derive(Debug, Clone, Default)]
pub struct OperatorContext {
    pub query_id: String,
}

/// A shape-specialized, not-yet-built strategy.
///
/// Cheap to hold onto: it owns the resolved type-capability records but no
/// row data. Call [`LookupSourceFactory::create_lookup_source`] once per
/// join execution, with that execution's build-side pages.
#[derive(Debug)]
pub struct LookupSourceFactory {
    ops: Vec<Arc<dyn ColumnTypeOps>>,
    join_channel_indices: JoinChannelIndices,
}

impl LookupSourceFactory {
    pub(crate) fn new(ops: Vec<Arc<dyn ColumnTypeOps>>, join_channel_indices: impl Into<JoinChannelIndices>) -> Self {
        Self {
            ops,
            join_channel_indices: join_channel_indices.into(),
        }
    }

    /// Number of channels in the specialized type vector.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.ops.len()
    }

    /// Append `pages` to a fresh strategy and build its hash index,
    /// producing a ready-to-probe [`LookupSource`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::JoinKernelError::InvalidShape`] if a page's
    /// channel count disagrees with this factory's type vector, or
    /// [`crate::error::JoinKernelError::Capacity`] if the combined row count
    /// exceeds [`crate::hash_index::MAX_ROWS`].
    pub fn create_lookup_source(&self, pages: Vec<Page>, operator_context: &OperatorContext) -> Result<LookupSource> {
        let _span = debug_span!(
            "create_lookup_source",
            query_id = %operator_context.query_id,
            pages = pages.len(),
        )
        .entered();

        let mut strategy = PagesHashStrategy::new(self.ops.clone(), self.join_channel_indices.clone());
        let mut addresses = Vec::new();
        let mut hashes = Vec::new();

        for (batch_index, page) in pages.iter().enumerate() {
            strategy.append_page(page)?;
            let batch_index = u32::try_from(batch_index).map_err(|_| crate::error::JoinKernelError::Capacity {
                requested_rows: batch_index as u64 + 1,
                max_rows: u32::MAX as u64,
            })?;
            for position in 0..page.row_count() {
                let position = u32::try_from(position).map_err(|_| crate::error::JoinKernelError::Capacity {
                    requested_rows: position as u64 + 1,
                    max_rows: u32::MAX as u64,
                })?;
                addresses.push(crate::page::pack_address(batch_index, position));
                hashes.push(strategy.hash_position(batch_index as usize, position as usize));
            }
        }

        let hash_index = InMemoryJoinHash::build(&addresses, &hashes)?;

        tracing::debug!(rows = addresses.len(), "built lookup source");

        Ok(LookupSource { strategy, hash_index })
    }
}

/// A fully built, read-only join build side.
///
/// Safe to share across probe threads: every method takes `&self`.
#[derive(Debug)]
pub struct LookupSource {
    strategy: PagesHashStrategy,
    hash_index: InMemoryJoinHash,
}

impl LookupSource {
    /// Number of build-side rows indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hash_index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hash_index.is_empty()
    }

    /// Find the first build-side address matching the probe row at
    /// `probe_position` in `probe_blocks` (join-channel order), whose hash
    /// is `raw_hash`.
    #[must_use]
    pub fn get_join_position(&self, probe_position: usize, probe_blocks: &[Arc<dyn ColumnBlock>], raw_hash: i32) -> Option<u64> {
        let strategy = &self.strategy;
        self.hash_index.get_join_position(raw_hash, |candidate| {
            let (batch_index, position) = unpack_address(candidate);
            strategy.position_equals_row(batch_index as usize, position as usize, probe_position, probe_blocks)
        })
    }

    /// Continue enumerating build-side matches for the same probe row after
    /// `previous_address`.
    #[must_use]
    pub fn get_next_join_position(&self, previous_address: u64, probe_position: usize, probe_blocks: &[Arc<dyn ColumnBlock>]) -> Option<u64> {
        let strategy = &self.strategy;
        self.hash_index.get_next_join_position(previous_address, |candidate| {
            let (batch_index, position) = unpack_address(candidate);
            strategy.position_equals_row(batch_index as usize, position as usize, probe_position, probe_blocks)
        })
    }

    /// Copy the build-side row at `address` into `out`'s block builders.
    pub fn append_to(&self, address: u64, out: &mut dyn PageBuilder, out_channel_offset: usize) {
        let (batch_index, position) = unpack_address(address);
        self.strategy.append_to(batch_index as usize, position as usize, out, out_channel_offset);
    }

    /// Row hash of a probe-side row laid out in join-channel order, for
    /// driving [`LookupSource::get_join_position`].
    #[must_use]
    pub fn hash_row(&self, position: usize, probe_blocks: &[Arc<dyn ColumnBlock>]) -> i32 {
        self.strategy.hash_row(position, probe_blocks)
    }

    /// Retained heap memory of the strategy's row data plus the hash index.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.strategy.size_bytes() + self.hash_index.size_bytes()
    }
}
