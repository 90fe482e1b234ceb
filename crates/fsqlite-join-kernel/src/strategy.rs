//! The pages hash strategy: row hashing, equality, and emission over a
//! fixed type vector and fixed join-channel list.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{InvalidShapeReason, JoinKernelError, Result};
use crate::page::{BatchList, Page};
use crate::types::{ColumnBlock, ColumnTypeOps, PageBuilder, TypeTag, TypeRegistry};

/// Most joins key on a handful of columns; inlining up to four avoids a
/// heap allocation per shape for the common case.
pub type JoinChannelIndices = SmallVec<[usize; 4]>;

/// `(type_vector, join_channel_indices)` — the cache key for specialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinShape {
    pub type_vector: Vec<TypeTag>,
    pub join_channel_indices: JoinChannelIndices,
}

impl JoinShape {
    #[must_use]
    pub fn new(type_vector: Vec<TypeTag>, join_channel_indices: impl Into<JoinChannelIndices>) -> Self {
        Self {
            type_vector,
            join_channel_indices: join_channel_indices.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.type_vector.is_empty() {
            return Err(JoinKernelError::InvalidShape(InvalidShapeReason::EmptyTypeVector));
        }
        for &index in &self.join_channel_indices {
            if index >= self.type_vector.len() {
                return Err(JoinKernelError::InvalidShape(InvalidShapeReason::IndexOutOfBounds {
                    index,
                    len: self.type_vector.len(),
                }));
            }
        }
        Ok(())
    }

    pub(crate) fn resolve_ops(&self, registry: &TypeRegistry) -> Result<Vec<Arc<dyn ColumnTypeOps>>> {
        self.type_vector
            .iter()
            .map(|tag| {
                registry
                    .resolve(tag)
                    .ok_or_else(|| JoinKernelError::UnsupportedType { tag: tag.clone() })
            })
            .collect()
    }
}

/// Row-level hashing, equality, and output emission over a fixed join shape.
///
/// Builds up its batch lists page by page via [`PagesHashStrategy::append_page`];
/// once fully built it is read-only and safe to share across probe threads.
#[derive(Debug)]
pub struct PagesHashStrategy {
    ops: Vec<Arc<dyn ColumnTypeOps>>,
    batch_lists: Vec<BatchList>,
    join_channel_indices: JoinChannelIndices,
    join_channel_ops: Vec<Arc<dyn ColumnTypeOps>>,
    join_channel_batch_lists: Vec<BatchList>,
}

impl PagesHashStrategy {
    pub(crate) fn new(ops: Vec<Arc<dyn ColumnTypeOps>>, join_channel_indices: impl Into<JoinChannelIndices>) -> Self {
        let join_channel_indices = join_channel_indices.into();
        let join_channel_ops = join_channel_indices.iter().map(|&i| ops[i].clone()).collect();
        let batch_lists = vec![BatchList::new(); ops.len()];
        let join_channel_batch_lists = vec![BatchList::new(); join_channel_indices.len()];
        Self {
            ops,
            batch_lists,
            join_channel_indices,
            join_channel_ops,
            join_channel_batch_lists,
        }
    }

    /// Number of channels in the type vector.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.ops.len()
    }

    /// Number of pages appended so far.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batch_lists.first().map_or(0, Vec::len)
    }

    /// Append one page's blocks to every channel's batch list. Each
    /// channel's batch-list length equals the number of pages appended so
    /// far.
    ///
    /// # Errors
    ///
    /// Returns [`JoinKernelError::InvalidShape`] if the page's channel count
    /// does not match this strategy's type vector length.
    pub fn append_page(&mut self, page: &Page) -> Result<()> {
        if page.channel_count() != self.channel_count() {
            return Err(JoinKernelError::InvalidShape(InvalidShapeReason::IndexOutOfBounds {
                index: page.channel_count(),
                len: self.channel_count(),
            }));
        }
        for (channel, block) in page.blocks().iter().enumerate() {
            self.batch_lists[channel].push(block.clone());
        }
        for (ordinal, &channel) in self.join_channel_indices.iter().enumerate() {
            self.join_channel_batch_lists[ordinal].push(page.block(channel).clone());
        }
        Ok(())
    }

    /// Copy the row at `(batch_index, position)` into `out`'s block
    /// builders, one value per channel, starting at `out_channel_offset`.
    pub fn append_to(&self, batch_index: usize, position: usize, out: &mut dyn PageBuilder, out_channel_offset: usize) {
        for channel in 0..self.channel_count() {
            let block = &self.batch_lists[channel][batch_index];
            self.ops[channel].append_to(block.as_ref(), position, out.block_builder(out_channel_offset + channel));
        }
    }

    /// Row hash of the join-key tuple at `(batch_index, position)`.
    #[must_use]
    pub fn hash_position(&self, batch_index: usize, position: usize) -> i32 {
        let mut result: i32 = 0;
        for ordinal in 0..self.join_channel_indices.len() {
            let block = &self.join_channel_batch_lists[ordinal][batch_index];
            let ops = &self.join_channel_ops[ordinal];
            let contribution = if ops.is_null(block.as_ref(), position) {
                0
            } else {
                ops.hash(block.as_ref(), position)
            };
            result = result.wrapping_mul(31).wrapping_add(contribution);
        }
        result
    }

    /// Row hash over a transient row laid out as a parallel array of blocks,
    /// already sliced into join-channel order.
    #[must_use]
    pub fn hash_row(&self, position: usize, external_blocks: &[Arc<dyn ColumnBlock>]) -> i32 {
        let mut result: i32 = 0;
        for ordinal in 0..self.join_channel_indices.len() {
            let block = &external_blocks[ordinal];
            let ops = &self.join_channel_ops[ordinal];
            let contribution = if ops.is_null(block.as_ref(), position) {
                0
            } else {
                ops.hash(block.as_ref(), position)
            };
            result = result.wrapping_mul(31).wrapping_add(contribution);
        }
        result
    }

    /// Tuple-equality between a build-side row (by address) and a
    /// probe-side row laid out as external blocks.
    #[must_use]
    pub fn position_equals_row(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_position: usize,
        right_blocks: &[Arc<dyn ColumnBlock>],
    ) -> bool {
        for ordinal in 0..self.join_channel_indices.len() {
            let ops = &self.join_channel_ops[ordinal];
            let left_block = &self.join_channel_batch_lists[ordinal][left_batch_index];
            let right_block = &right_blocks[ordinal];
            if !channel_equal(ops.as_ref(), left_block.as_ref(), left_position, right_block.as_ref(), right_position) {
                return false;
            }
        }
        true
    }

    /// Retained heap size of every block appended so far. Counts each
    /// channel's batch list once; the
    /// join-channel-aliased lists share the same `Arc<dyn ColumnBlock>`
    /// allocations and are not counted again.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.batch_lists.iter().flatten().map(|block| block.size_bytes()).sum()
    }

    /// Tuple-equality between two build-side rows.
    #[must_use]
    pub fn position_equals_position(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_batch_index: usize,
        right_position: usize,
    ) -> bool {
        for ordinal in 0..self.join_channel_indices.len() {
            let ops = &self.join_channel_ops[ordinal];
            let left_block = &self.join_channel_batch_lists[ordinal][left_batch_index];
            let right_block = &self.join_channel_batch_lists[ordinal][right_batch_index];
            if !channel_equal(ops.as_ref(), left_block.as_ref(), left_position, right_block.as_ref(), right_position) {
                return false;
            }
        }
        true
    }
}

/// Null-aware join-key equality for a single channel: two nulls match,
/// null-vs-value never matches. This is deliberately *not* SQL three-valued
/// equality.
#[inline]
fn channel_equal(ops: &dyn ColumnTypeOps, left: &dyn ColumnBlock, left_pos: usize, right: &dyn ColumnBlock, right_pos: usize) -> bool {
    let left_null = ops.is_null(left, left_pos);
    let right_null = ops.is_null(right, right_pos);
    if left_null || right_null {
        left_null && right_null
    } else {
        ops.equal_to(left, left_pos, right, right_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Int32Block, Int64Block};

    fn strategy_over_int32(join_channel_indices: Vec<usize>, channel_count: usize) -> PagesHashStrategy {
        let ops: Vec<Arc<dyn ColumnTypeOps>> = (0..channel_count).map(|_| Arc::new(crate::types::Int32Type) as _).collect();
        PagesHashStrategy::new(ops, join_channel_indices)
    }

    fn page_of(values: &[Option<i32>]) -> Page {
        let block: Arc<dyn ColumnBlock> = Arc::new(Int32Block::new(values.to_vec()));
        Page::new(vec![block])
    }

    #[test]
    fn empty_join_channels_hash_is_always_zero() {
        let mut strat = strategy_over_int32(vec![], 1);
        strat.append_page(&page_of(&[Some(1), Some(2), None])).unwrap();
        assert_eq!(strat.hash_position(0, 0), 0);
        assert_eq!(strat.hash_position(0, 1), 0);
        assert_eq!(strat.hash_position(0, 2), 0);
    }

    #[test]
    fn empty_join_channels_equality_is_always_true() {
        let mut strat = strategy_over_int32(vec![], 1);
        strat.append_page(&page_of(&[Some(1)])).unwrap();
        strat.append_page(&page_of(&[Some(2)])).unwrap();
        assert!(strat.position_equals_position(0, 0, 1, 0));
    }

    #[test]
    fn null_join_key_hashes_as_zero() {
        let mut strat = strategy_over_int32(vec![0], 1);
        strat.append_page(&page_of(&[Some(7), None])).unwrap();
        assert_eq!(strat.hash_position(0, 0), 7);
        assert_eq!(strat.hash_position(0, 1), 0);
    }

    #[test]
    fn two_nulls_compare_equal_null_vs_value_does_not() {
        let mut strat = strategy_over_int32(vec![0], 1);
        strat.append_page(&page_of(&[None, None, Some(7)])).unwrap();
        assert!(strat.position_equals_position(0, 0, 0, 1));
        assert!(!strat.position_equals_position(0, 0, 0, 2));
    }

    #[test]
    fn hash_position_matches_hash_row_over_equivalent_slice() {
        let mut strat = strategy_over_int32(vec![0], 1);
        strat.append_page(&page_of(&[Some(42)])).unwrap();
        let external: Vec<Arc<dyn ColumnBlock>> = vec![Arc::new(Int32Block::new(vec![Some(42)]))];
        assert_eq!(strat.hash_position(0, 0), strat.hash_row(0, &external));
    }

    #[test]
    fn reversed_join_channel_order_equates_swapped_columns() {
        // types=[int32,int32], join_channels=[1,0]; build (1,2); probe (2,1)
        // packaged in join-channel order.
        let ops: Vec<Arc<dyn ColumnTypeOps>> = vec![Arc::new(crate::types::Int32Type), Arc::new(crate::types::Int32Type)];
        let mut strat = PagesHashStrategy::new(ops, vec![1, 0]);
        let a: Arc<dyn ColumnBlock> = Arc::new(Int32Block::new(vec![Some(1)]));
        let b: Arc<dyn ColumnBlock> = Arc::new(Int32Block::new(vec![Some(2)]));
        strat.append_page(&Page::new(vec![a, b])).unwrap();

        let probe_channel_1st: Arc<dyn ColumnBlock> = Arc::new(Int32Block::new(vec![Some(2)]));
        let probe_channel_0th: Arc<dyn ColumnBlock> = Arc::new(Int32Block::new(vec![Some(1)]));
        let probe_blocks = vec![probe_channel_1st, probe_channel_0th];
        assert!(strat.position_equals_row(0, 0, 0, &probe_blocks));
    }

    #[test]
    fn multi_column_key_requires_all_channels_to_match() {
        let ops: Vec<Arc<dyn ColumnTypeOps>> = vec![Arc::new(crate::types::Int64Type), Arc::new(crate::types::Int64Type)];
        let mut strat = PagesHashStrategy::new(ops, vec![0, 1]);
        let a: Arc<dyn ColumnBlock> = Arc::new(Int64Block::new(vec![Some(1)]));
        let b: Arc<dyn ColumnBlock> = Arc::new(Int64Block::new(vec![Some(10)]));
        strat.append_page(&Page::new(vec![a, b])).unwrap();

        let matching = vec![
            Arc::new(Int64Block::new(vec![Some(1)])) as Arc<dyn ColumnBlock>,
            Arc::new(Int64Block::new(vec![Some(10)])) as Arc<dyn ColumnBlock>,
        ];
        let partial = vec![
            Arc::new(Int64Block::new(vec![Some(1)])) as Arc<dyn ColumnBlock>,
            Arc::new(Int64Block::new(vec![Some(30)])) as Arc<dyn ColumnBlock>,
        ];
        assert!(strat.position_equals_row(0, 0, 0, &matching));
        assert!(!strat.position_equals_row(0, 0, 0, &partial));
    }

    #[test]
    fn append_page_rejects_wrong_channel_count() {
        let mut strat = strategy_over_int32(vec![0], 2);
        let err = strat.append_page(&page_of(&[Some(1)])).unwrap_err();
        assert!(matches!(err, JoinKernelError::InvalidShape(_)));
    }
}
