//! Column blocks and the per-type capability vtable.
//!
//! The type vector a join shape is specialized over is not necessarily
//! closed at compile time: extension functions can register scalar types
//! at startup the same way `fsqlite-func` registers user-defined functions.
//! `ColumnTypeOps` is therefore a trait object captured by `Arc`, resolved
//! through a [`TypeRegistry`] rather than a closed enum.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

/// A column's declared type, as it appears in a join shape's type vector.
///
/// Hashing and equality are value-based so a [`TypeTag`] can serve as part
/// of a specialization-cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Boolean,
    Int32,
    Int64,
    Float64,
    Bytes,
    /// An engine- or extension-registered type identified by name.
    Custom(String),
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::Bytes => write!(f, "bytes"),
            Self::Custom(name) => write!(f, "custom({name})"),
        }
    }
}

/// An immutable columnar array of one SQL type.
///
/// Blocks are owned upstream and borrowed by a strategy for the lifetime of
/// a build; this crate never mutates one after construction.
pub trait ColumnBlock: fmt::Debug + Send + Sync {
    /// Number of positions in this block.
    fn len(&self) -> usize;

    /// True when the block has no positions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retained heap size of this block's backing storage, in bytes.
    fn size_bytes(&self) -> usize;

    /// Narrowing access for the paired [`ColumnTypeOps`] implementation.
    fn as_any(&self) -> &dyn Any;
}

/// A destination for `append_to` writes.
pub trait BlockBuilder: fmt::Debug + Send {
    /// Narrowing access for the paired [`ColumnTypeOps`] implementation.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Builds one output page, channel by channel.
pub trait PageBuilder {
    /// Return the block builder for `channel`, creating it on first use.
    fn block_builder(&mut self, channel: usize) -> &mut dyn BlockBuilder;
}

/// Per-type capability record: hash, equality, emission, and null testing.
///
/// Provided by the surrounding engine, not by this crate; this crate ships
/// implementations for the built-in scalar types so the kernel is usable
/// standalone and in tests.
pub trait ColumnTypeOps: fmt::Debug + Send + Sync {
    /// Stable name used in diagnostics and `UnsupportedTypeError` messages.
    fn type_name(&self) -> &'static str;

    /// True when the value at `pos` is SQL NULL.
    fn is_null(&self, block: &dyn ColumnBlock, pos: usize) -> bool;

    /// Row hash contribution for a non-null value. Callers are responsible
    /// for substituting `0` on NULL per the null-hash-zero rule.
    fn hash(&self, block: &dyn ColumnBlock, pos: usize) -> i32;

    /// Value equality between two non-null positions, possibly in different
    /// blocks. Callers apply the null-aware guard around this.
    fn equal_to(&self, left: &dyn ColumnBlock, left_pos: usize, right: &dyn ColumnBlock, right_pos: usize) -> bool;

    /// Copy the value at `(block, pos)` into `out`.
    fn append_to(&self, block: &dyn ColumnBlock, pos: usize, out: &mut dyn BlockBuilder);
}

// ── Built-in blocks ─────────────────────────────────────────────────────

macro_rules! scalar_block {
    ($name:ident, $elem:ty) => {
        #[derive(Debug, Default)]
        pub struct $name(pub Vec<Option<$elem>>);

        impl ColumnBlock for $name {
            fn len(&self) -> usize {
                self.0.len()
            }

            fn size_bytes(&self) -> usize {
                self.0.len() * std::mem::size_of::<Option<$elem>>()
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        impl $name {
            #[must_use]
            pub fn new(values: Vec<Option<$elem>>) -> Self {
                Self(values)
            }
        }
    };
}

scalar_block!(BooleanBlock, bool);
scalar_block!(Int32Block, i32);
scalar_block!(Int64Block, i64);
scalar_block!(Float64Block, f64);

/// Variable-length byte block, used for both BLOB and (UTF-8) TEXT values.
#[derive(Debug, Default)]
pub struct BytesBlock(pub Vec<Option<Vec<u8>>>);

impl ColumnBlock for BytesBlock {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn size_bytes(&self) -> usize {
        self.0
            .iter()
            .map(|v| v.as_ref().map_or(0, Vec::len))
            .sum::<usize>()
            + self.0.len() * std::mem::size_of::<Option<Vec<u8>>>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl BytesBlock {
    #[must_use]
    pub fn new(values: Vec<Option<Vec<u8>>>) -> Self {
        Self(values)
    }
}

// ── Built-in block builders ─────────────────────────────────────────────

macro_rules! scalar_builder {
    ($name:ident, $elem:ty) => {
        #[derive(Debug, Default)]
        pub struct $name(pub Vec<Option<$elem>>);

        impl BlockBuilder for $name {
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

scalar_builder!(BooleanBuilder, bool);
scalar_builder!(Int32Builder, i32);
scalar_builder!(Int64Builder, i64);
scalar_builder!(Float64Builder, f64);

#[derive(Debug, Default)]
pub struct BytesBuilder(pub Vec<Option<Vec<u8>>>);

impl BlockBuilder for BytesBuilder {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Built-in type capability records ────────────────────────────────────

fn downcast_block<'a, T: 'static>(block: &'a dyn ColumnBlock, type_name: &str) -> &'a T {
    block
        .as_any()
        .downcast_ref::<T>()
        .unwrap_or_else(|| unreachable!("{type_name} ops paired with a mismatched block type"))
}

fn downcast_builder<'a, T: 'static>(out: &'a mut dyn BlockBuilder, type_name: &str) -> &'a mut T {
    out.as_any_mut()
        .downcast_mut::<T>()
        .unwrap_or_else(|| unreachable!("{type_name} ops paired with a mismatched builder type"))
}

/// Boolean capability record. Hash mirrors the classic `1231`/`1237` Boolean
/// hash so collisions against other small-integer types stay unlikely.
#[derive(Debug, Default)]
pub struct BooleanType;

impl ColumnTypeOps for BooleanType {
    fn type_name(&self) -> &'static str {
        "boolean"
    }

    fn is_null(&self, block: &dyn ColumnBlock, pos: usize) -> bool {
        downcast_block::<BooleanBlock>(block, self.type_name()).0[pos].is_none()
    }

    fn hash(&self, block: &dyn ColumnBlock, pos: usize) -> i32 {
        match downcast_block::<BooleanBlock>(block, self.type_name()).0[pos] {
            Some(true) => 1231,
            Some(false) | None => 1237,
        }
    }

    fn equal_to(&self, left: &dyn ColumnBlock, left_pos: usize, right: &dyn ColumnBlock, right_pos: usize) -> bool {
        downcast_block::<BooleanBlock>(left, self.type_name()).0[left_pos]
            == downcast_block::<BooleanBlock>(right, self.type_name()).0[right_pos]
    }

    fn append_to(&self, block: &dyn ColumnBlock, pos: usize, out: &mut dyn BlockBuilder) {
        let value = downcast_block::<BooleanBlock>(block, self.type_name()).0[pos];
        downcast_builder::<BooleanBuilder>(out, self.type_name()).0.push(value);
    }
}

/// 32-bit integer capability record. Hash is the value's own bit pattern,
/// matching the source system's `int` hash.
#[derive(Debug, Default)]
pub struct Int32Type;

impl ColumnTypeOps for Int32Type {
    fn type_name(&self) -> &'static str {
        "int32"
    }

    fn is_null(&self, block: &dyn ColumnBlock, pos: usize) -> bool {
        downcast_block::<Int32Block>(block, self.type_name()).0[pos].is_none()
    }

    fn hash(&self, block: &dyn ColumnBlock, pos: usize) -> i32 {
        downcast_block::<Int32Block>(block, self.type_name()).0[pos].unwrap_or(0)
    }

    fn equal_to(&self, left: &dyn ColumnBlock, left_pos: usize, right: &dyn ColumnBlock, right_pos: usize) -> bool {
        downcast_block::<Int32Block>(left, self.type_name()).0[left_pos]
            == downcast_block::<Int32Block>(right, self.type_name()).0[right_pos]
    }

    fn append_to(&self, block: &dyn ColumnBlock, pos: usize, out: &mut dyn BlockBuilder) {
        let value = downcast_block::<Int32Block>(block, self.type_name()).0[pos];
        downcast_builder::<Int32Builder>(out, self.type_name()).0.push(value);
    }
}

/// 64-bit integer capability record. Hash XOR-folds the value's two halves,
/// matching the source system's `long` hash.
#[derive(Debug, Default)]
pub struct Int64Type;

fn fold_i64_hash(value: i64) -> i32 {
    (value ^ (value >> 32)) as i32
}

impl ColumnTypeOps for Int64Type {
    fn type_name(&self) -> &'static str {
        "int64"
    }

    fn is_null(&self, block: &dyn ColumnBlock, pos: usize) -> bool {
        downcast_block::<Int64Block>(block, self.type_name()).0[pos].is_none()
    }

    fn hash(&self, block: &dyn ColumnBlock, pos: usize) -> i32 {
        fold_i64_hash(downcast_block::<Int64Block>(block, self.type_name()).0[pos].unwrap_or(0))
    }

    fn equal_to(&self, left: &dyn ColumnBlock, left_pos: usize, right: &dyn ColumnBlock, right_pos: usize) -> bool {
        downcast_block::<Int64Block>(left, self.type_name()).0[left_pos]
            == downcast_block::<Int64Block>(right, self.type_name()).0[right_pos]
    }

    fn append_to(&self, block: &dyn ColumnBlock, pos: usize, out: &mut dyn BlockBuilder) {
        let value = downcast_block::<Int64Block>(block, self.type_name()).0[pos];
        downcast_builder::<Int64Builder>(out, self.type_name()).0.push(value);
    }
}

/// Double-precision float capability record. Hash reuses the `int64` fold
/// over the value's IEEE-754 bit pattern.
#[derive(Debug, Default)]
pub struct Float64Type;

impl ColumnTypeOps for Float64Type {
    fn type_name(&self) -> &'static str {
        "float64"
    }

    fn is_null(&self, block: &dyn ColumnBlock, pos: usize) -> bool {
        downcast_block::<Float64Block>(block, self.type_name()).0[pos].is_none()
    }

    fn hash(&self, block: &dyn ColumnBlock, pos: usize) -> i32 {
        let value = downcast_block::<Float64Block>(block, self.type_name()).0[pos].unwrap_or(0.0);
        fold_i64_hash(value.to_bits() as i64)
    }

    fn equal_to(&self, left: &dyn ColumnBlock, left_pos: usize, right: &dyn ColumnBlock, right_pos: usize) -> bool {
        downcast_block::<Float64Block>(left, self.type_name()).0[left_pos]
            == downcast_block::<Float64Block>(right, self.type_name()).0[right_pos]
    }

    fn append_to(&self, block: &dyn ColumnBlock, pos: usize, out: &mut dyn BlockBuilder) {
        let value = downcast_block::<Float64Block>(block, self.type_name()).0[pos];
        downcast_builder::<Float64Builder>(out, self.type_name()).0.push(value);
    }
}

/// Variable-length byte/text capability record. Hash uses `xxh3_64`,
/// XOR-folded to 32 bits, matching `fsqlite-pager`'s page-integrity hash.
#[derive(Debug, Default)]
pub struct BytesType;

impl ColumnTypeOps for BytesType {
    fn type_name(&self) -> &'static str {
        "bytes"
    }

    fn is_null(&self, block: &dyn ColumnBlock, pos: usize) -> bool {
        downcast_block::<BytesBlock>(block, self.type_name()).0[pos].is_none()
    }

    fn hash(&self, block: &dyn ColumnBlock, pos: usize) -> i32 {
        match &downcast_block::<BytesBlock>(block, self.type_name()).0[pos] {
            Some(bytes) => fold_i64_hash(xxh3_64(bytes) as i64),
            None => 0,
        }
    }

    fn equal_to(&self, left: &dyn ColumnBlock, left_pos: usize, right: &dyn ColumnBlock, right_pos: usize) -> bool {
        downcast_block::<BytesBlock>(left, self.type_name()).0[left_pos]
            == downcast_block::<BytesBlock>(right, self.type_name()).0[right_pos]
    }

    fn append_to(&self, block: &dyn ColumnBlock, pos: usize, out: &mut dyn BlockBuilder) {
        let value = downcast_block::<BytesBlock>(block, self.type_name()).0[pos].clone();
        downcast_builder::<BytesBuilder>(out, self.type_name()).0.push(value);
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Resolves a [`TypeTag`] to its capability record.
///
/// Built-in scalar types are always registered; extension types are added
/// with [`TypeRegistry::register_custom`], the same pattern `fsqlite-func`
/// uses to let extensions plug user-defined functions in at startup.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    custom: std::collections::HashMap<String, Arc<dyn ColumnTypeOps>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            custom: std::collections::HashMap::new(),
        }
    }

    /// Register (or replace) the capability record for a custom type name.
    pub fn register_custom(&mut self, name: impl Into<String>, ops: Arc<dyn ColumnTypeOps>) {
        self.custom.insert(name.into(), ops);
    }

    /// Resolve a tag to its capability record, or `None` if unsupported.
    #[must_use]
    pub fn resolve(&self, tag: &TypeTag) -> Option<Arc<dyn ColumnTypeOps>> {
        match tag {
            TypeTag::Boolean => Some(Arc::new(BooleanType)),
            TypeTag::Int32 => Some(Arc::new(Int32Type)),
            TypeTag::Int64 => Some(Arc::new(Int64Type)),
            TypeTag::Float64 => Some(Arc::new(Float64Type)),
            TypeTag::Bytes => Some(Arc::new(BytesType)),
            TypeTag::Custom(name) => self.custom.get(name).cloned(),
        }
    }
}
