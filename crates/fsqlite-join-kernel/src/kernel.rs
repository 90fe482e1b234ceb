//! The specialization engine: turns a [`JoinShape`] into a reusable
//! [`LookupSourceFactory`].

use std::sync::Arc;

use tracing::debug_span;

use crate::error::Result;
use crate::lookup_source::LookupSourceFactory;
use crate::strategy::JoinShape;
use crate::types::TypeRegistry;
use crate::config::JoinKernelConfig;

/// Validate `shape`, resolve its column types against `registry`, and
/// produce a factory that can build a [`crate::lookup_source::LookupSource`]
/// for any page set sharing that shape.
///
/// The resulting factory holds no reference to `registry` or `config`: once
/// compiled, a shape's strategy is fixed, which is what makes it safe to
/// memoize in a [`crate::cache::SpecializationCache`] keyed only by shape.
///
/// # Errors
///
/// Propagates [`crate::error::JoinKernelError::InvalidShape`] from shape
/// validation and [`crate::error::JoinKernelError::UnsupportedType`] from
/// type resolution.
pub fn compile_lookup_source_factory(
    shape: &JoinShape,
    registry: &TypeRegistry,
    config: &JoinKernelConfig,
) -> Result<Arc<LookupSourceFactory>> {
    let _span = debug_span!(
        "compile_lookup_source_factory",
        channels = shape.type_vector.len(),
        join_channels = shape.join_channel_indices.len(),
    )
    .entered();

    shape.validate()?;
    let ops = shape.resolve_ops(registry)?;

    if config.dump_bytecode_tree || config.dump_bytecode_raw || config.run_verifier {
        tracing::debug!(
            dump_bytecode_tree = config.dump_bytecode_tree,
            dump_bytecode_raw = config.dump_bytecode_raw,
            run_verifier = config.run_verifier,
            "join kernel diagnostics requested; this backend never generates bytecode, so these are no-ops"
        );
    }

    Ok(Arc::new(LookupSourceFactory::new(ops, shape.join_channel_indices.clone())))
}
