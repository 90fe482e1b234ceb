//! Join-kernel configuration.

use std::path::PathBuf;

/// Tunables for the specialization engine and cache.
///
/// The `dump_*`/`run_verifier` fields exist for interface parity with the
/// source system's JIT diagnostics. This crate never generates bytecode or
/// class files, so they are accepted and threaded through `tracing` fields
/// for operator visibility, but otherwise have no semantic effect.
#[derive(Debug, Clone)]
pub struct JoinKernelConfig {
    /// Maximum number of distinct shapes the specialization cache retains.
    pub cache_capacity: usize,
    /// Diagnostic: request a dump of the (nonexistent) generated bytecode tree.
    pub dump_bytecode_tree: bool,
    /// Diagnostic: request a dump of the (nonexistent) raw bytecode.
    pub dump_bytecode_raw: bool,
    /// Diagnostic: directory that would receive generated class files.
    pub dump_class_files_to: Option<PathBuf>,
    /// Diagnostic: request bytecode verification of the (nonexistent) generated class.
    pub run_verifier: bool,
}

impl Default for JoinKernelConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            dump_bytecode_tree: false,
            dump_bytecode_raw: false,
            dump_class_files_to: None,
            run_verifier: false,
        }
    }
}
