//! Tunable limits for the parser and scan executor.
//!
//! Nothing here is loaded from a file, environment variable, or CLI flag;
//! that would be a layer above this crate. These are plain constructor
//! arguments.

/// Governs the parser's stack and recursion behavior.
#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    /// Frames held inline in the parser stack before spilling to the heap.
    /// Mirrors the reference implementation's fixed `stackpool` array.
    pub max_stack_inline: usize,
    /// Maximum nesting depth for `EXPR_CHAIN` / path recursion, guarding
    /// against stack overflow on pathological input.
    pub max_recursion_depth: u32,
    /// Optional cap on total arena bytes; `None` means unbounded (besides
    /// whatever the process allocator itself enforces).
    pub max_arena_bytes: Option<usize>,
}

impl Default for ParserLimits {
    fn default() -> Self {
        ParserLimits {
            max_stack_inline: 16,
            max_recursion_depth: 256,
            max_arena_bytes: None,
        }
    }
}

/// Governs the scan executor's behavior. Currently only diagnostic tracing;
/// the stepping algorithm itself has no tunables (the consumer is in full
/// control of stepping).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// When true, the executor logs each consumer step transition at
    /// `trace` level.
    pub trace: bool,
}
