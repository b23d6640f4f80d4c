//! Hard structural limits enforced while decoding.
//!
//! These bound attacker-controlled counts before any allocation happens and
//! mirror the limits used by the large engines.

pub const MAX_WASM_STRING_SIZE: usize = 100_000;
pub const MAX_WASM_TYPES: usize = 1_000_000;
pub const MAX_WASM_IMPORTS: usize = 100_000;
pub const MAX_WASM_EXPORTS: usize = 100_000;
pub const MAX_WASM_TABLES: usize = 100;
pub const MAX_WASM_MEMORIES: usize = 100;
pub const MAX_WASM_FUNCTIONS: usize = 1_000_000;
pub const MAX_WASM_GLOBALS: usize = 1_000_000;
pub const MAX_WASM_ELEMENT_SEGMENTS: usize = 100_000;
pub const MAX_WASM_DATA_SEGMENTS: usize = 100_000;

pub const MAX_WASM_FUNCTION_SIZE: usize = 128 * 1024;
pub const MAX_WASM_FUNCTION_LOCALS: usize = 50_000;
pub const MAX_WASM_FUNCTION_PARAMS: usize = 1_000;
pub const MAX_WASM_FUNCTION_RETURNS: usize = 1_000;
pub const MAX_WASM_BR_TABLE_SIZE: usize = 65_520;

pub const MAX_WASM_TABLE_ENTRIES: usize = 10_000_000;

/// The number of pages a 32-bit linear memory can have before it runs out
/// of byte index space (one page is 65536 bytes).
pub const MAX_WASM_MEMORY_PAGES: u64 = 1 << 16;
