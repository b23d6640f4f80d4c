// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A WebAssembly 1.0 interpreter.
//!
//! The pipeline: [`Module::decode`] parses and validates a binary module,
//! pre-computing the continuation tables branching relies on;
//! [`Instance::new`] plus [`Instance::instantiate`] link it against
//! [`ImportSet`]s and run its initializers; [`Instance::invoke`] executes
//! an exported function on a stack machine that walks the module bytes
//! directly.
//!
//! Accepted format: Wasm 1.0 with the mutable-globals, sign-extension,
//! non-trapping float-to-int, multi-value, bulk-memory and reference-types
//! proposals folded in (see [`WasmFeatures`]).
//!
//! The runtime is single-threaded and synchronous. Instances are not
//! `Send`; imported memories, tables and globals are shared by handle, so
//! a mutation through one instance is immediately visible to every other.

mod const_eval;
mod errors;
mod func;
mod global;
mod instance;
mod interp;
mod linker;
mod memory;
mod module;
mod stack;
mod table;
mod trap;
mod types;
mod utils;
mod validate;
mod values;

pub use errors::{Error, UninstantiableError, UnlinkableError, ValidationError};
pub use func::{Func, HostFunc};
pub use global::Global;
pub use instance::Instance;
pub use linker::{Extern, ImportSet};
pub use memory::Memory;
pub use module::{CustomSectionDecl, Module};
pub use table::Table;
pub use trap::Trap;
pub use types::FuncType;
pub use values::{Ref, Val};

pub use wasmparser::{
    GlobalType, Limits, MemoryType, Mutability, ReferenceType, TableType, ValueType, WasmFeatures,
};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// One linear-memory page: 65536 bytes.
pub const WASM_PAGE_SIZE: usize = 65536;
/// The number of pages we can have before we run out of 32-bit byte index
/// space.
pub const WASM_MAX_PAGES: u64 = 1 << 16;
/// Frames a single invocation may nest before trapping with
/// [`Trap::StackExhausted`].
pub const MAX_CALL_DEPTH: u32 = 4096;
