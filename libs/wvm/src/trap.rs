// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// A WebAssembly trap.
///
/// Traps abort the current invocation: the interpreter unwinds its stack and
/// hands the trap to whoever called [`invoke`][crate::Instance::invoke].
/// Wasm code cannot observe or recover from a trap.
///
/// The display strings are the expected-failure messages of the upstream
/// specification test suite.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Trap {
    /// Code that was supposed to have been unreachable was reached.
    UnreachableCodeReached,
    /// An integer division by zero.
    IntegerDivisionByZero,
    /// An integer arithmetic operation caused an overflow.
    IntegerOverflow,
    /// Failed float-to-int conversion.
    BadConversionToInteger,
    /// An out-of-bounds access to linear memory.
    MemoryOutOfBounds,
    /// An out-of-bounds access to a table.
    TableOutOfBounds,
    /// Indirect call through a table slot that does not exist.
    UndefinedElement,
    /// Indirect call through a null table entry.
    UninitializedElement,
    /// Signature mismatch on indirect call.
    BadSignature,
    /// The call stack grew past its limit.
    StackExhausted,
    /// A host function reported failure.
    HostError,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::UnreachableCodeReached => f.write_str("unreachable"),
            Trap::IntegerDivisionByZero => f.write_str("integer divide by zero"),
            Trap::IntegerOverflow => f.write_str("integer overflow"),
            Trap::BadConversionToInteger => f.write_str("invalid conversion to integer"),
            Trap::MemoryOutOfBounds => f.write_str("out of bounds memory access"),
            Trap::TableOutOfBounds => f.write_str("out of bounds table access"),
            Trap::UndefinedElement => f.write_str("undefined element"),
            Trap::UninitializedElement => f.write_str("uninitialized element"),
            Trap::BadSignature => f.write_str("indirect call type mismatch"),
            Trap::StackExhausted => f.write_str("call stack exhausted"),
            Trap::HostError => f.write_str("host function failed"),
        }
    }
}

impl core::error::Error for Trap {}
