// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::trap::Trap;
use core::fmt;

/// Error type for the crate.
///
/// The five top-level kinds (malformed, validation, unlinkable,
/// uninstantiable, trap) are what the upstream test suite distinguishes;
/// the remaining variants cover the embedder surface (looking up exports,
/// passing arguments, defining imports).
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The byte stream does not conform to the binary format.
    Malformed(wasmparser::Error),
    /// The module is well-formed but breaks a typing rule.
    Validation(ValidationError),
    /// An import could not be resolved at instantiation.
    Unlinkable(UnlinkableError),
    /// Instantiation failed applying an active segment.
    Uninstantiable(UninstantiableError),
    /// A WebAssembly trap occurred.
    Trap(Trap),
    /// The requested export does not exist (or has the wrong kind).
    UnknownExport {
        /// The name that was looked up.
        name: String,
    },
    /// Invocation arguments do not match the exported signature.
    ArgumentTypeMismatch,
    /// The name is already defined in the import set.
    AlreadyDefined {
        /// The defined module name.
        module: String,
        /// The defined field name.
        field: String,
    },
    /// The instance has already been linked and initialized.
    AlreadyInstantiated,
    /// A branch tried to cross the current frame's label chain.
    LabelMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => fmt::Display::fmt(e, f),
            Self::Validation(e) => fmt::Display::fmt(e, f),
            Self::Unlinkable(e) => fmt::Display::fmt(e, f),
            Self::Uninstantiable(e) => fmt::Display::fmt(e, f),
            Self::Trap(trap) => fmt::Display::fmt(trap, f),
            Self::UnknownExport { name } => f.write_fmt(format_args!("unknown export {name:?}")),
            Self::ArgumentTypeMismatch => f.write_str("type mismatch"),
            Self::AlreadyDefined { module, field } => {
                f.write_fmt(format_args!("name {module}::{field} is already defined"))
            }
            Self::AlreadyInstantiated => f.write_str("instance is already instantiated"),
            Self::LabelMismatch => f.write_str("label mismatch"),
        }
    }
}

impl core::error::Error for Error {}

impl From<wasmparser::Error> for Error {
    fn from(e: wasmparser::Error) -> Self {
        Self::Malformed(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<UnlinkableError> for Error {
    fn from(e: UnlinkableError) -> Self {
        Self::Unlinkable(e)
    }
}

impl From<UninstantiableError> for Error {
    fn from(e: UninstantiableError) -> Self {
        Self::Uninstantiable(e)
    }
}

impl From<Trap> for Error {
    fn from(trap: Trap) -> Self {
        Self::Trap(trap)
    }
}

/// A structurally well-formed module broke a rule of the type system.
///
/// The display strings follow the expected-failure messages of the upstream
/// specification test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    TypeMismatch,
    TypeMustBeNumeric,
    UnknownLabel,
    UnknownLocal,
    UnknownGlobal,
    UnknownFunction,
    UnknownTable,
    UnknownMemory,
    UnknownType,
    UnknownElementSegment,
    UnknownDataSegment,
    ImmutableGlobal,
    BadAlignment,
    MultipleMemories,
    MemoryMaxPagesExceeded,
    LimitsMinExceedsMax,
    ConstantExpressionRequired,
    ConstantExpressionGlobalMustBeImport,
    ConstantExpressionGlobalMustBeImmutable,
    FuncRefUndeclared,
    DuplicateExportName,
    StartFunctionType,
    IfElseMismatch,
    FeatureDisabled,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch => f.write_str("type mismatch"),
            Self::TypeMustBeNumeric => f.write_str("type mismatch"),
            Self::UnknownLabel => f.write_str("unknown label"),
            Self::UnknownLocal => f.write_str("unknown local"),
            Self::UnknownGlobal => f.write_str("unknown global"),
            Self::UnknownFunction => f.write_str("unknown function"),
            Self::UnknownTable => f.write_str("unknown table"),
            Self::UnknownMemory => f.write_str("unknown memory"),
            Self::UnknownType => f.write_str("unknown type"),
            Self::UnknownElementSegment => f.write_str("unknown elem segment"),
            Self::UnknownDataSegment => f.write_str("unknown data segment"),
            Self::ImmutableGlobal => f.write_str("global is immutable"),
            Self::BadAlignment => f.write_str("alignment must not be larger than natural"),
            Self::MultipleMemories => f.write_str("multiple memories"),
            Self::MemoryMaxPagesExceeded => {
                f.write_str("memory size must be at most 65536 pages (4GiB)")
            }
            Self::LimitsMinExceedsMax => {
                f.write_str("size minimum must not be greater than maximum")
            }
            Self::ConstantExpressionRequired => f.write_str("constant expression required"),
            Self::ConstantExpressionGlobalMustBeImport => f.write_str("unknown global"),
            Self::ConstantExpressionGlobalMustBeImmutable => {
                f.write_str("constant expression required")
            }
            Self::FuncRefUndeclared => f.write_str("undeclared function reference"),
            Self::DuplicateExportName => f.write_str("duplicate export name"),
            Self::StartFunctionType => f.write_str("start function"),
            Self::IfElseMismatch => f.write_str("type mismatch"),
            Self::FeatureDisabled => f.write_str("feature disabled"),
        }
    }
}

impl core::error::Error for ValidationError {}

/// Linking failed resolving a module's declared imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlinkableError {
    /// No provided import matched the declared (module, field, kind).
    UnknownImport {
        /// The module name of the import.
        module: String,
        /// The field name of the import.
        field: String,
    },
    /// A provided import matched by name but not by descriptor.
    IncompatibleImportType {
        /// The module name of the import.
        module: String,
        /// The field name of the import.
        field: String,
    },
}

impl fmt::Display for UnlinkableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownImport { .. } => f.write_str("unknown import"),
            Self::IncompatibleImportType { .. } => f.write_str("incompatible import type"),
        }
    }
}

impl core::error::Error for UnlinkableError {}

/// Instantiation failed applying an active element or data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstantiableError {
    OutOfBoundsTableAccess,
    OutOfBoundsMemoryAccess,
}

impl fmt::Display for UninstantiableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBoundsTableAccess => f.write_str("out of bounds table access"),
            Self::OutOfBoundsMemoryAccess => f.write_str("out of bounds memory access"),
        }
    }
}

impl core::error::Error for UninstantiableError {}
