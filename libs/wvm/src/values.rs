// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::func::Func;
use crate::utils::enum_accessors;
use core::fmt;
use core::mem;
use static_assertions::const_assert;
use wasmparser::{ReferenceType, ValueType};

/// Possible runtime values that a WebAssembly module can either consume or
/// produce.
///
/// Note that we inline the `enum Ref { ... }` variants into `enum Val { ... }`
/// here as a size optimization.
#[derive(Debug, Clone)]
pub enum Val {
    /// A 32-bit integer.
    I32(i32),

    /// A 64-bit integer.
    I64(i64),

    /// A 32-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f32::from_bits` to create an `f32` value.
    F32(u32),

    /// A 64-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f64::from_bits` to create an `f64` value.
    F64(u64),

    /// A function reference.
    FuncRef(Option<Func>),

    /// An external reference: an opaque handle supplied by the host.
    ExternRef(Option<u64>),
}

// a tag byte and a machine-word-ish payload; scalars must stay unboxed
const_assert!(mem::size_of::<Val>() <= 24);

/// A reference value, as stored in tables.
#[derive(Debug, Clone)]
pub enum Ref {
    /// A first-class reference to a WebAssembly function.
    ///
    /// The Wasm guest creates non-null function references via the
    /// `ref.func` instruction, or null references via `ref.null func`.
    Func(Option<Func>),
    /// A reference to a value outside of the Wasm heap.
    ///
    /// These references are opaque to the Wasm itself. Wasm can't create
    /// non-null external references, nor do anything with them except pass
    /// them around.
    Extern(Option<u64>),
}

// === impl Val ===

impl Val {
    /// Returns the null function reference value.
    #[inline]
    pub const fn null_func_ref() -> Val {
        Val::FuncRef(None)
    }

    /// Returns the null external reference value.
    #[inline]
    pub const fn null_extern_ref() -> Val {
        Val::ExternRef(None)
    }

    /// Returns the default (zero) value for the given type.
    pub fn default_for_ty(ty: ValueType) -> Val {
        match ty {
            ValueType::I32 => Val::I32(0),
            ValueType::I64 => Val::I64(0),
            ValueType::F32 => Val::F32(0),
            ValueType::F64 => Val::F64(0),
            ValueType::FuncRef => Val::FuncRef(None),
            ValueType::ExternRef => Val::ExternRef(None),
        }
    }

    /// Returns the corresponding [`ValueType`] for this `Val`.
    #[inline]
    pub fn ty(&self) -> ValueType {
        match self {
            Val::I32(_) => ValueType::I32,
            Val::I64(_) => ValueType::I64,
            Val::F32(_) => ValueType::F32,
            Val::F64(_) => ValueType::F64,
            Val::FuncRef(_) => ValueType::FuncRef,
            Val::ExternRef(_) => ValueType::ExternRef,
        }
    }

    /// Per-case bitwise equality, except that any two float NaNs compare
    /// equal. This is the comparison test oracles want; the runtime itself
    /// never compares floats for control purposes.
    pub fn matches(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::I32(a), Val::I32(b)) => a == b,
            (Val::I64(a), Val::I64(b)) => a == b,
            (Val::F32(a), Val::F32(b)) => {
                let (a, b) = (f32::from_bits(*a), f32::from_bits(*b));
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Val::F64(a), Val::F64(b)) => {
                let (a, b) = (f64::from_bits(*a), f64::from_bits(*b));
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Val::FuncRef(a), Val::FuncRef(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same(b),
                _ => false,
            },
            (Val::ExternRef(a), Val::ExternRef(b)) => a == b,
            _ => false,
        }
    }

    enum_accessors! {
        e
        (I32(i32) is_i32 i32 unwrap_i32 *e)
        (I64(i64) is_i64 i64 unwrap_i64 *e)
        (F32(f32) is_f32 f32 unwrap_f32 f32::from_bits(*e))
        (F64(f64) is_f64 f64 unwrap_f64 f64::from_bits(*e))
        (FuncRef(Option<Func>) is_func_ref func_ref unwrap_func_ref e.clone())
        (ExternRef(Option<u64>) is_extern_ref extern_ref unwrap_extern_ref *e)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::I32(v) => write!(f, "{v}"),
            Val::I64(v) => write!(f, "{v}"),
            Val::F32(bits) => write!(f, "{}", f32::from_bits(*bits)),
            Val::F64(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Val::FuncRef(None) => f.write_str("null"),
            Val::FuncRef(Some(_)) => f.write_str("funcref"),
            Val::ExternRef(None) => f.write_str("null"),
            Val::ExternRef(Some(v)) => write!(f, "externref({v})"),
        }
    }
}

impl From<i32> for Val {
    #[inline]
    fn from(val: i32) -> Val {
        Val::I32(val)
    }
}

impl From<i64> for Val {
    #[inline]
    fn from(val: i64) -> Val {
        Val::I64(val)
    }
}

impl From<f32> for Val {
    #[inline]
    fn from(val: f32) -> Val {
        Val::F32(val.to_bits())
    }
}

impl From<f64> for Val {
    #[inline]
    fn from(val: f64) -> Val {
        Val::F64(val.to_bits())
    }
}

impl From<Func> for Val {
    #[inline]
    fn from(val: Func) -> Val {
        Val::FuncRef(Some(val))
    }
}

impl From<Ref> for Val {
    #[inline]
    fn from(val: Ref) -> Val {
        match val {
            Ref::Func(f) => Val::FuncRef(f),
            Ref::Extern(e) => Val::ExternRef(e),
        }
    }
}

// === impl Ref ===

impl Ref {
    /// Create a null reference of the given type.
    #[inline]
    pub fn null(ty: ReferenceType) -> Self {
        match ty {
            ReferenceType::FuncRef => Ref::Func(None),
            ReferenceType::ExternRef => Ref::Extern(None),
        }
    }

    /// Is this a null reference?
    #[inline]
    pub fn is_null(&self) -> bool {
        match self {
            Ref::Func(None) | Ref::Extern(None) => true,
            Ref::Func(Some(_)) | Ref::Extern(Some(_)) => false,
        }
    }

    /// Is this a non-null reference?
    #[inline]
    pub fn is_non_null(&self) -> bool {
        !self.is_null()
    }

    /// The [`ReferenceType`] of this reference.
    #[inline]
    pub fn ty(&self) -> ReferenceType {
        match self {
            Ref::Func(_) => ReferenceType::FuncRef,
            Ref::Extern(_) => ReferenceType::ExternRef,
        }
    }
}

impl From<Func> for Ref {
    #[inline]
    fn from(f: Func) -> Ref {
        Ref::Func(Some(f))
    }
}

impl TryFrom<Val> for Ref {
    type Error = crate::Error;

    fn try_from(val: Val) -> Result<Ref, Self::Error> {
        match val {
            Val::FuncRef(f) => Ok(Ref::Func(f)),
            Val::ExternRef(e) => Ok(Ref::Extern(e)),
            _ => Err(crate::Error::ArgumentTypeMismatch),
        }
    }
}
