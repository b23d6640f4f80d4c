// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::instance::InstanceInner;
use crate::interp::Interpreter;
use crate::trap::Trap;
use crate::types::FuncType;
use crate::values::Val;
use core::fmt;
use std::rc::Rc;
use wasmparser::FuncIdx;

/// A WebAssembly function: either a function defined by some module
/// instance, or a host function.
///
/// `Func` is a cheap handle; clones refer to the same function. A handle to
/// a Wasm function keeps its defining instance alive.
#[derive(Clone)]
pub struct Func {
    pub(crate) inner: FuncInner,
}

#[derive(Clone)]
pub(crate) enum FuncInner {
    Wasm {
        instance: Rc<InstanceInner>,
        index: FuncIdx,
    },
    Host(Rc<HostFunc>),
}

/// A function implemented by the embedder.
///
/// The callback receives the parameter values and a result buffer
/// pre-filled with the zero value of each declared result type. State the
/// host wants to carry ("user data") is captured by the closure. Returning
/// a [`Trap`] propagates as if the trap had been raised by a Wasm
/// instruction.
pub struct HostFunc {
    pub(crate) ty: FuncType,
    #[allow(clippy::type_complexity)]
    pub(crate) callback: Box<dyn Fn(&[Val], &mut [Val]) -> Result<(), Trap>>,
}

impl Func {
    /// Create a host function with the given signature.
    pub fn wrap(
        ty: FuncType,
        callback: impl Fn(&[Val], &mut [Val]) -> Result<(), Trap> + 'static,
    ) -> Self {
        Self {
            inner: FuncInner::Host(Rc::new(HostFunc {
                ty,
                callback: Box::new(callback),
            })),
        }
    }

    /// The signature of this function.
    pub fn ty(&self) -> FuncType {
        match &self.inner {
            FuncInner::Wasm { instance, index } => instance.module.func_type(*index).clone(),
            FuncInner::Host(host) => host.ty.clone(),
        }
    }

    /// Call this function with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentTypeMismatch`][crate::Error] when `params`
    /// does not match the signature, and any trap the function raises.
    pub fn call(&self, params: &[Val]) -> crate::Result<Box<[Val]>> {
        let ty = self.ty();
        if params.len() != ty.params().len() {
            return Err(crate::Error::ArgumentTypeMismatch);
        }
        for (param, expected) in params.iter().zip(ty.params()) {
            if param.ty() != *expected {
                return Err(crate::Error::ArgumentTypeMismatch);
            }
        }

        let mut interp = Interpreter::new();
        interp.invoke(self, params)
    }

    /// Identity comparison: do both handles refer to the same function?
    pub(crate) fn same(&self, other: &Func) -> bool {
        match (&self.inner, &other.inner) {
            (
                FuncInner::Wasm { instance, index },
                FuncInner::Wasm {
                    instance: other_instance,
                    index: other_index,
                },
            ) => Rc::ptr_eq(instance, other_instance) && index == other_index,
            (FuncInner::Host(a), FuncInner::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            FuncInner::Wasm { index, .. } => f.debug_struct("Func").field("index", index).finish(),
            FuncInner::Host(host) => f.debug_struct("HostFunc").field("ty", &host.ty).finish(),
        }
    }
}

impl fmt::Debug for HostFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunc").field("ty", &self.ty).finish()
    }
}
