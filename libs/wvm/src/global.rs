// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::errors::ValidationError;
use crate::values::Val;
use wasmparser::{GlobalType, Mutability};

/// A WebAssembly global: a single value plus a mutability flag.
#[derive(Debug)]
pub struct Global {
    ty: GlobalType,
    value: Val,
}

impl Global {
    /// Create a global holding `value`.
    ///
    /// # Errors
    ///
    /// Fails with a type mismatch when `value` does not have the declared
    /// type.
    pub fn new(ty: GlobalType, value: Val) -> crate::Result<Self> {
        if value.ty() != ty.ty {
            return Err(ValidationError::TypeMismatch.into());
        }
        Ok(Self { ty, value })
    }

    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    pub fn get(&self) -> Val {
        self.value.clone()
    }

    /// Replace the value, respecting the mutability flag.
    pub fn set(&mut self, value: Val) -> crate::Result<()> {
        if self.ty.mutability != Mutability::Var {
            return Err(ValidationError::ImmutableGlobal.into());
        }
        if value.ty() != self.ty.ty {
            return Err(ValidationError::TypeMismatch.into());
        }
        self.value = value;
        Ok(())
    }
}
