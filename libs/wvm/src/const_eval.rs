// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::errors::ValidationError;
use crate::instance::InstanceInner;
use crate::values::{Ref, Val};
use core::ops::Range;
use smallvec::SmallVec;
use wasmparser::{BinaryReader, GlobalIdx, Instruction};

/// Simple interpreter for constant expressions.
///
/// Validation has already restricted the expression to typed constants,
/// `ref.null`, `ref.func` and `global.get` of an immutable import, so this
/// never sees control flow. Global initializers, segment offsets and
/// element init items all require exactly one result.
#[derive(Debug, Default)]
pub(crate) struct ConstExprEvaluator {
    stack: SmallVec<[Val; 2]>,
}

impl ConstExprEvaluator {
    /// Evaluate the expression at `expr` (a byte range into the
    /// instance's module), returning its single result value.
    pub fn eval(&mut self, instance: &InstanceInner, expr: Range<u32>) -> crate::Result<Val> {
        let module = instance.module.inner.clone();
        let mut reader =
            BinaryReader::new_bounded(&module.bytes, expr.start as usize, expr.end as usize);

        loop {
            match reader.read_instruction()? {
                Instruction::I32Const { value } => self.push(Val::I32(value)),
                Instruction::I64Const { value } => self.push(Val::I64(value)),
                Instruction::F32Const { value } => self.push(Val::F32(value.bits())),
                Instruction::F64Const { value } => self.push(Val::F64(value.bits())),
                Instruction::RefNull { ty } => self.push(Ref::null(ty).into()),
                Instruction::RefFunc { function } => {
                    self.push(Val::FuncRef(Some(instance.func(function))));
                }
                Instruction::GlobalGet { global } => {
                    self.push(self.global_value(instance, global));
                }
                Instruction::End => break,
                _ => return Err(ValidationError::ConstantExpressionRequired.into()),
            }
        }

        if self.stack.len() != 1 {
            self.stack.clear();
            return Err(ValidationError::ConstantExpressionRequired.into());
        }
        Ok(self.stack.pop().expect("const expr result"))
    }

    fn global_value(&self, instance: &InstanceInner, global: GlobalIdx) -> Val {
        instance.global(global).borrow().get()
    }

    fn push(&mut self, val: Val) {
        self.stack.push(val);
    }
}
