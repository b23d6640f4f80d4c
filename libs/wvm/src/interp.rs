// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The bytecode interpreter.
//!
//! Execution walks the module bytes directly: the program counter is a
//! byte offset, immediates are decoded with the same [`BinaryReader`] the
//! decoder used, and every structured jump target comes out of the
//! pre-computed continuation tables. There is no separate internal
//! bytecode.
//!
//! Calls are iterative, not recursive: a nested `call` pushes a frame and
//! switches the current instance, so the host stack never grows with Wasm
//! recursion. Depth is bounded by an explicit counter instead.

use crate::MAX_CALL_DEPTH;
use crate::errors::Error;
use crate::func::{Func, FuncInner};
use crate::instance::InstanceInner;
use crate::module::{FunctionDecl, ModuleInner};
use crate::stack::Stack;
use crate::trap::Trap;
use crate::values::{Ref, Val};
use smallvec::SmallVec;
use std::rc::Rc;
use wasmparser::{BinaryReader, BlockType, Instruction, MemArg};

pub(crate) struct Interpreter {
    stack: Stack,
    current: Option<Rc<InstanceInner>>,
    pc: u32,
    depth: u32,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            stack: Stack::new(),
            current: None,
            pc: 0,
            depth: 0,
        }
    }

    /// Call `func` with `params`, running to completion.
    ///
    /// The caller has checked `params` against the signature. On success
    /// the returned buffer carries exactly the declared result arity and
    /// the stack is empty again; on a trap the stack is released.
    pub fn invoke(&mut self, func: &Func, params: &[Val]) -> crate::Result<Box<[Val]>> {
        match &func.inner {
            FuncInner::Host(host) => {
                let mut results: Vec<Val> = host
                    .ty
                    .results()
                    .iter()
                    .map(|ty| Val::default_for_ty(*ty))
                    .collect();
                (host.callback)(params, &mut results)?;
                Ok(results.into_boxed_slice())
            }
            FuncInner::Wasm { .. } => {
                let result_arity = func.ty().results().len();
                for param in params {
                    self.stack.push_value(param.clone());
                }
                self.enter_function(func, 0, None)?;

                if let Err(e) = self.run() {
                    self.stack.clear();
                    return Err(e);
                }

                let mut results = vec![Val::I32(0); result_arity];
                for slot in results.iter_mut().rev() {
                    *slot = self.stack.pop_value();
                }
                debug_assert!(self.stack.is_empty(), "values left on stack after invoke");
                Ok(results.into_boxed_slice())
            }
        }
    }

    /// Push a frame and the function-body label, then position the
    /// program counter at the body's first instruction.
    fn enter_function(
        &mut self,
        func: &Func,
        return_pc: u32,
        caller: Option<Rc<InstanceInner>>,
    ) -> crate::Result<()> {
        let FuncInner::Wasm { instance, index } = &func.inner else {
            unreachable!("host functions do not push frames")
        };
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Trap::StackExhausted.into());
        }

        let module = instance.module.inner.clone();
        let FunctionDecl::Defined {
            locals: local_decls,
            body_start,
            ..
        } = &module.functions[*index]
        else {
            unreachable!("function vector entries resolve to defined functions")
        };
        let sig = module.func_type(*index);
        let num_params = sig.params().len();
        let result_arity = sig.results().len() as u32;

        let mut locals: Vec<Val> = vec![Val::I32(0); num_params];
        for slot in locals.iter_mut().rev() {
            *slot = self.stack.pop_value();
        }
        locals.extend(local_decls.iter().map(|ty| Val::default_for_ty(*ty)));

        tracing::trace!(
            func = index.as_u32(),
            name = module.func_name(*index).unwrap_or(""),
            depth = self.depth,
            "enter function"
        );

        self.stack.push_frame(
            func.clone(),
            locals.into_boxed_slice(),
            return_pc,
            caller,
            result_arity,
        );
        let end = *module
            .function_end
            .get(body_start)
            .expect("function_end is populated for every body");
        self.stack.push_label(result_arity, result_arity, end);

        self.current = Some(instance.clone());
        self.pc = *body_start;
        self.depth += 1;
        Ok(())
    }

    /// Unwind to the `depth`-th label, carry its values, and jump to its
    /// continuation.
    fn branch(&mut self, depth: u32) -> crate::Result<()> {
        let mut idx = self.stack.top_label().ok_or(Error::LabelMismatch)?;
        for _ in 0..depth {
            idx = self.stack.label(idx).prev_label.ok_or(Error::LabelMismatch)?;
        }
        let label = *self.stack.label(idx);

        let mut scratch: SmallVec<[Val; 4]> = SmallVec::new();
        for _ in 0..label.branch_arity {
            scratch.push(self.stack.pop_value());
        }
        self.stack.unwind_to_label(idx);
        while let Some(value) = scratch.pop() {
            self.stack.push_value(value);
        }

        self.pc = label.target;
        Ok(())
    }

    /// `end`: pop the structured construct's label, or return when the
    /// function body is done. Returns `true` when the root frame unwound.
    fn do_end(&mut self) -> crate::Result<bool> {
        match self.stack.top_label() {
            Some(idx) if self.stack.label(idx).prev_label.is_some() => {
                let label = *self.stack.label(idx);
                let mut scratch: SmallVec<[Val; 4]> = SmallVec::new();
                for _ in 0..label.result_arity {
                    scratch.push(self.stack.pop_value());
                }
                self.stack.unwind_to_label(idx);
                while let Some(value) = scratch.pop() {
                    self.stack.push_value(value);
                }
                Ok(false)
            }
            // the body label (or none, after a branch to it): return
            _ => self.do_return(),
        }
    }

    /// Pop the current frame, carrying the results to the caller.
    /// Returns `true` when the popped frame was the root.
    fn do_return(&mut self) -> crate::Result<bool> {
        let result_arity = self.stack.current_frame().result_arity;
        let mut scratch: SmallVec<[Val; 4]> = SmallVec::new();
        for _ in 0..result_arity {
            scratch.push(self.stack.pop_value());
        }
        let frame = self.stack.unwind_frame();
        while let Some(value) = scratch.pop() {
            self.stack.push_value(value);
        }
        self.depth -= 1;

        match frame.caller {
            Some(caller) => {
                self.current = Some(caller);
                self.pc = frame.return_pc;
                Ok(false)
            }
            None => Ok(true),
        }
    }

    fn call_function(&mut self, func: &Func, caller: &Rc<InstanceInner>) -> crate::Result<()> {
        match &func.inner {
            FuncInner::Host(host) => {
                let num_params = host.ty.params().len();
                let mut params = vec![Val::I32(0); num_params];
                for slot in params.iter_mut().rev() {
                    *slot = self.stack.pop_value();
                }
                let mut results: Vec<Val> = host
                    .ty
                    .results()
                    .iter()
                    .map(|ty| Val::default_for_ty(*ty))
                    .collect();
                (host.callback)(&params, &mut results)?;
                for result in results {
                    self.stack.push_value(result);
                }
                Ok(())
            }
            FuncInner::Wasm { .. } => self.enter_function(func, self.pc, Some(caller.clone())),
        }
    }

    #[inline]
    fn push(&mut self, value: impl Into<Val>) {
        self.stack.push_value(value.into());
    }

    #[inline]
    fn pop_i32(&mut self) -> i32 {
        self.stack.pop_value().unwrap_i32()
    }

    #[inline]
    fn pop_i64(&mut self) -> i64 {
        self.stack.pop_value().unwrap_i64()
    }

    #[inline]
    fn pop_f32(&mut self) -> f32 {
        self.stack.pop_value().unwrap_f32()
    }

    #[inline]
    fn pop_f64(&mut self) -> f64 {
        self.stack.pop_value().unwrap_f64()
    }

    fn pop_ref(&mut self) -> Ref {
        match self.stack.pop_value() {
            Val::FuncRef(f) => Ref::Func(f),
            Val::ExternRef(e) => Ref::Extern(e),
            other => unreachable!("expected reference, got {other:?}"),
        }
    }

    /// Enter a structured construct: carry the block parameters over the
    /// freshly pushed label.
    fn push_label_with_params(
        &mut self,
        params: u32,
        branch_arity: u32,
        result_arity: u32,
        target: u32,
    ) {
        let mut scratch: SmallVec<[Val; 4]> = SmallVec::new();
        for _ in 0..params {
            scratch.push(self.stack.pop_value());
        }
        self.stack.push_label(branch_arity, result_arity, target);
        while let Some(value) = scratch.pop() {
            self.stack.push_value(value);
        }
    }

    fn mem_load<const N: usize>(
        &mut self,
        instance: &InstanceInner,
        memarg: &MemArg,
    ) -> crate::Result<[u8; N]> {
        let base = self.pop_i32() as u32;
        let addr = u64::from(base) + u64::from(memarg.offset);
        let memory = instance.memory(0);
        let memory = memory.borrow();
        let bytes = memory.load(addr, N)?;
        Ok(bytes.try_into().expect("exact read"))
    }

    fn mem_store(
        &mut self,
        instance: &InstanceInner,
        memarg: &MemArg,
        bytes: &[u8],
    ) -> crate::Result<()> {
        let base = self.pop_i32() as u32;
        let addr = u64::from(base) + u64::from(memarg.offset);
        let memory = instance.memory(0);
        memory.borrow_mut().store(addr, bytes)?;
        Ok(())
    }

    fn run(&mut self) -> crate::Result<()> {
        use Instruction::*;

        loop {
            let instance = self.current.clone().expect("current instance");
            let module = instance.module.inner.clone();
            let offset = self.pc;
            let mut reader = BinaryReader::new_at(&module.bytes, offset as usize);
            let instr = reader.read_instruction()?;
            self.pc = reader.position() as u32;

            match instr {
                Unreachable => return Err(Trap::UnreachableCodeReached.into()),
                Nop => {}

                Block { ty } => {
                    let (params, results) = block_arity(&module, ty);
                    let end = *module.label_end.get(&offset).expect("label_end");
                    self.push_label_with_params(params, results, results, end + 1);
                }
                Loop { ty } => {
                    let (params, results) = block_arity(&module, ty);
                    // loop continuations point back at the loop header
                    let target = *module.label_end.get(&offset).expect("label_end");
                    self.push_label_with_params(params, params, results, target);
                }
                If { ty } => {
                    let cond = self.pop_i32();
                    let (params, results) = block_arity(&module, ty);
                    let end = *module.label_end.get(&offset).expect("label_end");
                    self.push_label_with_params(params, results, results, end + 1);
                    if cond == 0 {
                        match module.if_else.get(&offset) {
                            // skip past the `else` opcode into the else arm
                            Some(else_offset) => self.pc = else_offset + 1,
                            // no else: land on the `end`, which pops the label
                            None => self.pc = end,
                        }
                    }
                }
                // the then-arm is done; exit the construct like `br 0`
                Else => self.branch(0)?,
                End => {
                    if self.do_end()? {
                        return Ok(());
                    }
                }

                Br { label } => self.branch(label.as_u32())?,
                BrIf { label } => {
                    if self.pop_i32() != 0 {
                        self.branch(label.as_u32())?;
                    }
                }
                BrTable { targets } => {
                    let index = self.pop_i32() as u32;
                    let depth = if (index as usize) < targets.len() {
                        targets
                            .labels()
                            .nth(index as usize)
                            .expect("in-range branch table entry")?
                    } else {
                        targets.default()
                    };
                    self.branch(depth.as_u32())?;
                }
                Return => {
                    if self.do_return()? {
                        return Ok(());
                    }
                }

                Call { function } => {
                    let func = instance.func(function);
                    self.call_function(&func, &instance)?;
                }
                CallIndirect { ty, table } => {
                    let index = self.pop_i32() as u32;
                    let table_rc = instance.table(table);
                    let elem = {
                        let table = table_rc.borrow();
                        if index >= table.size() {
                            return Err(Trap::UndefinedElement.into());
                        }
                        table.get(index)?
                    };
                    let Ref::Func(func) = elem else {
                        unreachable!("funcref table validated")
                    };
                    let func = func.ok_or(Trap::UninitializedElement)?;

                    let expected = module.signature(ty).expect("validated type index");
                    if func.ty() != *expected {
                        return Err(Trap::BadSignature.into());
                    }
                    self.call_function(&func, &instance)?;
                }

                Drop => {
                    self.stack.pop_value();
                }
                Select | TypedSelect { .. } => {
                    let cond = self.pop_i32();
                    let no = self.stack.pop_value();
                    let yes = self.stack.pop_value();
                    self.stack.push_value(if cond != 0 { yes } else { no });
                }

                LocalGet { local } => {
                    let value = self.stack.local(local.as_u32());
                    self.stack.push_value(value);
                }
                LocalSet { local } => {
                    let value = self.stack.pop_value();
                    self.stack.set_local(local.as_u32(), value);
                }
                LocalTee { local } => {
                    let value = self.stack.pop_value();
                    self.stack.set_local(local.as_u32(), value.clone());
                    self.stack.push_value(value);
                }
                GlobalGet { global } => {
                    let value = instance.global(global).borrow().get();
                    self.stack.push_value(value);
                }
                GlobalSet { global } => {
                    let value = self.stack.pop_value();
                    instance.global(global).borrow_mut().set(value)?;
                }

                TableGet { table } => {
                    let index = self.pop_i32() as u32;
                    let value = instance.table(table).borrow().get(index)?;
                    self.stack.push_value(value.into());
                }
                TableSet { table } => {
                    let value = self.pop_ref();
                    let index = self.pop_i32() as u32;
                    instance.table(table).borrow_mut().set(index, value)?;
                }
                TableSize { table } => {
                    let size = instance.table(table).borrow().size();
                    self.push(size as i32);
                }
                TableGrow { table } => {
                    let delta = self.pop_i32() as u32;
                    let init = self.pop_ref();
                    let prev = instance.table(table).borrow_mut().grow(delta, init);
                    self.push(prev);
                }
                TableFill { table } => {
                    let len = self.pop_i32() as u32;
                    let value = self.pop_ref();
                    let dst = self.pop_i32() as u32;
                    instance.table(table).borrow_mut().fill(
                        u64::from(dst),
                        value,
                        u64::from(len),
                    )?;
                }
                TableCopy {
                    dst_table,
                    src_table,
                } => {
                    let len = u64::from(self.pop_i32() as u32);
                    let src = u64::from(self.pop_i32() as u32);
                    let dst = u64::from(self.pop_i32() as u32);
                    let dst_rc = instance.table(dst_table);
                    let src_rc = instance.table(src_table);
                    if Rc::ptr_eq(&dst_rc, &src_rc) {
                        dst_rc.borrow_mut().copy_within(dst, src, len)?;
                    } else {
                        let src_table = src_rc.borrow();
                        dst_rc.borrow_mut().copy_from(&src_table, dst, src, len)?;
                    }
                }
                TableInit { element, table } => {
                    let len = u64::from(self.pop_i32() as u32);
                    let src = u64::from(self.pop_i32() as u32);
                    let dst = u64::from(self.pop_i32() as u32);
                    let items = instance.elem(element);
                    let empty: &[Ref] = &[];
                    let items = items.as_deref().unwrap_or(empty);
                    instance
                        .table(table)
                        .borrow_mut()
                        .init(dst, items, src, len)?;
                }
                ElemDrop { element } => instance.drop_elem(element),

                I32Load { memarg } => {
                    let bytes = self.mem_load::<4>(&instance, &memarg)?;
                    self.push(i32::from_le_bytes(bytes));
                }
                I64Load { memarg } => {
                    let bytes = self.mem_load::<8>(&instance, &memarg)?;
                    self.push(i64::from_le_bytes(bytes));
                }
                F32Load { memarg } => {
                    let bytes = self.mem_load::<4>(&instance, &memarg)?;
                    self.push(f32::from_bits(u32::from_le_bytes(bytes)));
                }
                F64Load { memarg } => {
                    let bytes = self.mem_load::<8>(&instance, &memarg)?;
                    self.push(f64::from_bits(u64::from_le_bytes(bytes)));
                }
                I32Load8S { memarg } => {
                    let bytes = self.mem_load::<1>(&instance, &memarg)?;
                    self.push(bytes[0] as i8 as i32);
                }
                I32Load8U { memarg } => {
                    let bytes = self.mem_load::<1>(&instance, &memarg)?;
                    self.push(bytes[0] as i32);
                }
                I32Load16S { memarg } => {
                    let bytes = self.mem_load::<2>(&instance, &memarg)?;
                    self.push(i16::from_le_bytes(bytes) as i32);
                }
                I32Load16U { memarg } => {
                    let bytes = self.mem_load::<2>(&instance, &memarg)?;
                    self.push(u16::from_le_bytes(bytes) as i32);
                }
                I64Load8S { memarg } => {
                    let bytes = self.mem_load::<1>(&instance, &memarg)?;
                    self.push(bytes[0] as i8 as i64);
                }
                I64Load8U { memarg } => {
                    let bytes = self.mem_load::<1>(&instance, &memarg)?;
                    self.push(bytes[0] as i64);
                }
                I64Load16S { memarg } => {
                    let bytes = self.mem_load::<2>(&instance, &memarg)?;
                    self.push(i16::from_le_bytes(bytes) as i64);
                }
                I64Load16U { memarg } => {
                    let bytes = self.mem_load::<2>(&instance, &memarg)?;
                    self.push(u16::from_le_bytes(bytes) as i64);
                }
                I64Load32S { memarg } => {
                    let bytes = self.mem_load::<4>(&instance, &memarg)?;
                    self.push(i32::from_le_bytes(bytes) as i64);
                }
                I64Load32U { memarg } => {
                    let bytes = self.mem_load::<4>(&instance, &memarg)?;
                    self.push(u32::from_le_bytes(bytes) as i64);
                }

                I32Store { memarg } => {
                    let value = self.pop_i32();
                    self.mem_store(&instance, &memarg, &value.to_le_bytes())?;
                }
                I64Store { memarg } => {
                    let value = self.pop_i64();
                    self.mem_store(&instance, &memarg, &value.to_le_bytes())?;
                }
                F32Store { memarg } => {
                    let value = self.pop_f32();
                    self.mem_store(&instance, &memarg, &value.to_bits().to_le_bytes())?;
                }
                F64Store { memarg } => {
                    let value = self.pop_f64();
                    self.mem_store(&instance, &memarg, &value.to_bits().to_le_bytes())?;
                }
                I32Store8 { memarg } => {
                    let value = self.pop_i32();
                    self.mem_store(&instance, &memarg, &[value as u8])?;
                }
                I32Store16 { memarg } => {
                    let value = self.pop_i32();
                    self.mem_store(&instance, &memarg, &(value as u16).to_le_bytes())?;
                }
                I64Store8 { memarg } => {
                    let value = self.pop_i64();
                    self.mem_store(&instance, &memarg, &[value as u8])?;
                }
                I64Store16 { memarg } => {
                    let value = self.pop_i64();
                    self.mem_store(&instance, &memarg, &(value as u16).to_le_bytes())?;
                }
                I64Store32 { memarg } => {
                    let value = self.pop_i64();
                    self.mem_store(&instance, &memarg, &(value as u32).to_le_bytes())?;
                }

                MemorySize => {
                    let size = instance.memory(0).borrow().size();
                    self.push(size as i32);
                }
                MemoryGrow => {
                    let delta = self.pop_i32() as u32;
                    let prev = instance.memory(0).borrow_mut().grow(delta);
                    self.push(prev);
                }
                MemoryFill => {
                    let len = u64::from(self.pop_i32() as u32);
                    let value = self.pop_i32() as u8;
                    let dst = u64::from(self.pop_i32() as u32);
                    instance.memory(0).borrow_mut().fill(dst, value, len)?;
                }
                MemoryCopy => {
                    let len = u64::from(self.pop_i32() as u32);
                    let src = u64::from(self.pop_i32() as u32);
                    let dst = u64::from(self.pop_i32() as u32);
                    instance
                        .memory(0)
                        .borrow_mut()
                        .copy_within(dst, src, len)?;
                }
                MemoryInit { data } => {
                    let len = u64::from(self.pop_i32() as u32);
                    let src = u64::from(self.pop_i32() as u32);
                    let dst = u64::from(self.pop_i32() as u32);
                    let range = instance.data(data);
                    let payload = range.map_or(&[][..], |r| {
                        &module.bytes[r.start as usize..r.end as usize]
                    });
                    instance
                        .memory(0)
                        .borrow_mut()
                        .init(dst, payload, src, len)?;
                }
                DataDrop { data } => instance.drop_data(data),

                I32Const { value } => self.push(value),
                I64Const { value } => self.push(value),
                F32Const { value } => self.stack.push_value(Val::F32(value.bits())),
                F64Const { value } => self.stack.push_value(Val::F64(value.bits())),

                RefNull { ty } => self.stack.push_value(Ref::null(ty).into()),
                RefIsNull => {
                    let value = self.pop_ref();
                    self.push(i32::from(value.is_null()));
                }
                RefFunc { function } => {
                    let func = instance.func(function);
                    self.stack.push_value(Val::FuncRef(Some(func)));
                }

                I32Eqz => {
                    let value = self.pop_i32();
                    self.push(i32::from(value == 0));
                }
                I32Eq => self.i32_relop(|a, b| a == b),
                I32Ne => self.i32_relop(|a, b| a != b),
                I32LtS => self.i32_relop(|a, b| a < b),
                I32LtU => self.i32_relop(|a, b| (a as u32) < (b as u32)),
                I32GtS => self.i32_relop(|a, b| a > b),
                I32GtU => self.i32_relop(|a, b| (a as u32) > (b as u32)),
                I32LeS => self.i32_relop(|a, b| a <= b),
                I32LeU => self.i32_relop(|a, b| (a as u32) <= (b as u32)),
                I32GeS => self.i32_relop(|a, b| a >= b),
                I32GeU => self.i32_relop(|a, b| (a as u32) >= (b as u32)),

                I64Eqz => {
                    let value = self.pop_i64();
                    self.push(i32::from(value == 0));
                }
                I64Eq => self.i64_relop(|a, b| a == b),
                I64Ne => self.i64_relop(|a, b| a != b),
                I64LtS => self.i64_relop(|a, b| a < b),
                I64LtU => self.i64_relop(|a, b| (a as u64) < (b as u64)),
                I64GtS => self.i64_relop(|a, b| a > b),
                I64GtU => self.i64_relop(|a, b| (a as u64) > (b as u64)),
                I64LeS => self.i64_relop(|a, b| a <= b),
                I64LeU => self.i64_relop(|a, b| (a as u64) <= (b as u64)),
                I64GeS => self.i64_relop(|a, b| a >= b),
                I64GeU => self.i64_relop(|a, b| (a as u64) >= (b as u64)),

                F32Eq => self.f32_relop(|a, b| a == b),
                F32Ne => self.f32_relop(|a, b| a != b),
                F32Lt => self.f32_relop(|a, b| a < b),
                F32Gt => self.f32_relop(|a, b| a > b),
                F32Le => self.f32_relop(|a, b| a <= b),
                F32Ge => self.f32_relop(|a, b| a >= b),

                F64Eq => self.f64_relop(|a, b| a == b),
                F64Ne => self.f64_relop(|a, b| a != b),
                F64Lt => self.f64_relop(|a, b| a < b),
                F64Gt => self.f64_relop(|a, b| a > b),
                F64Le => self.f64_relop(|a, b| a <= b),
                F64Ge => self.f64_relop(|a, b| a >= b),

                I32Clz => self.i32_unop(|v| v.leading_zeros() as i32),
                I32Ctz => self.i32_unop(|v| v.trailing_zeros() as i32),
                I32Popcnt => self.i32_unop(|v| v.count_ones() as i32),
                I32Add => self.i32_binop(i32::wrapping_add),
                I32Sub => self.i32_binop(i32::wrapping_sub),
                I32Mul => self.i32_binop(i32::wrapping_mul),
                I32DivS => {
                    let (b, a) = (self.pop_i32(), self.pop_i32());
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    let (quotient, overflow) = a.overflowing_div(b);
                    if overflow {
                        return Err(Trap::IntegerOverflow.into());
                    }
                    self.push(quotient);
                }
                I32DivU => {
                    let (b, a) = (self.pop_i32() as u32, self.pop_i32() as u32);
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    self.push((a / b) as i32);
                }
                I32RemS => {
                    let (b, a) = (self.pop_i32(), self.pop_i32());
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    self.push(a.overflowing_rem(b).0);
                }
                I32RemU => {
                    let (b, a) = (self.pop_i32() as u32, self.pop_i32() as u32);
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    self.push((a % b) as i32);
                }
                I32And => self.i32_binop(|a, b| a & b),
                I32Or => self.i32_binop(|a, b| a | b),
                I32Xor => self.i32_binop(|a, b| a ^ b),
                I32Shl => self.i32_binop(|a, b| a.wrapping_shl(b as u32)),
                I32ShrS => self.i32_binop(|a, b| a.wrapping_shr(b as u32)),
                I32ShrU => self.i32_binop(|a, b| ((a as u32).wrapping_shr(b as u32)) as i32),
                I32Rotl => self.i32_binop(|a, b| (a as u32).rotate_left(b as u32) as i32),
                I32Rotr => self.i32_binop(|a, b| (a as u32).rotate_right(b as u32) as i32),

                I64Clz => self.i64_unop(|v| v.leading_zeros() as i64),
                I64Ctz => self.i64_unop(|v| v.trailing_zeros() as i64),
                I64Popcnt => self.i64_unop(|v| v.count_ones() as i64),
                I64Add => self.i64_binop(i64::wrapping_add),
                I64Sub => self.i64_binop(i64::wrapping_sub),
                I64Mul => self.i64_binop(i64::wrapping_mul),
                I64DivS => {
                    let (b, a) = (self.pop_i64(), self.pop_i64());
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    let (quotient, overflow) = a.overflowing_div(b);
                    if overflow {
                        return Err(Trap::IntegerOverflow.into());
                    }
                    self.push(quotient);
                }
                I64DivU => {
                    let (b, a) = (self.pop_i64() as u64, self.pop_i64() as u64);
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    self.push((a / b) as i64);
                }
                I64RemS => {
                    let (b, a) = (self.pop_i64(), self.pop_i64());
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    self.push(a.overflowing_rem(b).0);
                }
                I64RemU => {
                    let (b, a) = (self.pop_i64() as u64, self.pop_i64() as u64);
                    if b == 0 {
                        return Err(Trap::IntegerDivisionByZero.into());
                    }
                    self.push((a % b) as i64);
                }
                I64And => self.i64_binop(|a, b| a & b),
                I64Or => self.i64_binop(|a, b| a | b),
                I64Xor => self.i64_binop(|a, b| a ^ b),
                I64Shl => self.i64_binop(|a, b| a.wrapping_shl(b as u32)),
                I64ShrS => self.i64_binop(|a, b| a.wrapping_shr(b as u32)),
                I64ShrU => self.i64_binop(|a, b| ((a as u64).wrapping_shr(b as u32)) as i64),
                I64Rotl => self.i64_binop(|a, b| (a as u64).rotate_left(b as u32) as i64),
                I64Rotr => self.i64_binop(|a, b| (a as u64).rotate_right(b as u32) as i64),

                F32Abs => self.f32_unop(f32::abs),
                F32Neg => self.f32_unop(|v| -v),
                F32Ceil => self.f32_unop(f32::ceil),
                F32Floor => self.f32_unop(f32::floor),
                F32Trunc => self.f32_unop(f32::trunc),
                F32Nearest => self.f32_unop(f32::round_ties_even),
                F32Sqrt => self.f32_unop(f32::sqrt),
                F32Add => self.f32_binop(|a, b| a + b),
                F32Sub => self.f32_binop(|a, b| a - b),
                F32Mul => self.f32_binop(|a, b| a * b),
                F32Div => self.f32_binop(|a, b| a / b),
                F32Min => self.f32_binop(wasm_f32_min),
                F32Max => self.f32_binop(wasm_f32_max),
                F32Copysign => self.f32_binop(f32::copysign),

                F64Abs => self.f64_unop(f64::abs),
                F64Neg => self.f64_unop(|v| -v),
                F64Ceil => self.f64_unop(f64::ceil),
                F64Floor => self.f64_unop(f64::floor),
                F64Trunc => self.f64_unop(f64::trunc),
                F64Nearest => self.f64_unop(f64::round_ties_even),
                F64Sqrt => self.f64_unop(f64::sqrt),
                F64Add => self.f64_binop(|a, b| a + b),
                F64Sub => self.f64_binop(|a, b| a - b),
                F64Mul => self.f64_binop(|a, b| a * b),
                F64Div => self.f64_binop(|a, b| a / b),
                F64Min => self.f64_binop(wasm_f64_min),
                F64Max => self.f64_binop(wasm_f64_max),
                F64Copysign => self.f64_binop(f64::copysign),

                I32WrapI64 => {
                    let value = self.pop_i64();
                    self.push(value as i32);
                }
                I32TruncF32S => {
                    let value = self.pop_f32();
                    self.push(trunc_f32_to_i32(value)?);
                }
                I32TruncF32U => {
                    let value = self.pop_f32();
                    self.push(trunc_f32_to_u32(value)? as i32);
                }
                I32TruncF64S => {
                    let value = self.pop_f64();
                    self.push(trunc_f64_to_i32(value)?);
                }
                I32TruncF64U => {
                    let value = self.pop_f64();
                    self.push(trunc_f64_to_u32(value)? as i32);
                }
                I64ExtendI32S => {
                    let value = self.pop_i32();
                    self.push(value as i64);
                }
                I64ExtendI32U => {
                    let value = self.pop_i32();
                    self.push(value as u32 as i64);
                }
                I64TruncF32S => {
                    let value = self.pop_f32();
                    self.push(trunc_f32_to_i64(value)?);
                }
                I64TruncF32U => {
                    let value = self.pop_f32();
                    self.push(trunc_f32_to_u64(value)? as i64);
                }
                I64TruncF64S => {
                    let value = self.pop_f64();
                    self.push(trunc_f64_to_i64(value)?);
                }
                I64TruncF64U => {
                    let value = self.pop_f64();
                    self.push(trunc_f64_to_u64(value)? as i64);
                }
                F32ConvertI32S => {
                    let value = self.pop_i32();
                    self.push(value as f32);
                }
                F32ConvertI32U => {
                    let value = self.pop_i32();
                    self.push(value as u32 as f32);
                }
                F32ConvertI64S => {
                    let value = self.pop_i64();
                    self.push(value as f32);
                }
                F32ConvertI64U => {
                    let value = self.pop_i64();
                    self.push(value as u64 as f32);
                }
                F32DemoteF64 => {
                    let value = self.pop_f64();
                    self.push(value as f32);
                }
                F64ConvertI32S => {
                    let value = self.pop_i32();
                    self.push(value as f64);
                }
                F64ConvertI32U => {
                    let value = self.pop_i32();
                    self.push(value as u32 as f64);
                }
                F64ConvertI64S => {
                    let value = self.pop_i64();
                    self.push(value as f64);
                }
                F64ConvertI64U => {
                    let value = self.pop_i64();
                    self.push(value as u64 as f64);
                }
                F64PromoteF32 => {
                    let value = self.pop_f32();
                    self.push(value as f64);
                }
                I32ReinterpretF32 => {
                    let bits = self.stack.pop_value().unwrap_f32().to_bits();
                    self.push(bits as i32);
                }
                I64ReinterpretF64 => {
                    let bits = self.stack.pop_value().unwrap_f64().to_bits();
                    self.push(bits as i64);
                }
                F32ReinterpretI32 => {
                    let value = self.pop_i32();
                    self.push(f32::from_bits(value as u32));
                }
                F64ReinterpretI64 => {
                    let value = self.pop_i64();
                    self.push(f64::from_bits(value as u64));
                }

                I32Extend8S => self.i32_unop(|v| v as i8 as i32),
                I32Extend16S => self.i32_unop(|v| v as i16 as i32),
                I64Extend8S => self.i64_unop(|v| v as i8 as i64),
                I64Extend16S => self.i64_unop(|v| v as i16 as i64),
                I64Extend32S => self.i64_unop(|v| v as i32 as i64),

                // saturating truncation is exactly Rust's `as` cast
                I32TruncSatF32S => {
                    let value = self.pop_f32();
                    self.push(value as i32);
                }
                I32TruncSatF32U => {
                    let value = self.pop_f32();
                    self.push(value as u32 as i32);
                }
                I32TruncSatF64S => {
                    let value = self.pop_f64();
                    self.push(value as i32);
                }
                I32TruncSatF64U => {
                    let value = self.pop_f64();
                    self.push(value as u32 as i32);
                }
                I64TruncSatF32S => {
                    let value = self.pop_f32();
                    self.push(value as i64);
                }
                I64TruncSatF32U => {
                    let value = self.pop_f32();
                    self.push(value as u64 as i64);
                }
                I64TruncSatF64S => {
                    let value = self.pop_f64();
                    self.push(value as i64);
                }
                I64TruncSatF64U => {
                    let value = self.pop_f64();
                    self.push(value as u64 as i64);
                }
            }
        }
    }

    fn i32_unop(&mut self, op: impl FnOnce(i32) -> i32) {
        let value = self.pop_i32();
        self.push(op(value));
    }

    fn i64_unop(&mut self, op: impl FnOnce(i64) -> i64) {
        let value = self.pop_i64();
        self.push(op(value));
    }

    fn f32_unop(&mut self, op: impl FnOnce(f32) -> f32) {
        let value = self.pop_f32();
        self.push(op(value));
    }

    fn f64_unop(&mut self, op: impl FnOnce(f64) -> f64) {
        let value = self.pop_f64();
        self.push(op(value));
    }

    fn i32_binop(&mut self, op: impl FnOnce(i32, i32) -> i32) {
        let (b, a) = (self.pop_i32(), self.pop_i32());
        self.push(op(a, b));
    }

    fn i64_binop(&mut self, op: impl FnOnce(i64, i64) -> i64) {
        let (b, a) = (self.pop_i64(), self.pop_i64());
        self.push(op(a, b));
    }

    fn f32_binop(&mut self, op: impl FnOnce(f32, f32) -> f32) {
        let (b, a) = (self.pop_f32(), self.pop_f32());
        self.push(op(a, b));
    }

    fn f64_binop(&mut self, op: impl FnOnce(f64, f64) -> f64) {
        let (b, a) = (self.pop_f64(), self.pop_f64());
        self.push(op(a, b));
    }

    fn i32_relop(&mut self, op: impl FnOnce(i32, i32) -> bool) {
        let (b, a) = (self.pop_i32(), self.pop_i32());
        self.push(i32::from(op(a, b)));
    }

    fn i64_relop(&mut self, op: impl FnOnce(i64, i64) -> bool) {
        let (b, a) = (self.pop_i64(), self.pop_i64());
        self.push(i32::from(op(a, b)));
    }

    fn f32_relop(&mut self, op: impl FnOnce(f32, f32) -> bool) {
        let (b, a) = (self.pop_f32(), self.pop_f32());
        self.push(i32::from(op(a, b)));
    }

    fn f64_relop(&mut self, op: impl FnOnce(f64, f64) -> bool) {
        let (b, a) = (self.pop_f64(), self.pop_f64());
        self.push(i32::from(op(a, b)));
    }
}

fn block_arity(module: &ModuleInner, ty: BlockType) -> (u32, u32) {
    match ty {
        BlockType::Empty => (0, 0),
        BlockType::Type(_) => (0, 1),
        BlockType::FunctionType(idx) => {
            let sig = module.signature(idx).expect("validated type index");
            (sig.params().len() as u32, sig.results().len() as u32)
        }
    }
}

// Float min/max follow the Wasm (not Rust) rules: NaN is contagious, and
// -0 orders below +0.

fn wasm_f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        if a.is_sign_negative() { a } else { b }
    } else if a < b {
        a
    } else {
        b
    }
}

fn wasm_f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        if a.is_sign_positive() { a } else { b }
    } else if a > b {
        a
    } else {
        b
    }
}

fn wasm_f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_negative() { a } else { b }
    } else if a < b {
        a
    } else {
        b
    }
}

fn wasm_f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_positive() { a } else { b }
    } else if a > b {
        a
    } else {
        b
    }
}

// Trapping float-to-int truncation. The bound literals are exact powers of
// two, representable in both float widths.

fn trunc_f32_to_i32(x: f32) -> Result<i32, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 2_147_483_648.0 || t < -2_147_483_648.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as i32)
}

fn trunc_f32_to_u32(x: f32) -> Result<u32, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 4_294_967_296.0 || t <= -1.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as u32)
}

fn trunc_f32_to_i64(x: f32) -> Result<i64, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 9_223_372_036_854_775_808.0 || t < -9_223_372_036_854_775_808.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as i64)
}

fn trunc_f32_to_u64(x: f32) -> Result<u64, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 18_446_744_073_709_551_616.0 || t <= -1.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as u64)
}

fn trunc_f64_to_i32(x: f64) -> Result<i32, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 2_147_483_648.0 || t < -2_147_483_648.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as i32)
}

fn trunc_f64_to_u32(x: f64) -> Result<u32, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 4_294_967_296.0 || t <= -1.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as u32)
}

fn trunc_f64_to_i64(x: f64) -> Result<i64, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 9_223_372_036_854_775_808.0 || t < -9_223_372_036_854_775_808.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as i64)
}

fn trunc_f64_to_u64(x: f64) -> Result<u64, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t >= 18_446_744_073_709_551_616.0 || t <= -1.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_zero_signs() {
        assert!(wasm_f32_min(0.0, -0.0).is_sign_negative());
        assert!(wasm_f32_min(-0.0, 0.0).is_sign_negative());
        assert!(wasm_f32_max(0.0, -0.0).is_sign_positive());
        assert!(wasm_f64_max(-0.0, 0.0).is_sign_positive());
    }

    #[test]
    fn min_max_nan_contagion() {
        assert!(wasm_f32_min(f32::NAN, 1.0).is_nan());
        assert!(wasm_f32_max(1.0, f32::NAN).is_nan());
        assert!(wasm_f64_min(f64::NAN, f64::INFINITY).is_nan());
    }

    #[test]
    fn trunc_bounds() {
        assert_eq!(trunc_f64_to_i32(2_147_483_647.9), Ok(i32::MAX));
        assert_eq!(trunc_f64_to_i32(-2_147_483_648.9), Ok(i32::MIN));
        assert_eq!(
            trunc_f64_to_i32(2_147_483_648.0),
            Err(Trap::IntegerOverflow)
        );
        assert_eq!(
            trunc_f32_to_i32(f32::NAN),
            Err(Trap::BadConversionToInteger)
        );
        assert_eq!(trunc_f32_to_u32(-0.75), Ok(0));
        assert_eq!(trunc_f32_to_u32(-1.0), Err(Trap::IntegerOverflow));
    }
}
