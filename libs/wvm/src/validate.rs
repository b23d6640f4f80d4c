// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module validation.
//!
//! Function bodies are checked with the standard symbolic algorithm: a
//! stack of operand types (with an "unknown" type below unreachable code)
//! plus a stack of control frames. The same walk records the continuation
//! side tables (`function_end`, `label_end`, `if_else`) the interpreter
//! uses for O(1) branch resolution, so every structured opcode is scanned
//! exactly once.

use crate::errors::ValidationError;
use crate::module::{DataKind, ElementItemsDecl, ElementKind, FunctionDecl, ModuleInner};
use core::ops::Range;
use hashbrown::HashMap;
use smallvec::SmallVec;
use wasmparser::{
    BinaryReader, BlockType, FuncIdx, GlobalType, ImportDesc, Instruction, MemArg, MemoryType,
    Mutability, ReferenceType, TableType, TypeIdx, ValueType, WasmFeatures,
};

#[derive(Default)]
pub(crate) struct SideTables {
    pub function_end: HashMap<u32, u32>,
    pub label_end: HashMap<u32, u32>,
    pub if_else: HashMap<u32, u32>,
}

pub(crate) fn validate_module(
    module: &ModuleInner,
    features: WasmFeatures,
) -> crate::Result<SideTables> {
    let _span = tracing::debug_span!("validate").entered();

    if !features.contains(WasmFeatures::MULTI_VALUE) {
        for ty in &module.types {
            if ty.results().len() > 1 {
                return Err(ValidationError::FeatureDisabled.into());
            }
        }
    }

    for import in &module.imports {
        match import.desc {
            ImportDesc::Func(ty) => {
                module
                    .signature(ty)
                    .ok_or(ValidationError::UnknownType)?;
            }
            ImportDesc::Table(ty) => check_table_type(&ty)?,
            ImportDesc::Mem(ty) => check_memory_type(&ty)?,
            ImportDesc::Global(ty) => check_global_type(&ty, features)?,
        }
    }

    for table in &module.tables {
        check_table_type(table)?;
    }
    if module.memories.len() > 1 {
        return Err(ValidationError::MultipleMemories.into());
    }
    for memory in &module.memories {
        check_memory_type(memory)?;
    }

    for decl in module.functions.values() {
        module
            .signature(decl.ty())
            .ok_or(ValidationError::UnknownType)?;
    }

    for global in &module.globals {
        if let Some(init) = &global.init {
            validate_const_expr(module, features, init.clone(), global.ty.ty)?;
        }
    }

    for export in &module.exports {
        match export.desc {
            wasmparser::ExportDesc::Func(func) => {
                module
                    .functions
                    .get(func)
                    .ok_or(ValidationError::UnknownFunction)?;
            }
            wasmparser::ExportDesc::Table(table) => {
                if table.as_u32() as usize >= module.tables.len() {
                    return Err(ValidationError::UnknownTable.into());
                }
            }
            wasmparser::ExportDesc::Mem(mem) => {
                if mem.as_u32() as usize >= module.memories.len() {
                    return Err(ValidationError::UnknownMemory.into());
                }
            }
            wasmparser::ExportDesc::Global(global) => {
                if global.as_u32() as usize >= module.globals.len() {
                    return Err(ValidationError::UnknownGlobal.into());
                }
            }
        }
    }

    if let Some(start) = module.start {
        let decl = module
            .functions
            .get(start)
            .ok_or(ValidationError::UnknownFunction)?;
        let sig = module
            .signature(decl.ty())
            .ok_or(ValidationError::UnknownType)?;
        if !sig.params().is_empty() || !sig.results().is_empty() {
            return Err(ValidationError::StartFunctionType.into());
        }
    }

    for element in &module.elements {
        if let ElementKind::Active { table, offset } = &element.mode {
            let table_ty = module
                .tables
                .get(table.as_u32() as usize)
                .ok_or(ValidationError::UnknownTable)?;
            if table_ty.ty != element.ty {
                return Err(ValidationError::TypeMismatch.into());
            }
            validate_const_expr(module, features, offset.clone(), ValueType::I32)?;
        }
        match &element.items {
            ElementItemsDecl::Functions(items) => {
                for func in items.iter() {
                    module
                        .functions
                        .get(*func)
                        .ok_or(ValidationError::UnknownFunction)?;
                }
            }
            ElementItemsDecl::Expressions(items) => {
                for expr in items.iter() {
                    validate_const_expr(module, features, expr.clone(), element.ty.into())?;
                }
            }
        }
    }

    for data in &module.datas {
        if let DataKind::Active { offset } = &data.mode {
            if module.memories.is_empty() {
                return Err(ValidationError::UnknownMemory.into());
            }
            validate_const_expr(module, features, offset.clone(), ValueType::I32)?;
        }
    }

    let mut side = SideTables::default();
    for (func, decl) in module.functions.iter() {
        if let FunctionDecl::Defined {
            ty,
            locals,
            body_start,
            body_end,
        } = decl
        {
            validate_function_body(
                module,
                features,
                &mut side,
                func,
                *ty,
                locals,
                *body_start,
                *body_end,
            )?;
        }
    }

    Ok(side)
}

fn check_limits(limits: &wasmparser::Limits) -> crate::Result<()> {
    if limits.max.is_some_and(|max| max < limits.min) {
        return Err(ValidationError::LimitsMinExceedsMax.into());
    }
    Ok(())
}

fn check_table_type(ty: &TableType) -> crate::Result<()> {
    check_limits(&ty.limits)
}

fn check_memory_type(ty: &MemoryType) -> crate::Result<()> {
    let pages = crate::WASM_MAX_PAGES;
    if u64::from(ty.limits.min) > pages
        || ty.limits.max.is_some_and(|max| u64::from(max) > pages)
    {
        return Err(ValidationError::MemoryMaxPagesExceeded.into());
    }
    check_limits(&ty.limits)
}

fn check_global_type(ty: &GlobalType, features: WasmFeatures) -> crate::Result<()> {
    if ty.mutability == Mutability::Var && !features.contains(WasmFeatures::MUTABLE_GLOBAL) {
        return Err(ValidationError::FeatureDisabled.into());
    }
    Ok(())
}

/// Constant expressions are a closed list: typed constants, `ref.null`,
/// `ref.func`, and `global.get` of an immutable imported global.
fn validate_const_expr(
    module: &ModuleInner,
    features: WasmFeatures,
    expr: Range<u32>,
    expected: ValueType,
) -> crate::Result<()> {
    let mut reader =
        BinaryReader::new_bounded(&module.bytes, expr.start as usize, expr.end as usize);
    let mut stack: SmallVec<[ValueType; 2]> = SmallVec::new();

    loop {
        match reader.read_instruction()? {
            Instruction::I32Const { .. } => stack.push(ValueType::I32),
            Instruction::I64Const { .. } => stack.push(ValueType::I64),
            Instruction::F32Const { .. } => stack.push(ValueType::F32),
            Instruction::F64Const { .. } => stack.push(ValueType::F64),
            Instruction::RefNull { ty } => {
                require(features, WasmFeatures::REFERENCE_TYPES)?;
                stack.push(ty.into());
            }
            Instruction::RefFunc { function } => {
                require(features, WasmFeatures::REFERENCE_TYPES)?;
                module
                    .functions
                    .get(function)
                    .ok_or(ValidationError::UnknownFunction)?;
                if !module.declared_funcs.contains(&function) {
                    return Err(ValidationError::FuncRefUndeclared.into());
                }
                stack.push(ValueType::FuncRef);
            }
            Instruction::GlobalGet { global } => {
                let decl = module
                    .globals
                    .get(global.as_u32() as usize)
                    .ok_or(ValidationError::UnknownGlobal)?;
                if global.as_u32() >= module.num_imported_globals {
                    return Err(ValidationError::ConstantExpressionGlobalMustBeImport.into());
                }
                if decl.ty.mutability != Mutability::Const {
                    return Err(ValidationError::ConstantExpressionGlobalMustBeImmutable.into());
                }
                stack.push(decl.ty.ty);
            }
            Instruction::End => break,
            _ => return Err(ValidationError::ConstantExpressionRequired.into()),
        }
    }

    if stack.len() != 1 || stack[0] != expected {
        return Err(ValidationError::TypeMismatch.into());
    }
    Ok(())
}

fn require(features: WasmFeatures, feature: WasmFeatures) -> crate::Result<()> {
    if !features.contains(feature) {
        // with the proposal off the encoding simply does not exist
        return Err(wasmparser::Error::IllegalOpcode.into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum FrameKind {
    Body,
    Block { offset: u32 },
    Loop { offset: u32 },
    If { offset: u32 },
    Else { if_offset: u32, else_offset: u32 },
}

struct ControlFrame {
    kind: FrameKind,
    params: Box<[ValueType]>,
    results: Box<[ValueType]>,
    /// Operand-stack height on entry, parameters not included.
    height: usize,
    unreachable: bool,
}

impl ControlFrame {
    /// The types a branch to this frame's label carries: a loop continues
    /// with its parameters, everything else exits with its results.
    fn label_types(&self) -> &[ValueType] {
        if matches!(self.kind, FrameKind::Loop { .. }) {
            &self.params
        } else {
            &self.results
        }
    }
}

struct BodyValidator<'m> {
    module: &'m ModuleInner,
    features: WasmFeatures,
    locals: Vec<ValueType>,
    /// Symbolic operand stack; `None` is the unknown type produced below
    /// unreachable instructions.
    ops: Vec<Option<ValueType>>,
    ctrls: Vec<ControlFrame>,
}

#[allow(clippy::too_many_arguments)]
fn validate_function_body(
    module: &ModuleInner,
    features: WasmFeatures,
    side: &mut SideTables,
    func: FuncIdx,
    ty: TypeIdx,
    locals_decl: &[ValueType],
    body_start: u32,
    body_end: u32,
) -> crate::Result<()> {
    let sig = module.signature(ty).ok_or(ValidationError::UnknownType)?;

    let mut locals = Vec::with_capacity(sig.params().len() + locals_decl.len());
    locals.extend_from_slice(sig.params());
    locals.extend_from_slice(locals_decl);

    let mut v = BodyValidator {
        module,
        features,
        locals,
        ops: Vec::new(),
        ctrls: Vec::new(),
    };
    v.ctrls.push(ControlFrame {
        kind: FrameKind::Body,
        params: Box::from([]),
        results: Box::from(sig.results()),
        height: 0,
        unreachable: false,
    });

    let mut reader =
        BinaryReader::new_bounded(&module.bytes, body_start as usize, body_end as usize);

    loop {
        if reader.done() {
            // ran out of body bytes with constructs still open
            return Err(wasmparser::Error::EndOpcodeExpected.into());
        }
        let offset = reader.position() as u32;
        let instr = reader.read_instruction()?;
        v.instruction(&instr, offset, body_start, side)?;

        if v.ctrls.is_empty() {
            // that was the body's final `end`; the declared size must match
            if !reader.done() {
                return Err(wasmparser::Error::SectionSizeMismatch.into());
            }
            break;
        }
    }

    tracing::trace!(func = func.as_u32(), "function body validated");
    Ok(())
}

impl<'m> BodyValidator<'m> {
    fn push_opd(&mut self, ty: Option<ValueType>) {
        self.ops.push(ty);
    }

    fn pop_opd(&mut self) -> crate::Result<Option<ValueType>> {
        let frame = self.ctrls.last().expect("control frame");
        if self.ops.len() == frame.height {
            if frame.unreachable {
                return Ok(None);
            }
            return Err(ValidationError::TypeMismatch.into());
        }
        Ok(self.ops.pop().expect("operand"))
    }

    fn pop_expect(&mut self, expect: ValueType) -> crate::Result<()> {
        match self.pop_opd()? {
            Some(actual) if actual != expect => Err(ValidationError::TypeMismatch.into()),
            _ => Ok(()),
        }
    }

    fn pop_many(&mut self, tys: &[ValueType]) -> crate::Result<()> {
        for ty in tys.iter().rev() {
            self.pop_expect(*ty)?;
        }
        Ok(())
    }

    fn push_many(&mut self, tys: &[ValueType]) {
        for ty in tys {
            self.push_opd(Some(*ty));
        }
    }

    fn push_ctrl(&mut self, kind: FrameKind, params: Box<[ValueType]>, results: Box<[ValueType]>) {
        let height = self.ops.len();
        for ty in params.iter() {
            self.ops.push(Some(*ty));
        }
        self.ctrls.push(ControlFrame {
            kind,
            params,
            results,
            height,
            unreachable: false,
        });
    }

    fn pop_ctrl(&mut self) -> crate::Result<ControlFrame> {
        let frame = self.ctrls.last().expect("control frame");
        let results = frame.results.clone();
        let height = frame.height;

        self.pop_many(&results)?;
        if self.ops.len() != height {
            return Err(ValidationError::TypeMismatch.into());
        }

        Ok(self.ctrls.pop().expect("control frame"))
    }

    fn set_unreachable(&mut self) {
        let frame = self.ctrls.last_mut().expect("control frame");
        self.ops.truncate(frame.height);
        frame.unreachable = true;
    }

    fn frame_at(&self, depth: u32) -> crate::Result<&ControlFrame> {
        let idx = self
            .ctrls
            .len()
            .checked_sub(1 + depth as usize)
            .ok_or(ValidationError::UnknownLabel)?;
        Ok(&self.ctrls[idx])
    }

    fn resolve_block_type(
        &self,
        ty: BlockType,
    ) -> crate::Result<(Box<[ValueType]>, Box<[ValueType]>)> {
        match ty {
            BlockType::Empty => Ok((Box::from([]), Box::from([]))),
            BlockType::Type(ty) => Ok((Box::from([]), Box::from([ty]))),
            BlockType::FunctionType(idx) => {
                if !self.features.contains(WasmFeatures::MULTI_VALUE) {
                    return Err(ValidationError::FeatureDisabled.into());
                }
                let sig = self
                    .module
                    .signature(idx)
                    .ok_or(ValidationError::UnknownType)?;
                Ok((Box::from(sig.params()), Box::from(sig.results())))
            }
        }
    }

    fn local(&self, idx: u32) -> crate::Result<ValueType> {
        self.locals
            .get(idx as usize)
            .copied()
            .ok_or_else(|| ValidationError::UnknownLocal.into())
    }

    fn global(&self, idx: u32) -> crate::Result<GlobalType> {
        self.module
            .globals
            .get(idx as usize)
            .map(|decl| decl.ty)
            .ok_or_else(|| ValidationError::UnknownGlobal.into())
    }

    fn table(&self, idx: u32) -> crate::Result<TableType> {
        self.module
            .tables
            .get(idx as usize)
            .copied()
            .ok_or_else(|| ValidationError::UnknownTable.into())
    }

    fn check_memory(&self) -> crate::Result<()> {
        if self.module.memories.is_empty() {
            return Err(ValidationError::UnknownMemory.into());
        }
        Ok(())
    }

    fn check_data_segment(&self, idx: u32) -> crate::Result<()> {
        if self.module.data_count.is_none() {
            return Err(wasmparser::Error::DataCountRequired.into());
        }
        if idx as usize >= self.module.datas.len() {
            return Err(ValidationError::UnknownDataSegment.into());
        }
        Ok(())
    }

    fn check_elem_segment(&self, idx: u32) -> crate::Result<ReferenceType> {
        self.module
            .elements
            .get(idx as usize)
            .map(|e| e.ty)
            .ok_or_else(|| ValidationError::UnknownElementSegment.into())
    }

    /// `memarg` alignment may not exceed the natural alignment of the
    /// access width.
    fn load(&mut self, memarg: &MemArg, natural_log2: u32, ty: ValueType) -> crate::Result<()> {
        self.check_memory()?;
        if memarg.align > natural_log2 {
            return Err(ValidationError::BadAlignment.into());
        }
        self.pop_expect(ValueType::I32)?;
        self.push_opd(Some(ty));
        Ok(())
    }

    fn store(&mut self, memarg: &MemArg, natural_log2: u32, ty: ValueType) -> crate::Result<()> {
        self.check_memory()?;
        if memarg.align > natural_log2 {
            return Err(ValidationError::BadAlignment.into());
        }
        self.pop_expect(ty)?;
        self.pop_expect(ValueType::I32)?;
        Ok(())
    }

    fn testop(&mut self, ty: ValueType) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.push_opd(Some(ValueType::I32));
        Ok(())
    }

    fn relop(&mut self, ty: ValueType) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.pop_expect(ty)?;
        self.push_opd(Some(ValueType::I32));
        Ok(())
    }

    fn binop(&mut self, ty: ValueType) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.pop_expect(ty)?;
        self.push_opd(Some(ty));
        Ok(())
    }

    fn unop(&mut self, ty: ValueType) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.push_opd(Some(ty));
        Ok(())
    }

    fn cvtop(&mut self, from: ValueType, to: ValueType) -> crate::Result<()> {
        self.pop_expect(from)?;
        self.push_opd(Some(to));
        Ok(())
    }

    fn instruction(
        &mut self,
        instr: &Instruction<'_>,
        offset: u32,
        body_start: u32,
        side: &mut SideTables,
    ) -> crate::Result<()> {
        use Instruction::*;
        use ValueType::{F32, F64, I32, I64};

        match instr {
            Unreachable => self.set_unreachable(),
            Nop => {}

            Block { ty } => {
                let (params, results) = self.resolve_block_type(*ty)?;
                self.pop_many(&params)?;
                self.push_ctrl(FrameKind::Block { offset }, params, results);
            }
            Loop { ty } => {
                let (params, results) = self.resolve_block_type(*ty)?;
                self.pop_many(&params)?;
                self.push_ctrl(FrameKind::Loop { offset }, params, results);
            }
            If { ty } => {
                let (params, results) = self.resolve_block_type(*ty)?;
                self.pop_expect(I32)?;
                self.pop_many(&params)?;
                self.push_ctrl(FrameKind::If { offset }, params, results);
            }
            Else => {
                let frame = self.pop_ctrl()?;
                let FrameKind::If { offset: if_offset } = frame.kind else {
                    return Err(ValidationError::IfElseMismatch.into());
                };
                side.if_else.insert(if_offset, offset);
                self.push_ctrl(
                    FrameKind::Else {
                        if_offset,
                        else_offset: offset,
                    },
                    frame.params,
                    frame.results,
                );
            }
            End => {
                let frame = self.pop_ctrl()?;
                match frame.kind {
                    FrameKind::Body => {
                        side.function_end.insert(body_start, offset);
                    }
                    FrameKind::Block { offset: start } => {
                        side.label_end.insert(start, offset);
                    }
                    // branches to a loop restart it at the header
                    FrameKind::Loop { offset: start } => {
                        side.label_end.insert(start, start);
                    }
                    FrameKind::If { offset: start } => {
                        // an if without else must be able to skip the arm
                        if frame.params != frame.results {
                            return Err(ValidationError::IfElseMismatch.into());
                        }
                        side.label_end.insert(start, offset);
                    }
                    FrameKind::Else {
                        if_offset,
                        else_offset,
                    } => {
                        side.label_end.insert(if_offset, offset);
                        side.label_end.insert(else_offset, offset);
                    }
                }
                for ty in frame.results.iter() {
                    self.push_opd(Some(*ty));
                }
            }

            Br { label } => {
                let tys: Box<[ValueType]> = self.frame_at(label.as_u32())?.label_types().into();
                self.pop_many(&tys)?;
                self.set_unreachable();
            }
            BrIf { label } => {
                self.pop_expect(I32)?;
                let tys: Box<[ValueType]> = self.frame_at(label.as_u32())?.label_types().into();
                self.pop_many(&tys)?;
                self.push_many(&tys);
            }
            BrTable { targets } => {
                self.pop_expect(I32)?;
                let default_tys: Box<[ValueType]> = self
                    .frame_at(targets.default().as_u32())?
                    .label_types()
                    .into();
                for label in targets.labels() {
                    let label = label?;
                    let tys: Box<[ValueType]> = self.frame_at(label.as_u32())?.label_types().into();
                    if tys.len() != default_tys.len() {
                        return Err(ValidationError::TypeMismatch.into());
                    }
                    // check without consuming; unknown operands stay unknown
                    let mut saved: SmallVec<[Option<ValueType>; 4]> = SmallVec::new();
                    for ty in tys.iter().rev() {
                        let got = self.pop_opd()?;
                        if let Some(got) = got
                            && got != *ty
                        {
                            return Err(ValidationError::TypeMismatch.into());
                        }
                        saved.push(got);
                    }
                    for got in saved.into_iter().rev() {
                        self.push_opd(got);
                    }
                }
                self.pop_many(&default_tys)?;
                self.set_unreachable();
            }
            Return => {
                let tys: Box<[ValueType]> = self.ctrls[0].label_types().into();
                self.pop_many(&tys)?;
                self.set_unreachable();
            }

            Call { function } => {
                let decl = self
                    .module
                    .functions
                    .get(*function)
                    .ok_or(ValidationError::UnknownFunction)?;
                let sig = self
                    .module
                    .signature(decl.ty())
                    .ok_or(ValidationError::UnknownType)?
                    .clone();
                self.pop_many(sig.params())?;
                self.push_many(sig.results());
            }
            CallIndirect { ty, table } => {
                let table_ty = self.table(table.as_u32())?;
                if table_ty.ty != ReferenceType::FuncRef {
                    return Err(ValidationError::TypeMismatch.into());
                }
                let sig = self
                    .module
                    .signature(*ty)
                    .ok_or(ValidationError::UnknownType)?
                    .clone();
                self.pop_expect(I32)?;
                self.pop_many(sig.params())?;
                self.push_many(sig.results());
            }

            Drop => {
                self.pop_opd()?;
            }
            Select => {
                self.pop_expect(I32)?;
                let t1 = self.pop_opd()?;
                let t2 = self.pop_opd()?;
                for t in [t1, t2].into_iter().flatten() {
                    if t.is_reference() {
                        return Err(ValidationError::TypeMustBeNumeric.into());
                    }
                }
                if let (Some(a), Some(b)) = (t1, t2)
                    && a != b
                {
                    return Err(ValidationError::TypeMismatch.into());
                }
                self.push_opd(t1.or(t2));
            }
            TypedSelect { ty } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                self.pop_expect(I32)?;
                self.pop_expect(*ty)?;
                self.pop_expect(*ty)?;
                self.push_opd(Some(*ty));
            }

            LocalGet { local } => {
                let ty = self.local(local.as_u32())?;
                self.push_opd(Some(ty));
            }
            LocalSet { local } => {
                let ty = self.local(local.as_u32())?;
                self.pop_expect(ty)?;
            }
            LocalTee { local } => {
                let ty = self.local(local.as_u32())?;
                self.pop_expect(ty)?;
                self.push_opd(Some(ty));
            }
            GlobalGet { global } => {
                let ty = self.global(global.as_u32())?;
                self.push_opd(Some(ty.ty));
            }
            GlobalSet { global } => {
                let ty = self.global(global.as_u32())?;
                if ty.mutability != Mutability::Var {
                    return Err(ValidationError::ImmutableGlobal.into());
                }
                self.pop_expect(ty.ty)?;
            }

            TableGet { table } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                let ty = self.table(table.as_u32())?;
                self.pop_expect(I32)?;
                self.push_opd(Some(ty.ty.into()));
            }
            TableSet { table } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                let ty = self.table(table.as_u32())?;
                self.pop_expect(ty.ty.into())?;
                self.pop_expect(I32)?;
            }
            TableGrow { table } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                let ty = self.table(table.as_u32())?;
                self.pop_expect(I32)?;
                self.pop_expect(ty.ty.into())?;
                self.push_opd(Some(I32));
            }
            TableSize { table } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                self.table(table.as_u32())?;
                self.push_opd(Some(I32));
            }
            TableFill { table } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                let ty = self.table(table.as_u32())?;
                self.pop_expect(I32)?;
                self.pop_expect(ty.ty.into())?;
                self.pop_expect(I32)?;
            }
            TableCopy {
                dst_table,
                src_table,
            } => {
                require(self.features, WasmFeatures::BULK_MEMORY)?;
                let dst = self.table(dst_table.as_u32())?;
                let src = self.table(src_table.as_u32())?;
                if dst.ty != src.ty {
                    return Err(ValidationError::TypeMismatch.into());
                }
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
            }
            TableInit { element, table } => {
                require(self.features, WasmFeatures::BULK_MEMORY)?;
                let elem_ty = self.check_elem_segment(element.as_u32())?;
                let table_ty = self.table(table.as_u32())?;
                if table_ty.ty != elem_ty {
                    return Err(ValidationError::TypeMismatch.into());
                }
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
            }
            ElemDrop { element } => {
                require(self.features, WasmFeatures::BULK_MEMORY)?;
                self.check_elem_segment(element.as_u32())?;
            }

            I32Load { memarg } => self.load(memarg, 2, I32)?,
            I64Load { memarg } => self.load(memarg, 3, I64)?,
            F32Load { memarg } => self.load(memarg, 2, F32)?,
            F64Load { memarg } => self.load(memarg, 3, F64)?,
            I32Load8S { memarg } | I32Load8U { memarg } => self.load(memarg, 0, I32)?,
            I32Load16S { memarg } | I32Load16U { memarg } => self.load(memarg, 1, I32)?,
            I64Load8S { memarg } | I64Load8U { memarg } => self.load(memarg, 0, I64)?,
            I64Load16S { memarg } | I64Load16U { memarg } => self.load(memarg, 1, I64)?,
            I64Load32S { memarg } | I64Load32U { memarg } => self.load(memarg, 2, I64)?,
            I32Store { memarg } => self.store(memarg, 2, I32)?,
            I64Store { memarg } => self.store(memarg, 3, I64)?,
            F32Store { memarg } => self.store(memarg, 2, F32)?,
            F64Store { memarg } => self.store(memarg, 3, F64)?,
            I32Store8 { memarg } => self.store(memarg, 0, I32)?,
            I32Store16 { memarg } => self.store(memarg, 1, I32)?,
            I64Store8 { memarg } => self.store(memarg, 0, I64)?,
            I64Store16 { memarg } => self.store(memarg, 1, I64)?,
            I64Store32 { memarg } => self.store(memarg, 2, I64)?,

            MemorySize => {
                self.check_memory()?;
                self.push_opd(Some(I32));
            }
            MemoryGrow => {
                self.check_memory()?;
                self.pop_expect(I32)?;
                self.push_opd(Some(I32));
            }
            MemoryInit { data } => {
                require(self.features, WasmFeatures::BULK_MEMORY)?;
                self.check_data_segment(data.as_u32())?;
                self.check_memory()?;
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
            }
            DataDrop { data } => {
                require(self.features, WasmFeatures::BULK_MEMORY)?;
                self.check_data_segment(data.as_u32())?;
            }
            MemoryCopy | MemoryFill => {
                require(self.features, WasmFeatures::BULK_MEMORY)?;
                self.check_memory()?;
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
                self.pop_expect(I32)?;
            }

            I32Const { .. } => self.push_opd(Some(I32)),
            I64Const { .. } => self.push_opd(Some(I64)),
            F32Const { .. } => self.push_opd(Some(F32)),
            F64Const { .. } => self.push_opd(Some(F64)),

            RefNull { ty } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                self.push_opd(Some((*ty).into()));
            }
            RefIsNull => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                match self.pop_opd()? {
                    Some(ty) if !ty.is_reference() => {
                        return Err(ValidationError::TypeMismatch.into());
                    }
                    _ => {}
                }
                self.push_opd(Some(I32));
            }
            RefFunc { function } => {
                require(self.features, WasmFeatures::REFERENCE_TYPES)?;
                self.module
                    .functions
                    .get(*function)
                    .ok_or(ValidationError::UnknownFunction)?;
                if !self.module.declared_funcs.contains(function) {
                    return Err(ValidationError::FuncRefUndeclared.into());
                }
                self.push_opd(Some(ValueType::FuncRef));
            }

            I32Eqz => self.testop(I32)?,
            I64Eqz => self.testop(I64)?,

            I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS
            | I32GeU => self.relop(I32)?,
            I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS
            | I64GeU => self.relop(I64)?,
            F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => self.relop(F32)?,
            F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => self.relop(F64)?,

            I32Clz | I32Ctz | I32Popcnt => self.unop(I32)?,
            I64Clz | I64Ctz | I64Popcnt => self.unop(I64)?,

            I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or
            | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr => self.binop(I32)?,
            I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
            | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => self.binop(I64)?,

            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt => {
                self.unop(F32)?
            }
            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt => {
                self.unop(F64)?
            }
            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => self.binop(F32)?,
            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => self.binop(F64)?,

            I32WrapI64 => self.cvtop(I64, I32)?,
            I32TruncF32S | I32TruncF32U => self.cvtop(F32, I32)?,
            I32TruncF64S | I32TruncF64U => self.cvtop(F64, I32)?,
            I64ExtendI32S | I64ExtendI32U => self.cvtop(I32, I64)?,
            I64TruncF32S | I64TruncF32U => self.cvtop(F32, I64)?,
            I64TruncF64S | I64TruncF64U => self.cvtop(F64, I64)?,
            F32ConvertI32S | F32ConvertI32U => self.cvtop(I32, F32)?,
            F32ConvertI64S | F32ConvertI64U => self.cvtop(I64, F32)?,
            F32DemoteF64 => self.cvtop(F64, F32)?,
            F64ConvertI32S | F64ConvertI32U => self.cvtop(I32, F64)?,
            F64ConvertI64S | F64ConvertI64U => self.cvtop(I64, F64)?,
            F64PromoteF32 => self.cvtop(F32, F64)?,
            I32ReinterpretF32 => self.cvtop(F32, I32)?,
            I64ReinterpretF64 => self.cvtop(F64, I64)?,
            F32ReinterpretI32 => self.cvtop(I32, F32)?,
            F64ReinterpretI64 => self.cvtop(I64, F64)?,

            I32Extend8S | I32Extend16S => {
                require(self.features, WasmFeatures::SIGN_EXTENSION)?;
                self.unop(I32)?;
            }
            I64Extend8S | I64Extend16S | I64Extend32S => {
                require(self.features, WasmFeatures::SIGN_EXTENSION)?;
                self.unop(I64)?;
            }

            I32TruncSatF32S | I32TruncSatF32U => {
                require(self.features, WasmFeatures::NONTRAPPING_FLOAT_TO_INT)?;
                self.cvtop(F32, I32)?;
            }
            I32TruncSatF64S | I32TruncSatF64U => {
                require(self.features, WasmFeatures::NONTRAPPING_FLOAT_TO_INT)?;
                self.cvtop(F64, I32)?;
            }
            I64TruncSatF32S | I64TruncSatF32U => {
                require(self.features, WasmFeatures::NONTRAPPING_FLOAT_TO_INT)?;
                self.cvtop(F32, I64)?;
            }
            I64TruncSatF64S | I64TruncSatF64U => {
                require(self.features, WasmFeatures::NONTRAPPING_FLOAT_TO_INT)?;
                self.cvtop(F64, I64)?;
            }
        }

        Ok(())
    }
}
