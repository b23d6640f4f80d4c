// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::errors::ValidationError;
use crate::types::FuncType;
use crate::validate;
use core::fmt;
use core::ops::Range;
use cranelift_entity::PrimaryMap;
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use wasmparser::{
    BinaryReader, ElementItems, ElementMode, ExportDesc, FuncIdx, GlobalType, ImportDesc,
    Instruction, MAX_WASM_FUNCTION_LOCALS, MemoryType, NameSectionReader, NameSubsection,
    ReferenceType, Section, TableIdx, TableType, TypeIdx, ValueType, VecIter, WasmFeatures,
};

/// A decoded and validated module definition.
///
/// Immutable once built: instantiation and execution only ever read it.
/// `Module` is a cheap handle; clones share the decoded representation,
/// which is released when the last handle (and the last instance created
/// from it) goes away.
#[derive(Clone)]
pub struct Module {
    pub(crate) inner: Rc<ModuleInner>,
}

pub(crate) struct ModuleInner {
    /// The raw module, retained because function bodies, constant
    /// expressions and data segments are byte ranges into it.
    pub bytes: Box<[u8]>,
    pub types: Box<[FuncType]>,
    pub imports: Box<[ImportDecl]>,
    /// The function index space: imports first, then defined functions.
    pub functions: PrimaryMap<FuncIdx, FunctionDecl>,
    /// The table index space, imports first.
    pub tables: Box<[TableType]>,
    /// The memory index space, imports first.
    pub memories: Box<[MemoryType]>,
    /// The global index space, imports first.
    pub globals: Box<[GlobalDecl]>,
    pub exports: Box<[ExportDecl]>,
    pub export_map: HashMap<Box<str>, ExportDesc>,
    pub start: Option<FuncIdx>,
    pub elements: Box<[ElementDecl]>,
    pub datas: Box<[DataDecl]>,
    pub data_count: Option<u32>,

    pub num_imported_funcs: u32,
    pub num_imported_tables: u32,
    pub num_imported_memories: u32,
    pub num_imported_globals: u32,

    /// Functions a `ref.func` in a code body may name: imported and
    /// exported functions plus everything mentioned by an element segment
    /// or a global initializer.
    pub declared_funcs: HashSet<FuncIdx>,

    /// Continuation tables, keyed by the byte offset of a structured
    /// instruction. Computed once by the validation scan, never mutated.
    pub function_end: HashMap<u32, u32>,
    pub label_end: HashMap<u32, u32>,
    pub if_else: HashMap<u32, u32>,

    pub names: ModuleNames,
    pub custom_sections: Box<[CustomSectionDecl]>,
}

#[derive(Debug)]
pub(crate) struct ImportDecl {
    pub module: Box<str>,
    pub field: Box<str>,
    pub desc: ImportDesc,
}

#[derive(Debug)]
pub(crate) enum FunctionDecl {
    Imported {
        ty: TypeIdx,
    },
    Defined {
        ty: TypeIdx,
        /// Declared locals, expanded; parameters not included.
        locals: Box<[ValueType]>,
        /// Absolute offset of the body's first instruction.
        body_start: u32,
        /// Absolute offset one past the body's final `end`.
        body_end: u32,
    },
}

impl FunctionDecl {
    pub fn ty(&self) -> TypeIdx {
        match self {
            FunctionDecl::Imported { ty, .. } | FunctionDecl::Defined { ty, .. } => *ty,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GlobalDecl {
    pub ty: GlobalType,
    /// Byte range of the initializer; `None` for imported globals.
    pub init: Option<Range<u32>>,
}

#[derive(Debug)]
pub(crate) struct ExportDecl {
    pub name: Box<str>,
    pub desc: ExportDesc,
}

#[derive(Debug)]
pub(crate) struct ElementDecl {
    pub ty: ReferenceType,
    pub mode: ElementKind,
    pub items: ElementItemsDecl,
}

#[derive(Debug)]
pub(crate) enum ElementKind {
    Active { table: TableIdx, offset: Range<u32> },
    Passive,
    Declarative,
}

#[derive(Debug)]
pub(crate) enum ElementItemsDecl {
    Functions(Box<[FuncIdx]>),
    Expressions(Box<[Range<u32>]>),
}

impl ElementItemsDecl {
    pub fn len(&self) -> usize {
        match self {
            ElementItemsDecl::Functions(items) => items.len(),
            ElementItemsDecl::Expressions(items) => items.len(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct DataDecl {
    pub mode: DataKind,
    /// Byte range of the payload within the module.
    pub init: Range<u32>,
}

#[derive(Debug)]
pub(crate) enum DataKind {
    Active { offset: Range<u32> },
    Passive,
}

#[derive(Debug, Default)]
pub struct ModuleNames {
    pub(crate) module: Option<Box<str>>,
    pub(crate) functions: HashMap<u32, Box<str>>,
}

#[derive(Debug)]
pub struct CustomSectionDecl {
    pub name: Box<str>,
    pub bytes: Box<[u8]>,
}

impl Module {
    /// Decode and validate a binary module with the default feature set.
    pub fn decode(bytes: impl Into<Box<[u8]>>) -> crate::Result<Self> {
        Self::decode_with_features(bytes, WasmFeatures::default())
    }

    /// Decode and validate a binary module.
    pub fn decode_with_features(
        bytes: impl Into<Box<[u8]>>,
        features: WasmFeatures,
    ) -> crate::Result<Self> {
        let bytes = bytes.into();
        let _span = tracing::debug_span!("decode", len = bytes.len()).entered();

        let mut inner = decode_sections(bytes)?;
        let side_tables = validate::validate_module(&inner, features)?;
        inner.function_end = side_tables.function_end;
        inner.label_end = side_tables.label_end;
        inner.if_else = side_tables.if_else;

        tracing::debug!(
            funcs = inner.functions.len(),
            exports = inner.exports.len(),
            "module decoded"
        );

        Ok(Self {
            inner: Rc::new(inner),
        })
    }

    /// The module name from the `name` custom section, if present.
    pub fn name(&self) -> Option<&str> {
        self.inner.names.module.as_deref()
    }

    /// The exported names and their kinds, in declaration order.
    pub fn exports(&self) -> impl Iterator<Item = (&str, ExportDesc)> {
        self.inner.exports.iter().map(|e| (&*e.name, e.desc))
    }

    /// The declared imports as (module, field) pairs, in declaration order.
    pub fn imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.imports.iter().map(|i| (&*i.module, &*i.field))
    }

    /// Custom sections, retained as raw bytes and never interpreted.
    pub fn custom_sections(&self) -> impl Iterator<Item = &CustomSectionDecl> {
        self.inner.custom_sections.iter()
    }

    pub(crate) fn func_type(&self, func: FuncIdx) -> &FuncType {
        self.inner.func_type(func)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("functions", &self.inner.functions.len())
            .field("exports", &self.inner.exports.len())
            .finish()
    }
}

impl ModuleInner {
    pub fn func_type(&self, func: FuncIdx) -> &FuncType {
        &self.types[self.functions[func].ty().as_u32() as usize]
    }

    pub fn signature(&self, ty: TypeIdx) -> Option<&FuncType> {
        self.types.get(ty.as_u32() as usize)
    }

    pub fn func_name(&self, func: FuncIdx) -> Option<&str> {
        self.names.functions.get(&func.as_u32()).map(|n| &**n)
    }
}

/// Phase one of [`Module::decode`]: read every section into owned form,
/// enforcing section order, count consistency and structural limits.
/// Type-checking and the continuation scan happen afterwards in
/// [`validate::validate_module`].
fn decode_sections(bytes: Box<[u8]>) -> crate::Result<ModuleInner> {
    let mut types: Vec<FuncType> = Vec::new();
    let mut imports: Vec<ImportDecl> = Vec::new();
    let mut func_types: Vec<TypeIdx> = Vec::new();
    let mut own_tables: Vec<TableType> = Vec::new();
    let mut own_memories: Vec<MemoryType> = Vec::new();
    let mut own_globals: Vec<GlobalDecl> = Vec::new();
    let mut exports: Vec<ExportDecl> = Vec::new();
    let mut export_map: HashMap<Box<str>, ExportDesc> = HashMap::new();
    let mut start: Option<FuncIdx> = None;
    let mut elements: Vec<ElementDecl> = Vec::new();
    let mut datas: Vec<DataDecl> = Vec::new();
    let mut data_count: Option<u32> = None;
    let mut bodies: Vec<(Box<[ValueType]>, u32, u32)> = Vec::new();
    let mut names = ModuleNames::default();
    let mut custom_sections: Vec<CustomSectionDecl> = Vec::new();

    let parser = wasmparser::parse_module(&bytes)?;
    let mut last_ordinal = 0u8;

    for section in parser.sections() {
        match section? {
            Section::Custom(custom) => {
                if custom.name == "name" {
                    parse_name_section(custom.bytes, &mut names);
                }
                custom_sections.push(CustomSectionDecl {
                    name: custom.name.into(),
                    bytes: custom.bytes.into(),
                });
            }
            Section::Type(vec) => {
                check_order(&mut last_ordinal, 1)?;
                let mut iter = vec.iter();
                while let Some(ty) = iter.next() {
                    let ty = ty?;
                    let params = collect(ty.params()?.iter())?;
                    let results = collect(ty.results()?.iter())?;
                    types.push(FuncType::new(params, results));
                }
                finish_section(iter)?;
            }
            Section::Import(vec) => {
                check_order(&mut last_ordinal, 2)?;
                let mut iter = vec.iter();
                while let Some(import) = iter.next() {
                    let import = import?;
                    imports.push(ImportDecl {
                        module: import.module.into(),
                        field: import.name.into(),
                        desc: import.desc,
                    });
                }
                finish_section(iter)?;
            }
            Section::Function(vec) => {
                check_order(&mut last_ordinal, 3)?;
                let mut iter = vec.iter();
                while let Some(ty) = iter.next() {
                    func_types.push(ty?);
                }
                finish_section(iter)?;
            }
            Section::Table(vec) => {
                check_order(&mut last_ordinal, 4)?;
                let mut iter = vec.iter();
                while let Some(table) = iter.next() {
                    own_tables.push(table?);
                }
                finish_section(iter)?;
            }
            Section::Memory(vec) => {
                check_order(&mut last_ordinal, 5)?;
                let mut iter = vec.iter();
                while let Some(memory) = iter.next() {
                    own_memories.push(memory?);
                }
                finish_section(iter)?;
            }
            Section::Global(vec) => {
                check_order(&mut last_ordinal, 6)?;
                let mut iter = vec.iter();
                while let Some(global) = iter.next() {
                    let global = global?;
                    own_globals.push(GlobalDecl {
                        ty: global.ty,
                        init: Some(range32(global.init.byte_range())),
                    });
                }
                finish_section(iter)?;
            }
            Section::Export(vec) => {
                check_order(&mut last_ordinal, 7)?;
                let mut iter = vec.iter();
                while let Some(export) = iter.next() {
                    let export = export?;
                    if export_map
                        .insert(export.name.into(), export.desc)
                        .is_some()
                    {
                        return Err(ValidationError::DuplicateExportName.into());
                    }
                    exports.push(ExportDecl {
                        name: export.name.into(),
                        desc: export.desc,
                    });
                }
                finish_section(iter)?;
            }
            Section::Start(func) => {
                if start.is_some() {
                    return Err(wasmparser::Error::MultipleStartSections.into());
                }
                check_order(&mut last_ordinal, 8)?;
                start = Some(func);
            }
            Section::Element(vec) => {
                check_order(&mut last_ordinal, 9)?;
                let mut iter = vec.iter();
                while let Some(element) = iter.next() {
                    let element = element?;
                    let ty = element.items.ty();
                    let mode = match element.mode {
                        ElementMode::Passive => ElementKind::Passive,
                        ElementMode::Declarative => ElementKind::Declarative,
                        ElementMode::Active { table, offset } => ElementKind::Active {
                            table,
                            offset: range32(offset.byte_range()),
                        },
                    };
                    let items = match element.items {
                        ElementItems::Functions(items) => {
                            ElementItemsDecl::Functions(collect(items.iter())?.into_boxed_slice())
                        }
                        ElementItems::Expressions(_, items) => ElementItemsDecl::Expressions(
                            collect(items.iter())?
                                .into_iter()
                                .map(|expr: wasmparser::ConstExpr<'_>| range32(expr.byte_range()))
                                .collect(),
                        ),
                    };
                    elements.push(ElementDecl { ty, mode, items });
                }
                finish_section(iter)?;
            }
            Section::DataCount(count) => {
                check_order(&mut last_ordinal, 10)?;
                data_count = Some(count);
            }
            Section::Code(vec) => {
                check_order(&mut last_ordinal, 11)?;
                let mut iter = vec.iter();
                while let Some(body) = iter.next() {
                    let body = body?;

                    let mut locals = Vec::new();
                    let mut total: u64 = 0;
                    let mut decls = body.locals()?;
                    for entry in &mut decls {
                        let (count, ty) = entry?;
                        total += u64::from(count);
                        if total > u64::from(u32::MAX) || total > MAX_WASM_FUNCTION_LOCALS as u64 {
                            return Err(wasmparser::Error::TooManyLocals.into());
                        }
                        locals.extend(core::iter::repeat_n(ty, count as usize));
                    }

                    let body_start = body.instructions_reader()?.position() as u32;
                    let body_end = body.end() as u32;
                    bodies.push((locals.into_boxed_slice(), body_start, body_end));
                }
                finish_section(iter)?;
            }
            Section::Data(vec) => {
                check_order(&mut last_ordinal, 12)?;
                let mut iter = vec.iter();
                while let Some(data) = iter.next() {
                    let data = data?;
                    let mode = match data.mode {
                        wasmparser::DataMode::Passive => DataKind::Passive,
                        wasmparser::DataMode::Active { offset } => DataKind::Active {
                            offset: range32(offset.byte_range()),
                        },
                    };
                    datas.push(DataDecl {
                        mode,
                        init: range_of(&bytes, data.init),
                    });
                }
                finish_section(iter)?;
            }
        }
    }

    if func_types.len() != bodies.len() {
        return Err(wasmparser::Error::FunctionCodeCountMismatch.into());
    }
    if let Some(count) = data_count
        && count as usize != datas.len()
    {
        return Err(wasmparser::Error::DataCountMismatch.into());
    }

    // Assemble the combined index spaces, imports first.
    let mut functions: PrimaryMap<FuncIdx, FunctionDecl> = PrimaryMap::new();
    let mut tables: Vec<TableType> = Vec::new();
    let mut memories: Vec<MemoryType> = Vec::new();
    let mut globals: Vec<GlobalDecl> = Vec::new();
    for import in imports.iter() {
        match import.desc {
            ImportDesc::Func(ty) => {
                functions.push(FunctionDecl::Imported { ty });
            }
            ImportDesc::Table(ty) => tables.push(ty),
            ImportDesc::Mem(ty) => memories.push(ty),
            ImportDesc::Global(ty) => globals.push(GlobalDecl { ty, init: None }),
        }
    }
    let num_imported_funcs = functions.len() as u32;
    let num_imported_tables = tables.len() as u32;
    let num_imported_memories = memories.len() as u32;
    let num_imported_globals = globals.len() as u32;

    for (ty, (locals, body_start, body_end)) in func_types.into_iter().zip(bodies) {
        functions.push(FunctionDecl::Defined {
            ty,
            locals,
            body_start,
            body_end,
        });
    }
    tables.extend(own_tables);
    memories.extend(own_memories);
    globals.extend(own_globals);

    // The declared-funcref set: anything named outside function bodies.
    let mut declared_funcs: HashSet<FuncIdx> = HashSet::new();
    for i in 0..num_imported_funcs {
        declared_funcs.insert(FuncIdx::from_u32(i));
    }
    for export in &exports {
        if let ExportDesc::Func(func) = export.desc {
            declared_funcs.insert(func);
        }
    }
    for global in &globals {
        if let Some(init) = &global.init {
            scan_ref_funcs(&bytes, init.clone(), &mut declared_funcs)?;
        }
    }
    for element in &elements {
        match &element.items {
            ElementItemsDecl::Functions(items) => declared_funcs.extend(items.iter().copied()),
            ElementItemsDecl::Expressions(items) => {
                for expr in items.iter() {
                    scan_ref_funcs(&bytes, expr.clone(), &mut declared_funcs)?;
                }
            }
        }
    }

    Ok(ModuleInner {
        bytes,
        types: types.into_boxed_slice(),
        imports: imports.into_boxed_slice(),
        functions,
        tables: tables.into_boxed_slice(),
        memories: memories.into_boxed_slice(),
        globals: globals.into_boxed_slice(),
        exports: exports.into_boxed_slice(),
        export_map,
        start,
        elements: elements.into_boxed_slice(),
        datas: datas.into_boxed_slice(),
        data_count,
        num_imported_funcs,
        num_imported_tables,
        num_imported_memories,
        num_imported_globals,
        declared_funcs,
        function_end: HashMap::new(),
        label_end: HashMap::new(),
        if_else: HashMap::new(),
        names,
        custom_sections: custom_sections.into_boxed_slice(),
    })
}

/// Non-custom sections appear at most once and in canonical order; the
/// ordinal encodes that order (data-count sits between element and code).
fn check_order(last_ordinal: &mut u8, ordinal: u8) -> crate::Result<()> {
    if ordinal <= *last_ordinal {
        return Err(wasmparser::Error::OutOfOrderSection.into());
    }
    *last_ordinal = ordinal;
    Ok(())
}

fn finish_section<T>(iter: VecIter<'_, T>) -> crate::Result<()> {
    if !iter.into_reader().done() {
        return Err(wasmparser::Error::SectionSizeMismatch.into());
    }
    Ok(())
}

fn collect<T>(
    iter: impl Iterator<Item = Result<T, wasmparser::Error>>,
) -> Result<Vec<T>, wasmparser::Error> {
    iter.collect()
}

fn range32(range: Range<usize>) -> Range<u32> {
    range.start as u32..range.end as u32
}

/// The absolute byte range of `part` within `bytes`. `part` always is a
/// sub-slice of `bytes` here, so plain address arithmetic is exact.
fn range_of(bytes: &[u8], part: &[u8]) -> Range<u32> {
    let base = bytes.as_ptr() as usize;
    let start = part.as_ptr() as usize - base;
    debug_assert!(start + part.len() <= bytes.len());
    range32(start..start + part.len())
}

fn scan_ref_funcs(
    bytes: &[u8],
    expr: Range<u32>,
    declared: &mut HashSet<FuncIdx>,
) -> crate::Result<()> {
    let mut reader = BinaryReader::new_bounded(bytes, expr.start as usize, expr.end as usize);
    while !reader.done() {
        if let Instruction::RefFunc { function } = reader.read_instruction()? {
            declared.insert(function);
        }
    }
    Ok(())
}

/// The `name` section is diagnostic only: a malformed one is dropped, not
/// an error.
fn parse_name_section(bytes: &[u8], names: &mut ModuleNames) {
    for subsection in NameSectionReader::new(bytes).subsections() {
        match subsection {
            Ok(NameSubsection::Module(name)) => names.module = Some(name.into()),
            Ok(NameSubsection::Function(map)) => {
                for naming in map.iter() {
                    match naming {
                        Ok(naming) => {
                            names.functions.insert(naming.index, naming.name.into());
                        }
                        Err(e) => {
                            tracing::debug!("ignoring malformed function name map: {e}");
                            return;
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("ignoring malformed name section: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // (module (func (block (nop)) (loop) (if (i32.const 0) (nop) (nop))))
    // laid out by hand so the continuation offsets are known
    fn structured_module() -> Vec<u8> {
        let mut bytes = b"\0asm\x01\0\0\0".to_vec();
        // type section: one () -> () signature
        bytes.extend([0x01, 0x04, 0x01, 0x60, 0x00, 0x00]);
        // function section
        bytes.extend([0x03, 0x02, 0x01, 0x00]);
        // code section, one body of 17 bytes
        bytes.extend([0x0A, 0x13, 0x01, 0x11, 0x00]);
        bytes.extend([
            0x02, 0x40, // 23: block
            0x01, // 25: nop
            0x0B, // 26: end (block)
            0x03, 0x40, // 27: loop
            0x0B, // 29: end (loop)
            0x41, 0x00, // 30: i32.const 0
            0x04, 0x40, // 32: if
            0x01, // 34: nop
            0x05, // 35: else
            0x01, // 36: nop
            0x0B, // 37: end (if)
            0x0B, // 38: end (body)
        ]);
        bytes
    }

    #[test]
    fn continuation_tables() {
        let module = Module::decode(structured_module()).unwrap();
        let inner = &module.inner;

        // the body starts right after the (empty) local declarations
        assert_eq!(inner.function_end.get(&23), Some(&38));

        // block and if map to their end; the loop maps to itself
        assert_eq!(inner.label_end.get(&23), Some(&26));
        assert_eq!(inner.label_end.get(&27), Some(&27));
        assert_eq!(inner.label_end.get(&32), Some(&37));
        assert_eq!(inner.label_end.get(&35), Some(&37));

        // the if knows where its else begins
        assert_eq!(inner.if_else.get(&32), Some(&35));
    }

    #[test]
    fn name_section_is_tolerated() {
        let mut bytes = structured_module();
        // custom section "name": module name subsection with name "m"
        bytes.extend([0x00, 0x09, 0x04]);
        bytes.extend(b"name");
        bytes.extend([0x00, 0x02, 0x01]);
        bytes.extend(b"m");

        let module = Module::decode(bytes).unwrap();
        assert_eq!(module.name(), Some("m"));

        // a garbage name payload decodes fine and is simply ignored
        let mut bytes = structured_module();
        bytes.extend([0x00, 0x07, 0x04]);
        bytes.extend(b"name");
        bytes.extend([0x00, 0xFF]);
        let module = Module::decode(bytes).unwrap();
        assert_eq!(module.name(), None);
    }
}
