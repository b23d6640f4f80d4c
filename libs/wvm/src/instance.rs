// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::const_eval::ConstExprEvaluator;
use crate::errors::{Error, UninstantiableError, UnlinkableError};
use crate::func::{Func, FuncInner};
use crate::global::Global;
use crate::interp::Interpreter;
use crate::linker::{Extern, ImportSet};
use crate::memory::Memory;
use crate::module::{DataKind, ElementItemsDecl, ElementKind, ImportDecl, Module};
use crate::table::Table;
use crate::values::{Ref, Val};
use core::cell::{Cell, RefCell};
use core::fmt;
use core::ops::Range;
use hashbrown::HashMap;
use std::rc::Rc;
use wasmparser::{DataIdx, ElemIdx, ExportDesc, FuncIdx, GlobalIdx, ImportDesc, TableIdx};

/// A live instantiation of a [`Module`].
///
/// Created empty by [`Instance::new`], populated by
/// [`Instance::instantiate`]. `Instance` is a cheap handle; clones share
/// the same live state, and any `Func` or table entry handed out keeps
/// that state alive.
#[derive(Clone)]
pub struct Instance {
    pub(crate) inner: Rc<InstanceInner>,
}

#[derive(Debug)]
pub(crate) struct InstanceInner {
    pub module: Module,
    /// The function index space, imports resolved: an entry is either a
    /// function of another instance, a host function, or one of ours.
    pub funcs: RefCell<Vec<Func>>,
    pub tables: RefCell<Vec<Rc<RefCell<Table>>>>,
    pub memories: RefCell<Vec<Rc<RefCell<Memory>>>>,
    pub globals: RefCell<Vec<Rc<RefCell<Global>>>>,
    /// Element segment instances; `None` once dropped (or applied).
    pub elems: RefCell<Vec<Option<Rc<[Ref]>>>>,
    /// Passive data segments as ranges into the module bytes; `None` once
    /// dropped (or applied).
    pub datas: RefCell<Vec<Option<Range<u32>>>>,
    pub exports: RefCell<HashMap<Box<str>, Extern>>,
    pub instantiated: Cell<bool>,
}

impl InstanceInner {
    pub fn func(&self, idx: FuncIdx) -> Func {
        self.funcs.borrow()[idx.as_u32() as usize].clone()
    }

    pub fn table(&self, idx: TableIdx) -> Rc<RefCell<Table>> {
        self.tables.borrow()[idx.as_u32() as usize].clone()
    }

    pub fn memory(&self, idx: u32) -> Rc<RefCell<Memory>> {
        self.memories.borrow()[idx as usize].clone()
    }

    pub fn global(&self, idx: GlobalIdx) -> Rc<RefCell<Global>> {
        self.globals.borrow()[idx.as_u32() as usize].clone()
    }

    pub fn elem(&self, idx: ElemIdx) -> Option<Rc<[Ref]>> {
        self.elems.borrow()[idx.as_u32() as usize].clone()
    }

    /// Dropping an already-dropped segment is a no-op.
    pub fn drop_elem(&self, idx: ElemIdx) {
        self.elems.borrow_mut()[idx.as_u32() as usize] = None;
    }

    pub fn data(&self, idx: DataIdx) -> Option<Range<u32>> {
        self.datas.borrow()[idx.as_u32() as usize].clone()
    }

    /// Dropping an already-dropped segment is a no-op.
    pub fn drop_data(&self, idx: DataIdx) {
        self.datas.borrow_mut()[idx.as_u32() as usize] = None;
    }
}

impl Instance {
    /// Create an uninstantiated instance of `module`. Until
    /// [`instantiate`][Instance::instantiate] succeeds it has no exports.
    pub fn new(module: Module) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                module,
                funcs: RefCell::new(Vec::new()),
                tables: RefCell::new(Vec::new()),
                memories: RefCell::new(Vec::new()),
                globals: RefCell::new(Vec::new()),
                elems: RefCell::new(Vec::new()),
                datas: RefCell::new(Vec::new()),
                exports: RefCell::new(HashMap::new()),
                instantiated: Cell::new(false),
            }),
        }
    }

    pub fn module(&self) -> &Module {
        &self.inner.module
    }

    /// Link the module's imports against `imports` (later sets override
    /// earlier ones), allocate and initialize tables, memories and
    /// globals, apply element and data segments, build the export table
    /// and run the start function.
    ///
    /// On failure every partially-allocated resource is released before
    /// returning.
    pub fn instantiate(&self, imports: &[ImportSet]) -> crate::Result<()> {
        if self.inner.instantiated.get() {
            return Err(Error::AlreadyInstantiated);
        }

        let result = self.instantiate_inner(imports);
        match &result {
            Ok(()) => self.inner.instantiated.set(true),
            Err(e) => {
                tracing::debug!("instantiation failed: {e}");
                self.teardown();
            }
        }
        result
    }

    fn instantiate_inner(&self, imports: &[ImportSet]) -> crate::Result<()> {
        let module = self.inner.module.inner.clone();
        let _span = tracing::debug_span!("instantiate", name = module.names.module.as_deref())
            .entered();

        // Resolve and type-check the declared imports.
        let mut funcs: Vec<Func> = Vec::new();
        let mut tables: Vec<Rc<RefCell<Table>>> = Vec::new();
        let mut memories: Vec<Rc<RefCell<Memory>>> = Vec::new();
        let mut globals: Vec<Rc<RefCell<Global>>> = Vec::new();

        for import in &module.imports {
            let ext = resolve_import(imports, import)?;
            match (&ext, &import.desc) {
                (Extern::Func(func), ImportDesc::Func(ty)) => {
                    let expected = module.signature(*ty).expect("validated type index");
                    if func.ty() != *expected {
                        return Err(incompatible(import));
                    }
                    funcs.push(func.clone());
                }
                (Extern::Table(table), ImportDesc::Table(want)) => {
                    let (ty, size) = {
                        let table = table.borrow();
                        (table.ty(), table.size())
                    };
                    if ty.ty != want.ty
                        || !limits_cover(size, ty.limits.max, want.limits.min, want.limits.max)
                    {
                        return Err(incompatible(import));
                    }
                    tables.push(table.clone());
                }
                (Extern::Memory(memory), ImportDesc::Mem(want)) => {
                    let (ty, size) = {
                        let memory = memory.borrow();
                        (memory.ty(), memory.size())
                    };
                    if !limits_cover(size, ty.limits.max, want.limits.min, want.limits.max) {
                        return Err(incompatible(import));
                    }
                    memories.push(memory.clone());
                }
                (Extern::Global(global), ImportDesc::Global(want)) => {
                    if global.borrow().ty() != *want {
                        return Err(incompatible(import));
                    }
                    globals.push(global.clone());
                }
                _ => return Err(incompatible(import)),
            }
        }

        // Allocate our own functions, tables and memories. The function
        // vector must be complete before constant expressions run because
        // `ref.func` may name any function.
        for idx in module.num_imported_funcs..module.functions.len() as u32 {
            funcs.push(Func {
                inner: FuncInner::Wasm {
                    instance: self.inner.clone(),
                    index: FuncIdx::from_u32(idx),
                },
            });
        }
        for ty in &module.tables[module.num_imported_tables as usize..] {
            tables.push(Rc::new(RefCell::new(Table::new(*ty, Ref::null(ty.ty))?)));
        }
        for ty in &module.memories[module.num_imported_memories as usize..] {
            memories.push(Rc::new(RefCell::new(Memory::new(*ty)?)));
        }

        self.inner.funcs.replace(funcs);
        self.inner.tables.replace(tables);
        self.inner.memories.replace(memories);
        self.inner.globals.replace(globals);

        // Initialize our own globals; later entries may read imported ones.
        let mut const_eval = ConstExprEvaluator::default();
        for decl in &module.globals[module.num_imported_globals as usize..] {
            let init = decl.init.as_ref().expect("defined global has initializer");
            let value = const_eval.eval(&self.inner, init.clone())?;
            self.inner
                .globals
                .borrow_mut()
                .push(Rc::new(RefCell::new(Global::new(decl.ty, value)?)));
        }

        // Element segments: evaluate all items, apply the active ones.
        let mut elems: Vec<Option<Rc<[Ref]>>> = Vec::with_capacity(module.elements.len());
        for element in &module.elements {
            let items: Rc<[Ref]> = match &element.items {
                ElementItemsDecl::Functions(items) => items
                    .iter()
                    .map(|func| Ref::Func(Some(self.inner.func(*func))))
                    .collect(),
                ElementItemsDecl::Expressions(items) => {
                    let mut refs = Vec::with_capacity(items.len());
                    for expr in items.iter() {
                        let value = const_eval.eval(&self.inner, expr.clone())?;
                        refs.push(Ref::try_from(value)?);
                    }
                    refs.into()
                }
            };

            match &element.mode {
                ElementKind::Active { table, offset } => {
                    let offset = const_eval.eval(&self.inner, offset.clone())?.unwrap_i32();
                    let table = self.inner.table(*table);
                    table
                        .borrow_mut()
                        .init(
                            u64::from(offset as u32),
                            &items,
                            0,
                            items.len() as u64,
                        )
                        .map_err(|_| UninstantiableError::OutOfBoundsTableAccess)?;
                    elems.push(None);
                }
                ElementKind::Declarative => elems.push(None),
                ElementKind::Passive => elems.push(Some(items)),
            }
        }
        self.inner.elems.replace(elems);

        // Data segments, same shape.
        let mut datas: Vec<Option<Range<u32>>> = Vec::with_capacity(module.datas.len());
        for data in &module.datas {
            match &data.mode {
                DataKind::Active { offset } => {
                    let offset = const_eval.eval(&self.inner, offset.clone())?.unwrap_i32();
                    let payload = &module.bytes[data.init.start as usize..data.init.end as usize];
                    let memory = self.inner.memory(0);
                    memory
                        .borrow_mut()
                        .init(u64::from(offset as u32), payload, 0, payload.len() as u64)
                        .map_err(|_| UninstantiableError::OutOfBoundsMemoryAccess)?;
                    datas.push(None);
                }
                DataKind::Passive => datas.push(Some(data.init.clone())),
            }
        }
        self.inner.datas.replace(datas);

        // The export table.
        let mut exports: HashMap<Box<str>, Extern> = HashMap::new();
        for export in &module.exports {
            let ext = match export.desc {
                ExportDesc::Func(idx) => Extern::Func(self.inner.func(idx)),
                ExportDesc::Table(idx) => Extern::Table(self.inner.table(idx)),
                ExportDesc::Mem(idx) => Extern::Memory(self.inner.memory(idx.as_u32())),
                ExportDesc::Global(idx) => Extern::Global(self.inner.global(idx)),
            };
            exports.insert(export.name.clone(), ext);
        }
        self.inner.exports.replace(exports);

        // Finally the start function; a trap here fails instantiation.
        if let Some(start) = module.start {
            let func = self.inner.func(start);
            Interpreter::new().invoke(&func, &[])?;
        }

        Ok(())
    }

    fn teardown(&self) {
        self.inner.funcs.take();
        self.inner.tables.take();
        self.inner.memories.take();
        self.inner.globals.take();
        self.inner.elems.take();
        self.inner.datas.take();
        self.inner.exports.take();
    }

    /// Call the exported function `name`.
    ///
    /// On success the returned buffer carries exactly the export's
    /// declared result arity.
    pub fn invoke(&self, name: &str, params: &[Val]) -> crate::Result<Box<[Val]>> {
        let func = self.get_func(name).ok_or_else(|| Error::UnknownExport {
            name: name.into(),
        })?;
        func.call(params)
    }

    /// Look up an exported function.
    pub fn get_func(&self, name: &str) -> Option<Func> {
        match self.inner.exports.borrow().get(name) {
            Some(Extern::Func(func)) => Some(func.clone()),
            _ => None,
        }
    }

    /// Read the value of the exported global `name`.
    pub fn get_global(&self, name: &str) -> crate::Result<Val> {
        match self.inner.exports.borrow().get(name) {
            Some(Extern::Global(global)) => Ok(global.borrow().get()),
            _ => Err(Error::UnknownExport { name: name.into() }),
        }
    }

    /// Wrap this instance's exports as an import set under `as_module`,
    /// suitable for instantiating a later module against.
    pub fn exports(&self, as_module: &str) -> ImportSet {
        ImportSet::from_map(as_module, self.inner.exports.borrow().clone())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("module", &self.inner.module)
            .field("instantiated", &self.inner.instantiated.get())
            .finish()
    }
}

/// Search the provided sets back to front for (module, field). A name
/// match of the wrong kind is an incompatibility, not a missing import.
fn resolve_import(sets: &[ImportSet], import: &ImportDecl) -> Result<Extern, UnlinkableError> {
    for set in sets.iter().rev() {
        if set.module() != &*import.module {
            continue;
        }
        if let Some(ext) = set.get(&import.field) {
            if ext.kind_matches(&import.desc) {
                return Ok(ext.clone());
            }
            return Err(UnlinkableError::IncompatibleImportType {
                module: import.module.clone().into(),
                field: import.field.clone().into(),
            });
        }
    }
    Err(UnlinkableError::UnknownImport {
        module: import.module.clone().into(),
        field: import.field.clone().into(),
    })
}

fn incompatible(import: &ImportDecl) -> Error {
    UnlinkableError::IncompatibleImportType {
        module: import.module.clone().into(),
        field: import.field.clone().into(),
    }
    .into()
}

/// Import limits match when the provided current size covers the declared
/// minimum and the provided maximum does not exceed the declared one
/// (when declared).
fn limits_cover(
    provided_size: u32,
    provided_max: Option<u32>,
    want_min: u32,
    want_max: Option<u32>,
) -> bool {
    if provided_size < want_min {
        return false;
    }
    match want_max {
        None => true,
        Some(want_max) => provided_max.is_some_and(|provided| provided <= want_max),
    }
}
