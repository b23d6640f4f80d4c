// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::func::Func;
use crate::global::Global;
use crate::memory::Memory;
use crate::table::Table;
use crate::trap::Trap;
use crate::types::FuncType;
use crate::values::Val;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use std::cell::RefCell;
use std::rc::Rc;
use wasmparser::{ImportDesc, ValueType};

/// Anything that can satisfy an import or be pulled out of an instance's
/// exports.
#[derive(Debug, Clone)]
pub enum Extern {
    Func(Func),
    Table(Rc<RefCell<Table>>),
    Memory(Rc<RefCell<Memory>>),
    Global(Rc<RefCell<Global>>),
}

impl Extern {
    /// Does this definition have the kind an import descriptor asks for?
    pub(crate) fn kind_matches(&self, desc: &ImportDesc) -> bool {
        matches!(
            (self, desc),
            (Extern::Func(_), ImportDesc::Func(_))
                | (Extern::Table(_), ImportDesc::Table(_))
                | (Extern::Memory(_), ImportDesc::Mem(_))
                | (Extern::Global(_), ImportDesc::Global(_))
        )
    }
}

impl From<Func> for Extern {
    fn from(func: Func) -> Self {
        Extern::Func(func)
    }
}

impl From<Table> for Extern {
    fn from(table: Table) -> Self {
        Extern::Table(Rc::new(RefCell::new(table)))
    }
}

impl From<Rc<RefCell<Table>>> for Extern {
    fn from(table: Rc<RefCell<Table>>) -> Self {
        Extern::Table(table)
    }
}

impl From<Memory> for Extern {
    fn from(memory: Memory) -> Self {
        Extern::Memory(Rc::new(RefCell::new(memory)))
    }
}

impl From<Rc<RefCell<Memory>>> for Extern {
    fn from(memory: Rc<RefCell<Memory>>) -> Self {
        Extern::Memory(memory)
    }
}

impl From<Global> for Extern {
    fn from(global: Global) -> Self {
        Extern::Global(Rc::new(RefCell::new(global)))
    }
}

impl From<Rc<RefCell<Global>>> for Extern {
    fn from(global: Rc<RefCell<Global>>) -> Self {
        Extern::Global(global)
    }
}

/// A named collection of definitions offered to
/// [`Instance::instantiate`][crate::Instance::instantiate] under one
/// module name.
///
/// Instantiation searches the provided import sets back to front, so a
/// later set overrides an earlier one defining the same name.
#[derive(Debug)]
pub struct ImportSet {
    module: Box<str>,
    map: HashMap<Box<str>, Extern>,
}

impl ImportSet {
    pub fn new(module: impl Into<Box<str>>) -> Self {
        Self {
            module: module.into(),
            map: HashMap::new(),
        }
    }

    /// The module name imports resolve against.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Add a definition under `field`.
    ///
    /// # Errors
    ///
    /// Fails when `field` is already defined in this set.
    pub fn define(
        &mut self,
        field: impl Into<Box<str>>,
        def: impl Into<Extern>,
    ) -> crate::Result<&mut Self> {
        let field = field.into();
        match self.map.entry(field) {
            Entry::Occupied(entry) => Err(crate::Error::AlreadyDefined {
                module: self.module.clone().into(),
                field: entry.key().clone().into(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(def.into());
                Ok(self)
            }
        }
    }

    /// Add a host function under `field`. State the host wants available
    /// inside the callback is captured by the closure.
    pub fn define_host_func(
        &mut self,
        field: impl Into<Box<str>>,
        params: impl IntoIterator<Item = ValueType>,
        results: impl IntoIterator<Item = ValueType>,
        callback: impl Fn(&[Val], &mut [Val]) -> Result<(), Trap> + 'static,
    ) -> crate::Result<&mut Self> {
        let func = Func::wrap(FuncType::new(params, results), callback);
        self.define(field, func)
    }

    /// Look up a definition by field name.
    pub fn get(&self, field: &str) -> Option<&Extern> {
        self.map.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn from_map(module: impl Into<Box<str>>, map: HashMap<Box<str>, Extern>) -> Self {
        Self {
            module: module.into(),
            map,
        }
    }
}
