// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::errors::ValidationError;
use crate::trap::Trap;
use crate::values::Ref;
use wasmparser::{MAX_WASM_TABLE_ENTRIES, TableType};

/// A WebAssembly table: a typed, resizable vector of references.
#[derive(Debug)]
pub struct Table {
    ty: TableType,
    elements: Vec<Ref>,
}

impl Table {
    /// Allocate a table with `limits.min` copies of `init`.
    pub fn new(ty: TableType, init: Ref) -> crate::Result<Self> {
        if init.ty() != ty.ty {
            return Err(ValidationError::TypeMismatch.into());
        }
        if ty.limits.max.is_some_and(|max| max < ty.limits.min) {
            return Err(ValidationError::LimitsMinExceedsMax.into());
        }
        if ty.limits.min as usize > MAX_WASM_TABLE_ENTRIES {
            return Err(ValidationError::LimitsMinExceedsMax.into());
        }

        Ok(Self {
            elements: vec![init; ty.limits.min as usize],
            ty,
        })
    }

    pub fn ty(&self) -> TableType {
        self.ty
    }

    /// The current size in elements.
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn get(&self, index: u32) -> Result<Ref, Trap> {
        self.elements
            .get(index as usize)
            .cloned()
            .ok_or(Trap::TableOutOfBounds)
    }

    pub fn set(&mut self, index: u32, value: Ref) -> Result<(), Trap> {
        match self.elements.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Trap::TableOutOfBounds),
        }
    }

    /// Grow by `delta` elements filled with `init`, returning the previous
    /// element count, or -1 when the request exceeds the limits.
    pub fn grow(&mut self, delta: u32, init: Ref) -> i32 {
        let prev = self.size();
        let limit = self
            .ty
            .limits
            .max
            .map_or(MAX_WASM_TABLE_ENTRIES as u64, u64::from)
            .min(MAX_WASM_TABLE_ENTRIES as u64);

        let new_size = u64::from(prev) + u64::from(delta);
        if new_size > limit {
            return -1;
        }

        self.elements.resize(new_size as usize, init);
        prev as i32
    }

    /// `table.fill`: bounds are checked up front, a failing fill writes
    /// nothing.
    pub fn fill(&mut self, dst: u64, val: Ref, len: u64) -> Result<(), Trap> {
        let end = dst.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        if end > self.elements.len() as u64 {
            return Err(Trap::TableOutOfBounds);
        }
        self.elements[dst as usize..end as usize].fill(val);
        Ok(())
    }

    /// `table.copy` within this table; overlapping ranges behave like
    /// `memmove`.
    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> Result<(), Trap> {
        let src_end = src.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        let dst_end = dst.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        if src_end > self.elements.len() as u64 || dst_end > self.elements.len() as u64 {
            return Err(Trap::TableOutOfBounds);
        }
        if dst <= src {
            for i in 0..len {
                self.elements[(dst + i) as usize] = self.elements[(src + i) as usize].clone();
            }
        } else {
            for i in (0..len).rev() {
                self.elements[(dst + i) as usize] = self.elements[(src + i) as usize].clone();
            }
        }
        Ok(())
    }

    /// `table.copy` between two distinct tables.
    pub fn copy_from(&mut self, src: &Table, dst: u64, src_idx: u64, len: u64) -> Result<(), Trap> {
        let src_end = src_idx.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        let dst_end = dst.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        if src_end > src.elements.len() as u64 || dst_end > self.elements.len() as u64 {
            return Err(Trap::TableOutOfBounds);
        }
        self.elements[dst as usize..dst_end as usize]
            .clone_from_slice(&src.elements[src_idx as usize..src_end as usize]);
        Ok(())
    }

    /// `table.init` and active element segments: copy `len` refs of `src`
    /// starting at `src_offset` to `dst`.
    pub fn init(&mut self, dst: u64, src: &[Ref], src_offset: u64, len: u64) -> Result<(), Trap> {
        let src_end = src_offset.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        let dst_end = dst.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        if src_end > src.len() as u64 || dst_end > self.elements.len() as u64 {
            return Err(Trap::TableOutOfBounds);
        }
        self.elements[dst as usize..dst_end as usize]
            .clone_from_slice(&src[src_offset as usize..src_end as usize]);
        Ok(())
    }
}
