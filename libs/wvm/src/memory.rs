// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::errors::ValidationError;
use crate::trap::Trap;
use crate::{WASM_MAX_PAGES, WASM_PAGE_SIZE};
use wasmparser::MemoryType;

/// A WebAssembly linear memory: a page-granular, resizable byte buffer.
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    maximum: Option<u32>,
    ty: MemoryType,
}

impl Memory {
    /// Allocate a memory with `limits.min` zeroed pages.
    pub fn new(ty: MemoryType) -> crate::Result<Self> {
        let limits = ty.limits;
        if u64::from(limits.min) > WASM_MAX_PAGES
            || limits.max.is_some_and(|max| u64::from(max) > WASM_MAX_PAGES)
        {
            return Err(ValidationError::MemoryMaxPagesExceeded.into());
        }
        if limits.max.is_some_and(|max| max < limits.min) {
            return Err(ValidationError::LimitsMinExceedsMax.into());
        }

        Ok(Self {
            data: vec![0; limits.min as usize * WASM_PAGE_SIZE],
            maximum: limits.max,
            ty,
        })
    }

    pub fn ty(&self) -> MemoryType {
        self.ty
    }

    /// The current size in pages.
    pub fn size(&self) -> u32 {
        (self.data.len() / WASM_PAGE_SIZE) as u32
    }

    /// The current size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Grow by `delta` pages, returning the previous page count, or -1 when
    /// the request exceeds the limits.
    pub fn grow(&mut self, delta: u32) -> i32 {
        let prev = self.size();
        let limit = u64::from(self.maximum.unwrap_or(WASM_MAX_PAGES as u32)).min(WASM_MAX_PAGES);

        let new_size = u64::from(prev) + u64::from(delta);
        if new_size > limit {
            return -1;
        }

        self.data.resize(new_size as usize * WASM_PAGE_SIZE, 0);
        prev as i32
    }

    /// Read `len` bytes at `addr`.
    pub fn load(&self, addr: u64, len: usize) -> Result<&[u8], Trap> {
        let end = addr.checked_add(len as u64).ok_or(Trap::MemoryOutOfBounds)?;
        if end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        Ok(&self.data[addr as usize..addr as usize + len])
    }

    /// Write `bytes` at `addr`.
    pub fn store(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Trap> {
        let end = addr
            .checked_add(bytes.len() as u64)
            .ok_or(Trap::MemoryOutOfBounds)?;
        if end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        self.data[addr as usize..addr as usize + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// `memory.fill`: bounds are checked up front, a failing fill writes
    /// nothing.
    pub fn fill(&mut self, dst: u64, val: u8, len: u64) -> Result<(), Trap> {
        let end = dst.checked_add(len).ok_or(Trap::MemoryOutOfBounds)?;
        if end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        self.data[dst as usize..end as usize].fill(val);
        Ok(())
    }

    /// `memory.copy` within this memory; overlapping ranges behave like
    /// `memmove`.
    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> Result<(), Trap> {
        let src_end = src.checked_add(len).ok_or(Trap::MemoryOutOfBounds)?;
        let dst_end = dst.checked_add(len).ok_or(Trap::MemoryOutOfBounds)?;
        if src_end > self.data.len() as u64 || dst_end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        self.data
            .copy_within(src as usize..src_end as usize, dst as usize);
        Ok(())
    }

    /// `memory.init` and active data segments: copy `len` bytes of `src`
    /// starting at `src_offset` to `dst`.
    pub fn init(&mut self, dst: u64, src: &[u8], src_offset: u64, len: u64) -> Result<(), Trap> {
        let src_end = src_offset.checked_add(len).ok_or(Trap::MemoryOutOfBounds)?;
        let dst_end = dst.checked_add(len).ok_or(Trap::MemoryOutOfBounds)?;
        if src_end > src.len() as u64 || dst_end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        self.data[dst as usize..dst_end as usize]
            .copy_from_slice(&src[src_offset as usize..src_end as usize]);
        Ok(())
    }
}
