//! A minimal binary-module builder for tests.
//!
//! Just enough encoding to write the modules the tests need, with the
//! section and opcode bytes spelled out at the call sites.

#![allow(dead_code)]

pub const I32: u8 = 0x7F;
pub const I64: u8 = 0x7E;
pub const F32: u8 = 0x7D;
pub const F64: u8 = 0x7C;
pub const FUNCREF: u8 = 0x70;
pub const EXTERNREF: u8 = 0x6F;

pub fn uleb(mut n: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (n & 0x7F) as u8;
        n >>= 7;
        if n == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

pub fn sleb32(v: i32) -> Vec<u8> {
    sleb64(v as i64)
}

pub fn sleb64(mut v: i64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        let done = (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

pub fn name(s: &str) -> Vec<u8> {
    let mut out = uleb(s.len() as u64);
    out.extend_from_slice(s.as_bytes());
    out
}

/// Assemble a module: header plus the given (already-framed) sections.
pub fn module(sections: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = b"\0asm\x01\0\0\0".to_vec();
    for section in sections {
        out.extend(section);
    }
    out
}

pub fn section(id: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = vec![id];
    out.extend(uleb(payload.len() as u64));
    out.extend(payload);
    out
}

/// A count-prefixed vector payload.
pub fn vec_payload(items: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = uleb(items.len() as u64);
    for item in items {
        out.extend(item);
    }
    out
}

pub fn func_type(params: &[u8], results: &[u8]) -> Vec<u8> {
    let mut out = vec![0x60];
    out.extend(uleb(params.len() as u64));
    out.extend_from_slice(params);
    out.extend(uleb(results.len() as u64));
    out.extend_from_slice(results);
    out
}

pub fn type_section(types: Vec<Vec<u8>>) -> Vec<u8> {
    section(1, vec_payload(types))
}

pub fn import_entry(module: &str, field: &str, desc: Vec<u8>) -> Vec<u8> {
    let mut out = name(module);
    out.extend(name(field));
    out.extend(desc);
    out
}

pub fn import_section(imports: Vec<Vec<u8>>) -> Vec<u8> {
    section(2, vec_payload(imports))
}

pub fn func_section(type_indices: &[u32]) -> Vec<u8> {
    section(
        3,
        vec_payload(
            type_indices
                .iter()
                .map(|idx| uleb(u64::from(*idx)))
                .collect(),
        ),
    )
}

pub fn limits(min: u32, max: Option<u32>) -> Vec<u8> {
    let mut out = Vec::new();
    match max {
        None => {
            out.push(0x00);
            out.extend(uleb(u64::from(min)));
        }
        Some(max) => {
            out.push(0x01);
            out.extend(uleb(u64::from(min)));
            out.extend(uleb(u64::from(max)));
        }
    }
    out
}

pub fn table_section(ty: u8, min: u32, max: Option<u32>) -> Vec<u8> {
    let mut entry = vec![ty];
    entry.extend(limits(min, max));
    section(4, vec_payload(vec![entry]))
}

pub fn memory_section(min: u32, max: Option<u32>) -> Vec<u8> {
    section(5, vec_payload(vec![limits(min, max)]))
}

/// A global entry: value type, mutability, init expression (with `end`).
pub fn global_entry(ty: u8, mutable: bool, init: Vec<u8>) -> Vec<u8> {
    let mut out = vec![ty, u8::from(mutable)];
    out.extend(init);
    out
}

pub fn global_section(globals: Vec<Vec<u8>>) -> Vec<u8> {
    section(6, vec_payload(globals))
}

pub const EXPORT_FUNC: u8 = 0x00;
pub const EXPORT_TABLE: u8 = 0x01;
pub const EXPORT_MEM: u8 = 0x02;
pub const EXPORT_GLOBAL: u8 = 0x03;

pub fn export_entry(field: &str, kind: u8, idx: u32) -> Vec<u8> {
    let mut out = name(field);
    out.push(kind);
    out.extend(uleb(u64::from(idx)));
    out
}

pub fn export_section(exports: Vec<Vec<u8>>) -> Vec<u8> {
    section(7, vec_payload(exports))
}

pub fn start_section(func: u32) -> Vec<u8> {
    section(8, uleb(u64::from(func)))
}

/// An active element segment (variant 0): offset expression plus function
/// indices, targeting table 0.
pub fn elem_active(offset: Vec<u8>, funcs: &[u32]) -> Vec<u8> {
    let mut entry = vec![0x00];
    entry.extend(offset);
    entry.extend(vec_payload(
        funcs.iter().map(|f| uleb(u64::from(*f))).collect(),
    ));
    section(9, vec_payload(vec![entry]))
}

/// A function body: local declaration groups plus code (which must
/// include the trailing `end`), framed with its byte size.
pub fn body(locals: &[(u32, u8)], code: Vec<u8>) -> Vec<u8> {
    let mut inner = uleb(locals.len() as u64);
    for (count, ty) in locals {
        inner.extend(uleb(u64::from(*count)));
        inner.push(*ty);
    }
    inner.extend(code);

    let mut out = uleb(inner.len() as u64);
    out.extend(inner);
    out
}

pub fn code_section(bodies: Vec<Vec<u8>>) -> Vec<u8> {
    section(10, vec_payload(bodies))
}

/// An active data segment (variant 0) targeting memory 0.
pub fn data_active(offset: Vec<u8>, bytes: &[u8]) -> Vec<u8> {
    let mut entry = vec![0x00];
    entry.extend(offset);
    entry.extend(uleb(bytes.len() as u64));
    entry.extend_from_slice(bytes);
    section(11, vec_payload(vec![entry]))
}

/// `i32.const <v>; end`, the most common init expression.
pub fn i32_const_expr(v: i32) -> Vec<u8> {
    let mut out = vec![0x41];
    out.extend(sleb32(v));
    out.push(0x0B);
    out
}
