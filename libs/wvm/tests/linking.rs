// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Import resolution, host functions and cross-module linking.

mod common;

use common::*;
use std::cell::Cell;
use std::rc::Rc;
use wvm::{
    Error, ImportSet, Instance, Module, Trap, UnlinkableError, Val, ValueType,
};

/// `(import "env" "f" (func))` and an export calling it.
fn importer() -> Vec<u8> {
    module(vec![
        type_section(vec![func_type(&[], &[])]),
        import_section(vec![import_entry("env", "f", vec![0x00, 0x00])]),
        func_section(&[0]),
        export_section(vec![export_entry("run", EXPORT_FUNC, 1)]),
        code_section(vec![body(&[], vec![0x10, 0x00, 0x0B])]),
    ])
}

#[test]
fn missing_import_is_unlinkable() {
    let instance = Instance::new(Module::decode(importer()).unwrap());

    let err = instance.instantiate(&[]).unwrap_err();
    assert!(matches!(
        err,
        Error::Unlinkable(UnlinkableError::UnknownImport { .. })
    ));
    assert_eq!(err.to_string(), "unknown import");

    // a set with the right module name but no such field is still missing
    let mut env = ImportSet::new("env");
    env.define_host_func("g", [], [], |_, _| Ok(())).unwrap();
    let err = instance.instantiate(&[env]).unwrap_err();
    assert_eq!(err.to_string(), "unknown import");
}

#[test]
fn signature_mismatch_is_incompatible() {
    let instance = Instance::new(Module::decode(importer()).unwrap());

    let mut env = ImportSet::new("env");
    env.define_host_func("f", [ValueType::I32], [], |_, _| Ok(()))
        .unwrap();

    let err = instance.instantiate(&[env]).unwrap_err();
    assert!(matches!(
        err,
        Error::Unlinkable(UnlinkableError::IncompatibleImportType { .. })
    ));
    assert_eq!(err.to_string(), "incompatible import type");
}

#[test]
fn wrong_kind_is_incompatible() {
    let instance = Instance::new(Module::decode(importer()).unwrap());

    let mut env = ImportSet::new("env");
    env.define(
        "f",
        wvm::Global::new(
            wvm::GlobalType {
                ty: ValueType::I32,
                mutability: wvm::Mutability::Const,
            },
            Val::I32(0),
        )
        .unwrap(),
    )
    .unwrap();

    let err = instance.instantiate(&[env]).unwrap_err();
    assert_eq!(err.to_string(), "incompatible import type");
}

#[test]
fn host_function_runs_and_later_sets_override() {
    let hits = Rc::new(Cell::new(0));

    let mut first = ImportSet::new("env");
    first
        .define_host_func("f", [], [], |_, _| Err(Trap::UnreachableCodeReached))
        .unwrap();

    let mut second = ImportSet::new("env");
    let seen = hits.clone();
    second
        .define_host_func("f", [], [], move |_, _| {
            seen.set(seen.get() + 1);
            Ok(())
        })
        .unwrap();

    let instance = Instance::new(Module::decode(importer()).unwrap());
    // the later set wins
    instance.instantiate(&[first, second]).unwrap();

    instance.invoke("run", &[]).unwrap();
    instance.invoke("run", &[]).unwrap();
    assert_eq!(hits.get(), 2);
}

#[test]
fn host_function_with_values_and_traps() {
    // (import "math" "mul") called by an exported wrapper
    let wasm = module(vec![
        type_section(vec![func_type(&[I32, I32], &[I32])]),
        import_section(vec![import_entry("math", "mul", vec![0x00, 0x00])]),
        func_section(&[0]),
        export_section(vec![export_entry("apply", EXPORT_FUNC, 1)]),
        code_section(vec![body(
            &[],
            vec![0x20, 0x00, 0x20, 0x01, 0x10, 0x00, 0x0B],
        )]),
    ]);

    let mut math = ImportSet::new("math");
    math.define_host_func(
        "mul",
        [ValueType::I32, ValueType::I32],
        [ValueType::I32],
        |params, results| {
            let (a, b) = (params[0].unwrap_i32(), params[1].unwrap_i32());
            if a == 13 {
                return Err(Trap::UnreachableCodeReached);
            }
            results[0] = Val::I32(a.wrapping_mul(b));
            Ok(())
        },
    )
    .unwrap();

    let instance = Instance::new(Module::decode(wasm).unwrap());
    instance.instantiate(&[math]).unwrap();

    let results = instance
        .invoke("apply", &[Val::I32(6), Val::I32(7)])
        .unwrap();
    assert!(results[0].matches(&Val::I32(42)));

    // a trap from the host propagates like a wasm trap
    assert_eq!(
        instance
            .invoke("apply", &[Val::I32(13), Val::I32(1)])
            .unwrap_err(),
        Error::Trap(Trap::UnreachableCodeReached)
    );
}

#[test]
fn exports_feed_a_later_instantiation() {
    // module a: counter global and a bump function
    let a = module(vec![
        type_section(vec![func_type(&[], &[I32])]),
        func_section(&[0]),
        global_section(vec![global_entry(I32, true, i32_const_expr(0))]),
        export_section(vec![export_entry("bump", EXPORT_FUNC, 0)]),
        code_section(vec![body(
            &[],
            vec![
                0x23, 0x00, // global.get 0
                0x41, 0x01, // i32.const 1
                0x6A, // i32.add
                0x24, 0x00, // global.set 0
                0x23, 0x00, // global.get 0
                0x0B, // end
            ],
        )]),
    ]);

    // module b imports a.bump under the registered name
    let b = module(vec![
        type_section(vec![func_type(&[], &[I32])]),
        import_section(vec![import_entry("a", "bump", vec![0x00, 0x00])]),
        func_section(&[0]),
        export_section(vec![export_entry("bump_twice", EXPORT_FUNC, 1)]),
        code_section(vec![body(
            &[],
            vec![
                0x10, 0x00, // call 0
                0x1A, // drop
                0x10, 0x00, // call 0
                0x0B, // end
            ],
        )]),
    ]);

    let instance_a = Instance::new(Module::decode(a).unwrap());
    instance_a.instantiate(&[]).unwrap();

    let instance_b = Instance::new(Module::decode(b).unwrap());
    instance_b.instantiate(&[instance_a.exports("a")]).unwrap();

    // mutations are visible across both instances
    let results = instance_b.invoke("bump_twice", &[]).unwrap();
    assert!(results[0].matches(&Val::I32(2)));
    let results = instance_a.invoke("bump", &[]).unwrap();
    assert!(results[0].matches(&Val::I32(3)));
}

#[test]
fn imported_memory_limits_must_cover() {
    // (import "env" "mem" (memory 2 4))
    let wasm = module(vec![import_section(vec![import_entry(
        "env",
        "mem",
        vec![0x02, 0x01, 0x02, 0x04],
    )])]);

    let mem_ty = |min, max| wvm::MemoryType {
        limits: wvm::Limits { min, max },
    };

    // too small
    let mut env = ImportSet::new("env");
    env.define("mem", wvm::Memory::new(mem_ty(1, Some(4))).unwrap())
        .unwrap();
    let instance = Instance::new(Module::decode(wasm.clone()).unwrap());
    assert_eq!(
        instance.instantiate(&[env]).unwrap_err().to_string(),
        "incompatible import type"
    );

    // unbounded maximum cannot satisfy a declared maximum
    let mut env = ImportSet::new("env");
    env.define("mem", wvm::Memory::new(mem_ty(2, None)).unwrap())
        .unwrap();
    let instance = Instance::new(Module::decode(wasm.clone()).unwrap());
    assert_eq!(
        instance.instantiate(&[env]).unwrap_err().to_string(),
        "incompatible import type"
    );

    // exact fit links
    let mut env = ImportSet::new("env");
    env.define("mem", wvm::Memory::new(mem_ty(2, Some(4))).unwrap())
        .unwrap();
    let instance = Instance::new(Module::decode(wasm).unwrap());
    instance.instantiate(&[env]).unwrap();
}

#[test]
fn duplicate_definition_rejected() {
    let mut env = ImportSet::new("env");
    env.define_host_func("f", [], [], |_, _| Ok(())).unwrap();
    let err = env
        .define_host_func("f", [], [], |_, _| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyDefined { .. }));
}

#[test]
fn start_function_trap_fails_instantiation() {
    let wasm = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        start_section(0),
        code_section(vec![body(&[], vec![0x00, 0x0B])]), // unreachable
    ]);

    let instance = Instance::new(Module::decode(wasm).unwrap());
    assert_eq!(
        instance.instantiate(&[]).unwrap_err(),
        Error::Trap(Trap::UnreachableCodeReached)
    );
    // resources were torn down: no exports, not instantiated
    assert!(instance.get_func("anything").is_none());
}

#[test]
fn active_segment_out_of_bounds_is_uninstantiable() {
    // data segment lands past the single page
    let wasm = module(vec![
        memory_section(1, None),
        data_active(i32_const_expr(65536), b"x"),
    ]);
    let instance = Instance::new(Module::decode(wasm).unwrap());
    let err = instance.instantiate(&[]).unwrap_err();
    assert!(matches!(err, Error::Uninstantiable(_)));
    assert_eq!(err.to_string(), "out of bounds memory access");

    // element segment past the table size
    let wasm = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        table_section(FUNCREF, 1, None),
        elem_active(i32_const_expr(1), &[0]),
        code_section(vec![body(&[], vec![0x0B])]),
    ]);
    let instance = Instance::new(Module::decode(wasm).unwrap());
    let err = instance.instantiate(&[]).unwrap_err();
    assert_eq!(err.to_string(), "out of bounds table access");
}
