// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end execution: decode, instantiate, invoke.

mod common;

use common::*;
use wvm::{Error, Instance, Module, Trap, Val};

fn instantiate(bytes: Vec<u8>) -> Instance {
    let module = Module::decode(bytes).expect("decode");
    let instance = Instance::new(module);
    instance.instantiate(&[]).expect("instantiate");
    instance
}

fn invoke_i32(instance: &Instance, export: &str, params: &[i32]) -> Result<Vec<i32>, Error> {
    let params: Vec<Val> = params.iter().map(|v| Val::I32(*v)).collect();
    let results = instance.invoke(export, &params)?;
    Ok(results.iter().map(|v| v.unwrap_i32()).collect())
}

#[test]
fn add_one() {
    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[I32], &[I32])]),
        func_section(&[0]),
        export_section(vec![export_entry("add_one", EXPORT_FUNC, 0)]),
        code_section(vec![body(
            &[],
            vec![
                0x20, 0x00, // local.get 0
                0x41, 0x01, // i32.const 1
                0x6A, // i32.add
                0x0B, // end
            ],
        )]),
    ]));

    assert_eq!(invoke_i32(&instance, "add_one", &[5]).unwrap(), vec![6]);
    assert_eq!(invoke_i32(&instance, "add_one", &[-1]).unwrap(), vec![0]);
}

#[test]
fn recursive_factorial() {
    // fac(n) = if n == 0 { 1 } else { n * fac(n - 1) }
    let mut code = vec![
        0x20, 0x00, // local.get 0
        0x45, // i32.eqz
        0x04, I32, // if (result i32)
        0x41, 0x01, // i32.const 1
        0x05, // else
        0x20, 0x00, // local.get 0
        0x20, 0x00, // local.get 0
        0x41, 0x01, // i32.const 1
        0x6B, // i32.sub
        0x10, 0x00, // call 0
        0x6C, // i32.mul
        0x0B, // end (if)
    ];
    code.push(0x0B); // end (body)

    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[I32], &[I32])]),
        func_section(&[0]),
        export_section(vec![export_entry("fac", EXPORT_FUNC, 0)]),
        code_section(vec![body(&[], code)]),
    ]));

    assert_eq!(invoke_i32(&instance, "fac", &[0]).unwrap(), vec![1]);
    assert_eq!(invoke_i32(&instance, "fac", &[5]).unwrap(), vec![120]);
    assert_eq!(invoke_i32(&instance, "fac", &[10]).unwrap(), vec![3628800]);
}

#[test]
fn br_table_fallback() {
    let mut code = vec![
        0x02, 0x40, // block            ;; depth 1 from inside
        0x02, 0x40, // block            ;; depth 0 from inside
        0x20, 0x00, // local.get 0
        0x0E, 0x04, 0x00, 0x01, 0x00, 0x01, // br_table [0 1 0 1]
        0x00, // default 0
        0x0B, // end (inner)
    ];
    code.push(0x41);
    code.extend(sleb32(0x1337)); // i32.const 0x1337
    code.extend([0x0F, 0x0B]); // return; end (outer)
    code.push(0x41);
    code.extend(sleb32(0xBEEF)); // i32.const 0xBEEF
    code.push(0x0B); // end (body)

    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[I32], &[I32])]),
        func_section(&[0]),
        export_section(vec![export_entry("pick", EXPORT_FUNC, 0)]),
        code_section(vec![body(&[], code)]),
    ]));

    assert_eq!(invoke_i32(&instance, "pick", &[0]).unwrap(), vec![0x1337]);
    assert_eq!(invoke_i32(&instance, "pick", &[1]).unwrap(), vec![0xBEEF]);
    assert_eq!(invoke_i32(&instance, "pick", &[2]).unwrap(), vec![0x1337]);
    assert_eq!(invoke_i32(&instance, "pick", &[3]).unwrap(), vec![0xBEEF]);
    // out of range hits the fallback, which is target 0
    assert_eq!(invoke_i32(&instance, "pick", &[9]).unwrap(), vec![0x1337]);
}

#[test]
fn if_else_arms() {
    // one body per condition: then-arm doubles, else-arm adds two
    let arm = |cond: u8| {
        let mut code = vec![
            0x41, cond, // i32.const <cond>
            0x04, I32, // if (result i32)
            0x20, 0x00, // local.get 0
            0x41, 0x02, // i32.const 2
            0x6C, // i32.mul
            0x05, // else
            0x20, 0x00, // local.get 0
            0x41, 0x02, // i32.const 2
            0x6A, // i32.add
            0x0B, // end (if)
        ];
        code.push(0x0B);
        body(&[], code)
    };

    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[I32], &[I32])]),
        func_section(&[0, 0]),
        export_section(vec![
            export_entry("taken", EXPORT_FUNC, 0),
            export_entry("not_taken", EXPORT_FUNC, 1),
        ]),
        code_section(vec![arm(1), arm(0)]),
    ]));

    assert_eq!(
        invoke_i32(&instance, "taken", &[0x1337]).unwrap(),
        vec![0x266E]
    );
    assert_eq!(
        invoke_i32(&instance, "not_taken", &[0x1337]).unwrap(),
        vec![0x1339]
    );
}

#[test]
fn loop_with_branches() {
    // sum(n) = 1 + 2 + ... + n, one loop, exit through br_if
    let code = vec![
        0x02, 0x40, // block
        0x03, 0x40, // loop
        0x20, 0x02, // local.get $i
        0x20, 0x00, // local.get $n
        0x4E, // i32.ge_s
        0x0D, 0x01, // br_if 1 (exit the block)
        0x20, 0x02, // local.get $i
        0x41, 0x01, // i32.const 1
        0x6A, // i32.add
        0x22, 0x02, // local.tee $i
        0x20, 0x01, // local.get $acc
        0x6A, // i32.add
        0x21, 0x01, // local.set $acc
        0x0C, 0x00, // br 0 (continue the loop)
        0x0B, // end (loop)
        0x0B, // end (block)
        0x20, 0x01, // local.get $acc
        0x0B, // end (body)
    ];

    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[I32], &[I32])]),
        func_section(&[0]),
        export_section(vec![export_entry("sum", EXPORT_FUNC, 0)]),
        code_section(vec![body(&[(2, I32)], code)]),
    ]));

    assert_eq!(invoke_i32(&instance, "sum", &[0]).unwrap(), vec![0]);
    assert_eq!(invoke_i32(&instance, "sum", &[5]).unwrap(), vec![15]);
    assert_eq!(invoke_i32(&instance, "sum", &[100]).unwrap(), vec![5050]);
}

#[test]
fn divide_traps() {
    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[I32, I32], &[I32])]),
        func_section(&[0]),
        export_section(vec![export_entry("div", EXPORT_FUNC, 0)]),
        code_section(vec![body(
            &[],
            vec![
                0x20, 0x00, // local.get 0
                0x20, 0x01, // local.get 1
                0x6D, // i32.div_s
                0x0B, // end
            ],
        )]),
    ]));

    assert_eq!(invoke_i32(&instance, "div", &[7, 2]).unwrap(), vec![3]);
    assert_eq!(invoke_i32(&instance, "div", &[-7, 2]).unwrap(), vec![-3]);

    let err = invoke_i32(&instance, "div", &[1, 0]).unwrap_err();
    assert_eq!(err, Error::Trap(Trap::IntegerDivisionByZero));
    assert_eq!(err.to_string(), "integer divide by zero");

    let err = invoke_i32(&instance, "div", &[i32::MIN, -1]).unwrap_err();
    assert_eq!(err, Error::Trap(Trap::IntegerOverflow));
    assert_eq!(err.to_string(), "integer overflow");
}

#[test]
fn unreachable_traps() {
    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        export_section(vec![export_entry("boom", EXPORT_FUNC, 0)]),
        code_section(vec![body(&[], vec![0x00, 0x0B])]),
    ]));

    assert_eq!(
        instance.invoke("boom", &[]).unwrap_err(),
        Error::Trap(Trap::UnreachableCodeReached)
    );
}

#[test]
fn runaway_recursion_exhausts_the_stack() {
    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        export_section(vec![export_entry("spin", EXPORT_FUNC, 0)]),
        code_section(vec![body(&[], vec![0x10, 0x00, 0x0B])]),
    ]));

    let err = instance.invoke("spin", &[]).unwrap_err();
    assert_eq!(err, Error::Trap(Trap::StackExhausted));
    assert_eq!(err.to_string(), "call stack exhausted");
}

#[test]
fn multi_value_results() {
    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[], &[I32, I32])]),
        func_section(&[0]),
        export_section(vec![export_entry("pair", EXPORT_FUNC, 0)]),
        code_section(vec![body(
            &[],
            vec![
                0x41, 0x01, // i32.const 1
                0x41, 0x02, // i32.const 2
                0x0B, // end
            ],
        )]),
    ]));

    assert_eq!(invoke_i32(&instance, "pair", &[]).unwrap(), vec![1, 2]);
}

#[test]
fn call_indirect_dispatch() {
    // table: [ret10, ret20, wrong_sig, null]
    let ret = |v: i32| {
        let mut code = vec![0x41];
        code.extend(sleb32(v));
        code.push(0x0B);
        body(&[], code)
    };

    let instance = instantiate(module(vec![
        type_section(vec![
            func_type(&[], &[I32]),
            func_type(&[I32], &[I32]),
        ]),
        func_section(&[0, 0, 1, 1]),
        table_section(FUNCREF, 4, None),
        export_section(vec![export_entry("dispatch", EXPORT_FUNC, 3)]),
        elem_active(i32_const_expr(0), &[0, 1, 2]),
        code_section(vec![
            ret(10),
            ret(20),
            body(&[], vec![0x20, 0x00, 0x0B]), // identity, type 1
            // dispatch(i) = call_indirect (type 0) table[i]
            body(
                &[],
                vec![
                    0x20, 0x00, // local.get 0
                    0x11, 0x00, 0x00, // call_indirect (type 0) (table 0)
                    0x0B, // end
                ],
            ),
        ]),
    ]));

    assert_eq!(invoke_i32(&instance, "dispatch", &[0]).unwrap(), vec![10]);
    assert_eq!(invoke_i32(&instance, "dispatch", &[1]).unwrap(), vec![20]);
    assert_eq!(
        invoke_i32(&instance, "dispatch", &[2]).unwrap_err(),
        Error::Trap(Trap::BadSignature)
    );
    assert_eq!(
        invoke_i32(&instance, "dispatch", &[3]).unwrap_err(),
        Error::Trap(Trap::UninitializedElement)
    );
    assert_eq!(
        invoke_i32(&instance, "dispatch", &[17]).unwrap_err(),
        Error::Trap(Trap::UndefinedElement)
    );
}

#[test]
fn memory_data_and_grow() {
    let instance = instantiate(module(vec![
        type_section(vec![
            func_type(&[I32], &[I32]), // load8
            func_type(&[I32], &[I32]), // grow
            func_type(&[], &[I32]),    // size
        ]),
        func_section(&[0, 1, 2]),
        memory_section(1, Some(3)),
        export_section(vec![
            export_entry("load8", EXPORT_FUNC, 0),
            export_entry("grow", EXPORT_FUNC, 1),
            export_entry("size", EXPORT_FUNC, 2),
        ]),
        code_section(vec![
            body(&[], vec![0x20, 0x00, 0x2D, 0x00, 0x00, 0x0B]), // i32.load8_u
            body(&[], vec![0x20, 0x00, 0x40, 0x00, 0x0B]),       // memory.grow
            body(&[], vec![0x3F, 0x00, 0x0B]),                   // memory.size
        ]),
        data_active(i32_const_expr(8), b"wasm"),
    ]));

    assert_eq!(
        invoke_i32(&instance, "load8", &[8]).unwrap(),
        vec![i32::from(b'w')]
    );
    assert_eq!(invoke_i32(&instance, "load8", &[11]).unwrap(), vec![i32::from(b'm')]);
    assert_eq!(invoke_i32(&instance, "load8", &[12]).unwrap(), vec![0]);

    assert_eq!(invoke_i32(&instance, "size", &[]).unwrap(), vec![1]);
    assert_eq!(invoke_i32(&instance, "grow", &[1]).unwrap(), vec![1]);
    assert_eq!(invoke_i32(&instance, "size", &[]).unwrap(), vec![2]);
    // growing past the declared maximum fails with -1
    assert_eq!(invoke_i32(&instance, "grow", &[5]).unwrap(), vec![-1]);

    // the freshly grown page is readable and zeroed
    assert_eq!(
        invoke_i32(&instance, "load8", &[65536 + 100]).unwrap(),
        vec![0]
    );
    // and past the current size still traps
    assert_eq!(
        invoke_i32(&instance, "load8", &[3 * 65536]).unwrap_err(),
        Error::Trap(Trap::MemoryOutOfBounds)
    );
    assert_eq!(
        invoke_i32(&instance, "load8", &[3 * 65536])
            .unwrap_err()
            .to_string(),
        "out of bounds memory access"
    );
}

#[test]
fn globals_and_start_function() {
    // start bumps the global once, before any invoke
    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[], &[]), func_type(&[], &[I32])]),
        func_section(&[0, 1]),
        global_section(vec![global_entry(I32, true, i32_const_expr(41))]),
        export_section(vec![
            export_entry("get", EXPORT_FUNC, 1),
            export_entry("answer", EXPORT_GLOBAL, 0),
        ]),
        start_section(0),
        code_section(vec![
            body(
                &[],
                vec![
                    0x23, 0x00, // global.get 0
                    0x41, 0x01, // i32.const 1
                    0x6A, // i32.add
                    0x24, 0x00, // global.set 0
                    0x0B, // end
                ],
            ),
            body(&[], vec![0x23, 0x00, 0x0B]),
        ]),
    ]));

    assert_eq!(invoke_i32(&instance, "get", &[]).unwrap(), vec![42]);
    assert!(instance.get_global("answer").unwrap().matches(&Val::I32(42)));
    assert!(matches!(
        instance.get_global("nope").unwrap_err(),
        Error::UnknownExport { .. }
    ));
}

#[test]
fn invoke_argument_checking() {
    let instance = instantiate(module(vec![
        type_section(vec![func_type(&[I32], &[I32])]),
        func_section(&[0]),
        export_section(vec![export_entry("id", EXPORT_FUNC, 0)]),
        code_section(vec![body(&[], vec![0x20, 0x00, 0x0B])]),
    ]));

    assert!(matches!(
        instance.invoke("missing", &[]).unwrap_err(),
        Error::UnknownExport { .. }
    ));
    assert_eq!(
        instance.invoke("id", &[]).unwrap_err(),
        Error::ArgumentTypeMismatch
    );
    assert_eq!(
        instance.invoke("id", &[Val::I64(3)]).unwrap_err(),
        Error::ArgumentTypeMismatch
    );
}
