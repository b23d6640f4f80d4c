// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Decoder and validator rejection paths, and the error-kind to
//! expected-message mapping a spec-test driver matches on.

mod common;

use common::*;
use wvm::{Error, Module, Trap, ValidationError};

fn decode_err(bytes: Vec<u8>) -> Error {
    Module::decode(bytes).expect_err("expected decode to fail")
}

#[test]
fn bad_header() {
    assert_eq!(
        decode_err(b"\0esm\x01\0\0\0".to_vec()).to_string(),
        "magic header not detected"
    );
    assert_eq!(
        decode_err(b"\0asm\x02\0\0\0".to_vec()).to_string(),
        "unknown binary version"
    );
    assert_eq!(decode_err(b"\0asm\x01\0".to_vec()).to_string(), "unknown binary version");
}

#[test]
fn unknown_section_id() {
    let mut bytes = module(vec![]);
    bytes.extend([0x0D, 0x00]); // section id 13
    assert_eq!(decode_err(bytes).to_string(), "malformed section id");
}

#[test]
fn out_of_order_sections() {
    // function section before type section
    let bytes = module(vec![
        func_section(&[0]),
        type_section(vec![func_type(&[], &[])]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Malformed(wasmparser::Error::OutOfOrderSection)
    );

    // the same section twice
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        type_section(vec![func_type(&[], &[])]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Malformed(wasmparser::Error::OutOfOrderSection)
    );
}

#[test]
fn function_code_count_mismatch() {
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0, 0]),
        code_section(vec![body(&[], vec![0x0B])]),
    ]);
    assert_eq!(
        decode_err(bytes).to_string(),
        "function and code section have inconsistent lengths"
    );
}

#[test]
fn data_count_mismatch() {
    let mut sections = vec![memory_section(1, None)];
    sections.push(section(12, uleb(2))); // data count: 2
    sections.push(data_active(i32_const_expr(0), b"x")); // but only 1 segment
    assert_eq!(
        decode_err(module(sections)).to_string(),
        "data count and data section have inconsistent lengths"
    );
}

#[test]
fn multiple_start_sections() {
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        start_section(0),
        start_section(0),
        code_section(vec![body(&[], vec![0x0B])]),
    ]);
    assert_eq!(decode_err(bytes).to_string(), "multiple start sections");
}

#[test]
fn start_function_signature() {
    let bytes = module(vec![
        type_section(vec![func_type(&[I32], &[])]),
        func_section(&[0]),
        start_section(0),
        code_section(vec![body(&[], vec![0x0B])]),
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::StartFunctionType));
    assert_eq!(err.to_string(), "start function");
}

#[test]
fn body_type_mismatch() {
    // declared () -> (i32) but produces an i64
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[I32])]),
        func_section(&[0]),
        code_section(vec![body(&[], vec![0x42, 0x00, 0x0B])]),
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::TypeMismatch));
    assert_eq!(err.to_string(), "type mismatch");
}

#[test]
fn operand_stack_underflow() {
    // i32.add with a single operand
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[I32])]),
        func_section(&[0]),
        code_section(vec![body(&[], vec![0x41, 0x01, 0x6A, 0x0B])]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Validation(ValidationError::TypeMismatch)
    );
}

#[test]
fn unknown_label() {
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        code_section(vec![body(&[], vec![0x0C, 0x03, 0x0B])]), // br 3
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::UnknownLabel));
    assert_eq!(err.to_string(), "unknown label");
}

#[test]
fn unknown_indices() {
    // local.get 1 in a function with a single param
    let bytes = module(vec![
        type_section(vec![func_type(&[I32], &[])]),
        func_section(&[0]),
        code_section(vec![body(&[], vec![0x20, 0x01, 0x1A, 0x0B])]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Validation(ValidationError::UnknownLocal)
    );

    // call 1 with a single function
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        code_section(vec![body(&[], vec![0x10, 0x01, 0x0B])]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Validation(ValidationError::UnknownFunction)
    );

    // global.get 0 with no globals
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        code_section(vec![body(&[], vec![0x23, 0x00, 0x1A, 0x0B])]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Validation(ValidationError::UnknownGlobal)
    );
}

#[test]
fn set_of_immutable_global() {
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        global_section(vec![global_entry(I32, false, i32_const_expr(1))]),
        code_section(vec![body(&[], vec![0x41, 0x00, 0x24, 0x00, 0x0B])]),
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::ImmutableGlobal));
    assert_eq!(err.to_string(), "global is immutable");
}

#[test]
fn alignment_exceeds_natural() {
    // i32.load with 2^3 alignment
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[I32])]),
        func_section(&[0]),
        memory_section(1, None),
        code_section(vec![body(
            &[],
            vec![0x41, 0x00, 0x28, 0x03, 0x00, 0x0B],
        )]),
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::BadAlignment));
    assert_eq!(
        err.to_string(),
        "alignment must not be larger than natural"
    );
}

#[test]
fn multiple_memories() {
    let bytes = module(vec![section(
        5,
        vec_payload(vec![limits(1, None), limits(1, None)]),
    )]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::MultipleMemories));
    assert_eq!(err.to_string(), "multiple memories");
}

#[test]
fn memory_too_large() {
    let bytes = module(vec![memory_section(65537, None)]);
    let err = decode_err(bytes);
    assert_eq!(
        err,
        Error::Validation(ValidationError::MemoryMaxPagesExceeded)
    );
    assert_eq!(
        err.to_string(),
        "memory size must be at most 65536 pages (4GiB)"
    );
}

#[test]
fn limits_minimum_over_maximum() {
    let bytes = module(vec![memory_section(2, Some(1))]);
    assert_eq!(
        decode_err(bytes).to_string(),
        "size minimum must not be greater than maximum"
    );
}

#[test]
fn duplicate_export_names() {
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        export_section(vec![
            export_entry("f", EXPORT_FUNC, 0),
            export_entry("f", EXPORT_FUNC, 0),
        ]),
        code_section(vec![body(&[], vec![0x0B])]),
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::DuplicateExportName));
    assert_eq!(err.to_string(), "duplicate export name");
}

#[test]
fn select_requires_numeric_operands() {
    // select over two funcrefs without a type immediate
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        export_section(vec![export_entry("f", EXPORT_FUNC, 0)]),
        code_section(vec![body(
            &[],
            vec![
                0xD0, 0x70, // ref.null func
                0xD0, 0x70, // ref.null func
                0x41, 0x01, // i32.const 1
                0x1B, // select
                0x1A, // drop
                0x0B, // end
            ],
        )]),
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::TypeMustBeNumeric));
    assert_eq!(err.to_string(), "type mismatch");
}

#[test]
fn constant_expression_rules() {
    // a global initialized from an arithmetic expression
    let init = vec![0x41, 0x01, 0x41, 0x01, 0x6A, 0x0B]; // i32.add
    let bytes = module(vec![global_section(vec![global_entry(I32, false, init)])]);
    let err = decode_err(bytes);
    assert_eq!(
        err,
        Error::Validation(ValidationError::ConstantExpressionRequired)
    );
    assert_eq!(err.to_string(), "constant expression required");

    // a global initialized from a non-imported global
    let bytes = module(vec![global_section(vec![
        global_entry(I32, false, i32_const_expr(1)),
        global_entry(I32, false, vec![0x23, 0x00, 0x0B]),
    ])]);
    assert_eq!(
        decode_err(bytes),
        Error::Validation(ValidationError::ConstantExpressionGlobalMustBeImport)
    );
}

#[test]
fn undeclared_ref_func() {
    // ref.func on a function that appears in no segment or export
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        code_section(vec![body(&[], vec![0xD2, 0x00, 0x1A, 0x0B])]),
    ]);
    let err = decode_err(bytes);
    assert_eq!(err, Error::Validation(ValidationError::FuncRefUndeclared));
    assert_eq!(err.to_string(), "undeclared function reference");
}

#[test]
fn memory_init_requires_data_count() {
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        memory_section(1, None),
        code_section(vec![body(
            &[],
            vec![
                0x41, 0x00, 0x41, 0x00, 0x41, 0x00, // three zero operands
                0xFC, 0x08, 0x00, 0x00, // memory.init 0
                0x0B,
            ],
        )]),
    ]);
    assert_eq!(decode_err(bytes).to_string(), "data count section required");
}

#[test]
fn body_size_mismatch() {
    // the body's declared size ends before its final `end`
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        // count 1, size 2, locals 0, end -- then a stray trailing byte
        section(10, vec![0x01, 0x02, 0x00, 0x0B, 0x0B]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Malformed(wasmparser::Error::SectionSizeMismatch)
    );

    // the body's declared size extends past its final `end`
    let bytes = module(vec![
        type_section(vec![func_type(&[], &[])]),
        func_section(&[0]),
        section(10, vec![0x01, 0x03, 0x00, 0x0B, 0x0B]),
    ]);
    assert_eq!(
        decode_err(bytes),
        Error::Malformed(wasmparser::Error::SectionSizeMismatch)
    );
}

#[test]
fn expected_failure_messages() {
    // the kind -> expected-message table a spec-test driver matches on
    assert_eq!(
        wasmparser::Error::BadMagicNumber.to_string(),
        "magic header not detected"
    );
    assert_eq!(
        wasmparser::Error::UnsupportedVersion.to_string(),
        "unknown binary version"
    );
    assert_eq!(
        wasmparser::Error::IntegerTooLong.to_string(),
        "integer representation too long"
    );
    assert_eq!(
        ValidationError::TypeMismatch.to_string(),
        "type mismatch"
    );
    assert_eq!(
        ValidationError::ImmutableGlobal.to_string(),
        "global is immutable"
    );
    assert_eq!(Trap::MemoryOutOfBounds.to_string(), "out of bounds memory access");
    assert_eq!(Trap::TableOutOfBounds.to_string(), "out of bounds table access");
    assert_eq!(Trap::StackExhausted.to_string(), "call stack exhausted");
    assert_eq!(Trap::UnreachableCodeReached.to_string(), "unreachable");
    assert_eq!(Trap::IntegerDivisionByZero.to_string(), "integer divide by zero");
    assert_eq!(Trap::BadConversionToInteger.to_string(), "invalid conversion to integer");
    assert_eq!(Trap::UndefinedElement.to_string(), "undefined element");
    assert_eq!(Trap::UninitializedElement.to_string(), "uninitialized element");
    assert_eq!(Trap::BadSignature.to_string(), "indirect call type mismatch");
}
