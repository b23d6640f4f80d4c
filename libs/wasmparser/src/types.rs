use crate::binary_reader::BinaryReader;
use crate::limits::{MAX_WASM_FUNCTION_PARAMS, MAX_WASM_FUNCTION_RETURNS};
use crate::vec_reader::VecReader;
use core::fmt;
use core::fmt::Formatter;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ReferenceType {
    FuncRef,
    ExternRef,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    FuncRef,
    ExternRef,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::I32 | ValueType::I64 | ValueType::F32 | ValueType::F64
        )
    }

    pub fn is_reference(self) -> bool {
        matches!(self, ValueType::FuncRef | ValueType::ExternRef)
    }
}

impl From<ReferenceType> for ValueType {
    fn from(ty: ReferenceType) -> Self {
        match ty {
            ReferenceType::FuncRef => ValueType::FuncRef,
            ReferenceType::ExternRef => ValueType::ExternRef,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::FuncRef => "funcref",
            ValueType::ExternRef => "externref",
        };
        f.write_str(s)
    }
}

/// A function signature as encoded in the type section.
///
/// Parameters and results are decoded lazily straight out of the input
/// buffer; [`FunctionType::params`] and [`FunctionType::results`] hand out
/// fresh readers over the two vectors.
#[derive(Clone)]
pub struct FunctionType<'a> {
    pub(crate) reader: BinaryReader<'a>,
    pub(crate) results_offset: usize,
}

impl<'a> FunctionType<'a> {
    pub fn params(&self) -> crate::Result<VecReader<'a, ValueType>> {
        VecReader::new(
            self.reader.clone(),
            BinaryReader::read_value_type,
            Some(MAX_WASM_FUNCTION_PARAMS),
        )
    }

    pub fn results(&self) -> crate::Result<VecReader<'a, ValueType>> {
        let mut reader = self.reader.clone();
        reader.skip(self.results_offset)?;
        VecReader::new(
            reader,
            BinaryReader::read_value_type,
            Some(MAX_WASM_FUNCTION_RETURNS),
        )
    }
}

impl<'a> fmt::Debug for FunctionType<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionType")
            .field("params", &self.params())
            .field("results", &self.results())
            .finish()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryType {
    pub limits: Limits,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TableType {
    pub ty: ReferenceType,
    pub limits: Limits,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GlobalType {
    pub ty: ValueType,
    pub mutability: Mutability,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mutability {
    Const,
    Var,
}
