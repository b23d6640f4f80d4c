//! The `name` custom section.
//!
//! Purely diagnostic: decoders must tolerate it but may ignore it. Unknown
//! subsection ids are skipped rather than rejected so that toolchain
//! extensions (extended-name-section and friends) survive a round trip
//! through this crate.

use crate::limits::{MAX_WASM_FUNCTIONS, MAX_WASM_FUNCTION_LOCALS};
use crate::{BinaryReader, VecReader};

/// A name assigned to an index, from the `name` custom section.
#[derive(Debug, Copy, Clone)]
pub struct Naming<'a> {
    pub index: u32,
    pub name: &'a str,
}

/// A name map scoped below another index (local names within a function).
#[derive(Debug, Clone)]
pub struct IndirectNaming<'a> {
    pub index: u32,
    pub names: VecReader<'a, Naming<'a>>,
}

#[derive(Debug)]
pub enum NameSubsection<'a> {
    Module(&'a str),
    Function(VecReader<'a, Naming<'a>>),
    Local(VecReader<'a, IndirectNaming<'a>>),
    /// A subsection this crate does not interpret.
    Unknown {
        id: u8,
    },
}

pub struct NameSectionReader<'a> {
    reader: BinaryReader<'a>,
}

impl<'a> NameSectionReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: BinaryReader::new(bytes),
        }
    }

    pub fn subsections(&self) -> NameSubsectionsIter<'a> {
        NameSubsectionsIter {
            reader: self.reader.clone(),
            err: false,
        }
    }
}

pub struct NameSubsectionsIter<'a> {
    reader: BinaryReader<'a>,
    err: bool,
}

impl<'a> Iterator for NameSubsectionsIter<'a> {
    type Item = crate::Result<NameSubsection<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.err || self.reader.done() {
            None
        } else {
            let res = self.reader.read_name_subsection();
            self.err = res.is_err();
            Some(res)
        }
    }
}

impl<'a> BinaryReader<'a> {
    fn read_naming(&mut self) -> crate::Result<Naming<'a>> {
        let index = self.read_u32_leb128()?;
        let name = self.read_str()?;

        Ok(Naming { index, name })
    }

    fn read_indirect_naming(&mut self) -> crate::Result<IndirectNaming<'a>> {
        let index = self.read_u32_leb128()?;

        let names_reader = self.clone();
        let count = self.read_u32_leb128()?;
        for _ in 0..count {
            self.read_naming()?;
        }

        Ok(IndirectNaming {
            index,
            names: VecReader::new(
                names_reader,
                Self::read_naming,
                Some(MAX_WASM_FUNCTION_LOCALS),
            )?,
        })
    }

    fn read_name_subsection(&mut self) -> crate::Result<NameSubsection<'a>> {
        let id = self.read_u8()?;
        let len = self.read_u32_leb128()?;
        let mut reader = self.sub_reader(len as usize)?;

        log::debug!("names subsection id {id} len {len}");

        match id {
            0 => Ok(NameSubsection::Module(reader.read_str()?)),
            1 => Ok(NameSubsection::Function(VecReader::new(
                reader,
                Self::read_naming,
                Some(MAX_WASM_FUNCTIONS),
            )?)),
            2 => Ok(NameSubsection::Local(VecReader::new(
                reader,
                Self::read_indirect_naming,
                Some(MAX_WASM_FUNCTIONS),
            )?)),
            _ => Ok(NameSubsection::Unknown { id }),
        }
    }
}
