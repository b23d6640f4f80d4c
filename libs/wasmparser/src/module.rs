use crate::BinaryReader;
use crate::Error;
use crate::Section;

const WASM_MAGIC_BYTES: [u8; 4] = *b"\0asm";
const WASM_VERSION: u32 = 0x01;

/// A module whose header has been checked; sections decode lazily from
/// [`Module::sections`].
#[derive(Debug)]
pub struct Module<'a> {
    pub(crate) reader: BinaryReader<'a>,
}

impl<'a> Module<'a> {
    pub fn sections(&self) -> SectionsIter<'a> {
        SectionsIter {
            reader: self.reader.clone(),
            err: false,
        }
    }
}

/// Check the magic signature and version, handing back a [`Module`] whose
/// cursor is positioned at the first section.
pub fn parse_module(bytes: &[u8]) -> crate::Result<Module<'_>> {
    let mut reader = BinaryReader::new(bytes);

    let magic = reader.read_bytes(4).map_err(|_| Error::BadMagicNumber)?;
    if magic != WASM_MAGIC_BYTES {
        return Err(Error::BadMagicNumber);
    }

    let version = reader.read_bytes(4).map_err(|_| Error::UnsupportedVersion)?;
    if u32::from_le_bytes(version.try_into().unwrap()) != WASM_VERSION {
        return Err(Error::UnsupportedVersion);
    }

    Ok(Module { reader })
}

pub struct SectionsIter<'a> {
    reader: BinaryReader<'a>,
    err: bool,
}

impl<'a> Iterator for SectionsIter<'a> {
    type Item = crate::Result<Section<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.err || self.reader.done() {
            None
        } else {
            let res = self.reader.read_section();
            self.err = res.is_err();
            Some(res)
        }
    }
}
