use crate::Error;
use crate::binary_reader::BinaryReader;
use core::fmt;
use core::fmt::Formatter;

/// A count-prefixed vector in the binary format, decoded lazily.
///
/// Holds a reader positioned at the first element; the element constructor
/// runs once per [`VecIter::next`] call. The declared count is checked
/// against a structural limit up front so a hostile count can never drive
/// an allocation.
pub struct VecReader<'a, T> {
    reader: BinaryReader<'a>,
    len: u32,
    ctor: fn(&mut BinaryReader<'a>) -> crate::Result<T>,
}

impl<'a, T> Clone for VecReader<'a, T> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            len: self.len,
            ctor: self.ctor,
        }
    }
}

impl<'a, T: fmt::Debug> fmt::Debug for VecReader<'a, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> VecReader<'a, T> {
    pub fn new(
        mut reader: BinaryReader<'a>,
        ctor: fn(&mut BinaryReader<'a>) -> crate::Result<T>,
        limit: Option<usize>,
    ) -> crate::Result<Self> {
        let len = reader.read_u32_leb128()?;

        if let Some(limit) = limit
            && len as usize > limit
        {
            return Err(Error::LengthOutOfBounds);
        }

        Ok(Self { reader, len, ctor })
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> VecIter<'a, T> {
        VecIter {
            reader: self.clone(),
            remaining: self.len,
            done: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VecIter<'a, T> {
    reader: VecReader<'a, T>,
    remaining: u32,
    done: bool,
}

impl<'a, T> VecIter<'a, T> {
    /// The reader positioned after the last element yielded so far. Callers
    /// that must consume a section exactly check `done()` on this.
    pub fn into_reader(self) -> BinaryReader<'a> {
        self.reader.reader
    }
}

impl<'a, T> Iterator for VecIter<'a, T> {
    type Item = crate::Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.remaining == 0 {
            self.done = true;
            None
        } else {
            let res = (self.reader.ctor)(&mut self.reader.reader);
            self.done = res.is_err();
            self.remaining -= 1;
            Some(res)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}
