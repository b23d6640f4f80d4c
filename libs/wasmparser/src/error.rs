/// Errors raised while decoding a module that is not well-formed with
/// respect to the binary format.
///
/// The display strings follow the expected-failure messages of the upstream
/// specification test suite so that embedders can match on them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, onlyerror::Error)]
pub enum Error {
    #[error("unexpected end")]
    UnexpectedEof,
    #[error("magic header not detected")]
    BadMagicNumber,
    #[error("unknown binary version")]
    UnsupportedVersion,
    #[error("malformed section id")]
    UnknownSection,
    #[error("unexpected content after last section")]
    OutOfOrderSection,
    #[error("section size mismatch")]
    SectionSizeMismatch,
    #[error("length out of bounds")]
    LengthOutOfBounds,
    #[error("integer representation too long")]
    IntegerTooLong,
    #[error("integer too large")]
    IntegerTooLarge,
    #[error("malformed UTF-8 encoding")]
    BadUtf8,
    #[error("malformed functype")]
    BadTypeSentinel,
    #[error("malformed value type")]
    UnknownValType,
    #[error("malformed reference type")]
    UnknownRefType,
    #[error("malformed block type")]
    BadBlockType,
    #[error("integer too large")]
    UnknownLimitFlag,
    #[error("malformed mutability")]
    UnknownMutability,
    #[error("malformed import kind")]
    UnknownImportKind,
    #[error("malformed export kind")]
    UnknownExportKind,
    #[error("malformed element segment kind")]
    UnknownElementKind,
    #[error("malformed data segment kind")]
    UnknownDataKind,
    #[error("zero byte expected")]
    ZeroByteExpected,
    #[error("illegal opcode")]
    IllegalOpcode,
    #[error("invalid result arity")]
    BadSelectArity,
    #[error("too many locals")]
    TooManyLocals,
    #[error("function and code section have inconsistent lengths")]
    FunctionCodeCountMismatch,
    #[error("data count and data section have inconsistent lengths")]
    DataCountMismatch,
    #[error("data count section required")]
    DataCountRequired,
    #[error("multiple start sections")]
    MultipleStartSections,
    #[error("END opcode expected")]
    EndOpcodeExpected,
}

impl From<core::str::Utf8Error> for Error {
    fn from(_: core::str::Utf8Error) -> Self {
        Error::BadUtf8
    }
}
