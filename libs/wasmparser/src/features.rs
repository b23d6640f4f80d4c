use bitflags::bitflags;

bitflags! {
    /// Post-MVP proposals the decoder and validator will accept.
    ///
    /// The default set is the stabilized-proposal baseline: everything in
    /// here is on, everything newer (SIMD, threads, tail calls, GC, ...) is
    /// rejected as an illegal encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WasmFeatures: u32 {
        const MUTABLE_GLOBAL = 1 << 0;
        const SIGN_EXTENSION = 1 << 1;
        const NONTRAPPING_FLOAT_TO_INT = 1 << 2;
        const MULTI_VALUE = 1 << 3;
        const BULK_MEMORY = 1 << 4;
        const REFERENCE_TYPES = 1 << 5;
    }
}

impl Default for WasmFeatures {
    fn default() -> Self {
        WasmFeatures::all()
    }
}
