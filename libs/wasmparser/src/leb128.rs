//! Strict LEB128 decoding.
//!
//! The binary format bounds every variable-length integer by its target
//! width: an encoding may use at most `ceil(bits / 7)` bytes, and the bits
//! of the final byte that fall outside the target width must be zero (or,
//! for signed integers, a replication of the sign bit). Encodings that
//! violate either rule are rejected rather than silently truncated.

macro_rules! impl_read_unsigned_leb128 {
    ($fn_name:ident, $int_ty:ty) => {
        #[inline]
        pub fn $fn_name(&mut self) -> $crate::Result<$int_ty> {
            const BITS: u32 = <$int_ty>::BITS;

            // The first iteration of this loop is unpeeled. This is a
            // performance win because this code is hot and integer values less
            // than 128 are very common, typically occurring 50-80% or more of
            // the time.
            let byte = self.read_u8()?;
            if (byte & 0x80) == 0 {
                return Ok(byte as $int_ty);
            }
            let mut result = (byte & 0x7F) as $int_ty;
            let mut shift = 7;
            loop {
                let byte = self.read_u8()?;
                let payload = byte & 0x7F;

                if shift + 7 > BITS {
                    // Last byte the target width permits: the continuation
                    // bit must be clear and the spare payload bits zero.
                    if byte & 0x80 != 0 {
                        return Err($crate::Error::IntegerTooLong);
                    }
                    if payload >> (BITS - shift) != 0 {
                        return Err($crate::Error::IntegerTooLarge);
                    }
                    result |= (payload as $int_ty) << shift;
                    return Ok(result);
                }

                result |= (payload as $int_ty) << shift;
                if (byte & 0x80) == 0 {
                    return Ok(result);
                }
                shift += 7;
            }
        }
    };
}

macro_rules! impl_read_signed_leb128 {
    ($fn_name:ident, $int_ty:ty) => {
        #[inline]
        pub fn $fn_name(&mut self) -> $crate::Result<$int_ty> {
            const BITS: u32 = <$int_ty>::BITS;

            let mut result: $int_ty = 0;
            let mut shift = 0;
            loop {
                let byte = self.read_u8()?;
                let payload = byte & 0x7F;

                if shift + 7 > BITS {
                    if byte & 0x80 != 0 {
                        return Err($crate::Error::IntegerTooLong);
                    }
                    // The used payload bits end at the target width; the
                    // spare bits above them must replicate the sign bit.
                    let used = (BITS - shift) as u8;
                    let upper = payload >> (used - 1);
                    if upper != 0 && upper != (0x7F >> (used - 1)) {
                        return Err($crate::Error::IntegerTooLarge);
                    }
                    result |= ((payload & (0xFF >> (8 - used))) as $int_ty) << shift;
                    return Ok(result);
                }

                result |= (payload as $int_ty) << shift;
                shift += 7;

                if (byte & 0x80) == 0 {
                    if (byte & 0x40) != 0 {
                        // sign extend
                        result |= !0 << shift;
                    }
                    return Ok(result);
                }
            }
        }
    };
}

pub(crate) use impl_read_signed_leb128;
pub(crate) use impl_read_unsigned_leb128;
