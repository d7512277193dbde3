//! Fixed-width integers, `varuint`, length-prefixed blobs and UTF-8 strings.

use std::marker::PhantomData;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::combinator::TryMap;
use crate::error::{CodecError, Result};
use crate::traits::{ensure_remaining, Codec, CodecExt};

/// Byte order for fixed-width integers.
///
/// A connection picks one order and uses it for the frame header and every
/// body codec. Big-endian is the wire default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

mod sealed {
    pub trait Sealed {}
}

/// Integer types with a fixed encoded width.
pub trait FixedInt: sealed::Sealed + Copy + Send + Sync + 'static {
    /// Encoded width in bytes.
    const SIZE: usize;

    #[doc(hidden)]
    fn put(self, dst: &mut BytesMut, order: ByteOrder);

    #[doc(hidden)]
    fn get(src: &mut Bytes, order: ByteOrder) -> Self;
}

macro_rules! fixed_int {
    ($($ty:ty => $put:ident, $put_le:ident, $get:ident, $get_le:ident;)+) => {
        $(
            impl sealed::Sealed for $ty {}

            impl FixedInt for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn put(self, dst: &mut BytesMut, order: ByteOrder) {
                    match order {
                        ByteOrder::Big => dst.$put(self),
                        ByteOrder::Little => dst.$put_le(self),
                    }
                }

                fn get(src: &mut Bytes, order: ByteOrder) -> Self {
                    match order {
                        ByteOrder::Big => src.$get(),
                        ByteOrder::Little => src.$get_le(),
                    }
                }
            }
        )+
    };
}

fixed_int! {
    i8 => put_i8, put_i8, get_i8, get_i8;
    i16 => put_i16, put_i16_le, get_i16, get_i16_le;
    i32 => put_i32, put_i32_le, get_i32, get_i32_le;
    i64 => put_i64, put_i64_le, get_i64, get_i64_le;
    u8 => put_u8, put_u8, get_u8, get_u8;
    u16 => put_u16, put_u16_le, get_u16, get_u16_le;
    u32 => put_u32, put_u32_le, get_u32, get_u32_le;
    u64 => put_u64, put_u64_le, get_u64, get_u64_le;
}

/// Fixed-width integer codec.
///
/// The exported constants ([`I32`] and friends) write in whatever byte order
/// the connection uses. [`Int::new`] pins an explicit order instead.
#[derive(Debug, Clone, Copy)]
pub struct Int<T> {
    order: Option<ByteOrder>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FixedInt> Int<T> {
    /// Integer codec with an explicit byte order, regardless of connection.
    pub const fn new(order: ByteOrder) -> Self {
        Self {
            order: Some(order),
            _marker: PhantomData,
        }
    }

    /// Integer codec that follows the connection's byte order.
    pub const fn inherited() -> Self {
        Self {
            order: None,
            _marker: PhantomData,
        }
    }

    /// The pinned byte order, if any.
    pub const fn order(&self) -> Option<ByteOrder> {
        self.order
    }
}

impl<T: FixedInt> Codec for Int<T> {
    type Value = T;

    fn encode_with(&self, value: &T, dst: &mut BytesMut, order: ByteOrder) -> Result<()> {
        value.put(dst, self.order.unwrap_or(order));
        Ok(())
    }

    fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<T> {
        ensure_remaining(src, T::SIZE)?;
        Ok(T::get(src, self.order.unwrap_or(order)))
    }
}

pub const I8: Int<i8> = Int::inherited();
pub const I16: Int<i16> = Int::inherited();
pub const I32: Int<i32> = Int::inherited();
pub const I64: Int<i64> = Int::inherited();
pub const U8: Int<u8> = Int::inherited();
pub const U16: Int<u16> = Int::inherited();
pub const U32: Int<u32> = Int::inherited();
pub const U64: Int<u64> = Int::inherited();

/// Unsigned variable-length integer.
///
/// Seven bits per byte, least-significant group first; bit 7 set means
/// another byte follows. Zero encodes as a single `0x00`. Values are carried
/// as `i64` and negative inputs are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarUint;

/// A varuint never needs more than nine groups for a non-negative `i64`.
const VARUINT_MAX_GROUPS: u32 = 9;

impl Codec for VarUint {
    type Value = i64;

    fn encode_with(&self, value: &i64, dst: &mut BytesMut, _order: ByteOrder) -> Result<()> {
        if *value < 0 {
            return Err(CodecError::NegativeVarUint(*value));
        }

        let mut remaining = *value as u64;
        loop {
            let mut group = (remaining & 0x7F) as u8;
            remaining >>= 7;
            if remaining != 0 {
                group |= 0x80;
            }
            dst.put_u8(group);
            if remaining == 0 {
                return Ok(());
            }
        }
    }

    fn decode_with(&self, src: &mut Bytes, _order: ByteOrder) -> Result<i64> {
        let mut value = 0u64;
        for index in 0..VARUINT_MAX_GROUPS {
            ensure_remaining(src, 1)?;
            let group = src.get_u8();
            value |= u64::from(group & 0x7F) << (7 * index);
            if group & 0x80 == 0 {
                return i64::try_from(value).map_err(|_| CodecError::VarUintOverflow);
            }
        }
        Err(CodecError::VarUintOverflow)
    }
}

/// Byte blob prefixed with its length as a [`VarUint`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Blob;

impl Codec for Blob {
    type Value = Bytes;

    fn encode_with(&self, value: &Bytes, dst: &mut BytesMut, _order: ByteOrder) -> Result<()> {
        let len = i64::try_from(value.len()).map_err(|_| CodecError::LengthOverflow(value.len()))?;
        VarUint.encode(&len, dst)?;
        dst.put_slice(value);
        Ok(())
    }

    fn decode_with(&self, src: &mut Bytes, _order: ByteOrder) -> Result<Bytes> {
        let len = VarUint.decode(src)?;
        let len = usize::try_from(len).map_err(|_| CodecError::InvalidLength(i128::from(len)))?;
        ensure_remaining(src, len)?;
        Ok(src.split_to(len))
    }
}

/// UTF-8 string codec: [`Blob`] mapped through UTF-8 conversion.
pub type Utf8 = TryMap<Blob, fn(Bytes) -> Result<String>, fn(&String) -> Bytes>;

/// The UTF-8 string codec.
pub fn utf8() -> Utf8 {
    Blob.try_map(
        decode_utf8 as fn(Bytes) -> Result<String>,
        encode_utf8 as fn(&String) -> Bytes,
    )
}

fn decode_utf8(bytes: Bytes) -> Result<String> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[allow(clippy::ptr_arg)]
fn encode_utf8(value: &String) -> Bytes {
    Bytes::copy_from_slice(value.as_bytes())
}
