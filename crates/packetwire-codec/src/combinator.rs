//! Codecs built from other codecs.

use std::marker::PhantomData;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::primitive::ByteOrder;
use crate::traits::{ensure_remaining, Codec};

/// Codec of `U` derived from a codec of `A` through total conversions.
#[derive(Debug, Clone, Copy)]
pub struct Map<C, F, G> {
    inner: C,
    forward: F,
    backward: G,
}

impl<C, F, G> Map<C, F, G> {
    pub fn new(inner: C, forward: F, backward: G) -> Self {
        Self {
            inner,
            forward,
            backward,
        }
    }
}

impl<C, F, G, U> Codec for Map<C, F, G>
where
    C: Codec,
    F: Fn(C::Value) -> U + Send + Sync,
    G: Fn(&U) -> C::Value + Send + Sync,
{
    type Value = U;

    fn encode_with(&self, value: &U, dst: &mut BytesMut, order: ByteOrder) -> Result<()> {
        self.inner.encode_with(&(self.backward)(value), dst, order)
    }

    fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<U> {
        self.inner.decode_with(src, order).map(&self.forward)
    }
}

/// Like [`Map`], but decoding may reject the underlying value.
#[derive(Debug, Clone, Copy)]
pub struct TryMap<C, F, G> {
    inner: C,
    forward: F,
    backward: G,
}

impl<C, F, G> TryMap<C, F, G> {
    pub fn new(inner: C, forward: F, backward: G) -> Self {
        Self {
            inner,
            forward,
            backward,
        }
    }
}

impl<C, F, G, U> Codec for TryMap<C, F, G>
where
    C: Codec,
    F: Fn(C::Value) -> Result<U> + Send + Sync,
    G: Fn(&U) -> C::Value + Send + Sync,
{
    type Value = U;

    fn encode_with(&self, value: &U, dst: &mut BytesMut, order: ByteOrder) -> Result<()> {
        self.inner.encode_with(&(self.backward)(value), dst, order)
    }

    fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<U> {
        (self.forward)(self.inner.decode_with(src, order)?)
    }
}

/// Exactly `len` elements, back to back, with no prefix.
#[derive(Debug, Clone, Copy)]
pub struct Sequence<C> {
    inner: C,
    len: usize,
}

impl<C> Sequence<C> {
    pub fn new(inner: C, len: usize) -> Self {
        Self { inner, len }
    }

    /// Number of elements every encoded sequence carries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<C: Codec> Codec for Sequence<C> {
    type Value = Vec<C::Value>;

    fn encode_with(&self, value: &Vec<C::Value>, dst: &mut BytesMut, order: ByteOrder) -> Result<()> {
        if value.len() != self.len {
            return Err(CodecError::SequenceLength {
                expected: self.len,
                actual: value.len(),
            });
        }
        value
            .iter()
            .try_for_each(|item| self.inner.encode_with(item, dst, order))
    }

    fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<Vec<C::Value>> {
        decode_elements(&self.inner, self.len, src, order, false)
    }
}

/// Numeric values usable as a sequence count.
pub trait LengthValue: Sized {
    /// Narrow a decoded count to `usize`.
    fn to_len(self) -> Result<usize>;

    /// Widen a collection size into this type, if it fits.
    fn from_len(len: usize) -> Option<Self>;
}

macro_rules! length_value {
    ($($ty:ty),+) => {
        $(
            impl LengthValue for $ty {
                #[allow(clippy::unnecessary_fallible_conversions)]
                fn to_len(self) -> Result<usize> {
                    usize::try_from(self).map_err(|_| CodecError::InvalidLength(self as i128))
                }

                fn from_len(len: usize) -> Option<Self> {
                    <$ty>::try_from(len).ok()
                }
            }
        )+
    };
}

length_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

/// Elements preceded by a count written with a numeric codec.
#[derive(Debug, Clone, Copy)]
pub struct VarSequence<C, L> {
    inner: C,
    length: L,
}

impl<C, L> VarSequence<C, L> {
    pub fn new(inner: C, length: L) -> Self {
        Self { inner, length }
    }
}

impl<C, L> Codec for VarSequence<C, L>
where
    C: Codec,
    L: Codec,
    L::Value: LengthValue,
{
    type Value = Vec<C::Value>;

    fn encode_with(&self, value: &Vec<C::Value>, dst: &mut BytesMut, order: ByteOrder) -> Result<()> {
        let count =
            L::Value::from_len(value.len()).ok_or(CodecError::LengthOverflow(value.len()))?;
        self.length.encode_with(&count, dst, order)?;
        value
            .iter()
            .try_for_each(|item| self.inner.encode_with(item, dst, order))
    }

    fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<Vec<C::Value>> {
        let count = self.length.decode_with(src, order)?.to_len()?;
        decode_elements(&self.inner, count, src, order, true)
    }
}

fn decode_elements<C: Codec>(
    inner: &C,
    count: usize,
    src: &mut Bytes,
    order: ByteOrder,
    count_from_wire: bool,
) -> Result<Vec<C::Value>> {
    // A hostile count must not pre-allocate more than the body could hold.
    let mut items = Vec::with_capacity(count.min(src.remaining()));
    for _ in 0..count {
        let before = src.remaining();
        items.push(inner.decode_with(src, order)?);
        // Zero-width elements would let a decoded count run far past what
        // the body holds.
        if count_from_wire && src.remaining() == before && count > before {
            return Err(CodecError::InvalidLength(count as i128));
        }
    }
    Ok(items)
}

/// Optional value behind a one-byte presence flag.
#[derive(Debug, Clone, Copy)]
pub struct Nullable<C> {
    inner: C,
}

impl<C> Nullable<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Codec> Codec for Nullable<C> {
    type Value = Option<C::Value>;

    fn encode_with(&self, value: &Option<C::Value>, dst: &mut BytesMut, order: ByteOrder) -> Result<()> {
        match value {
            Some(inner) => {
                dst.put_u8(1);
                self.inner.encode_with(inner, dst, order)
            }
            None => {
                dst.put_u8(0);
                Ok(())
            }
        }
    }

    fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<Option<C::Value>> {
        ensure_remaining(src, 1)?;
        if src.get_u8() == 0 {
            return Ok(None);
        }
        self.inner.decode_with(src, order).map(Some)
    }
}

/// Codec assembled from a pair of closures.
///
/// The closures see the raw buffers and choose their own byte order.
pub struct FnCodec<T, E, D> {
    encode: E,
    decode: D,
    _marker: PhantomData<fn() -> T>,
}

/// Build a codec from separate encode and decode functions.
pub fn from_fns<T, E, D>(encode: E, decode: D) -> FnCodec<T, E, D>
where
    E: Fn(&T, &mut BytesMut) -> Result<()> + Send + Sync,
    D: Fn(&mut Bytes) -> Result<T> + Send + Sync,
{
    FnCodec {
        encode,
        decode,
        _marker: PhantomData,
    }
}

impl<T, E, D> Codec for FnCodec<T, E, D>
where
    E: Fn(&T, &mut BytesMut) -> Result<()> + Send + Sync,
    D: Fn(&mut Bytes) -> Result<T> + Send + Sync,
{
    type Value = T;

    fn encode_with(&self, value: &T, dst: &mut BytesMut, _order: ByteOrder) -> Result<()> {
        (self.encode)(value, dst)
    }

    fn decode_with(&self, src: &mut Bytes, _order: ByteOrder) -> Result<T> {
        (self.decode)(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{utf8, VarUint, I16, I32, I8, U8};
    use crate::traits::CodecExt;

    fn encode<C: Codec>(codec: &C, value: &C::Value) -> Bytes {
        let mut buf = BytesMut::new();
        codec.encode(value, &mut buf).unwrap();
        buf.freeze()
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Celsius(i32);

    #[test]
    fn map_roundtrip() {
        let codec = I32.map(Celsius, |c: &Celsius| c.0);
        let mut wire = encode(&codec, &Celsius(-40));
        assert_eq!(codec.decode(&mut wire).unwrap(), Celsius(-40));
    }

    #[test]
    fn map_propagates_inner_errors() {
        let codec = I32.map(Celsius, |c: &Celsius| c.0);
        let mut wire = Bytes::from_static(&[0x01]);
        assert!(matches!(
            codec.decode(&mut wire),
            Err(CodecError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn try_map_rejects_in_decode_direction() {
        let codec = I8.try_map(
            |v| {
                if v >= 0 {
                    Ok(v as u8)
                } else {
                    Err(CodecError::message("negative"))
                }
            },
            |v: &u8| *v as i8,
        );
        let mut wire = encode(&I8, &-3);
        assert!(matches!(codec.decode(&mut wire), Err(CodecError::Message(_))));
    }

    #[test]
    fn fixed_sequence_has_no_prefix() {
        let codec = I16.sequence(3);
        let wire = encode(&codec, &vec![1, 2, 3]);
        assert_eq!(wire.len(), 6);

        let mut wire = wire;
        assert_eq!(codec.decode(&mut wire).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn fixed_sequence_rejects_wrong_length() {
        let codec = I16.sequence(2);
        let mut buf = BytesMut::new();
        let err = codec.encode(&vec![1, 2, 3], &mut buf).unwrap_err();
        assert!(matches!(
            err,
            CodecError::SequenceLength {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn empty_fixed_sequence() {
        let codec = I32.sequence(0);
        let mut wire = encode(&codec, &Vec::new());
        assert!(wire.is_empty());
        assert!(codec.decode(&mut wire).unwrap().is_empty());
    }

    #[test]
    fn var_sequence_roundtrip_empty_and_full() {
        let codec = utf8().var_sequence(VarUint);

        let empty: Vec<String> = Vec::new();
        let mut wire = encode(&codec, &empty);
        assert_eq!(wire.as_ref(), &[0x00]);
        assert_eq!(codec.decode(&mut wire).unwrap(), empty);

        let names = vec!["alpha".to_string(), "βeta".to_string(), String::new()];
        let mut wire = encode(&codec, &names);
        assert_eq!(codec.decode(&mut wire).unwrap(), names);
    }

    #[test]
    fn var_sequence_at_prefix_capacity() {
        let codec = U8.var_sequence(U8);
        let full: Vec<u8> = (0..=254).collect();
        let mut wire = encode(&codec, &full);
        assert_eq!(codec.decode(&mut wire).unwrap(), full);

        let too_long: Vec<u8> = vec![0; 256];
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(&too_long, &mut buf),
            Err(CodecError::LengthOverflow(256))
        ));
    }

    #[test]
    fn var_sequence_negative_count_is_rejected() {
        let codec = I32.var_sequence(I8);
        let mut wire = encode(&I8, &-1);
        assert!(matches!(
            codec.decode(&mut wire),
            Err(CodecError::InvalidLength(-1))
        ));
    }

    #[test]
    fn var_sequence_count_past_end_is_eof() {
        let codec = I32.var_sequence(I32);
        let mut wire = encode(&I32, &1_000_000);
        assert!(matches!(
            codec.decode(&mut wire),
            Err(CodecError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn zero_width_elements_cannot_outrun_the_body() {
        let unit = from_fns(|_: &(), _: &mut BytesMut| Ok(()), |_: &mut Bytes| Ok(()));
        let codec = unit.var_sequence(I32);
        let mut wire = encode(&I32, &50_000_000);
        assert!(matches!(
            codec.decode(&mut wire),
            Err(CodecError::InvalidLength(50_000_000))
        ));

        // A count the remaining bytes could cover is still honored.
        let mut buf = BytesMut::new();
        codec.encode(&vec![(); 3], &mut buf).unwrap();
        buf.put_slice(&[0xAA; 4]);
        let mut wire = buf.freeze();
        assert_eq!(codec.decode(&mut wire).unwrap(), vec![(); 3]);
        assert_eq!(wire.len(), 4);
    }

    #[test]
    fn nullable_absent_and_present() {
        let codec = utf8().nullable();

        let mut wire = encode(&codec, &None);
        assert_eq!(wire.as_ref(), &[0x00]);
        assert_eq!(codec.decode(&mut wire).unwrap(), None);

        let mut wire = encode(&codec, &Some("present".to_string()));
        assert_eq!(codec.decode(&mut wire).unwrap(), Some("present".to_string()));
    }

    #[test]
    fn nullable_treats_any_nonzero_flag_as_present() {
        let codec = I8.nullable();
        let mut wire = Bytes::from_static(&[0x7F, 0x05]);
        assert_eq!(codec.decode(&mut wire).unwrap(), Some(5));
    }

    #[test]
    fn nested_combinators() {
        let codec = I16.nullable().var_sequence(VarUint).sequence(2);
        let value = vec![vec![Some(1), None], vec![]];
        let mut wire = encode(&codec, &value);
        assert_eq!(codec.decode(&mut wire).unwrap(), value);
        assert!(wire.is_empty());
    }

    #[test]
    fn fn_codec_roundtrip() {
        let codec = from_fns(
            |v: &bool, dst: &mut BytesMut| {
                dst.put_u8(u8::from(*v));
                Ok(())
            },
            |src: &mut Bytes| {
                ensure_remaining(src, 1)?;
                Ok(src.get_u8() != 0)
            },
        );
        let mut wire = encode(&codec, &true);
        assert!(codec.decode(&mut wire).unwrap());
    }

    #[test]
    fn shared_codec_is_object_safe() {
        let codec = I32.map(Celsius, |c: &Celsius| c.0).shared();
        let cloned = codec.clone();
        let mut wire = encode(&codec, &Celsius(21));
        assert_eq!(cloned.decode(&mut wire).unwrap(), Celsius(21));
    }
}
