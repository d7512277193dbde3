use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};

use crate::combinator::{Map, Nullable, Sequence, TryMap, VarSequence};
use crate::error::{CodecError, Result};
use crate::primitive::ByteOrder;

/// Paired encode/decode description for one value type.
///
/// Encoding appends to `dst` and decoding consumes from the front of `src`,
/// so codecs chain without knowing each other's byte lengths up front.
/// Implementations hold no mutable state and can be shared across threads.
///
/// The byte order passed to [`Codec::encode_with`] and [`Codec::decode_with`]
/// is the connection's. Composite codecs hand it down unchanged so every
/// integer in a body follows the frame header.
pub trait Codec: Send + Sync {
    /// The value this codec reads and writes.
    type Value;

    /// Append the encoded form of `value` to `dst`, using `order` for
    /// integers that do not pin their own.
    fn encode_with(&self, value: &Self::Value, dst: &mut BytesMut, order: ByteOrder) -> Result<()>;

    /// Decode one value from the front of `src`, advancing it.
    fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<Self::Value>;

    /// [`Codec::encode_with`] in the default (big-endian) order.
    fn encode(&self, value: &Self::Value, dst: &mut BytesMut) -> Result<()> {
        self.encode_with(value, dst, ByteOrder::default())
    }

    /// [`Codec::decode_with`] in the default (big-endian) order.
    fn decode(&self, src: &mut Bytes) -> Result<Self::Value> {
        self.decode_with(src, ByteOrder::default())
    }
}

macro_rules! forward_codec {
    ($($ptr:ty),+) => {
        $(
            impl<C: Codec + ?Sized> Codec for $ptr {
                type Value = C::Value;

                fn encode_with(
                    &self,
                    value: &Self::Value,
                    dst: &mut BytesMut,
                    order: ByteOrder,
                ) -> Result<()> {
                    (**self).encode_with(value, dst, order)
                }

                fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<Self::Value> {
                    (**self).decode_with(src, order)
                }
            }
        )+
    };
}

forward_codec!(&C, Box<C>, Arc<C>);

/// Shared, type-erased codec handle.
pub type SharedCodec<T> = Arc<dyn Codec<Value = T>>;

/// Combinator methods available on every codec.
pub trait CodecExt: Codec + Sized {
    /// Convert to another value type with a pair of total functions.
    fn map<U, F, G>(self, forward: F, backward: G) -> Map<Self, F, G>
    where
        F: Fn(Self::Value) -> U + Send + Sync,
        G: Fn(&U) -> Self::Value + Send + Sync,
    {
        Map::new(self, forward, backward)
    }

    /// Like [`CodecExt::map`], but the decode direction may reject a value.
    fn try_map<U, F, G>(self, forward: F, backward: G) -> TryMap<Self, F, G>
    where
        F: Fn(Self::Value) -> Result<U> + Send + Sync,
        G: Fn(&U) -> Self::Value + Send + Sync,
    {
        TryMap::new(self, forward, backward)
    }

    /// Exactly `len` elements with no length prefix.
    fn sequence(self, len: usize) -> Sequence<Self> {
        Sequence::new(self, len)
    }

    /// Elements preceded by a count written with `length`.
    fn var_sequence<L>(self, length: L) -> VarSequence<Self, L>
    where
        L: Codec,
    {
        VarSequence::new(self, length)
    }

    /// A presence byte followed by the value when present.
    fn nullable(self) -> Nullable<Self> {
        Nullable::new(self)
    }

    /// Erase the concrete codec type behind an `Arc`.
    fn shared(self) -> SharedCodec<Self::Value>
    where
        Self: 'static,
    {
        Arc::new(self)
    }
}

impl<C: Codec> CodecExt for C {}

/// Fail with [`CodecError::UnexpectedEof`] unless `src` holds `needed` bytes.
pub(crate) fn ensure_remaining(src: &Bytes, needed: usize) -> Result<()> {
    if src.remaining() < needed {
        return Err(CodecError::UnexpectedEof {
            needed,
            remaining: src.remaining(),
        });
    }
    Ok(())
}
