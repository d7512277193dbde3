//! Composable binary codecs for packet bodies.
//!
//! A [`Codec`] pairs an encoder and a decoder for one value type. Primitive
//! codecs cover fixed-width integers, unsigned varints, length-prefixed blobs
//! and UTF-8 strings. Combinators in [`CodecExt`] and the `tupleN` builders
//! compose them into codecs for whole records.
//!
//! Encoding appends to a `BytesMut`; decoding consumes from the front of a
//! `Bytes`. Nothing here performs I/O.

pub mod combinator;
pub mod error;
pub mod primitive;
pub mod traits;
pub mod tuple;

pub use combinator::{from_fns, FnCodec, LengthValue, Map, Nullable, Sequence, TryMap, VarSequence};
pub use error::{CodecError, Result};
pub use primitive::{
    utf8, Blob, ByteOrder, FixedInt, Int, Utf8, VarUint, I16, I32, I64, I8, U16, U32, U64, U8,
};
pub use traits::{Codec, CodecExt, SharedCodec};
pub use tuple::{
    tuple1, tuple2, tuple3, tuple4, tuple5, tuple6, tuple7, tuple8, Tuple1, Tuple2, Tuple3,
    Tuple4, Tuple5, Tuple6, Tuple7, Tuple8,
};
