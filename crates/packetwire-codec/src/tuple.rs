//! Record codecs built from per-field codecs.
//!
//! A tuple codec pairs every field codec with a projection from the record to
//! that field, plus one function that rebuilds the record from decoded
//! fields. Fields are written and read in declaration order.
//!
//! ```
//! use packetwire_codec::{tuple3, utf8, Codec, CodecExt, I32};
//!
//! #[derive(Debug, PartialEq)]
//! struct Customer {
//!     name: String,
//!     age: i32,
//!     reward_code: Option<String>,
//! }
//!
//! let codec = tuple3(
//!     utf8(), |c: &Customer| &c.name,
//!     I32, |c: &Customer| &c.age,
//!     utf8().nullable(), |c: &Customer| &c.reward_code,
//!     |name, age, reward_code| Customer { name, age, reward_code },
//! );
//!
//! let alice = Customer { name: "Alice".into(), age: 42, reward_code: None };
//! let mut buf = bytes::BytesMut::new();
//! codec.encode(&alice, &mut buf).unwrap();
//! assert_eq!(codec.decode(&mut buf.freeze()).unwrap(), alice);
//! ```

use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::primitive::ByteOrder;
use crate::traits::Codec;

macro_rules! tuple_codec {
    ($name:ident, $ctor:ident; $(($field:ident, $c:ident, $g:ident, $cv:ident, $gv:ident)),+) => {
        #[doc = concat!("Record codec returned by [`", stringify!($ctor), "`].")]
        pub struct $name<T, $($c, $g,)+ F> {
            $($field: ($c, $g),)+
            factory: F,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T, $($c, $g,)+ F> Codec for $name<T, $($c, $g,)+ F>
        where
            $(
                $c: Codec,
                $g: Fn(&T) -> &$c::Value + Send + Sync,
            )+
            F: Fn($($c::Value),+) -> T + Send + Sync,
        {
            type Value = T;

            fn encode_with(&self, value: &T, dst: &mut BytesMut, order: ByteOrder) -> Result<()> {
                $(
                    self.$field.0.encode_with((self.$field.1)(value), dst, order)?;
                )+
                Ok(())
            }

            fn decode_with(&self, src: &mut Bytes, order: ByteOrder) -> Result<T> {
                Ok((self.factory)($(self.$field.0.decode_with(src, order)?),+))
            }
        }

        #[allow(clippy::too_many_arguments)]
        pub fn $ctor<T, $($c, $g,)+ F>($($cv: $c, $gv: $g,)+ factory: F) -> $name<T, $($c, $g,)+ F>
        where
            $(
                $c: Codec,
                $g: Fn(&T) -> &$c::Value + Send + Sync,
            )+
            F: Fn($($c::Value),+) -> T + Send + Sync,
        {
            $name {
                $($field: ($cv, $gv),)+
                factory,
                _marker: PhantomData,
            }
        }
    };
}

tuple_codec!(Tuple1, tuple1; (f1, C1, G1, c1, g1));
tuple_codec!(Tuple2, tuple2; (f1, C1, G1, c1, g1), (f2, C2, G2, c2, g2));
tuple_codec!(Tuple3, tuple3;
    (f1, C1, G1, c1, g1), (f2, C2, G2, c2, g2), (f3, C3, G3, c3, g3));
tuple_codec!(Tuple4, tuple4;
    (f1, C1, G1, c1, g1), (f2, C2, G2, c2, g2), (f3, C3, G3, c3, g3),
    (f4, C4, G4, c4, g4));
tuple_codec!(Tuple5, tuple5;
    (f1, C1, G1, c1, g1), (f2, C2, G2, c2, g2), (f3, C3, G3, c3, g3),
    (f4, C4, G4, c4, g4), (f5, C5, G5, c5, g5));
tuple_codec!(Tuple6, tuple6;
    (f1, C1, G1, c1, g1), (f2, C2, G2, c2, g2), (f3, C3, G3, c3, g3),
    (f4, C4, G4, c4, g4), (f5, C5, G5, c5, g5), (f6, C6, G6, c6, g6));
tuple_codec!(Tuple7, tuple7;
    (f1, C1, G1, c1, g1), (f2, C2, G2, c2, g2), (f3, C3, G3, c3, g3),
    (f4, C4, G4, c4, g4), (f5, C5, G5, c5, g5), (f6, C6, G6, c6, g6),
    (f7, C7, G7, c7, g7));
tuple_codec!(Tuple8, tuple8;
    (f1, C1, G1, c1, g1), (f2, C2, G2, c2, g2), (f3, C3, G3, c3, g3),
    (f4, C4, G4, c4, g4), (f5, C5, G5, c5, g5), (f6, C6, G6, c6, g6),
    (f7, C7, G7, c7, g7), (f8, C8, G8, c8, g8));
