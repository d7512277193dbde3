//! Packet sets: the caller's sum type of every packet kind a connection
//! speaks.

use std::any::TypeId;

/// A sum type over all packet kinds carried by one connection.
///
/// Usually generated by [`packet_set!`](crate::packet_set). Each variant
/// wraps a distinct kind type, and [`PacketSet::kind`] identifies the kind of
/// a value so the registry can find its codec without inspecting the value.
pub trait PacketSet: Send + Sync + 'static {
    fn kind(&self) -> TypeId;

    fn kind_name(&self) -> &'static str;
}

/// One kind inside packet set `P`.
pub trait PacketVariant<P>: Sized + Send + Sync + 'static {
    /// Human-readable kind name used in errors and logs.
    const NAME: &'static str;

    fn into_packet(self) -> P;

    fn from_packet(packet: &P) -> Option<&Self>;

    fn try_from_packet(packet: P) -> Result<Self, P>;
}

/// Kind id for `V`, matching [`PacketSet::kind`] on a `V` packet.
pub fn kind_of<P, V: PacketVariant<P>>() -> TypeId {
    TypeId::of::<V>()
}

/// Declare a packet set enum and its [`PacketSet`]/[`PacketVariant`] impls.
///
/// ```
/// use packetwire_packet::{packet_set, PacketSet, PacketVariant};
///
/// #[derive(Debug, Clone, PartialEq)]
/// pub struct Ping { pub message: i64 }
/// #[derive(Debug, Clone, PartialEq)]
/// pub struct Pong { pub message: i64 }
///
/// packet_set! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub enum Packet {
///         Ping(Ping),
///         Pong(Pong),
///     }
/// }
///
/// let packet: Packet = Ping { message: 1 }.into();
/// assert_eq!(packet.kind_name(), "Ping");
/// assert_eq!(Ping::from_packet(&packet), Some(&Ping { message: 1 }));
/// ```
#[macro_export]
macro_rules! packet_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident($ty:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($ty)),+
        }

        impl $crate::PacketSet for $name {
            fn kind(&self) -> ::std::any::TypeId {
                match self {
                    $($name::$variant(_) => ::std::any::TypeId::of::<$ty>(),)+
                }
            }

            fn kind_name(&self) -> &'static str {
                match self {
                    $($name::$variant(_) => <$ty as $crate::PacketVariant<$name>>::NAME,)+
                }
            }
        }

        $(
            impl $crate::PacketVariant<$name> for $ty {
                const NAME: &'static str = stringify!($variant);

                fn into_packet(self) -> $name {
                    $name::$variant(self)
                }

                #[allow(unreachable_patterns)]
                fn from_packet(packet: &$name) -> ::std::option::Option<&Self> {
                    match packet {
                        $name::$variant(value) => ::std::option::Option::Some(value),
                        _ => ::std::option::Option::None,
                    }
                }

                #[allow(unreachable_patterns)]
                fn try_from_packet(packet: $name) -> ::std::result::Result<Self, $name> {
                    match packet {
                        $name::$variant(value) => ::std::result::Result::Ok(value),
                        other => ::std::result::Result::Err(other),
                    }
                }
            }

            impl ::std::convert::From<$ty> for $name {
                fn from(value: $ty) -> Self {
                    $name::$variant(value)
                }
            }
        )+
    };
}
