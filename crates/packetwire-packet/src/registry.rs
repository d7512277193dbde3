use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use packetwire_codec::{from_fns, ByteOrder, Codec, CodecError};
use packetwire_frame::{Mode, OutgoingFrame};
use tracing::debug;

use crate::error::{PacketError, Result};
use crate::set::{PacketSet, PacketVariant};

type DecodeFn<P> =
    Box<dyn Fn(&mut Bytes, ByteOrder) -> packetwire_codec::Result<P> + Send + Sync>;
type EncodeFn<P> =
    Arc<dyn Fn(&P, &mut BytesMut, ByteOrder) -> packetwire_codec::Result<()> + Send + Sync>;
type Listener<P> = Box<dyn Fn(&P) + Send + Sync>;

struct Entry<P> {
    packet_type: u32,
    kind_name: &'static str,
    decode: DecodeFn<P>,
    encode: EncodeFn<P>,
    listeners: Vec<Listener<P>>,
}

/// Maps packet type ids to kinds and their codecs.
///
/// Built before the connection starts. Entries live in a dense table indexed
/// both by wire type id and by kind, so dispatch in either direction is one
/// hash lookup.
pub struct PacketRegistry<P> {
    entries: Vec<Entry<P>>,
    by_type: HashMap<u32, usize>,
    by_kind: HashMap<TypeId, usize>,
}

impl<P: PacketSet> PacketRegistry<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_type: HashMap::new(),
            by_kind: HashMap::new(),
        }
    }

    /// Register kind `V` under `packet_type` with `codec`.
    ///
    /// Fails without changing anything if either the id or the kind is
    /// already taken.
    pub fn register<V, C>(&mut self, packet_type: u32, codec: C) -> Result<&mut Self>
    where
        V: PacketVariant<P>,
        C: Codec<Value = V> + 'static,
    {
        self.ensure_free::<V>(packet_type)?;

        let codec = Arc::new(codec);
        let decoder = Arc::clone(&codec);
        let decode: DecodeFn<P> = Box::new(move |src: &mut Bytes, order| {
            decoder.decode_with(src, order).map(V::into_packet)
        });
        let encode: EncodeFn<P> = Arc::new(move |packet: &P, dst: &mut BytesMut, order| {
            match V::from_packet(packet) {
                Some(value) => codec.encode_with(value, dst, order),
                None => Err(CodecError::message(format!(
                    "{} encoder given a {} packet",
                    V::NAME,
                    packet.kind_name()
                ))),
            }
        });

        let index = self.entries.len();
        self.entries.push(Entry {
            packet_type,
            kind_name: V::NAME,
            decode,
            encode,
            listeners: Vec::new(),
        });
        self.by_type.insert(packet_type, index);
        self.by_kind.insert(TypeId::of::<V>(), index);
        debug!(kind = V::NAME, packet_type, "registered packet kind");
        Ok(self)
    }

    /// Register kind `V` with a separate encoder and decoder.
    pub fn register_fns<V, E, D>(
        &mut self,
        packet_type: u32,
        encode: E,
        decode: D,
    ) -> Result<&mut Self>
    where
        V: PacketVariant<P>,
        E: Fn(&V, &mut BytesMut) -> packetwire_codec::Result<()> + Send + Sync + 'static,
        D: Fn(&mut Bytes) -> packetwire_codec::Result<V> + Send + Sync + 'static,
    {
        self.register::<V, _>(packet_type, from_fns(encode, decode))
    }

    /// Add a passive listener for every received `V`, whatever its mode.
    ///
    /// `V` must already be registered.
    pub fn listen<V, F>(&mut self, listener: F) -> Result<&mut Self>
    where
        V: PacketVariant<P>,
        F: Fn(&V) + Send + Sync + 'static,
    {
        let index = *self
            .by_kind
            .get(&TypeId::of::<V>())
            .ok_or(PacketError::UnregisteredKind(V::NAME))?;
        self.entries[index].listeners.push(Box::new(move |packet: &P| {
            if let Some(value) = V::from_packet(packet) {
                listener(value);
            }
        }));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_type(&self, packet_type: u32) -> bool {
        self.by_type.contains_key(&packet_type)
    }

    /// The wire type id for `packet`'s kind.
    pub fn packet_type_of(&self, packet: &P) -> Result<u32> {
        self.entry_for_packet(packet).map(|entry| entry.packet_type)
    }

    /// Registered kind name for a wire type id.
    pub fn kind_name_of(&self, packet_type: u32) -> Option<&'static str> {
        self.entry_for_type(packet_type).map(|entry| entry.kind_name)
    }

    /// Decode a body of the given type in the connection's byte order and
    /// run its listeners. `None` when the type id is unknown.
    pub(crate) fn decode(
        &self,
        packet_type: u32,
        body: &mut Bytes,
        order: ByteOrder,
    ) -> Option<packetwire_codec::Result<P>> {
        let entry = self.entry_for_type(packet_type)?;
        Some((entry.decode)(body, order).inspect(|packet| {
            for listener in &entry.listeners {
                listener(packet);
            }
        }))
    }

    /// Build a frame whose body is `packet` encoded at flush time.
    pub(crate) fn outgoing(
        &self,
        mode: Mode,
        request_id: u32,
        packet: P,
        order: ByteOrder,
    ) -> Result<OutgoingFrame> {
        let entry = self.entry_for_packet(&packet)?;
        let encode = Arc::clone(&entry.encode);
        Ok(OutgoingFrame::new(
            mode,
            entry.packet_type,
            request_id,
            move |dst: &mut BytesMut| encode(&packet, dst, order).map_err(Into::into),
        ))
    }

    fn entry_for_type(&self, packet_type: u32) -> Option<&Entry<P>> {
        self.by_type.get(&packet_type).map(|&index| &self.entries[index])
    }

    fn entry_for_packet(&self, packet: &P) -> Result<&Entry<P>> {
        self.by_kind
            .get(&packet.kind())
            .map(|&index| &self.entries[index])
            .ok_or(PacketError::UnregisteredKind(packet.kind_name()))
    }

    fn ensure_free<V: PacketVariant<P>>(&self, packet_type: u32) -> Result<()> {
        if self.by_type.contains_key(&packet_type) {
            return Err(PacketError::DuplicateType(packet_type));
        }
        if self.by_kind.contains_key(&TypeId::of::<V>()) {
            return Err(PacketError::DuplicateKind(V::NAME));
        }
        Ok(())
    }
}

impl<P: PacketSet> Default for PacketRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for PacketRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in &self.entries {
            map.entry(&format_args!("0x{:08x}", entry.packet_type), &entry.kind_name);
        }
        map.finish()
    }
}
