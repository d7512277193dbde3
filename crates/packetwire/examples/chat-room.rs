//! A tiny chat room over an in-memory duplex channel.
//!
//! Shows a custom packet set with composite codecs, notifications with
//! passive listeners, and a request answered with a list.
//!
//! Run with:
//!   cargo run --example chat-room

use std::sync::Mutex;

use packetwire::codec::{tuple1, tuple2, utf8, CodecExt, VarUint};
use packetwire::demo;
use packetwire::packet::{
    packet_set, BoxError, Connection, PacketHandler, PacketRegistry, PacketSet, Request,
};
use packetwire::transport::duplex;

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub name: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Say {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhoIsHere;

#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    pub names: Vec<String>,
}

packet_set! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum ChatPacket {
        Join(Join),
        Say(Say),
        WhoIsHere(WhoIsHere),
        Roster(Roster),
    }
}

fn registry() -> packetwire::packet::Result<PacketRegistry<ChatPacket>> {
    let mut registry = PacketRegistry::new();
    registry
        .register::<Join, _>(
            0x10,
            tuple2(
                utf8(),
                |join: &Join| &join.name,
                utf8().nullable(),
                |join: &Join| &join.status,
                |name, status| Join { name, status },
            ),
        )?
        .register::<Say, _>(0x11, tuple1(utf8(), |say: &Say| &say.text, |text| Say { text }))?
        .register_fns::<WhoIsHere, _, _>(0x20, |_, _| Ok(()), |_| Ok(WhoIsHere))?
        .register::<Roster, _>(
            0x21,
            tuple1(
                utf8().var_sequence(VarUint),
                |roster: &Roster| &roster.names,
                |names| Roster { names },
            ),
        )?
        .listen::<Say, _>(|say| eprintln!("[listener] someone said {:?}", say.text))?;
    Ok(registry)
}

#[derive(Default)]
struct Room {
    members: Mutex<Vec<String>>,
}

impl PacketHandler<ChatPacket> for Room {
    fn on_request(&self, request: &Request<ChatPacket>) -> Result<(), BoxError> {
        match request.packet() {
            ChatPacket::WhoIsHere(_) => {
                let names = self.members.lock().map_err(|_| "room poisoned")?.clone();
                request.respond_success(Roster { names })?;
                Ok(())
            }
            other => Err(format!("{} is not a request", other.kind_name()).into()),
        }
    }

    fn on_notification(&self, packet: ChatPacket) {
        match packet {
            ChatPacket::Join(join) => {
                eprintln!("{} joined ({:?})", join.name, join.status);
                if let Ok(mut members) = self.members.lock() {
                    members.push(join.name);
                }
            }
            ChatPacket::Say(say) => eprintln!("message: {}", say.text),
            other => eprintln!("unexpected notification {other:?}"),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (mut guest_end, mut room_end) = duplex();
    let guest = Connection::new(registry()?, Room::default());
    let room = Connection::new(registry()?, Room::default());

    guest.queue_notification(Join {
        name: "ada".into(),
        status: Some("compiling".into()),
    })?;
    guest.queue_notification(Join {
        name: "grace".into(),
        status: None,
    })?;
    guest.queue_notification(Say {
        text: "héllo, wörld".into(),
    })?;
    let mut roster = guest.queue_request(WhoIsHere)?;

    let outcome = loop {
        demo::step(&guest, &mut guest_end)?;
        demo::step(&room, &mut room_end)?;
        if let Some(outcome) = roster.try_take() {
            break outcome;
        }
    };

    match outcome {
        Ok(ChatPacket::Roster(roster)) => println!("here: {}", roster.names.join(", ")),
        Ok(other) => println!("unexpected response {other:?}"),
        Err(err) => println!("request failed: {err}"),
    }
    Ok(())
}
