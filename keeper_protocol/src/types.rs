// Identifier types shared by the server and its clients.
//
// `PlayerId` is assigned by the server when a connection completes its
// handshake. It is a compact integer, not a seat: seats are a simulation
// concept (see `keeper_sim::seat`) and a seat may have no player at all
// (AI-controlled or empty).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::packet::{Packet, PacketRead, PacketReader, PacketWrite};

/// Version of the packet layout. Bumped whenever any record's field order
/// changes; clients announce it in `Hello`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Server-assigned player identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

impl PacketWrite for PlayerId {
    fn write_to(&self, packet: &mut Packet) {
        packet.push_u32(self.0);
    }
}

impl PacketRead for PlayerId {
    fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, WireError> {
        reader.read_u32().map(PlayerId)
    }
}
