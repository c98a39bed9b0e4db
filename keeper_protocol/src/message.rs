// Message vocabulary of the server/client channel.
//
// Server → client traffic is a stream of notifications. Every notification
// packet starts with its `NotificationType` (u32), followed by fields whose
// layout is owned by the sim crate's `ServerNotification::encode()`; this
// crate only fixes the tag values so that both ends agree on them without
// depending on the sim.
//
// Client → server traffic is just the `Hello` handshake for now. Player
// commands travel through the build-action path on the server side and are
// out of this crate's scope.

use crate::error::WireError;
use crate::packet::{Packet, PacketReader};
use crate::types::PROTOCOL_VERSION;

crate::wire_enum! {
    /// Tag of a server notification packet. Values are a wire contract.
    pub enum NotificationType {
        TurnStarted = 0,
        CreatureAddDestination = 1,
        SetTurnsPerSecond = 2,
        TileFullnessChange = 3,
        RemoveTrapTile = 4,
        AddTrap = 5,
        PlayerFighting = 6,
        Welcome = 7,
    }
}

/// First frame a client sends after connecting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hello {
    pub protocol_version: u32,
    pub player_name: String,
}

impl Hello {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            player_name: player_name.into(),
        }
    }

    pub fn encode(&self) -> Packet {
        let mut packet = Packet::new();
        packet
            .push(&self.protocol_version)
            .push(&self.player_name);
        packet
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = PacketReader::new(bytes);
        Ok(Self {
            protocol_version: reader.pull()?,
            player_name: reader.pull()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire_enum::WireEnum;

    #[test]
    fn notification_tags_are_stable() {
        assert_eq!(NotificationType::TurnStarted.to_wire(), 0);
        assert_eq!(NotificationType::RemoveTrapTile.to_wire(), 4);
        assert_eq!(NotificationType::Welcome.to_wire(), 7);
        assert_eq!(NotificationType::from_wire(8), None);
    }

    #[test]
    fn hello_roundtrip() {
        let hello = Hello::new("Keeper");
        let packet = hello.encode();
        let decoded = Hello::decode(packet.as_bytes()).unwrap();
        assert_eq!(decoded, hello);
        assert_eq!(decoded.protocol_version, PROTOCOL_VERSION);
    }

    #[test]
    fn truncated_hello_is_an_error() {
        let packet = Hello::new("Keeper").encode();
        let bytes = &packet.as_bytes()[..6];
        assert!(Hello::decode(bytes).is_err());
    }
}
