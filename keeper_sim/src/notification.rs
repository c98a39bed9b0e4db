// Server notifications and the channel that carries them out of the sim.
//
// A `ServerNotification` is a recipient plus a typed `NotificationKind`.
// The sim builds them as plain data; `encode()` lays them out as a packet
// (tag first, then the kind's fields) only when the dispatcher is about to
// send them. Clients call `NotificationKind::decode()` on the same bytes.
//
// Notifications leave the sim through a `NotificationSender`, a thin wrapper
// over an `mpsc::Sender`: queueing never blocks and never fails the caller.
// If the receiving side is gone (server shutting down) the notification is
// dropped with a warning.
//
// Recipients:
// - `All`: broadcast to every connected player.
// - `Player(p)`: one player.
// - `Nobody`: the seat the event concerns has no player (AI or empty seat).
//   The dispatcher discards these; they are still queued so the sim never
//   has to special-case unoccupied seats.
//
// See also: `keeper_protocol::message` for the tag values,
// `keeper_server::dispatch` for delivery.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use keeper_protocol::{NotificationType, Packet, PacketReader, WireError};
use tracing::warn;

use crate::types::{CreatureId, PlayerId, SeatId, TileCoord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipient {
    All,
    Player(PlayerId),
    Nobody,
}

impl Recipient {
    /// Address the owner of a seat, or nobody if the seat has no player.
    pub fn seat_owner(player: Option<PlayerId>) -> Self {
        player.map_or(Recipient::Nobody, Recipient::Player)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NotificationKind {
    TurnStarted {
        turn: u64,
    },
    CreatureAddDestination {
        creature: CreatureId,
        destination: TileCoord,
    },
    SetTurnsPerSecond {
        turns_per_second: f64,
    },
    TileFullnessChange {
        tile: TileCoord,
        fullness: f64,
    },
    /// The named trap lost one of its tiles.
    RemoveTrapTile {
        trap_name: String,
        tile: TileCoord,
    },
    /// A complete trap record in packet form (see `Trap::encode_packet`).
    AddTrap {
        record: Vec<u8>,
    },
    /// The recipient's traps fired this tick.
    PlayerFighting,
    /// Handshake reply: the id the server assigned and the bound seat.
    Welcome {
        player: PlayerId,
        seat: Option<SeatId>,
    },
}

impl NotificationKind {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationKind::TurnStarted { .. } => NotificationType::TurnStarted,
            NotificationKind::CreatureAddDestination { .. } => {
                NotificationType::CreatureAddDestination
            }
            NotificationKind::SetTurnsPerSecond { .. } => NotificationType::SetTurnsPerSecond,
            NotificationKind::TileFullnessChange { .. } => NotificationType::TileFullnessChange,
            NotificationKind::RemoveTrapTile { .. } => NotificationType::RemoveTrapTile,
            NotificationKind::AddTrap { .. } => NotificationType::AddTrap,
            NotificationKind::PlayerFighting => NotificationType::PlayerFighting,
            NotificationKind::Welcome { .. } => NotificationType::Welcome,
        }
    }

    fn write_payload(&self, packet: &mut Packet) {
        match self {
            NotificationKind::TurnStarted { turn } => {
                packet.push_u64(*turn);
            }
            NotificationKind::CreatureAddDestination {
                creature,
                destination,
            } => {
                packet.push(creature).push(destination);
            }
            NotificationKind::SetTurnsPerSecond { turns_per_second } => {
                packet.push_f64(*turns_per_second);
            }
            NotificationKind::TileFullnessChange { tile, fullness } => {
                packet.push(tile).push_f64(*fullness);
            }
            NotificationKind::RemoveTrapTile { trap_name, tile } => {
                packet.push_str(trap_name).push(tile);
            }
            NotificationKind::AddTrap { record } => {
                packet.push_raw(record);
            }
            NotificationKind::PlayerFighting => {}
            NotificationKind::Welcome { player, seat } => {
                packet.push(player).push_bool(seat.is_some());
                if let Some(seat) = seat {
                    packet.push(seat);
                }
            }
        }
    }

    /// Tag followed by the payload.
    pub fn encode(&self) -> Packet {
        let mut packet = Packet::new();
        packet.push_enum(self.notification_type());
        self.write_payload(&mut packet);
        packet
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = PacketReader::new(bytes);
        let kind = match reader.pull_enum::<NotificationType>()? {
            NotificationType::TurnStarted => NotificationKind::TurnStarted {
                turn: reader.read_u64()?,
            },
            NotificationType::CreatureAddDestination => NotificationKind::CreatureAddDestination {
                creature: reader.pull()?,
                destination: reader.pull()?,
            },
            NotificationType::SetTurnsPerSecond => NotificationKind::SetTurnsPerSecond {
                turns_per_second: reader.read_f64()?,
            },
            NotificationType::TileFullnessChange => NotificationKind::TileFullnessChange {
                tile: reader.pull()?,
                fullness: reader.read_f64()?,
            },
            NotificationType::RemoveTrapTile => NotificationKind::RemoveTrapTile {
                trap_name: reader.read_string()?,
                tile: reader.pull()?,
            },
            NotificationType::AddTrap => NotificationKind::AddTrap {
                record: reader.take_rest().to_vec(),
            },
            NotificationType::PlayerFighting => NotificationKind::PlayerFighting,
            NotificationType::Welcome => {
                let player = reader.pull()?;
                let seat = if reader.read_bool()? {
                    Some(reader.pull()?)
                } else {
                    None
                };
                NotificationKind::Welcome { player, seat }
            }
        };
        Ok(kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerNotification {
    pub recipient: Recipient,
    pub kind: NotificationKind,
}

impl ServerNotification {
    pub fn broadcast(kind: NotificationKind) -> Self {
        Self {
            recipient: Recipient::All,
            kind,
        }
    }

    pub fn to_player(player: PlayerId, kind: NotificationKind) -> Self {
        Self {
            recipient: Recipient::Player(player),
            kind,
        }
    }

    pub fn to_seat_owner(player: Option<PlayerId>, kind: NotificationKind) -> Self {
        Self {
            recipient: Recipient::seat_owner(player),
            kind,
        }
    }

    pub fn encode(&self) -> Packet {
        self.kind.encode()
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::channel();
    (NotificationSender { tx }, NotificationReceiver { rx })
}

#[derive(Clone, Debug)]
pub struct NotificationSender {
    tx: Sender<ServerNotification>,
}

impl NotificationSender {
    pub fn queue(&self, notification: ServerNotification) {
        if let Err(err) = self.tx.send(notification) {
            warn!(
                kind = ?err.0.kind.notification_type(),
                "notification receiver is gone, dropping notification"
            );
        }
    }
}

#[derive(Debug)]
pub struct NotificationReceiver {
    rx: Receiver<ServerNotification>,
}

impl NotificationReceiver {
    pub fn try_next(&self) -> Option<ServerNotification> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<ServerNotification, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Everything queued so far, in queue order.
    pub fn drain(&self) -> Vec<ServerNotification> {
        self.rx.try_iter().collect()
    }
}
