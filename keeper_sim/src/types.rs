// Core types shared across the simulation.
//
// Defines tile coordinates, seat and creature identifiers, and the `TrapType`
// tag. Every type that appears in a packet or save record implements the
// protocol crate's `PacketWrite`/`PacketRead`; `TrapType` is declared through
// `wire_enum!` so its numbering is a fixed wire contract.
//
// See also: `tile.rs` for the grid addressed by `TileCoord`, `seat.rs` for
// the seat table, `registry.rs` for how `TrapType` selects a constructor.

use std::fmt;

use keeper_protocol::{Packet, PacketRead, PacketReader, PacketWrite, WireError};
use serde::{Deserialize, Serialize};

pub use keeper_protocol::PlayerId;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// Position of a tile in the map grid. `x` grows east, `y` grows south.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// King-move distance: diagonal steps count as one.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// True if both tiles share a row or a column.
    pub fn is_aligned_with(self, other: Self) -> bool {
        self.x == other.x || self.y == other.y
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl PacketWrite for TileCoord {
    fn write_to(&self, packet: &mut Packet) {
        packet.push_i32(self.x).push_i32(self.y);
    }
}

impl PacketRead for TileCoord {
    fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, WireError> {
        Ok(Self::new(reader.read_i32()?, reader.read_i32()?))
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A seat: the ownership slot of one faction. Seat ids are chosen by the
/// level designer and may be any integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatId(pub i32);

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat#{}", self.0)
    }
}

impl PacketWrite for SeatId {
    fn write_to(&self, packet: &mut Packet) {
        packet.push_i32(self.0);
    }
}

impl PacketRead for SeatId {
    fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, WireError> {
        reader.read_i32().map(SeatId)
    }
}

/// Map-assigned creature identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatureId(pub u32);

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "creature#{}", self.0)
    }
}

impl PacketWrite for CreatureId {
    fn write_to(&self, packet: &mut Packet) {
        packet.push_u32(self.0);
    }
}

impl PacketRead for CreatureId {
    fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, WireError> {
        reader.read_u32().map(CreatureId)
    }
}

// ---------------------------------------------------------------------------
// Trap type tag
// ---------------------------------------------------------------------------

keeper_protocol::wire_enum! {
    /// Kind of trap. The numbering is persisted in save files and packets;
    /// never renumber, only append.
    #[derive(Serialize, Deserialize)]
    pub enum TrapType {
        Null = 0,
        Cannon = 1,
        Spike = 2,
        Boulder = 3,
    }
}

impl TrapType {
    /// Every type a player can build (everything except `Null`).
    pub const BUILDABLE: [TrapType; 3] = [TrapType::Cannon, TrapType::Spike, TrapType::Boulder];

    /// Display name, also used as the prefix of generated trap names.
    pub fn name(self) -> &'static str {
        match self {
            TrapType::Null => "NullTrapType",
            TrapType::Cannon => "Cannon",
            TrapType::Spike => "Spike",
            TrapType::Boulder => "Boulder",
        }
    }
}

impl fmt::Display for TrapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
