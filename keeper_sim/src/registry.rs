// Trap registry and trap record codec.
//
// `TrapRegistry` maps each `TrapType` to a constructor that builds the
// type's `TrapBehavior` from its `TrapConfig`. Decoding a trap record reads
// the type tag, looks the constructor up in this table, then imports the
// shared fields. New trap kinds are added with `register()`; the decode
// path never changes.
//
// Record layout (identical field order on both channels):
//   type tag, name, seat id, tile count, then (x, y) per tile
// - Packet: `u32` tag, `u32`-prefixed UTF-8 name, `i32` seat, `u32` count,
//   `i32` pairs.
// - Save stream: `tag\tname\tseat\tcount\n` then `x\ty\n` per tile.
//
// Tag 0 (`TrapType::Null`) decodes to `Ok(None)`: the slot is empty, not
// malformed. An unknown or unregistered tag is an error.
//
// Import is transactional: every field is read, and the name, the seat and
// all tiles are checked against the host before any tile is touched, so a
// failed decode leaves the map exactly as it was.
//
// See also: `trap.rs` for `Trap`, `map.rs` for `write_traps`/`read_traps`
// which frame a whole trap section with a count line.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use keeper_protocol::{Packet, PacketReader, SaveReader, SaveWriter, WireEnum, WireError};
use tracing::{error, info};

use crate::config::TrapConfig;
use crate::error::{BuildError, DecodeError};
use crate::host::TrapHost;
use crate::trap::{Trap, TrapBehavior};
use crate::trap_kinds::{Boulder, Cannon, Spike};
use crate::types::{SeatId, TileCoord, TrapType};

pub type TrapConstructor = fn(&TrapConfig) -> Box<dyn TrapBehavior>;

/// Reject absurd tile counts before allocating for them.
const MAX_TILES_PER_TRAP: u32 = 4096;

#[derive(Clone, Debug)]
pub struct TrapRegistry {
    constructors: BTreeMap<TrapType, TrapConstructor>,
}

impl Default for TrapRegistry {
    fn default() -> Self {
        Self::with_builtin_traps()
    }
}

impl TrapRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn with_builtin_traps() -> Self {
        let mut registry = Self::empty();
        registry.register(TrapType::Cannon, Cannon::construct);
        registry.register(TrapType::Spike, Spike::construct);
        registry.register(TrapType::Boulder, Boulder::construct);
        registry
    }

    /// Add or replace the constructor for `trap_type`. `Null` cannot be
    /// registered; it always decodes to an empty slot.
    pub fn register(
        &mut self,
        trap_type: TrapType,
        constructor: TrapConstructor,
    ) -> Option<TrapConstructor> {
        if trap_type == TrapType::Null {
            return None;
        }
        self.constructors.insert(trap_type, constructor)
    }

    pub fn is_registered(&self, trap_type: TrapType) -> bool {
        self.constructors.contains_key(&trap_type)
    }

    /// A named trap with no tiles, built from the host's config.
    pub fn create(
        &self,
        trap_type: TrapType,
        name: impl Into<String>,
        seat: SeatId,
        host: &dyn TrapHost,
    ) -> Result<Trap, BuildError> {
        let constructor = self
            .constructors
            .get(&trap_type)
            .ok_or(BuildError::NotBuildable(trap_type))?;
        let config = host
            .config()
            .trap(trap_type)
            .ok_or(BuildError::MissingTrapConfig(trap_type))?;
        Ok(Trap::new(name, seat, config, constructor(config)))
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    pub fn decode_from_packet(
        &self,
        reader: &mut PacketReader<'_>,
        host: &mut dyn TrapHost,
    ) -> Result<Option<Trap>, DecodeError> {
        let tag = reader.read_u32()?;
        let Some(trap_type) = self.resolve_tag(tag)? else {
            return Ok(None);
        };
        let name = reader.read_string()?;
        let seat: SeatId = reader.pull()?;
        let count = read_tile_count(reader.read_u32()?)?;
        let mut tiles = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tiles.push(reader.pull::<TileCoord>()?);
        }
        self.import(trap_type, name, seat, &tiles, host).map(Some)
    }

    pub fn decode_from_stream<R: BufRead>(
        &self,
        reader: &mut SaveReader<R>,
        host: &mut dyn TrapHost,
    ) -> Result<Option<Trap>, DecodeError> {
        let tag: u32 = reader.token()?;
        let Some(trap_type) = self.resolve_tag(tag)? else {
            return Ok(None);
        };
        let name: String = reader.token()?;
        let seat = SeatId(reader.token()?);
        let count = read_tile_count(reader.token()?)?;
        let mut tiles = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tiles.push(TileCoord::new(reader.token()?, reader.token()?));
        }
        self.import(trap_type, name, seat, &tiles, host).map(Some)
    }

    fn resolve_tag(&self, tag: u32) -> Result<Option<TrapType>, DecodeError> {
        match TrapType::from_wire(tag) {
            Some(TrapType::Null) => Ok(None),
            Some(trap_type) if self.is_registered(trap_type) => Ok(Some(trap_type)),
            _ => {
                error!(tag, "unknown trap type tag in trap record");
                Err(DecodeError::UnknownTrapType(tag))
            }
        }
    }

    /// Resolve everything, then build and attach.
    fn import(
        &self,
        trap_type: TrapType,
        name: String,
        seat: SeatId,
        tiles: &[TileCoord],
        host: &mut dyn TrapHost,
    ) -> Result<Trap, DecodeError> {
        if host.has_trap(&name) {
            error!(trap = %name, "trap record reuses the name of a placed trap");
            return Err(DecodeError::DuplicateTrap(name));
        }
        if host.seat(seat).is_none() {
            error!(trap = %name, %seat, "trap record references unknown seat");
            return Err(DecodeError::UnknownSeat(seat));
        }
        if let Some(missing) = tiles.iter().find(|&&t| host.tile(t).is_none()) {
            error!(trap = %name, tile = %missing, "trap record references unknown tile");
            return Err(DecodeError::UnknownTile {
                x: missing.x,
                y: missing.y,
            });
        }
        let constructor = self
            .constructors
            .get(&trap_type)
            .ok_or(DecodeError::UnregisteredTrapType(trap_type))?;
        let config = host
            .config()
            .trap(trap_type)
            .ok_or(DecodeError::MissingTrapConfig(trap_type))?;
        let hp = host.config().default_tile_hp;
        let mut trap = Trap::new(name, seat, config, constructor(config));

        for &coord in tiles {
            trap.add_covered_tile(coord, hp, host);
            if let Some(tile) = host.tile_mut(coord) {
                tile.set_seat(Some(seat));
            }
        }
        info!(
            trap = trap.name(),
            trap_type = %trap_type,
            tiles = trap.num_covered_tiles(),
            "imported trap"
        );
        Ok(trap)
    }
}

fn read_tile_count(count: u32) -> Result<u32, DecodeError> {
    if count > MAX_TILES_PER_TRAP {
        error!(count, "trap record tile count out of range");
        return Err(WireError::InvalidToken(count.to_string()).into());
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

impl Trap {
    /// Type tag only. Written before the body so a reader can pick the
    /// constructor first.
    pub fn encode_headers_packet(&self, packet: &mut Packet) {
        packet.push_enum(self.trap_type());
    }

    pub fn encode_body_packet(&self, packet: &mut Packet) {
        packet
            .push_str(self.name())
            .push(&self.seat())
            .push_u32(self.num_covered_tiles() as u32);
        for tile in self.covered_tiles() {
            packet.push(tile);
        }
    }

    /// Full record: headers then body.
    pub fn encode_packet(&self) -> Packet {
        let mut packet = Packet::new();
        self.encode_headers_packet(&mut packet);
        self.encode_body_packet(&mut packet);
        packet
    }

    pub fn encode_headers_stream<W: Write>(
        &self,
        writer: &mut SaveWriter<W>,
    ) -> Result<(), WireError> {
        writer.enum_token(self.trap_type())?;
        Ok(())
    }

    pub fn encode_body_stream<W: Write>(&self, writer: &mut SaveWriter<W>) -> Result<(), WireError> {
        writer
            .token(self.name())?
            .token(self.seat().0)?
            .token(self.num_covered_tiles())?
            .end_line()?;
        for tile in self.covered_tiles() {
            writer.token(tile.x)?.token(tile.y)?.end_line()?;
        }
        Ok(())
    }

    pub fn encode_stream<W: Write>(&self, writer: &mut SaveWriter<W>) -> Result<(), WireError> {
        self.encode_headers_stream(writer)?;
        self.encode_body_stream(writer)
    }
}
