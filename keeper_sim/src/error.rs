// Error types of the simulation crate.
//
// - `DecodeError`: importing a trap (or a whole trap section) from a save
//   stream or a packet failed. Wraps the codec's `WireError` for malformed
//   input and adds the semantic failures (unknown tag, unknown seat or tile).
// - `BuildError`: a build request or scenario placement was rejected.
// - `ConfigError`: the game config could not be read or parsed.
//
// None of these leave state half-applied: every fallible entry point
// validates before mutating.

use std::io;

use keeper_protocol::WireError;
use thiserror::Error;

use crate::types::{SeatId, TileCoord, TrapType};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("unknown trap type tag {0}")]
    UnknownTrapType(u32),

    #[error("trap type {0} has no registered constructor")]
    UnregisteredTrapType(TrapType),

    #[error("no config entry for trap type {0}")]
    MissingTrapConfig(TrapType),

    #[error("record references unknown seat {0}")]
    UnknownSeat(SeatId),

    #[error("record references unknown tile ({x}, {y})")]
    UnknownTile { x: i32, y: i32 },

    #[error("record references unknown trap {0:?}")]
    UnknownTrap(String),

    #[error("a trap named {0:?} already exists")]
    DuplicateTrap(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("cannot build a trap on zero tiles")]
    EmptyFootprint,

    #[error("{0} is not a buildable trap type")]
    NotBuildable(TrapType),

    #[error("no config entry for trap type {0}")]
    MissingTrapConfig(TrapType),

    #[error("unknown seat {0}")]
    UnknownSeat(SeatId),

    #[error("tile {0} is outside the map")]
    TileOutOfBounds(TileCoord),

    #[error("tile {0} is listed twice")]
    DuplicateTile(TileCoord),

    #[error("tile {tile} is already covered by trap {trap:?}")]
    TileAlreadyCovered { tile: TileCoord, trap: String },

    #[error("a trap named {0:?} already exists")]
    DuplicateName(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config for {trap_type}: {reason}")]
    InvalidTrap {
        trap_type: TrapType,
        reason: &'static str,
    },
}
