// keeper_sim: trap simulation library for the Keeper dungeon server.
//
// This crate contains the simulation side of the game's trap system: tiles
// and seats, the trap state machine, the trap registry and record codec, the
// map that owns everything, and the notification/render channels that carry
// events out of the simulation thread. It has no networking; the server
// crate drives it.
//
// Module overview:
// - `map.rs`:          GameMap: owns all state, runs the tick, client mirror,
//                      save/load of the trap section. Implements `TrapHost`.
// - `trap.rs`:         Trap, TrapTileState, the TrapBehavior trait and the
//                      per-tick upkeep state machine.
// - `trap_kinds.rs`:   Built-in behaviours (cannon, spike, boulder).
// - `registry.rs`:     TrapRegistry (type tag → constructor) and the trap
//                      record encoders/decoders for packets and save streams.
// - `building.rs`:     Building: covered tiles, per-tile HP, active spots.
// - `host.rs`:         TrapHost: what a trap may ask of its map.
// - `notification.rs`: ServerNotification, Recipient, notification channel.
// - `render.rs`:       RenderRequest and its channel (client maps only).
// - `tile.rs`:         Tile and the dense TileGrid.
// - `seat.rs`:         Seat, SeatTable, alliance.
// - `config.rs`:       GameConfig + TrapConfig, loaded from JSON.
// - `error.rs`:        DecodeError, BuildError, ConfigError.
// - `types.rs`:        TileCoord, SeatId, CreatureId, TrapType.
// - `prng`:            Re-exported from `keeper_prng`.
//
// **Critical constraint: determinism.** A server tick is a pure function of
// the map state and the config. All randomness comes from the map's seeded
// `GameRng`. No `HashMap`, no system time. Use `BTreeMap` for ordered
// collections.

pub mod building;
pub mod config;
pub mod error;
pub mod host;
pub mod map;
pub mod notification;
pub use keeper_prng as prng;
pub mod registry;
pub mod render;
pub mod seat;
pub mod tile;
pub mod trap;
pub mod trap_kinds;
pub mod types;

pub use config::{GameConfig, TrapConfig};
pub use error::{BuildError, ConfigError, DecodeError};
pub use host::TrapHost;
pub use map::{Creature, GameMap, MapMode};
pub use notification::{
    NotificationKind, NotificationReceiver, NotificationSender, Recipient, ServerNotification,
};
pub use registry::TrapRegistry;
pub use trap::{Trap, TrapBehavior, TrapTileState};
pub use types::{CreatureId, PlayerId, SeatId, TileCoord, TrapType};
