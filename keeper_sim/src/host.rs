// The `TrapHost` trait: everything a trap needs from the map it lives in.
//
// Traps are owned by the map's trap collection, yet their upkeep reads and
// writes map state (tiles, seats, creatures) and queues outbound messages.
// Rather than hold a back-pointer, a trap receives `&mut dyn TrapHost` for
// the duration of each call. `GameMap` implements it; tests implement it
// with small fakes.
//
// Creature queries return `(id, position)` pairs ordered nearest first, ties
// broken by id, so target selection is deterministic.

use keeper_prng::GameRng;

use crate::config::GameConfig;
use crate::notification::ServerNotification;
use crate::render::RenderRequest;
use crate::seat::Seat;
use crate::tile::Tile;
use crate::types::{CreatureId, PlayerId, SeatId, TileCoord};

pub trait TrapHost {
    /// Server maps run game logic; client maps only mirror and render.
    fn is_server(&self) -> bool;

    fn config(&self) -> &GameConfig;

    fn tile(&self, coord: TileCoord) -> Option<&Tile>;

    fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile>;

    fn seat(&self, id: SeatId) -> Option<&Seat>;

    /// Whether a trap called `name` is already placed. Consulted when a
    /// record is imported, never during upkeep.
    fn has_trap(&self, name: &str) -> bool;

    fn player_by_seat(&self, id: SeatId) -> Option<PlayerId> {
        self.seat(id).and_then(|seat| seat.player)
    }

    /// Whether `seat` counts `other` as a friend. A missing seat on either
    /// side is never allied.
    fn seats_allied(&self, seat: SeatId, other: Option<SeatId>) -> bool {
        match (self.seat(seat), other.and_then(|o| self.seat(o))) {
            (Some(a), Some(b)) => a.is_allied_with(b),
            _ => false,
        }
    }

    fn queue_notification(&mut self, notification: ServerNotification);

    fn queue_render(&mut self, request: RenderRequest);

    /// The named trap has no tiles left and must be removed by its owner.
    fn request_trap_removal(&mut self, trap_name: &str);

    /// Record that `player`'s traps fired this tick.
    fn player_is_fighting(&mut self, player: PlayerId);

    /// Living creatures not allied with `seat` within `range` of `center`.
    fn hostile_creatures_near(
        &self,
        seat: SeatId,
        center: TileCoord,
        range: u32,
    ) -> Vec<(CreatureId, TileCoord)>;

    fn damage_creature(&mut self, creature: CreatureId, amount: f64);

    fn rng(&mut self) -> &mut GameRng;
}
