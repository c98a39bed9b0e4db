// Seats and the seat table.
//
// A seat is one faction slot: it has a team and, when a human holds it, a
// player. Alliance is team membership; a seat is allied with itself.
// The table is a `BTreeMap` so iteration (e.g. when picking a free seat for
// a joining player) is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{PlayerId, SeatId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub team: i32,
    #[serde(default)]
    pub player: Option<PlayerId>,
}

impl Seat {
    pub fn new(id: SeatId, team: i32) -> Self {
        Self {
            id,
            team,
            player: None,
        }
    }

    pub fn is_allied_with(&self, other: &Seat) -> bool {
        self.team == other.team
    }
}

#[derive(Clone, Debug, Default)]
pub struct SeatTable {
    seats: BTreeMap<SeatId, Seat>,
}

impl SeatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a seat.
    pub fn insert(&mut self, seat: Seat) -> Option<Seat> {
        self.seats.insert(seat.id, seat)
    }

    pub fn get(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// False when either seat is unknown.
    pub fn are_allied(&self, a: SeatId, b: SeatId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => a.is_allied_with(b),
            _ => false,
        }
    }

    pub fn player_of(&self, id: SeatId) -> Option<PlayerId> {
        self.get(id).and_then(|seat| seat.player)
    }

    pub fn seat_of_player(&self, player: PlayerId) -> Option<SeatId> {
        self.seats
            .values()
            .find(|seat| seat.player == Some(player))
            .map(|seat| seat.id)
    }

    /// Bind `player` to a specific seat. Returns false for unknown seats.
    pub fn bind(&mut self, id: SeatId, player: PlayerId) -> bool {
        match self.seats.get_mut(&id) {
            Some(seat) => {
                seat.player = Some(player);
                true
            }
            None => false,
        }
    }

    /// Bind `player` to the lowest-numbered seat without a player.
    pub fn bind_free_seat(&mut self, player: PlayerId) -> Option<SeatId> {
        let seat = self.seats.values_mut().find(|seat| seat.player.is_none())?;
        seat.player = Some(player);
        Some(seat.id)
    }

    /// Release whatever seat `player` holds.
    pub fn unbind_player(&mut self, player: PlayerId) -> Option<SeatId> {
        let seat = self
            .seats
            .values_mut()
            .find(|seat| seat.player == Some(player))?;
        seat.player = None;
        Some(seat.id)
    }
}
