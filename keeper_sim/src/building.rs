// Building: the tile-covering base shared by every trap.
//
// A building has a unique name, an owning seat, and an ordered list of the
// tiles it covers. Each covered tile carries its own hit points. Buildings
// may also attach "active spots": decorative objects pinned to a tile (the
// cannon barrel on a cannon tile). Whether the building's visuals currently
// exist is tracked by `mesh_exists` so create/destroy calls are idempotent.
//
// This type is pure data. It never touches tiles, seats or channels; the
// trap that embeds it keeps tile back-references and render requests in
// sync (see `trap.rs`).
//
// **Critical constraint: determinism.** Covered tiles keep insertion order
// and per-tile maps are `BTreeMap`s, so every iteration over a building is
// reproducible.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::types::{SeatId, TileCoord};

/// Decorative object pinned to one covered tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveSpot {
    pub tile: TileCoord,
    pub mesh: String,
}

#[derive(Clone, Debug)]
pub struct Building {
    name: String,
    seat: SeatId,
    covered_tiles: SmallVec<[TileCoord; 4]>,
    tile_hp: BTreeMap<TileCoord, f64>,
    active_spots: BTreeMap<TileCoord, ActiveSpot>,
    mesh_exists: bool,
}

impl Building {
    pub fn new(name: impl Into<String>, seat: SeatId) -> Self {
        Self {
            name: name.into(),
            seat,
            covered_tiles: SmallVec::new(),
            tile_hp: BTreeMap::new(),
            active_spots: BTreeMap::new(),
            mesh_exists: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seat(&self) -> SeatId {
        self.seat
    }

    // -----------------------------------------------------------------------
    // Covered tiles
    // -----------------------------------------------------------------------

    /// Covered tiles in the order they were added.
    pub fn covered_tiles(&self) -> &[TileCoord] {
        &self.covered_tiles
    }

    pub fn num_covered_tiles(&self) -> usize {
        self.covered_tiles.len()
    }

    pub fn covers(&self, tile: TileCoord) -> bool {
        self.tile_hp.contains_key(&tile)
    }

    /// Returns false (and changes nothing) if the tile is already covered.
    pub fn add_covered_tile(&mut self, tile: TileCoord, hp: f64) -> bool {
        if self.covers(tile) {
            return false;
        }
        self.covered_tiles.push(tile);
        self.tile_hp.insert(tile, hp);
        true
    }

    /// Returns false if the tile was not covered.
    pub fn remove_covered_tile(&mut self, tile: TileCoord) -> bool {
        if self.tile_hp.remove(&tile).is_none() {
            return false;
        }
        self.covered_tiles.retain(|t| *t != tile);
        true
    }

    pub fn tile_hp(&self, tile: TileCoord) -> Option<f64> {
        self.tile_hp.get(&tile).copied()
    }

    /// Subtract `amount` from a covered tile's hit points, flooring at zero.
    /// Returns the remaining hit points.
    pub fn damage_tile(&mut self, tile: TileCoord, amount: f64) -> Option<f64> {
        let hp = self.tile_hp.get_mut(&tile)?;
        *hp = (*hp - amount).max(0.0);
        Some(*hp)
    }

    // -----------------------------------------------------------------------
    // Active spots
    // -----------------------------------------------------------------------

    pub fn active_spots(&self) -> impl Iterator<Item = &ActiveSpot> {
        self.active_spots.values()
    }

    pub fn num_active_spots(&self) -> usize {
        self.active_spots.len()
    }

    pub fn has_active_spot(&self, tile: TileCoord) -> bool {
        self.active_spots.contains_key(&tile)
    }

    pub fn add_active_spot(&mut self, spot: ActiveSpot) {
        self.active_spots.insert(spot.tile, spot);
    }

    pub fn remove_active_spot(&mut self, tile: TileCoord) -> Option<ActiveSpot> {
        self.active_spots.remove(&tile)
    }

    // -----------------------------------------------------------------------
    // Mesh state
    // -----------------------------------------------------------------------

    pub fn mesh_exists(&self) -> bool {
        self.mesh_exists
    }

    /// Returns true if the mesh did not exist before.
    pub fn mark_mesh_created(&mut self) -> bool {
        !std::mem::replace(&mut self.mesh_exists, true)
    }

    /// Returns true if the mesh existed before.
    pub fn mark_mesh_destroyed(&mut self) -> bool {
        std::mem::replace(&mut self.mesh_exists, false)
    }
}
