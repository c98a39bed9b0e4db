// Map tiles and the dense tile grid.
//
// A `Tile` records who owns it (`seat`), how far that claim has progressed,
// how full it is (dirt/rock amount, 0 means dug out), and which trap, if any,
// covers it. The covering-trap back-reference is a name rather than a
// pointer: the trap collection owns traps, tiles only name them.
//
// `TileGrid` stores tiles row-major in one `Vec`, indexed `x + y * width`.
// Coordinates outside the grid resolve to `None`; the grid never grows.
//
// See also: `trap.rs`, which keeps tile back-references in sync with a
// trap's covered-tile list, `map.rs` for the owner of the grid.

use tracing::warn;

use crate::types::{SeatId, TileCoord};

#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    coord: TileCoord,
    seat: Option<SeatId>,
    claimed_percentage: f64,
    fullness: f64,
    covering_trap: Option<String>,
}

impl Tile {
    pub fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            seat: None,
            claimed_percentage: 0.0,
            fullness: 0.0,
            covering_trap: None,
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn seat(&self) -> Option<SeatId> {
        self.seat
    }

    pub fn set_seat(&mut self, seat: Option<SeatId>) {
        self.seat = seat;
    }

    /// Claim progress in `[0, 1]`.
    pub fn claimed_percentage(&self) -> f64 {
        self.claimed_percentage
    }

    pub fn set_claimed_percentage(&mut self, percentage: f64) {
        self.claimed_percentage = percentage.clamp(0.0, 1.0);
    }

    pub fn is_fully_claimed(&self) -> bool {
        self.claimed_percentage >= 1.0
    }

    pub fn fullness(&self) -> f64 {
        self.fullness
    }

    pub fn set_fullness(&mut self, fullness: f64) {
        self.fullness = fullness.max(0.0);
    }

    /// Name of the trap covering this tile.
    pub fn covering_trap(&self) -> Option<&str> {
        self.covering_trap.as_deref()
    }

    pub fn set_covering_trap(&mut self, trap: Option<&str>) {
        if self.covering_trap.as_deref() != trap {
            self.covering_trap = trap.map(str::to_owned);
        }
    }
}

/// Largest supported map side, in tiles. Coordinates are `i32` and the grid
/// is allocated up front, so callers that take sizes from outside should
/// check against this before building a map. `TileGrid::new` clamps to it.
pub const MAX_MAP_SIDE: u32 = 4096;

#[derive(Clone, Debug)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        if width > MAX_MAP_SIDE || height > MAX_MAP_SIDE {
            warn!(width, height, max = MAX_MAP_SIDE, "map size clamped");
        }
        let width = width.min(MAX_MAP_SIDE);
        let height = height.min(MAX_MAP_SIDE);
        let mut tiles = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                tiles.push(Tile::new(TileCoord::new(x, y)));
            }
        }
        Self {
            width,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, coord: TileCoord) -> bool {
        self.index(coord).is_some()
    }

    fn index(&self, coord: TileCoord) -> Option<usize> {
        let x = u32::try_from(coord.x).ok()?;
        let y = u32::try_from(coord.y).ok()?;
        (x < self.width && y < self.height).then(|| x as usize + y as usize * self.width as usize)
    }

    pub fn get(&self, coord: TileCoord) -> Option<&Tile> {
        self.index(coord).map(|i| &self.tiles[i])
    }

    pub fn get_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        self.index(coord).map(|i| &mut self.tiles[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }
}
