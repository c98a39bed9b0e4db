// Server configuration and the starting scenario.
//
// `ServerConfig` is loaded from JSON (every field optional, see
// `#[serde(default)]`) and then overridden by CLI flags in `main.rs`. It
// carries the map size, the sim's `GameConfig`, and a `Scenario`: the seats,
// pre-built traps and creatures the map starts with.
//
// `build_map` turns a config into a ready server-mode `GameMap`. Scenario
// traps go through `GameMap::build_trap`, so they get the same validation
// and naming as traps built during play.

use std::path::Path;

use keeper_sim::notification::NotificationSender;
use keeper_sim::render::render_channel;
use keeper_sim::seat::Seat;
use keeper_sim::tile::MAX_MAP_SIDE;
use keeper_sim::{ConfigError, GameConfig, GameMap, MapMode, SeatId, TileCoord, TrapRegistry, TrapType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServerError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrapPlacement {
    pub trap_type: TrapType,
    pub seat: SeatId,
    pub tiles: Vec<TileCoord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreaturePlacement {
    pub seat: SeatId,
    pub tile: TileCoord,
    pub hp: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub seats: Vec<Seat>,
    pub traps: Vec<TrapPlacement>,
    pub creatures: Vec<CreaturePlacement>,
}

impl Default for Scenario {
    /// Two opposing seats, one cannon for the first seat and an intruder in
    /// its line of fire.
    fn default() -> Self {
        Self {
            seats: vec![Seat::new(SeatId(1), 1), Seat::new(SeatId(2), 2)],
            traps: vec![TrapPlacement {
                trap_type: TrapType::Cannon,
                seat: SeatId(1),
                tiles: vec![TileCoord::new(2, 3), TileCoord::new(2, 4)],
            }],
            creatures: vec![CreaturePlacement {
                seat: SeatId(2),
                tile: TileCoord::new(6, 4),
                hp: 500.0,
            }],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub map_width: u32,
    pub map_height: u32,
    pub game: GameConfig,
    pub scenario: Scenario,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7878,
            map_width: 32,
            map_height: 32,
            game: GameConfig::default(),
            scenario: Scenario::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.game.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Both sides must be between 1 and `MAX_MAP_SIDE` tiles.
    pub fn check_map_size(&self) -> Result<(), ServerError> {
        let valid = 1..=MAX_MAP_SIDE;
        if valid.contains(&self.map_width) && valid.contains(&self.map_height) {
            return Ok(());
        }
        Err(ServerError::MapSize {
            width: self.map_width,
            height: self.map_height,
            max: MAX_MAP_SIDE,
        })
    }

    /// A server-mode map populated from the scenario. Notifications go to
    /// `notifications`; render requests are discarded.
    pub fn build_map(
        &self,
        registry: &TrapRegistry,
        notifications: NotificationSender,
    ) -> Result<GameMap, ServerError> {
        self.check_map_size()?;
        let (render, _) = render_channel();
        let mut map = GameMap::new(
            MapMode::Server,
            self.map_width,
            self.map_height,
            self.game.clone(),
            notifications,
            render,
        );
        for seat in &self.scenario.seats {
            map.add_seat(seat.clone());
        }
        for placement in &self.scenario.traps {
            for &tile in &placement.tiles {
                map.claim_tile(tile, placement.seat, 1.0);
            }
            map.build_trap(placement.trap_type, placement.seat, &placement.tiles, registry)?;
        }
        for creature in &self.scenario.creatures {
            map.add_creature(creature.seat, creature.tile, creature.hp)?;
        }
        info!(
            width = self.map_width,
            height = self.map_height,
            seats = self.scenario.seats.len(),
            traps = map.num_traps(),
            "scenario loaded"
        );
        Ok(map)
    }
}
