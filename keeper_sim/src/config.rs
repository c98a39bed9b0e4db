// Data-driven game configuration.
//
// All tunable parameters live in `GameConfig`, loaded from JSON at startup.
// The sim reads trap stats from here instead of hard-coding them, so balance
// changes need no recompilation. Every field has a default and `#[serde(default)]`
// lets a config file override only what it cares about.
//
// Trap stats are grouped per type in `TrapConfig`, keyed by `TrapType` in the
// `traps` map. A trap copies its stats at construction; later config edits do
// not reach traps that already exist.
//
// See also: `registry.rs`, which hands the matching `TrapConfig` to each
// constructor, and `map.rs`, which owns the `GameConfig`.
//
// **Critical constraint: determinism.** Server and clients must load the
// same config; `rng_seed` fixes every damage roll.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::TrapType;

/// Per-type trap stats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrapConfig {
    /// Ticks a tile waits after firing (and after being placed) before it
    /// may fire again.
    pub reload_time: u32,
    /// Damage rolls are uniform in `[min_damage, max_damage)`.
    pub min_damage: f64,
    pub max_damage: f64,
    /// Targeting radius in tiles (Chebyshev distance). Zero means the trap
    /// only sees its own tile.
    pub range: u32,
    /// Gold price per covered tile.
    pub cost_per_tile: i32,
}

/// Top-level game config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Hit points given to each newly covered trap tile.
    pub default_tile_hp: f64,
    /// Server tick rate, announced to clients on join.
    pub turns_per_second: f64,
    /// Seed for the map's `GameRng`.
    pub rng_seed: u64,
    pub traps: BTreeMap<TrapType, TrapConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut traps = BTreeMap::new();
        traps.insert(
            TrapType::Cannon,
            TrapConfig {
                reload_time: 5,
                min_damage: 104.0,
                max_damage: 120.0,
                range: 10,
                cost_per_tile: 500,
            },
        );
        traps.insert(
            TrapType::Spike,
            TrapConfig {
                reload_time: 3,
                min_damage: 150.0,
                max_damage: 180.0,
                range: 0,
                cost_per_tile: 400,
            },
        );
        traps.insert(
            TrapType::Boulder,
            TrapConfig {
                reload_time: 20,
                min_damage: 80.0,
                max_damage: 120.0,
                range: 10,
                cost_per_tile: 500,
            },
        );
        Self {
            default_tile_hp: 300.0,
            turns_per_second: 1.0,
            rng_seed: 0x5EED_0F_D00D,
            traps,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject stat blocks the sim cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (&trap_type, trap) in &self.traps {
            if trap_type == TrapType::Null {
                return Err(ConfigError::InvalidTrap {
                    trap_type,
                    reason: "the null type cannot carry stats",
                });
            }
            if trap.min_damage > trap.max_damage {
                return Err(ConfigError::InvalidTrap {
                    trap_type,
                    reason: "min_damage exceeds max_damage",
                });
            }
        }
        Ok(())
    }

    pub fn trap(&self, trap_type: TrapType) -> Option<&TrapConfig> {
        self.traps.get(&trap_type)
    }

    /// Gold cost of one tile of the given type; zero for `Null` and for
    /// types without a config entry.
    pub fn cost_per_tile(&self, trap_type: TrapType) -> i32 {
        self.trap(trap_type).map_or(0, |t| t.cost_per_tile)
    }
}
