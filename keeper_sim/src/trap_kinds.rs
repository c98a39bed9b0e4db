// Built-in trap behaviours: cannon, spike and boulder.
//
// Targeting is intentionally simple. Every behaviour asks the host for
// hostile creatures around the firing tile (nearest first, ties by id) and
// hits some of them; a shot succeeds iff it hit at least one creature.
//
// - Cannon: nearest hostile within range. Pins a "Cannon" active spot on
//   each covered tile.
// - Spike: every hostile standing on the tile itself.
// - Boulder: nearest hostile sharing a row or column within range, then
//   deactivates the tile until its next reload completes.
//
// Constructors have the `TrapConstructor` signature so `registry.rs` can
// table them by `TrapType`.

use crate::building::ActiveSpot;
use crate::config::TrapConfig;
use crate::trap::{Shot, TrapBehavior};
use crate::types::{TileCoord, TrapType};

#[derive(Debug, Default)]
pub struct Cannon;

impl Cannon {
    pub const SPOT_MESH: &'static str = "Cannon";

    pub fn construct(_config: &TrapConfig) -> Box<dyn TrapBehavior> {
        Box::new(Cannon)
    }
}

impl TrapBehavior for Cannon {
    fn trap_type(&self) -> TrapType {
        TrapType::Cannon
    }

    fn shoot(&mut self, shot: &mut Shot<'_>) -> bool {
        let Some(&(target, _)) = shot.targets_within(shot.range()).first() else {
            return false;
        };
        shot.hit(target);
        true
    }

    fn spot_created(&mut self, tile: TileCoord) -> Option<ActiveSpot> {
        Some(ActiveSpot {
            tile,
            mesh: Self::SPOT_MESH.to_owned(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Spike;

impl Spike {
    pub fn construct(_config: &TrapConfig) -> Box<dyn TrapBehavior> {
        Box::new(Spike)
    }
}

impl TrapBehavior for Spike {
    fn trap_type(&self) -> TrapType {
        TrapType::Spike
    }

    fn shoot(&mut self, shot: &mut Shot<'_>) -> bool {
        let targets = shot.targets_within(0);
        for &(creature, _) in &targets {
            shot.hit(creature);
        }
        !targets.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Boulder;

impl Boulder {
    pub fn construct(_config: &TrapConfig) -> Box<dyn TrapBehavior> {
        Box::new(Boulder)
    }
}

impl TrapBehavior for Boulder {
    fn trap_type(&self) -> TrapType {
        TrapType::Boulder
    }

    fn shoot(&mut self, shot: &mut Shot<'_>) -> bool {
        let origin = shot.tile();
        let target = shot
            .targets_within(shot.range())
            .into_iter()
            .find(|&(_, pos)| pos.is_aligned_with(origin));
        let Some((creature, _)) = target else {
            return false;
        };
        shot.hit(creature);
        shot.deactivate();
        true
    }
}
