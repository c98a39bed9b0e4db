// Trap: a building that periodically fires at hostile creatures.
//
// A `Trap` embeds a `Building` (name, seat, covered tiles, per-tile HP,
// active spots) and adds per-tile firing state (`TrapTileState`), stats
// copied from `TrapConfig`, and a boxed `TrapBehavior` that decides what a
// shot does. Concrete behaviours live in `trap_kinds.rs`.
//
// Upkeep runs once per tick (`do_upkeep`) in four steps:
// 1. Validity scan: collect covered tiles that are fully claimed by a seat
//    not allied with ours, or whose HP has dropped to zero. Nothing is
//    mutated during the scan.
// 2. Removal pass: notify the owner and drop each collected tile, then
//    reconcile active spots and the mesh.
// 3. Extinction: with no tiles left, ask the host to remove us, set the
//    removal flag and stop. The owning collection sweeps flagged traps after
//    every trap has run, never mid-iteration.
// 4. Fire/reload: each remaining tile either counts down its reload or
//    fires through the behaviour.
//
// The trap never stores a reference to its map. Every method that needs
// map state takes `&mut dyn TrapHost` (see `host.rs`).
//
// **Critical constraint:** the key set of `trap_tiles` always equals the
// building's covered-tile set. Only `add_covered_tile`, `remove_covered_tile`
// and `release_tiles` change either, and they change both.

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::building::{ActiveSpot, Building};
use crate::config::TrapConfig;
use crate::host::TrapHost;
use crate::notification::{NotificationKind, ServerNotification};
use crate::render::RenderRequest;
use crate::types::{CreatureId, SeatId, TileCoord, TrapType};

/// Firing state of one covered tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrapTileState {
    pub reload_time_remaining: u32,
    pub activated: bool,
}

impl TrapTileState {
    /// A freshly covered tile: deactivated, full reload pending.
    pub fn new(reload_time: u32) -> Self {
        Self {
            reload_time_remaining: reload_time,
            activated: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Behaviour
// ---------------------------------------------------------------------------

/// What a trap of a given type does when one of its tiles fires.
pub trait TrapBehavior: fmt::Debug + Send {
    fn trap_type(&self) -> TrapType;

    /// Attempt a shot from `shot.tile()`. Returns true iff something was hit;
    /// only then does the tile reload.
    fn shoot(&mut self, shot: &mut Shot<'_>) -> bool;

    /// Decorative object to pin on a newly covered tile, if any.
    fn spot_created(&mut self, _tile: TileCoord) -> Option<ActiveSpot> {
        None
    }

    /// Called after a spot has been unregistered.
    fn spot_removed(&mut self, _spot: &ActiveSpot) {}
}

/// Everything a behaviour sees while one tile fires.
pub struct Shot<'a> {
    host: &'a mut dyn TrapHost,
    trap_name: &'a str,
    seat: SeatId,
    tile: TileCoord,
    range: u32,
    min_damage: f64,
    max_damage: f64,
    state: &'a mut TrapTileState,
}

impl Shot<'_> {
    pub fn tile(&self) -> TileCoord {
        self.tile
    }

    pub fn range(&self) -> u32 {
        self.range
    }

    /// Hostile creatures within `range` of the firing tile, nearest first.
    pub fn targets_within(&self, range: u32) -> Vec<(CreatureId, TileCoord)> {
        self.host.hostile_creatures_near(self.seat, self.tile, range)
    }

    pub fn roll_damage(&mut self) -> f64 {
        self.host.rng().range_f64(self.min_damage, self.max_damage)
    }

    /// Roll damage and apply it to `creature`.
    pub fn hit(&mut self, creature: CreatureId) {
        let damage = self.roll_damage();
        debug!(trap = self.trap_name, tile = %self.tile, %creature, damage, "trap hit");
        self.host.damage_creature(creature, damage);
    }

    /// Deactivate the firing tile. It is reactivated the next time its
    /// reload completes.
    pub fn deactivate(&mut self) {
        self.state.activated = false;
    }
}

// ---------------------------------------------------------------------------
// Trap
// ---------------------------------------------------------------------------

pub struct Trap {
    building: Building,
    trap_type: TrapType,
    reload_time: u32,
    min_damage: f64,
    max_damage: f64,
    range: u32,
    trap_tiles: BTreeMap<TileCoord, TrapTileState>,
    behavior: Box<dyn TrapBehavior>,
    marked_for_removal: bool,
}

impl fmt::Debug for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trap")
            .field("name", &self.building.name())
            .field("seat", &self.building.seat())
            .field("trap_type", &self.trap_type)
            .field("tiles", &self.trap_tiles)
            .field("marked_for_removal", &self.marked_for_removal)
            .finish()
    }
}

impl Trap {
    /// A trap covering no tiles yet. Add tiles with `add_covered_tile`.
    pub fn new(
        name: impl Into<String>,
        seat: SeatId,
        config: &TrapConfig,
        behavior: Box<dyn TrapBehavior>,
    ) -> Self {
        Self {
            building: Building::new(name, seat),
            trap_type: behavior.trap_type(),
            reload_time: config.reload_time,
            min_damage: config.min_damage,
            max_damage: config.max_damage,
            range: config.range,
            trap_tiles: BTreeMap::new(),
            behavior,
            marked_for_removal: false,
        }
    }

    pub fn name(&self) -> &str {
        self.building.name()
    }

    pub fn seat(&self) -> SeatId {
        self.building.seat()
    }

    pub fn trap_type(&self) -> TrapType {
        self.trap_type
    }

    pub fn reload_time(&self) -> u32 {
        self.reload_time
    }

    pub fn min_damage(&self) -> f64 {
        self.min_damage
    }

    pub fn max_damage(&self) -> f64 {
        self.max_damage
    }

    pub fn range(&self) -> u32 {
        self.range
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    pub fn covered_tiles(&self) -> &[TileCoord] {
        self.building.covered_tiles()
    }

    pub fn num_covered_tiles(&self) -> usize {
        self.building.num_covered_tiles()
    }

    pub fn tile_state(&self, tile: TileCoord) -> Option<TrapTileState> {
        self.trap_tiles.get(&tile).copied()
    }

    /// Coordinates with firing state, in coordinate order.
    pub fn tile_state_keys(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.trap_tiles.keys().copied()
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.marked_for_removal
    }

    // -----------------------------------------------------------------------
    // Covered tiles
    // -----------------------------------------------------------------------

    /// Cover `coord` with `hp` hit points. The tile gets us as its covering
    /// trap and starts deactivated with a full reload. Returns false if the
    /// tile does not exist or is already ours.
    pub fn add_covered_tile(&mut self, coord: TileCoord, hp: f64, host: &mut dyn TrapHost) -> bool {
        let Some(tile) = host.tile_mut(coord) else {
            return false;
        };
        if !self.building.add_covered_tile(coord, hp) {
            return false;
        }
        tile.set_covering_trap(Some(self.building.name()));
        self.trap_tiles
            .insert(coord, TrapTileState::new(self.reload_time));
        true
    }

    /// Stop covering `coord`. Returns false if it was not covered.
    pub fn remove_covered_tile(&mut self, coord: TileCoord, host: &mut dyn TrapHost) -> bool {
        if !self.building.remove_covered_tile(coord) {
            return false;
        }
        self.trap_tiles.remove(&coord);
        self.clear_back_reference(coord, host);
        if !host.is_server() {
            host.queue_render(RenderRequest::DestroyBuilding {
                building: self.building.name().to_owned(),
                tile: coord,
            });
        }
        true
    }

    /// Drop every tile without per-tile render requests. Used when the
    /// whole trap is removed at once and `destroy_mesh` has already run.
    pub fn release_tiles(&mut self, host: &mut dyn TrapHost) {
        let tiles: SmallVec<[TileCoord; 4]> = self.covered_tiles().iter().copied().collect();
        for coord in tiles {
            self.building.remove_covered_tile(coord);
            self.trap_tiles.remove(&coord);
            self.clear_back_reference(coord, host);
        }
    }

    fn clear_back_reference(&self, coord: TileCoord, host: &mut dyn TrapHost) {
        if let Some(tile) = host.tile_mut(coord) {
            if tile.covering_trap() == Some(self.building.name()) {
                tile.set_covering_trap(None);
            }
        }
    }

    /// Subtract `amount` from a tile's HP. The tile is dropped by the next
    /// upkeep once it reaches zero.
    pub fn damage_tile(&mut self, coord: TileCoord, amount: f64) -> Option<f64> {
        self.building.damage_tile(coord, amount)
    }

    // -----------------------------------------------------------------------
    // Activation
    // -----------------------------------------------------------------------

    pub fn activate(&mut self, coord: TileCoord) {
        if let Some(state) = self.trap_tiles.get_mut(&coord) {
            state.activated = true;
        }
    }

    pub fn deactivate(&mut self, coord: TileCoord) {
        if let Some(state) = self.trap_tiles.get_mut(&coord) {
            state.activated = false;
        }
    }

    pub fn is_activated(&self, coord: TileCoord) -> bool {
        self.trap_tiles.get(&coord).is_some_and(|s| s.activated)
    }

    // -----------------------------------------------------------------------
    // Upkeep
    // -----------------------------------------------------------------------

    pub fn do_upkeep(&mut self, host: &mut dyn TrapHost) {
        let seat = self.seat();

        let doomed: SmallVec<[TileCoord; 4]> = self
            .covered_tiles()
            .iter()
            .copied()
            .filter(|&coord| {
                let lost_claim = host.tile(coord).is_some_and(|tile| {
                    tile.is_fully_claimed() && !host.seats_allied(seat, tile.seat())
                });
                let destroyed = self.building.tile_hp(coord).is_none_or(|hp| hp <= 0.0);
                lost_claim || destroyed
            })
            .collect();

        if !doomed.is_empty() {
            let owner = host.player_by_seat(seat);
            for coord in doomed {
                host.queue_notification(ServerNotification::to_seat_owner(
                    owner,
                    NotificationKind::RemoveTrapTile {
                        trap_name: self.name().to_owned(),
                        tile: coord,
                    },
                ));
                self.remove_covered_tile(coord, host);
            }
            self.update_active_spots(&*host);
            self.create_mesh(host);
        }

        if self.num_covered_tiles() == 0 {
            info!(trap = self.name(), "trap has no tiles left, removing");
            host.request_trap_removal(self.building.name());
            self.marked_for_removal = true;
            return;
        }

        let tiles: SmallVec<[TileCoord; 4]> = self.covered_tiles().iter().copied().collect();
        for coord in tiles {
            let Some(state) = self.trap_tiles.get_mut(&coord) else {
                continue;
            };
            if state.reload_time_remaining > 0 {
                state.reload_time_remaining -= 1;
                continue;
            }
            state.activated = true;

            let fired = {
                let mut shot = Shot {
                    host: &mut *host,
                    trap_name: self.building.name(),
                    seat,
                    tile: coord,
                    range: self.range,
                    min_damage: self.min_damage,
                    max_damage: self.max_damage,
                    state: &mut *state,
                };
                self.behavior.shoot(&mut shot)
            };

            if fired {
                state.reload_time_remaining = self.reload_time;
                if host.is_server() {
                    if let Some(player) = host.player_by_seat(seat) {
                        host.player_is_fighting(player);
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Active spots and mesh
    // -----------------------------------------------------------------------

    /// Bring active spots in line with the covered tiles. Server only.
    pub fn update_active_spots(&mut self, host: &dyn TrapHost) {
        if !host.is_server() {
            return;
        }
        let covered = self.building.num_covered_tiles();
        let spots = self.building.num_active_spots();

        if covered > spots {
            let tiles: SmallVec<[TileCoord; 4]> = self.covered_tiles().iter().copied().collect();
            for coord in tiles {
                if self.building.has_active_spot(coord) {
                    continue;
                }
                if let Some(spot) = self.behavior.spot_created(coord) {
                    self.building.add_active_spot(spot);
                }
            }
        } else if covered < spots {
            let stale: SmallVec<[TileCoord; 4]> = self
                .building
                .active_spots()
                .map(|spot| spot.tile)
                .filter(|&tile| !self.building.covers(tile))
                .collect();
            debug_assert!(!stale.is_empty(), "more spots than tiles but none stale");
            for coord in stale {
                if let Some(spot) = self.building.remove_active_spot(coord) {
                    self.behavior.spot_removed(&spot);
                }
            }
        }
    }

    /// Show the trap's visuals. Idempotent; only client maps queue render
    /// requests.
    pub fn create_mesh(&mut self, host: &mut dyn TrapHost) {
        if !self.building.mark_mesh_created() || host.is_server() {
            return;
        }
        for &tile in self.building.covered_tiles() {
            host.queue_render(RenderRequest::CreateBuilding {
                building: self.building.name().to_owned(),
                tile,
            });
        }
    }

    pub fn destroy_mesh(&mut self, host: &mut dyn TrapHost) {
        if !self.building.mark_mesh_destroyed() || host.is_server() {
            return;
        }
        for &tile in self.building.covered_tiles() {
            host.queue_render(RenderRequest::DestroyBuilding {
                building: self.building.name().to_owned(),
                tile,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::GameConfig;
    use crate::map::{GameMap, MapMode};
    use crate::notification::Recipient;
    use crate::seat::Seat;
    use crate::types::PlayerId;

    /// Hits whenever `armed`, recording every firing tile.
    #[derive(Debug)]
    struct Recorder {
        armed: bool,
        fired: Arc<Mutex<Vec<TileCoord>>>,
    }

    impl TrapBehavior for Recorder {
        fn trap_type(&self) -> TrapType {
            TrapType::Cannon
        }

        fn shoot(&mut self, shot: &mut Shot<'_>) -> bool {
            self.fired.lock().unwrap().push(shot.tile());
            self.armed
        }
    }

    fn stats(reload_time: u32) -> TrapConfig {
        TrapConfig {
            reload_time,
            min_damage: 10.0,
            max_damage: 20.0,
            range: 3,
            cost_per_tile: 0,
        }
    }

    struct Fixture {
        map: GameMap,
        notifications: crate::notification::NotificationReceiver,
        fired: Arc<Mutex<Vec<TileCoord>>>,
    }

    fn fixture() -> Fixture {
        let (mut map, notifications, _render) =
            GameMap::with_channels(MapMode::Server, 8, 8, GameConfig::default());
        map.add_seat(Seat::new(SeatId(1), 1));
        map.add_seat(Seat::new(SeatId(2), 2));
        map.bind_player(SeatId(1), PlayerId(7));
        Fixture {
            map,
            notifications,
            fired: Arc::default(),
        }
    }

    fn trap_on(fx: &mut Fixture, tiles: &[TileCoord], reload_time: u32, armed: bool) -> Trap {
        let behavior = Recorder {
            armed,
            fired: Arc::clone(&fx.fired),
        };
        let mut trap = Trap::new("Cannon_1", SeatId(1), &stats(reload_time), Box::new(behavior));
        for &tile in tiles {
            assert!(trap.add_covered_tile(tile, 300.0, &mut fx.map));
        }
        trap
    }

    fn assert_state_matches_tiles(trap: &Trap) {
        let mut covered = trap.covered_tiles().to_vec();
        covered.sort();
        assert_eq!(trap.tile_state_keys().collect::<Vec<_>>(), covered);
    }

    const A: TileCoord = TileCoord::new(2, 3);
    const B: TileCoord = TileCoord::new(2, 4);

    #[test]
    fn new_tiles_start_deactivated_with_full_reload() {
        let mut fx = fixture();
        let trap = trap_on(&mut fx, &[A, B], 3, true);
        assert_eq!(
            trap.tile_state(A),
            Some(TrapTileState {
                reload_time_remaining: 3,
                activated: false
            })
        );
        assert_eq!(fx.map.tile(A).unwrap().covering_trap(), Some("Cannon_1"));
        assert_state_matches_tiles(&trap);
    }

    #[test]
    fn reload_counts_down_by_one_without_firing() {
        let mut fx = fixture();
        let mut trap = trap_on(&mut fx, &[A], 3, true);
        trap.do_upkeep(&mut fx.map);
        assert_eq!(trap.tile_state(A).unwrap().reload_time_remaining, 2);
        trap.do_upkeep(&mut fx.map);
        trap.do_upkeep(&mut fx.map);
        assert_eq!(trap.tile_state(A).unwrap().reload_time_remaining, 0);
        assert!(fx.fired.lock().unwrap().is_empty());
        assert!(!trap.is_activated(A));
    }

    #[test]
    fn successful_shot_reloads_and_marks_fighting() {
        let mut fx = fixture();
        let mut trap = trap_on(&mut fx, &[A], 0, true);
        trap.do_upkeep(&mut fx.map);
        assert_eq!(*fx.fired.lock().unwrap(), vec![A]);
        assert!(trap.is_activated(A));
        assert_eq!(trap.tile_state(A).unwrap().reload_time_remaining, 0);
        assert!(fx.map.is_fighting(PlayerId(7)));
    }

    #[test]
    fn missed_shot_retries_next_tick() {
        let mut fx = fixture();
        let mut trap = trap_on(&mut fx, &[A], 5, false);
        for _ in 0..5 {
            trap.do_upkeep(&mut fx.map);
        }
        trap.do_upkeep(&mut fx.map);
        trap.do_upkeep(&mut fx.map);
        assert_eq!(*fx.fired.lock().unwrap(), vec![A, A]);
        assert_eq!(trap.tile_state(A).unwrap().reload_time_remaining, 0);
        assert!(!fx.map.is_fighting(PlayerId(7)));
    }

    #[test]
    fn destroyed_tile_is_removed_alone() {
        let mut fx = fixture();
        let mut trap = trap_on(&mut fx, &[A, B], 3, true);
        trap.damage_tile(A, 1000.0);
        trap.do_upkeep(&mut fx.map);

        assert_eq!(trap.covered_tiles(), &[B]);
        assert_state_matches_tiles(&trap);
        assert_eq!(trap.tile_state(B).unwrap().reload_time_remaining, 2);
        assert_eq!(fx.map.tile(A).unwrap().covering_trap(), None);
        assert_eq!(fx.map.tile(B).unwrap().covering_trap(), Some("Cannon_1"));

        let sent = fx.notifications.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, Recipient::Player(PlayerId(7)));
        assert_eq!(
            sent[0].kind,
            NotificationKind::RemoveTrapTile {
                trap_name: "Cannon_1".into(),
                tile: A
            }
        );
        assert!(!trap.is_marked_for_removal());
    }

    #[test]
    fn tile_claimed_by_enemy_is_removed() {
        let mut fx = fixture();
        let mut trap = trap_on(&mut fx, &[A, B], 3, true);
        fx.map.claim_tile(B, SeatId(2), 1.0);
        trap.do_upkeep(&mut fx.map);
        assert_eq!(trap.covered_tiles(), &[A]);
    }

    #[test]
    fn partially_claimed_or_allied_tiles_stay() {
        let mut fx = fixture();
        fx.map.add_seat(Seat::new(SeatId(3), 1));
        let mut trap = trap_on(&mut fx, &[A, B], 3, true);
        fx.map.claim_tile(A, SeatId(2), 0.5);
        fx.map.claim_tile(B, SeatId(3), 1.0);
        trap.do_upkeep(&mut fx.map);
        assert_eq!(trap.covered_tiles(), &[A, B]);
    }

    #[test]
    fn losing_every_tile_requests_removal_without_firing() {
        let mut fx = fixture();
        let mut trap = trap_on(&mut fx, &[A, B], 0, true);
        trap.damage_tile(A, 1000.0);
        trap.damage_tile(B, 1000.0);
        trap.do_upkeep(&mut fx.map);

        assert_eq!(trap.num_covered_tiles(), 0);
        assert!(trap.is_marked_for_removal());
        assert!(fx.fired.lock().unwrap().is_empty());
        assert_eq!(fx.map.pending_trap_removals(), &["Cannon_1".to_owned()]);
        assert_eq!(fx.notifications.drain().len(), 2);
    }

    #[test]
    fn seat_without_player_addresses_nobody() {
        let (mut map, notifications, _render) =
            GameMap::with_channels(MapMode::Server, 8, 8, GameConfig::default());
        map.add_seat(Seat::new(SeatId(1), 1));
        let fired = Arc::default();
        let mut trap = Trap::new(
            "Spike_1",
            SeatId(1),
            &stats(1),
            Box::new(Recorder { armed: true, fired }),
        );
        trap.add_covered_tile(A, 0.0, &mut map);
        trap.do_upkeep(&mut map);
        let sent = notifications.drain();
        assert_eq!(sent[0].recipient, Recipient::Nobody);
    }

    #[test]
    fn activation_ignores_unknown_tiles() {
        let mut fx = fixture();
        let mut trap = trap_on(&mut fx, &[A], 1, true);
        let elsewhere = TileCoord::new(7, 7);
        trap.activate(elsewhere);
        assert!(!trap.is_activated(elsewhere));
        trap.activate(A);
        assert!(trap.is_activated(A));
        trap.deactivate(A);
        assert!(!trap.is_activated(A));
        assert_state_matches_tiles(&trap);
    }

    #[test]
    fn client_removal_queues_render_requests() {
        let (mut map, _notifications, render) =
            GameMap::with_channels(MapMode::Client, 8, 8, GameConfig::default());
        map.add_seat(Seat::new(SeatId(1), 1));
        let mut trap = Trap::new(
            "Cannon_9",
            SeatId(1),
            &stats(1),
            Box::new(Recorder {
                armed: false,
                fired: Arc::default(),
            }),
        );
        trap.add_covered_tile(A, 300.0, &mut map);
        trap.add_covered_tile(B, 300.0, &mut map);
        trap.create_mesh(&mut map);
        trap.create_mesh(&mut map);
        assert!(trap.remove_covered_tile(A, &mut map));
        assert!(!trap.remove_covered_tile(A, &mut map));

        assert_eq!(
            render.drain(),
            vec![
                RenderRequest::CreateBuilding {
                    building: "Cannon_9".into(),
                    tile: A
                },
                RenderRequest::CreateBuilding {
                    building: "Cannon_9".into(),
                    tile: B
                },
                RenderRequest::DestroyBuilding {
                    building: "Cannon_9".into(),
                    tile: A
                },
            ]
        );
    }
}
