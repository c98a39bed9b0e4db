// GameMap: the owner of all simulation state and the concrete `TrapHost`.
//
// A map holds the tile grid, the seat table, the trap collection (keyed by
// unique trap name), and a small creature registry that traps target. It
// runs in one of two modes:
// - `MapMode::Server`: authoritative. Runs upkeep, broadcasts notifications,
//   reconciles active spots. Never queues render requests.
// - `MapMode::Client`: a mirror fed by `apply_server_packet`. Queues render
//   requests; never broadcasts.
//
// Tick order (`do_upkeep`):
// 1. advance the turn and broadcast `TurnStarted`;
// 2. run every trap's upkeep. The trap collection is moved out of the map
//    for the duration (`mem::take`) so each trap can borrow the map mutably
//    as its host; nothing a trap calls on the host touches the collection;
// 3. sweep traps whose removal flag is set;
// 4. send one `PlayerFighting` per player whose traps fired;
// 5. drop dead creatures.
//
// Save format for the trap section: a line holding the trap count, then one
// record per trap (see `registry.rs`).
//
// See also: `trap.rs`, `registry.rs`, `notification.rs`, and
// `keeper_server::server` which drives `do_upkeep` at a fixed rate.
//
// **Critical constraint: determinism.** Every collection is ordered
// (`BTreeMap`/`BTreeSet`) and all randomness comes from the map's `GameRng`,
// seeded from the config.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Write};

use keeper_prng::GameRng;
use keeper_protocol::{PacketReader, SaveReader, SaveWriter, WireError};
use tracing::{debug, error, info, trace, warn};

use crate::config::GameConfig;
use crate::error::{BuildError, DecodeError};
use crate::host::TrapHost;
use crate::notification::{
    NotificationKind, NotificationReceiver, NotificationSender, ServerNotification,
    notification_channel,
};
use crate::registry::TrapRegistry;
use crate::render::{RenderReceiver, RenderRequest, RenderSender, render_channel};
use crate::seat::{Seat, SeatTable};
use crate::tile::{Tile, TileGrid};
use crate::trap::Trap;
use crate::types::{CreatureId, PlayerId, SeatId, TileCoord, TrapType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapMode {
    Server,
    Client,
}

/// Minimal creature record: enough for traps to find and hurt targets.
#[derive(Clone, Debug, PartialEq)]
pub struct Creature {
    pub id: CreatureId,
    pub seat: SeatId,
    pub tile: TileCoord,
    pub hp: f64,
    /// Pending path waypoints, oldest first.
    pub destinations: Vec<TileCoord>,
}

impl Creature {
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }
}

#[derive(Debug)]
pub struct GameMap {
    mode: MapMode,
    config: GameConfig,
    tiles: TileGrid,
    seats: SeatTable,
    traps: BTreeMap<String, Trap>,
    creatures: BTreeMap<CreatureId, Creature>,
    next_creature_id: u32,
    next_trap_index: u32,
    turn: u64,
    turns_per_second: f64,
    rng: GameRng,
    notifications: NotificationSender,
    render: RenderSender,
    pending_trap_removals: Vec<String>,
    fighting: BTreeSet<PlayerId>,
}

impl GameMap {
    pub fn new(
        mode: MapMode,
        width: u32,
        height: u32,
        config: GameConfig,
        notifications: NotificationSender,
        render: RenderSender,
    ) -> Self {
        Self {
            mode,
            tiles: TileGrid::new(width, height),
            seats: SeatTable::new(),
            traps: BTreeMap::new(),
            creatures: BTreeMap::new(),
            next_creature_id: 0,
            next_trap_index: 0,
            turn: 0,
            turns_per_second: config.turns_per_second,
            rng: GameRng::new(config.rng_seed),
            config,
            notifications,
            render,
            pending_trap_removals: Vec::new(),
            fighting: BTreeSet::new(),
        }
    }

    /// A map together with fresh receivers for its outbound channels.
    pub fn with_channels(
        mode: MapMode,
        width: u32,
        height: u32,
        config: GameConfig,
    ) -> (Self, NotificationReceiver, RenderReceiver) {
        let (notification_tx, notification_rx) = notification_channel();
        let (render_tx, render_rx) = render_channel();
        let map = Self::new(mode, width, height, config, notification_tx, render_tx);
        (map, notification_rx, render_rx)
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn turns_per_second(&self) -> f64 {
        self.turns_per_second
    }

    pub fn tiles(&self) -> &TileGrid {
        &self.tiles
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(coord)
    }

    fn broadcast(&self, kind: NotificationKind) {
        if self.mode == MapMode::Server {
            self.notifications.queue(ServerNotification::broadcast(kind));
        }
    }

    // -----------------------------------------------------------------------
    // Seats and players
    // -----------------------------------------------------------------------

    pub fn seats(&self) -> &SeatTable {
        &self.seats
    }

    pub fn add_seat(&mut self, seat: Seat) {
        self.seats.insert(seat);
    }

    pub fn bind_player(&mut self, seat: SeatId, player: PlayerId) -> bool {
        self.seats.bind(seat, player)
    }

    /// Seat a newly connected player and bring them up to date: their
    /// welcome, the tick rate, and every existing trap, in that order.
    pub fn player_joined(&mut self, player: PlayerId) -> Option<SeatId> {
        let seat = self.seats.bind_free_seat(player);
        info!(%player, ?seat, "player joined");
        let welcome = [
            NotificationKind::Welcome { player, seat },
            NotificationKind::SetTurnsPerSecond {
                turns_per_second: self.turns_per_second,
            },
        ];
        for kind in welcome {
            self.notifications
                .queue(ServerNotification::to_player(player, kind));
        }
        for trap in self.traps.values() {
            self.notifications.queue(ServerNotification::to_player(
                player,
                NotificationKind::AddTrap {
                    record: trap.encode_packet().into_bytes(),
                },
            ));
        }
        seat
    }

    pub fn player_left(&mut self, player: PlayerId) -> Option<SeatId> {
        self.fighting.remove(&player);
        let seat = self.seats.unbind_player(player);
        info!(%player, ?seat, "player left");
        seat
    }

    pub fn set_turns_per_second(&mut self, turns_per_second: f64) {
        self.turns_per_second = turns_per_second;
        self.broadcast(NotificationKind::SetTurnsPerSecond { turns_per_second });
    }

    pub fn is_fighting(&self, player: PlayerId) -> bool {
        self.fighting.contains(&player)
    }

    /// Trap names whose removal was requested during the current tick.
    pub fn pending_trap_removals(&self) -> &[String] {
        &self.pending_trap_removals
    }

    // -----------------------------------------------------------------------
    // Tiles
    // -----------------------------------------------------------------------

    /// Set a tile's owner and claim progress. Returns false off the map.
    pub fn claim_tile(&mut self, coord: TileCoord, seat: SeatId, percentage: f64) -> bool {
        let Some(tile) = self.tiles.get_mut(coord) else {
            return false;
        };
        tile.set_seat(Some(seat));
        tile.set_claimed_percentage(percentage);
        true
    }

    pub fn set_tile_fullness(&mut self, coord: TileCoord, fullness: f64) -> bool {
        let Some(tile) = self.tiles.get_mut(coord) else {
            return false;
        };
        tile.set_fullness(fullness);
        let fullness = tile.fullness();
        self.broadcast(NotificationKind::TileFullnessChange {
            tile: coord,
            fullness,
        });
        true
    }

    /// Damage whichever trap covers `coord`. Returns the tile's remaining HP.
    pub fn damage_trap_tile(&mut self, coord: TileCoord, amount: f64) -> Option<f64> {
        let name = self.tiles.get(coord)?.covering_trap()?;
        let trap = self.traps.get_mut(name)?;
        trap.damage_tile(coord, amount)
    }

    // -----------------------------------------------------------------------
    // Traps
    // -----------------------------------------------------------------------

    pub fn traps(&self) -> impl Iterator<Item = &Trap> {
        self.traps.values()
    }

    pub fn trap(&self, name: &str) -> Option<&Trap> {
        self.traps.get(name)
    }

    pub fn num_traps(&self) -> usize {
        self.traps.len()
    }

    /// Place a new trap of `trap_type` owned by `seat` on `tiles`. Every
    /// tile must exist and be free. Returns the generated trap name.
    pub fn build_trap(
        &mut self,
        trap_type: TrapType,
        seat: SeatId,
        tiles: &[TileCoord],
        registry: &TrapRegistry,
    ) -> Result<String, BuildError> {
        if tiles.is_empty() {
            return Err(BuildError::EmptyFootprint);
        }
        if trap_type == TrapType::Null {
            return Err(BuildError::NotBuildable(trap_type));
        }
        if self.seats.get(seat).is_none() {
            return Err(BuildError::UnknownSeat(seat));
        }
        let mut seen = BTreeSet::new();
        for &coord in tiles {
            if !seen.insert(coord) {
                return Err(BuildError::DuplicateTile(coord));
            }
            let tile = self
                .tiles
                .get(coord)
                .ok_or(BuildError::TileOutOfBounds(coord))?;
            if let Some(trap) = tile.covering_trap() {
                return Err(BuildError::TileAlreadyCovered {
                    tile: coord,
                    trap: trap.to_owned(),
                });
            }
        }

        let name = self.next_trap_name(trap_type);
        let mut trap = registry.create(trap_type, name.clone(), seat, &*self)?;
        let hp = self.config.default_tile_hp;
        for &coord in tiles {
            trap.add_covered_tile(coord, hp, self);
        }
        trap.create_mesh(self);
        trap.update_active_spots(&*self);
        self.broadcast(NotificationKind::AddTrap {
            record: trap.encode_packet().into_bytes(),
        });
        info!(trap = %name, %trap_type, %seat, tiles = tiles.len(), "built trap");
        self.traps.insert(name.clone(), trap);
        Ok(name)
    }

    fn next_trap_name(&mut self, trap_type: TrapType) -> String {
        loop {
            self.next_trap_index += 1;
            let name = format!("{}_{}", trap_type.name(), self.next_trap_index);
            if !self.traps.contains_key(&name) {
                return name;
            }
        }
    }

    /// Insert an already built trap (e.g. one decoded elsewhere).
    pub fn add_trap(&mut self, mut trap: Trap) -> Result<(), BuildError> {
        if self.traps.contains_key(trap.name()) {
            return Err(BuildError::DuplicateName(trap.name().to_owned()));
        }
        trap.create_mesh(self);
        trap.update_active_spots(&*self);
        self.traps.insert(trap.name().to_owned(), trap);
        Ok(())
    }

    /// Remove a trap immediately, releasing all of its tiles.
    pub fn remove_trap(&mut self, name: &str) -> Option<Trap> {
        let mut trap = self.traps.remove(name)?;
        trap.destroy_mesh(self);
        trap.release_tiles(self);
        info!(trap = name, "removed trap");
        Some(trap)
    }

    // -----------------------------------------------------------------------
    // Creatures
    // -----------------------------------------------------------------------

    /// Place a creature. Its tile must be on the map.
    pub fn add_creature(
        &mut self,
        seat: SeatId,
        tile: TileCoord,
        hp: f64,
    ) -> Result<CreatureId, BuildError> {
        if !self.tiles.in_bounds(tile) {
            return Err(BuildError::TileOutOfBounds(tile));
        }
        self.next_creature_id += 1;
        let id = CreatureId(self.next_creature_id);
        self.creatures.insert(
            id,
            Creature {
                id,
                seat,
                tile,
                hp,
                destinations: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    /// Queue a waypoint for a creature and tell every client about it.
    pub fn add_creature_destination(&mut self, id: CreatureId, destination: TileCoord) -> bool {
        let Some(creature) = self.creatures.get_mut(&id) else {
            return false;
        };
        creature.destinations.push(destination);
        self.broadcast(NotificationKind::CreatureAddDestination {
            creature: id,
            destination,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub fn do_upkeep(&mut self) {
        self.turn += 1;
        trace!(turn = self.turn, traps = self.traps.len(), "upkeep");
        self.broadcast(NotificationKind::TurnStarted { turn: self.turn });

        let mut traps = std::mem::take(&mut self.traps);
        for trap in traps.values_mut() {
            trap.do_upkeep(self);
        }
        self.traps = traps;

        self.sweep_removed_traps();
        self.flush_fighting();
        self.sweep_dead_creatures();
    }

    fn sweep_removed_traps(&mut self) {
        for name in std::mem::take(&mut self.pending_trap_removals) {
            if !self
                .traps
                .get(&name)
                .is_some_and(Trap::is_marked_for_removal)
            {
                warn!(trap = %name, "removal requested for a trap that is not flagged");
                continue;
            }
            if let Some(mut trap) = self.traps.remove(&name) {
                trap.destroy_mesh(self);
                info!(trap = %name, "swept trap with no tiles");
            }
        }
    }

    fn flush_fighting(&mut self) {
        for player in std::mem::take(&mut self.fighting) {
            self.notifications.queue(ServerNotification::to_player(
                player,
                NotificationKind::PlayerFighting,
            ));
        }
    }

    fn sweep_dead_creatures(&mut self) {
        self.creatures.retain(|id, creature| {
            let alive = creature.is_alive();
            if !alive {
                debug!(creature = %id, "creature died");
            }
            alive
        });
    }

    // -----------------------------------------------------------------------
    // Client mirror
    // -----------------------------------------------------------------------

    /// Apply one notification packet received from the server.
    pub fn apply_server_packet(
        &mut self,
        bytes: &[u8],
        registry: &TrapRegistry,
    ) -> Result<(), DecodeError> {
        match NotificationKind::decode(bytes)? {
            NotificationKind::TurnStarted { turn } => self.turn = turn,
            NotificationKind::SetTurnsPerSecond { turns_per_second } => {
                self.turns_per_second = turns_per_second;
            }
            NotificationKind::TileFullnessChange { tile, fullness } => {
                if let Some(tile) = self.tiles.get_mut(tile) {
                    tile.set_fullness(fullness);
                }
            }
            NotificationKind::CreatureAddDestination {
                creature,
                destination,
            } => {
                if let Some(creature) = self.creatures.get_mut(&creature) {
                    creature.destinations.push(destination);
                }
            }
            NotificationKind::RemoveTrapTile { trap_name, tile } => {
                let Some(mut trap) = self.traps.remove(&trap_name) else {
                    error!(trap = %trap_name, "server removed a tile of an unknown trap");
                    return Err(DecodeError::UnknownTrap(trap_name));
                };
                trap.remove_covered_tile(tile, self);
                if trap.num_covered_tiles() == 0 {
                    trap.destroy_mesh(self);
                    info!(trap = %trap_name, "trap lost its last tile");
                } else {
                    self.traps.insert(trap_name, trap);
                }
            }
            NotificationKind::AddTrap { record } => {
                let mut reader = PacketReader::new(&record);
                if let Some(mut trap) = registry.decode_from_packet(&mut reader, self)? {
                    trap.create_mesh(self);
                    self.traps.insert(trap.name().to_owned(), trap);
                }
            }
            other @ (NotificationKind::PlayerFighting | NotificationKind::Welcome { .. }) => {
                trace!(kind = ?other.notification_type(), "not a map notification");
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Save / load
    // -----------------------------------------------------------------------

    pub fn write_traps<W: Write>(&self, writer: &mut SaveWriter<W>) -> Result<(), WireError> {
        writer.token(self.traps.len())?.end_line()?;
        for trap in self.traps.values() {
            trap.encode_stream(writer)?;
        }
        writer.flush()
    }

    /// Load a trap section. Returns the number of traps added; null slots
    /// are skipped. On error the section should be treated as unusable.
    pub fn read_traps<R: BufRead>(
        &mut self,
        reader: &mut SaveReader<R>,
        registry: &TrapRegistry,
    ) -> Result<usize, DecodeError> {
        let count: u32 = reader.token()?;
        let mut loaded = 0;
        for _ in 0..count {
            let Some(trap) = registry.decode_from_stream(reader, self)? else {
                continue;
            };
            let name = trap.name().to_owned();
            self.add_trap(trap)
                .map_err(|_| DecodeError::DuplicateTrap(name))?;
            loaded += 1;
        }
        info!(loaded, "loaded traps");
        Ok(loaded)
    }
}

// ---------------------------------------------------------------------------
// TrapHost
// ---------------------------------------------------------------------------

impl TrapHost for GameMap {
    fn is_server(&self) -> bool {
        self.mode == MapMode::Server
    }

    fn config(&self) -> &GameConfig {
        &self.config
    }

    fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(coord)
    }

    fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        self.tiles.get_mut(coord)
    }

    fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(id)
    }

    fn has_trap(&self, name: &str) -> bool {
        self.traps.contains_key(name)
    }

    fn queue_notification(&mut self, notification: ServerNotification) {
        self.notifications.queue(notification);
    }

    fn queue_render(&mut self, request: RenderRequest) {
        self.render.queue(request);
    }

    fn request_trap_removal(&mut self, trap_name: &str) {
        self.pending_trap_removals.push(trap_name.to_owned());
    }

    fn player_is_fighting(&mut self, player: PlayerId) {
        self.fighting.insert(player);
    }

    fn hostile_creatures_near(
        &self,
        seat: SeatId,
        center: TileCoord,
        range: u32,
    ) -> Vec<(CreatureId, TileCoord)> {
        let mut found: Vec<(u32, CreatureId, TileCoord)> = self
            .creatures
            .values()
            .filter(|c| c.is_alive() && !self.seats.are_allied(seat, c.seat))
            .map(|c| (c.tile.chebyshev_distance(center), c.id, c.tile))
            .filter(|&(distance, _, _)| distance <= range)
            .collect();
        found.sort();
        found.into_iter().map(|(_, id, tile)| (id, tile)).collect()
    }

    fn damage_creature(&mut self, creature: CreatureId, amount: f64) {
        if let Some(creature) = self.creatures.get_mut(&creature) {
            creature.hp -= amount;
        }
    }

    fn rng(&mut self) -> &mut GameRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufWriter, Cursor};

    use super::*;
    use crate::notification::Recipient;

    fn server() -> (GameMap, NotificationReceiver) {
        let (mut map, notifications, _render) =
            GameMap::with_channels(MapMode::Server, 10, 10, GameConfig::default());
        map.add_seat(Seat::new(SeatId(1), 1));
        map.add_seat(Seat::new(SeatId(2), 2));
        (map, notifications)
    }

    fn client() -> (GameMap, RenderReceiver) {
        let (mut map, _notifications, render) =
            GameMap::with_channels(MapMode::Client, 10, 10, GameConfig::default());
        map.add_seat(Seat::new(SeatId(1), 1));
        map.add_seat(Seat::new(SeatId(2), 2));
        (map, render)
    }

    const A: TileCoord = TileCoord::new(2, 3);
    const B: TileCoord = TileCoord::new(2, 4);

    #[test]
    fn build_names_traps_by_type() {
        let (mut map, _rx) = server();
        let registry = TrapRegistry::default();
        let first = map
            .build_trap(TrapType::Spike, SeatId(1), &[A], &registry)
            .unwrap();
        let second = map
            .build_trap(TrapType::Cannon, SeatId(1), &[B], &registry)
            .unwrap();
        assert_eq!(first, "Spike_1");
        assert_eq!(second, "Cannon_2");
        assert_eq!(map.tile(A).unwrap().covering_trap(), Some("Spike_1"));
        assert_eq!(map.num_traps(), 2);
    }

    #[test]
    fn build_validates_footprint() {
        let (mut map, _rx) = server();
        let registry = TrapRegistry::default();
        assert_eq!(
            map.build_trap(TrapType::Spike, SeatId(1), &[], &registry),
            Err(BuildError::EmptyFootprint)
        );
        assert_eq!(
            map.build_trap(TrapType::Null, SeatId(1), &[A], &registry),
            Err(BuildError::NotBuildable(TrapType::Null))
        );
        assert_eq!(
            map.build_trap(TrapType::Spike, SeatId(5), &[A], &registry),
            Err(BuildError::UnknownSeat(SeatId(5)))
        );
        let outside = TileCoord::new(10, 0);
        assert_eq!(
            map.build_trap(TrapType::Spike, SeatId(1), &[A, outside], &registry),
            Err(BuildError::TileOutOfBounds(outside))
        );
        assert_eq!(
            map.build_trap(TrapType::Spike, SeatId(1), &[A, A], &registry),
            Err(BuildError::DuplicateTile(A))
        );
        assert_eq!(map.tile(A).unwrap().covering_trap(), None);

        map.build_trap(TrapType::Spike, SeatId(1), &[A], &registry)
            .unwrap();
        assert_eq!(
            map.build_trap(TrapType::Cannon, SeatId(2), &[B, A], &registry),
            Err(BuildError::TileAlreadyCovered {
                tile: A,
                trap: "Spike_1".into()
            })
        );
        assert_eq!(map.tile(B).unwrap().covering_trap(), None);
    }

    #[test]
    fn build_broadcasts_add_trap() {
        let (mut map, rx) = server();
        let registry = TrapRegistry::default();
        let name = map
            .build_trap(TrapType::Cannon, SeatId(1), &[A, B], &registry)
            .unwrap();
        let sent = rx.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, Recipient::All);
        assert_eq!(
            sent[0].kind,
            NotificationKind::AddTrap {
                record: map.trap(&name).unwrap().encode_packet().into_bytes()
            }
        );
    }

    #[test]
    fn upkeep_broadcasts_turn_then_sweeps_dead_traps() {
        let (mut map, rx) = server();
        let registry = TrapRegistry::default();
        map.bind_player(SeatId(1), PlayerId(4));
        let name = map
            .build_trap(TrapType::Spike, SeatId(1), &[A], &registry)
            .unwrap();
        rx.drain();

        assert_eq!(map.damage_trap_tile(A, 10_000.0), Some(0.0));
        map.do_upkeep();

        assert_eq!(map.turn(), 1);
        assert!(map.trap(&name).is_none());
        assert_eq!(map.tile(A).unwrap().covering_trap(), None);
        assert!(map.pending_trap_removals().is_empty());

        let kinds: Vec<_> = rx.drain().into_iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::TurnStarted { turn: 1 },
                NotificationKind::RemoveTrapTile {
                    trap_name: name,
                    tile: A
                },
            ]
        );
    }

    #[test]
    fn fighting_is_reported_once_per_tick() {
        let (mut map, rx) = server();
        let registry = TrapRegistry::default();
        map.bind_player(SeatId(1), PlayerId(4));
        map.add_creature(SeatId(2), A, 1.0e9).unwrap();
        map.add_creature(SeatId(2), B, 1.0e9).unwrap();
        map.build_trap(TrapType::Spike, SeatId(1), &[A, B], &registry)
            .unwrap();
        let reload = map.config().trap(TrapType::Spike).unwrap().reload_time;
        for _ in 0..reload {
            map.do_upkeep();
        }
        rx.drain();

        map.do_upkeep();
        let fighting: Vec<_> = rx
            .drain()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::PlayerFighting)
            .collect();
        assert_eq!(fighting.len(), 1);
        assert_eq!(fighting[0].recipient, Recipient::Player(PlayerId(4)));
        assert!(!map.is_fighting(PlayerId(4)));
    }

    #[test]
    fn creatures_off_the_map_are_rejected() {
        let (mut map, _rx) = server();
        let registry = TrapRegistry::default();
        map.build_trap(TrapType::Cannon, SeatId(1), &[TileCoord::new(5, 5)], &registry)
            .unwrap();
        let far = TileCoord::new(i32::MIN, 0);
        assert_eq!(
            map.add_creature(SeatId(2), far, 1.0),
            Err(BuildError::TileOutOfBounds(far))
        );
        assert_eq!(map.creatures().count(), 0);
        let reload = map.config().trap(TrapType::Cannon).unwrap().reload_time;
        for _ in 0..=reload {
            map.do_upkeep();
        }
    }

    #[test]
    fn dead_creatures_are_swept() {
        let (mut map, _rx) = server();
        let registry = TrapRegistry::default();
        let victim = map.add_creature(SeatId(2), A, 1.0).unwrap();
        map.build_trap(TrapType::Spike, SeatId(1), &[A], &registry)
            .unwrap();
        let reload = map.config().trap(TrapType::Spike).unwrap().reload_time;
        for _ in 0..=reload {
            map.do_upkeep();
        }
        assert!(map.creature(victim).is_none());
    }

    #[test]
    fn join_sends_welcome_rate_and_existing_traps() {
        let (mut map, rx) = server();
        let registry = TrapRegistry::default();
        map.build_trap(TrapType::Cannon, SeatId(2), &[A], &registry)
            .unwrap();
        rx.drain();

        assert_eq!(map.player_joined(PlayerId(9)), Some(SeatId(1)));
        let sent = rx.drain();
        assert!(
            sent.iter()
                .all(|n| n.recipient == Recipient::Player(PlayerId(9)))
        );
        let types: Vec<_> = sent.iter().map(|n| n.kind.notification_type()).collect();
        assert_eq!(
            types,
            vec![
                keeper_protocol::NotificationType::Welcome,
                keeper_protocol::NotificationType::SetTurnsPerSecond,
                keeper_protocol::NotificationType::AddTrap,
            ]
        );
        assert_eq!(map.player_left(PlayerId(9)), Some(SeatId(1)));
    }

    #[test]
    fn client_mirrors_add_and_remove() {
        let (mut server, rx) = server();
        let registry = TrapRegistry::default();
        let name = server
            .build_trap(TrapType::Cannon, SeatId(1), &[A, B], &registry)
            .unwrap();
        server.damage_trap_tile(B, 10_000.0);
        server.do_upkeep();

        let (mut client, render) = client();
        for notification in rx.drain() {
            client
                .apply_server_packet(notification.encode().as_bytes(), &registry)
                .unwrap();
        }

        assert_eq!(client.turn(), 1);
        let mirrored = client.trap(&name).unwrap();
        assert_eq!(mirrored.covered_tiles(), &[A]);
        assert_eq!(client.tile(A).unwrap().covering_trap(), Some(name.as_str()));
        assert_eq!(client.tile(A).unwrap().seat(), Some(SeatId(1)));
        assert_eq!(client.tile(B).unwrap().covering_trap(), None);
        assert_eq!(
            render.drain(),
            vec![
                RenderRequest::CreateBuilding {
                    building: name.clone(),
                    tile: A
                },
                RenderRequest::CreateBuilding {
                    building: name.clone(),
                    tile: B
                },
                RenderRequest::DestroyBuilding {
                    building: name,
                    tile: B
                },
            ]
        );
    }

    #[test]
    fn client_rejects_unknown_trap_tile_removal() {
        let (mut client, _render) = client();
        let packet = NotificationKind::RemoveTrapTile {
            trap_name: "Ghost_1".into(),
            tile: A,
        }
        .encode();
        assert!(matches!(
            client.apply_server_packet(packet.as_bytes(), &TrapRegistry::default()),
            Err(DecodeError::UnknownTrap(name)) if name == "Ghost_1"
        ));
    }

    #[test]
    fn fullness_change_is_broadcast_and_mirrored() {
        let (mut server, rx) = server();
        assert!(server.set_tile_fullness(A, 0.5));
        assert!(!server.set_tile_fullness(TileCoord::new(-1, 0), 0.5));
        let (mut client, _render) = client();
        for n in rx.drain() {
            client
                .apply_server_packet(n.encode().as_bytes(), &TrapRegistry::default())
                .unwrap();
        }
        assert_eq!(client.tile(A).unwrap().fullness(), 0.5);
    }

    #[test]
    fn save_section_roundtrip() {
        let (mut map, _rx) = server();
        let registry = TrapRegistry::default();
        map.build_trap(TrapType::Cannon, SeatId(1), &[A, B], &registry)
            .unwrap();
        map.build_trap(TrapType::Boulder, SeatId(2), &[TileCoord::new(7, 7)], &registry)
            .unwrap();

        let mut writer = SaveWriter::new(Vec::new());
        map.write_traps(&mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.starts_with("2\n"));

        let (mut loaded, _rx2) = self::server();
        let count = loaded
            .read_traps(&mut SaveReader::new(Cursor::new(text)), &registry)
            .unwrap();
        assert_eq!(count, 2);
        for trap in map.traps() {
            let copy = loaded.trap(trap.name()).unwrap();
            assert_eq!(copy.seat(), trap.seat());
            assert_eq!(copy.covered_tiles(), trap.covered_tiles());
            assert_eq!(copy.trap_type(), trap.trap_type());
        }

        // Generated names skip the ones that were loaded.
        let next = loaded
            .build_trap(TrapType::Cannon, SeatId(1), &[TileCoord::new(0, 0)], &registry)
            .unwrap();
        assert_eq!(next, "Cannon_2");
    }

    #[test]
    fn saved_section_is_flushed() {
        let (mut map, _rx) = server();
        let registry = TrapRegistry::default();
        map.build_trap(TrapType::Spike, SeatId(1), &[A], &registry)
            .unwrap();

        let mut writer = SaveWriter::new(BufWriter::with_capacity(1 << 16, Vec::new()));
        map.write_traps(&mut writer).unwrap();
        let buffered = writer.into_inner();
        assert!(buffered.buffer().is_empty());
        assert!(buffered.get_ref().starts_with(b"1\n2\tSpike_1\t1\t"));
    }

    #[test]
    fn remove_trap_releases_tiles() {
        let (mut map, _rx) = server();
        let registry = TrapRegistry::default();
        let name = map
            .build_trap(TrapType::Spike, SeatId(1), &[A, B], &registry)
            .unwrap();
        let removed = map.remove_trap(&name).unwrap();
        assert_eq!(removed.num_covered_tiles(), 0);
        assert_eq!(map.tile(A).unwrap().covering_trap(), None);
        assert!(map.remove_trap(&name).is_none());
    }
}
