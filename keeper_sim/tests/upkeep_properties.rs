// Property tests for trap upkeep.
//
// Random footprints, random tile damage and random enemy claims are thrown
// at a server map; after every tick each trap's firing state must cover
// exactly its tiles, and tiles must point back at the trap covering them.

use proptest::prelude::*;

use keeper_sim::seat::Seat;
use keeper_sim::{GameConfig, GameMap, MapMode, SeatId, TileCoord, TrapRegistry, TrapType};

const SIZE: i32 = 8;

fn check_invariants(map: &GameMap) -> Result<(), TestCaseError> {
    for trap in map.traps() {
        let mut covered = trap.covered_tiles().to_vec();
        covered.sort();
        let keys: Vec<TileCoord> = trap.tile_state_keys().collect();
        prop_assert_eq!(&keys, &covered);
        for &coord in trap.covered_tiles() {
            prop_assert_eq!(
                map.tile(coord).and_then(|t| t.covering_trap()),
                Some(trap.name())
            );
        }
    }
    for tile in map.tiles().iter() {
        if let Some(name) = tile.covering_trap() {
            let trap = map.trap(name);
            prop_assert!(trap.is_some_and(|t| t.building().covers(tile.coord())));
        }
    }
    Ok(())
}

fn coord() -> impl Strategy<Value = TileCoord> {
    (0..SIZE, 0..SIZE).prop_map(|(x, y)| TileCoord::new(x, y))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn tile_state_tracks_covered_tiles(
        footprints in prop::collection::vec(prop::collection::btree_set(coord(), 1..5), 1..5),
        damage in prop::collection::vec((coord(), 0.0f64..400.0), 0..12),
        claims in prop::collection::vec((coord(), 0.0f64..1.2), 0..12),
        ticks in 1usize..6,
    ) {
        let registry = TrapRegistry::with_builtin_traps();
        let (mut map, _notifications, _render) =
            GameMap::with_channels(MapMode::Server, SIZE as u32, SIZE as u32, GameConfig::default());
        map.add_seat(Seat::new(SeatId(1), 1));
        map.add_seat(Seat::new(SeatId(2), 2));
        map.add_creature(SeatId(2), TileCoord::new(3, 3), 1.0e6).unwrap();

        for (i, footprint) in footprints.iter().enumerate() {
            let tiles: Vec<TileCoord> = footprint.iter().copied().collect();
            let trap_type = TrapType::BUILDABLE[i % TrapType::BUILDABLE.len()];
            // Overlapping footprints are rejected; that is fine here.
            let _ = map.build_trap(trap_type, SeatId(1), &tiles, &registry);
        }
        check_invariants(&map)?;

        for _ in 0..ticks {
            for &(coord, amount) in &damage {
                map.damage_trap_tile(coord, amount);
            }
            for &(coord, percentage) in &claims {
                map.claim_tile(coord, SeatId(2), percentage);
            }
            map.do_upkeep();
            check_invariants(&map)?;
            prop_assert!(map.traps().all(|t| t.num_covered_tiles() > 0));
        }
    }

    #[test]
    fn reload_only_counts_down(reload in 1u32..20, ticks in 0u32..40) {
        let registry = TrapRegistry::with_builtin_traps();
        let mut config = GameConfig::default();
        if let Some(spike) = config.traps.get_mut(&TrapType::Spike) {
            spike.reload_time = reload;
        }
        let (mut map, _notifications, _render) =
            GameMap::with_channels(MapMode::Server, 4, 4, config);
        map.add_seat(Seat::new(SeatId(1), 1));
        let tile = TileCoord::new(1, 1);
        let name = map.build_trap(TrapType::Spike, SeatId(1), &[tile], &registry).unwrap();

        for _ in 0..ticks {
            map.do_upkeep();
        }
        let state = map.trap(&name).unwrap().tile_state(tile).unwrap();
        prop_assert_eq!(state.reload_time_remaining, reload.saturating_sub(ticks));
        prop_assert_eq!(state.activated, ticks > reload);
    }
}
