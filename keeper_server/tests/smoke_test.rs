// Integration smoke test for the keeper server.
//
// Starts a server on localhost with the default scenario (one cannon for
// seat 1 with an enemy creature in range), connects clients over TCP, and
// checks the join sequence, the client-side mirror, turn broadcasting and
// the fighting notification.
//
// Clients use `NetClient` or a plain socket with the protocol crate's
// framing; no server internals are touched.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use keeper_protocol::{Hello, PlayerId, read_frame, write_frame};
use keeper_server::{NetClient, ServerConfig, start_server};
use keeper_sim::{
    GameConfig, GameMap, MapMode, NotificationKind, SeatId, TileCoord, TrapRegistry, TrapType,
};

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> ServerConfig {
    let mut config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    config.game.turns_per_second = 20.0;
    for creature in &mut config.scenario.creatures {
        creature.hp = 1.0e9;
    }
    config
}

fn mirror_map(config: &ServerConfig) -> GameMap {
    let (mut map, _notifications, _render) = GameMap::with_channels(
        MapMode::Client,
        config.map_width,
        config.map_height,
        GameConfig::default(),
    );
    for seat in &config.scenario.seats {
        map.add_seat(seat.clone());
    }
    map
}

fn connect(addr: SocketAddr, name: &str) -> NetClient {
    NetClient::connect(addr, name).unwrap()
}

#[test]
fn join_sequence_then_turns() {
    let config = test_config();
    let (handle, addr) = start_server(config.clone()).unwrap();
    let client = connect(addr, "Alice");

    // 1. Welcome with the first player id and the first free seat.
    let first = client.recv_timeout(WAIT).unwrap();
    assert_eq!(
        first.kind,
        NotificationKind::Welcome {
            player: PlayerId(1),
            seat: Some(SeatId(1)),
        }
    );

    // 2. The tick rate.
    let second = client.recv_timeout(WAIT).unwrap();
    assert_eq!(
        second.kind,
        NotificationKind::SetTurnsPerSecond {
            turns_per_second: 20.0
        }
    );

    // 3. The scenario's cannon, which decodes into a client mirror.
    let third = client.recv_timeout(WAIT).unwrap();
    assert!(
        matches!(third.kind, NotificationKind::AddTrap { .. }),
        "expected AddTrap, got {:?}",
        third.kind
    );
    let registry = TrapRegistry::with_builtin_traps();
    let mut mirror = mirror_map(&config);
    mirror.apply_server_packet(&third.bytes, &registry).unwrap();
    let trap = mirror.trap("Cannon_1").unwrap();
    assert_eq!(trap.trap_type(), TrapType::Cannon);
    assert_eq!(trap.seat(), SeatId(1));
    assert_eq!(
        trap.covered_tiles(),
        &[TileCoord::new(2, 3), TileCoord::new(2, 4)]
    );

    // 4. Only then the turn stream.
    let fourth = client.recv_timeout(WAIT).unwrap();
    assert!(
        matches!(fourth.kind, NotificationKind::TurnStarted { .. }),
        "expected TurnStarted, got {:?}",
        fourth.kind
    );
    mirror.apply_server_packet(&fourth.bytes, &registry).unwrap();
    assert!(mirror.turn() > 0);

    // 5. Once the cannon reloads it fires at the intruder.
    let fighting = client.recv_until(WAIT, |kind| *kind == NotificationKind::PlayerFighting);
    assert!(fighting.is_some(), "no PlayerFighting within {WAIT:?}");

    client.disconnect();
    handle.stop();
}

#[test]
fn second_client_gets_next_seat_and_existing_traps() {
    let (handle, addr) = start_server(test_config()).unwrap();

    let alice = connect(addr, "Alice");
    let welcome = alice.recv_timeout(WAIT).unwrap();
    assert!(matches!(
        welcome.kind,
        NotificationKind::Welcome {
            seat: Some(SeatId(1)),
            ..
        }
    ));

    let bob = connect(addr, "Bob");
    let welcome = bob.recv_timeout(WAIT).unwrap();
    assert_eq!(
        welcome.kind,
        NotificationKind::Welcome {
            player: PlayerId(2),
            seat: Some(SeatId(2)),
        }
    );
    let add_trap = bob.recv_until(WAIT, |kind| matches!(kind, NotificationKind::AddTrap { .. }));
    assert!(add_trap.is_some());
    let turn = bob.recv_until(WAIT, |kind| matches!(kind, NotificationKind::TurnStarted { .. }));
    assert!(turn.is_some());

    // Bob's seat owns no traps, so only Alice is told about fighting.
    assert!(
        alice
            .recv_until(WAIT, |kind| *kind == NotificationKind::PlayerFighting)
            .is_some()
    );
    assert!(
        bob.poll()
            .iter()
            .all(|n| n.kind != NotificationKind::PlayerFighting)
    );
    // Alice never sees Bob's welcome.
    assert!(
        alice
            .poll()
            .iter()
            .all(|n| !matches!(n.kind, NotificationKind::Welcome { .. }))
    );

    alice.disconnect();
    bob.disconnect();
    handle.stop();
}

#[test]
fn wrong_protocol_version_is_dropped() {
    let (handle, addr) = start_server(test_config()).unwrap();

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();
    let hello = Hello {
        protocol_version: 99,
        player_name: "Mallory".into(),
    };
    write_frame(&mut stream, hello.encode().as_bytes()).unwrap();

    // The server closes the connection without sending anything.
    assert!(read_frame(&mut stream).is_err());

    handle.stop();
}
