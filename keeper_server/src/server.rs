// TCP server and simulation loop.
//
// Architecture: one thread per concern, joined by `mpsc` channels.
//
// - **Listener thread** (non-blocking `TcpListener::accept()` loop): assigns
//   each connection a `PlayerId` and spawns a client thread for it.
// - **Client threads** (one per connection): read the `Hello` handshake with
//   a 5s timeout, then hand the write half to the dispatcher (`Connection`)
//   and only then send `SimInput::PlayerJoined` to the sim thread. Afterwards
//   they read frames until EOF and report `SimInput::PlayerLeft`. Clients
//   have nothing to say after the handshake; extra frames are ignored.
// - **Sim thread**: owns the `GameMap` and is the only code that touches
//   simulation state. Ticks at the map's `turns_per_second`, using
//   `recv_timeout` on the input channel as its timer.
// - **Dispatch thread** (`dispatch.rs`): the only writer to client sockets.
//
// Registering the connection before announcing the join matters: the sim
// thread answers `PlayerJoined` with notifications addressed to the new
// player, and the dispatcher must already know where to send them.
//
// Shutdown: `ServerHandle::stop` clears the shared `keep_running` flag. The
// listener, sim and dispatch threads poll it at least every 50ms. Client
// reader threads block on their sockets and exit when the peer hangs up.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use keeper_protocol::{Hello, PROTOCOL_VERSION, PlayerId, read_frame};
use keeper_sim::notification::notification_channel;
use keeper_sim::{GameMap, TrapRegistry};
use tracing::{debug, error, info, trace, warn};

use crate::config::ServerConfig;
use crate::dispatch::{Connection, run_dispatch};
use crate::error::ServerError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

type ClientWriter = BufWriter<TcpStream>;

/// Events from the network side that the sim thread must apply.
#[derive(Debug, PartialEq, Eq)]
pub enum SimInput {
    PlayerJoined { player: PlayerId, name: String },
    PlayerLeft { player: PlayerId },
}

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal every server thread to stop and wait for them.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the server threads exit on their own.
    pub fn join(self) {
        for handle in self.threads {
            if handle.join().is_err() {
                error!("server thread panicked");
            }
        }
    }
}

/// Build the scenario map and start serving it. Returns a handle for
/// stopping the server and the actual bound address (useful when port 0 is
/// used to let the OS pick a free port).
pub fn start_server(config: ServerConfig) -> Result<(ServerHandle, SocketAddr), ServerError> {
    let registry = TrapRegistry::with_builtin_traps();
    let (notification_tx, notification_rx) = notification_channel();
    let map = config.build_map(&registry, notification_tx)?;

    let listener = TcpListener::bind(("127.0.0.1", config.port))?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let (connection_tx, connection_rx) = mpsc::channel::<Connection<ClientWriter>>();
    let (input_tx, input_rx) = mpsc::channel();

    let mut threads = Vec::new();
    {
        let keep_running = keep_running.clone();
        threads.push(thread::spawn(move || {
            run_dispatch(notification_rx, connection_rx, keep_running);
        }));
    }
    {
        let keep_running = keep_running.clone();
        threads.push(thread::spawn(move || {
            run_sim(map, input_rx, keep_running);
        }));
    }
    {
        let keep_running = keep_running.clone();
        threads.push(thread::spawn(move || {
            run_listener(listener, connection_tx, input_tx, keep_running);
        }));
    }

    info!(%addr, "server listening");
    Ok((
        ServerHandle {
            keep_running,
            threads,
        },
        addr,
    ))
}

// ---------------------------------------------------------------------------
// Sim thread
// ---------------------------------------------------------------------------

fn tick_interval(turns_per_second: f64) -> Duration {
    if turns_per_second.is_finite() && turns_per_second > 0.0 {
        Duration::from_secs_f64(1.0 / turns_per_second)
    } else {
        Duration::from_secs(1)
    }
}

fn apply_input(map: &mut GameMap, input: SimInput) {
    match input {
        SimInput::PlayerJoined { player, name } => {
            debug!(%player, %name, "applying join");
            map.player_joined(player);
        }
        SimInput::PlayerLeft { player } => {
            map.player_left(player);
        }
    }
}

/// Fixed-rate tick loop. Inputs are applied between ticks as they arrive.
fn run_sim(mut map: GameMap, inputs: Receiver<SimInput>, keep_running: Arc<AtomicBool>) {
    let mut next_tick = Instant::now() + tick_interval(map.turns_per_second());
    while keep_running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= next_tick {
            map.do_upkeep();
            next_tick += tick_interval(map.turns_per_second());
            // Don't try to catch up after a stall.
            if next_tick < now {
                next_tick = now + tick_interval(map.turns_per_second());
            }
            continue;
        }
        let wait = (next_tick - now).min(POLL_INTERVAL);
        match inputs.recv_timeout(wait) {
            Ok(input) => apply_input(&mut map, input),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(turn = map.turn(), "sim loop stopped");
}

// ---------------------------------------------------------------------------
// Listener and client threads
// ---------------------------------------------------------------------------

fn run_listener(
    listener: TcpListener,
    connections: Sender<Connection<ClientWriter>>,
    inputs: Sender<SimInput>,
    keep_running: Arc<AtomicBool>,
) {
    let mut next_player = 1;
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let player = PlayerId(next_player);
                next_player += 1;
                debug!(%player, %peer, "accepted connection");
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!(%peer, error = %e, "could not configure stream");
                    continue;
                }
                let connections = connections.clone();
                let inputs = inputs.clone();
                thread::spawn(move || serve_client(stream, player, connections, inputs));
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                error!(error = %e, "accept failed; listener stopping");
                break;
            }
        }
    }
}

/// Read and check the client's `Hello`. The stream is left without a read
/// timeout on success.
fn handshake(stream: &TcpStream) -> Result<Hello, ServerError> {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let mut reader = stream;
    let bytes = read_frame(&mut reader)?;
    let hello = Hello::decode(&bytes)?;
    if hello.protocol_version != PROTOCOL_VERSION {
        return Err(ServerError::ProtocolVersion {
            expected: PROTOCOL_VERSION,
            got: hello.protocol_version,
        });
    }
    stream.set_read_timeout(None)?;
    Ok(hello)
}

fn serve_client(
    stream: TcpStream,
    player: PlayerId,
    connections: Sender<Connection<ClientWriter>>,
    inputs: Sender<SimInput>,
) {
    let hello = match handshake(&stream) {
        Ok(hello) => hello,
        Err(e) => {
            warn!(%player, error = %e, "handshake failed; closing connection");
            return;
        }
    };
    let write_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(%player, error = %e, "could not clone stream");
            return;
        }
    };

    let connection = Connection {
        player,
        stream: BufWriter::new(write_half),
    };
    if connections.send(connection).is_err() {
        return;
    }
    info!(%player, name = %hello.player_name, "client connected");
    if inputs
        .send(SimInput::PlayerJoined {
            player,
            name: hello.player_name,
        })
        .is_err()
    {
        return;
    }

    let mut reader = BufReader::new(stream);
    while let Ok(frame) = read_frame(&mut reader) {
        trace!(%player, len = frame.len(), "ignoring client frame");
    }
    info!(%player, "client disconnected");
    let _ = inputs.send(SimInput::PlayerLeft { player });
}
