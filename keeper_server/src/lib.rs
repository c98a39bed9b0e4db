// keeper_server: authoritative network server for the keeper simulation.
//
// The server owns the only writable `GameMap`. It ticks the map at a fixed
// rate and streams every `ServerNotification` the map produces to the
// connected clients as length-framed packets. Clients mirror what they
// receive into their own client-mode maps.
//
// Module overview:
// - `config.rs`:   `ServerConfig` (port, map size, `GameConfig`) and the
//                  starting `Scenario`; builds the initial map.
// - `server.rs`:   listener, per-client reader threads, and the sim thread.
//                  Uses `std::net` with a thread-per-reader architecture and
//                  `mpsc` channels to funnel events into the single-threaded
//                  sim.
// - `dispatch.rs`: the network-send thread; routes notifications to client
//                  streams.
// - `client.rs`:   `NetClient`, a minimal blocking-reader client used by
//                  tests and tools.
// - `error.rs`:    `ServerError`.
//
// The server can run as a standalone binary (`main.rs`) or be embedded via
// the library API (`start_server`).

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;

pub use client::{NetClient, ReceivedNotification};
pub use config::{CreaturePlacement, Scenario, ServerConfig, TrapPlacement};
pub use error::ServerError;
pub use server::{ServerHandle, start_server};
