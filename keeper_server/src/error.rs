// Errors surfaced by the server library. The binary wraps them in `anyhow`.

use std::io;

use keeper_protocol::WireError;
use keeper_sim::{BuildError, ConfigError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("scenario could not be built: {0}")]
    Scenario(#[from] BuildError),

    #[error("malformed handshake: {0}")]
    Handshake(#[from] WireError),

    #[error("map size {width}x{height} is outside 1..={max} tiles per side")]
    MapSize { width: u32, height: u32, max: u32 },

    #[error("client speaks protocol {got}, server speaks {expected}")]
    ProtocolVersion { expected: u32, got: u32 },
}
