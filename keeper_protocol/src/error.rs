// Error type shared by every codec in this crate.
//
// Both channels (binary packets and tab-delimited save streams) report
// failures through `WireError`. Callers higher up (the sim's trap registry,
// the server's reader threads) wrap it in their own error types; nothing in
// this crate panics on malformed input.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("packet truncated: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("string field is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("unknown {kind} value {value}")]
    UnknownEnumValue { kind: &'static str, value: u32 },

    #[error("line {line}: expected {expected}, found {token:?}")]
    BadToken {
        line: usize,
        token: String,
        expected: &'static str,
    },

    #[error("line {line}: stream ended while expecting {expected}")]
    MissingToken { line: usize, expected: &'static str },

    #[error("token {0:?} is empty or contains whitespace")]
    InvalidToken(String),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}
