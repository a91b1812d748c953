//! Error taxonomy for the game server
//!
//! Only [`ServerError`] is fatal, and only at startup. Everything else is
//! scoped to a single input or a single connection.

use snake_shared::{ConfigError, Direction};
use std::io;
use thiserror::Error;

/// An input that decoded fine but cannot be applied
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cannot reverse from {current} to {requested}")]
    ReverseHeading {
        current: Direction,
        requested: Direction,
    },

    #[error("unknown player {0}")]
    UnknownPlayer(u32),

    #[error("player {0} is no longer alive")]
    PlayerDead(u32),

    #[error("clients may only send input, got {0}")]
    UnexpectedPacket(&'static str),
}

/// Failure of a single player's socket; the player forfeits
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed by peer")]
    Closed,

    #[error("write timed out")]
    WriteTimeout,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A connection that arrived when no slot could take it
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapacityError {
    #[error("server full ({required} players already connected)")]
    Full { required: u32 },

    #[error("round already in progress")]
    RoundInProgress,

    #[error("round has ended")]
    RoundEnded,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
