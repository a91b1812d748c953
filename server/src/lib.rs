//! # Snake Server Library
//!
//! Authoritative server for a multiplayer snake round. The server owns the
//! only copy of the game state, applies player inputs at tick boundaries and
//! publishes an immutable snapshot after every tick.
//!
//! ## Round Lifecycle
//!
//! A round moves through three states, mirrored on the wire as
//! `RoundStatus`:
//! - **Waiting**: connections are seated in the lowest free player slot until
//!   the configured number of players is reached
//! - **Running**: the tick timer drives the simulation; late connections are
//!   refused with a `rejected` frame
//! - **Ended**: the final snapshot names the winner (or a draw) and the
//!   process exits
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! One server loop task owns the [`game::GameState`] and the tick timer.
//! Connection handlers never touch the game state directly: they forward
//! inputs and disconnects over an unbounded channel, and the loop stages
//! them for the next tick.
//!
//! ### Snapshot Broadcast
//! Snapshots are published through a `watch` channel holding an
//! `Arc<Snapshot>`. Publishing replaces the latest value and never waits on a
//! client, so a slow client only skips intermediate snapshots.
//!
//! ### Failure Isolation
//! A failed read or a timed-out write ends only that player's handler. The
//! player forfeits and their snake dies at the next tick.
//!
//! ## Module Organization
//!
//! - `client_manager`: player slots and connection bookkeeping
//! - `connection`: per-socket reader and writer halves
//! - `error`: error taxonomy
//! - `game`: grid simulation and the tick algorithm
//! - `network`: the server loop
//! - `snake`: a single snake body and its movement rules

pub mod client_manager;
pub mod connection;
pub mod error;
pub mod game;
pub mod network;
pub mod snake;
