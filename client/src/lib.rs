//! # Snake Client Library
//!
//! Thin client for the multiplayer snake server. The client holds no game
//! rules: it sends heading requests and draws whatever snapshot the server
//! sent last.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Connects, performs the welcome handshake and runs a reader task and a
//! writer task. The latest snapshot is exposed through a `watch` channel so
//! the render loop never waits on the socket.
//!
//! ### Input Module (`input`)
//! Maps WASD and the arrow keys to headings, at most one request per frame.
//!
//! ### Rendering Module (`rendering`)
//! Draws the board, obstacles, food and snakes with the colors from the
//! server's config, plus a one-line status bar.

pub mod input;
pub mod network;
pub mod rendering;
