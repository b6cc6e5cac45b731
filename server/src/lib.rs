//! # Robots Game Server Library
//!
//! This library provides the authoritative server for the turn-based robot
//! delivery game. It owns the canonical world, collects one command per
//! living robot each turn, resolves them and broadcasts the outcome to every
//! connected party.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server alone decides what happens on the board. Clients only ever see
//! the updates it publishes and must reconstruct the world from them.
//!
//! ### Client Management
//! Handles the lifecycle of player and debugger connections:
//! - Role handshake and binding of players to robots in items file order
//! - Per-turn package lists and command collection
//! - Debugger pacing through the `step` control line
//!
//! ### Deterministic Resolution
//! Commands execute strictly in descending bid order. Robots that bid the
//! same amount keep their registration order, so a game replayed with the
//! same commands always produces the same updates.
//!
//! ## Architecture Design
//!
//! ### Sequential Turn Loop
//! A turn is a fixed sequence: wait for debuggers, send every living robot
//! the packages on its cell, then read the commands, resolve, broadcast.
//! Reads happen one player at a time in registration order; the order of
//! arrival never influences resolution.
//!
//! ### Line Protocol over TCP
//! Every message is a single newline-terminated line. The transport is
//! generic, so the whole loop runs unchanged over in-memory pipes in tests.
//!
//! ### Failure Model
//! A malformed command is logged and the player is asked again. Losing a
//! player connection ends the game with [`network::ServerError::PlayerIo`].
//! Debuggers that fail are dropped without affecting play.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The world state and turn resolution rules:
//! - Bid payment and elimination of bankrupt robots
//! - Moves with recursive pushing, drowning and involuntary drops
//! - Capacity-checked picks and scoring drops
//! - Final rankings
//!
//! ### Invariants Module (`invariants`)
//! Consistency checks run after every turn in debug builds.
//!
//! ### Client Manager Module (`client_manager`)
//! Player and debugger connections and debugger broadcast/pacing.
//!
//! ### Network Module (`network`)
//! The accept loop and the per-game turn state machine.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameState;
//! use server::network::{accept_clients, Server};
//! use std::path::Path;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let board = shared::board::load(Path::new("boards/small.board"))?;
//!     let robots: Vec<_> = board.robots.iter().map(|r| r.id).collect();
//!
//!     let listener = TcpListener::bind("127.0.0.1:7919").await?;
//!     let clients = accept_clients(&listener, &robots).await?;
//!
//!     let mut server = Server::new(GameState::from_board(board), clients);
//!     for ranking in server.run().await? {
//!         println!("robot {} scored {}", ranking.robot, ranking.score);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod invariants;
pub mod network;
