//! # Robots Game Client Library
//!
//! This library implements an autonomous player for the turn-based robot
//! delivery game. It connects to a server, rebuilds the world from the
//! updates it receives and picks one command per turn without any human
//! input.
//!
//! ## Architecture Overview
//!
//! ### Belief World
//! The client never sees the authoritative state. It starts from the board
//! the server sends and applies every broadcast update to a private copy.
//! When an update contradicts what it believed (a rival picks a package we
//! thought we carried, we move without having asked to) the belief is
//! corrected rather than trusted.
//!
//! ### Decision Pipeline
//! Each turn the agent, in order: delivers what belongs on its cell, picks
//! up what fits, walks toward its current target, or chooses a new target.
//! Targets are the nearest known source of packages or the nearest delivery,
//! weighed by how loaded the robot is. With nothing known the agent sweeps
//! the board row by row.
//!
//! ### Threat Avoidance
//! Among equally short steps toward a target the agent prefers the one whose
//! path passes fewest rival robots, looking up to ten steps ahead.
//!
//! ## Module Organization
//!
//! ### Navigation Module (`navigation`)
//! - Breadth-first distance fields with an "unreachable" sentinel
//! - Rival counting and recursive threat scores
//! - The boustrophedon scanner
//!
//! ### Game Module (`game`)
//! The [`game::Agent`]: belief state, update handling and command choice.
//!
//! ### Network Module (`network`)
//! The protocol session that drives an agent over a connection.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{play, Settings};
//! use shared::Connection;
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = TcpStream::connect("127.0.0.1:7919").await?;
//!     let mut connection = Connection::new(stream);
//!
//!     let summary = play(&mut connection, Settings::default()).await?;
//!     println!("delivered {} in {} turns", summary.delivered_weight, summary.turns);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod navigation;
pub mod network;
