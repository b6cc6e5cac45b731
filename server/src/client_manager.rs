//! Connected player and debugger bookkeeping for the game server
//!
//! This module owns the server side of every open connection:
//! - Players, each bound to the robot it controls, kept in registration order
//! - Debuggers, which observe every update and pace the game with `step`
//!
//! A debugger that fails or disconnects is simply forgotten. Player failures
//! are reported back to the caller because the game cannot go on without them.

use log::{debug, info, warn};
use shared::protocol::STEP;
use shared::{Connection, RobotId};
use tokio::io::{AsyncRead, AsyncWrite};

/// A player connection and the robot it drives
#[derive(Debug)]
pub struct Player<S> {
    /// Robot assigned from the items file at registration time
    pub robot: RobotId,
    pub connection: Connection<S>,
}

/// Registry of every client taking part in a game
///
/// Players are stored in the order they registered, which is also the
/// order robots appear in the items file. Debuggers carry no identity and
/// are addressed only as a group.
#[derive(Debug)]
pub struct ClientManager<S> {
    players: Vec<Player<S>>,
    debuggers: Vec<Connection<S>>,
}

impl<S> Default for ClientManager<S> {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            debuggers: Vec::new(),
        }
    }
}

impl<S> ClientManager<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, robot: RobotId, connection: Connection<S>) {
        info!("Player registered for robot {}", robot);
        self.players.push(Player { robot, connection });
    }

    pub fn add_debugger(&mut self, connection: Connection<S>) {
        self.debuggers.push(connection);
        info!("Debugger registered ({} total)", self.debuggers.len());
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn debugger_count(&self) -> usize {
        self.debuggers.len()
    }

    /// Looks up the connection controlling `robot`
    pub fn player_mut(&mut self, robot: RobotId) -> Option<&mut Connection<S>> {
        self.players
            .iter_mut()
            .find(|p| p.robot == robot)
            .map(|p| &mut p.connection)
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player<S>> + '_ {
        self.players.iter_mut()
    }

    /// Sends lines to every debugger, dropping those that fail
    pub async fn broadcast_to_debuggers(&mut self, lines: &[String]) {
        let mut kept = Vec::with_capacity(self.debuggers.len());
        for mut debugger in self.debuggers.drain(..) {
            match debugger.send_lines(lines).await {
                Ok(()) => kept.push(debugger),
                Err(e) => warn!("Dropping debugger after send failure: {}", e),
            }
        }
        self.debuggers = kept;
    }

    /// Blocks until every debugger has asked for the next turn
    ///
    /// Lines other than `step` are ignored. Debuggers that disconnect while
    /// the server is waiting are removed.
    pub async fn wait_for_debuggers(&mut self) {
        let mut kept = Vec::with_capacity(self.debuggers.len());
        for mut debugger in self.debuggers.drain(..) {
            let stepped = loop {
                match debugger.recv_line().await {
                    Ok(line) if line.trim() == STEP => break true,
                    Ok(line) => debug!("Ignoring debugger input `{}`", line),
                    Err(e) => {
                        warn!("Dropping debugger while waiting for step: {}", e);
                        break false;
                    }
                }
            };
            if stepped {
                kept.push(debugger);
            }
        }
        self.debuggers = kept;
    }
}
