use crate::game::Agent;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::protocol::{decode_board, decode_dimensions, decode_packages, decode_updates};
use shared::{Connection, PlayerConfig, ProtocolError, Role, RobotId};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Money wagered on every command.
    pub bid: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self { bid: 1 }
    }
}

/// How a finished game went for this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub robot: RobotId,
    pub turns: u32,
    pub money: i64,
    pub delivered_weight: u64,
}

/// Plays one game as `player` over an established connection and returns
/// once our robot has been destroyed.
pub async fn play<S>(
    connection: &mut Connection<S>,
    settings: Settings,
) -> Result<GameSummary, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    connection.send_line(&Role::Player.to_string()).await?;

    let (width, height) = decode_dimensions(&connection.recv_line().await?)?;
    let mut rows = Vec::with_capacity(height);
    for _ in 0..height {
        rows.push(connection.recv_line().await?);
    }
    let grid = decode_board(width, &rows)?;

    let config: PlayerConfig = connection.recv_line().await?.parse()?;
    info!(
        "Playing robot {} (strength {}, money {}) on a {}x{} board",
        config.id, config.strength, config.money, width, height
    );

    let mut agent = Agent::new(grid, config, settings.bid);
    receive_updates(connection, &mut agent).await?;

    let mut turns = 0;
    while agent.is_alive() {
        let packages = decode_packages(&connection.recv_line().await?)?;
        debug!("{} package(s) at {}", packages.len(), agent.position());
        agent.observe_packages(packages);

        let command = agent.decide();
        connection.send_line(&command.to_string()).await?;
        turns += 1;

        receive_updates(connection, &mut agent).await?;
        agent.end_turn();
    }

    let summary = GameSummary {
        robot: agent.id(),
        turns,
        money: agent.robot().money,
        delivered_weight: agent.score(),
    };
    info!(
        "Robot {} is gone after {} turns, delivered weight {}",
        summary.robot, summary.turns, summary.delivered_weight
    );
    Ok(summary)
}

async fn receive_updates<S>(
    connection: &mut Connection<S>,
    agent: &mut Agent,
) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for update in decode_updates(&connection.recv_line().await?)? {
        agent.apply_update(&update);
    }
    Ok(())
}
