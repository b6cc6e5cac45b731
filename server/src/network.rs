//! Server network layer: client registration and the turn loop

use crate::client_manager::ClientManager;
use crate::game::{GameState, Ranking};
use crate::invariants::check_invariants;
use log::{debug, error, info, warn};
use shared::protocol::{encode_bundle, encode_dimensions, encode_packages};
use shared::{Command, Connection, PlayerConfig, Role, RobotId, Update};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("lost connection to the player of robot {robot}: {source}")]
    PlayerIo {
        robot: RobotId,
        #[source]
        source: std::io::Error,
    },

    #[error("no player connected for robot {0}")]
    MissingPlayer(RobotId),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode results: {0}")]
    Results(#[from] serde_json::Error),
}

/// Writes the final rankings to `path` as a JSON array
pub fn save_rankings(path: &Path, rankings: &[Ranking]) -> Result<(), ServerError> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, rankings)?;
    file.flush()?;
    info!("Rankings written to {}", path.display());
    Ok(())
}

/// Accepts connections until every robot has a player
///
/// Players are bound to robots in the given order. Debuggers may connect
/// at any point before the last player and are kept as observers.
pub async fn accept_clients(
    listener: &TcpListener,
    robots: &[RobotId],
) -> Result<ClientManager<TcpStream>, ServerError> {
    let mut clients = ClientManager::new();

    for &robot in robots {
        loop {
            let (stream, addr) = listener.accept().await?;
            let mut connection = Connection::new(stream);

            let line = match connection.recv_line().await {
                Ok(line) => line,
                Err(e) => {
                    warn!("Client at {} left during handshake: {}", addr, e);
                    continue;
                }
            };

            match line.trim().parse::<Role>() {
                Ok(Role::Player) => {
                    info!("Player connected from {} for robot {}", addr, robot);
                    clients.add_player(robot, connection);
                    break;
                }
                Ok(Role::Debugger) => {
                    info!("Debugger connected from {}", addr);
                    clients.add_debugger(connection);
                }
                Err(e) => warn!("Closing connection from {}: {}", addr, e),
            }
        }
    }

    Ok(clients)
}

/// Drives one game from the initial board transfer to the final rankings
pub struct Server<S> {
    game: GameState,
    clients: ClientManager<S>,
}

impl<S> Server<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(game: GameState, clients: ClientManager<S>) -> Self {
        Self { game, clients }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub async fn run(&mut self) -> Result<Vec<Ranking>, ServerError> {
        self.send_setup().await?;

        while self.game.any_alive() {
            self.play_turn().await?;
        }

        let rankings = self.game.rankings();
        info!("Game over after {} turns", self.game.turn);
        for (place, ranking) in rankings.iter().enumerate() {
            info!(
                "#{} robot {} scored {}",
                place + 1,
                ranking.robot,
                ranking.score
            );
        }
        Ok(rankings)
    }

    /// Board, configurations and the opening Appear updates
    async fn send_setup(&mut self) -> Result<(), ServerError> {
        let mut board = vec![encode_dimensions(self.game.grid())];
        board.extend(self.game.grid().rows());

        let configs: Vec<PlayerConfig> = self
            .game
            .controllers()
            .iter()
            .map(|c| PlayerConfig {
                id: c.robot.id,
                strength: c.robot.strength,
                money: c.robot.money,
            })
            .collect();
        let appear = encode_bundle(&self.game.initial_updates());

        for player in self.clients.players_mut() {
            let robot = player.robot;
            let Some(config) = configs.iter().find(|c| c.id == robot) else {
                return Err(ServerError::MissingPlayer(robot));
            };

            let mut lines = board.clone();
            lines.push(config.to_string());
            lines.push(appear.clone());
            player
                .connection
                .send_lines(&lines)
                .await
                .map_err(|source| ServerError::PlayerIo { robot, source })?;
        }

        let mut lines = board;
        lines.push(encode_bundle(&configs));
        lines.push(appear);
        self.clients.broadcast_to_debuggers(&lines).await;
        Ok(())
    }

    async fn play_turn(&mut self) -> Result<(), ServerError> {
        self.game.start_turn();
        info!("Starting turn {}", self.game.turn);

        self.clients.wait_for_debuggers().await;

        let living = self.game.living_robots();
        self.send_package_lists(&living).await?;
        let commands = self.collect_commands(&living).await?;
        let updates = self.game.resolve(commands);

        if cfg!(debug_assertions) {
            for violation in check_invariants(&self.game) {
                error!("{}", violation);
            }
        }

        self.broadcast_updates(&living, &updates).await
    }

    /// Sends every living robot the packages on its cell
    async fn send_package_lists(&mut self, living: &[RobotId]) -> Result<(), ServerError> {
        for &robot in living {
            let packages = encode_packages(&self.game.visible_packages(robot));
            self.clients
                .player_mut(robot)
                .ok_or(ServerError::MissingPlayer(robot))?
                .send_line(&packages)
                .await
                .map_err(|source| ServerError::PlayerIo { robot, source })?;
        }
        Ok(())
    }

    /// Reads one command per living robot in registration order
    ///
    /// Malformed commands are logged and the same player is asked again.
    async fn collect_commands(
        &mut self,
        living: &[RobotId],
    ) -> Result<Vec<(RobotId, Command)>, ServerError> {
        let mut commands = Vec::with_capacity(living.len());

        for &robot in living {
            let connection = self
                .clients
                .player_mut(robot)
                .ok_or(ServerError::MissingPlayer(robot))?;

            loop {
                debug!("Awaiting command from robot {}", robot);
                let line = connection
                    .recv_line()
                    .await
                    .map_err(|source| ServerError::PlayerIo { robot, source })?;
                match line.parse::<Command>() {
                    Ok(command) => {
                        commands.push((robot, command));
                        break;
                    }
                    Err(e) => warn!("Robot {} sent {}; asking again", robot, e),
                }
            }
        }

        Ok(commands)
    }

    /// Updates go to every player alive when the turn began, so each
    /// eliminated player still sees its own Kill
    async fn broadcast_updates(
        &mut self,
        recipients: &[RobotId],
        updates: &[Update],
    ) -> Result<(), ServerError> {
        let line = encode_bundle(updates);

        for &robot in recipients {
            let connection = self
                .clients
                .player_mut(robot)
                .ok_or(ServerError::MissingPlayer(robot))?;
            connection
                .send_line(&line)
                .await
                .map_err(|source| ServerError::PlayerIo { robot, source })?;
        }

        self.clients.broadcast_to_debuggers(&[line]).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::board::{parse_board, parse_items};
    use shared::protocol::{decode_packages, decode_updates};
    use tokio::io::{duplex, DuplexStream};

    fn server_with_player(
        board: &str,
        items: &str,
    ) -> (Server<DuplexStream>, Connection<DuplexStream>) {
        let mut grid = parse_board(board).unwrap();
        let robots = parse_items(items, &mut grid).unwrap();
        let game = GameState::new(grid, robots);

        let (server_side, client_side) = duplex(4096);
        let mut clients = ClientManager::new();
        clients.add_player(1, Connection::new(server_side));
        (Server::new(game, clients), Connection::new(client_side))
    }

    #[tokio::test]
    async fn test_single_player_game() {
        let (mut server, mut player) =
            server_with_player(".~\n", "robot 1 5 10 @ (0,0)\npackage 3 2 (0,0) @ (0,0)\n");

        let game = tokio::spawn(async move {
            let rankings = server.run().await.unwrap();
            (rankings, server)
        });

        assert_eq!(player.recv_line().await.unwrap(), "2 1");
        assert_eq!(player.recv_line().await.unwrap(), ".~");
        assert_eq!(player.recv_line().await.unwrap(), "1 5 10");
        assert_eq!(player.recv_line().await.unwrap(), "[#1,r 0 c 0]");

        // Turn 1: a malformed command is asked for again.
        let packages = decode_packages(&player.recv_line().await.unwrap()).unwrap();
        assert_eq!(packages.len(), 1);
        player.send_line("1 fly away").await.unwrap();
        player.send_line("1 pick 3").await.unwrap();
        assert_eq!(player.recv_line().await.unwrap(), "[#1,p 3]");

        // Turn 2: deliver on the spot.
        assert_eq!(player.recv_line().await.unwrap(), "[]");
        player.send_line("1 drop 3").await.unwrap();
        assert_eq!(player.recv_line().await.unwrap(), "[#1,d 3]");

        // Turn 3: walk into the water.
        player.recv_line().await.unwrap();
        player.send_line("1 move e").await.unwrap();
        let updates = decode_updates(&player.recv_line().await.unwrap()).unwrap();
        assert_eq!(updates.last(), Some(&Update::Kill { robot: 1 }));

        let (rankings, server) = game.await.unwrap();
        assert_eq!(rankings, vec![Ranking { robot: 1, score: 2 }]);
        assert_eq!(server.game().turn, 3);
    }

    #[tokio::test]
    async fn test_player_disconnect_is_fatal() {
        let (mut server, mut player) = server_with_player("..\n", "robot 1 5 10 @ (0,0)\n");

        let game = tokio::spawn(async move { server.run().await });
        for _ in 0..5 {
            player.recv_line().await.unwrap();
        }
        drop(player);

        let result = game.await.unwrap();
        assert!(matches!(
            result,
            Err(ServerError::PlayerIo { robot: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_debugger_sees_everything_and_paces_turns() {
        let (mut server, mut player) = server_with_player("..\n", "robot 1 5 1 @ (0,0)\n");
        let (server_side, debugger_side) = duplex(4096);
        server.clients.add_debugger(Connection::new(server_side));
        let mut debugger = Connection::new(debugger_side);

        let game = tokio::spawn(async move { server.run().await.unwrap() });

        assert_eq!(debugger.recv_line().await.unwrap(), "2 1");
        assert_eq!(debugger.recv_line().await.unwrap(), "..");
        assert_eq!(debugger.recv_line().await.unwrap(), "[1 5 1]");
        assert_eq!(debugger.recv_line().await.unwrap(), "[#1,r 0 c 0]");
        for _ in 0..4 {
            player.recv_line().await.unwrap();
        }

        debugger.send_line("step").await.unwrap();
        player.recv_line().await.unwrap();
        player.send_line("2 move e").await.unwrap();
        assert_eq!(player.recv_line().await.unwrap(), "[#1,k]");
        assert_eq!(debugger.recv_line().await.unwrap(), "[#1,k]");

        let rankings = game.await.unwrap();
        assert_eq!(rankings.len(), 1);
    }

    #[tokio::test]
    async fn test_package_lists_go_out_before_commands() {
        let mut grid = parse_board("..\n").unwrap();
        let robots = parse_items(
            "robot 1 5 1 @ (0,0)\nrobot 2 5 1 @ (0,1)\npackage 9 1 (0,0) @ (0,1)\n",
            &mut grid,
        )
        .unwrap();
        let game = GameState::new(grid, robots);

        let mut clients = ClientManager::new();
        let mut players = Vec::new();
        for robot in [1, 2] {
            let (server_side, client_side) = duplex(4096);
            clients.add_player(robot, Connection::new(server_side));
            players.push(Connection::new(client_side));
        }
        let mut server = Server::new(game, clients);
        let game = tokio::spawn(async move { server.run().await.unwrap() });

        for player in players.iter_mut() {
            for _ in 0..4 {
                player.recv_line().await.unwrap();
            }
        }

        // Robot 2 sees its cell while robot 1 has not answered yet.
        assert_eq!(players[1].recv_line().await.unwrap(), "[9,0,0,1]");
        assert_eq!(players[0].recv_line().await.unwrap(), "[]");

        players[1].send_line("1 pick 9").await.unwrap();
        players[0].send_line("2 move e").await.unwrap();
        for player in players.iter_mut() {
            assert_eq!(player.recv_line().await.unwrap(), "[#1,k;#2,p 9]");
        }

        players[1].recv_line().await.unwrap();
        players[1].send_line("2 drop 9").await.unwrap();
        assert_eq!(players[1].recv_line().await.unwrap(), "[#2,k]");

        let rankings = game.await.unwrap();
        assert_eq!(rankings.len(), 2);
    }

    #[test]
    fn test_rankings_saved_as_json() {
        let path = std::env::temp_dir().join(format!("rankings-{}.json", std::process::id()));
        let rankings = vec![
            Ranking { robot: 3, score: 9 },
            Ranking { robot: 1, score: 0 },
        ];
        save_rankings(&path, &rankings).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["robot"], 3);
        assert_eq!(value[0]["score"], 9);
        let read_back: Vec<Ranking> = serde_json::from_str(&text).unwrap();
        assert_eq!(read_back, rankings);
        std::fs::remove_file(&path).unwrap();
    }
}
