use clap::Parser;
use log::{error, info};
use server::game::{GameState, Ranking};
use server::network::{accept_clients, save_rankings, Server};
use shared::{DEFAULT_HOST, DEFAULT_PORT};
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Board file; robots and packages are read from `<board>.items`
    #[arg(long)]
    board: PathBuf,

    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Also write the final rankings to this file as JSON
    #[arg(long)]
    results: Option<PathBuf>,
}

/// Loads the board, waits for one player per robot, then plays the game.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let board = match shared::board::load(&args.board) {
        Ok(board) => board,
        Err(e) => {
            error!("Cannot load board {}: {}", args.board.display(), e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded {}x{} board with {} robots",
        board.grid.width(),
        board.grid.height(),
        board.robots.len()
    );

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server listening on {}", address);

    let robots: Vec<_> = board.robots.iter().map(|r| r.id).collect();
    let game = GameState::from_board(board);

    let session = async {
        let clients = accept_clients(&listener, &robots).await?;
        let mut server = Server::new(game, clients);
        server.run().await
    };

    tokio::select! {
        result = session => match result {
            Ok(rankings) => {
                print_rankings(&rankings);
                if let Some(path) = &args.results {
                    if let Err(e) = save_rankings(path, &rankings) {
                        error!("Cannot write {}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                }
            }
            Err(e) => {
                error!("Game aborted: {}", e);
                std::process::exit(1);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

fn print_rankings(rankings: &[Ranking]) {
    println!("{:>5} {:>8} {:>8}", "rank", "robot", "score");
    for (place, ranking) in rankings.iter().enumerate() {
        println!("{:>5} {:>8} {:>8}", place + 1, ranking.robot, ranking.score);
    }
}
