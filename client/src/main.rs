use clap::Parser;
use client::network::{play, Settings};
use log::{error, info};
use shared::{Connection, DEFAULT_HOST, DEFAULT_PORT};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Money wagered on every command
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
    bid: i64,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!("Connecting to: {}", address);
    let stream = match TcpStream::connect(&address).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Could not connect to {}: {}", address, e);
            std::process::exit(1);
        }
    };

    let mut connection = Connection::new(stream);
    match play(&mut connection, Settings { bid: args.bid }).await {
        Ok(summary) if args.json => {
            println!("{}", serde_json::to_string(&summary)?);
            Ok(())
        }
        Ok(summary) => {
            println!(
                "robot {}: {} turns, delivered weight {}, money left {}",
                summary.robot, summary.turns, summary.delivered_weight, summary.money
            );
            Ok(())
        }
        Err(e) => {
            error!("Game aborted: {}", e);
            std::process::exit(1);
        }
    }
}
