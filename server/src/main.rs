use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use shared::{GridBounds, FLIGHT_LATENCY_MS, GRID_HEIGHT, GRID_WIDTH, MAX_PLAYERS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of concurrent players, at most the shared snapshot limit
    #[arg(short, long, default_value_t = MAX_PLAYERS)]
    max_clients: usize,

    /// Grid width in tiles
    #[arg(long, default_value_t = GRID_WIDTH)]
    grid_width: i32,

    /// Grid height in tiles
    #[arg(long, default_value_t = GRID_HEIGHT)]
    grid_height: i32,

    /// Projectile flight time in milliseconds
    #[arg(long, default_value_t = FLIGHT_LATENCY_MS)]
    flight_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_clients: args.max_clients,
        grid: GridBounds::new(args.grid_width, args.grid_height),
        flight_ms: args.flight_ms,
        client_timeout: Duration::from_secs(5),
    };
    config.validate()?;

    info!(
        "Starting server on {} with a {}x{} grid",
        config.bind_addr, config.grid.width, config.grid.height
    );

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
