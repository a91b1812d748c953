use clap::Parser;
use log::{error, info};
use snake_server::network::Server;
use snake_shared::config::DEFAULT_PORT;
use snake_shared::GameConfig;
use std::path::PathBuf;

/// Command line arguments; explicit values override the config file
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// JSON game config
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Players required to start the round
    #[clap(long)]
    players: Option<u32>,
    /// Grid width in cells
    #[clap(long)]
    width: Option<i32>,
    /// Grid height in cells
    #[clap(long)]
    height: Option<i32>,
    /// Milliseconds between ticks
    #[clap(short, long)]
    tick_ms: Option<u64>,
    /// Seed for food placement
    #[clap(long)]
    seed: Option<u64>,
}

impl Args {
    fn game_config(&self) -> Result<GameConfig, snake_shared::ConfigError> {
        let mut config = match &self.config {
            Some(path) => GameConfig::from_file(path)?,
            None => GameConfig::default(),
        };

        if let Some(players) = self.players {
            config.players = players;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

/// Parses arguments, runs one round and exits when it ends or on Ctrl+C
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = args.game_config()?;

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config).await?;

    tokio::select! {
        result = server.run() => {
            match result {
                Ok(summary) => match summary.winner {
                    Some(player_id) => info!("Player {} won after {} ticks", player_id, summary.ticks),
                    None => info!("Draw after {} ticks", summary.ticks),
                },
                Err(e) => {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::parse_from(["snake-server", "--players", "3", "--width", "30", "--seed", "9"]);
        let config = args.game_config().unwrap();

        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(config.players, 3);
        assert_eq!(config.width, 30);
        assert_eq!(config.height, GameConfig::default().height);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = Args::parse_from(["snake-server", "--config", "/nonexistent/snake.json"]);
        assert!(args.game_config().is_err());
    }
}
