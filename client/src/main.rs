use clap::Parser;
use log::{error, info, warn};
use macroquad::prelude::*;
use snake_client::input::InputManager;
use snake_client::network::GameClient;
use snake_client::rendering::Renderer;
use snake_shared::config::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Snake".to_owned(),
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // Networking runs on its own runtime; macroquad owns the main thread
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return;
        }
    };

    let client = match runtime.block_on(GameClient::connect(&args.server)) {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    info!("Controls: WASD or arrow keys to steer, Escape to quit");

    let renderer = Renderer::new(client.config().clone(), client.player_id());
    let (width, height) = renderer.window_size();
    request_new_screen_size(width, height);

    let input = InputManager::new();

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        if let Some(direction) = input.update() {
            if let Err(e) = client.send_direction(direction) {
                warn!("Could not send {}: {}", direction, e);
            }
        }

        let snapshot = client.latest_snapshot();
        renderer.render(snapshot.as_deref(), client.is_connected());

        next_frame().await;
    }

    drop(client);
    runtime.shutdown_background();
}
