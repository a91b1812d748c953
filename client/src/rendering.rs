//! Board drawing with macroquad
//!
//! Everything drawn comes from the welcome config and the latest snapshot.
//! The renderer keeps no state between frames.

use macroquad::prelude::*;
use snake_shared::config::Color as Rgb;
use snake_shared::{Cell, GameConfig, RoundStatus, Snapshot};

/// Height of the status line under the board
pub const HUD_HEIGHT: f32 = 24.0;

const DEAD_SNAKE: Rgb = [150, 150, 150];

/// Draws one client's view of the board
///
/// The local player's head gets a darker outline than everyone else's.
pub struct Renderer {
    config: GameConfig,
    player_id: u32,
    cell_size: f32,
}

impl Renderer {
    /// Creates a renderer for `player_id` using the welcome config
    pub fn new(config: GameConfig, player_id: u32) -> Self {
        let cell_size = config.cell_size as f32;
        Renderer {
            config,
            player_id,
            cell_size,
        }
    }

    /// Window size that fits the board and the status line
    pub fn window_size(&self) -> (f32, f32) {
        (
            self.config.width as f32 * self.cell_size,
            self.config.height as f32 * self.cell_size + HUD_HEIGHT,
        )
    }

    /// Screen rectangle of a cell as `(x, y, w, h)`
    pub fn cell_rect(&self, cell: Cell) -> (f32, f32, f32, f32) {
        (
            cell.col as f32 * self.cell_size,
            cell.row as f32 * self.cell_size,
            self.cell_size,
            self.cell_size,
        )
    }

    /// Draws a full frame
    ///
    /// Blocks come from the config, so they show up before the first
    /// snapshot arrives. Dead snakes are grayed out.
    pub fn render(&self, snapshot: Option<&Snapshot>, connected: bool) {
        clear_background(to_color(self.config.back_color));

        for block in &self.config.block_cells {
            self.fill_cell(*block, to_color(self.config.block_color));
        }

        if let Some(snapshot) = snapshot {
            if let Some(food) = snapshot.food {
                self.fill_cell(food, to_color(self.config.fruit_color));
            }

            for snake in &snapshot.snakes {
                let rgb = if snake.alive {
                    self.config.spawn_for(snake.player_id).color
                } else {
                    DEAD_SNAKE
                };
                for cell in &snake.cells {
                    self.fill_cell(*cell, to_color(rgb));
                }
                if let Some(head) = snake.cells.first() {
                    let (x, y, w, h) = self.cell_rect(*head);
                    let outline = if snake.player_id == self.player_id { BLACK } else { DARKGRAY };
                    draw_rectangle_lines(x, y, w, h, 2.0, outline);
                }
            }
        }

        let (_, board_height) = self.window_size();
        let text = status_text(snapshot, self.player_id, self.config.players, connected);
        draw_text(&text, 6.0, board_height - 6.0, 20.0, BLACK);
    }

    fn fill_cell(&self, cell: Cell, color: Color) {
        let (x, y, w, h) = self.cell_rect(cell);
        draw_rectangle(x, y, w, h, color);
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::from_rgba(rgb[0], rgb[1], rgb[2], 255)
}

/// Status line for the current snapshot
pub fn status_text(
    snapshot: Option<&Snapshot>,
    player_id: u32,
    required: u32,
    connected: bool,
) -> String {
    let Some(snapshot) = snapshot else {
        return "Waiting for the server".to_string();
    };

    let mut text = match snapshot.status {
        RoundStatus::WaitingForPlayers => format!(
            "Waiting for players ({}/{})",
            snapshot.snakes.len(),
            required
        ),
        RoundStatus::Running => {
            let state = match snapshot.snake(player_id) {
                Some(snake) if snake.alive => "alive",
                _ => "dead",
            };
            format!(
                "Tick {} | player {} | {} | {} left",
                snapshot.tick,
                player_id,
                state,
                snapshot.alive_count()
            )
        }
        RoundStatus::Ended { winner: Some(winner) } if winner == player_id => {
            format!("You win after {} ticks", snapshot.tick)
        }
        RoundStatus::Ended { winner: Some(winner) } => {
            format!("Player {} wins after {} ticks", winner, snapshot.tick)
        }
        RoundStatus::Ended { winner: None } => format!("Draw after {} ticks", snapshot.tick),
    };

    if !connected && !snapshot.status.is_ended() {
        text.push_str(" (disconnected)");
    }
    text
}
