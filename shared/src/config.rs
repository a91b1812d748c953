//! Game configuration loaded once at startup
//!
//! The server reads a JSON file (every field optional), applies command-line
//! overrides, validates the result and then treats it as immutable. The same
//! value is sent to every client in the welcome frame so renderers agree on
//! board size and colors.

use crate::grid::{Cell, Direction, Grid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub type Color = [u8; 3];

pub const DEFAULT_PORT: u16 = 12345;

const PALETTE: [Color; 8] = [
    [30, 90, 220],
    [220, 40, 40],
    [40, 170, 60],
    [140, 60, 200],
    [240, 140, 20],
    [20, 190, 200],
    [210, 40, 180],
    [210, 200, 30],
];

/// Color for a player without an explicit one
pub fn default_color(player_id: u32) -> Color {
    PALETTE[player_id as usize % PALETTE.len()]
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Starting position of one snake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub row: i32,
    pub col: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// Fully resolved spawn for a player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawn {
    pub head: Cell,
    pub heading: Direction,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Players required before the round starts
    pub players: u32,
    pub width: i32,
    pub height: i32,
    pub tick_ms: u64,
    pub default_heading: Direction,
    pub initial_length: usize,
    /// Explicit spawns by player id; missing slots get a computed layout
    pub snakes: Vec<SpawnConfig>,
    pub block_cells: Vec<Cell>,
    /// Initial food cell, random when absent
    pub food: Option<Cell>,
    /// Seed for food placement, entropy when absent
    pub seed: Option<u64>,
    pub back_color: Color,
    pub fruit_color: Color,
    pub block_color: Color,
    pub cell_size: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players: 2,
            width: 20,
            height: 20,
            tick_ms: 100,
            default_heading: Direction::Right,
            initial_length: 1,
            snakes: Vec::new(),
            block_cells: Vec::new(),
            food: None,
            seed: None,
            back_color: [255, 255, 255],
            fruit_color: [255, 0, 0],
            block_color: [139, 69, 19],
            cell_size: 30,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.width, self.height, self.block_cells.iter().copied())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Resolves the spawn of a player slot
    ///
    /// Configured spawns win. Otherwise snakes are laid out in parallel lanes
    /// across the board, all facing the default heading.
    pub fn spawn_for(&self, player_id: u32) -> Spawn {
        let heading_default = self.default_heading;
        let color_default = default_color(player_id);

        if let Some(spawn) = self.snakes.get(player_id as usize) {
            return Spawn {
                head: Cell::new(spawn.row, spawn.col),
                heading: spawn.heading.unwrap_or(heading_default),
                color: spawn.color.unwrap_or(color_default),
            };
        }

        let lanes = self.players as i64 + 1;
        let lane = player_id as i64 + 1;
        let head = match heading_default {
            Direction::Left | Direction::Right => Cell::new(
                (lane * self.height as i64 / lanes) as i32,
                self.width / 2,
            ),
            Direction::Up | Direction::Down => Cell::new(
                self.height / 2,
                (lane * self.width as i64 / lanes) as i32,
            ),
        };

        Spawn {
            head,
            heading: heading_default,
            color: color_default,
        }
    }

    /// Checks that the board can host the configured round
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.players == 0 {
            return Err(ConfigError::Invalid("at least one player is required".into()));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick period must be positive".into()));
        }
        if self.initial_length == 0 {
            return Err(ConfigError::Invalid("initial length must be at least 1".into()));
        }
        if self.cell_size == 0 {
            return Err(ConfigError::Invalid("cell size must be positive".into()));
        }

        let grid = self.grid();
        if self.initial_length > grid.area() {
            return Err(ConfigError::Invalid(format!(
                "initial length {} does not fit a {}x{} grid",
                self.initial_length, self.width, self.height
            )));
        }
        for block in &self.block_cells {
            if !grid.in_bounds(*block) {
                return Err(ConfigError::Invalid(format!("block cell {} is off the grid", block)));
            }
        }

        // Every cell a snake holds at spawn, with its owner
        let mut bodies: HashMap<Cell, u32> = HashMap::new();
        for player_id in 0..self.players {
            let spawn = self.spawn_for(player_id);
            if !grid.in_bounds(spawn.head) {
                return Err(ConfigError::Invalid(format!(
                    "spawn {} of player {} is off the grid",
                    spawn.head, player_id
                )));
            }
            if grid.is_blocked(spawn.head) {
                return Err(ConfigError::Invalid(format!(
                    "spawn {} of player {} is on a block",
                    spawn.head, player_id
                )));
            }

            for cell in grid.trail(spawn.head, spawn.heading, self.initial_length) {
                if let Some(other) = bodies.insert(cell, player_id) {
                    return Err(ConfigError::Invalid(format!(
                        "player {} overlaps player {} at {}",
                        player_id, other, cell
                    )));
                }
            }
        }

        if let Some(food) = self.food {
            if !grid.in_bounds(food) || grid.is_blocked(food) || bodies.contains_key(&food) {
                return Err(ConfigError::Invalid(format!("food cell {} is not free", food)));
            }
        }

        Ok(())
    }
}
