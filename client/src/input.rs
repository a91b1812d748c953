//! Keyboard to heading mapping

use macroquad::prelude::*;
use snake_shared::Direction;

/// Keys polled each frame, in priority order
const BINDINGS: [(KeyCode, Direction); 8] = [
    (KeyCode::W, Direction::Up),
    (KeyCode::Up, Direction::Up),
    (KeyCode::S, Direction::Down),
    (KeyCode::Down, Direction::Down),
    (KeyCode::A, Direction::Left),
    (KeyCode::Left, Direction::Left),
    (KeyCode::D, Direction::Right),
    (KeyCode::Right, Direction::Right),
];

pub fn direction_for_key(key: KeyCode) -> Option<Direction> {
    BINDINGS
        .iter()
        .find(|(bound, _)| *bound == key)
        .map(|(_, direction)| *direction)
}

/// Turns key presses into at most one heading request per frame
///
/// Every fresh press is forwarded, repeats included. The server keeps the
/// latest valid request per tick, so a press the client dropped could be the
/// one that turns the snake.
#[derive(Debug, Default)]
pub struct InputManager;

impl InputManager {
    pub fn new() -> Self {
        Self
    }

    /// Samples the keyboard
    pub fn update(&self) -> Option<Direction> {
        self.poll(is_key_pressed)
    }

    fn poll(&self, is_pressed: impl Fn(KeyCode) -> bool) -> Option<Direction> {
        BINDINGS
            .iter()
            .find(|(key, _)| is_pressed(*key))
            .map(|(_, direction)| *direction)
    }
}
