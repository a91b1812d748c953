//! A single snake: ordered body cells, heading and liveness

use crate::error::ValidationError;
use snake_shared::{Cell, Direction, Grid, SnakeState};
use std::collections::{HashSet, VecDeque};

/// Result of moving a snake by one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    AteFood,
    HitWall,
    HitSelf,
    HitOther,
}

impl MoveOutcome {
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            MoveOutcome::HitWall | MoveOutcome::HitSelf | MoveOutcome::HitOther
        )
    }
}

/// One player's snake
///
/// Cells are unique and edge-adjacent while alive. A dead snake keeps its
/// last body so snapshots can still draw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    pub player_id: u32,
    /// Head at the front
    cells: VecDeque<Cell>,
    /// Direction of the last move, used for the reversal check
    heading: Direction,
    /// Direction the next move will take
    pending: Direction,
    alive: bool,
}

impl Snake {
    /// Creates a snake whose body trails behind `head`
    ///
    /// The body is cut short where it would leave the grid or cross an
    /// obstacle, so the result always has at least the head.
    pub fn new(player_id: u32, head: Cell, heading: Direction, length: usize, grid: &Grid) -> Self {
        Self {
            player_id,
            cells: grid.trail(head, heading, length).into(),
            heading,
            pending: heading,
            alive: true,
        }
    }

    pub fn head(&self) -> Cell {
        self.cells[0]
    }

    /// Number of body cells, head included
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Body cells from head to tail
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Stages a heading for the next move
    ///
    /// A direction that exactly reverses the last move is rejected and leaves
    /// the pending heading untouched.
    pub fn set_heading(&mut self, direction: Direction) -> Result<(), ValidationError> {
        if !self.alive {
            return Err(ValidationError::PlayerDead(self.player_id));
        }
        if direction == self.heading.opposite() {
            return Err(ValidationError::ReverseHeading {
                current: self.heading,
                requested: direction,
            });
        }
        self.pending = direction;
        Ok(())
    }

    /// Where the head goes on the next move, `None` when that leaves the grid
    pub fn next_head(&self, grid: &Grid) -> Option<Cell> {
        grid.neighbor(self.head(), self.pending)
    }

    /// Moves one cell along the pending heading
    ///
    /// `occupied` holds every cell owned by other snakes that a head may not
    /// enter this step. On a fatal outcome the snake dies in place.
    pub fn advance(
        &mut self,
        grid: &Grid,
        food: Option<Cell>,
        occupied: &HashSet<Cell>,
    ) -> Result<MoveOutcome, ValidationError> {
        if !self.alive {
            return Err(ValidationError::PlayerDead(self.player_id));
        }
        self.heading = self.pending;

        let outcome = match self.next_head(grid) {
            None => MoveOutcome::HitWall,
            Some(next) if grid.is_blocked(next) => MoveOutcome::HitWall,
            Some(next) => {
                let eating = food == Some(next);
                // The tail vacates its cell unless the snake grows
                let hits_self = self
                    .cells
                    .iter()
                    .take(if eating { self.len() } else { self.len() - 1 })
                    .any(|c| *c == next);

                if hits_self {
                    MoveOutcome::HitSelf
                } else if occupied.contains(&next) {
                    MoveOutcome::HitOther
                } else {
                    self.cells.push_front(next);
                    if eating {
                        MoveOutcome::AteFood
                    } else {
                        self.cells.pop_back();
                        MoveOutcome::Moved
                    }
                }
            }
        };

        if outcome.is_fatal() {
            self.alive = false;
        }
        Ok(outcome)
    }

    /// Marks the snake dead without moving it
    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn to_state(&self) -> SnakeState {
        SnakeState {
            player_id: self.player_id,
            cells: self.cells.iter().copied().collect(),
            alive: self.alive,
        }
    }
}
