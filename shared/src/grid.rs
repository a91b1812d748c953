//! Grid geometry shared by the server simulation and the client renderer
//!
//! The board is a fixed `width` x `height` rectangle addressed by `(row, col)`.
//! There is no wrap-around: stepping off an edge yields no neighbor, which the
//! simulation treats as a fatal wall collision. Obstacle cells behave the same
//! way as the edge.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A single board coordinate
///
/// Serialized as a `[row, col]` pair to keep state frames compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

impl From<(i32, i32)> for Cell {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

impl From<Cell> for (i32, i32) {
    fn from(cell: Cell) -> Self {
        (cell.row, cell.col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Heading of a snake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// The exact reverse heading
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Row and column delta of a single step
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

/// Board dimensions plus static obstacles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    obstacles: HashSet<Cell>,
}

impl Grid {
    pub fn new(width: i32, height: i32, obstacles: impl IntoIterator<Item = Cell>) -> Self {
        Self {
            width,
            height,
            obstacles: obstacles.into_iter().collect(),
        }
    }

    /// Total number of cells on the board, obstacles included
    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        (0..self.height).contains(&cell.row) && (0..self.width).contains(&cell.col)
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.obstacles.contains(&cell)
    }

    /// The cell one step away, or `None` when the step leaves the board
    pub fn neighbor(&self, cell: Cell, direction: Direction) -> Option<Cell> {
        let (dr, dc) = direction.delta();
        let next = Cell::new(cell.row.checked_add(dr)?, cell.col.checked_add(dc)?);
        self.in_bounds(next).then_some(next)
    }

    /// Body of a fresh snake: `head` first, then up to `length - 1` cells
    /// straight behind it
    ///
    /// Stops early at the edge or an obstacle, so the head is always there.
    pub fn trail(&self, head: Cell, heading: Direction, length: usize) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(length.min(self.area()).max(1));
        cells.push(head);

        let mut tail = head;
        while cells.len() < length {
            match self.neighbor(tail, heading.opposite()) {
                Some(next) if !self.is_blocked(next) => {
                    cells.push(next);
                    tail = next;
                }
                _ => break,
            }
        }
        cells
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height).flat_map(move |row| (0..self.width).map(move |col| Cell::new(row, col)))
    }
}

/// Whether two cells share an edge
pub fn are_adjacent(a: Cell, b: Cell) -> bool {
    (a.row - b.row).abs() + (a.col - b.col).abs() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_bounds() {
        let grid = Grid::new(10, 5, []);
        assert!(grid.in_bounds(Cell::new(0, 0)));
        assert!(grid.in_bounds(Cell::new(4, 9)));
        assert!(!grid.in_bounds(Cell::new(5, 0)));
        assert!(!grid.in_bounds(Cell::new(0, 10)));
        assert!(!grid.in_bounds(Cell::new(-1, 3)));
    }

    #[test]
    fn test_neighbor_inside() {
        let grid = Grid::new(10, 10, []);
        let cell = Cell::new(3, 3);
        assert_eq!(grid.neighbor(cell, Direction::Up), Some(Cell::new(2, 3)));
        assert_eq!(grid.neighbor(cell, Direction::Down), Some(Cell::new(4, 3)));
        assert_eq!(grid.neighbor(cell, Direction::Left), Some(Cell::new(3, 2)));
        assert_eq!(grid.neighbor(cell, Direction::Right), Some(Cell::new(3, 4)));
    }

    #[test]
    fn test_neighbor_rejects_edges() {
        let grid = Grid::new(10, 10, []);
        assert_eq!(grid.neighbor(Cell::new(0, 4), Direction::Up), None);
        assert_eq!(grid.neighbor(Cell::new(9, 4), Direction::Down), None);
        assert_eq!(grid.neighbor(Cell::new(4, 0), Direction::Left), None);
        assert_eq!(grid.neighbor(Cell::new(4, 9), Direction::Right), None);
    }

    #[test]
    fn test_opposite_is_involution() {
        for direction in Direction::ALL {
            assert_ne!(direction, direction.opposite());
            assert_eq!(direction, direction.opposite().opposite());
        }
    }

    #[test]
    fn test_obstacles() {
        let grid = Grid::new(4, 4, [Cell::new(1, 1)]);
        assert!(grid.is_blocked(Cell::new(1, 1)));
        assert!(!grid.is_blocked(Cell::new(1, 2)));
    }

    #[test]
    fn test_trail_stops_at_edge_and_obstacles() {
        let grid = Grid::new(10, 10, [Cell::new(5, 2)]);
        assert_eq!(
            grid.trail(Cell::new(5, 5), Direction::Right, 3),
            vec![Cell::new(5, 5), Cell::new(5, 4), Cell::new(5, 3)]
        );
        assert_eq!(grid.trail(Cell::new(5, 5), Direction::Right, 9).len(), 3);
        assert_eq!(grid.trail(Cell::new(1, 7), Direction::Down, 9).len(), 2);
        assert_eq!(grid.trail(Cell::new(4, 4), Direction::Up, 1), vec![Cell::new(4, 4)]);
    }

    #[test]
    fn test_trail_with_huge_length() {
        let grid = Grid::new(4, 4, []);
        let cells = grid.trail(Cell::new(0, 0), Direction::Up, usize::MAX);
        assert_eq!(cells, vec![Cell::new(0, 0), Cell::new(1, 0), Cell::new(2, 0), Cell::new(3, 0)]);
    }

    #[test]
    fn test_cells_row_major() {
        let grid = Grid::new(3, 2, []);
        let cells: Vec<Cell> = grid.cells().collect();
        assert_eq!(cells.len(), grid.area());
        assert_eq!(cells[0], Cell::new(0, 0));
        assert_eq!(cells[1], Cell::new(0, 1));
        assert_eq!(cells[3], Cell::new(1, 0));
    }

    #[test]
    fn test_adjacency() {
        assert!(are_adjacent(Cell::new(2, 2), Cell::new(2, 3)));
        assert!(!are_adjacent(Cell::new(2, 2), Cell::new(3, 3)));
        assert!(!are_adjacent(Cell::new(2, 2), Cell::new(2, 2)));
    }

    #[test]
    fn test_cell_serializes_as_pair() {
        let json = serde_json::to_string(&Cell::new(4, 7)).unwrap();
        assert_eq!(json, "[4,7]");
        let cell: Cell = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(cell, Cell::new(1, 2));
    }

    #[test]
    fn test_direction_wire_names() {
        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), "\"left\"");
        let dir: Direction = serde_json::from_str("\"up\"").unwrap();
        assert_eq!(dir, Direction::Up);
        assert!(serde_json::from_str::<Direction>("\"sideways\"").is_err());
    }
}
