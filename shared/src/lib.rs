//! Types shared by the robots server and its clients: the world model, the
//! line protocol spoken between them and the board file loader.


pub mod board;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod world;

pub use board::BoardConfig;
pub use connection::Connection;
pub use error::{BoardError, ProtocolError};
pub use protocol::{Action, Command, PlayerConfig, Role, Update};
pub use world::{Grid, Package, PackageId, Robot, RobotId, Terrain};

pub const DEFAULT_PORT: u16 = 7919;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// One of the four compass directions a robot can move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn symbol(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::South => 's',
            Direction::East => 'e',
            Direction::West => 'w',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'n' => Some(Direction::North),
            's' => Some(Direction::South),
            'e' => Some(Direction::East),
            'w' => Some(Direction::West),
            _ => None,
        }
    }
}

/// A (row, column) cell coordinate. Row 0 is the top of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The adjacent position one step in `direction`. May lie off the board.
    pub fn step(self, direction: Direction) -> Self {
        match direction {
            Direction::North => Self::new(self.row - 1, self.col),
            Direction::South => Self::new(self.row + 1, self.col),
            Direction::East => Self::new(self.row, self.col + 1),
            Direction::West => Self::new(self.row, self.col - 1),
        }
    }

    pub fn manhattan(self, other: Position) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_step() {
        let origin = Position::new(2, 2);
        assert_eq!(origin.step(Direction::North), Position::new(1, 2));
        assert_eq!(origin.step(Direction::South), Position::new(3, 2));
        assert_eq!(origin.step(Direction::East), Position::new(2, 3));
        assert_eq!(origin.step(Direction::West), Position::new(2, 1));
    }

    #[test]
    fn test_position_step_can_leave_board() {
        let corner = Position::new(0, 0);
        assert_eq!(corner.step(Direction::North), Position::new(-1, 0));
        assert_eq!(corner.step(Direction::West), Position::new(0, -1));
    }

    #[test]
    fn test_direction_symbols() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_symbol(direction.symbol()), Some(direction));
        }
        assert_eq!(Direction::from_symbol('x'), None);
    }

    #[test]
    fn test_manhattan_distance() {
        let a = Position::new(1, 5);
        let b = Position::new(4, 2);
        assert_eq!(a.manhattan(b), 6);
        assert_eq!(b.manhattan(a), 6);
        assert_eq!(a.manhattan(a), 0);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(3, 7).to_string(), "(3,7)");
    }
}
