//! Board and items file loading.
//!
//! A board is a text file with one row of terrain symbols per line. Its
//! inhabitants live in a companion file with the same name plus `.items`:
//!
//! ```text
//! # comment
//! robot <id> <strength> <money> @ (<row>,<col>)
//! package <id> <weight> (<destRow>,<destCol>) @ (<row>,<col>)
//! ```

use crate::error::BoardError;
use crate::protocol::{parse_coordinate, parse_unsigned};
use crate::world::{Grid, Package, Robot, Terrain};
use crate::Position;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Everything needed to start a game.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub grid: Grid,
    /// Robots in items file order.
    pub robots: Vec<Robot>,
}

/// Loads `path` and `path.items`.
pub fn load(path: &Path) -> Result<BoardConfig, BoardError> {
    let board_text = read(path)?;
    let items_path = items_path(path);
    let items_text = read(&items_path)?;

    let mut grid = parse_board(&board_text)?;
    let robots = parse_items(&items_text, &mut grid)?;

    Ok(BoardConfig { grid, robots })
}

pub fn items_path(board: &Path) -> PathBuf {
    let mut name = board.as_os_str().to_owned();
    name.push(".items");
    PathBuf::from(name)
}

fn read(path: &Path) -> Result<String, BoardError> {
    std::fs::read_to_string(path).map_err(|source| BoardError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses the terrain rows of a board. Trailing blank lines are ignored.
pub fn parse_board(text: &str) -> Result<Grid, BoardError> {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let expected = match lines.first() {
        Some(first) if !first.is_empty() => first.chars().count(),
        _ => return Err(BoardError::Empty),
    };

    let mut rows = Vec::with_capacity(lines.len());
    for (row, line) in lines.iter().enumerate() {
        let cells = line
            .chars()
            .enumerate()
            .map(|(col, symbol)| {
                Terrain::from_symbol(symbol).ok_or(BoardError::InvalidCell { row, col, symbol })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if cells.len() != expected {
            return Err(BoardError::RaggedRow {
                row,
                expected,
                found: cells.len(),
            });
        }
        rows.push(cells);
    }

    Ok(Grid::from_terrain(rows))
}

/// Parses an items file, placing robots and packages on `grid`.
pub fn parse_items(text: &str, grid: &mut Grid) -> Result<Vec<Robot>, BoardError> {
    let mut robots: Vec<Robot> = Vec::new();
    let mut package_ids = HashSet::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = raw.trim_end().split(' ').collect();
        match tokens.as_slice() {
            ["robot", id, strength, money, "@", at, ..] => {
                let (id, strength, money, position) = (|| {
                    Some((
                        parse_unsigned(id)?,
                        parse_unsigned(strength)?,
                        parse_unsigned(money)?,
                        parse_pair(at)?,
                    ))
                })()
                .ok_or(BoardError::Syntax { line })?;

                if !grid.is_holder(position) {
                    return Err(BoardError::InvalidPosition {
                        line,
                        what: "robot",
                    });
                }
                if robots.iter().any(|r| r.id == id) {
                    return Err(BoardError::DuplicateId {
                        line,
                        what: "robot",
                        id,
                    });
                }
                if let Some(occupant) = grid.occupant(position) {
                    return Err(BoardError::Occupied { line, occupant });
                }

                grid.set_occupant(position, Some(id));
                robots.push(Robot::new(id, strength, i64::from(money), position));
            }
            ["package", id, weight, destination, "@", at, ..] => {
                let (id, weight, destination, position) = (|| {
                    Some((
                        parse_unsigned(id)?,
                        parse_unsigned(weight)?,
                        parse_pair(destination)?,
                        parse_pair(at)?,
                    ))
                })()
                .ok_or(BoardError::Syntax { line })?;

                if !grid.contains(destination) {
                    return Err(BoardError::InvalidPosition {
                        line,
                        what: "package destination",
                    });
                }
                if !grid.is_holder(position) {
                    return Err(BoardError::InvalidPosition {
                        line,
                        what: "package",
                    });
                }
                if !package_ids.insert(id) {
                    return Err(BoardError::DuplicateId {
                        line,
                        what: "package",
                        id,
                    });
                }

                grid.add_package(position, Package::new(id, weight, destination));
            }
            _ => return Err(BoardError::Syntax { line }),
        }
    }

    Ok(robots)
}

/// Parses `(<row>,<col>)`.
fn parse_pair(token: &str) -> Option<Position> {
    let (row, col) = token.strip_prefix('(')?.strip_suffix(')')?.split_once(',')?;
    Some(Position::new(parse_coordinate(row)?, parse_coordinate(col)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = "..@.\n.~#.\n@...\n";

    #[test]
    fn test_parse_board() {
        let grid = parse_board(BOARD).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.terrain(Position::new(1, 1)), Some(Terrain::Water));
        assert_eq!(grid.terrain(Position::new(2, 0)), Some(Terrain::Base));
    }

    #[test]
    fn test_parse_board_errors() {
        assert!(matches!(parse_board(""), Err(BoardError::Empty)));
        assert!(matches!(parse_board("\n\n"), Err(BoardError::Empty)));
        assert!(matches!(
            parse_board("..\n.x"),
            Err(BoardError::InvalidCell {
                row: 1,
                col: 1,
                symbol: 'x'
            })
        ));
        assert!(matches!(
            parse_board("...\n.."),
            Err(BoardError::RaggedRow {
                row: 1,
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_parse_items() {
        let mut grid = parse_board(BOARD).unwrap();
        let items = "# robots first\n\
                     robot 1 10 100 @ (0,0)\n\
                     \n\
                     \t# indented comment\n\
                     robot 2 5 50 @ (2,3)\n\
                     package 7 3 (2,0) @ (0,2)\n\
                     package 8 4 (0,0) @ (0,2)\n";
        let robots = parse_items(items, &mut grid).unwrap();

        assert_eq!(robots.len(), 2);
        assert_eq!(robots[0].id, 1);
        assert_eq!(robots[0].strength, 10);
        assert_eq!(robots[0].money, 100);
        assert_eq!(robots[1].position, Position::new(2, 3));
        assert_eq!(grid.occupant(Position::new(0, 0)), Some(1));
        assert_eq!(grid.occupant(Position::new(2, 3)), Some(2));

        let ids: Vec<u32> = grid.packages(Position::new(0, 2)).map(|p| p.id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(
            grid.package(Position::new(0, 2), 7).map(|p| p.destination),
            Some(Position::new(2, 0))
        );
    }

    #[test]
    fn test_items_syntax_error_reports_line() {
        let mut grid = parse_board(BOARD).unwrap();
        let items = "robot 1 10 100 @ (0,0)\nrobbot 2 5 5 @ (0,1)\n";
        assert!(matches!(
            parse_items(items, &mut grid),
            Err(BoardError::Syntax { line: 2 })
        ));
    }

    #[test]
    fn test_items_invalid_positions() {
        let cases = [
            "robot 1 10 100 @ (1,1)",
            "robot 1 10 100 @ (1,2)",
            "robot 1 10 100 @ (9,9)",
            "package 1 1 (0,0) @ (1,2)",
            "package 1 1 (5,0) @ (0,0)",
        ];
        for items in cases {
            let mut grid = parse_board(BOARD).unwrap();
            assert!(
                matches!(
                    parse_items(items, &mut grid),
                    Err(BoardError::InvalidPosition { line: 1, .. })
                ),
                "accepted `{}`",
                items
            );
        }
    }

    #[test]
    fn test_items_duplicates_and_collisions() {
        let mut grid = parse_board(BOARD).unwrap();
        let items = "robot 1 10 100 @ (0,0)\nrobot 1 10 100 @ (0,1)\n";
        assert!(matches!(
            parse_items(items, &mut grid),
            Err(BoardError::DuplicateId { line: 2, .. })
        ));

        let mut grid = parse_board(BOARD).unwrap();
        let items = "robot 1 10 100 @ (0,0)\nrobot 2 10 100 @ (0,0)\n";
        assert!(matches!(
            parse_items(items, &mut grid),
            Err(BoardError::Occupied {
                line: 2,
                occupant: 1
            })
        ));

        let mut grid = parse_board(BOARD).unwrap();
        let items = "package 4 1 (0,0) @ (0,0)\npackage 4 1 (0,0) @ (0,1)\n";
        assert!(matches!(
            parse_items(items, &mut grid),
            Err(BoardError::DuplicateId { line: 2, .. })
        ));
    }

    #[test]
    fn test_items_path() {
        assert_eq!(
            items_path(Path::new("boards/small.board")),
            PathBuf::from("boards/small.board.items")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = load(Path::new("/nonexistent/board"));
        assert!(matches!(result, Err(BoardError::Io { .. })));
    }
}
