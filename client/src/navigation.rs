//! Path finding helpers used by the decision agent.
//!
//! Everything here works on the agent's belief grid: distance fields are
//! plain breadth-first floods over holder cells, robots never block them.

use shared::{Direction, Grid, Position, RobotId};
use std::collections::VecDeque;

/// Order in which candidate steps are considered; the first of several
/// equally good steps wins.
pub const STEP_ORDER: [Direction; 4] = [
    Direction::West,
    Direction::East,
    Direction::North,
    Direction::South,
];

/// Threat lookahead stops this many steps away from the agent.
pub const MAX_THREAT_DEPTH: u32 = 10;

/// Offsets of the 13-cell diamond (Manhattan radius 2) around a cell.
const THREAT_DIAMOND: [(i32, i32); 13] = [
    (-2, 0),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -2),
    (0, -1),
    (0, 0),
    (0, 1),
    (0, 2),
    (1, -1),
    (1, 0),
    (1, 1),
    (2, 0),
];

/// Hop counts from a single origin over Water- and Wall-free cells.
///
/// Unreachable cells hold [`DistanceField::infinity`], which is the grid
/// area and therefore larger than any real distance.
#[derive(Clone, Debug)]
pub struct DistanceField {
    width: i32,
    height: i32,
    origin: Position,
    infinity: u32,
    distances: Vec<u32>,
}

impl DistanceField {
    pub fn compute(grid: &Grid, origin: Position) -> Self {
        let infinity = u32::try_from(grid.area()).unwrap_or(u32::MAX);
        let mut field = Self {
            width: grid.width(),
            height: grid.height(),
            origin,
            infinity,
            distances: vec![infinity; grid.area()],
        };

        let Some(start) = grid.index(origin) else {
            return field;
        };
        field.distances[start] = 0;

        let mut queue = VecDeque::from([origin]);
        while let Some(cell) = queue.pop_front() {
            let Some(current) = grid.index(cell) else {
                continue;
            };
            let next_distance = field.distances[current] + 1;

            for direction in [
                Direction::South,
                Direction::North,
                Direction::East,
                Direction::West,
            ] {
                let neighbor = cell.step(direction);
                if !grid.is_holder(neighbor) {
                    continue;
                }
                let Some(index) = grid.index(neighbor) else {
                    continue;
                };
                if field.distances[index] != infinity {
                    continue;
                }

                field.distances[index] = next_distance;
                queue.push_back(neighbor);
            }
        }

        field
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn infinity(&self) -> u32 {
        self.infinity
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.row < 0 || pos.col < 0 || pos.row >= self.height || pos.col >= self.width {
            return None;
        }
        Some((pos.row * self.width + pos.col) as usize)
    }

    /// Raw field value, `None` outside the grid.
    pub fn get(&self, pos: Position) -> Option<u32> {
        self.index(pos).map(|i| self.distances[i])
    }

    /// Distance to a reachable cell.
    pub fn distance(&self, pos: Position) -> Option<u32> {
        self.get(pos).filter(|d| *d != self.infinity)
    }

    pub fn is_reachable(&self, pos: Position) -> bool {
        self.distance(pos).is_some()
    }

    /// Neighbors one step closer to the origin, in [`STEP_ORDER`].
    pub fn descending(&self, pos: Position) -> impl Iterator<Item = (Direction, Position)> + '_ {
        let closer = self.distance(pos).and_then(|d| d.checked_sub(1));
        STEP_ORDER.into_iter().filter_map(move |direction| {
            let next = pos.step(direction);
            match closer {
                Some(wanted) if self.get(next) == Some(wanted) => Some((direction, next)),
                _ => None,
            }
        })
    }
}

/// Robots other than `me` inside the diamond around `center`.
pub fn hostiles_in_range(grid: &Grid, center: Position, me: RobotId) -> u32 {
    THREAT_DIAMOND
        .iter()
        .map(|&(dr, dc)| Position::new(center.row + dr, center.col + dc))
        .filter(|&pos| matches!(grid.occupant(pos), Some(robot) if robot != me))
        .count() as u32
}

/// Steers toward a target while keeping away from other robots.
pub struct ThreatMap<'a> {
    grid: &'a Grid,
    toward: &'a DistanceField,
    me: RobotId,
}

impl<'a> ThreatMap<'a> {
    /// `toward` must be the distance field rooted at the target.
    pub fn new(grid: &'a Grid, toward: &'a DistanceField, me: RobotId) -> Self {
        Self { grid, toward, me }
    }

    /// Estimated danger of walking through `pos`, `depth` steps from here.
    pub fn score(&self, pos: Position, depth: u32) -> f64 {
        if depth > MAX_THREAT_DEPTH || pos == self.toward.origin() {
            return 0.0;
        }

        let penalty = f64::from(hostiles_in_range(self.grid, pos, self.me)) / f64::from(depth);

        let mut best: Option<f64> = None;
        for (_, next) in self.toward.descending(pos) {
            let cost = self.score(next, depth + 1);
            if best.map_or(true, |b| cost < b) {
                best = Some(cost);
            }
        }

        penalty + best.unwrap_or(0.0)
    }

    /// The safest shortest-path step from `from`, or `None` when the target
    /// cannot be reached.
    pub fn best_direction(&self, from: Position) -> Option<Direction> {
        let mut best: Option<(Direction, f64)> = None;
        for (direction, next) in self.toward.descending(from) {
            let cost = self.score(next, 1);
            if best.map_or(true, |(_, b)| cost < b) {
                best = Some((direction, cost));
            }
        }
        best.map(|(direction, _)| direction)
    }
}

/// Boustrophedon sweep used when there is nothing better to do.
#[derive(Debug, Clone)]
pub struct Scanner {
    heading: Direction,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            heading: Direction::East,
        }
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(&self) -> Direction {
        self.heading
    }

    fn turn_around(&mut self) {
        self.heading = match self.heading {
            Direction::East => Direction::West,
            _ => Direction::East,
        };
    }

    /// Next sweep waypoint from `from`. `reach` is any field rooted in the
    /// agent's connected region; only reachability is consulted.
    pub fn next_target(&mut self, reach: &DistanceField, from: Position) -> Option<Position> {
        if let Some(pos) = self.along_row(reach, from) {
            return Some(pos);
        }

        let height = reach.height;
        let mut row = from.row + 1;
        // Two passes over every row are enough to revisit the starting one
        // from both sides.
        for _ in 0..=(2 * height) {
            if row >= height {
                row = 0;
            }
            self.turn_around();

            if let Some(pos) = self.row_entry(reach, row) {
                if pos != from {
                    return Some(pos);
                }
            }
            row += 1;
        }
        None
    }

    /// Farthest cell of the reachable run next to `from` in the heading, or
    /// failing that the first reachable cell past the obstacle.
    fn along_row(&self, reach: &DistanceField, from: Position) -> Option<Position> {
        let columns: Vec<i32> = match self.heading {
            Direction::West => (0..from.col).rev().collect(),
            _ => (from.col + 1..reach.width).collect(),
        };
        let at = |col: i32| Position::new(from.row, col);

        let run_end = columns
            .iter()
            .take_while(|&&col| reach.is_reachable(at(col)))
            .last();
        if let Some(&col) = run_end {
            return Some(at(col));
        }

        columns
            .into_iter()
            .find(|&col| reach.is_reachable(at(col)))
            .map(at)
    }

    /// The reachable cell a sweep of `row` starts from.
    fn row_entry(&self, reach: &DistanceField, row: i32) -> Option<Position> {
        let at = |col: i32| Position::new(row, col);
        match self.heading {
            Direction::West => (0..reach.width).rev().map(at).find(|p| reach.is_reachable(*p)),
            _ => (0..reach.width).map(at).find(|p| reach.is_reachable(*p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::board::parse_board;
    use std::collections::HashSet;

    const ROOMS: &str = "\
.....#....
.###.#.##.
.#...~..#.
.#.####.#.
...#......
";

    #[test]
    fn test_distance_field_properties() {
        let grid = parse_board(ROOMS).unwrap();
        let origin = Position::new(0, 0);
        let field = DistanceField::compute(&grid, origin);

        assert_eq!(field.distance(origin), Some(0));
        assert_eq!(field.infinity(), 50);
        assert_eq!(field.get(Position::new(0, 5)), Some(50));
        assert_eq!(field.get(Position::new(2, 5)), Some(50));
        assert_eq!(field.get(Position::new(9, 9)), None);

        assert_eq!(field.distance(Position::new(4, 0)), Some(4));
        assert_eq!(field.distance(Position::new(2, 2)), Some(8));
        assert!(!field.is_reachable(Position::new(4, 4)));
        assert_eq!(grid.positions().filter(|p| field.is_reachable(*p)).count(), 16);

        for pos in grid.positions() {
            let Some(d) = field.distance(pos) else {
                continue;
            };
            assert!(grid.is_holder(pos));
            for direction in Direction::ALL {
                if let Some(n) = field.distance(pos.step(direction)) {
                    assert_eq!(n.abs_diff(d), 1, "{} -> {}", pos, direction.symbol());
                }
            }
            if d > 0 {
                assert!(field.descending(pos).next().is_some());
            }
        }
    }

    #[test]
    fn test_walled_off_region_is_unreachable() {
        let grid = parse_board("..#..\n..#..\n").unwrap();
        let field = DistanceField::compute(&grid, Position::new(0, 0));
        assert_eq!(field.distance(Position::new(1, 1)), Some(2));
        assert!(!field.is_reachable(Position::new(0, 3)));
        assert!(!field.is_reachable(Position::new(1, 2)));
    }

    #[test]
    fn test_descending_follows_step_order() {
        let grid = parse_board("...\n...\n...\n").unwrap();
        let field = DistanceField::compute(&grid, Position::new(0, 0));
        let steps: Vec<Direction> = field
            .descending(Position::new(1, 1))
            .map(|(d, _)| d)
            .collect();
        assert_eq!(steps, vec![Direction::West, Direction::North]);
    }

    #[test]
    fn test_hostiles_in_range_excludes_self() {
        let mut grid = parse_board(".....\n.....\n.....\n.....\n.....\n").unwrap();
        grid.set_occupant(Position::new(2, 2), Some(1));
        grid.set_occupant(Position::new(0, 2), Some(2));
        grid.set_occupant(Position::new(3, 3), Some(3));
        grid.set_occupant(Position::new(0, 0), Some(4));

        assert_eq!(hostiles_in_range(&grid, Position::new(2, 2), 1), 2);
        assert_eq!(hostiles_in_range(&grid, Position::new(2, 2), 9), 3);
        assert_eq!(hostiles_in_range(&grid, Position::new(4, 4), 1), 1);
    }

    #[test]
    fn test_threat_prefers_quiet_route() {
        // Two equally short routes from (0,0) to (2,2); a robot guards (0,2).
        let mut grid = parse_board("...\n...\n...\n").unwrap();
        grid.set_occupant(Position::new(0, 0), Some(1));
        grid.set_occupant(Position::new(0, 2), Some(2));

        let toward = DistanceField::compute(&grid, Position::new(2, 2));
        let threat = ThreatMap::new(&grid, &toward, 1);

        assert_eq!(
            threat.best_direction(Position::new(0, 0)),
            Some(Direction::South)
        );
        // East starts next to robot 2 and the best continuation through
        // (1,1) still sees it; south can slip along the west edge unseen.
        let east = threat.score(Position::new(0, 1), 1);
        let south = threat.score(Position::new(1, 0), 1);
        assert_approx_eq!(east, 1.0 + 0.5);
        assert_approx_eq!(south, 0.0);
        assert_approx_eq!(threat.score(Position::new(2, 2), 1), 0.0);
    }

    #[test]
    fn test_threat_depth_limit() {
        let mut grid = parse_board(".............\n").unwrap();
        grid.set_occupant(Position::new(0, 12), Some(2));
        let toward = DistanceField::compute(&grid, Position::new(0, 0));
        let threat = ThreatMap::new(&grid, &toward, 1);

        assert_approx_eq!(threat.score(Position::new(0, 12), MAX_THREAT_DEPTH + 1), 0.0);
        assert_approx_eq!(threat.score(Position::new(0, 12), 2), 0.5 + 1.0 / 3.0 + 1.0 / 4.0);
    }

    #[test]
    fn test_unreachable_target_has_no_direction() {
        let grid = parse_board("..#..\n").unwrap();
        let toward = DistanceField::compute(&grid, Position::new(0, 4));
        let threat = ThreatMap::new(&grid, &toward, 1);
        assert_eq!(threat.best_direction(Position::new(0, 0)), None);
    }

    #[test]
    fn test_scanner_sweeps_rows() {
        let grid = parse_board("....\n....\n").unwrap();
        let reach = DistanceField::compute(&grid, Position::new(0, 1));
        let mut scanner = Scanner::new();

        assert_eq!(
            scanner.next_target(&reach, Position::new(0, 1)),
            Some(Position::new(0, 3))
        );
        assert_eq!(
            scanner.next_target(&reach, Position::new(0, 3)),
            Some(Position::new(1, 3))
        );
        assert_eq!(scanner.heading(), Direction::West);
        assert_eq!(
            scanner.next_target(&reach, Position::new(1, 3)),
            Some(Position::new(1, 0))
        );
        assert_eq!(
            scanner.next_target(&reach, Position::new(1, 0)),
            Some(Position::new(0, 0))
        );
        assert_eq!(scanner.heading(), Direction::East);
    }

    #[test]
    fn test_scanner_jumps_over_obstacles() {
        let grid = parse_board("..#..\n.....\n").unwrap();
        let reach = DistanceField::compute(&grid, Position::new(0, 0));
        let mut scanner = Scanner::new();

        assert_eq!(
            scanner.next_target(&reach, Position::new(0, 0)),
            Some(Position::new(0, 1))
        );
        assert_eq!(
            scanner.next_target(&reach, Position::new(0, 1)),
            Some(Position::new(0, 3))
        );
    }

    #[test]
    fn test_scanner_single_row_never_returns_start() {
        let grid = parse_board("...\n").unwrap();
        let reach = DistanceField::compute(&grid, Position::new(0, 2));
        let mut scanner = Scanner::new();
        assert_eq!(
            scanner.next_target(&reach, Position::new(0, 2)),
            Some(Position::new(0, 0))
        );
    }

    #[test]
    fn test_scanner_isolated_cell() {
        let grid = parse_board("#.#\n###\n").unwrap();
        let reach = DistanceField::compute(&grid, Position::new(0, 1));
        let mut scanner = Scanner::new();
        assert_eq!(scanner.next_target(&reach, Position::new(0, 1)), None);
    }

    /// Walks shortest paths between successive sweep waypoints and checks
    /// that every reachable cell is stepped on.
    #[test]
    fn test_scanner_covers_reachable_cells() {
        let grid = parse_board(ROOMS).unwrap();
        let starts = [Position::new(0, 0), Position::new(4, 9), Position::new(2, 3)];

        for start in starts {
            let reach = DistanceField::compute(&grid, start);
            let reachable: HashSet<Position> =
                grid.positions().filter(|p| reach.is_reachable(*p)).collect();

            let mut scanner = Scanner::new();
            let mut visited = HashSet::from([start]);
            let mut position = start;

            for _ in 0..2 * grid.area() {
                if visited.len() == reachable.len() {
                    break;
                }
                let Some(target) = scanner.next_target(&reach, position) else {
                    break;
                };
                let toward = DistanceField::compute(&grid, target);
                while position != target {
                    let (_, next) = toward.descending(position).next().unwrap();
                    position = next;
                    visited.insert(position);
                }
            }

            assert_eq!(visited, reachable, "sweep from {} missed cells", start);
        }
    }
}
