//! The world model: terrain grid, robots and packages.
//!
//! Holder cells (open space and bases) may host at most one robot and any
//! number of packages. Water and walls hold nothing; every mutator silently
//! ignores them so callers can treat the grid uniformly.

use crate::Position;
use std::collections::BTreeMap;

pub type RobotId = u32;
pub type PackageId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terrain {
    OpenSpace,
    Base,
    Water,
    Wall,
}

impl Terrain {
    pub fn symbol(self) -> char {
        match self {
            Terrain::OpenSpace => '.',
            Terrain::Base => '@',
            Terrain::Water => '~',
            Terrain::Wall => '#',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' => Some(Terrain::OpenSpace),
            '@' => Some(Terrain::Base),
            '~' => Some(Terrain::Water),
            '#' => Some(Terrain::Wall),
            _ => None,
        }
    }

    /// Holder cells can contain a robot and packages.
    pub fn is_holder(self) -> bool {
        matches!(self, Terrain::OpenSpace | Terrain::Base)
    }
}

/// An immutable package. Its location (grid cell, robot, retired) is tracked
/// by whoever owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: PackageId,
    pub weight: u32,
    pub destination: Position,
}

impl Package {
    pub fn new(id: PackageId, weight: u32, destination: Position) -> Self {
        Self {
            id,
            weight,
            destination,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Robot {
    pub id: RobotId,
    pub strength: u32,
    pub money: i64,
    pub position: Position,
    /// Set when pushed; the robot loses its own action for the rest of the turn.
    pub idle: bool,
    /// Carried packages, oldest pick first.
    cargo: Vec<Package>,
}

impl Robot {
    pub fn new(id: RobotId, strength: u32, money: i64, position: Position) -> Self {
        Self {
            id,
            strength,
            money: money.max(0),
            position,
            idle: false,
            cargo: Vec::new(),
        }
    }

    pub fn cargo(&self) -> &[Package] {
        &self.cargo
    }

    pub fn carried_weight(&self) -> u32 {
        self.cargo.iter().map(|p| p.weight).sum()
    }

    pub fn spare_capacity(&self) -> u32 {
        self.strength.saturating_sub(self.carried_weight())
    }

    pub fn carries(&self, package_id: PackageId) -> bool {
        self.cargo.iter().any(|p| p.id == package_id)
    }

    pub fn pick(&mut self, package: Package) {
        self.cargo.push(package);
    }

    pub fn drop_package(&mut self, package_id: PackageId) -> Option<Package> {
        let index = self.cargo.iter().position(|p| p.id == package_id)?;
        Some(self.cargo.remove(index))
    }

    /// Drops the most recently picked package.
    pub fn drop_last(&mut self) -> Option<Package> {
        self.cargo.pop()
    }
}

#[derive(Debug, Clone)]
struct Cell {
    terrain: Terrain,
    occupant: Option<RobotId>,
    packages: BTreeMap<PackageId, Package>,
}

impl Cell {
    fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            occupant: None,
            packages: BTreeMap::new(),
        }
    }
}

/// Rectangular board of fixed dimensions, stored row-major.
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Builds a grid from terrain rows. All rows must have the same length;
    /// use [`crate::board::parse_board`] for validated input.
    pub fn from_terrain(rows: Vec<Vec<Terrain>>) -> Self {
        let height = rows.len() as i32;
        let width = rows.first().map_or(0, |row| row.len()) as i32;
        let cells = rows.into_iter().flatten().map(Cell::new).collect();

        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of cells on the board.
    pub fn area(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.row < self.height && pos.col >= 0 && pos.col < self.width
    }

    /// Row-major index of an in-bounds position.
    pub fn index(&self, pos: Position) -> Option<usize> {
        if self.contains(pos) {
            Some((pos.row * self.width + pos.col) as usize)
        } else {
            None
        }
    }

    fn cell(&self, pos: Position) -> Option<&Cell> {
        self.index(pos).map(|i| &self.cells[i])
    }

    fn holder_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        let index = self.index(pos)?;
        let cell = &mut self.cells[index];
        cell.terrain.is_holder().then_some(cell)
    }

    pub fn terrain(&self, pos: Position) -> Option<Terrain> {
        self.cell(pos).map(|c| c.terrain)
    }

    pub fn is_holder(&self, pos: Position) -> bool {
        self.terrain(pos).is_some_and(Terrain::is_holder)
    }

    pub fn occupant(&self, pos: Position) -> Option<RobotId> {
        self.cell(pos).and_then(|c| c.occupant)
    }

    /// Places or clears the robot on a holder cell; no-op elsewhere.
    pub fn set_occupant(&mut self, pos: Position, robot: Option<RobotId>) {
        if let Some(cell) = self.holder_mut(pos) {
            cell.occupant = robot;
        }
    }

    /// Adds a package to a holder cell. Returns false if the cell cannot hold
    /// it or already holds a package with the same id.
    pub fn add_package(&mut self, pos: Position, package: Package) -> bool {
        match self.holder_mut(pos) {
            Some(cell) if !cell.packages.contains_key(&package.id) => {
                cell.packages.insert(package.id, package);
                true
            }
            _ => false,
        }
    }

    pub fn remove_package(&mut self, pos: Position, package_id: PackageId) -> Option<Package> {
        self.holder_mut(pos)?.packages.remove(&package_id)
    }

    pub fn clear_packages(&mut self, pos: Position) {
        if let Some(cell) = self.holder_mut(pos) {
            cell.packages.clear();
        }
    }

    pub fn package(&self, pos: Position, package_id: PackageId) -> Option<&Package> {
        self.cell(pos)?.packages.get(&package_id)
    }

    /// Packages resting on a cell, in ascending id order.
    pub fn packages(&self, pos: Position) -> impl Iterator<Item = &Package> + '_ {
        self.cell(pos).into_iter().flat_map(|c| c.packages.values())
    }

    pub fn has_packages(&self, pos: Position) -> bool {
        self.cell(pos).is_some_and(|c| !c.packages.is_empty())
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        let width = self.width;
        (0..self.cells.len() as i32).map(move |i| Position::new(i / width, i % width))
    }

    /// Terrain rows rendered with the board alphabet.
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(|c| c.terrain.symbol()).collect())
            .collect()
    }
}
