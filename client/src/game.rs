use crate::navigation::{DistanceField, Scanner, ThreatMap};
use log::{debug, info};
use shared::{
    Action, Command, Direction, Grid, Package, PackageId, PlayerConfig, Position, Robot, RobotId,
    Terrain, Update,
};
use std::collections::HashMap;

/// Below this share of free capacity the agent always heads for a delivery.
pub const NEARLY_FULL: f64 = 0.25;

/// The agent's picture of the world and its own robot.
///
/// Nothing here is ground truth: the state is rebuilt from server updates
/// and the package lists of the cells the agent stands on, and is corrected
/// whenever an update contradicts it.
#[derive(Debug, Clone)]
pub struct Agent {
    me: Robot,
    alive: bool,
    bid: i64,
    score: u64,
    grid: Grid,
    robots: HashMap<RobotId, Position>,
    /// Every package seen on a cell and not yet delivered by us.
    known: HashMap<PackageId, Package>,
    /// Base cells that may still hold packages for us.
    sources: Vec<Position>,
    /// Sources whose packages are all too heavy for the current load.
    suspended: Vec<Position>,
    visited: Vec<bool>,
    target: Option<Position>,
    toward: Option<DistanceField>,
    here: Option<DistanceField>,
    sources_filtered: bool,
    scanner: Scanner,
    last_command: Option<Command>,
    /// Set when an update this turn moved us against our command.
    pushed: bool,
}

impl Agent {
    pub fn new(grid: Grid, config: PlayerConfig, bid: i64) -> Self {
        let sources = grid
            .positions()
            .filter(|&p| grid.terrain(p) == Some(Terrain::Base))
            .collect();
        let visited = vec![false; grid.area()];

        Self {
            me: Robot::new(config.id, config.strength, config.money, Position::new(0, 0)),
            alive: true,
            bid,
            score: 0,
            grid,
            robots: HashMap::new(),
            known: HashMap::new(),
            sources,
            suspended: Vec::new(),
            visited,
            target: None,
            toward: None,
            here: None,
            sources_filtered: false,
            scanner: Scanner::new(),
            last_command: None,
            pushed: false,
        }
    }

    pub fn id(&self) -> RobotId {
        self.me.id
    }

    pub fn robot(&self) -> &Robot {
        &self.me
    }

    pub fn position(&self) -> Position {
        self.me.position
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Total weight this agent delivered.
    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn target(&self) -> Option<Position> {
        self.target
    }

    pub fn sources(&self) -> &[Position] {
        &self.sources
    }

    pub fn suspended(&self) -> &[Position] {
        &self.suspended
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Reachability from the agent's region. Terrain never changes and
    /// robots do not block, so the first field computed stays valid.
    fn is_reachable(&mut self, pos: Position) -> bool {
        let here = self.me.position;
        let grid = &self.grid;
        self.here
            .get_or_insert_with(|| DistanceField::compute(grid, here))
            .is_reachable(pos)
    }

    fn was_visited(&self, pos: Position) -> bool {
        self.grid.index(pos).is_some_and(|i| self.visited[i])
    }

    fn forget_source(&mut self, pos: Position) {
        self.sources.retain(|p| *p != pos);
    }

    fn release(&mut self, package: PackageId) {
        if self.me.drop_package(package).is_some() {
            debug!("robot {} no longer carries package {}", self.me.id, package);
        }
    }

    /// Folds one broadcast update into the belief state.
    pub fn apply_update(&mut self, update: &Update) {
        match *update {
            Update::Appear { robot, position } => {
                if robot == self.me.id {
                    self.me.position = position;
                }
                self.robots.insert(robot, position);
                self.grid.set_occupant(position, Some(robot));
            }
            Update::Move { robot, direction } => {
                if robot == self.me.id {
                    self.me.position = self.me.position.step(direction);
                    if self.was_pushed(direction) {
                        self.pushed = true;
                        if let Some(lost) = self.me.drop_last() {
                            debug!("robot {} was pushed and lost package {}", robot, lost.id);
                        }
                    }
                }
                if let Some(position) = self.robots.get_mut(&robot) {
                    if self.grid.occupant(*position) == Some(robot) {
                        self.grid.set_occupant(*position, None);
                    }
                    *position = position.step(direction);
                    self.grid.set_occupant(*position, Some(robot));
                }
            }
            Update::Pick { robot, package } => {
                if robot == self.me.id {
                    if let Some(picked) = self.known.get(&package) {
                        self.me.pick(picked.clone());
                    }
                } else {
                    self.release(package);
                }

                if let Some(&at) = self.robots.get(&robot) {
                    self.grid.remove_package(at, package);
                    if self.was_visited(at) && !self.grid.has_packages(at) {
                        self.forget_source(at);
                    }
                }
            }
            Update::Drop { robot, package } => {
                if robot == self.me.id {
                    self.delivered(package);
                } else {
                    self.release(package);
                }
            }
            Update::Kill { robot } => {
                if let Some(at) = self.robots.remove(&robot) {
                    if self.grid.occupant(at) == Some(robot) {
                        self.grid.set_occupant(at, None);
                    }
                }
                if robot == self.me.id {
                    info!("robot {} was destroyed", robot);
                    self.alive = false;
                }
            }
        }
    }

    /// Reconciles cargo once every update of the turn has been applied.
    ///
    /// A push in the direction we were heading looks like our own move, so
    /// the package it knocked off goes unnoticed until we try to drop it.
    /// The server drops every requested package we carry; any still held
    /// here was never ours.
    pub fn end_turn(&mut self) {
        let pushed = std::mem::take(&mut self.pushed);
        if !self.alive || pushed {
            return;
        }
        let Some(Command {
            action: Action::Drop(ids),
            ..
        }) = &self.last_command
        else {
            return;
        };

        let lost: Vec<PackageId> = ids
            .iter()
            .copied()
            .filter(|&id| self.me.carries(id))
            .collect();
        for id in lost {
            debug!("robot {} dropped nothing for package {}", self.me.id, id);
            self.release(id);
        }
    }

    /// A move of our own robot that our last command does not explain.
    fn was_pushed(&self, direction: Direction) -> bool {
        match &self.last_command {
            Some(command) => command.action != Action::Move(direction),
            None => false,
        }
    }

    fn delivered(&mut self, package: PackageId) {
        let Some(dropped) = self.me.drop_package(package) else {
            return;
        };
        self.known.remove(&package);
        if dropped.destination == self.me.position {
            self.score += u64::from(dropped.weight);
        }

        // Freed capacity may make suspended sources worth a visit again.
        let spare = self.me.spare_capacity();
        let grid = &self.grid;
        let (usable, still_heavy): (Vec<Position>, Vec<Position>) = self
            .suspended
            .iter()
            .partition(|&&p| grid.packages(p).any(|pkg| pkg.weight <= spare));
        self.suspended = still_heavy;
        for pos in usable {
            if !self.sources.contains(&pos) {
                self.sources.push(pos);
            }
        }
    }

    /// Replaces our belief about the current cell with what the server says
    /// lies on it.
    pub fn observe_packages(&mut self, packages: Vec<Package>) {
        let here = self.me.position;
        self.grid.clear_packages(here);

        for package in packages {
            if !self.is_reachable(package.destination) {
                continue;
            }
            // We cannot be carrying what we stand on; a push dropped it.
            self.release(package.id);
            self.known
                .entry(package.id)
                .or_insert_with(|| package.clone());
            self.grid.add_package(here, package);
        }

        if let Some(i) = self.grid.index(here) {
            self.visited[i] = true;
        }
    }

    /// Chooses this turn's command and books its bid.
    pub fn decide(&mut self) -> Command {
        let action = self.choose_action();
        let command = Command::new(self.bid, action);

        self.me.money -= self.bid.saturating_abs();
        debug!("robot {} issuing [{}]", self.me.id, command);
        self.last_command = Some(command.clone());
        command
    }

    fn choose_action(&mut self) -> Action {
        let here = self.me.position;

        let drops: Vec<PackageId> = self
            .me
            .cargo()
            .iter()
            .filter(|p| p.destination == here)
            .map(|p| p.id)
            .collect();
        if !drops.is_empty() {
            return Action::Drop(drops);
        }

        if self.grid.has_packages(here) {
            let picks = self.pick_list();
            if !picks.is_empty() {
                return Action::Pick(picks);
            }
            if self.sources.contains(&here) {
                self.forget_source(here);
                self.suspended.push(here);
            }
        } else {
            self.forget_source(here);
        }

        if self.target.map_or(true, |t| t == here) {
            self.next_target();
        }

        match self.target {
            Some(target) if target != here => match self.step_toward() {
                Some(direction) => Action::Move(direction),
                None => self.idle_action(),
            },
            _ => self.idle_action(),
        }
    }

    /// Packages on the current cell worth carrying: closest destinations
    /// first, as many as fit.
    fn pick_list(&self) -> Vec<PackageId> {
        let here = self.me.position;
        let mut candidates: Vec<&Package> = self.grid.packages(here).collect();
        candidates.sort_by_key(|p| here.manhattan(p.destination));

        let mut load = self.me.carried_weight();
        let mut picks = Vec::new();
        for package in candidates {
            if load.saturating_add(package.weight) <= self.me.strength {
                load += package.weight;
                picks.push(package.id);
            }
        }
        picks
    }

    fn next_target(&mut self) {
        let here = self.me.position;
        let field = DistanceField::compute(&self.grid, here);

        if !self.sources_filtered {
            self.sources.retain(|p| field.is_reachable(*p));
            self.sources_filtered = true;
        }

        let source = self
            .sources
            .iter()
            .filter(|&&p| p != here)
            .filter_map(|&p| field.distance(p).map(|d| (p, d)))
            .min_by_key(|&(_, d)| d);
        let destination = self
            .me
            .cargo()
            .iter()
            .filter_map(|pkg| field.distance(pkg.destination).map(|d| (pkg.destination, d)))
            .min_by_key(|&(_, d)| d);

        let target = match (source, destination) {
            (Some((source, s)), Some((destination, d))) => {
                if prefer_source(self.me.strength, self.me.carried_weight(), s, d) {
                    Some(source)
                } else {
                    Some(destination)
                }
            }
            (Some((source, _)), None) => Some(source),
            (None, Some((destination, _))) => Some(destination),
            (None, None) => self.scanner.next_target(&field, here),
        };

        if target != self.target {
            debug!("robot {} heading for {:?}", self.me.id, target);
        }
        self.toward = target.map(|t| DistanceField::compute(&self.grid, t));
        self.target = target;
        self.here = Some(field);
    }

    fn step_toward(&self) -> Option<Direction> {
        let toward = self.toward.as_ref()?;
        ThreatMap::new(&self.grid, toward, self.me.id).best_direction(self.me.position)
    }

    /// A command that cannot have any effect: dropping an id never seen.
    fn idle_action(&self) -> Action {
        let mut bogus: PackageId = 0;
        while self.known.contains_key(&bogus) || self.me.carries(bogus) {
            bogus += 1;
        }
        Action::Drop(vec![bogus])
    }
}

/// Whether to fetch more packages (true) or deliver (false), given the
/// distances to the nearest source and the nearest delivery.
pub fn prefer_source(
    strength: u32,
    carried: u32,
    source_distance: u32,
    destination_distance: u32,
) -> bool {
    if strength == 0 {
        return false;
    }
    let free = f64::from(strength.saturating_sub(carried)) / f64::from(strength);
    if free <= NEARLY_FULL {
        return false;
    }
    let ratio = f64::from(destination_distance) / f64::from(source_distance) * (free + 0.5);
    ratio > 1.0
}
