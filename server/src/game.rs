//! Authoritative world state and the turn resolution engine.
//!
//! Every turn the server hands [`GameState::resolve`] one command per living
//! robot. Commands run strictly in descending bid order (ties keep the
//! robot registration order) and each produces zero or more [`Update`]s that
//! are broadcast verbatim to every observer.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::{
    Action, BoardConfig, Command, Direction, Grid, Package, PackageId, Robot, RobotId, Terrain,
    Update,
};
use std::collections::{BTreeSet, HashMap};

/// A robot together with the bookkeeping of the player controlling it.
#[derive(Debug, Clone)]
pub struct Controller {
    pub robot: Robot,
    pub score: u64,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub robot: RobotId,
    pub score: u64,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub turn: u32,
    grid: Grid,
    /// Registration order; also the tie-break for equal bids.
    controllers: Vec<Controller>,
    slots: HashMap<RobotId, usize>,
    packages: BTreeSet<PackageId>,
    delivered: BTreeSet<PackageId>,
}

impl GameState {
    /// Builds a game from a grid and its robots. Robots are (re)placed on the
    /// grid at their positions; packages already on the grid are tracked.
    pub fn new(mut grid: Grid, robots: Vec<Robot>) -> Self {
        let mut packages = BTreeSet::new();
        for pos in grid.positions() {
            packages.extend(grid.packages(pos).map(|p| p.id));
        }

        let mut slots = HashMap::new();
        let mut controllers = Vec::with_capacity(robots.len());
        for robot in robots {
            packages.extend(robot.cargo().iter().map(|p| p.id));
            grid.set_occupant(robot.position, Some(robot.id));
            slots.insert(robot.id, controllers.len());
            controllers.push(Controller {
                robot,
                score: 0,
                alive: true,
            });
        }

        Self {
            turn: 0,
            grid,
            controllers,
            slots,
            packages,
            delivered: BTreeSet::new(),
        }
    }

    pub fn from_board(board: BoardConfig) -> Self {
        Self::new(board.grid, board.robots)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn robot(&self, id: RobotId) -> Option<&Robot> {
        self.slot(id).map(|slot| &self.controllers[slot].robot)
    }

    pub fn score(&self, id: RobotId) -> Option<u64> {
        self.slot(id).map(|slot| self.controllers[slot].score)
    }

    pub fn is_alive(&self, id: RobotId) -> bool {
        self.slot(id).is_some_and(|slot| self.controllers[slot].alive)
    }

    /// Ids of living robots in registration order.
    pub fn living_robots(&self) -> Vec<RobotId> {
        self.controllers
            .iter()
            .filter(|c| c.alive)
            .map(|c| c.robot.id)
            .collect()
    }

    pub fn any_alive(&self) -> bool {
        self.controllers.iter().any(|c| c.alive)
    }

    /// Every package id that existed at the start of the game.
    pub fn package_ids(&self) -> &BTreeSet<PackageId> {
        &self.packages
    }

    pub fn delivered(&self) -> &BTreeSet<PackageId> {
        &self.delivered
    }

    fn slot(&self, id: RobotId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// Clears last turn's idle flags and advances the turn counter.
    pub fn start_turn(&mut self) {
        self.turn += 1;
        for controller in &mut self.controllers {
            controller.robot.idle = false;
        }
    }

    /// The Appear updates that open a game.
    pub fn initial_updates(&self) -> Vec<Update> {
        self.controllers
            .iter()
            .filter(|c| c.alive)
            .map(|c| Update::Appear {
                robot: c.robot.id,
                position: c.robot.position,
            })
            .collect()
    }

    /// Packages resting on the robot's current cell.
    pub fn visible_packages(&self, id: RobotId) -> Vec<Package> {
        match self.robot(id) {
            Some(robot) => self.grid.packages(robot.position).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Resolves one turn worth of commands and returns the resulting updates
    /// in resolution order.
    pub fn resolve(&mut self, mut commands: Vec<(RobotId, Command)>) -> Vec<Update> {
        // Stable: equal bids keep submission order.
        commands.sort_by(|a, b| b.1.bid.cmp(&a.1.bid));

        let mut updates = Vec::new();
        for (id, command) in &commands {
            self.execute(*id, command, &mut updates);
        }
        updates
    }

    fn execute(&mut self, id: RobotId, command: &Command, updates: &mut Vec<Update>) {
        let Some(slot) = self.slot(id) else {
            warn!("ignoring command from unknown robot {}", id);
            return;
        };
        if !self.controllers[slot].alive {
            debug!("robot {} was eliminated earlier this turn; skipping [{}]", id, command);
            return;
        }

        let robot = &mut self.controllers[slot].robot;
        robot.money = robot.money.saturating_sub(command.bid.saturating_abs());
        if robot.money < 0 || command.bid == 0 {
            info!(
                "robot {} eliminated: bid {} leaves money {}",
                id, command.bid, robot.money
            );
            self.eliminate(id);
            updates.push(Update::Kill { robot: id });
            return;
        }

        if robot.idle {
            robot.idle = false;
            debug!("robot {} was pushed this turn; skipping [{}]", id, command);
            return;
        }

        debug!("executing command from robot {} [{}]", id, command);
        match &command.action {
            Action::Move(direction) => self.try_move(id, *direction, updates, 0),
            Action::Pick(ids) => self.pick(id, &unique(ids), updates),
            Action::Drop(ids) => self.drop(id, &unique(ids), updates),
        }
    }

    /// Moves a robot one step, pushing any robot in the way first.
    fn try_move(
        &mut self,
        id: RobotId,
        direction: Direction,
        updates: &mut Vec<Update>,
        depth: usize,
    ) {
        let Some(slot) = self.slot(id) else {
            return;
        };
        let from = self.controllers[slot].robot.position;
        let dest = from.step(direction);

        match self.grid.terrain(dest) {
            None | Some(Terrain::Wall) => {}
            Some(Terrain::Water) => {
                info!("robot {} drowned at {}", id, dest);
                updates.push(Update::Move {
                    robot: id,
                    direction,
                });
                updates.push(Update::Kill { robot: id });
                self.eliminate(id);
            }
            Some(Terrain::OpenSpace | Terrain::Base) => {
                if let Some(victim) = self.grid.occupant(dest) {
                    // A push chain runs along a single row or column.
                    let limit = self.grid.width().max(self.grid.height()) as usize;
                    if depth >= limit {
                        warn!("push chain from robot {} exceeded {} robots", id, limit);
                        return;
                    }
                    self.push(victim, direction, updates, depth);
                }

                if self.grid.occupant(dest).is_none() {
                    self.grid.set_occupant(from, None);
                    self.grid.set_occupant(dest, Some(id));
                    self.controllers[slot].robot.position = dest;
                    updates.push(Update::Move {
                        robot: id,
                        direction,
                    });
                }
            }
        }
    }

    /// The victim loses its last picked package on its own cell, is moved on
    /// in the same direction and loses its action for the rest of the turn.
    fn push(
        &mut self,
        victim: RobotId,
        direction: Direction,
        updates: &mut Vec<Update>,
        depth: usize,
    ) {
        let Some(slot) = self.slot(victim) else {
            return;
        };

        let robot = &mut self.controllers[slot].robot;
        let at = robot.position;
        if let Some(package) = robot.drop_last() {
            debug!("robot {} lost package {} when pushed", victim, package.id);
            self.grid.add_package(at, package);
        }

        self.try_move(victim, direction, updates, depth + 1);
        self.controllers[slot].robot.idle = true;
    }

    fn pick(&mut self, id: RobotId, requested: &[PackageId], updates: &mut Vec<Update>) {
        let Some(slot) = self.slot(id) else {
            return;
        };
        let at = self.controllers[slot].robot.position;

        let incoming: u64 = requested
            .iter()
            .filter_map(|pid| self.grid.package(at, *pid))
            .map(|p| u64::from(p.weight))
            .sum();
        let robot = &self.controllers[slot].robot;
        if u64::from(robot.carried_weight()) + incoming > u64::from(robot.strength) {
            info!(
                "robot {} eliminated: cannot carry {} more on top of {}/{}",
                id,
                incoming,
                robot.carried_weight(),
                robot.strength
            );
            self.eliminate(id);
            updates.push(Update::Kill { robot: id });
            return;
        }

        for &package_id in requested {
            if let Some(package) = self.grid.remove_package(at, package_id) {
                self.controllers[slot].robot.pick(package);
                updates.push(Update::Pick {
                    robot: id,
                    package: package_id,
                });
            }
        }
    }

    fn drop(&mut self, id: RobotId, requested: &[PackageId], updates: &mut Vec<Update>) {
        let Some(slot) = self.slot(id) else {
            return;
        };

        for &package_id in requested {
            let controller = &mut self.controllers[slot];
            let Some(package) = controller.robot.drop_package(package_id) else {
                continue;
            };
            updates.push(Update::Drop {
                robot: id,
                package: package_id,
            });

            let at = controller.robot.position;
            if package.destination == at {
                controller.score += u64::from(package.weight);
                self.delivered.insert(package.id);
                info!(
                    "robot {} delivered package {} (+{})",
                    id, package.id, package.weight
                );
            } else {
                self.grid.add_package(at, package);
            }
        }
    }

    fn eliminate(&mut self, id: RobotId) {
        let Some(slot) = self.slot(id) else {
            return;
        };
        let controller = &mut self.controllers[slot];
        controller.alive = false;

        let at = controller.robot.position;
        if self.grid.occupant(at) == Some(id) {
            self.grid.set_occupant(at, None);
        }
    }

    /// Final standings, best score first; ties keep registration order.
    pub fn rankings(&self) -> Vec<Ranking> {
        let mut rankings: Vec<Ranking> = self
            .controllers
            .iter()
            .map(|c| Ranking {
                robot: c.robot.id,
                score: c.score,
            })
            .collect();
        rankings.sort_by(|a, b| b.score.cmp(&a.score));
        rankings
    }
}

/// Request ids without repeats, first occurrence wins.
fn unique(ids: &[PackageId]) -> Vec<PackageId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
