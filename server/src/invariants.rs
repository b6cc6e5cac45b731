//! World consistency checks.
//!
//! These never fire in a correct engine. The server runs them after every
//! turn in debug builds and the tests run them after every scenario.

use crate::game::GameState;
use shared::PackageId;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invariant violation: {message}")]
pub struct InvariantViolation {
    pub message: String,
}

impl InvariantViolation {
    fn new(message: String) -> Self {
        Self { message }
    }
}

/// Returns every violation found, or an empty list.
#[must_use]
pub fn check_invariants(state: &GameState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let grid = state.grid();

    // Each package is in exactly one place: a cell, a cargo hold or delivered.
    let mut seen: BTreeMap<PackageId, usize> = BTreeMap::new();
    for pos in grid.positions() {
        for package in grid.packages(pos) {
            *seen.entry(package.id).or_default() += 1;
        }
    }

    for controller in state.controllers() {
        let robot = &controller.robot;
        for package in robot.cargo() {
            *seen.entry(package.id).or_default() += 1;
        }

        if !controller.alive {
            continue;
        }
        if robot.carried_weight() > robot.strength {
            violations.push(InvariantViolation::new(format!(
                "robot {} carries {} > strength {}",
                robot.id,
                robot.carried_weight(),
                robot.strength
            )));
        }
        if robot.money < 0 {
            violations.push(InvariantViolation::new(format!(
                "living robot {} has negative money {}",
                robot.id, robot.money
            )));
        }
        if grid.occupant(robot.position) != Some(robot.id) {
            violations.push(InvariantViolation::new(format!(
                "robot {} is not registered at its position {}",
                robot.id, robot.position
            )));
        }
    }

    for id in state.delivered() {
        *seen.entry(*id).or_default() += 1;
    }

    for id in state.package_ids() {
        match seen.remove(id) {
            Some(1) => {}
            Some(count) => violations.push(InvariantViolation::new(format!(
                "package {} appears {} times",
                id, count
            ))),
            None => violations.push(InvariantViolation::new(format!("package {} vanished", id))),
        }
    }
    for id in seen.keys() {
        violations.push(InvariantViolation::new(format!(
            "package {} appeared from nowhere",
            id
        )));
    }

    // Occupied cells belong to living robots standing there.
    for pos in grid.positions() {
        let Some(occupant) = grid.occupant(pos) else {
            continue;
        };
        match state.robot(occupant) {
            Some(robot) if state.is_alive(occupant) && robot.position == pos => {}
            _ => violations.push(InvariantViolation::new(format!(
                "cell {} claims stale occupant {}",
                pos, occupant
            ))),
        }
    }

    violations
}
