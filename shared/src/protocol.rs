//! Line protocol between the server and its players and debuggers.
//!
//! Every message is exactly one newline-terminated line. Values implement
//! `Display` for encoding and `FromStr` for decoding; the bundle helpers
//! wrap lists as `[a;b;c]`.

use crate::board;
use crate::error::ProtocolError;
use crate::world::{Grid, Package, PackageId, RobotId};
use crate::{Direction, Position};
use std::fmt;
use std::str::FromStr;

/// What a robot wants to do this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    Pick(Vec<PackageId>),
    Drop(Vec<PackageId>),
}

/// A command and the money wagered on its execution priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub bid: i64,
    pub action: Action,
}

impl Command {
    pub fn new(bid: i64, action: Action) -> Self {
        Self { bid, action }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::Move(direction) => write!(f, "{} move {}", self.bid, direction.symbol()),
            Action::Pick(ids) => write!(f, "{} pick {}", self.bid, join_ids(ids)),
            Action::Drop(ids) => write!(f, "{} drop {}", self.bid, join_ids(ids)),
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::Command(line.to_string());
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() < 3 {
            return Err(malformed());
        }

        let bid = parse_signed(tokens[0]).ok_or_else(malformed)?;
        let action = match tokens[1] {
            "move" if tokens.len() == 3 => {
                let mut chars = tokens[2].chars();
                match (chars.next().and_then(Direction::from_symbol), chars.next()) {
                    (Some(direction), None) => Action::Move(direction),
                    _ => return Err(malformed()),
                }
            }
            "pick" => Action::Pick(parse_id_list(&tokens[2..]).ok_or_else(malformed)?),
            "drop" => Action::Drop(parse_id_list(&tokens[2..]).ok_or_else(malformed)?),
            _ => return Err(malformed()),
        };

        Ok(Command { bid, action })
    }
}

/// A world delta broadcast to every observer after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Appear { robot: RobotId, position: Position },
    Move { robot: RobotId, direction: Direction },
    Pick { robot: RobotId, package: PackageId },
    Drop { robot: RobotId, package: PackageId },
    Kill { robot: RobotId },
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Appear { robot, position } => {
                write!(f, "#{},r {} c {}", robot, position.row, position.col)
            }
            Update::Move { robot, direction } => write!(f, "#{},{}", robot, direction.symbol()),
            Update::Pick { robot, package } => write!(f, "#{},p {}", robot, package),
            Update::Drop { robot, package } => write!(f, "#{},d {}", robot, package),
            Update::Kill { robot } => write!(f, "#{},k", robot),
        }
    }
}

impl FromStr for Update {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::Update(text.to_string());
        let (robot, event) = text
            .strip_prefix('#')
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(malformed)?;
        let robot = parse_unsigned(robot).ok_or_else(malformed)?;

        let tokens: Vec<&str> = event.split(' ').collect();
        let update = match tokens.as_slice() {
            ["k"] => Update::Kill { robot },
            ["p", package] => Update::Pick {
                robot,
                package: parse_unsigned(package).ok_or_else(malformed)?,
            },
            ["d", package] => Update::Drop {
                robot,
                package: parse_unsigned(package).ok_or_else(malformed)?,
            },
            ["r", row, "c", col] => Update::Appear {
                robot,
                position: Position::new(
                    parse_coordinate(row).ok_or_else(malformed)?,
                    parse_coordinate(col).ok_or_else(malformed)?,
                ),
            },
            [symbol] => {
                let mut chars = symbol.chars();
                match (chars.next().and_then(Direction::from_symbol), chars.next()) {
                    (Some(direction), None) => Update::Move { robot, direction },
                    _ => return Err(malformed()),
                }
            }
            _ => return Err(malformed()),
        };

        Ok(update)
    }
}

/// Identity and economy of the robot a player controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    pub id: RobotId,
    pub strength: u32,
    pub money: i64,
}

impl fmt::Display for PlayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.strength, self.money)
    }
}

impl FromStr for PlayerConfig {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::PlayerConfig(line.to_string());
        match line.split(' ').collect::<Vec<_>>().as_slice() {
            [id, strength, money] => Ok(PlayerConfig {
                id: parse_unsigned(id).ok_or_else(malformed)?,
                strength: parse_unsigned(strength).ok_or_else(malformed)?,
                money: i64::from(parse_unsigned(money).ok_or_else(malformed)?),
            }),
            _ => Err(malformed()),
        }
    }
}

/// The first line a client sends after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Debugger,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Player => f.write_str("player"),
            Role::Debugger => f.write_str("debugger"),
        }
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line {
            "player" => Ok(Role::Player),
            "debugger" => Ok(Role::Debugger),
            other => Err(ProtocolError::Role(other.to_string())),
        }
    }
}

/// The control line a debugger sends to let the next turn proceed.
pub const STEP: &str = "step";

/// Wraps already encoded items as `[a;b;c]`.
pub fn encode_bundle<T: fmt::Display>(items: &[T]) -> String {
    let body: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", body.join(";"))
}

/// Splits a `[a;b;c]` line into its (non-empty) entries.
pub fn split_bundle(line: &str) -> Result<Vec<&str>, ProtocolError> {
    let body = line
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| ProtocolError::Bundle(line.to_string()))?;

    Ok(body.split(';').filter(|entry| !entry.is_empty()).collect())
}

pub fn decode_updates(line: &str) -> Result<Vec<Update>, ProtocolError> {
    split_bundle(line)?
        .into_iter()
        .map(|entry| entry.parse::<Update>())
        .collect()
}

pub fn encode_package(package: &Package) -> String {
    format!(
        "{},{},{},{}",
        package.id, package.destination.row, package.destination.col, package.weight
    )
}

pub fn decode_package(entry: &str) -> Result<Package, ProtocolError> {
    let malformed = || ProtocolError::Package(entry.to_string());
    match entry.split(',').collect::<Vec<_>>().as_slice() {
        [id, row, col, weight] => Ok(Package::new(
            parse_unsigned(id).ok_or_else(malformed)?,
            parse_unsigned(weight).ok_or_else(malformed)?,
            Position::new(
                parse_coordinate(row).ok_or_else(malformed)?,
                parse_coordinate(col).ok_or_else(malformed)?,
            ),
        )),
        _ => Err(malformed()),
    }
}

pub fn encode_packages(packages: &[Package]) -> String {
    let entries: Vec<String> = packages.iter().map(encode_package).collect();
    encode_bundle(&entries)
}

pub fn decode_packages(line: &str) -> Result<Vec<Package>, ProtocolError> {
    split_bundle(line)?.into_iter().map(decode_package).collect()
}

pub fn encode_dimensions(grid: &Grid) -> String {
    format!("{} {}", grid.width(), grid.height())
}

/// Parses `<width> <height>`.
pub fn decode_dimensions(line: &str) -> Result<(usize, usize), ProtocolError> {
    let malformed = || ProtocolError::Dimensions(line.to_string());
    match line.split(' ').collect::<Vec<_>>().as_slice() {
        [width, height] => Ok((
            parse_unsigned(width).ok_or_else(malformed)? as usize,
            parse_unsigned(height).ok_or_else(malformed)? as usize,
        )),
        _ => Err(malformed()),
    }
}

/// Rebuilds a grid from the rows received after the dimensions line.
pub fn decode_board(width: usize, rows: &[String]) -> Result<Grid, ProtocolError> {
    for (row, text) in rows.iter().enumerate() {
        let found = text.chars().count();
        if found != width {
            return Err(ProtocolError::BoardRow {
                row,
                reason: format!("expected {width} cells, got {found}"),
            });
        }
    }

    board::parse_board(&rows.join("\n")).map_err(|e| ProtocolError::BoardRow {
        row: 0,
        reason: e.to_string(),
    })
}

fn join_ids(ids: &[PackageId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_id_list(tokens: &[&str]) -> Option<Vec<PackageId>> {
    if tokens.is_empty() {
        return None;
    }
    tokens.iter().map(|t| parse_unsigned(t)).collect()
}

/// Digits only; no sign, no blanks.
pub(crate) fn parse_unsigned(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn parse_signed(token: &str) -> Option<i64> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

pub(crate) fn parse_coordinate(token: &str) -> Option<i32> {
    parse_unsigned(token).and_then(|v| i32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move_command() {
        let cmd: Command = "5 move e".parse().unwrap();
        assert_eq!(cmd, Command::new(5, Action::Move(Direction::East)));
        assert_eq!(cmd.to_string(), "5 move e");
    }

    #[test]
    fn test_parse_pick_and_drop_commands() {
        let pick: Command = "1 pick 3 4 12".parse().unwrap();
        assert_eq!(pick.action, Action::Pick(vec![3, 4, 12]));
        assert_eq!(pick.to_string(), "1 pick 3 4 12");

        let drop: Command = "-2 drop 9".parse().unwrap();
        assert_eq!(drop.bid, -2);
        assert_eq!(drop.action, Action::Drop(vec![9]));
    }

    #[test]
    fn test_reject_malformed_commands() {
        let bad = [
            "",
            "move n",
            "5 move",
            "5 move x",
            "5 move ne",
            "5 move n extra",
            "5 pick",
            "5 pick a",
            "5 pick 1  2",
            "+5 move n",
            "5 jump n",
            "five move n",
            "5 drop -1",
        ];
        for line in bad {
            assert!(line.parse::<Command>().is_err(), "accepted `{}`", line);
        }
    }

    #[test]
    fn test_update_encoding() {
        let updates = vec![
            Update::Move {
                robot: 1,
                direction: Direction::North,
            },
            Update::Pick {
                robot: 2,
                package: 14,
            },
            Update::Drop {
                robot: 2,
                package: 14,
            },
            Update::Appear {
                robot: 3,
                position: Position::new(4, 5),
            },
            Update::Kill { robot: 1 },
        ];
        let line = encode_bundle(&updates);
        assert_eq!(line, "[#1,n;#2,p 14;#2,d 14;#3,r 4 c 5;#1,k]");
        assert_eq!(decode_updates(&line).unwrap(), updates);
    }

    #[test]
    fn test_empty_bundles() {
        assert_eq!(encode_bundle::<Update>(&[]), "[]");
        assert!(decode_updates("[]").unwrap().is_empty());
        assert!(decode_packages("[]").unwrap().is_empty());
    }

    #[test]
    fn test_reject_malformed_updates() {
        for line in ["#1,x", "1,n", "#a,n", "#1,p", "#1,r 2", "#1,k 3"] {
            assert!(line.parse::<Update>().is_err(), "accepted `{}`", line);
        }
        assert!(decode_updates("#1,n").is_err());
    }

    #[test]
    fn test_package_bundle() {
        let line = "[3,1,2,10;4,0,0,1]";
        let packages = decode_packages(line).unwrap();
        assert_eq!(packages[0], Package::new(3, 10, Position::new(1, 2)));
        assert_eq!(packages[1], Package::new(4, 1, Position::new(0, 0)));
        assert_eq!(encode_packages(&packages), line);
        assert!(decode_packages("[3,1,2]").is_err());
    }

    #[test]
    fn test_player_config() {
        let config: PlayerConfig = "2 15 300".parse().unwrap();
        assert_eq!(
            config,
            PlayerConfig {
                id: 2,
                strength: 15,
                money: 300
            }
        );
        assert_eq!(config.to_string(), "2 15 300");
        assert!("2 15".parse::<PlayerConfig>().is_err());
        assert!("2 15 -3".parse::<PlayerConfig>().is_err());
    }

    #[test]
    fn test_role_handshake() {
        assert_eq!("player".parse::<Role>(), Ok(Role::Player));
        assert_eq!("debugger".parse::<Role>(), Ok(Role::Debugger));
        assert!("Player".parse::<Role>().is_err());
    }

    #[test]
    fn test_board_transfer() {
        let rows = vec!["..@".to_string(), "#~.".to_string()];
        let grid = decode_board(3, &rows).unwrap();
        assert_eq!(encode_dimensions(&grid), "3 2");
        assert_eq!(grid.rows(), rows);
        assert_eq!(decode_dimensions("3 2"), Ok((3, 2)));
        assert!(decode_board(4, &rows).is_err());
        assert!(decode_dimensions("3").is_err());
    }
}
