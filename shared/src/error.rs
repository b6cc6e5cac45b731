//! Error types for board loading and the line protocol.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems found while loading a board and its items file.
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("empty board")]
    Empty,

    #[error("invalid cell `{symbol}` at ({row},{col})")]
    InvalidCell { row: usize, col: usize, symbol: char },

    #[error("row {row} has width {found}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("items line {line}: syntax error")]
    Syntax { line: usize },

    #[error("items line {line}: invalid {what} position")]
    InvalidPosition { line: usize, what: &'static str },

    #[error("items line {line}: duplicate {what} id {id}")]
    DuplicateId {
        line: usize,
        what: &'static str,
        id: u32,
    },

    #[error("items line {line}: cell already occupied by robot {occupant}")]
    Occupied { line: usize, occupant: u32 },
}

/// A line that does not follow the protocol grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed command `{0}`")]
    Command(String),

    #[error("malformed update `{0}`")]
    Update(String),

    #[error("malformed package entry `{0}`")]
    Package(String),

    #[error("malformed bundle `{0}`")]
    Bundle(String),

    #[error("malformed player configuration `{0}`")]
    PlayerConfig(String),

    #[error("malformed board dimensions `{0}`")]
    Dimensions(String),

    #[error("invalid board row {row}: {reason}")]
    BoardRow { row: usize, reason: String },

    #[error("unknown role `{0}`")]
    Role(String),
}
