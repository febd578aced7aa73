//! Error types for the Mine Arena engine
//!
//! Every mutating operation returns a [`GameError`] synchronously. Nothing is
//! retried by the engine; a failed call leaves no partial state behind.

use crate::games::types::{Amount, GameId};
use thiserror::Error;

/// Root error type for all Mine Arena operations
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Game rule and lifecycle errors
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Durable ledger errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of a rejected game operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Game {0} not found")]
    NotFound(GameId),

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Game not started or already finished")]
    NotStarted,

    #[error("Game not finished")]
    NotFinished,

    #[error("Game full")]
    GameFull,

    #[error("Already joined")]
    DuplicatePlayer,

    #[error("Incorrect entry fee: expected {expected}, got {actual}")]
    IncorrectStake { expected: Amount, actual: Amount },

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid coordinates ({x}, {y}) for a {grid_size}x{grid_size} grid")]
    OutOfBounds { x: u8, y: u8, grid_size: u8 },

    #[error("Tile ({x}, {y}) already revealed this round")]
    AlreadyRevealed { x: u8, y: u8 },

    #[error("Winnings already claimed")]
    AlreadyClaimed,

    #[error("Not a winner")]
    NotAWinner,

    #[error("System paused")]
    SystemPaused,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Durable ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        ConfigurationError::LoadFailed(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigurationError {
    fn from(e: toml::de::Error) -> Self {
        ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::CorruptedData(e.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::WriteFailed(format!("Failed to encode: {}", e))
    }
}

pub type ArenaResult<T> = Result<T, ArenaError>;
pub type GameResult<T> = Result<T, GameError>;

/// Map a poisoned lock into a storage error instead of panicking.
pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::CorruptedData("lock poisoned by a panicked writer".to_string())
}
