//! Durable ledger of game records.
//!
//! The engine does not ship a persistence engine; it talks to whatever store is
//! plugged in through [`GameStore`]. Records are written as JSON so an external
//! ledger can index and audit them without linking this crate.

use crate::errors::StorageError;
use crate::games::settlement::Treasury;
use crate::games::types::{Game, GameId};
use dashmap::DashMap;

const GAME_RECORD_PREFIX: &str = "game:record:";
const TREASURY_KEY: &str = "treasury:state";

fn game_record_key(game_id: GameId) -> String {
    format!("{}{}", GAME_RECORD_PREFIX, game_id)
}

/// Durable storage for game records
pub trait GameStore: Send + Sync {
    /// Persist the full record, replacing any previous version
    fn save(&self, game: &Game) -> Result<(), StorageError>;

    fn load(&self, game_id: GameId) -> Result<Option<Game>, StorageError>;

    /// Every stored game, ordered by id
    fn load_all(&self) -> Result<Vec<Game>, StorageError>;

    fn save_treasury(&self, treasury: &Treasury) -> Result<(), StorageError>;

    fn load_treasury(&self) -> Result<Option<Treasury>, StorageError>;
}

pub fn encode_game(game: &Game) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(game).map_err(|e| {
        StorageError::WriteFailed(format!("Failed to encode game {}: {}", game.id, e))
    })
}

pub fn decode_game(key: &str, bytes: &[u8]) -> Result<Game, StorageError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::CorruptedData(format!("Failed to decode {}: {}", key, e)))
}

/// Process-local store, keyed like the on-disk layout
#[derive(Default)]
pub struct InMemoryGameStore {
    records: DashMap<String, Vec<u8>>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl GameStore for InMemoryGameStore {
    fn save(&self, game: &Game) -> Result<(), StorageError> {
        let bytes = encode_game(game)?;
        self.records.insert(game_record_key(game.id), bytes);
        tracing::trace!(game_id = game.id, "Game record written");
        Ok(())
    }

    fn load(&self, game_id: GameId) -> Result<Option<Game>, StorageError> {
        let key = game_record_key(game_id);
        let Some(bytes) = self.records.get(&key) else {
            return Ok(None);
        };
        decode_game(&key, bytes.value()).map(Some)
    }

    fn load_all(&self) -> Result<Vec<Game>, StorageError> {
        let mut games = self
            .records
            .iter()
            .filter(|entry| entry.key().starts_with(GAME_RECORD_PREFIX))
            .map(|entry| decode_game(entry.key(), entry.value()))
            .collect::<Result<Vec<_>, _>>()?;
        games.sort_by_key(|g| g.id);
        Ok(games)
    }

    fn save_treasury(&self, treasury: &Treasury) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(treasury)?;
        self.records.insert(TREASURY_KEY.to_string(), bytes);
        Ok(())
    }

    fn load_treasury(&self) -> Result<Option<Treasury>, StorageError> {
        let Some(bytes) = self.records.get(TREASURY_KEY) else {
            return Ok(None);
        };
        serde_json::from_slice(bytes.value())
            .map(Some)
            .map_err(|e| StorageError::CorruptedData(format!("Failed to decode {}: {}", TREASURY_KEY, e)))
    }
}
