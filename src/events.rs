//! Append-only event log of game state transitions
//!
//! Observers (UI polling, leaderboard aggregation) learn about state changes only
//! through this log. Entries are appended by the registry after the transition is
//! durably stored, while the game's lock is still held, so per-game order always
//! matches transition order.

use crate::errors::{poisoned, StorageError};
use crate::games::types::{Address, Amount, GameId};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Observable state transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameCreated {
        game_id: GameId,
        creator: Address,
        entry_fee: Amount,
        max_players: u8,
        is_public: bool,
    },
    PlayerJoined {
        game_id: GameId,
        player: Address,
    },
    GameStarted {
        game_id: GameId,
        timestamp: u64,
    },
    TileRevealed {
        game_id: GameId,
        player: Address,
        x: u8,
        y: u8,
        hit_mine: bool,
    },
    PlayerEliminated {
        game_id: GameId,
        player: Address,
    },
    TurnSkipped {
        game_id: GameId,
        player: Address,
    },
    RoundCompleted {
        game_id: GameId,
        round: u8,
    },
    GameFinished {
        game_id: GameId,
        winners: Vec<Address>,
        prize_per_winner: Amount,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> GameId {
        match self {
            GameEvent::GameCreated { game_id, .. }
            | GameEvent::PlayerJoined { game_id, .. }
            | GameEvent::GameStarted { game_id, .. }
            | GameEvent::TileRevealed { game_id, .. }
            | GameEvent::PlayerEliminated { game_id, .. }
            | GameEvent::TurnSkipped { game_id, .. }
            | GameEvent::RoundCompleted { game_id, .. }
            | GameEvent::GameFinished { game_id, .. } => *game_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::GameCreated { .. } => "GameCreated",
            GameEvent::PlayerJoined { .. } => "PlayerJoined",
            GameEvent::GameStarted { .. } => "GameStarted",
            GameEvent::TileRevealed { .. } => "TileRevealed",
            GameEvent::PlayerEliminated { .. } => "PlayerEliminated",
            GameEvent::TurnSkipped { .. } => "TurnSkipped",
            GameEvent::RoundCompleted { .. } => "RoundCompleted",
            GameEvent::GameFinished { .. } => "GameFinished",
        }
    }
}

/// Event with its position in the log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    /// Zero-based, gap-free position in the log
    pub sequence: u64,
    pub event: GameEvent,
}

/// Append-only log with push subscription
pub struct EventLog {
    records: RwLock<Vec<EventRecord>>,
    publisher: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new(broadcast_capacity: usize) -> Self {
        let (publisher, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            records: RwLock::new(Vec::new()),
            publisher,
        }
    }

    /// Append a batch produced by one transition. The batch lands contiguously.
    pub fn append_all(&self, events: Vec<GameEvent>) -> Result<Vec<u64>, StorageError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let mut sequences = Vec::with_capacity(events.len());

        for event in events {
            let record = EventRecord {
                sequence: records.len() as u64,
                event,
            };
            tracing::trace!(sequence = record.sequence, event = record.event.name(), "Event appended");
            sequences.push(record.sequence);
            // Fails only when nobody is subscribed.
            let _ = self.publisher.send(record.clone());
            records.push(record);
        }

        Ok(sequences)
    }

    /// Push stream of newly appended records. Slow receivers may lag and should
    /// catch up with [`EventLog::events_since`].
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.publisher.subscribe()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records with `sequence >= from`
    pub fn events_since(&self, from: u64) -> Result<Vec<EventRecord>, StorageError> {
        let records = self.records.read().map_err(poisoned)?;
        let start = (from as usize).min(records.len());
        Ok(records[start..].to_vec())
    }

    pub fn events_for_game(&self, game_id: GameId) -> Result<Vec<EventRecord>, StorageError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .iter()
            .filter(|r| r.event.game_id() == game_id)
            .cloned()
            .collect())
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1024)
    }
}
