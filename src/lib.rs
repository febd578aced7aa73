//! Mine Arena - staked, turn-based mine-avoidance game engine
//!
//! Players escrow an entry fee, take turns probing a shared grid and the last
//! players standing split the pool. The crate covers the game lifecycle, seeded
//! per-round board generation, turn sequencing with advisory deadlines, and
//! escrow accounting with one-shot claims.
//!
//! [`GameRegistry`] is the entry point. Every game is serialized behind its own
//! lock; each accepted transition is written to a [`GameStore`], then applied,
//! then published on the [`EventLog`].

pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod game_store;
pub mod games;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ArenaConfig, ConfigLoader, RulesConfig};
pub use errors::{ArenaError, ArenaResult, GameError, GameResult, StorageError};
pub use events::{EventLog, EventRecord, GameEvent};
pub use game_store::{GameStore, InMemoryGameStore};
pub use games::{
    Address, Amount, CreateGameRequest, GameId, GameSnapshot, HashChainRandomness, MoveRecord,
    PlayerStatus, RandomnessSource,
};
pub use registry::{GameRegistry, RegistryBuilder};
