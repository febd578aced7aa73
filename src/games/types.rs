use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Monotonically assigned game identifier
pub type GameId = u64;

/// Stake and payout amounts in the smallest currency unit (wei)
pub type Amount = u128;

/// Grid coordinate, `(x, y)` with `0 <= x, y < grid_size`
pub type Coord = (u8, u8);

/// Player identity (wallet address), compared case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Lifecycle state of a game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Open,
    Active,
    Finished,
}

/// One probe of the board, in the order it happened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveRecord {
    pub player: Address,
    pub x: u8,
    pub y: u8,
    pub hit_mine: bool,
    pub timestamp: u64,
}

/// A tile probed during the current round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevealedTile {
    pub player: Address,
    pub hit_mine: bool,
}

/// Audit record of a completed round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundRecord {
    pub round: u8,
    /// Hex-encoded 32-byte board seed
    pub seed: String,
    pub mine_count: u16,
    pub mines: BTreeSet<Coord>,
}

/// Per-game escrow state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Escrow {
    /// Funds still held for this game
    pub balance: Amount,
    pub settlement: Option<Settlement>,
    pub claimed: BTreeSet<Address>,
    pub unclaimed_winners: u32,
}

/// Result of settling a finished game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settlement {
    pub winners: Vec<Address>,
    pub prize_per_winner: Amount,
    pub platform_fee: Amount,
    /// Integer division remainder kept by the house
    pub remainder: Amount,
    pub settled_at: u64,
}

impl Settlement {
    /// Everything the house keeps from this game
    pub fn retained(&self) -> Amount {
        self.platform_fee + self.remainder
    }
}

/// Board state of the round in progress. Never exposed while the round runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundState {
    pub seed: [u8; 32],
    pub mine_count: u16,
    pub mines: BTreeSet<Coord>,
    #[serde(with = "coord_map")]
    pub revealed: BTreeMap<Coord, RevealedTile>,
    /// Indices into `Game::players` that were active when the round began
    pub roster: Vec<usize>,
    /// Indices into `Game::players` that already took their turn this round
    pub moved: BTreeSet<usize>,
    /// Index into `Game::move_log` of this round's first move
    pub first_move: usize,
}

// JSON object keys must be strings, so the map travels as a list of pairs.
mod coord_map {
    use super::{Coord, RevealedTile};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<Coord, RevealedTile>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<Coord, RevealedTile>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<(Coord, RevealedTile)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Full game record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub id: GameId,
    pub creator: Address,
    pub players: Vec<Address>,
    pub entry_fee: Amount,
    /// Total stakes collected. Kept as the historical figure after settlement.
    pub prize_pool: Amount,
    pub max_players: u8,
    pub turn_duration: u64,
    pub is_public: bool,
    pub grid_size: u8,
    pub base_mine_count: u16,
    pub created_at: u64,
    pub status: GameStatus,
    pub current_round: u8,
    /// Index into `players` of the player on the clock
    pub current_player: Option<usize>,
    pub turn_deadline: u64,
    pub round: RoundState,
    pub eliminated: BTreeSet<Address>,
    pub move_log: Vec<MoveRecord>,
    pub round_history: Vec<RoundRecord>,
    pub escrow: Escrow,
}

impl Game {
    pub fn started(&self) -> bool {
        self.status != GameStatus::Open
    }

    pub fn finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    pub fn is_player(&self, address: &Address) -> bool {
        self.players.contains(address)
    }

    pub fn is_eliminated(&self, address: &Address) -> bool {
        self.eliminated.contains(address)
    }

    /// Non-eliminated players in join order
    pub fn active_players(&self) -> Vec<&Address> {
        self.players
            .iter()
            .filter(|p| !self.eliminated.contains(*p))
            .collect()
    }

    pub fn current_player_address(&self) -> Option<&Address> {
        self.current_player.and_then(|i| self.players.get(i))
    }

    /// Position of the current player within the active ordering
    pub fn current_player_index(&self) -> Option<usize> {
        let current = self.current_player_address()?;
        self.active_players().iter().position(|p| *p == current)
    }

    pub fn has_claimed(&self, address: &Address) -> bool {
        self.escrow.claimed.contains(address)
    }

    pub fn player_status(&self, address: &Address) -> PlayerStatus {
        PlayerStatus {
            is_in_game: self.is_player(address),
            is_eliminated: self.is_eliminated(address),
            has_claimed: self.has_claimed(address),
        }
    }

    /// Finished and fully paid out; only kept for history from here on
    pub fn is_archivable(&self) -> bool {
        self.finished() && self.escrow.unclaimed_winners == 0
    }

    pub fn is_tile_revealed(&self, coord: Coord) -> bool {
        self.round.revealed.contains_key(&coord)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id,
            creator: self.creator.clone(),
            players: self.players.clone(),
            entry_fee: self.entry_fee,
            prize_pool: self.prize_pool,
            max_players: self.max_players,
            current_round: self.current_round,
            current_player: if self.finished() {
                None
            } else {
                self.current_player_address().cloned()
            },
            turn_deadline: self.turn_deadline,
            turn_duration: self.turn_duration,
            is_public: self.is_public,
            started: self.started(),
            finished: self.finished(),
            grid_size: self.grid_size,
            mine_count: if self.started() {
                self.round.mine_count
            } else {
                self.base_mine_count
            },
        }
    }
}

/// Derived per-player view of a game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStatus {
    pub is_in_game: bool,
    pub is_eliminated: bool,
    pub has_claimed: bool,
}

/// Read model of a game for observers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSnapshot {
    pub id: GameId,
    pub creator: Address,
    pub players: Vec<Address>,
    pub entry_fee: Amount,
    pub prize_pool: Amount,
    pub max_players: u8,
    pub current_round: u8,
    pub current_player: Option<Address>,
    pub turn_deadline: u64,
    pub turn_duration: u64,
    pub is_public: bool,
    pub started: bool,
    pub finished: bool,
    pub grid_size: u8,
    pub mine_count: u16,
}

/// Parameters of a `create_game` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub creator: Address,
    pub entry_fee: Amount,
    pub max_players: u8,
    pub turn_duration: u64,
    pub is_public: bool,
    pub stake: Amount,
}
