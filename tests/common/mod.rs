#![allow(dead_code)]

use mine_arena::games::{generate_board, Board, Coord, Game, SeedContext, Treasury};
use mine_arena::{
    Address, Amount, ArenaConfig, CreateGameRequest, GameId, GameRegistry, GameStore,
    HashChainRandomness, InMemoryGameStore, ManualClock, RandomnessSource, StorageError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const ENTRY_FEE: Amount = 10_000_000_000_000_000; // 0.01 ETH
pub const SECRET: [u8; 32] = [11u8; 32];
pub const ADMIN: &str = "0xadmin";
pub const START: u64 = 1_700_000_000;

/// Remembers every seed it hands out so tests can rebuild the live board
pub struct RecordingRandomness {
    inner: HashChainRandomness,
    seeds: Mutex<HashMap<(GameId, u8), [u8; 32]>>,
}

impl RecordingRandomness {
    pub fn new() -> Self {
        Self {
            inner: HashChainRandomness::with_secret(SECRET),
            seeds: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, game_id: GameId, round: u8) -> [u8; 32] {
        self.seeds.lock().unwrap()[&(game_id, round)]
    }
}

impl RandomnessSource for RecordingRandomness {
    fn round_seed(&self, ctx: &SeedContext) -> [u8; 32] {
        let seed = self.inner.round_seed(ctx);
        self.seeds.lock().unwrap().insert((ctx.game_id, ctx.round), seed);
        seed
    }
}

/// In-memory store whose writes can be switched off to simulate an outage
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryGameStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("store offline".to_string()));
        }
        Ok(())
    }
}

impl GameStore for FlakyStore {
    fn save(&self, game: &Game) -> Result<(), StorageError> {
        self.check()?;
        self.inner.save(game)
    }

    fn load(&self, game_id: GameId) -> Result<Option<Game>, StorageError> {
        self.inner.load(game_id)
    }

    fn load_all(&self) -> Result<Vec<Game>, StorageError> {
        self.inner.load_all()
    }

    fn save_treasury(&self, treasury: &Treasury) -> Result<(), StorageError> {
        self.check()?;
        self.inner.save_treasury(treasury)
    }

    fn load_treasury(&self) -> Result<Option<Treasury>, StorageError> {
        self.inner.load_treasury()
    }
}

pub struct Arena {
    pub registry: GameRegistry,
    pub clock: Arc<ManualClock>,
    pub randomness: Arc<RecordingRandomness>,
    pub store: Arc<FlakyStore>,
}

pub fn addr(name: &str) -> Address {
    Address::new(name)
}

pub fn config() -> ArenaConfig {
    let mut config = ArenaConfig::default();
    config.admin.admin_address = addr(ADMIN);
    config
}

impl Arena {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: ArenaConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let randomness = Arc::new(RecordingRandomness::new());
        let store = Arc::new(FlakyStore::default());
        let registry = GameRegistry::builder(config)
            .store(store.clone() as Arc<dyn GameStore>)
            .randomness(randomness.clone() as Arc<dyn RandomnessSource>)
            .clock(clock.clone())
            .build()
            .unwrap();
        Self {
            registry,
            clock,
            randomness,
            store,
        }
    }

    pub fn request(creator: &str, entry_fee: Amount, max_players: u8) -> CreateGameRequest {
        CreateGameRequest {
            creator: addr(creator),
            entry_fee,
            max_players,
            turn_duration: 15,
            is_public: true,
            stake: entry_fee,
        }
    }

    /// Create a game, seat everyone and start it
    pub fn started_game(&self, players: &[&str], entry_fee: Amount) -> GameId {
        let id = self
            .registry
            .create_game(Self::request(players[0], entry_fee, players.len() as u8))
            .unwrap();
        for p in &players[1..] {
            self.registry.join_game(id, &addr(p), entry_fee).unwrap();
        }
        self.registry.start_game(id, &addr(players[0])).unwrap();
        id
    }

    pub fn board(&self, game_id: GameId) -> Board {
        let snapshot = self.registry.snapshot(game_id).unwrap();
        let seed = self.randomness.seed(game_id, snapshot.current_round);
        generate_board(seed, snapshot.grid_size, snapshot.mine_count)
    }

    fn hidden_tiles(&self, game_id: GameId) -> Vec<Coord> {
        let size = self.registry.snapshot(game_id).unwrap().grid_size;
        (0..size)
            .flat_map(|x| (0..size).map(move |y| (x, y)))
            .filter(|&(x, y)| !self.registry.is_tile_revealed(game_id, x, y).unwrap())
            .collect()
    }

    pub fn safe_tiles(&self, game_id: GameId) -> Vec<Coord> {
        let board = self.board(game_id);
        self.hidden_tiles(game_id)
            .into_iter()
            .filter(|c| !board.contains_mine(*c))
            .collect()
    }

    pub fn mine_tile(&self, game_id: GameId) -> Coord {
        let board = self.board(game_id);
        self.hidden_tiles(game_id)
            .into_iter()
            .find(|c| board.contains_mine(*c))
            .unwrap()
    }

    pub fn current(&self, game_id: GameId) -> Address {
        self.registry.snapshot(game_id).unwrap().current_player.unwrap()
    }

    pub fn reveal_safe(&self, game_id: GameId) {
        let (x, y) = self.safe_tiles(game_id)[0];
        let player = self.current(game_id);
        let record = self.registry.reveal_tile(game_id, &player, x, y).unwrap();
        assert!(!record.hit_mine);
    }

    pub fn reveal_mine(&self, game_id: GameId) {
        let (x, y) = self.mine_tile(game_id);
        let player = self.current(game_id);
        let record = self.registry.reveal_tile(game_id, &player, x, y).unwrap();
        assert!(record.hit_mine);
    }

    pub fn event_names(&self, game_id: GameId) -> Vec<&'static str> {
        self.registry
            .events()
            .events_for_game(game_id)
            .unwrap()
            .iter()
            .map(|r| r.event.name())
            .collect()
    }
}
