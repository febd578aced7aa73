//! Game registry: owns every game, serializes operations per game and commits
//! each successful transition to the store and the event log.

use crate::clock::{Clock, SystemClock};
use crate::config::{ArenaConfig, RulesConfig};
use crate::errors::{poisoned, ArenaResult, ConfigurationError, GameError, GameResult, StorageError};
use crate::events::{EventLog, GameEvent};
use crate::game_store::{GameStore, InMemoryGameStore};
use crate::games::randomness::{HashChainRandomness, RandomnessSource};
use crate::games::settlement::{EscrowLedger, Treasury};
use crate::games::state_machine::{new_game, validate_create, GameStateMachine};
use crate::games::types::{
    Address, Amount, CreateGameRequest, Game, GameId, GameSnapshot, MoveRecord, PlayerStatus,
    RoundRecord,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

type GameSlot = Arc<RwLock<Game>>;

/// Builds a [`GameRegistry`] from configuration plus optional collaborators
pub struct RegistryBuilder {
    config: ArenaConfig,
    store: Option<Arc<dyn GameStore>>,
    randomness: Option<Arc<dyn RandomnessSource>>,
    clock: Option<Arc<dyn Clock>>,
}

impl RegistryBuilder {
    pub fn store(mut self, store: Arc<dyn GameStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn randomness(mut self, randomness: Arc<dyn RandomnessSource>) -> Self {
        self.randomness = Some(randomness);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Empty registry
    pub fn build(self) -> ArenaResult<GameRegistry> {
        self.config.validate()?;

        let randomness: Arc<dyn RandomnessSource> =
            match (self.randomness, &self.config.randomness.secret_hex) {
                (Some(randomness), _) => randomness,
                (None, Some(secret)) => Arc::new(HashChainRandomness::from_hex(secret).map_err(
                    |reason| ConfigurationError::InvalidValue {
                        field: "randomness.secret_hex".to_string(),
                        value: "<redacted>".to_string(),
                        reason,
                    },
                )?),
                (None, None) => Arc::new(HashChainRandomness::new_random()),
            };
        let store: Arc<dyn GameStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryGameStore::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        Ok(GameRegistry {
            games: DashMap::new(),
            next_id: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            treasury: Mutex::new(Treasury::default()),
            store,
            randomness,
            clock,
            events: EventLog::new(self.config.events.broadcast_capacity),
            ledger: EscrowLedger::new(self.config.rules.platform_fee_bps),
            rules: self.config.rules,
            admin: self.config.admin.admin_address,
        })
    }

    /// Registry rebuilt from every game record in the store. Id assignment
    /// continues after the highest stored id.
    ///
    /// The event log is not restored: it starts empty and only carries
    /// transitions made after the restart.
    pub fn restore(self) -> ArenaResult<GameRegistry> {
        let registry = self.build()?;
        let games = registry.store.load_all()?;

        let mut treasury = Treasury {
            fees_withdrawn: registry
                .store
                .load_treasury()?
                .map(|t| t.fees_withdrawn)
                .unwrap_or(0),
            ..Default::default()
        };
        let mut next_id = 0;
        for game in games {
            if let Some(settlement) = &game.escrow.settlement {
                treasury.credit(settlement.retained());
                let paid = settlement.prize_per_winner * game.escrow.claimed.len() as Amount;
                treasury.record_payout(paid);
            }
            next_id = next_id.max(game.id + 1);
            registry.games.insert(game.id, Arc::new(RwLock::new(game)));
        }

        registry.next_id.store(next_id, Ordering::SeqCst);
        let fees_collected = treasury.fees_collected;
        *registry.treasury.lock().map_err(poisoned)? = treasury;

        info!(
            games = registry.games.len(),
            next_id,
            fees_collected = %fees_collected,
            "Registry restored from store"
        );
        Ok(registry)
    }
}

/// Owner of all games, indexed by id
pub struct GameRegistry {
    games: DashMap<GameId, GameSlot>,
    next_id: AtomicU64,
    paused: AtomicBool,
    treasury: Mutex<Treasury>,
    store: Arc<dyn GameStore>,
    randomness: Arc<dyn RandomnessSource>,
    clock: Arc<dyn Clock>,
    events: EventLog,
    ledger: EscrowLedger,
    rules: RulesConfig,
    admin: Address,
}

impl GameRegistry {
    pub fn builder(config: ArenaConfig) -> RegistryBuilder {
        RegistryBuilder {
            config,
            store: None,
            randomness: None,
            clock: None,
        }
    }

    /// Registry with default collaborators: in-memory store, system clock and
    /// randomness taken from the configuration
    pub fn new(config: ArenaConfig) -> ArenaResult<Self> {
        Self::builder(config).build()
    }

    // ---- lifecycle ----

    pub fn create_game(&self, request: CreateGameRequest) -> GameResult<GameId> {
        if self.is_paused() {
            return Err(GameError::SystemPaused);
        }
        validate_create(&request, &self.rules)?;

        let game_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (game, events) = new_game(game_id, &request, self.clock.now());
        self.store.save(&game).map_err(|e| {
            warn!(game_id, error = %e, "Failed to persist new game");
            e
        })?;

        let slot: GameSlot = Arc::new(RwLock::new(game));
        // Hold the game's lock until its creation events are in the log so
        // nothing about the game can be logged ahead of them.
        let _guard = slot.write().map_err(poisoned)?;
        self.games.insert(game_id, slot.clone());
        self.events.append_all(events)?;

        info!(
            game_id,
            creator = %request.creator,
            entry_fee = %request.entry_fee,
            max_players = request.max_players,
            "Game created"
        );
        Ok(game_id)
    }

    pub fn join_game(&self, game_id: GameId, player: &Address, stake: Amount) -> GameResult<()> {
        if self.rules.pause_blocks_joins && self.is_paused() {
            return Err(GameError::SystemPaused);
        }
        self.transition(game_id, |machine| machine.join(player, stake), |_| ())?;
        debug!(game_id, player = %player, "Player joined");
        Ok(())
    }

    pub fn start_game(&self, game_id: GameId, caller: &Address) -> GameResult<()> {
        self.transition(game_id, |machine| machine.start(caller), |_| ())
    }

    /// Probe one tile for the player on the clock and report what they found
    pub fn reveal_tile(&self, game_id: GameId, caller: &Address, x: u8, y: u8) -> GameResult<MoveRecord> {
        let last_move = self.transition(
            game_id,
            |machine| machine.reveal_tile(caller, x, y),
            |game| game.move_log.last().cloned(),
        )?;
        last_move.ok_or_else(|| {
            StorageError::CorruptedData(format!("game {} lost its move log", game_id)).into()
        })
    }

    pub fn skip_turn(&self, game_id: GameId, caller: &Address) -> GameResult<()> {
        self.transition(game_id, |machine| machine.skip_turn(caller), |_| ())
    }

    /// Pay out a winner's share. Claims stay open while the system is paused.
    pub fn claim_winnings(&self, game_id: GameId, caller: &Address) -> GameResult<Amount> {
        let amount = self.commit(game_id, |game, _now| {
            let amount = self.ledger.claim(game, caller)?;
            Ok((amount, Vec::new()))
        })?;

        self.treasury.lock().map_err(poisoned)?.record_payout(amount);
        info!(game_id, player = %caller, amount = %amount, "Winnings claimed");
        Ok(amount)
    }

    // ---- administration ----

    pub fn pause(&self, caller: &Address) -> GameResult<()> {
        self.require_admin(caller, "pause")?;
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!(by = %caller, "System paused");
        }
        Ok(())
    }

    pub fn unpause(&self, caller: &Address) -> GameResult<()> {
        self.require_admin(caller, "unpause")?;
        if self.paused.swap(false, Ordering::SeqCst) {
            info!(by = %caller, "System unpaused");
        }
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Move retained fees out of the treasury
    pub fn withdraw_fees(&self, caller: &Address, amount: Amount) -> GameResult<Amount> {
        self.require_admin(caller, "withdraw fees")?;

        let mut treasury = self.treasury.lock().map_err(poisoned)?;
        let mut updated = treasury.clone();
        let withdrawn = updated.withdraw(amount)?;
        self.store.save_treasury(&updated)?;
        *treasury = updated;

        info!(by = %caller, amount = %withdrawn, remaining = %treasury.available_fees(), "Fees withdrawn");
        Ok(withdrawn)
    }

    /// Fees and division remainders retained across all settled games
    pub fn total_fees_collected(&self) -> GameResult<Amount> {
        Ok(self.treasury.lock().map_err(poisoned)?.fees_collected)
    }

    pub fn treasury(&self) -> GameResult<Treasury> {
        Ok(self.treasury.lock().map_err(poisoned)?.clone())
    }

    // ---- queries ----

    pub fn snapshot(&self, game_id: GameId) -> GameResult<GameSnapshot> {
        self.read(game_id, Game::snapshot)
    }

    pub fn player_status(&self, game_id: GameId, player: &Address) -> GameResult<PlayerStatus> {
        self.read(game_id, |game| game.player_status(player))
    }

    pub fn game_moves(&self, game_id: GameId) -> GameResult<Vec<MoveRecord>> {
        self.read(game_id, |game| game.move_log.clone())
    }

    /// Whether `(x, y)` was probed during the current round
    pub fn is_tile_revealed(&self, game_id: GameId, x: u8, y: u8) -> GameResult<bool> {
        self.read(game_id, |game| {
            if x >= game.grid_size || y >= game.grid_size {
                return Err(GameError::OutOfBounds {
                    x,
                    y,
                    grid_size: game.grid_size,
                });
            }
            Ok(game.is_tile_revealed((x, y)))
        })?
    }

    /// Seeds and boards of completed rounds
    pub fn round_history(&self, game_id: GameId) -> GameResult<Vec<RoundRecord>> {
        self.read(game_id, |game| game.round_history.clone())
    }

    pub fn is_archivable(&self, game_id: GameId) -> GameResult<bool> {
        self.read(game_id, Game::is_archivable)
    }

    /// Ids of games that have not finished, ascending
    pub fn list_active_games(&self) -> Vec<GameId> {
        self.filter_games(|game| !game.finished())
    }

    /// Public lobbies that can still be joined, ascending
    pub fn list_open_public_games(&self) -> Vec<GameId> {
        self.filter_games(|game| {
            game.is_public
                && !game.started()
                && game.players.len() < usize::from(game.max_players)
        })
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ---- internals ----

    fn slot(&self, game_id: GameId) -> GameResult<GameSlot> {
        self.games
            .get(&game_id)
            .map(|entry| entry.value().clone())
            .ok_or(GameError::NotFound(game_id))
    }

    fn read<T>(&self, game_id: GameId, f: impl FnOnce(&Game) -> T) -> GameResult<T> {
        let slot = self.slot(game_id)?;
        let game = slot.read().map_err(poisoned)?;
        Ok(f(&game))
    }

    fn filter_games(&self, keep: impl Fn(&Game) -> bool) -> Vec<GameId> {
        // Collect first: a shard guard must not be held while waiting on a game lock.
        let slots: Vec<(GameId, GameSlot)> = self
            .games
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut ids: Vec<GameId> = slots
            .into_iter()
            .filter(|(_, slot)| slot.read().map(|game| keep(&*game)).unwrap_or(false))
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn require_admin(&self, caller: &Address, action: &str) -> GameResult<()> {
        if *caller != self.admin {
            warn!(caller = %caller, action, "Rejected privileged call");
            return Err(GameError::Unauthorized(format!("Only admin can {}", action)));
        }
        Ok(())
    }

    /// Run a state machine operation and read `extract` off the updated game
    fn transition<T, F, R>(&self, game_id: GameId, op: F, extract: R) -> GameResult<T>
    where
        F: FnOnce(GameStateMachine<'_>) -> GameResult<Vec<GameEvent>>,
        R: FnOnce(&Game) -> T,
    {
        self.commit(game_id, |game, now| {
            let events = op(GameStateMachine::new(game, self.randomness.as_ref(), &self.ledger, now))?;
            Ok((extract(game), events))
        })
    }

    /// Apply `op` to a copy of the game under its exclusive lock. The copy is
    /// persisted, then swapped in, then its events are logged; any failure
    /// before the swap leaves the game and the log as they were.
    fn commit<T, F>(&self, game_id: GameId, op: F) -> GameResult<T>
    where
        F: FnOnce(&mut Game, u64) -> GameResult<(T, Vec<GameEvent>)>,
    {
        let slot = self.slot(game_id)?;
        let mut game = slot.write().map_err(poisoned)?;

        let mut scratch = game.clone();
        let (value, events) = op(&mut scratch, self.clock.now())?;

        self.store.save(&scratch).map_err(|e| {
            warn!(game_id, error = %e, "Failed to persist game transition");
            e
        })?;

        let newly_retained = match (&scratch.escrow.settlement, game.finished()) {
            (Some(settlement), false) => Some(settlement.retained()),
            _ => None,
        };
        *game = scratch;

        if let Some(retained) = newly_retained {
            self.treasury.lock().map_err(poisoned)?.credit(retained);
        }
        if !events.is_empty() {
            self.events.append_all(events)?;
        }
        Ok(value)
    }
}
