//! Lifecycle and turn engine for a single game
//!
//! `Open -> Active -> Finished`. While active the game cycles through rounds:
//! every player still standing at the start of a round moves exactly once, in
//! join order, against a freshly generated board with more mines than the last.

use crate::config::RulesConfig;
use crate::errors::{GameError, GameResult};
use crate::events::GameEvent;
use crate::games::board::{generate_board, round_mine_count, GridParams};
use crate::games::randomness::{RandomnessSource, SeedContext};
use crate::games::settlement::EscrowLedger;
use crate::games::types::{
    Address, Amount, CreateGameRequest, Escrow, Game, GameId, GameStatus, MoveRecord,
    RevealedTile, RoundRecord, RoundState,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Check `create_game` arguments against the configured rules
pub fn validate_create(request: &CreateGameRequest, rules: &RulesConfig) -> GameResult<()> {
    if request.max_players < rules.min_players || request.max_players > rules.max_players {
        return Err(GameError::InvalidParameters(format!(
            "Invalid player count {}, expected {}..={}",
            request.max_players, rules.min_players, rules.max_players
        )));
    }
    if request.turn_duration < rules.min_turn_duration_secs
        || request.turn_duration > rules.max_turn_duration_secs
    {
        return Err(GameError::InvalidParameters(format!(
            "Invalid turn duration {}s, expected {}..={}s",
            request.turn_duration, rules.min_turn_duration_secs, rules.max_turn_duration_secs
        )));
    }
    if request.entry_fee < rules.min_entry_fee {
        return Err(GameError::InvalidParameters(format!(
            "Entry fee {} below minimum {}",
            request.entry_fee, rules.min_entry_fee
        )));
    }
    if request
        .entry_fee
        .checked_mul(Amount::from(request.max_players))
        .is_none()
    {
        return Err(GameError::InvalidParameters(
            "Entry fee too large for a full lobby".to_string(),
        ));
    }
    if request.stake != request.entry_fee {
        return Err(GameError::IncorrectStake {
            expected: request.entry_fee,
            actual: request.stake,
        });
    }
    Ok(())
}

/// Build an open game with the creator seated and staked.
/// Arguments must already have passed [`validate_create`].
pub fn new_game(id: GameId, request: &CreateGameRequest, now: u64) -> (Game, Vec<GameEvent>) {
    let params = GridParams::for_max_players(request.max_players);
    let game = Game {
        id,
        creator: request.creator.clone(),
        players: vec![request.creator.clone()],
        entry_fee: request.entry_fee,
        prize_pool: request.entry_fee,
        max_players: request.max_players,
        turn_duration: request.turn_duration,
        is_public: request.is_public,
        grid_size: params.grid_size,
        base_mine_count: params.base_mine_count,
        created_at: now,
        status: GameStatus::Open,
        current_round: 1,
        current_player: None,
        turn_deadline: 0,
        round: RoundState::default(),
        eliminated: BTreeSet::new(),
        move_log: Vec::new(),
        round_history: Vec::new(),
        escrow: Escrow {
            balance: request.entry_fee,
            ..Default::default()
        },
    };

    let events = vec![
        GameEvent::GameCreated {
            game_id: id,
            creator: request.creator.clone(),
            entry_fee: request.entry_fee,
            max_players: request.max_players,
            is_public: request.is_public,
        },
        GameEvent::PlayerJoined {
            game_id: id,
            player: request.creator.clone(),
        },
    ];
    (game, events)
}

/// Applies one operation to a game and collects the events it produced.
///
/// Callers run it against a scratch copy of the game: a rejected operation may
/// leave the copy half-updated, and only a successful one is committed.
pub struct GameStateMachine<'a> {
    game: &'a mut Game,
    randomness: &'a dyn RandomnessSource,
    ledger: &'a EscrowLedger,
    now: u64,
    events: Vec<GameEvent>,
}

impl<'a> GameStateMachine<'a> {
    pub fn new(
        game: &'a mut Game,
        randomness: &'a dyn RandomnessSource,
        ledger: &'a EscrowLedger,
        now: u64,
    ) -> Self {
        Self {
            game,
            randomness,
            ledger,
            now,
            events: Vec::new(),
        }
    }

    pub fn join(mut self, player: &Address, stake: Amount) -> GameResult<Vec<GameEvent>> {
        if self.game.started() {
            return Err(GameError::AlreadyStarted);
        }
        if self.game.players.len() >= usize::from(self.game.max_players) {
            return Err(GameError::GameFull);
        }
        if self.game.is_player(player) {
            return Err(GameError::DuplicatePlayer);
        }

        self.ledger.accrue(self.game, stake)?;
        self.game.players.push(player.clone());
        self.events.push(GameEvent::PlayerJoined {
            game_id: self.game.id,
            player: player.clone(),
        });
        Ok(self.events)
    }

    pub fn start(mut self, caller: &Address) -> GameResult<Vec<GameEvent>> {
        if *caller != self.game.creator {
            return Err(GameError::Unauthorized(
                "Only creator can start".to_string(),
            ));
        }
        if self.game.players.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }
        if self.game.started() {
            return Err(GameError::AlreadyStarted);
        }

        self.game.status = GameStatus::Active;
        self.game.current_round = 1;
        self.events.push(GameEvent::GameStarted {
            game_id: self.game.id,
            timestamp: self.now,
        });
        self.begin_round(SeedContext::first_round(self.game.id));

        info!(
            game_id = self.game.id,
            players = self.game.players.len(),
            grid_size = self.game.grid_size,
            mines = self.game.round.mine_count,
            "Game started"
        );
        Ok(self.events)
    }

    pub fn reveal_tile(mut self, caller: &Address, x: u8, y: u8) -> GameResult<Vec<GameEvent>> {
        let index = self.authorize_current(caller)?;

        let grid_size = self.game.grid_size;
        if x >= grid_size || y >= grid_size {
            return Err(GameError::OutOfBounds { x, y, grid_size });
        }
        if self.game.is_tile_revealed((x, y)) {
            return Err(GameError::AlreadyRevealed { x, y });
        }

        let hit_mine = self.game.round.mines.contains(&(x, y));
        self.game.round.revealed.insert(
            (x, y),
            RevealedTile {
                player: caller.clone(),
                hit_mine,
            },
        );
        self.game.move_log.push(MoveRecord {
            player: caller.clone(),
            x,
            y,
            hit_mine,
            timestamp: self.now,
        });
        self.events.push(GameEvent::TileRevealed {
            game_id: self.game.id,
            player: caller.clone(),
            x,
            y,
            hit_mine,
        });

        if hit_mine {
            self.game.eliminated.insert(caller.clone());
            self.events.push(GameEvent::PlayerEliminated {
                game_id: self.game.id,
                player: caller.clone(),
            });
            info!(game_id = self.game.id, player = %caller, x, y, "Player eliminated");
        } else {
            debug!(game_id = self.game.id, player = %caller, x, y, "Safe tile revealed");
        }

        self.complete_turn(index)?;
        Ok(self.events)
    }

    /// The player on the clock may pass at any time. Once the deadline has
    /// passed, any player still in the game may force the pass.
    pub fn skip_turn(mut self, caller: &Address) -> GameResult<Vec<GameEvent>> {
        if self.game.status != GameStatus::Active {
            return Err(GameError::NotStarted);
        }
        let current = self.game.current_player.ok_or(GameError::NotStarted)?;
        let skipped = self.game.players[current].clone();

        if *caller != skipped {
            if !self.game.is_player(caller) || self.game.is_eliminated(caller) {
                return Err(GameError::Unauthorized(
                    "Only active players can skip a turn".to_string(),
                ));
            }
            if self.now <= self.game.turn_deadline {
                return Err(GameError::NotYourTurn);
            }
        }

        self.events.push(GameEvent::TurnSkipped {
            game_id: self.game.id,
            player: skipped.clone(),
        });
        debug!(game_id = self.game.id, player = %skipped, by = %caller, "Turn skipped");

        self.complete_turn(current)?;
        Ok(self.events)
    }

    fn authorize_current(&self, caller: &Address) -> GameResult<usize> {
        if self.game.status != GameStatus::Active {
            return Err(GameError::NotStarted);
        }
        match self.game.current_player {
            Some(index) if self.game.players[index] == *caller => Ok(index),
            _ => Err(GameError::NotYourTurn),
        }
    }

    fn begin_round(&mut self, ctx: SeedContext) {
        let game = &mut *self.game;
        let roster: Vec<usize> = (0..game.players.len())
            .filter(|&i| !game.eliminated.contains(&game.players[i]))
            .collect();

        let mine_count = round_mine_count(
            game.base_mine_count,
            game.current_round,
            game.grid_size,
            roster.len(),
        );
        let seed = self.randomness.round_seed(&ctx);
        let board = generate_board(seed, game.grid_size, mine_count);

        game.current_player = roster.first().copied();
        game.turn_deadline = self.now + game.turn_duration;
        game.round = RoundState {
            seed,
            mine_count,
            mines: board.mines,
            revealed: Default::default(),
            roster,
            moved: BTreeSet::new(),
            first_move: game.move_log.len(),
        };

        debug!(
            game_id = game.id,
            round = game.current_round,
            mines = mine_count,
            "Round board generated"
        );
    }

    fn complete_turn(&mut self, index: usize) -> GameResult<()> {
        let game = &mut *self.game;
        game.round.moved.insert(index);

        let next = game.round.roster.iter().copied().find(|&i| {
            i > index
                && !game.round.moved.contains(&i)
                && !game.eliminated.contains(&game.players[i])
        });

        match next {
            Some(next) => {
                game.current_player = Some(next);
                game.turn_deadline = self.now + game.turn_duration;
                Ok(())
            }
            None => self.complete_round(),
        }
    }

    fn complete_round(&mut self) -> GameResult<()> {
        let game = &mut *self.game;
        let round = game.current_round;

        self.events.push(GameEvent::RoundCompleted {
            game_id: game.id,
            round,
        });
        game.round_history.push(RoundRecord {
            round,
            seed: hex::encode(game.round.seed),
            mine_count: game.round.mine_count,
            mines: game.round.mines.clone(),
        });

        let survivors = game.active_players().len();
        if survivors <= 1 || round == u8::MAX {
            self.finish();
            return Ok(());
        }

        let ctx = SeedContext::next_round(
            game.id,
            round + 1,
            &game.round.seed,
            &game.move_log[game.round.first_move..],
        )?;
        game.current_round = round + 1;
        info!(game_id = game.id, round = round + 1, survivors, "Round advanced");
        self.begin_round(ctx);
        Ok(())
    }

    fn finish(&mut self) {
        self.game.status = GameStatus::Finished;
        self.game.current_player = None;

        let settlement = self.ledger.settle(self.game, self.now);
        info!(
            game_id = self.game.id,
            rounds = self.game.current_round,
            winners = settlement.winners.len(),
            "Game finished"
        );
        self.events.push(GameEvent::GameFinished {
            game_id: self.game.id,
            winners: settlement.winners,
            prize_per_winner: settlement.prize_per_winner,
        });
    }
}
