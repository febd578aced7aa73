//! Escrow and settlement
//!
//! Stakes accrue into a per-game escrow while the game is open. When the game
//! finishes the pool is split once: the platform fee and the integer-division
//! remainder are retained by the house, the rest is divided evenly among the
//! surviving players, who then claim their share individually.

use crate::errors::{GameError, GameResult};
use crate::games::types::{Address, Amount, Game, GameStatus, Settlement};
use serde::{Deserialize, Serialize};

const BPS_DENOMINATOR: Amount = 10_000;

/// How a pool is divided between winners and the house
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSplit {
    pub prize_per_winner: Amount,
    pub platform_fee: Amount,
    pub remainder: Amount,
}

/// Floor division throughout: winners never receive a rounded-up share.
///
/// `distributable = floor(pool * (10000 - fee_bps) / 10000)`, split evenly.
/// With zero winners nothing is distributed and the whole pool is retained.
pub fn split_pool(pool: Amount, winners: usize, platform_fee_bps: u16) -> PoolSplit {
    let keep_bps = BPS_DENOMINATOR - Amount::from(platform_fee_bps.min(10_000));
    let distributable = match pool.checked_mul(keep_bps) {
        Some(scaled) => scaled / BPS_DENOMINATOR,
        None => pool / BPS_DENOMINATOR * keep_bps + pool % BPS_DENOMINATOR * keep_bps / BPS_DENOMINATOR,
    };
    let platform_fee = pool - distributable;

    if winners == 0 {
        return PoolSplit {
            prize_per_winner: 0,
            platform_fee,
            remainder: distributable,
        };
    }

    let winners = winners as Amount;
    let prize_per_winner = distributable / winners;
    PoolSplit {
        prize_per_winner,
        platform_fee,
        remainder: distributable - prize_per_winner * winners,
    }
}

/// Stake intake, settlement and claims over a game's escrow
#[derive(Debug, Clone, Copy)]
pub struct EscrowLedger {
    platform_fee_bps: u16,
}

impl EscrowLedger {
    pub fn new(platform_fee_bps: u16) -> Self {
        Self { platform_fee_bps }
    }

    /// Take one entry stake into an open game
    pub fn accrue(&self, game: &mut Game, stake: Amount) -> GameResult<()> {
        if game.status != GameStatus::Open {
            return Err(GameError::AlreadyStarted);
        }
        if stake != game.entry_fee {
            return Err(GameError::IncorrectStake {
                expected: game.entry_fee,
                actual: stake,
            });
        }

        let overflow = || GameError::InvalidParameters("prize pool overflow".to_string());
        game.prize_pool = game.prize_pool.checked_add(stake).ok_or_else(overflow)?;
        game.escrow.balance = game.escrow.balance.checked_add(stake).ok_or_else(overflow)?;
        Ok(())
    }

    /// Split the pool among the surviving players. Runs once per game, when it
    /// finishes; the retained part leaves the game's escrow immediately.
    pub fn settle(&self, game: &mut Game, now: u64) -> Settlement {
        let winners: Vec<Address> = game.active_players().into_iter().cloned().collect();
        let split = split_pool(game.prize_pool, winners.len(), self.platform_fee_bps);

        let settlement = Settlement {
            winners,
            prize_per_winner: split.prize_per_winner,
            platform_fee: split.platform_fee,
            remainder: split.remainder,
            settled_at: now,
        };

        game.escrow.balance = game.escrow.balance.saturating_sub(settlement.retained());
        game.escrow.unclaimed_winners = settlement.winners.len() as u32;
        game.escrow.settlement = Some(settlement.clone());

        tracing::info!(
            game_id = game.id,
            winners = settlement.winners.len(),
            prize_per_winner = %settlement.prize_per_winner,
            retained = %settlement.retained(),
            "Game settled"
        );
        settlement
    }

    /// Pay a winner their share. A second claim fails and pays nothing.
    pub fn claim(&self, game: &mut Game, caller: &Address) -> GameResult<Amount> {
        if game.status != GameStatus::Finished {
            return Err(GameError::NotFinished);
        }
        let Some(settlement) = game.escrow.settlement.as_ref() else {
            return Err(GameError::NotFinished);
        };
        if !settlement.winners.contains(caller) {
            return Err(GameError::NotAWinner);
        }
        if game.escrow.claimed.contains(caller) {
            return Err(GameError::AlreadyClaimed);
        }

        let amount = settlement.prize_per_winner;
        game.escrow.balance = game.escrow.balance.checked_sub(amount).ok_or_else(|| {
            GameError::Storage(crate::errors::StorageError::CorruptedData(format!(
                "escrow of game {} cannot cover a {} payout",
                game.id, amount
            )))
        })?;
        game.escrow.claimed.insert(caller.clone());
        game.escrow.unclaimed_winners = game.escrow.unclaimed_winners.saturating_sub(1);

        Ok(amount)
    }
}

/// House account across all games
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Treasury {
    /// Fees and remainders retained at settlement
    pub fees_collected: Amount,
    pub fees_withdrawn: Amount,
    /// Winnings paid out through claims
    pub total_paid_out: Amount,
}

impl Treasury {
    pub fn available_fees(&self) -> Amount {
        self.fees_collected - self.fees_withdrawn
    }

    pub fn credit(&mut self, retained: Amount) {
        self.fees_collected = self.fees_collected.saturating_add(retained);
    }

    pub fn record_payout(&mut self, amount: Amount) {
        self.total_paid_out = self.total_paid_out.saturating_add(amount);
    }

    pub fn withdraw(&mut self, amount: Amount) -> GameResult<Amount> {
        if amount > self.available_fees() {
            return Err(GameError::InvalidParameters(format!(
                "withdrawal of {} exceeds available fees {}",
                amount,
                self.available_fees()
            )));
        }
        self.fees_withdrawn += amount;
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::state_machine::new_game;
    use crate::games::types::CreateGameRequest;

    const FEE: Amount = 10_000_000_000_000_000; // 0.01 ETH

    fn open_game() -> Game {
        let request = CreateGameRequest {
            creator: Address::new("0xa"),
            entry_fee: FEE,
            max_players: 3,
            turn_duration: 15,
            is_public: true,
            stake: FEE,
        };
        new_game(0, &request, 0).0
    }

    #[test]
    fn test_split_single_winner() {
        let split = split_pool(2 * FEE, 1, 100);
        assert_eq!(split.prize_per_winner, 19_800_000_000_000_000);
        assert_eq!(split.platform_fee, 200_000_000_000_000);
        assert_eq!(split.remainder, 0);
    }

    #[test]
    fn test_split_floors_and_retains_remainder() {
        // 99% of 1000 = 990, 990 / 7 = 141 r 3
        let split = split_pool(1000, 7, 100);
        assert_eq!(split.prize_per_winner, 141);
        assert_eq!(split.platform_fee, 10);
        assert_eq!(split.remainder, 3);
        assert_eq!(split.prize_per_winner * 7 + split.platform_fee + split.remainder, 1000);
    }

    #[test]
    fn test_split_floors_fractional_distributable() {
        // 99% of 101 = 99.99 -> 99 distributable
        let split = split_pool(101, 1, 100);
        assert_eq!(split.prize_per_winner, 99);
        assert_eq!(split.platform_fee, 2);
    }

    #[test]
    fn test_split_zero_winners_retains_everything() {
        let split = split_pool(3 * FEE, 0, 100);
        assert_eq!(split.prize_per_winner, 0);
        assert_eq!(split.platform_fee + split.remainder, 3 * FEE);
    }

    #[test]
    fn test_split_huge_pool_does_not_overflow() {
        let split = split_pool(Amount::MAX, 1, 100);
        assert!(split.prize_per_winner < Amount::MAX);
        assert_eq!(split.prize_per_winner + split.platform_fee, Amount::MAX);
    }

    #[test]
    fn test_accrue_rejects_wrong_stake() {
        let ledger = EscrowLedger::new(100);
        let mut game = open_game();
        let before = game.clone();

        let err = ledger.accrue(&mut game, 2 * FEE).unwrap_err();
        assert_eq!(err, GameError::IncorrectStake { expected: FEE, actual: 2 * FEE });
        assert_eq!(game, before);
    }

    #[test]
    fn test_accrue_rejects_started_game() {
        let ledger = EscrowLedger::new(100);
        let mut game = open_game();
        game.status = GameStatus::Active;
        assert_eq!(ledger.accrue(&mut game, FEE), Err(GameError::AlreadyStarted));
    }

    #[test]
    fn test_claim_is_idempotent() {
        let ledger = EscrowLedger::new(100);
        let mut game = open_game();
        game.players.push(Address::new("0xb"));
        ledger.accrue(&mut game, FEE).unwrap();
        game.eliminated.insert(Address::new("0xb"));
        game.status = GameStatus::Finished;
        ledger.settle(&mut game, 99);

        let winner = Address::new("0xa");
        let pool = game.prize_pool;
        assert_eq!(ledger.claim(&mut game, &winner).unwrap(), 19_800_000_000_000_000);
        assert_eq!(ledger.claim(&mut game, &winner), Err(GameError::AlreadyClaimed));
        assert_eq!(game.prize_pool, pool);
        assert_eq!(game.escrow.balance, 0);
        assert_eq!(game.escrow.unclaimed_winners, 0);

        assert_eq!(
            ledger.claim(&mut game, &Address::new("0xb")),
            Err(GameError::NotAWinner)
        );
        assert_eq!(
            ledger.claim(&mut game, &Address::new("0xstranger")),
            Err(GameError::NotAWinner)
        );
    }

    #[test]
    fn test_claim_before_finish() {
        let ledger = EscrowLedger::new(100);
        let mut game = open_game();
        assert_eq!(
            ledger.claim(&mut game, &Address::new("0xa")),
            Err(GameError::NotFinished)
        );
    }

    #[test]
    fn test_treasury_withdraw_bounds() {
        let mut treasury = Treasury::default();
        treasury.credit(50);
        assert!(treasury.withdraw(60).is_err());
        assert_eq!(treasury.withdraw(20).unwrap(), 20);
        assert_eq!(treasury.available_fees(), 30);
    }
}
