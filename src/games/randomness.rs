use crate::errors::StorageError;
use crate::games::types::{GameId, MoveRecord};
use sha2::{Digest, Sha256};

const ROUND_SEED_DOMAIN: &[u8] = b"mine-arena/round-seed/v1";
const ROUND_DIGEST_DOMAIN: &[u8] = b"mine-arena/round-digest/v1";

/// Inputs that identify one round's board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedContext {
    pub game_id: GameId,
    pub round: u8,
    /// Digest of everything that happened in the previous round
    pub previous_digest: [u8; 32],
}

impl SeedContext {
    /// Context of a game's first round; there is no history to chain from yet
    pub fn first_round(game_id: GameId) -> Self {
        Self {
            game_id,
            round: 1,
            previous_digest: [0u8; 32],
        }
    }

    /// Context of the round that follows a completed one
    pub fn next_round(
        game_id: GameId,
        round: u8,
        previous_seed: &[u8; 32],
        previous_moves: &[MoveRecord],
    ) -> Result<Self, StorageError> {
        Ok(Self {
            game_id,
            round,
            previous_digest: round_digest(previous_seed, previous_moves)?,
        })
    }
}

/// Digest of a completed round: its seed chained with its move records
pub fn round_digest(seed: &[u8; 32], moves: &[MoveRecord]) -> Result<[u8; 32], StorageError> {
    let encoded = bincode::serialize(moves)?;

    let mut hasher = Sha256::new();
    hasher.update(ROUND_DIGEST_DOMAIN);
    hasher.update(seed);
    hasher.update(&encoded);
    Ok(hasher.finalize().into())
}

/// Supplies per-round board seeds
pub trait RandomnessSource: Send + Sync {
    fn round_seed(&self, ctx: &SeedContext) -> [u8; 32];
}

/// Hash chain over a server-held secret, the game id, the round number and the
/// previous round's digest.
///
/// Players cannot predict a board without the secret, and the board is fixed
/// before the first turn of the round, so no move can steer it. Publishing the
/// secret after the fact lets anyone replay every board with [`generate_board`].
///
/// [`generate_board`]: crate::games::board::generate_board
#[derive(Clone)]
pub struct HashChainRandomness {
    secret: [u8; 32],
}

impl HashChainRandomness {
    pub fn with_secret(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    /// Random secret from the OS
    pub fn new_random() -> Self {
        Self::with_secret(rand::random())
    }

    pub fn from_hex(secret_hex: &str) -> Result<Self, String> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|e| format!("Invalid secret hex: {}", e))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "Secret must be 32 bytes".to_string())?;
        Ok(Self::with_secret(secret))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret)
    }
}

impl std::fmt::Debug for HashChainRandomness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashChainRandomness").finish_non_exhaustive()
    }
}

impl RandomnessSource for HashChainRandomness {
    fn round_seed(&self, ctx: &SeedContext) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(ROUND_SEED_DOMAIN);
        hasher.update(self.secret);
        hasher.update(ctx.game_id.to_be_bytes());
        hasher.update([ctx.round]);
        hasher.update(ctx.previous_digest);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::Address;

    fn sample_move(hit_mine: bool) -> MoveRecord {
        MoveRecord {
            player: Address::new("0xaa"),
            x: 1,
            y: 2,
            hit_mine,
            timestamp: 10,
        }
    }

    #[test]
    fn test_round_seed_deterministic() {
        let source = HashChainRandomness::with_secret([7u8; 32]);
        let ctx = SeedContext::first_round(3);
        assert_eq!(source.round_seed(&ctx), source.round_seed(&ctx));
    }

    #[test]
    fn test_round_seed_depends_on_every_input() {
        let source = HashChainRandomness::with_secret([7u8; 32]);
        let base = SeedContext::first_round(3);
        let seed = source.round_seed(&base);

        assert_ne!(seed, source.round_seed(&SeedContext { game_id: 4, ..base }));
        assert_ne!(seed, source.round_seed(&SeedContext { round: 2, ..base }));
        assert_ne!(
            seed,
            source.round_seed(&SeedContext {
                previous_digest: [1u8; 32],
                ..base
            })
        );
        assert_ne!(seed, HashChainRandomness::with_secret([8u8; 32]).round_seed(&base));
    }

    #[test]
    fn test_round_digest_reflects_outcomes() {
        let seed = [9u8; 32];
        let safe = round_digest(&seed, &[sample_move(false)]).unwrap();
        let boom = round_digest(&seed, &[sample_move(true)]).unwrap();
        assert_ne!(safe, boom);
        assert_eq!(safe, round_digest(&seed, &[sample_move(false)]).unwrap());
    }

    #[test]
    fn test_next_round_chains_previous_digest() {
        let seed = [9u8; 32];
        let moves = [sample_move(false), sample_move(true)];
        let ctx = SeedContext::next_round(5, 2, &seed, &moves).unwrap();
        assert_eq!(ctx.game_id, 5);
        assert_eq!(ctx.round, 2);
        assert_eq!(ctx.previous_digest, round_digest(&seed, &moves).unwrap());

        // A round where every player passed still chains the seed.
        let empty = SeedContext::next_round(5, 2, &seed, &[]).unwrap();
        assert_ne!(empty.previous_digest, [0u8; 32]);
        assert_ne!(empty.previous_digest, ctx.previous_digest);
    }

    #[test]
    fn test_secret_hex_round_trip() {
        let source = HashChainRandomness::with_secret([0xab; 32]);
        let restored = HashChainRandomness::from_hex(&source.secret_hex()).unwrap();
        let ctx = SeedContext::first_round(1);
        assert_eq!(source.round_seed(&ctx), restored.round_seed(&ctx));
        assert!(HashChainRandomness::from_hex("abcd").is_err());
    }
}
