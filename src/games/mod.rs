pub mod board;
pub mod randomness;
pub mod settlement;
pub mod state_machine;
pub mod types;

pub use board::{generate_board, round_mine_count, Board, GridParams};
pub use randomness::{HashChainRandomness, RandomnessSource, SeedContext};
pub use settlement::{split_pool, EscrowLedger, PoolSplit, Treasury};
pub use state_machine::GameStateMachine;
pub use types::*;
