//! Epoch-Keyed Reward Distribution Engine
//!
//! This crate implements the reward custody side of the AMM pair: rewards
//! deposited by rotating external sources are distributed exactly once per
//! period and claimed pro-rata by liquidity providers against a historical
//! balance snapshot ledger.

pub mod calculator;
pub mod claims;
pub mod constants;
pub mod custody;
pub mod distribution;
pub mod pair;
pub mod rotation;
pub mod snapshot;
pub mod sources;
pub mod state;
pub mod voting;

// Re-exports
pub use calculator::{apply_fee, pro_rata_share};
pub use claims::ClaimLedger;
pub use custody::RewardVault;
pub use distribution::DistributionLedger;
pub use pair::RewardPair;
pub use rotation::{SourceRange, SourceRegistry};
pub use snapshot::{Checkpoint, CheckpointHistory, SnapshotLedger};
pub use sources::{SourceDirectory, StaticSourceDirectory};
pub use state::{DistributionRecord, PeriodDistributed, UnclaimedReport, UnitOfWork};
pub use voting::{DelegationTarget, VoteBook};
