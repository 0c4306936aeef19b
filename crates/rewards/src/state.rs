//! Engine State Types
//!
//! Shared records, reports, events, and the per-call unit-of-work guard.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use pair_core::{Address, Amount, BlockHeight, EngineError, Period, Result};

/// Per-period distribution record.
///
/// Created lazily when a period is first distributed. `total_amount` may
/// still grow through the top-up path when a source registered later covers
/// an already-distributed period; it is never reduced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionRecord {
    /// Post-fee amount moved into custody for this period
    pub total_amount: Amount,
    /// Block whose snapshot weighs claims for this period
    pub snapshot_block: BlockHeight,
    /// Set exactly once; re-distribution is a no-op unless a new source appears
    pub distributed: bool,
    /// Sources already pulled for this period (dedup for the top-up path)
    pub pulled: Vec<Address>,
}

impl DistributionRecord {
    pub fn was_pulled(&self, source: &Address) -> bool {
        self.pulled.iter().any(|s| s == source)
    }
}

/// Event emitted once per period actually newly distributed (or topped up)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDistributed {
    pub period: Period,
    /// Post-fee amount forwarded into custody by this call
    pub amount: Amount,
    /// Invoking caller
    pub caller: Address,
}

/// Per-account unclaimed reward report, one slot per period in the
/// active window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnclaimedReport {
    pub periods: Vec<Period>,
    /// Unclaimed entitlement per period
    pub amounts: Vec<Amount>,
    /// Distributed pool total per period
    pub totals: Vec<Amount>,
}

/// Atomic unit-of-work context, threaded through every state-changing call
/// batch.
///
/// Records which accounts committed a provider change inside this unit so
/// a balance-decreasing operation for the same account can be rejected
/// before it lets an attacker vote, redirect rewards, and exit atomically.
/// Sequential calls each get a fresh unit, so the same two operations split
/// across calls are permitted.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    provider_changes: HashSet<Address>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `account` as having committed a provider change in this unit
    pub fn note_provider_change(&mut self, account: &Address) {
        self.provider_changes.insert(account.clone());
    }

    pub fn had_provider_change(&self, account: &Address) -> bool {
        self.provider_changes.contains(account)
    }

    /// Reject a balance decrease for an account that already redirected
    /// providers inside this unit
    pub fn assert_can_decrease(&self, account: &Address) -> Result<()> {
        if self.had_provider_change(account) {
            return Err(EngineError::FlashAttack {
                account: account.clone(),
            });
        }
        Ok(())
    }
}
