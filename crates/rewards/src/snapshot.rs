//! Snapshot Ledger
//!
//! Append-only per-account checkpoint history of balance over time plus a
//! parallel total-supply history. Answers "balance of X at block B" by
//! binary search; appends are O(1) amortized, lookups O(log n).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pair_core::{Address, Amount, BlockHeight, EngineError, Result};

/// A recorded `(block, value)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block: BlockHeight,
    pub value: Amount,
}

/// Strictly block-increasing, append-only checkpoint sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointHistory {
    entries: Vec<Checkpoint>,
}

impl CheckpointHistory {
    /// Append `value` at `block`. A second write at the tail block replaces
    /// the tail value so the strict-increase invariant holds; writes at
    /// earlier blocks are rejected.
    pub fn push(&mut self, block: BlockHeight, value: Amount) -> Result<()> {
        match self.entries.last_mut() {
            Some(tail) if tail.block == block => {
                tail.value = value;
                Ok(())
            }
            Some(tail) if tail.block > block => Err(EngineError::InvalidInput {
                reason: format!("checkpoint block {} precedes tail block {}", block, tail.block),
            }),
            _ => {
                self.entries.push(Checkpoint { block, value });
                Ok(())
            }
        }
    }

    /// Value at the greatest recorded block `<= at_block`; 0 before the
    /// first checkpoint, and 0 for block 0 by convention (the "no
    /// historical weighting" sentinel).
    pub fn value_at(&self, at_block: BlockHeight) -> Amount {
        if at_block == 0 {
            return 0;
        }
        match self.entries.binary_search_by(|c| c.block.cmp(&at_block)) {
            Ok(i) => self.entries[i].value,
            Err(0) => 0,
            Err(i) => self.entries[i - 1].value,
        }
    }

    /// Live (tail) value
    pub fn latest(&self) -> Amount {
        self.entries.last().map(|c| c.value).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Historical-balance ledger for all accounts plus total supply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotLedger {
    accounts: HashMap<Address, CheckpointHistory>,
    total: CheckpointHistory,
}

impl SnapshotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `account`'s new balance at `at_block`, appending a
    /// total-supply checkpoint when the implied total changed.
    ///
    /// No-op when the balance is unchanged; checkpoints are only written
    /// on actual mutation.
    pub fn record_balance(
        &mut self,
        account: &Address,
        new_balance: Amount,
        at_block: BlockHeight,
    ) -> Result<()> {
        let history = self.accounts.entry(account.clone()).or_default();
        let old_balance = history.latest();
        if old_balance == new_balance {
            return Ok(());
        }
        history.push(at_block, new_balance)?;

        let old_total = self.total.latest();
        let new_total = old_total
            .checked_sub(old_balance)
            .and_then(|t| t.checked_add(new_balance))
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!(
                    "total supply arithmetic overflow at block {} for {}",
                    at_block, account
                ),
            })?;
        if new_total != old_total {
            self.total.push(at_block, new_total)?;
        }
        Ok(())
    }

    /// Balance of `account` at `at_block`; pure read, no side effects
    pub fn balance_at(&self, account: &Address, at_block: BlockHeight) -> Amount {
        self.accounts
            .get(account)
            .map(|h| h.value_at(at_block))
            .unwrap_or(0)
    }

    /// Total supply at `at_block`
    pub fn total_at(&self, at_block: BlockHeight) -> Amount {
        self.total.value_at(at_block)
    }

    /// Live balance of `account`
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.accounts.get(account).map(|h| h.latest()).unwrap_or(0)
    }

    /// Live total supply
    pub fn total_supply(&self) -> Amount {
        self.total.latest()
    }

    /// Number of checkpoints recorded for `account`
    pub fn checkpoint_count(&self, account: &Address) -> usize {
        self.accounts.get(account).map(|h| h.len()).unwrap_or(0)
    }
}
