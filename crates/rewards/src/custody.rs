//! Custodial Reward Vault
//!
//! Single internal balance holding every distributed period's post-fee
//! rewards, plus accrued fee balances and credited payouts per account and
//! asset form. The pooled balance only decreases by exactly the amounts
//! credited.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pair_core::{Address, Amount, AssetForm, EngineError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardVault {
    /// Pooled custodial balance (base asset units)
    pooled: Amount,
    /// Deduction fees accrued per recipient, withdrawable on demand
    fees_accrued: HashMap<Address, Amount>,
    /// Payouts credited per (account, asset form)
    credited: HashMap<(Address, AssetForm), Amount>,
}

impl RewardVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a post-fee distribution amount into custody
    pub fn deposit(&mut self, amount: Amount) -> Result<()> {
        self.pooled = self
            .pooled
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: "custody balance overflow".into(),
            })?;
        Ok(())
    }

    /// Accrue a deducted fee for `recipient`
    pub fn accrue_fee(&mut self, recipient: &Address, amount: Amount) -> Result<()> {
        let entry = self.fees_accrued.entry(recipient.clone()).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("fee accrual overflow for {}", recipient),
            })?;
        Ok(())
    }

    /// Pay `amount` from the pool to `recipient` in the requested form
    pub fn pay(&mut self, recipient: &Address, amount: Amount, form: AssetForm) -> Result<()> {
        if amount > self.pooled {
            return Err(EngineError::InsufficientCustody {
                required: amount,
                available: self.pooled,
            });
        }
        let key = (recipient.clone(), form);
        let credited = self
            .credited
            .get(&key)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("credited amount overflow for {}", recipient),
            })?;
        self.pooled -= amount;
        self.credited.insert(key, credited);
        Ok(())
    }

    /// Withdraw every fee accrued for `recipient`, returning the amount
    pub fn withdraw_fees(&mut self, recipient: &Address) -> Amount {
        self.fees_accrued.remove(recipient).unwrap_or(0)
    }

    pub fn pooled(&self) -> Amount {
        self.pooled
    }

    pub fn fee_balance(&self, recipient: &Address) -> Amount {
        self.fees_accrued.get(recipient).copied().unwrap_or(0)
    }

    /// Amount credited to `account` in `form` so far
    pub fn credited(&self, account: &Address, form: AssetForm) -> Amount {
        self.credited
            .get(&(account.clone(), form))
            .copied()
            .unwrap_or(0)
    }
}
