//! Claim Ledger
//!
//! Per (account, period) record of how much of a distributed pool the
//! account already claimed, plus the executor permission table for
//! delegated claims. Entitlements are computed on demand from the snapshot
//! ledger and never revised downward.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pair_core::{
    Address, Amount, EngineConfig, EngineError, ExecutorPermission, Period, Result,
};

use crate::calculator;
use crate::distribution::DistributionLedger;
use crate::snapshot::SnapshotLedger;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimLedger {
    /// Cumulative claimed amount per (account, period)
    claimed: HashMap<(Address, Period), Amount>,
    /// Permission granted per (owner, executor)
    executors: HashMap<(Address, Address), ExecutorPermission>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claimed(&self, account: &Address, period: Period) -> Amount {
        self.claimed
            .get(&(account.clone(), period))
            .copied()
            .unwrap_or(0)
    }

    /// Record `amount` as claimed; cumulative, never reduced
    pub fn record_claim(&mut self, account: &Address, period: Period, amount: Amount) {
        if amount == 0 {
            return;
        }
        *self
            .claimed
            .entry((account.clone(), period))
            .or_insert(0) += amount;
    }

    pub fn set_executor(
        &mut self,
        owner: &Address,
        executor: &Address,
        permission: ExecutorPermission,
    ) {
        if permission == ExecutorPermission::None {
            self.executors.remove(&(owner.clone(), executor.clone()));
        } else {
            self.executors
                .insert((owner.clone(), executor.clone()), permission);
        }
    }

    pub fn executor_permission(&self, owner: &Address, executor: &Address) -> ExecutorPermission {
        self.executors
            .get(&(owner.clone(), executor.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Check `caller` may claim `account`'s rewards paying out to
    /// `recipient`: the account itself always may, an executor needs a
    /// sufficient permission level.
    pub fn authorize(&self, account: &Address, caller: &Address, recipient: &Address) -> Result<()> {
        if caller == account {
            return Ok(());
        }
        match self.executor_permission(account, caller) {
            ExecutorPermission::AnyAddress => Ok(()),
            ExecutorPermission::OwnerOnly if recipient == account => Ok(()),
            _ => Err(EngineError::Forbidden {
                reason: format!("{} is not an authorized executor for {}", caller, account),
            }),
        }
    }

    /// Whether `period` fell out of the retention window at the upstream's
    /// `current_period`. Expired unclaimed rewards collapse to zero.
    pub fn is_expired(config: &EngineConfig, period: Period, current_period: Period) -> bool {
        config.retention_periods > 0
            && current_period.saturating_sub(period) > config.retention_periods
    }

    /// Unclaimed entitlement of `account` for `period`:
    ///
    /// total * balance_at(snapshot) / total_at(snapshot) - claimed, floor
    ///
    /// Zero when the period is undistributed, expired, or the account had
    /// zero historical weight.
    pub fn unclaimed_for(
        &self,
        distribution: &DistributionLedger,
        snapshots: &SnapshotLedger,
        config: &EngineConfig,
        account: &Address,
        period: Period,
    ) -> Amount {
        let Some(record) = distribution.record(period) else {
            return 0;
        };
        if !record.distributed {
            return 0;
        }
        if Self::is_expired(config, period, distribution.current_period()) {
            return 0;
        }
        let balance = snapshots.balance_at(account, record.snapshot_block);
        let supply = snapshots.total_at(record.snapshot_block);
        let entitled = calculator::pro_rata_share(record.total_amount, balance, supply);
        entitled.saturating_sub(self.claimed(account, period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::RewardVault;
    use crate::rotation::SourceRegistry;
    use crate::sources::StaticSourceDirectory;
    use pair_core::FeeConfig;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn distributed_fixture(amount: Amount) -> (DistributionLedger, SnapshotLedger) {
        let mut registry = SourceRegistry::default();
        registry.install(addr("aaaa"), 0).unwrap();
        let mut dir = StaticSourceDirectory::new();
        dir.declare(&addr("aaaa"), 0, amount);

        let mut snapshots = SnapshotLedger::new();
        snapshots.record_balance(&addr("ww"), 1, 10).unwrap();
        snapshots.record_balance(&addr("oo"), 3, 10).unwrap();

        let mut ledger = DistributionLedger::new();
        ledger.note_period(0, 10).unwrap();
        let mut vault = RewardVault::new();
        ledger
            .distribute(
                &addr("0a17"),
                0,
                0,
                &registry,
                &dir,
                &FeeConfig::new(0, addr("fefe")),
                &mut vault,
                &addr("cc"),
            )
            .unwrap();
        (ledger, snapshots)
    }

    #[test]
    fn test_unclaimed_pro_rata_split() {
        let (distribution, snapshots) = distributed_fixture(100);
        let claims = ClaimLedger::new();
        let config = EngineConfig::default();

        assert_eq!(
            claims.unclaimed_for(&distribution, &snapshots, &config, &addr("ww"), 0),
            25
        );
        assert_eq!(
            claims.unclaimed_for(&distribution, &snapshots, &config, &addr("oo"), 0),
            75
        );
        // Accounts with no historical weight get nothing
        assert_eq!(
            claims.unclaimed_for(&distribution, &snapshots, &config, &addr("zz"), 0),
            0
        );
    }

    #[test]
    fn test_unclaimed_zero_when_undistributed() {
        let (distribution, snapshots) = distributed_fixture(100);
        let claims = ClaimLedger::new();
        let config = EngineConfig::default();
        // Period 1 was never distributed
        assert_eq!(
            claims.unclaimed_for(&distribution, &snapshots, &config, &addr("oo"), 1),
            0
        );
    }

    #[test]
    fn test_claim_record_decreases_unclaimed() {
        let (distribution, snapshots) = distributed_fixture(100);
        let mut claims = ClaimLedger::new();
        let config = EngineConfig::default();

        claims.record_claim(&addr("oo"), 0, 75);
        assert_eq!(
            claims.unclaimed_for(&distribution, &snapshots, &config, &addr("oo"), 0),
            0
        );
        assert_eq!(claims.claimed(&addr("oo"), 0), 75);
    }

    #[test]
    fn test_expired_period_collapses_to_zero() {
        let (mut distribution, snapshots) = distributed_fixture(100);
        let claims = ClaimLedger::new();
        let config = EngineConfig {
            retention_periods: 2,
            ..EngineConfig::default()
        };

        distribution.note_period(2, 40).unwrap();
        assert_eq!(
            claims.unclaimed_for(&distribution, &snapshots, &config, &addr("oo"), 0),
            75
        );

        // Counter moves past the retention window: period 0 collapses
        distribution.note_period(3, 50).unwrap();
        assert_eq!(
            claims.unclaimed_for(&distribution, &snapshots, &config, &addr("oo"), 0),
            0
        );
    }

    #[test]
    fn test_executor_permissions() {
        let mut claims = ClaimLedger::new();
        let owner = addr("aa");
        let executor = addr("bb");
        let other = addr("cc");

        // Owner always may, unknown executors never
        assert!(claims.authorize(&owner, &owner, &other).is_ok());
        let err = claims.authorize(&owner, &executor, &owner).unwrap_err();
        assert_eq!(err.error_code(), "forbidden");

        // OwnerOnly pays out to the owner only
        claims.set_executor(&owner, &executor, ExecutorPermission::OwnerOnly);
        assert!(claims.authorize(&owner, &executor, &owner).is_ok());
        assert!(claims.authorize(&owner, &executor, &other).is_err());

        // AnyAddress lifts the recipient restriction
        claims.set_executor(&owner, &executor, ExecutorPermission::AnyAddress);
        assert!(claims.authorize(&owner, &executor, &other).is_ok());

        // Revocation falls back to None
        claims.set_executor(&owner, &executor, ExecutorPermission::None);
        assert!(claims.authorize(&owner, &executor, &owner).is_err());
    }

    #[test]
    fn test_claim_conservation_bound() {
        // 100 split over weights 1/3/3 of 7: floor losses stay below the
        // number of accounts
        let mut registry = SourceRegistry::default();
        registry.install(addr("aaaa"), 0).unwrap();
        let mut dir = StaticSourceDirectory::new();
        dir.declare(&addr("aaaa"), 0, 100);

        let mut snapshots = SnapshotLedger::new();
        snapshots.record_balance(&addr("a1"), 1, 10).unwrap();
        snapshots.record_balance(&addr("a2"), 3, 10).unwrap();
        snapshots.record_balance(&addr("a3"), 3, 10).unwrap();

        let mut distribution = DistributionLedger::new();
        distribution.note_period(0, 10).unwrap();
        let mut vault = RewardVault::new();
        distribution
            .distribute(
                &addr("0a17"),
                0,
                0,
                &registry,
                &dir,
                &FeeConfig::new(0, addr("fefe")),
                &mut vault,
                &addr("cc"),
            )
            .unwrap();

        let claims = ClaimLedger::new();
        let config = EngineConfig::default();
        let sum: Amount = [addr("a1"), addr("a2"), addr("a3")]
            .iter()
            .map(|a| claims.unclaimed_for(&distribution, &snapshots, &config, a, 0))
            .sum();
        let total = distribution.distributed_total(0);
        assert!(sum <= total);
        assert!(total - sum < 3);
    }
}
