//! Distribution Ledger
//!
//! Pulls each period's declared reward from every covering source, applies
//! the deduction fee, moves the post-fee amount into custody, and marks the
//! period distributed exactly once. Re-distribution is a silent no-op
//! unless a source registered later covers an already-settled period (the
//! top-up path).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pair_core::{
    constants::BPS_DENOM, Address, Amount, BlockHeight, EngineError, FeePolicy, Period, Result,
};

use crate::calculator;
use crate::custody::RewardVault;
use crate::rotation::SourceRegistry;
use crate::sources::SourceDirectory;
use crate::state::{DistributionRecord, PeriodDistributed};

/// One planned pull, computed read-only before any state is touched
#[derive(Debug)]
struct PlannedPull {
    period: Period,
    source: Address,
    forwarded: Amount,
    fee: Amount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionLedger {
    records: BTreeMap<Period, DistributionRecord>,
    /// Snapshot block per notified period
    snapshot_blocks: BTreeMap<Period, BlockHeight>,
    /// Highest period seen from the upstream counter
    current_period: Period,
}

impl DistributionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Period-advance notification: record `period`'s snapshot block.
    /// Periods arrive in non-decreasing order.
    pub fn note_period(&mut self, period: Period, snapshot_block: BlockHeight) -> Result<()> {
        if period < self.current_period {
            return Err(EngineError::InvalidInput {
                reason: format!(
                    "period {} regresses behind current period {}",
                    period, self.current_period
                ),
            });
        }
        self.snapshot_blocks.insert(period, snapshot_block);
        self.current_period = period;
        Ok(())
    }

    pub fn current_period(&self) -> Period {
        self.current_period
    }

    pub fn record(&self, period: Period) -> Option<&DistributionRecord> {
        self.records.get(&period)
    }

    pub fn distributed_total(&self, period: Period) -> Amount {
        self.records.get(&period).map(|r| r.total_amount).unwrap_or(0)
    }

    pub fn is_distributed(&self, period: Period) -> bool {
        self.records.get(&period).map(|r| r.distributed).unwrap_or(false)
    }

    pub fn snapshot_block(&self, period: Period) -> Option<BlockHeight> {
        self.snapshot_blocks.get(&period).copied()
    }

    /// Distribute every settleable period from `since` up to `through`
    /// inclusive.
    ///
    /// For each period in the registry's collapsed window, every covering
    /// source not yet pulled contributes its live balance; the fee is
    /// deducted per pull with floor division. Periods with zero eligible
    /// sources get a zero-amount record so downstream logic does not
    /// re-attempt them. `since` cuts the scan at the caller's claim
    /// horizon, keeping the work bounded as periods accumulate. Returns
    /// one event per period whose record actually changed, carrying the
    /// forwarded amount and the invoking caller.
    ///
    /// The plan is computed read-only first; state mutates only after every
    /// check passed, so a failure leaves nothing partially applied.
    #[allow(clippy::too_many_arguments)]
    pub fn distribute(
        &mut self,
        pair: &Address,
        since: Period,
        through: Period,
        registry: &SourceRegistry,
        sources: &dyn SourceDirectory,
        fees: &dyn FeePolicy,
        vault: &mut RewardVault,
        caller: &Address,
    ) -> Result<Vec<PeriodDistributed>> {
        let fee_bps = fees.fee_bps();
        if u64::from(fee_bps) >= BPS_DENOM {
            return Err(EngineError::InvalidInput {
                reason: format!("fee {} bps is not below 100%", fee_bps),
            });
        }

        // Plan phase: read live source balances, no caching, no mutation.
        let (start, end) = registry.active_period_range_exclusive(since, self.current_period)?;
        let end = end.min(through.checked_add(1).ok_or_else(|| {
            EngineError::InvalidInput {
                reason: "period overflow".into(),
            }
        })?);
        let mut pulls: Vec<PlannedPull> = Vec::new();
        let mut newly_settled: Vec<Period> = Vec::new();
        for period in start..end {
            let covering = registry.active_sources(period, period)?;
            let record = self.records.get(&period);
            let mut fresh = false;
            for src in covering.iter().filter(|s| s.covers(period)) {
                if record.map_or(false, |r| r.was_pulled(&src.address)) {
                    continue;
                }
                fresh = true;
                let raw = sources.undistributed_balance(&src.address, pair, period);
                let (forwarded, fee) = calculator::apply_fee(raw, fee_bps);
                pulls.push(PlannedPull {
                    period,
                    source: src.address.clone(),
                    forwarded,
                    fee,
                });
            }
            if fresh || record.map_or(true, |r| !r.distributed) {
                newly_settled.push(period);
            }
        }

        // Pre-validate every sum so the commit phase cannot fail midway.
        let fee_recipient = fees.fee_recipient();
        let mut projected = vault.pooled();
        let mut projected_fees = vault.fee_balance(&fee_recipient);
        let mut period_totals: BTreeMap<Period, Amount> = BTreeMap::new();
        for pull in &pulls {
            projected = projected.checked_add(pull.forwarded).ok_or_else(|| {
                EngineError::InvalidInput {
                    reason: "custody balance overflow".into(),
                }
            })?;
            projected_fees = projected_fees.checked_add(pull.fee).ok_or_else(|| {
                EngineError::InvalidInput {
                    reason: "fee accrual overflow".into(),
                }
            })?;
            let total = period_totals
                .entry(pull.period)
                .or_insert(self.distributed_total(pull.period));
            *total = total.checked_add(pull.forwarded).ok_or_else(|| {
                EngineError::InvalidInput {
                    reason: format!("distribution total overflow in period {}", pull.period),
                }
            })?;
        }

        // Commit phase.
        let mut events: Vec<PeriodDistributed> = Vec::new();
        for period in newly_settled {
            let was_distributed = self.is_distributed(period);
            let mut forwarded_now: Amount = 0;
            for pull in pulls.iter().filter(|p| p.period == period) {
                vault.deposit(pull.forwarded)?;
                if pull.fee > 0 {
                    vault.accrue_fee(&fee_recipient, pull.fee)?;
                }
                forwarded_now = forwarded_now.checked_add(pull.forwarded).ok_or_else(|| {
                    EngineError::Consistency {
                        reason: format!("period {} sum exceeds validated plan", period),
                    }
                })?;
                let record = self.records.entry(period).or_default();
                record.pulled.push(pull.source.clone());
            }
            let snapshot_block = self.snapshot_blocks.get(&period).copied().unwrap_or(0);
            let record = self.records.entry(period).or_default();
            record.total_amount = record.total_amount.checked_add(forwarded_now).ok_or_else(
                || EngineError::Consistency {
                    reason: format!("period {} total exceeds validated plan", period),
                },
            )?;
            record.snapshot_block = snapshot_block;
            record.distributed = true;

            // One event per period newly distributed or actually topped up
            if !was_distributed || forwarded_now > 0 {
                tracing::info!(
                    period,
                    forwarded = forwarded_now,
                    caller = %caller,
                    "distributed reward period"
                );
                events.push(PeriodDistributed {
                    period,
                    amount: forwarded_now,
                    caller: caller.clone(),
                });
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticSourceDirectory;
    use pair_core::{AssetForm, FeeConfig};

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn setup() -> (
        Address,
        SourceRegistry,
        StaticSourceDirectory,
        FeeConfig,
        RewardVault,
        DistributionLedger,
    ) {
        let pair = addr("0a17");
        let mut registry = SourceRegistry::default();
        registry.install(addr("aaaa"), 0).unwrap();
        let dir = StaticSourceDirectory::new();
        let fees = FeeConfig::new(0, addr("fefe"));
        let vault = RewardVault::new();
        let ledger = DistributionLedger::new();
        (pair, registry, dir, fees, vault, ledger)
    }

    #[test]
    fn test_distribute_single_period() {
        let (pair, registry, mut dir, fees, mut vault, mut ledger) = setup();
        dir.declare(&addr("aaaa"), 0, 100);
        ledger.note_period(0, 50).unwrap();

        let events = ledger
            .distribute(&pair, 0, 0, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, 100);
        assert_eq!(events[0].caller, addr("cc"));
        assert_eq!(ledger.distributed_total(0), 100);
        assert!(ledger.is_distributed(0));
        assert_eq!(ledger.record(0).unwrap().snapshot_block, 50);
        assert_eq!(vault.pooled(), 100);
    }

    #[test]
    fn test_distribution_idempotence() {
        let (pair, registry, mut dir, fees, mut vault, mut ledger) = setup();
        dir.declare(&addr("aaaa"), 0, 100);
        ledger.note_period(0, 50).unwrap();

        ledger
            .distribute(&pair, 0, 0, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        let again = ledger
            .distribute(&pair, 0, 0, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();

        // No event the second time, no amount change even though the
        // directory still reports a balance
        assert!(again.is_empty());
        assert_eq!(ledger.distributed_total(0), 100);
        assert_eq!(vault.pooled(), 100);
    }

    #[test]
    fn test_zero_eligible_period_records_zero() {
        let (pair, registry, dir, fees, mut vault, mut ledger) = setup();
        ledger.note_period(0, 50).unwrap();

        let events = ledger
            .distribute(&pair, 0, 0, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, 0);
        assert!(ledger.is_distributed(0));
        assert_eq!(ledger.distributed_total(0), 0);

        // And the zero period is not re-attempted
        let again = ledger
            .distribute(&pair, 0, 0, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_fee_application() {
        let (pair, registry, mut dir, _fees, mut vault, mut ledger) = setup();
        dir.declare(&addr("aaaa"), 0, 1000);
        ledger.note_period(0, 50).unwrap();

        let fees = FeeConfig::new(50, addr("fefe"));
        ledger
            .distribute(&pair, 0, 0, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();

        // 1000 * 9950 / 10000 = 995 forwarded, 5 to the fee recipient
        assert_eq!(ledger.distributed_total(0), 995);
        assert_eq!(vault.pooled(), 995);
        assert_eq!(vault.fee_balance(&addr("fefe")), 5);
    }

    #[test]
    fn test_fee_at_or_above_cap_rejected() {
        let (pair, registry, _dir, _fees, mut vault, mut ledger) = setup();
        let dir = StaticSourceDirectory::new();
        let fees = FeeConfig::new(10_000, addr("fefe"));
        let err = ledger
            .distribute(&pair, 0, 0, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }

    #[test]
    fn test_multi_period_catch_up() {
        let (pair, registry, mut dir, fees, mut vault, mut ledger) = setup();
        for period in 0..3 {
            dir.declare(&addr("aaaa"), period, 10 * (period + 1));
            ledger.note_period(period, 100 + period).unwrap();
        }

        let events = ledger
            .distribute(&pair, 0, 2, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(ledger.distributed_total(0), 10);
        assert_eq!(ledger.distributed_total(1), 20);
        assert_eq!(ledger.distributed_total(2), 30);
        assert_eq!(vault.pooled(), 60);
    }

    #[test]
    fn test_through_caps_settlement() {
        let (pair, registry, mut dir, fees, mut vault, mut ledger) = setup();
        for period in 0..3 {
            dir.declare(&addr("aaaa"), period, 10);
            ledger.note_period(period, 100).unwrap();
        }

        ledger
            .distribute(&pair, 0, 1, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert!(ledger.is_distributed(1));
        assert!(!ledger.is_distributed(2));
    }

    #[test]
    fn test_top_up_from_late_registered_source() {
        let (pair, mut registry, mut dir, fees, mut vault, mut ledger) = setup();
        dir.declare(&addr("aaaa"), 3, 100);
        for period in 0..=5 {
            ledger.note_period(period, 100).unwrap();
        }
        ledger
            .distribute(&pair, 0, 5, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert_eq!(ledger.distributed_total(3), 100);

        // A replacement installed from period 3 creates historical
        // multi-source periods; its balances top up settled records.
        registry.install(addr("bbbb"), 3).unwrap();
        dir.declare(&addr("bbbb"), 3, 40);
        let events = ledger
            .distribute(&pair, 0, 5, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert!(events.iter().any(|e| e.period == 3 && e.amount == 40));
        assert_eq!(ledger.distributed_total(3), 140);

        // The original source is not double counted
        let again = ledger
            .distribute(&pair, 0, 5, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(ledger.distributed_total(3), 140);
    }

    #[test]
    fn test_since_skips_earlier_periods() {
        let (pair, registry, mut dir, fees, mut vault, mut ledger) = setup();
        dir.declare(&addr("aaaa"), 0, 10);
        dir.declare(&addr("aaaa"), 2, 30);
        for period in 0..=2 {
            ledger.note_period(period, 100).unwrap();
        }

        ledger
            .distribute(&pair, 2, 2, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        // Periods before `since` are left untouched, not settled as zero
        assert!(!ledger.is_distributed(0));
        assert!(!ledger.is_distributed(1));
        assert_eq!(ledger.distributed_total(2), 30);
        assert_eq!(vault.pooled(), 30);
    }

    #[test]
    fn test_top_up_overflow_rejected_before_commit() {
        let (pair, mut registry, mut dir, fees, mut vault, mut ledger) = setup();
        dir.declare(&addr("aaaa"), 3, u64::MAX);
        for period in 0..=5 {
            ledger.note_period(period, 100).unwrap();
        }
        ledger
            .distribute(&pair, 0, 5, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap();
        assert_eq!(ledger.distributed_total(3), u64::MAX);
        vault.pay(&addr("dddd"), u64::MAX, AssetForm::Base).unwrap();

        // A late-registered source whose top-up would overflow the period
        // total is rejected whole, with no record or custody change.
        registry.install(addr("bbbb"), 3).unwrap();
        dir.declare(&addr("bbbb"), 3, 1);
        let err = ledger
            .distribute(&pair, 0, 5, &registry, &dir, &fees, &mut vault, &addr("cc"))
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
        assert_eq!(ledger.distributed_total(3), u64::MAX);
        assert_eq!(vault.pooled(), 0);
        assert!(!ledger.record(3).unwrap().was_pulled(&addr("bbbb")));
    }

    #[test]
    fn test_period_regression_rejected() {
        let mut ledger = DistributionLedger::new();
        ledger.note_period(4, 10).unwrap();
        assert!(ledger.note_period(3, 11).is_err());
        assert!(ledger.note_period(4, 12).is_ok());
    }
}
