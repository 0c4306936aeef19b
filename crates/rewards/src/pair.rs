//! Reward Pair Facade
//!
//! Composes the snapshot ledger, rotation registry, distribution and claim
//! ledgers, vote book, and custodial vault behind the pair's public
//! surface. Every state-changing call threads an explicit [`UnitOfWork`]
//! and explicit block/period parameters; failures abort with no partial
//! state mutation.

use pair_core::{
    Address, Amount, AssetForm, BlockHeight, EngineConfig, EngineError, ExecutorPermission,
    FeePolicy, Period, Result,
};

use crate::claims::ClaimLedger;
use crate::custody::RewardVault;
use crate::distribution::DistributionLedger;
use crate::rotation::SourceRegistry;
use crate::snapshot::SnapshotLedger;
use crate::sources::SourceDirectory;
use crate::state::{PeriodDistributed, UnclaimedReport, UnitOfWork};
use crate::voting::{DelegationTarget, VoteBook};

#[derive(Debug)]
pub struct RewardPair {
    /// This pair's own address, passed to source pulls
    address: Address,
    /// Authority for source registration and provider changes
    governance: Address,
    config: EngineConfig,

    snapshots: SnapshotLedger,
    registry: SourceRegistry,
    distribution: DistributionLedger,
    claims: ClaimLedger,
    votes: VoteBook,
    delegation: DelegationTarget,
    vault: RewardVault,
}

impl RewardPair {
    pub fn new(address: Address, governance: Address, config: EngineConfig) -> Self {
        let registry = SourceRegistry::new(config.max_source_window);
        Self {
            address,
            governance,
            config,
            snapshots: SnapshotLedger::new(),
            registry,
            distribution: DistributionLedger::new(),
            claims: ClaimLedger::new(),
            votes: VoteBook::new(),
            delegation: DelegationTarget::default(),
            vault: RewardVault::new(),
        }
    }

    fn require_governance(&self, caller: &Address) -> Result<()> {
        if caller != &self.governance {
            return Err(EngineError::Forbidden {
                reason: format!("{} is not the configuration authority", caller),
            });
        }
        Ok(())
    }

    fn require_valid_address(addr: &Address) -> Result<()> {
        if !addr.is_valid() {
            return Err(EngineError::InvalidInput {
                reason: format!("malformed address {}", addr),
            });
        }
        Ok(())
    }

    // --- liquidity token transfer hooks -------------------------------

    /// Mint hook: `to` gained `amount` at `block`
    pub fn on_mint(
        &mut self,
        _unit: &mut UnitOfWork,
        to: &Address,
        amount: Amount,
        block: BlockHeight,
    ) -> Result<()> {
        let balance = self
            .snapshots
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("balance overflow for {}", to),
            })?;
        self.apply_balance(to, balance, block)
    }

    /// Burn hook: `from` lost `amount` at `block`. Balance-decreasing, so
    /// the flash guard applies.
    pub fn on_burn(
        &mut self,
        unit: &mut UnitOfWork,
        from: &Address,
        amount: Amount,
        block: BlockHeight,
    ) -> Result<()> {
        unit.assert_can_decrease(from)?;
        let balance = self
            .snapshots
            .balance_of(from)
            .checked_sub(amount)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("burn exceeds balance of {}", from),
            })?;
        self.apply_balance(from, balance, block)
    }

    /// Transfer hook: both affected accounts are recorded before returning
    pub fn on_transfer(
        &mut self,
        unit: &mut UnitOfWork,
        from: &Address,
        to: &Address,
        amount: Amount,
        block: BlockHeight,
    ) -> Result<()> {
        unit.assert_can_decrease(from)?;
        let from_balance = self
            .snapshots
            .balance_of(from)
            .checked_sub(amount)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("transfer exceeds balance of {}", from),
            })?;
        // Both ends of a self-transfer resolve to the same account; the
        // balance is unchanged, so there is nothing to record.
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .snapshots
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("balance overflow for {}", to),
            })?;
        self.apply_balance(from, from_balance, block)?;
        self.apply_balance(to, to_balance, block)
    }

    fn apply_balance(
        &mut self,
        account: &Address,
        new_balance: Amount,
        block: BlockHeight,
    ) -> Result<()> {
        self.snapshots.record_balance(account, new_balance, block)?;
        self.votes.sync_weight(account, new_balance);
        Ok(())
    }

    // --- periods and sources ------------------------------------------

    /// Period-advance notification from the environment
    pub fn on_period_advance(&mut self, period: Period, snapshot_block: BlockHeight) -> Result<()> {
        self.distribution.note_period(period, snapshot_block)
    }

    /// Governance: register a replacement source starting at `from_period`
    pub fn install_source(
        &mut self,
        caller: &Address,
        source: Address,
        from_period: Period,
    ) -> Result<()> {
        self.require_governance(caller)?;
        Self::require_valid_address(&source)?;
        self.registry.install(source, from_period)
    }

    /// Governance: close the open source range at `last_period`
    pub fn deactivate_source(
        &mut self,
        caller: &Address,
        source: &Address,
        last_period: Period,
    ) -> Result<()> {
        self.require_governance(caller)?;
        self.registry.deactivate(source, last_period)
    }

    /// Poll upstream discovery and mirror any rotation into the registry.
    /// Returns whether the registry changed.
    pub fn sync_sources(&mut self, directory: &dyn SourceDirectory) -> Result<bool> {
        let installed = self.registry.current_source().map(|s| s.address.clone());
        match (installed, directory.current_source()) {
            (None, Some(discovered)) => {
                self.registry
                    .install(discovered, directory.current_period())?;
                Ok(true)
            }
            (Some(current), Some(discovered)) if current != discovered => {
                // A replacement opens at the next period boundary
                self.registry
                    .install(discovered, directory.current_period() + 1)?;
                Ok(true)
            }
            (Some(current), _) if !directory.is_active(&current) => {
                self.registry
                    .deactivate(&current, directory.current_period())?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // --- distribution and claims --------------------------------------

    /// Distribute every settleable period up to `through` inclusive.
    /// Periods already past the retention window are skipped; their
    /// entitlements have expired, so pulling for them settles nothing.
    pub fn distribute_rewards(
        &mut self,
        through: Period,
        sources: &dyn SourceDirectory,
        fees: &dyn FeePolicy,
        caller: &Address,
    ) -> Result<Vec<PeriodDistributed>> {
        let current = self.distribution.current_period();
        let since = if self.config.retention_periods == 0 {
            0
        } else {
            current.saturating_sub(self.config.retention_periods)
        };
        self.distribution.distribute(
            &self.address,
            since,
            through,
            &self.registry,
            sources,
            fees,
            &mut self.vault,
            caller,
        )
    }

    /// Per-period unclaimed entitlements of `account` over the active
    /// window, with each period's distributed pool total
    pub fn unclaimed_rewards(&self, account: &Address) -> Result<UnclaimedReport> {
        let (start, end) = self
            .registry
            .active_period_range_exclusive(0, self.distribution.current_period())?;
        let mut report = UnclaimedReport::default();
        for period in start..end {
            report.periods.push(period);
            report.amounts.push(self.claims.unclaimed_for(
                &self.distribution,
                &self.snapshots,
                &self.config,
                account,
                period,
            ));
            report.totals.push(self.distribution.distributed_total(period));
        }
        Ok(report)
    }

    /// Claim the caller's own rewards for `periods`, paying `to`
    pub fn claim_rewards(
        &mut self,
        unit: &mut UnitOfWork,
        periods: &[Period],
        caller: &Address,
        to: &Address,
        alternate_form: bool,
        block: BlockHeight,
    ) -> Result<Amount> {
        self.claim_for(unit, periods, caller, caller, to, alternate_form, block)
    }

    /// Claim `account`'s rewards as an authorized executor
    #[allow(clippy::too_many_arguments)]
    pub fn claim_rewards_by_executor(
        &mut self,
        unit: &mut UnitOfWork,
        periods: &[Period],
        account: &Address,
        to: &Address,
        alternate_form: bool,
        caller: &Address,
        block: BlockHeight,
    ) -> Result<Amount> {
        self.claim_for(unit, periods, account, caller, to, alternate_form, block)
    }

    #[allow(clippy::too_many_arguments)]
    fn claim_for(
        &mut self,
        _unit: &mut UnitOfWork,
        periods: &[Period],
        account: &Address,
        caller: &Address,
        to: &Address,
        alternate_form: bool,
        block: BlockHeight,
    ) -> Result<Amount> {
        Self::require_valid_address(to)?;
        self.claims.authorize(account, caller, to)?;

        // Compute dues read-only first; duplicates in the list pay zero
        // because the first occurrence settles the period.
        let mut dues: Vec<(Period, Amount)> = Vec::new();
        let mut total: Amount = 0;
        for &period in periods {
            if dues.iter().any(|(p, _)| *p == period) {
                continue;
            }
            let due = self.claims.unclaimed_for(
                &self.distribution,
                &self.snapshots,
                &self.config,
                account,
                period,
            );
            if due == 0 {
                continue;
            }
            total = total
                .checked_add(due)
                .ok_or_else(|| EngineError::InvalidInput {
                    reason: "claim total overflow".into(),
                })?;
            dues.push((period, due));
        }

        if total > 0 {
            let form = if alternate_form {
                AssetForm::Alternate
            } else {
                AssetForm::Base
            };
            self.vault.pay(to, total, form)?;
            for (period, due) in dues {
                self.claims.record_claim(account, period, due);
            }
            tracing::info!(
                account = %account,
                to = %to,
                total,
                block,
                "claimed rewards"
            );
        }
        Ok(total)
    }

    /// Owner-gated executor grant
    pub fn set_claim_executor(
        &mut self,
        caller: &Address,
        executor: &Address,
        permission: ExecutorPermission,
    ) {
        self.claims.set_executor(caller, executor, permission);
    }

    /// Withdraw every fee accrued for the calling recipient
    pub fn withdraw_fees(&mut self, caller: &Address) -> Amount {
        self.vault.withdraw_fees(caller)
    }

    // --- voting -------------------------------------------------------

    /// Record the caller's provider vote at its current liquidity balance
    pub fn vote_for(&mut self, caller: &Address, provider: &Address) -> Result<()> {
        Self::require_valid_address(provider)?;
        let weight = self.snapshots.balance_of(caller);
        self.votes.vote(caller, provider, weight);
        Ok(())
    }

    pub fn most_voted_providers(&self) -> (Option<Address>, Option<Address>) {
        self.votes.most_voted()
    }

    /// Privileged: redirect the custodial reward-forwarding target
    pub fn change_providers(
        &mut self,
        unit: &mut UnitOfWork,
        new_pair: (Option<Address>, Option<Address>),
        caller: &Address,
        block: BlockHeight,
    ) -> Result<()> {
        self.require_governance(caller)?;
        self.delegation.change(
            &self.votes,
            new_pair,
            block,
            self.distribution.current_period(),
        )?;
        unit.note_provider_change(caller);
        Ok(())
    }

    // --- read accessors -----------------------------------------------

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn snapshots(&self) -> &SnapshotLedger {
        &self.snapshots
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn distribution(&self) -> &DistributionLedger {
        &self.distribution
    }

    pub fn vault(&self) -> &RewardVault {
        &self.vault
    }

    pub fn delegation_target(&self) -> &DelegationTarget {
        &self.delegation
    }
}
