//! External Source Interfaces
//!
//! Upstream reward sources expose a pull balance per (pair, period). The
//! engine always reads the current value at distribution time and never
//! caches between reads.

use std::collections::{HashMap, HashSet};

use pair_core::{Address, Amount, Period};

/// Read surface of the upstream reward sources, including the discovery
/// interface the registry polls to observe replacement
pub trait SourceDirectory {
    /// Balance `source` still holds for `pair` and `period`, not yet
    /// distributed. May legitimately be zero.
    fn undistributed_balance(&self, source: &Address, pair: &Address, period: Period) -> Amount;

    /// Whether `source` is still the live upstream instance
    fn is_active(&self, source: &Address) -> bool;

    /// The upstream's currently-installed source, if any
    fn current_source(&self) -> Option<Address>;

    /// The upstream's period counter
    fn current_period(&self) -> Period;
}

/// In-memory directory backed by a declared balance table. Used by hosts
/// that mirror upstream deposits locally, and by fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceDirectory {
    balances: HashMap<(Address, Period), Amount>,
    inactive: HashSet<Address>,
    current_source: Option<Address>,
    current_period: Period,
}

impl StaticSourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the amount `source` holds for `period`
    pub fn declare(&mut self, source: &Address, period: Period, amount: Amount) {
        self.balances.insert((source.clone(), period), amount);
    }

    pub fn mark_inactive(&mut self, source: &Address) {
        self.inactive.insert(source.clone());
    }

    /// Point discovery at a new current source
    pub fn rotate_to(&mut self, source: &Address) {
        self.current_source = Some(source.clone());
    }

    pub fn advance_period(&mut self, period: Period) {
        self.current_period = period;
    }
}

impl SourceDirectory for StaticSourceDirectory {
    fn undistributed_balance(&self, source: &Address, _pair: &Address, period: Period) -> Amount {
        self.balances
            .get(&(source.clone(), period))
            .copied()
            .unwrap_or(0)
    }

    fn is_active(&self, source: &Address) -> bool {
        !self.inactive.contains(source)
    }

    fn current_source(&self) -> Option<Address> {
        self.current_source.clone()
    }

    fn current_period(&self) -> Period {
        self.current_period
    }
}
