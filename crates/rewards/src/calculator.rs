//! Reward Calculator
//!
//! Fee and pro-rata entitlement math. Uses BigInt to prevent overflow since
//! pool totals times balances can exceed u64::MAX; all divisions truncate
//! toward zero, which fixes the canonical expected-amount arithmetic.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use pair_core::constants::BPS_DENOM;
use pair_core::Amount;

/// Apply a basis-point deduction fee to a raw deposit.
///
/// forwarded = amount * (10_000 - fee_bps) / 10_000, floor
///
/// Returns `(forwarded, fee)` with `forwarded + fee == amount`.
pub fn apply_fee(amount: Amount, fee_bps: u16) -> (Amount, Amount) {
    if amount == 0 || fee_bps == 0 {
        return (amount, 0);
    }
    let kept = BPS_DENOM.saturating_sub(u64::from(fee_bps));
    let forwarded = (BigInt::from(amount) * BigInt::from(kept) / BigInt::from(BPS_DENOM))
        .to_u64()
        .unwrap_or(0);
    (forwarded, amount - forwarded)
}

/// Pro-rata share of a distributed pool.
///
/// share = total * balance / supply, floor
pub fn pro_rata_share(total: Amount, balance: Amount, supply: Amount) -> Amount {
    if total == 0 || balance == 0 || supply == 0 {
        return 0;
    }
    (BigInt::from(total) * BigInt::from(balance) / BigInt::from(supply))
        .to_u64()
        .unwrap_or(0)
}
