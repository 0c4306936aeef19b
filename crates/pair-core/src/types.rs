//! Core type definitions for the reward pair engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account or contract address (hex-encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the address is non-empty, well-formed hex
    pub fn is_valid(&self) -> bool {
        let raw = self.0.strip_prefix("0x").unwrap_or(&self.0);
        !raw.is_empty() && hex::decode(raw).is_ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block height
pub type BlockHeight = u64;

/// Reward period (epoch/month index), issued monotonically upstream
pub type Period = u64;

/// Token amount in base units
pub type Amount = u64;

/// Asset form a claim pays out in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetForm {
    /// The custodial reward token itself
    Base,
    /// The unwrapped/native representation
    Alternate,
}

/// Permission level an owner grants a claim executor.
///
/// Ordered: `None < OwnerOnly < AnyAddress`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorPermission {
    /// No delegated claims
    #[default]
    None,
    /// May claim, but only paying out to the owner
    OwnerOnly,
    /// May claim paying out to any recipient
    AnyAddress,
}

impl ExecutorPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OwnerOnly => "owner_only",
            Self::AnyAddress => "any_address",
        }
    }
}

impl fmt::Display for ExecutorPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Constants
pub mod constants {
    /// Basis point denominator (100% = 10_000 bps)
    pub const BPS_DENOM: u64 = 10_000;
}
