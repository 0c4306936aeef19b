//! Configuration types for the reward pair engine

use serde::{Deserialize, Serialize};

use crate::constants::BPS_DENOM;
use crate::errors::{EngineError, Result};
use crate::types::{Address, Period};

/// Deduction fee configuration.
///
/// The engine reads the policy at distribution time through [`FeePolicy`];
/// values are never cached across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee rate in basis points, strictly below 10_000
    pub fee_bps: u16,

    /// Address the deducted fee accrues to
    pub fee_recipient: Address,
}

impl FeeConfig {
    pub fn new(fee_bps: u16, fee_recipient: Address) -> Self {
        Self {
            fee_bps,
            fee_recipient,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if u64::from(self.fee_bps) >= BPS_DENOM {
            return Err(EngineError::InvalidInput {
                reason: format!("fee {} bps is not below 100%", self.fee_bps),
            });
        }
        Ok(())
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_bps: 0,
            fee_recipient: Address::new("00"),
        }
    }
}

/// Fee policy read by the distribution path. Implemented by [`FeeConfig`]
/// for static configuration; tests and hosts may supply their own.
pub trait FeePolicy {
    fn fee_bps(&self) -> u16;
    fn fee_recipient(&self) -> Address;
}

impl FeePolicy for FeeConfig {
    fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    fn fee_recipient(&self) -> Address {
        self.fee_recipient.clone()
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Periods a distributed reward stays claimable; older periods
    /// collapse to zero. 0 disables expiry.
    #[serde(default = "default_retention_periods")]
    pub retention_periods: Period,

    /// Bound on sources simultaneously active over any queried window
    #[serde(default = "default_max_source_window")]
    pub max_source_window: u64,
}

fn default_retention_periods() -> Period {
    12
}

fn default_max_source_window() -> u64 {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_periods: default_retention_periods(),
            max_source_window: default_max_source_window(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.retention_periods, 12);
        assert_eq!(config.max_source_window, 8);
    }

    #[test]
    fn test_fee_config_validation() {
        assert!(FeeConfig::new(0, Address::new("aa")).validate().is_ok());
        assert!(FeeConfig::new(9_999, Address::new("aa")).validate().is_ok());
        assert!(FeeConfig::new(10_000, Address::new("aa")).validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.retention_periods, config.retention_periods);
    }
}
