//! Error types for the reward pair engine

use thiserror::Error;

use crate::types::Address;

/// Engine errors. Every failure aborts the whole call with no partial
/// state mutation; retries are the caller's responsibility.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Invalid providers: {reason}")]
    InvalidProviders { reason: String },

    #[error("Flash attack blocked: provider change and balance decrease for {account} in one atomic unit")]
    FlashAttack { account: Address },

    #[error("Inconsistent source chain: {reason}")]
    Consistency { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Insufficient custody balance: need {required}, have {available}")]
    InsufficientCustody { required: u64, available: u64 },
}

impl EngineError {
    /// Short machine-checkable reason code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "forbidden",
            Self::InvalidProviders { .. } => "invalid_providers",
            Self::FlashAttack { .. } => "flash_attack",
            Self::Consistency { .. } => "inconsistent_sources",
            Self::InvalidInput { .. } => "invalid_input",
            Self::InsufficientCustody { .. } => "insufficient_custody",
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
