//! Job configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `RECON_SEED_SEARCH_ID` - Identifier of the saved search producing
//!   candidate orders; the job fails fast without it
//!
//! ## Optional
//! - `RECON_REVERSAL_ACCOUNT_ID` - Account posted on inventory reversal
//!   documents. Not required at job start; its absence becomes a fatal
//!   per-invocation error the first time the reversal stage needs it

use recon_core::AccountId;
use thiserror::Error;

/// Environment variable naming the candidate-order saved search.
pub const SEED_SEARCH_VAR: &str = "RECON_SEED_SEARCH_ID";
/// Environment variable naming the inventory reversal account.
pub const REVERSAL_ACCOUNT_VAR: &str = "RECON_REVERSAL_ACCOUNT_ID";

/// Configuration errors that can occur during loading or use.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),
    #[error("seed search id is not configured")]
    MissingSeedSearch,
    #[error("inventory reversal account is not configured")]
    MissingReversalAccount,
}

/// Reconciliation job configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Identifier of the saved search producing candidate orders.
    pub seed_search_id: String,
    /// Account posted on inventory reversal documents; checked lazily by the
    /// reversal stage.
    pub reversal_account: Option<AccountId>,
}

impl JobConfig {
    /// Create a configuration from explicit values.
    pub fn new(seed_search_id: impl Into<String>, reversal_account: Option<AccountId>) -> Self {
        Self {
            seed_search_id: seed_search_id.into(),
            reversal_account,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when the seed search variable is missing or blank,
    /// or when the reversal account variable is set but not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let seed_search_id = std::env::var(SEED_SEARCH_VAR)
            .map_err(|_| ConfigError::MissingEnvVar(SEED_SEARCH_VAR))?;
        if seed_search_id.trim().is_empty() {
            return Err(ConfigError::MissingSeedSearch);
        }

        let reversal_account = match std::env::var(REVERSAL_ACCOUNT_VAR) {
            Ok(raw) if !raw.trim().is_empty() => {
                let id: i32 = raw.trim().parse().map_err(|_| {
                    ConfigError::InvalidEnvVar(REVERSAL_ACCOUNT_VAR, raw.clone())
                })?;
                Some(AccountId::new(id))
            }
            _ => None,
        };

        Ok(Self {
            seed_search_id,
            reversal_account,
        })
    }

    /// Reversal account, required at reversal time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingReversalAccount`] when unset.
    pub fn require_reversal_account(&self) -> Result<AccountId, ConfigError> {
        self.reversal_account
            .ok_or(ConfigError::MissingReversalAccount)
    }
}
