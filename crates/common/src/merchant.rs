//! Merchant record, touched only when a bank verification succeeds

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The slice of the merchant entity this subsystem owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    /// Unique merchant identifier
    pub id: String,

    /// Whether a bank-account verification has succeeded for this merchant
    pub bank_account_verified: bool,

    /// When the flag was flipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account_verified_at: Option<DateTime<Utc>>,
}

impl Merchant {
    pub fn new(id: String) -> Self {
        Self {
            id,
            bank_account_verified: false,
            bank_account_verified_at: None,
        }
    }

    /// Flip the verified flag and stamp the time
    pub fn mark_bank_verified(&mut self) {
        self.bank_account_verified = true;
        self.bank_account_verified_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_merchant_is_unverified() {
        let merchant = Merchant::new("merchant-1".to_string());
        assert!(!merchant.bank_account_verified);
        assert!(merchant.bank_account_verified_at.is_none());
    }

    #[test]
    fn test_mark_bank_verified_sets_flag_and_timestamp() {
        let mut merchant = Merchant::new("merchant-1".to_string());
        merchant.mark_bank_verified();
        assert!(merchant.bank_account_verified);
        assert!(merchant.bank_account_verified_at.is_some());
    }
}
