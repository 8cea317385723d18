//! User-to-account eligibility.

use serde::{Deserialize, Serialize};

use keyshare_core::types::AccountId;

/// Grants a user eligibility to open sessions on an account.
///
/// The pair is unique within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserAccount {
    /// Identity key of the user.
    pub user_id: String,
    /// The account the user may borrow.
    pub account_id: AccountId,
}

impl UserAccount {
    /// Create a new association.
    pub fn new(user_id: impl Into<String>, account_id: AccountId) -> Self {
        Self {
            user_id: user_id.into(),
            account_id,
        }
    }
}
