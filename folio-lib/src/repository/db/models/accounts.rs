use agdb::{DbElement, DbId};

use crate::repository::db::Uid;

#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct AccountModel {
    db_id: Option<DbId>,
    uid: u64,
    /// Normalized login name, unique across accounts
    identity_key: String,
    /// Contact address, kept equal to `identity_key`
    email: String,
    display_name: String,
    /// PHC formatted password hash
    credential_hash: String,
    /// Unix milliseconds, UTC
    joined_at: i64,
    /// Unix milliseconds, UTC. Zero until the first login.
    last_login_at: i64,
}

impl AccountModel {
    pub fn new(
        uid: Uid,
        identity_key: &str,
        display_name: &str,
        credential_hash: String,
        joined_at: i64,
    ) -> Self {
        Self {
            db_id: None,
            uid: uid.0,
            identity_key: identity_key.to_string(),
            email: identity_key.to_string(),
            display_name: display_name.to_string(),
            credential_hash,
            joined_at,
            last_login_at: 0,
        }
    }
}
