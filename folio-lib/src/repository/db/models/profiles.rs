use agdb::{DbElement, DbId};

use crate::repository::db::Uid;

/// Optional text fields are stored as empty strings.
#[derive(Debug, Clone, DbElement, PartialEq, PartialOrd)]
pub(crate) struct ProfileModel {
    db_id: Option<DbId>,
    uid: u64,
    bio: String,
    achievements: String,
    picture: String,
    /// Unix milliseconds, UTC
    created_at: i64,
    /// Unix milliseconds, UTC
    updated_at: i64,
}

impl ProfileModel {
    pub fn new(uid: Uid, now: i64) -> Self {
        Self {
            db_id: None,
            uid: uid.0,
            bio: String::new(),
            achievements: String::new(),
            picture: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
