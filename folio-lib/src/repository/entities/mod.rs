//! Core domain entities for Folio.
//!
//! These types represent accounts and the profiles attached to them. They provide a unified
//! interface for inspecting and mutating these records, handling all necessary operations
//! behind the scenes.

use std::fmt::Debug;

use agdb::{DbValue, QueryBuilder};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::repository::db::Db;

mod account;
mod entity_id;
mod profile;

pub use account::{Account, IdentityChange, normalize_identity};
pub(crate) use entity_id::EntityId;
pub use profile::{ACHIEVEMENTS_MAX_LEN, BIO_MAX_LEN, Profile, parse_achievements};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Internal database error {0}")]
    Internal(#[from] agdb::DbError),
    #[error("This entity has been removed")]
    RemovedEntity,
    #[error("An account with the identity '{0}' already exists")]
    DuplicateIdentity(String),
    #[error("The {field} may not be longer than {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("Could not process credentials: {0}")]
    Credential(String),
}

fn get_field<T>(db: &Db, id: EntityId, field: &str) -> Result<T>
where
    T: TryFrom<DbValue>,
    T::Error: Debug,
{
    let db_id = id.db_id(db)?;
    let value = db
        .read()
        .exec(QueryBuilder::select().values(field).ids(db_id).query())?
        .elements
        .pop()
        .expect("successful queries should not be empty")
        .values
        .pop()
        .expect("successful queries should not be empty")
        .value;

    Ok(T::try_from(value).expect("conversion from a `DbValue` must succeed"))
}

fn set_field<T>(db: &Db, id: EntityId, field: &str, value: T) -> Result<()>
where
    T: Into<DbValue>,
{
    let db_id = id.db_id(db)?;
    db.write().exec_mut(
        QueryBuilder::insert()
            .values([[(field, value).into()]])
            .ids(db_id)
            .query(),
    )?;

    Ok(())
}

/// Empty strings stand in for absent optional text.
fn optional(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
