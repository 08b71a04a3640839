use std::{path::Path, sync::Arc};

use agdb::{DbAny, DbError, DbId, QueryBuilder};
use derive_more::{Deref, Display};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub(crate) mod models;

#[derive(Debug, Clone, Deref)]
pub(crate) struct Db {
    #[deref]
    db: Arc<RwLock<DbAny>>,
}

impl Db {
    /// Open (or create) the file backed database at `path`.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let path_str = path.to_string_lossy();

        let mut db = Self {
            db: Arc::new(RwLock::new(DbAny::new_file(&path_str)?)),
        };

        db.init()?;

        Ok(db)
    }

    fn init(&mut self) -> Result<(), DbError> {
        let alias_count = self
            .db
            .read()
            .exec(QueryBuilder::select().aliases().query())?
            .result;

        if alias_count == 0 {
            self.db.write().transaction_mut(|t| -> Result<(), DbError> {
                t.exec_mut(
                    // Insert aliases if they don't exist
                    QueryBuilder::insert()
                        .nodes()
                        .aliases([
                            // Root element nodes
                            "accounts",
                            "profiles",
                            // State nodes
                            "next_uid",
                        ])
                        .query(),
                )?;

                // Signifies what the UID should be for a newly inserted element. It gets
                // incremented with every new element.
                t.exec_mut(
                    QueryBuilder::insert()
                        .values([[("next_uid", 0_u64).into()]])
                        .ids("next_uid")
                        .query(),
                )?;

                Ok(())
            })?;
        }

        Ok(())
    }

    /// Create a memory backed database for use in tests
    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        let mut db = Self {
            db: Arc::new(RwLock::new(DbAny::new_memory("test").unwrap())),
        };

        db.init().unwrap();

        db
    }
}

/// A unique identifier for an element. Unlike a [`DbId`], a [`Uid`] is never reused after its
/// element has been removed, so it is safe to hand out to callers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
pub struct Uid(pub(crate) u64);

impl Uid {
    /// Allocate the next [`Uid`].
    pub(crate) fn new(db: &Db) -> Result<Self, DbError> {
        db.write().transaction_mut(|t| -> Result<Self, DbError> {
            let uid = t
                .exec(
                    QueryBuilder::select()
                        .values("next_uid")
                        .ids("next_uid")
                        .query(),
                )?
                .elements
                .pop()
                .expect("successful queries should not be empty")
                .values
                .pop()
                .expect("successful queries should not be empty")
                .value
                .to_u64()?;

            t.exec_mut(
                QueryBuilder::insert()
                    .values([[("next_uid", uid + 1).into()]])
                    .ids("next_uid")
                    .query(),
            )?;

            Ok(Self(uid))
        })
    }

    /// Read the [`Uid`] stored on an existing element.
    pub(crate) fn load(db: &Db, db_id: DbId) -> Result<Self, DbError> {
        let uid = db
            .read()
            .exec(QueryBuilder::select().values("uid").ids(db_id).query())?
            .elements
            .pop()
            .expect("successful queries should not be empty")
            .values
            .pop()
            .expect("successful queries should not be empty")
            .value
            .to_u64()?;

        Ok(Self(uid))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_uids_are_monotonic() {
        let db = Db::in_memory();

        let first = Uid::new(&db).unwrap();
        let second = Uid::new(&db).unwrap();

        assert_eq!(first.value(), 0);
        assert_eq!(second.value(), 1);
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut db = Db::in_memory();
        Uid::new(&db).unwrap();

        db.init().unwrap();

        assert_eq!(Uid::new(&db).unwrap().value(), 1);
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");

        let db = Db::open(&path).unwrap();
        Uid::new(&db).unwrap();
        drop(db);

        let reopened = Db::open(&path).unwrap();
        assert_eq!(Uid::new(&reopened).unwrap().value(), 1);
    }
}
