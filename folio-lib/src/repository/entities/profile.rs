use std::{
    fmt::{self, Debug, Display, Formatter},
    path::PathBuf,
};

use agdb::{DbId, DbKeyValue, DbValue, QueryBuilder, QueryId};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::repository::{
    db::{Db, Uid, models::ProfileModel},
    entities::{
        EntityId, Error, Result, account::Account, from_millis, get_field, now_millis, optional,
    },
};

pub const BIO_MAX_LEN: usize = 500;
pub const ACHIEVEMENTS_MAX_LEN: usize = 1000;

/// Split a comma separated achievement list into its trimmed, non-empty entries.
pub fn parse_achievements(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Represents the profile attached to an [`Account`].
///
/// Every account owns exactly one profile. Profiles are never created directly by callers;
/// see [`Account::profile`]. Always reflects the current database state.
#[derive(Debug, Clone)]
pub struct Profile {
    pub(crate) id: EntityId,
    pub(crate) db: Db,
}

impl Profile {
    pub(crate) fn load(db_id: DbId, db: Db) -> Result<Self> {
        let id = EntityId::load(&db, db_id)?;
        Ok(Self { id, db })
    }

    // Fields

    pub fn uid(&self) -> Uid {
        self.id.uid()
    }

    pub fn bio(&self) -> Result<Option<String>> {
        Ok(optional(self.get_field("bio")?))
    }

    pub fn set_bio(&self, bio: Option<&str>) -> Result<()> {
        self.set_text("bio", bio, BIO_MAX_LEN)
    }

    /// The achievement list exactly as the user wrote it.
    pub fn achievements_raw(&self) -> Result<Option<String>> {
        Ok(optional(self.get_field("achievements")?))
    }

    /// The parsed achievement list. Recomputed on every call.
    pub fn achievements(&self) -> Result<Vec<String>> {
        Ok(parse_achievements(self.achievements_raw()?.as_deref()))
    }

    pub fn set_achievements(&self, achievements: Option<&str>) -> Result<()> {
        self.set_text("achievements", achievements, ACHIEVEMENTS_MAX_LEN)
    }

    /// Reference to the stored picture, relative to the media directory.
    pub fn picture(&self) -> Result<Option<PathBuf>> {
        Ok(optional(self.get_field("picture")?).map(PathBuf::from))
    }

    pub fn set_picture(&self, picture: Option<&str>) -> Result<()> {
        self.set_fields(&[("picture", picture.unwrap_or_default())])
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        Ok(from_millis(self.get_field("created_at")?))
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>> {
        Ok(from_millis(self.get_field("updated_at")?))
    }

    /// Mark this profile as saved without changing any field.
    pub fn touch(&self) -> Result<()> {
        self.set_fields(&[])
    }

    /// Returns the owning [`Account`] of this [`Profile`]
    pub fn account(&self) -> Result<Account> {
        let db_id = self.id.db_id(&self.db)?;
        let owner_id = self
            .db
            .read()
            .exec(
                QueryBuilder::search()
                    .to(db_id)
                    .where_()
                    .neighbor()
                    .and()
                    .keys("identity_key")
                    .query(),
            )?
            .elements
            .pop()
            .expect("a Profile should have an owning Account")
            .id;

        Account::load(owner_id, self.db.clone())
    }

    // Operations

    /// Look up the profile linked to `account` without creating one.
    pub(crate) fn find(db: &Db, account: &Account) -> Result<Option<Self>> {
        let account_id = account.id.db_id(db)?;
        let found = db
            .read()
            .exec(
                QueryBuilder::search()
                    .from(account_id)
                    .where_()
                    .neighbor()
                    .query(),
            )?
            .elements
            .first()
            .map(|e| e.id);

        found.map(|db_id| Profile::load(db_id, db.clone())).transpose()
    }

    /// Return the profile linked to `account`, inserting an empty one if there is none.
    ///
    /// The existence check and the insertion run in one write transaction, so concurrent
    /// callers for the same account all end up with the same profile.
    pub(crate) fn get_or_create(db: &Db, account: &Account) -> Result<Self> {
        if let Some(profile) = Profile::find(db, account)? {
            return Ok(profile);
        }

        let model = ProfileModel::new(Uid::new(db)?, now_millis());
        let account_id = account.id.db_id(db)?;

        let (profile_id, created) = db.write().transaction_mut(|t| -> Result<(DbId, bool)> {
            let existing = t
                .exec(
                    QueryBuilder::search()
                        .from(account_id)
                        .where_()
                        .neighbor()
                        .query(),
                )?
                .elements
                .first()
                .map(|e| e.id);

            if let Some(profile_id) = existing {
                return Ok((profile_id, false));
            }

            let profile_id = t
                .exec_mut(QueryBuilder::insert().element(model).query())?
                .elements
                .first()
                .expect("ProfileModel insertion should return the ID as the first element")
                .id;

            // Link Profile to its owning Account node and root "profiles" node
            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from([QueryId::from("profiles"), QueryId::from(account_id)])
                    .to(profile_id)
                    .query(),
            )?;

            Ok((profile_id, true))
        })?;

        let profile = Profile::load(profile_id, db.clone())?;

        if created {
            debug!(
                "Created profile {} for account {}",
                profile.uid(),
                account.uid()
            );
        }

        Ok(profile)
    }

    pub(crate) fn list(db: &Db) -> Result<Vec<Self>> {
        let ids: Vec<DbId> = db
            .read()
            .exec(
                QueryBuilder::search()
                    .from("profiles")
                    .where_()
                    .neighbor()
                    .query(),
            )?
            .elements
            .iter()
            .map(|e| e.id)
            .collect();

        ids.into_iter()
            .map(|db_id| Profile::load(db_id, db.clone()))
            .collect()
    }

    fn set_text(&self, field: &'static str, value: Option<&str>, max: usize) -> Result<()> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.chars().count() > max {
            return Err(Error::TooLong { field, max });
        }

        self.set_fields(&[(field, value)])
    }

    /// Write `fields` and bump `updated_at` in a single insert.
    fn set_fields(&self, fields: &[(&str, &str)]) -> Result<()> {
        let db_id = self.id.db_id(&self.db)?;
        let mut values: Vec<DbKeyValue> = fields
            .iter()
            .map(|&(field, value)| (field, value).into())
            .collect();
        values.push(("updated_at", now_millis()).into());

        self.db
            .write()
            .exec_mut(QueryBuilder::insert().values(vec![values]).ids(db_id).query())?;

        Ok(())
    }

    fn get_field<T>(&self, field: &str) -> Result<T>
    where
        T: TryFrom<DbValue>,
        T::Error: Debug,
    {
        get_field(&self.db, self.id, field)
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = self
            .account()
            .and_then(|a| a.display_name())
            .unwrap_or_else(|_| "<removed account>".into());
        write!(f, "{name}'s Profile")
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
