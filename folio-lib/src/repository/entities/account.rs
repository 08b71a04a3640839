use std::fmt::{self, Debug, Display, Formatter};

use agdb::{Comparison, DbId, DbValue, QueryBuilder, QueryId};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    auth,
    repository::{
        binder,
        db::{
            Db, Uid,
            models::{AccountModel, ProfileModel},
        },
        entities::{
            EntityId, Error, Result, from_millis, get_field, now_millis, profile::Profile,
            set_field,
        },
    },
};

/// Trim and lowercase a user supplied identity key.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Outcome of [`Account::change_identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityChange {
    Unchanged,
    Changed,
}

/// Represents an account entity in the Folio system.
///
/// An account is the authenticable identity. Its identity key doubles as the login name and
/// contact address. Always reflects the current database state.
#[derive(Debug, Clone)]
pub struct Account {
    pub(crate) id: EntityId,
    pub(crate) db: Db,
}

impl Account {
    /// Load some existing [`Account`] from the database
    pub(crate) fn load(db_id: DbId, db: Db) -> Result<Self> {
        let id = EntityId::load(&db, db_id)?;
        Ok(Self { id, db })
    }

    // Fields

    pub fn uid(&self) -> Uid {
        self.id.uid()
    }

    pub fn identity_key(&self) -> Result<String> {
        self.get_field("identity_key")
    }

    pub fn email(&self) -> Result<String> {
        self.get_field("email")
    }

    pub fn display_name(&self) -> Result<String> {
        self.get_field("display_name")
    }

    pub fn set_display_name(&self, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name == self.display_name()? {
            return Ok(());
        }

        self.set_field("display_name", new_name)
    }

    pub fn joined_at(&self) -> Result<DateTime<Utc>> {
        Ok(from_millis(self.get_field("joined_at")?))
    }

    pub fn last_login(&self) -> Result<Option<DateTime<Utc>>> {
        let millis: i64 = self.get_field("last_login_at")?;
        Ok((millis != 0).then(|| from_millis(millis)))
    }

    pub(crate) fn record_login(&self) -> Result<()> {
        self.set_field("last_login_at", now_millis())
    }

    pub(crate) fn credential_hash(&self) -> Result<String> {
        self.get_field("credential_hash")
    }

    /// Move this account to a new identity key.
    ///
    /// The login identity and the contact address are always written together. A key that
    /// another account already owns is rejected with [`Error::DuplicateIdentity`] and nothing
    /// is changed.
    pub fn change_identity(&self, proposed: &str) -> Result<IdentityChange> {
        let key = normalize_identity(proposed);
        if key == self.identity_key()? {
            return Ok(IdentityChange::Unchanged);
        }

        let db_id = self.id.db_id(&self.db)?;
        self.db.write().transaction_mut(|t| -> Result<()> {
            let owners = t
                .exec(
                    QueryBuilder::search()
                        .from("accounts")
                        .where_()
                        .key("identity_key")
                        .value(Comparison::Equal(key.as_str().into()))
                        .query(),
                )?
                .elements;

            if owners.iter().any(|e| e.id != db_id) {
                return Err(Error::DuplicateIdentity(key.clone()));
            }

            t.exec_mut(
                QueryBuilder::insert()
                    .values([[
                        ("identity_key", key.as_str()).into(),
                        ("email", key.as_str()).into(),
                    ]])
                    .ids(db_id)
                    .query(),
            )?;

            Ok(())
        })?;

        debug!("Account {} changed identity", self.uid());

        Ok(IdentityChange::Changed)
    }

    /// The [`Profile`] paired with this account, created on demand if it is missing.
    pub fn profile(&self) -> Result<Profile> {
        binder::profile_for(self)
    }

    // Operations

    /// Insert a new [`Account`] together with its empty [`Profile`]. The normalized identity
    /// key must not belong to any other account.
    pub(crate) fn add(
        db: &Db,
        identity_key: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Self> {
        let key = normalize_identity(identity_key);
        let credential_hash =
            auth::hash_password(password).map_err(|e| Error::Credential(e.to_string()))?;

        let model = AccountModel::new(
            Uid::new(db)?,
            &key,
            display_name.trim(),
            credential_hash,
            now_millis(),
        );
        let profile = ProfileModel::new(Uid::new(db)?, now_millis());

        let db_id = db.write().transaction_mut(|t| -> Result<DbId> {
            let taken = !t
                .exec(
                    QueryBuilder::search()
                        .from("accounts")
                        .where_()
                        .key("identity_key")
                        .value(Comparison::Equal(key.as_str().into()))
                        .query(),
                )?
                .elements
                .is_empty();

            if taken {
                return Err(Error::DuplicateIdentity(key.clone()));
            }

            let account_id = t
                .exec_mut(QueryBuilder::insert().element(model).query())?
                .elements
                .first()
                .expect("AccountModel insertion should return the ID as the first element")
                .id;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from("accounts")
                    .to(account_id)
                    .query(),
            )?;

            let profile_id = t
                .exec_mut(QueryBuilder::insert().element(profile).query())?
                .elements
                .first()
                .expect("ProfileModel insertion should return the ID as the first element")
                .id;

            t.exec_mut(
                QueryBuilder::insert()
                    .edges()
                    .from([QueryId::from("profiles"), QueryId::from(account_id)])
                    .to(profile_id)
                    .query(),
            )?;

            Ok(account_id)
        })?;

        let account = Account::load(db_id, db.clone())?;

        debug!("Created account {}", account.uid());

        Ok(account)
    }

    /// Search for an account by identity key. The key is normalized before matching.
    pub(crate) fn find(db: &Db, identity_key: &str) -> Result<Option<Self>> {
        let key = normalize_identity(identity_key);
        let found = db
            .read()
            .exec(
                QueryBuilder::search()
                    .from("accounts")
                    .where_()
                    .key("identity_key")
                    .value(Comparison::Equal(key.into()))
                    .query(),
            )?
            .elements
            .first()
            .map(|e| e.id);

        found.map(|db_id| Account::load(db_id, db.clone())).transpose()
    }

    pub(crate) fn list(db: &Db) -> Result<Vec<Self>> {
        let ids: Vec<DbId> = db
            .read()
            .exec(
                QueryBuilder::search()
                    .from("accounts")
                    .where_()
                    .neighbor()
                    .query(),
            )?
            .elements
            .iter()
            .map(|e| e.id)
            .collect();

        ids.into_iter()
            .map(|db_id| Account::load(db_id, db.clone()))
            .collect()
    }

    /// Remove this account together with its profile.
    pub(crate) fn remove(self) -> Result<()> {
        let uid = self.uid();
        let db_id = self.id.db_id(&self.db)?;

        self.db.write().transaction_mut(|t| -> Result<()> {
            let mut ids: Vec<DbId> = t
                .exec(
                    QueryBuilder::search()
                        .from(db_id)
                        .where_()
                        .neighbor()
                        .query(),
                )?
                .elements
                .iter()
                .map(|e| e.id)
                .collect();
            ids.push(db_id);

            t.exec_mut(QueryBuilder::remove().ids(ids).query())?;

            Ok(())
        })?;

        debug!("Removed account {uid}");

        Ok(())
    }

    fn get_field<T>(&self, field: &str) -> Result<T>
    where
        T: TryFrom<DbValue>,
        T::Error: Debug,
    {
        get_field(&self.db, self.id, field)
    }

    fn set_field<T>(&self, field: &str, value: T) -> Result<()>
    where
        T: Into<DbValue>,
    {
        set_field(&self.db, self.id, field, value)
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.identity_key()
                .unwrap_or_else(|_| "<removed account>".into())
        )
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod test {
    use crate::Repository;

    use super::*;

    #[test]
    fn test_normalize_identity() {
        assert_eq!(normalize_identity("  Foo@Bar.COM "), "foo@bar.com");
        assert_eq!(normalize_identity(""), "");
    }

    #[test]
    fn test_add() {
        let repo = Repository::mock();

        let account = repo
            .create_account("Ada@Example.com", "hunter2", "Ada")
            .unwrap();

        assert_eq!(account.identity_key().unwrap(), "ada@example.com");
        assert_eq!(account.email().unwrap(), "ada@example.com");
        assert_eq!(account.display_name().unwrap(), "Ada");
        assert!(account.last_login().unwrap().is_none());
        assert_ne!(account.credential_hash().unwrap(), "hunter2");
    }

    #[test]
    fn test_add_links_profile() {
        let repo = Repository::mock();

        let account = Account::add(&repo.db, "a@example.com", "pw", "A").unwrap();

        let profile = Profile::find(&account.db, &account).unwrap().unwrap();
        assert_eq!(profile.account().unwrap(), account);
        assert_eq!(repo.profiles().unwrap(), vec![profile]);
    }

    #[test]
    fn test_add_duplicate_differing_case() {
        let repo = Repository::mock();
        repo.create_account("foo@bar.com", "pw", "Foo").unwrap();

        let err = repo.create_account("Foo@Bar.com", "pw", "Other").unwrap_err();

        assert!(matches!(
            err,
            crate::Error::Entity(Error::DuplicateIdentity(key)) if key == "foo@bar.com"
        ));
        assert_eq!(repo.accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_list() {
        let repo = Repository::mock();

        assert_eq!(repo.accounts().unwrap().len(), 0);

        repo.create_account("a@example.com", "pw", "A").unwrap();
        repo.create_account("b@example.com", "pw", "B").unwrap();

        assert_eq!(repo.accounts().unwrap().len(), 2);
    }

    #[test]
    fn test_set_display_name() {
        let repo = Repository::mock();
        let account = repo.create_account("a@example.com", "pw", "A").unwrap();

        account.set_display_name("  Grace ").unwrap();

        assert_eq!(account.display_name().unwrap(), "Grace");
    }

    #[test]
    fn test_change_identity() {
        let repo = Repository::mock();
        let account = repo.create_account("old@example.com", "pw", "A").unwrap();

        assert_eq!(
            account.change_identity(" OLD@example.com").unwrap(),
            IdentityChange::Unchanged
        );
        assert_eq!(
            account.change_identity("New@Example.com").unwrap(),
            IdentityChange::Changed
        );

        assert_eq!(account.identity_key().unwrap(), "new@example.com");
        assert_eq!(account.email().unwrap(), "new@example.com");
        assert!(repo.find_by_identity("old@example.com").unwrap().is_none());
        assert_eq!(
            repo.find_by_identity("new@example.com").unwrap(),
            Some(account)
        );
    }

    #[test]
    fn test_change_identity_to_taken_key() {
        let repo = Repository::mock();
        let first = repo.create_account("first@example.com", "pw", "A").unwrap();
        let second = repo.create_account("second@example.com", "pw", "B").unwrap();

        let err = second.change_identity("FIRST@example.com").unwrap_err();

        assert!(matches!(err, Error::DuplicateIdentity(_)));
        assert_eq!(first.identity_key().unwrap(), "first@example.com");
        assert_eq!(second.identity_key().unwrap(), "second@example.com");
        assert_eq!(second.email().unwrap(), "second@example.com");
    }

    #[test]
    fn test_removed_account_is_stale() {
        let repo = Repository::mock();
        let account = repo.create_account("a@example.com", "pw", "A").unwrap();
        let handle = account.clone();

        repo.remove_account(account).unwrap();

        assert!(handle.display_name().is_err());
        assert!(repo.find_by_identity("a@example.com").unwrap().is_none());
    }
}
