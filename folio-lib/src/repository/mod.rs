use std::{path::Path, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    Result, auth,
    fs::state_dir,
    media::MediaStore,
    repository::{
        config::{Cfg, CoreConfig},
        db::Db,
    },
};

mod db;

pub mod binder;
pub mod config;
pub mod entities;

pub use db::Uid;
pub use entities::{Account, IdentityChange, Profile};

/// Central access point for all persistent data.
///
/// The [`Repository`] owns the account store, the profile store and the core configuration.
/// It is cheap to clone; clones share the same database.
#[derive(Clone, Debug)]
pub struct Repository {
    db: Db,
    cfg: Cfg,
}

impl Repository {
    /// Open the database in the Folio state directory.
    pub fn new() -> Result<Self> {
        Self::open(&state_dir().join("data.db"), CoreConfig::load())
    }

    pub fn open(path: &Path, cfg: CoreConfig) -> Result<Self> {
        let db = Db::open(path).map_err(entities::Error::from)?;
        debug!("Opened database at {}", path.display());

        Ok(Self {
            db,
            cfg: Arc::new(RwLock::new(cfg)),
        })
    }

    pub fn cfg(&self) -> Cfg {
        self.cfg.clone()
    }

    pub fn media(&self) -> MediaStore {
        MediaStore::new(self.cfg.read().media_dir())
    }

    /// Insert a new [`Account`] and pair it with an empty [`Profile`].
    pub fn create_account(
        &self,
        identity_key: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Account> {
        let account = Account::add(&self.db, identity_key, password, display_name)?;
        binder::on_account_created(&account)?;

        Ok(account)
    }

    pub fn find_by_identity(&self, identity_key: &str) -> Result<Option<Account>> {
        Ok(Account::find(&self.db, identity_key)?)
    }

    /// Return the account only if `password` matches its stored credential.
    pub fn verify_credential(&self, identity_key: &str, password: &str) -> Result<Option<Account>> {
        let Some(account) = self.find_by_identity(identity_key)? else {
            return Ok(None);
        };

        if auth::verify_password(password, &account.credential_hash()?) {
            Ok(Some(account))
        } else {
            Ok(None)
        }
    }

    /// Propagate a save of `account` to `attached` when the caller holds the account's
    /// profile.
    ///
    /// Account setters write through to the database, so there is nothing left to write for
    /// the account itself.
    pub fn save_account(&self, account: &Account, attached: Option<&Profile>) -> Result<()> {
        debug!("Propagating save of account {}", account.uid());
        Ok(binder::on_account_saved(attached)?)
    }

    pub fn accounts(&self) -> Result<Vec<Account>> {
        Ok(Account::list(&self.db)?)
    }

    /// The [`Profile`] of `account`, created on demand.
    pub fn profile(&self, account: &Account) -> Result<Profile> {
        Ok(account.profile()?)
    }

    pub fn profiles(&self) -> Result<Vec<Profile>> {
        Ok(Profile::list(&self.db)?)
    }

    /// Remove `account`, its profile and the profile's stored picture.
    pub fn remove_account(&self, account: Account) -> Result<()> {
        let picture = match Profile::find(&self.db, &account)? {
            Some(profile) => profile.picture()?,
            None => None,
        };

        account.remove()?;

        if let Some(picture) = picture {
            self.media().remove(&picture)?;
        }

        Ok(())
    }

    #[cfg(test)]
    /// Return a mock version of a [`Repository`] with an in-memory database and configuration.
    pub(crate) fn mock() -> Self {
        Self {
            db: Db::in_memory(),
            cfg: Arc::new(RwLock::new(CoreConfig::mock())),
        }
    }
}
