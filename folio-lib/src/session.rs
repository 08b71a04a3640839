//! The signed in state of a user.
//!
//! A [`Session`] is established by the login and signup flows. Front ends that outlive a
//! single request persist it with [`Session::save`].

use std::{fs, io, path::Path};

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Account, Repository, repository::Uid};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not access the session file: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed session file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Could not serialize the session: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct Session {
    #[getset(get_copy = "pub")]
    account: Uid,
    #[getset(get = "pub")]
    identity_key: String,
    #[getset(get_copy = "pub")]
    started_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn start(account: &Account) -> crate::Result<Self> {
        Ok(Self {
            account: account.uid(),
            identity_key: account.identity_key()?,
            started_at: Utc::now(),
        })
    }

    /// Resolve the session back to its account. Returns `None` if the account has been
    /// removed or moved to another identity since the session started.
    pub fn account_in(&self, repo: &Repository) -> crate::Result<Option<Account>> {
        Ok(repo
            .find_by_identity(&self.identity_key)?
            .filter(|account| account.uid() == self.account))
    }

    /// Load a previously saved session. A missing file means nobody is signed in.
    pub fn load(path: &Path) -> Result<Option<Self>, Error> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&contents)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, toml::to_string_pretty(self)?)?;

        Ok(())
    }

    /// Forget the saved session. Clearing when nobody is signed in is not an error.
    pub fn clear(path: &Path) -> Result<(), Error> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Keep the session pointing at the account's current identity key.
    pub(crate) fn refresh(&mut self, account: &Account) -> crate::Result<()> {
        self.identity_key = account.identity_key()?;
        Ok(())
    }
}
