//! Keeps every [`Account`] paired with exactly one [`Profile`].
//!
//! Account creation calls [`on_account_created`] directly, there is no event bus. Anything that
//! needs a profile goes through [`profile_for`], which heals accounts that predate the pairing
//! or missed it.

use tracing::warn;

use crate::repository::entities::{Account, Profile, Result};

/// The profile of a freshly inserted account. [`Account`] insertion already links an empty
/// profile in the same transaction, so this only creates one for accounts that lack it.
/// Calling this again for the same account returns the existing profile.
pub(crate) fn on_account_created(account: &Account) -> Result<Profile> {
    Profile::get_or_create(&account.db, account)
}

/// Propagate an account save to the profile the caller already holds.
///
/// Only the attached profile is refreshed; when none is attached nothing is loaded.
pub fn on_account_saved(attached: Option<&Profile>) -> Result<()> {
    match attached {
        Some(profile) => profile.touch(),
        None => Ok(()),
    }
}

/// The profile for `account`, created with empty fields if it does not exist yet.
pub(crate) fn profile_for(account: &Account) -> Result<Profile> {
    if let Some(profile) = Profile::find(&account.db, account)? {
        return Ok(profile);
    }

    warn!("Account {} has no profile, creating one", account.uid());
    Profile::get_or_create(&account.db, account)
}
