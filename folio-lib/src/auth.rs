//! Credential hashing and verification.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use crate::{Account, Repository, Result};

/// Hash a password using Argon2id. The result is a self describing PHC string.
pub fn hash_password(password: &str) -> std::result::Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a PHC string produced by [`hash_password`].
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

/// Checks a login attempt against the account store.
pub trait Authenticator {
    /// Returns the matching account, or `None` when the credentials are wrong.
    fn authenticate(
        &self,
        repo: &Repository,
        identity_key: &str,
        password: &str,
    ) -> Result<Option<Account>>;
}

/// The stock [`Authenticator`], backed by the stored password hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PasswordAuthenticator;

impl Authenticator for PasswordAuthenticator {
    fn authenticate(
        &self,
        repo: &Repository,
        identity_key: &str,
        password: &str,
    ) -> Result<Option<Account>> {
        repo.verify_credential(identity_key, password)
    }
}
