//! Request level flows shared by every front end.
//!
//! Each flow takes already-parsed user input, drives the [`Repository`] and either produces a
//! result or a [`FlowError`]. Flow errors are always recoverable: a front end shows
//! [`FlowError::message`] and lets the user try again.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    Repository, Session,
    auth::Authenticator,
    media,
    repository::{
        IdentityChange,
        entities::{self, ACHIEVEMENTS_MAX_LEN, BIO_MAX_LEN, normalize_identity},
    },
};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(String),
    #[error("A user with that email already exists.")]
    DuplicateIdentity,
    #[error("Database error. Please contact the administrator.")]
    StoreUnavailable(String),
    #[error("Signup succeeded but automatic login failed. Please log in.")]
    PostLoginVerification,
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Please log in first.")]
    NotSignedIn,
    #[error("Could not create user. Please try again.")]
    SignupFailed(String),
    #[error("Could not complete the request. Please try again.")]
    Unexpected(String),
}

impl FlowError {
    /// The text to show the user. Underlying failure details are only included in `debug`
    /// mode.
    pub fn message(&self, debug: bool) -> String {
        match self {
            FlowError::StoreUnavailable(detail) if debug => format!("Database error: {detail}"),
            FlowError::SignupFailed(detail) if debug => {
                format!("Could not create user. {detail}")
            }
            FlowError::Unexpected(detail) if debug => {
                format!("Could not complete the request. {detail}")
            }
            other => other.to_string(),
        }
    }
}

impl From<crate::Error> for FlowError {
    fn from(err: crate::Error) -> Self {
        use entities::Error as EntityError;

        match err {
            crate::Error::Entity(EntityError::DuplicateIdentity(_)) => FlowError::DuplicateIdentity,
            crate::Error::Entity(e @ EntityError::TooLong { .. }) => {
                FlowError::Validation(e.to_string())
            }
            crate::Error::Entity(e @ (EntityError::Internal(_) | EntityError::RemovedEntity)) => {
                FlowError::StoreUnavailable(e.to_string())
            }
            crate::Error::Media(e @ media::Error::InvalidName(_)) => {
                FlowError::Validation(e.to_string())
            }
            other => FlowError::Unexpected(other.to_string()),
        }
    }
}

impl From<entities::Error> for FlowError {
    fn from(err: entities::Error) -> Self {
        crate::Error::from(err).into()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Create an account and sign it in.
pub fn signup(
    repo: &Repository,
    authenticator: &impl Authenticator,
    form: &SignupForm,
) -> Result<Session, FlowError> {
    let name = form.name.trim();
    let email = normalize_identity(&form.email);

    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(FlowError::Validation("Please fill all fields.".into()));
    }

    let account = repo
        .create_account(&email, &form.password, name)
        .map_err(|e| match FlowError::from(e) {
            FlowError::Unexpected(detail) => FlowError::SignupFailed(detail),
            other => other,
        })?;
    info!("Signed up account {}", account.uid());

    match authenticator.authenticate(repo, &email, &form.password)? {
        Some(account) => start_session(&account),
        None => {
            warn!(
                "Account {} was created but could not be signed in",
                account.uid()
            );
            Err(FlowError::PostLoginVerification)
        }
    }
}

/// Sign in with an existing account.
pub fn login(
    repo: &Repository,
    authenticator: &impl Authenticator,
    form: &LoginForm,
) -> Result<Session, FlowError> {
    let email = normalize_identity(&form.email);

    match authenticator.authenticate(repo, &email, &form.password)? {
        Some(account) => start_session(&account),
        None => Err(FlowError::InvalidCredentials),
    }
}

/// Forget the session saved at `path`. Returns whether anyone was signed in.
pub fn logout(path: &Path) -> Result<bool, FlowError> {
    let signed_in = Session::load(path)
        .map_err(crate::Error::from)?
        .is_some();
    Session::clear(path).map_err(crate::Error::from)?;

    if signed_in {
        info!("Signed out");
    }

    Ok(signed_in)
}

fn start_session(account: &crate::Account) -> Result<Session, FlowError> {
    account.record_login()?;
    let session = Session::start(account)?;
    info!("Account {} signed in", account.uid());

    Ok(session)
}

/// Everything the profile page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub title: String,
    pub display_name: String,
    pub email: String,
    pub bio: Option<String>,
    pub achievements: Vec<String>,
    /// Absolute path of the stored picture
    pub picture: Option<PathBuf>,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn view_profile(repo: &Repository, session: &Session) -> Result<ProfileView, FlowError> {
    let account = session.account_in(repo)?.ok_or(FlowError::NotSignedIn)?;
    let profile = repo.profile(&account)?;

    Ok(ProfileView {
        title: profile.to_string(),
        display_name: account.display_name()?,
        email: account.email()?,
        bio: profile.bio()?,
        achievements: profile.achievements()?,
        picture: profile.picture()?.map(|p| repo.media().path(&p)),
        joined_at: account.joined_at()?,
        updated_at: profile.updated_at()?,
    })
}

#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A profile edit. `None` leaves a field alone. For bio and achievements an empty string
/// clears the field.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub achievements: Option<String>,
    pub picture: Option<PictureUpload>,
}

/// What an edit actually did.
#[derive(Debug, Default)]
pub struct EditReport {
    pub identity_changed: bool,
    /// Set when the email change was rejected. The rest of the edit was still applied.
    pub identity_error: Option<FlowError>,
    pub picture: Option<PathBuf>,
}

/// Apply `edit` to the signed in account and its profile.
///
/// Everything that can be rejected as invalid input is checked before the first write, so a
/// [`FlowError::Validation`] leaves the account untouched. An email that already belongs to
/// another account does not fail the edit: every other field is still saved and the conflict
/// is reported in [`EditReport::identity_error`].
pub fn edit_profile(
    repo: &Repository,
    session: &mut Session,
    edit: &ProfileEdit,
) -> Result<EditReport, FlowError> {
    let account = session.account_in(repo)?.ok_or(FlowError::NotSignedIn)?;

    check_len("bio", edit.bio.as_deref(), BIO_MAX_LEN)?;
    check_len(
        "achievements",
        edit.achievements.as_deref(),
        ACHIEVEMENTS_MAX_LEN,
    )?;
    if let Some(upload) = &edit.picture {
        media::reference(account.uid(), &upload.name).map_err(crate::Error::from)?;
    }

    let profile = repo.profile(&account)?;
    let media = repo.media();
    let mut report = EditReport::default();

    // The upload is the only step that touches the filesystem, do it before the database
    let picture = match &edit.picture {
        Some(upload) => {
            let reference = media
                .store(account.uid(), &upload.name, &upload.bytes)
                .map_err(crate::Error::from)?;
            Some((reference, profile.picture()?))
        }
        None => None,
    };

    if let Some(name) = edit.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
        account.set_display_name(name)?;
    }

    if let Some(email) = edit.email.as_deref().filter(|e| !e.trim().is_empty()) {
        match account.change_identity(email) {
            Ok(IdentityChange::Changed) => {
                report.identity_changed = true;
                session.refresh(&account)?;
            }
            Ok(IdentityChange::Unchanged) => {}
            Err(entities::Error::DuplicateIdentity(_)) => {
                warn!("Account {} tried to take a used email", account.uid());
                report.identity_error = Some(FlowError::DuplicateIdentity);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(bio) = &edit.bio {
        profile.set_bio(Some(bio))?;
    }

    if let Some(achievements) = &edit.achievements {
        profile.set_achievements(Some(achievements))?;
    }

    if let Some((reference, previous)) = picture {
        profile.set_picture(reference.to_str())?;

        if let Some(previous) = previous.filter(|p| *p != reference) {
            media.remove(&previous).map_err(crate::Error::from)?;
        }

        report.picture = Some(reference);
    }

    repo.save_account(&account, Some(&profile))?;

    Ok(report)
}

fn check_len(field: &'static str, value: Option<&str>, max: usize) -> Result<(), FlowError> {
    match value {
        Some(v) if v.trim().chars().count() > max => {
            Err(entities::Error::TooLong { field, max }.into())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use crate::{Account, auth::PasswordAuthenticator};

    use super::*;

    /// Authenticator whose verification always fails, counting how often it was asked.
    #[derive(Default)]
    struct BrokenAuthenticator {
        calls: Cell<usize>,
    }

    impl Authenticator for BrokenAuthenticator {
        fn authenticate(&self, _: &Repository, _: &str, _: &str) -> crate::Result<Option<Account>> {
            self.calls.set(self.calls.get() + 1);
            Ok(None)
        }
    }

    fn form(name: &str, email: &str, password: &str) -> SignupForm {
        SignupForm {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn signed_up(repo: &Repository, email: &str) -> Session {
        signup(repo, &PasswordAuthenticator, &form("Ada", email, "pw")).unwrap()
    }

    #[test]
    fn test_signup() {
        let repo = Repository::mock();

        let session = signup(
            &repo,
            &PasswordAuthenticator,
            &form(" Ada ", " Ada@Example.com", "hunter2"),
        )
        .unwrap();

        assert_eq!(session.identity_key(), "ada@example.com");
        let accounts = repo.accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(repo.profiles().unwrap().len(), 1);

        let account = accounts.first().unwrap();
        assert_eq!(session.account(), account.uid());
        assert_eq!(account.display_name().unwrap(), "Ada");
        assert!(account.last_login().unwrap().is_some());
    }

    #[test]
    fn test_signup_requires_all_fields() {
        let repo = Repository::mock();

        for blank in [
            form("", "a@example.com", "pw"),
            form("Ada", "   ", "pw"),
            form("Ada", "a@example.com", ""),
        ] {
            let err = signup(&repo, &PasswordAuthenticator, &blank).unwrap_err();
            assert_eq!(err.message(false), "Please fill all fields.");
        }

        assert!(repo.accounts().unwrap().is_empty());
    }

    #[test]
    fn test_signup_duplicate_differing_case() {
        let repo = Repository::mock();
        signed_up(&repo, "foo@bar.com");

        let err = signup(&repo, &PasswordAuthenticator, &form("F", "Foo@Bar.com", "x")).unwrap_err();

        assert!(matches!(err, FlowError::DuplicateIdentity));
        assert_eq!(err.message(false), "A user with that email already exists.");
        assert_eq!(repo.accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_signup_with_broken_verification() {
        let repo = Repository::mock();
        let broken = BrokenAuthenticator::default();

        let err = signup(&repo, &broken, &form("Ada", "a@example.com", "pw")).unwrap_err();

        assert!(matches!(err, FlowError::PostLoginVerification));
        assert_eq!(
            err.message(false),
            "Signup succeeded but automatic login failed. Please log in."
        );
        assert_eq!(broken.calls.get(), 1);
        assert_eq!(repo.accounts().unwrap().len(), 1);
        assert_eq!(repo.profiles().unwrap().len(), 1);

        // The account is usable through a working login
        let session = login(
            &repo,
            &PasswordAuthenticator,
            &LoginForm {
                email: "a@example.com".into(),
                password: "pw".into(),
            },
        )
        .unwrap();
        assert_eq!(session.identity_key(), "a@example.com");
        assert_eq!(repo.accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_login() {
        let repo = Repository::mock();
        signed_up(&repo, "a@example.com");

        let ok = login(
            &repo,
            &PasswordAuthenticator,
            &LoginForm {
                email: "A@EXAMPLE.COM ".into(),
                password: "pw".into(),
            },
        );
        assert!(ok.is_ok());

        let err = login(
            &repo,
            &PasswordAuthenticator,
            &LoginForm {
                email: "a@example.com".into(),
                password: "nope".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.message(true), "Invalid email or password.");
    }

    #[test]
    fn test_logout() {
        let repo = Repository::mock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        signed_up(&repo, "a@example.com").save(&path).unwrap();

        assert!(logout(&path).unwrap());
        assert!(!logout(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_store_error_detail_is_gated() {
        let err = FlowError::StoreUnavailable("disk I/O error".into());

        assert_eq!(
            err.message(false),
            "Database error. Please contact the administrator."
        );
        assert_eq!(err.message(true), "Database error: disk I/O error");
    }

    #[test]
    fn test_view_profile() {
        let repo = Repository::mock();
        let session = signed_up(&repo, "a@example.com");

        let view = view_profile(&repo, &session).unwrap();

        assert_eq!(view.title, "Ada's Profile");
        assert_eq!(view.email, "a@example.com");
        assert_eq!(view.bio, None);
        assert!(view.achievements.is_empty());
        assert_eq!(view.picture, None);
    }

    #[test]
    fn test_edit_profile() {
        let repo = Repository::mock();
        let mut session = signed_up(&repo, "a@example.com");

        let report = edit_profile(
            &repo,
            &mut session,
            &ProfileEdit {
                display_name: Some("Ada Lovelace".into()),
                email: Some("Ada@Lovelace.org".into()),
                bio: Some("Mathematician".into()),
                achievements: Some("a, b ,,c".into()),
                picture: Some(PictureUpload {
                    name: "portrait.png".into(),
                    bytes: b"png".to_vec(),
                }),
            },
        )
        .unwrap();

        assert!(report.identity_changed);
        assert!(report.identity_error.is_none());
        assert_eq!(session.identity_key(), "ada@lovelace.org");

        let view = view_profile(&repo, &session).unwrap();
        assert_eq!(view.display_name, "Ada Lovelace");
        assert_eq!(view.email, "ada@lovelace.org");
        assert_eq!(view.bio.as_deref(), Some("Mathematician"));
        assert_eq!(view.achievements, vec!["a", "b", "c"]);
        assert!(view.picture.unwrap().exists());
        assert_eq!(repo.profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_edit_profile_to_taken_email_keeps_other_changes() {
        let repo = Repository::mock();
        signed_up(&repo, "taken@example.com");
        let mut session = signed_up(&repo, "mine@example.com");

        let report = edit_profile(
            &repo,
            &mut session,
            &ProfileEdit {
                email: Some("TAKEN@example.com".into()),
                bio: Some("Still saved".into()),
                achievements: Some("one, two".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(!report.identity_changed);
        assert!(matches!(
            report.identity_error,
            Some(FlowError::DuplicateIdentity)
        ));

        let taken = repo.find_by_identity("taken@example.com").unwrap().unwrap();
        let mine = repo.find_by_identity("mine@example.com").unwrap().unwrap();
        assert_ne!(taken, mine);
        assert_eq!(taken.email().unwrap(), "taken@example.com");
        assert_eq!(mine.email().unwrap(), "mine@example.com");

        let profile = mine.profile().unwrap();
        assert_eq!(profile.bio().unwrap().as_deref(), Some("Still saved"));
        assert_eq!(profile.achievements().unwrap(), vec!["one", "two"]);
        assert_eq!(taken.profile().unwrap().bio().unwrap(), None);
    }

    #[test]
    fn test_edit_profile_rejects_long_bio_without_changes() {
        let repo = Repository::mock();
        let mut session = signed_up(&repo, "a@example.com");

        let err = edit_profile(
            &repo,
            &mut session,
            &ProfileEdit {
                display_name: Some("Changed".into()),
                bio: Some("x".repeat(BIO_MAX_LEN + 1)),
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, FlowError::Validation(_)));
        let account = session.account_in(&repo).unwrap().unwrap();
        assert_eq!(account.display_name().unwrap(), "Ada");
    }

    #[test]
    fn test_edit_profile_rejects_long_achievements_without_changes() {
        let repo = Repository::mock();
        let mut session = signed_up(&repo, "a@example.com");

        let err = edit_profile(
            &repo,
            &mut session,
            &ProfileEdit {
                bio: Some("Changed".into()),
                achievements: Some("x".repeat(ACHIEVEMENTS_MAX_LEN + 1)),
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, FlowError::Validation(_)));
        let account = session.account_in(&repo).unwrap().unwrap();
        let profile = account.profile().unwrap();
        assert_eq!(profile.bio().unwrap(), None);
        assert_eq!(profile.achievements_raw().unwrap(), None);
    }

    #[test]
    fn test_edit_profile_with_bad_picture_name_changes_nothing() {
        let repo = Repository::mock();
        let mut session = signed_up(&repo, "a@example.com");
        let saved = session.clone();

        let err = edit_profile(
            &repo,
            &mut session,
            &ProfileEdit {
                display_name: Some("Changed".into()),
                email: Some("new@example.com".into()),
                bio: Some("changed".into()),
                picture: Some(PictureUpload {
                    name: "---.png".into(),
                    bytes: b"png".to_vec(),
                }),
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, FlowError::Validation(_)));
        assert_eq!(session, saved);

        let account = saved.account_in(&repo).unwrap().unwrap();
        assert_eq!(account.identity_key().unwrap(), "a@example.com");
        assert_eq!(account.display_name().unwrap(), "Ada");
        assert_eq!(account.profile().unwrap().bio().unwrap(), None);
        assert!(repo.find_by_identity("new@example.com").unwrap().is_none());
    }

    #[test]
    fn test_signup_failure_message() {
        let err = FlowError::SignupFailed("hash failed".into());

        assert_eq!(err.message(false), "Could not create user. Please try again.");
        assert_eq!(err.message(true), "Could not create user. hash failed");
    }

    #[test]
    fn test_edit_profile_replaces_picture() {
        let repo = Repository::mock();
        let mut session = signed_up(&repo, "a@example.com");
        let upload = |name: &str| ProfileEdit {
            picture: Some(PictureUpload {
                name: name.into(),
                bytes: b"img".to_vec(),
            }),
            ..Default::default()
        };

        let first = edit_profile(&repo, &mut session, &upload("old.png"))
            .unwrap()
            .picture
            .unwrap();
        let second = edit_profile(&repo, &mut session, &upload("new.png"))
            .unwrap()
            .picture
            .unwrap();

        assert!(!repo.media().path(&first).exists());
        assert!(repo.media().path(&second).exists());
    }

    #[test]
    fn test_edit_heals_missing_profile() {
        let repo = Repository::mock();
        let mut session = signed_up(&repo, "a@example.com");
        let account = session.account_in(&repo).unwrap().unwrap();
        let profile = account.profile().unwrap();
        let db_id = profile.id.db_id(&profile.db).unwrap();
        profile
            .db
            .write()
            .exec_mut(agdb::QueryBuilder::remove().ids(db_id).query())
            .unwrap();

        edit_profile(
            &repo,
            &mut session,
            &ProfileEdit {
                bio: Some("Back again".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(repo.profiles().unwrap().len(), 1);
        assert_eq!(
            account.profile().unwrap().bio().unwrap().as_deref(),
            Some("Back again")
        );
    }

    #[test]
    fn test_edit_requires_live_account() {
        let repo = Repository::mock();
        let mut session = signed_up(&repo, "a@example.com");
        let account = session.account_in(&repo).unwrap().unwrap();
        repo.remove_account(account).unwrap();

        let err = edit_profile(&repo, &mut session, &ProfileEdit::default()).unwrap_err();

        assert!(matches!(err, FlowError::NotSignedIn));
    }
}
