use colored::Colorize;
use folio_lib::{
    Repository, Session,
    auth::PasswordAuthenticator,
    flows::{self, FlowError, LoginForm, SignupForm},
    fs::session_path,
};

pub fn signup(repo: &Repository, name: &str, email: &str, password: &str) -> Result<(), FlowError> {
    let form = SignupForm {
        name: name.into(),
        email: email.into(),
        password: password.into(),
    };

    let session = flows::signup(repo, &PasswordAuthenticator, &form)?;
    remember(&session)?;

    println!("{} {}", "Welcome,".green(), session.identity_key());
    Ok(())
}

pub fn login(repo: &Repository, email: &str, password: &str) -> Result<(), FlowError> {
    let form = LoginForm {
        email: email.into(),
        password: password.into(),
    };

    let session = flows::login(repo, &PasswordAuthenticator, &form)?;
    remember(&session)?;

    println!("{} {}", "Signed in as".green(), session.identity_key());
    Ok(())
}

pub fn logout() -> Result<(), FlowError> {
    if flows::logout(&session_path())? {
        println!("Signed out");
    } else {
        println!("Nobody is signed in");
    }
    Ok(())
}

/// The session saved by the last signup or login.
pub fn current_session() -> Result<Session, FlowError> {
    Session::load(&session_path())
        .map_err(|e| FlowError::Unexpected(e.to_string()))?
        .ok_or(FlowError::NotSignedIn)
}

pub fn remember(session: &Session) -> Result<(), FlowError> {
    session
        .save(&session_path())
        .map_err(|e| FlowError::Unexpected(e.to_string()))
}
