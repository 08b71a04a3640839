use colored::Colorize;
use folio_lib::{Repository, flows::FlowError, pages::Page};

use crate::account::current_session;

pub fn show(repo: &Repository, page: Page) -> Result<(), FlowError> {
    if page.requires_session() {
        let session = current_session()?;
        if session.account_in(repo)?.is_none() {
            return Err(FlowError::NotSignedIn);
        }
    }

    println!("{}", page.title().bold());
    println!("{}", page.body());

    Ok(())
}
