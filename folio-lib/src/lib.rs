//! Folio: accounts, their profiles and the flows that drive them.
//!
//! The [`Repository`] is the single entry point to persistent data. Request
//! level behaviour (signup, login, profile editing) lives in [`flows`] and is
//! shared by every front end.

use thiserror::Error;

pub mod auth;
pub mod flows;
pub mod fs;
pub mod media;
pub mod pages;
pub mod repository;
pub mod session;

pub use repository::{Account, Profile, Repository};
pub use session::Session;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Entity(#[from] repository::entities::Error),
    #[error(transparent)]
    Media(#[from] media::Error),
    #[error(transparent)]
    Session(#[from] session::Error),
}
