//! Storage for uploaded profile pictures.
//!
//! Pictures live under `<media_dir>/profile_pics/`. Profiles only keep the path relative to
//! the media directory, so the directory can move without touching the database.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use heck::ToSnakeCase;
use thiserror::Error;
use tracing::debug;

use crate::repository::Uid;

const PICTURE_DIR: &str = "profile_pics";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not store picture: {0}")]
    Io(#[from] io::Error),
    #[error("'{0}' is not a usable picture name")]
    InvalidName(String),
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Write `bytes` for the account `owner` and return the stored reference.
    ///
    /// The file name is derived from `name` but scoped to the owner, so two accounts
    /// uploading `me.png` do not clobber each other.
    pub fn store(&self, owner: Uid, name: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
        let reference = reference(owner, name)?;
        let path = self.path(&reference);

        fs::create_dir_all(self.root.join(PICTURE_DIR))?;
        fs::write(&path, bytes)?;

        debug!("Stored picture at {}", path.display());

        Ok(reference)
    }

    /// Absolute path of a stored reference.
    pub fn path(&self, reference: &Path) -> PathBuf {
        self.root.join(reference)
    }

    /// Delete a stored picture. Deleting a picture that is already gone is not an error.
    pub fn remove(&self, reference: &Path) -> Result<(), Error> {
        match fs::remove_file(self.path(reference)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => {
                debug!("Removed picture {}", reference.display());
                Ok(())
            }
        }
    }
}

/// The reference a picture uploaded as `name` by `owner` is stored under. Fails for names
/// that leave nothing usable after sanitizing.
pub fn reference(owner: Uid, name: &str) -> Result<PathBuf, Error> {
    Ok(Path::new(PICTURE_DIR).join(file_name(owner, name)?))
}

fn file_name(owner: Uid, name: &str) -> Result<String, Error> {
    let base = Path::new(name.trim());
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_snake_case())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidName(name.to_string()))?;

    let extension = base
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));

    Ok(match extension {
        Some(ext) => format!("{owner}_{stem}.{ext}"),
        None => format!("{owner}_{stem}"),
    })
}
