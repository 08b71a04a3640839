use std::{fs::create_dir_all, path::PathBuf};

use xdg::BaseDirectories;

/// Returns the path to the Folio configuration directory. If it doesn't exist when this
/// function is called, it will be created.
pub fn config_dir() -> PathBuf {
    let path = xdg_prefix().get_config_home().expect("$HOME must exist");

    create_dir_all(&path).unwrap();

    path
}

/// Returns the path to the Folio data directory. If it doesn't exist when this function is
/// called, it will be created.
pub fn data_dir() -> PathBuf {
    let path = xdg_prefix().get_data_home().expect("$HOME must exist");

    create_dir_all(&path).unwrap();

    path
}

/// Returns the path to the Folio state directory. If it doesn't exist when this function is
/// called, it will be created.
pub fn state_dir() -> PathBuf {
    let path = xdg_prefix().get_state_home().expect("$HOME must exist");

    create_dir_all(&path).unwrap();

    path
}

/// Where the CLI keeps the signed in session between invocations.
pub fn session_path() -> PathBuf {
    state_dir().join("session.toml")
}

fn xdg_prefix() -> BaseDirectories {
    xdg::BaseDirectories::with_prefix("folio")
}
