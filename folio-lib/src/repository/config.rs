use std::{fs, path::PathBuf, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fs::{config_dir, data_dir};

const FILE_NAME: &str = "core.toml";

/// Handle to the core configuration
pub type Cfg = Arc<RwLock<CoreConfig>>;

/// The core configuration, serialized to TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Show underlying store errors to the user instead of a generic message
    debug: bool,
    /// Root directory for uploaded profile pictures
    media_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            debug: false,
            media_dir: data_dir().join("media"),
        }
    }
}

impl CoreConfig {
    pub fn load() -> Self {
        let path = config_dir().join(FILE_NAME);

        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
                    warn!("Ignoring malformed {}: {err}", path.display());
                    Self::default()
                }),
                Err(err) => {
                    warn!("Could not read {}: {err}", path.display());
                    Self::default()
                }
            }
        } else {
            let cfg = Self::default();
            if let Err(err) = cfg.save() {
                warn!("Could not write default configuration: {err}");
            }
            cfg
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let contents = toml::to_string_pretty(self).map_err(std::io::Error::other)?;

        fs::create_dir_all(config_dir())?;
        fs::write(config_dir().join(FILE_NAME), contents)
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn media_dir(&self) -> &PathBuf {
        &self.media_dir
    }

    #[cfg(test)]
    pub(crate) fn mock() -> Self {
        Self {
            debug: true,
            media_dir: tempfile::tempdir().unwrap().keep(),
        }
    }
}
