//! JSON state files under the user config dir:
//! $XDG_CONFIG_HOME/rigwatch (fallback: platform config dir, then ".").

use std::{fs, path::PathBuf};

use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("rigwatch")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rigwatch")
    }
}

pub fn state_path(file: &str) -> PathBuf {
    config_dir().join(file)
}

/// Missing or unreadable files load as `None`.
pub fn load_json<T: DeserializeOwned>(file: &str) -> Option<T> {
    let path = state_path(file);
    let raw = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable state file");
            None
        }
    }
}

pub fn save_json<T: Serialize>(file: &str, value: &T) -> Result<(), StoreError> {
    let path = state_path(file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(&path, data).map_err(|source| StoreError::Io { path, source })
}

pub fn remove(file: &str) -> Result<(), StoreError> {
    let path = state_path(file);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Io { path, source }),
    }
}
