//! Client-local persistence of the access credential.
//!
//! The credential is issued by an external login flow; this module only
//! stores and hands it out. Both the hub handshake and the REST client read
//! it on every use, so a refreshed token takes effect on the next connect.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Tokens returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("credential file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Holds the current credential, optionally mirrored to a JSON file.
#[derive(Debug)]
pub struct CredentialStore {
    path: Option<PathBuf>,
    current: RwLock<Option<Credentials>>,
}

impl CredentialStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
        }
    }

    /// An in-memory store pre-loaded with an access token.
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            path: None,
            current: RwLock::new(Some(Credentials::new(access_token))),
        }
    }

    /// Open a file-backed store. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let current = read_file(&path)?;
        if current.is_some() {
            log::debug!("Loaded credential from {}", path.display());
        }
        Ok(Self {
            path: Some(path),
            current: RwLock::new(current),
        })
    }

    /// File-backed if `path` is given, in-memory otherwise.
    pub fn from_path(path: Option<&Path>) -> Result<Self, CredentialError> {
        match path {
            Some(path) => Self::open(path),
            None => Ok(Self::in_memory()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> Option<Credentials> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The access token, if one is stored and non-empty.
    pub fn access_token(&self) -> Option<String> {
        self.current()
            .map(|c| c.access_token)
            .filter(|token| !token.is_empty())
    }

    pub fn has_credential(&self) -> bool {
        self.access_token().is_some()
    }

    /// Replace the stored credential, writing it through to disk.
    pub fn save(&self, credentials: Credentials) -> Result<(), CredentialError> {
        if let Some(path) = &self.path {
            write_file(path, &credentials)?;
        }
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credentials);
        Ok(())
    }

    /// Forget the credential (logout).
    pub fn clear(&self) -> Result<(), CredentialError> {
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CredentialError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Option<Credentials>, CredentialError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CredentialError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| CredentialError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

fn write_file(path: &Path, credentials: &Credentials) -> Result<(), CredentialError> {
    let io_err = |source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_vec_pretty(credentials).map_err(|source| CredentialError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_err)
}
