//! Storage for the last-used root directory.

use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

pub const KEYRING_SERVICE: &str = "file_organizer";
pub const LAST_PATH_ACCOUNT: &str = "last_path";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("secret store is poisoned")]
    Poisoned,
}

/// A single remembered string.
pub trait SecretStore: Send + Sync {
    /// The stored value, `None` when nothing was stored yet.
    fn get(&self) -> Result<Option<String>, SecretError>;

    fn set(&self, value: &str) -> Result<(), SecretError>;
}

/// OS keyring entry.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, SecretError> {
        Ok(keyring::Entry::new(&self.service, &self.account)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE, LAST_PATH_ACCOUNT)
    }
}

impl SecretStore for KeyringStore {
    fn get(&self) -> Result<Option<String>, SecretError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!("no {} entry in keyring", self.account);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, value: &str) -> Result<(), SecretError> {
        self.entry()?.set_password(value)?;
        Ok(())
    }
}

/// In-process store, used by tests and when no keyring is wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl SecretStore for MemoryStore {
    fn get(&self) -> Result<Option<String>, SecretError> {
        self.value
            .lock()
            .map(|v| v.clone())
            .map_err(|_| SecretError::Poisoned)
    }

    fn set(&self, value: &str) -> Result<(), SecretError> {
        let mut slot = self.value.lock().map_err(|_| SecretError::Poisoned)?;
        *slot = Some(value.to_string());
        Ok(())
    }
}
