use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::store::{AccountStore, StoreError};

/// Opaque secret-verification material. Only digests are kept; the secret
/// itself never outlives the registration or login call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHash(String);

/// Digests a secret, salted with the owning name so equal passwords on
/// different accounts never share a digest.
pub fn hash_credential(name: &str, secret: &str) -> CredentialHash {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    CredentialHash(hex::encode(hasher.finalize()))
}

impl CredentialHash {
    pub(crate) fn matches(&self, name: &str, secret: &str) -> bool {
        hash_credential(name, secret) == *self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Proof of a verified end-user login. Minted only by [`AuthGateway`];
/// ledger operations take one of these instead of consulting any ambient
/// session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
}

impl Identity {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Proof of a verified administrator login. Separate type from [`Identity`]
/// because the namespaces are disjoint and carry different capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    name: String,
}

impl AdminIdentity {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registration and login for end users, backed by the account store.
pub struct AuthGateway<S> {
    store: S,
}

impl<S: AccountStore> AuthGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates the account with the starting grant and an empty history.
    /// Registration counts as a verified login for the new name.
    pub fn register_user(&self, name: &str, password: &str) -> Result<Identity, AuthError> {
        self.store.create(name, hash_credential(name, password))?;
        debug!(account = name, "user registered");
        Ok(Identity {
            name: name.to_string(),
        })
    }

    pub fn login(&self, name: &str, password: &str) -> Result<Identity, AuthError> {
        let account = self.store.get(name)?;
        if !account.credential().matches(name, password) {
            return Err(AuthError::AuthenticationFailed);
        }
        Ok(Identity {
            name: name.to_string(),
        })
    }
}

/// Administrator credentials. Same registration/login shape as the user
/// namespace but disjoint from it, and with no monetary state at all.
pub struct AdminStore {
    admins: Mutex<HashMap<String, AdminRecord>>,
    next_id: AtomicU32,
}

#[derive(Debug)]
struct AdminRecord {
    #[allow(dead_code)]
    id: u32,
    credential: CredentialHash,
}

impl Default for AdminStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminStore {
    pub fn new() -> Self {
        Self {
            admins: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn register(&self, name: &str, password: &str) -> Result<AdminIdentity, AuthError> {
        let mut admins = self.admins.lock();
        if admins.contains_key(name) {
            return Err(StoreError::DuplicateName(name.to_string()).into());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        admins.insert(
            name.to_string(),
            AdminRecord {
                id,
                credential: hash_credential(name, password),
            },
        );
        debug!(admin = name, id, "admin registered");
        Ok(AdminIdentity {
            name: name.to_string(),
        })
    }

    pub fn login(&self, name: &str, password: &str) -> Result<AdminIdentity, AuthError> {
        let admins = self.admins.lock();
        let record = admins
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        if !record.credential.matches(name, password) {
            return Err(AuthError::AuthenticationFailed);
        }
        Ok(AdminIdentity {
            name: name.to_string(),
        })
    }
}
