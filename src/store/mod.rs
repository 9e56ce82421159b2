use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::{
    account::{Account, AccountError, AccountId},
    auth::CredentialHash,
};

pub mod in_memory;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("account `{0}` does not exist")]
    NotFound(String),
    #[error("account `{0}` already exists")]
    DuplicateName(String),
    /// The account locks could not be acquired within the bounded wait.
    /// Retryable; the store itself never retries.
    #[error("account `{0}` is busy, retry the operation")]
    Contention(String),
    #[error("storage unavailable")]
    Unavailable,
}

/// Reporting surface for administrative listings. Deliberately omits the
/// credential and the raw history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub name: String,
    pub balance: Decimal,
    pub currency: String,
}

/// Durable keyed storage of accounts. Updates run the supplied closure
/// against a draft under the account lock and commit all-or-nothing: a
/// business error from the closure, or a storage failure at commit, leaves
/// the stored account(s) untouched.
///
/// The outer `Result` carries storage failures, the inner one business-rule
/// failures from the closure.
pub trait AccountStore {
    fn get(&self, name: &str) -> Result<Account, StoreError>;

    fn create(&self, name: &str, credential: CredentialHash) -> Result<Account, StoreError>;

    fn update<T>(
        &self,
        name: &str,
        op: impl FnOnce(&mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError>;

    /// Atomic update of two distinct accounts as a single unit. Callers must
    /// pass distinct names; lock acquisition order is fixed by the store, not
    /// by argument order.
    fn update_pair<T>(
        &self,
        a: &str,
        b: &str,
        op: impl FnOnce(&mut Account, &mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError>;

    fn list(&self) -> Result<Vec<AccountRecord>, StoreError>;
}

impl<S: AccountStore + ?Sized> AccountStore for &S {
    fn get(&self, name: &str) -> Result<Account, StoreError> {
        (**self).get(name)
    }

    fn create(&self, name: &str, credential: CredentialHash) -> Result<Account, StoreError> {
        (**self).create(name, credential)
    }

    fn update<T>(
        &self,
        name: &str,
        op: impl FnOnce(&mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError> {
        (**self).update(name, op)
    }

    fn update_pair<T>(
        &self,
        a: &str,
        b: &str,
        op: impl FnOnce(&mut Account, &mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError> {
        (**self).update_pair(a, b, op)
    }

    fn list(&self) -> Result<Vec<AccountRecord>, StoreError> {
        (**self).list()
    }
}

impl<S: AccountStore + ?Sized> AccountStore for Arc<S> {
    fn get(&self, name: &str) -> Result<Account, StoreError> {
        (**self).get(name)
    }

    fn create(&self, name: &str, credential: CredentialHash) -> Result<Account, StoreError> {
        (**self).create(name, credential)
    }

    fn update<T>(
        &self,
        name: &str,
        op: impl FnOnce(&mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError> {
        (**self).update(name, op)
    }

    fn update_pair<T>(
        &self,
        a: &str,
        b: &str,
        op: impl FnOnce(&mut Account, &mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError> {
        (**self).update_pair(a, b, op)
    }

    fn list(&self) -> Result<Vec<AccountRecord>, StoreError> {
        (**self).list()
    }
}
