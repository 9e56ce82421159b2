use crate::{
    auth::AdminIdentity,
    store::{AccountRecord, AccountStore, StoreError},
};

/// Read-only reporting over the account store, gated on a verified
/// administrator identity.
pub struct AdminView<S> {
    store: S,
}

impl<S: AccountStore> AdminView<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All accounts in id order: identifier, name, balance and currency.
    /// No credentials, no histories.
    pub fn list_accounts(&self, _admin: &AdminIdentity) -> Result<Vec<AccountRecord>, StoreError> {
        self.store.list()
    }
}
