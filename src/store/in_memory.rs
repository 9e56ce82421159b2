use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use crate::{
    account::{Account, AccountError},
    auth::CredentialHash,
};

use super::{AccountRecord, AccountStore, StoreError};

const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(200);

/// In-memory [`AccountStore`] with one lock per account, so operations on
/// disjoint accounts run fully in parallel. Pair updates always acquire
/// locks in name order, which keeps opposite-direction transfers between the
/// same two accounts from deadlocking. Lock waits are bounded; expiry
/// surfaces as [`StoreError::Contention`].
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Arc<Mutex<Account>>>>,
    next_id: AtomicU32,
    lock_wait: Duration,
    fail_commits: AtomicU32,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            lock_wait,
            fail_commits: AtomicU32::new(0),
        }
    }

    /// Arms a simulated storage failure for the next `n` commits. Updates
    /// hitting an armed failure return [`StoreError::Unavailable`] without
    /// persisting anything.
    pub fn fail_next_commits(&self, n: u32) {
        self.fail_commits.store(n, Ordering::SeqCst);
    }

    fn slot(&self, name: &str) -> Result<Arc<Mutex<Account>>, StoreError> {
        self.accounts
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn lock<'a>(
        &self,
        name: &str,
        slot: &'a Mutex<Account>,
    ) -> Result<MutexGuard<'a, Account>, StoreError> {
        slot.try_lock_for(self.lock_wait).ok_or_else(|| {
            warn!(account = name, "lock wait expired");
            StoreError::Contention(name.to_string())
        })
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut armed = self.fail_commits.load(Ordering::SeqCst);
        while armed > 0 {
            match self.fail_commits.compare_exchange(
                armed,
                armed - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Err(StoreError::Unavailable),
                Err(current) => armed = current,
            }
        }
        Ok(())
    }
}

impl AccountStore for InMemoryAccountStore {
    fn get(&self, name: &str) -> Result<Account, StoreError> {
        let slot = self.slot(name)?;
        let guard = self.lock(name, &slot)?;
        Ok(guard.clone())
    }

    fn create(&self, name: &str, credential: CredentialHash) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(name) {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        self.commit()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let account = Account::open(id, name, credential);
        accounts.insert(name.to_string(), Arc::new(Mutex::new(account.clone())));
        debug!(account = name, id, "account created");
        Ok(account)
    }

    fn update<T>(
        &self,
        name: &str,
        op: impl FnOnce(&mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError> {
        let slot = self.slot(name)?;
        let mut guard = self.lock(name, &slot)?;
        let mut draft = guard.clone();
        let out = op(&mut draft);
        if out.is_ok() {
            self.commit()?;
            *guard = draft;
        }
        Ok(out)
    }

    fn update_pair<T>(
        &self,
        a: &str,
        b: &str,
        op: impl FnOnce(&mut Account, &mut Account) -> Result<T, AccountError>,
    ) -> Result<Result<T, AccountError>, StoreError> {
        assert_ne!(a, b, "update_pair requires two distinct accounts");
        // both lookups must succeed before any lock is taken
        let slot_a = self.slot(a)?;
        let slot_b = self.slot(b)?;

        let mut guard_a;
        let mut guard_b;
        if a < b {
            guard_a = self.lock(a, &slot_a)?;
            guard_b = self.lock(b, &slot_b)?;
        } else {
            guard_b = self.lock(b, &slot_b)?;
            guard_a = self.lock(a, &slot_a)?;
        }

        let mut draft_a = guard_a.clone();
        let mut draft_b = guard_b.clone();
        let out = op(&mut draft_a, &mut draft_b);
        if out.is_ok() {
            self.commit()?;
            *guard_a = draft_a;
            *guard_b = draft_b;
        }
        Ok(out)
    }

    fn list(&self) -> Result<Vec<AccountRecord>, StoreError> {
        let accounts = self.accounts.read();
        let mut records = Vec::with_capacity(accounts.len());
        for (name, slot) in accounts.iter() {
            let guard = self.lock(name, slot)?;
            records.push(AccountRecord {
                id: guard.id(),
                name: guard.name().to_string(),
                balance: guard.balance(),
                currency: guard.currency().to_string(),
            });
        }
        records.sort_by_key(|record| record.id);
        Ok(records)
    }
}
