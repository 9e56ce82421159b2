use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::{
    account::{AccountError, LedgerEntry},
    auth::Identity,
    store::{AccountStore, StoreError},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Balance mutations and statement queries over an [`AccountStore`]. Every
/// operation names its caller through a verified [`Identity`]; nothing here
/// keeps session state. Writes are single atomic read-modify-write updates
/// against the store, so concurrent callers can never interleave a stale
/// balance back in.
pub struct LedgerCore<S> {
    store: S,
}

impl<S: AccountStore> LedgerCore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cannot fail for insufficiency; only a missing account or a bad amount
    /// rejects a deposit.
    pub fn deposit(&self, who: &Identity, amount: Decimal) -> Result<LedgerEntry, LedgerError> {
        let out = self.store.update(who.name(), |acc| {
            let entry = acc.handle_deposit(amount)?;
            acc.apply(&entry);
            Ok(entry)
        })?;
        let entry = out?;
        debug!(account = who.name(), %amount, "deposit applied");
        Ok(entry)
    }

    pub fn withdraw(&self, who: &Identity, amount: Decimal) -> Result<LedgerEntry, LedgerError> {
        let out = self.store.update(who.name(), |acc| {
            let entry = acc.handle_withdrawal(amount)?;
            acc.apply(&entry);
            Ok(entry)
        })?;
        let entry = out?;
        debug!(account = who.name(), %amount, "withdrawal applied");
        Ok(entry)
    }

    /// Moves funds as one atomic unit: debit, credit and both history entries
    /// commit together or not at all. A transfer to oneself degenerates to a
    /// paired debit/credit on the same account and leaves the balance
    /// unchanged, but still requires the balance to cover the amount.
    pub fn transfer(
        &self,
        from: &Identity,
        to: &str,
        amount: Decimal,
    ) -> Result<(LedgerEntry, LedgerEntry), LedgerError> {
        if from.name() == to {
            return self.self_transfer(from, amount);
        }
        let out = self.store.update_pair(from.name(), to, |src, dst| {
            let outgoing = src.handle_transfer_out(dst.name(), amount)?;
            let incoming = dst.handle_transfer_in(src.name(), amount)?;
            src.apply(&outgoing);
            dst.apply(&incoming);
            Ok((outgoing, incoming))
        })?;
        let entries = out?;
        debug!(from = from.name(), to, %amount, "transfer applied");
        Ok(entries)
    }

    fn self_transfer(
        &self,
        who: &Identity,
        amount: Decimal,
    ) -> Result<(LedgerEntry, LedgerEntry), LedgerError> {
        let out = self.store.update(who.name(), |acc| {
            let outgoing = acc.handle_transfer_out(who.name(), amount)?;
            acc.apply(&outgoing);
            let incoming = acc.handle_transfer_in(who.name(), amount)?;
            acc.apply(&incoming);
            Ok((outgoing, incoming))
        })?;
        Ok(out?)
    }

    /// Full history in chronological order. Read-only and idempotent.
    pub fn statement(&self, who: &Identity) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.store.get(who.name())?.history().to_vec())
    }

    /// Same as [`statement`](Self::statement) but rendered in the persisted
    /// line format.
    pub fn statement_text(&self, who: &Identity) -> Result<String, LedgerError> {
        Ok(self.store.get(who.name())?.render_history())
    }

    pub fn check_balance(&self, who: &Identity) -> Result<Decimal, LedgerError> {
        Ok(self.store.get(who.name())?.balance())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        account::EntryKind,
        auth::AuthGateway,
        store::in_memory::InMemoryAccountStore,
    };

    use super::*;

    fn register(store: &InMemoryAccountStore, name: &str) -> Identity {
        AuthGateway::new(store).register_user(name, "pw").unwrap()
    }

    #[test]
    fn withdraw_reduces_balance_and_appends_entry() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let ledger = LedgerCore::new(&store);

        assert_eq!(ledger.check_balance(&alice).unwrap(), dec!(1000.00));
        let entry = ledger.withdraw(&alice, dec!(400)).unwrap();
        assert_eq!(*entry.kind(), EntryKind::Withdrawal);
        assert_eq!(ledger.check_balance(&alice).unwrap(), dec!(600.00));
        assert_eq!(ledger.statement(&alice).unwrap().len(), 1);
    }

    #[test]
    fn overdraw_fails_and_changes_nothing() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let ledger = LedgerCore::new(&store);
        ledger.withdraw(&alice, dec!(400)).unwrap();

        let err = ledger.withdraw(&alice, dec!(1000)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Account(AccountError::InsufficientFunds {
                zero_balance: false
            })
        );
        assert_eq!(ledger.check_balance(&alice).unwrap(), dec!(600.00));
        assert_eq!(ledger.statement(&alice).unwrap().len(), 1);
    }

    #[test]
    fn transfer_moves_funds_and_records_both_sides() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let bob = register(&store, "bob");
        let ledger = LedgerCore::new(&store);
        ledger.withdraw(&alice, dec!(400)).unwrap();

        let before = ledger.check_balance(&alice).unwrap() + ledger.check_balance(&bob).unwrap();
        let (outgoing, incoming) = ledger.transfer(&alice, "bob", dec!(600)).unwrap();
        assert_eq!(
            *outgoing.kind(),
            EntryKind::TransferOut {
                to: "bob".to_string()
            }
        );
        assert_eq!(
            *incoming.kind(),
            EntryKind::TransferIn {
                from: "alice".to_string()
            }
        );
        assert_eq!(outgoing.amount(), incoming.amount());

        assert_eq!(ledger.check_balance(&alice).unwrap(), dec!(0.00));
        assert_eq!(ledger.check_balance(&bob).unwrap(), dec!(1600.00));
        // conservation: the pair's total is exactly what it was before
        let after = ledger.check_balance(&alice).unwrap() + ledger.check_balance(&bob).unwrap();
        assert_eq!(before, after);

        let alice_history = ledger.statement(&alice).unwrap();
        assert_eq!(alice_history.last().unwrap().counterparty(), Some("bob"));
        let bob_history = ledger.statement(&bob).unwrap();
        assert_eq!(bob_history.last().unwrap().counterparty(), Some("alice"));
    }

    #[test]
    fn withdrawal_from_empty_account_reports_zero_balance() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let ledger = LedgerCore::new(&store);
        ledger.withdraw(&alice, dec!(1000.00)).unwrap();

        let err = ledger.withdraw(&alice, dec!(25)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Account(AccountError::InsufficientFunds { zero_balance: true })
        );
    }

    #[test]
    fn transfer_to_missing_account_mutates_nothing() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let ledger = LedgerCore::new(&store);

        let err = ledger.transfer(&alice, "nobody", dec!(100)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Store(StoreError::NotFound("nobody".to_string()))
        );
        assert_eq!(ledger.check_balance(&alice).unwrap(), dec!(1000.00));
        assert!(ledger.statement(&alice).unwrap().is_empty());
    }

    #[test]
    fn self_transfer_is_balance_neutral() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let ledger = LedgerCore::new(&store);

        ledger.transfer(&alice, "alice", dec!(100)).unwrap();
        assert_eq!(ledger.check_balance(&alice).unwrap(), dec!(1000.00));
        assert_eq!(ledger.statement(&alice).unwrap().len(), 2);

        // still requires a covering balance
        let err = ledger.transfer(&alice, "alice", dec!(5000)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Account(AccountError::InsufficientFunds {
                zero_balance: false
            })
        );
    }

    #[test]
    fn invalid_amounts_are_rejected() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let bob = register(&store, "bob");
        let ledger = LedgerCore::new(&store);

        for err in [
            ledger.deposit(&alice, dec!(0)).unwrap_err(),
            ledger.withdraw(&alice, dec!(-3)).unwrap_err(),
            ledger.transfer(&alice, bob.name(), dec!(0)).unwrap_err(),
        ] {
            assert_eq!(err, LedgerError::Account(AccountError::InvalidAmount));
        }
        assert_eq!(ledger.check_balance(&alice).unwrap(), dec!(1000.00));
        assert_eq!(ledger.check_balance(&bob).unwrap(), dec!(1000.00));
    }

    #[test]
    fn reads_are_idempotent() {
        let store = InMemoryAccountStore::new();
        let alice = register(&store, "alice");
        let ledger = LedgerCore::new(&store);
        ledger.deposit(&alice, dec!(12.34)).unwrap();
        ledger.withdraw(&alice, dec!(2)).unwrap();

        assert_eq!(
            ledger.statement(&alice).unwrap(),
            ledger.statement(&alice).unwrap()
        );
        assert_eq!(
            ledger.statement_text(&alice).unwrap(),
            ledger.statement_text(&alice).unwrap()
        );
        assert_eq!(
            ledger.check_balance(&alice).unwrap(),
            ledger.check_balance(&alice).unwrap()
        );
    }
}
