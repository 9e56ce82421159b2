use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::auth::CredentialHash;

pub type AccountId = u32;

/// Balance every account opens with.
pub const STARTING_GRANT: Decimal = dec!(1000.00);

/// Currency assigned at creation; there is no conversion, so one code suffices.
pub const DEFAULT_CURRENCY: &str = "CNY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    TransferOut { to: String },
    TransferIn { from: String },
}

/// One immutable record of a balance-affecting event. The signed effect on
/// the balance is implied by `kind`; `amount` is always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    timestamp: DateTime<Utc>,
    kind: EntryKind,
    amount: Decimal,
}

impl LedgerEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn counterparty(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Deposit | EntryKind::Withdrawal => None,
            EntryKind::TransferOut { to } => Some(to),
            EntryKind::TransferIn { from } => Some(from),
        }
    }

    /// Stable one-line ledger format: timestamp followed by a kind-specific
    /// phrase. Existing consumers parse these lines, so the shape must not
    /// change.
    pub fn render(&self, owner: &str) -> String {
        let ts = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        let amount = self.amount;
        match &self.kind {
            EntryKind::Deposit => format!("{ts} {owner} deposited {amount:.2}"),
            EntryKind::Withdrawal => format!("{ts} {owner} withdrew {amount:.2}"),
            EntryKind::TransferOut { to } => {
                format!("{ts} {owner} sent {amount:.2} to {to}")
            }
            EntryKind::TransferIn { from } => {
                format!("{ts} {owner} received {amount:.2} from {from}")
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("amount must be a positive number")]
    InvalidAmount,
    /// `zero_balance` flags the exact-zero case so callers can message it
    /// differently; it is the same failure as far as control flow goes.
    #[error("insufficient funds")]
    InsufficientFunds { zero_balance: bool },
}

/// A named account with its full append-only history. Instances are always
/// snapshots or lock-guarded drafts handed out by the store; nothing mutates
/// an `Account` outside a store update.
#[derive(Debug, Clone)]
pub struct Account {
    id: AccountId,
    name: String,
    credential: CredentialHash,
    balance: Decimal,
    currency: String,
    history: Vec<LedgerEntry>,
}

impl Account {
    pub fn open(id: AccountId, name: &str, credential: CredentialHash) -> Self {
        Self {
            id,
            name: name.to_string(),
            credential,
            balance: STARTING_GRANT,
            currency: DEFAULT_CURRENCY.to_string(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn history(&self) -> &[LedgerEntry] {
        &self.history
    }

    pub(crate) fn credential(&self) -> &CredentialHash {
        &self.credential
    }

    /// Timestamps must be monotonic within one history, so a burst of entries
    /// landing on the same clock reading gets nudged forward.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.history.last() {
            Some(prev) if prev.timestamp >= now => prev.timestamp + Duration::microseconds(1),
            _ => now,
        }
    }

    pub fn handle_deposit(&self, amount: Decimal) -> Result<LedgerEntry, AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        Ok(LedgerEntry {
            timestamp: self.next_timestamp(),
            kind: EntryKind::Deposit,
            amount,
        })
    }

    pub fn handle_withdrawal(&self, amount: Decimal) -> Result<LedgerEntry, AccountError> {
        self.check_debit(amount)?;
        Ok(LedgerEntry {
            timestamp: self.next_timestamp(),
            kind: EntryKind::Withdrawal,
            amount,
        })
    }

    pub fn handle_transfer_out(
        &self,
        to: &str,
        amount: Decimal,
    ) -> Result<LedgerEntry, AccountError> {
        self.check_debit(amount)?;
        Ok(LedgerEntry {
            timestamp: self.next_timestamp(),
            kind: EntryKind::TransferOut { to: to.to_string() },
            amount,
        })
    }

    pub fn handle_transfer_in(
        &self,
        from: &str,
        amount: Decimal,
    ) -> Result<LedgerEntry, AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        Ok(LedgerEntry {
            timestamp: self.next_timestamp(),
            kind: EntryKind::TransferIn {
                from: from.to_string(),
            },
            amount,
        })
    }

    fn check_debit(&self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        if self.balance < amount {
            return Err(AccountError::InsufficientFunds {
                zero_balance: self.balance == Decimal::ZERO,
            });
        }
        Ok(())
    }

    /// Applies an entry produced by one of the `handle_*` methods: adjusts the
    /// balance and appends to the history. The entry is the source of truth,
    /// no further validation happens here.
    pub fn apply(&mut self, entry: &LedgerEntry) {
        match entry.kind {
            EntryKind::Deposit | EntryKind::TransferIn { .. } => self.balance += entry.amount,
            EntryKind::Withdrawal | EntryKind::TransferOut { .. } => self.balance -= entry.amount,
        }
        self.history.push(entry.clone());
    }

    /// Full history in the persisted line format, newline-joined with no
    /// trailing separator.
    pub fn render_history(&self) -> String {
        self.history
            .iter()
            .map(|entry| entry.render(&self.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use crate::auth::hash_credential;

    use super::*;

    fn account() -> Account {
        Account::open(1, "alice", hash_credential("alice", "pw"))
    }

    #[test]
    fn opens_with_starting_grant() {
        let acc = account();
        assert_eq!(acc.balance(), dec!(1000.00));
        assert_eq!(acc.currency(), "CNY");
        assert!(acc.history().is_empty());
    }

    #[test]
    fn apply_adjusts_balance_and_appends() {
        let mut acc = account();
        let deposit = acc.handle_deposit(dec!(250.50)).unwrap();
        acc.apply(&deposit);
        assert_eq!(acc.balance(), dec!(1250.50));

        let withdrawal = acc.handle_withdrawal(dec!(50)).unwrap();
        acc.apply(&withdrawal);
        assert_eq!(acc.balance(), dec!(1200.50));

        let out = acc.handle_transfer_out("bob", dec!(200.50)).unwrap();
        acc.apply(&out);
        let incoming = acc.handle_transfer_in("bob", dec!(1)).unwrap();
        acc.apply(&incoming);
        assert_eq!(acc.balance(), dec!(1001.00));
        assert_eq!(acc.history().len(), 4);
        assert_eq!(acc.history()[2].counterparty(), Some("bob"));
        assert_eq!(acc.history()[0].counterparty(), None);
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let acc = account();
        assert_eq!(
            acc.handle_deposit(Decimal::ZERO).unwrap_err(),
            AccountError::InvalidAmount
        );
        assert_eq!(
            acc.handle_withdrawal(dec!(-5)).unwrap_err(),
            AccountError::InvalidAmount
        );
        assert_eq!(
            acc.handle_transfer_in("bob", Decimal::ZERO).unwrap_err(),
            AccountError::InvalidAmount
        );
    }

    #[test]
    fn distinguishes_zero_balance_from_plain_shortfall() {
        let mut acc = account();
        let err = acc.handle_withdrawal(dec!(2000)).unwrap_err();
        assert_eq!(
            err,
            AccountError::InsufficientFunds {
                zero_balance: false
            }
        );

        let drain = acc.handle_withdrawal(dec!(1000.00)).unwrap();
        acc.apply(&drain);
        assert_eq!(acc.balance(), Decimal::ZERO);

        let err = acc.handle_withdrawal(dec!(0.01)).unwrap_err();
        assert_eq!(err, AccountError::InsufficientFunds { zero_balance: true });
        let err = acc.handle_transfer_out("bob", dec!(0.01)).unwrap_err();
        assert_eq!(err, AccountError::InsufficientFunds { zero_balance: true });
    }

    #[test]
    fn timestamps_are_monotonic_within_history() {
        let mut acc = account();
        for _ in 0..50 {
            let entry = acc.handle_deposit(dec!(1)).unwrap();
            acc.apply(&entry);
        }
        let stamps: Vec<_> = acc.history().iter().map(|e| e.timestamp()).collect();
        for pair in stamps.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn renders_stable_line_format() {
        let mut acc = account();
        let entry = acc.handle_deposit(dec!(25)).unwrap();
        acc.apply(&entry);
        let entry = acc.handle_withdrawal(dec!(10.50)).unwrap();
        acc.apply(&entry);
        let entry = acc.handle_transfer_out("bob", dec!(5)).unwrap();
        acc.apply(&entry);
        let entry = acc.handle_transfer_in("bob", dec!(7)).unwrap();
        acc.apply(&entry);

        let text = acc.render_history();
        assert!(!text.ends_with('\n'));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("alice deposited 25.00"));
        assert!(lines[1].ends_with("alice withdrew 10.50"));
        assert!(lines[2].ends_with("alice sent 5.00 to bob"));
        assert!(lines[3].ends_with("alice received 7.00 from bob"));
        for line in lines {
            assert!(NaiveDateTime::parse_from_str(&line[..19], "%Y-%m-%d %H:%M:%S").is_ok());
        }
    }
}
