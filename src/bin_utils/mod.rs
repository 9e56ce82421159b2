//! Batch driver for the ledger: reads operation rows, resolves identities
//! through the auth gateways, and issues typed requests to the core. All
//! raw-string concerns live here; amounts are rounded to the currency's two
//! minor-unit digits at this boundary, and login sessions are plain driver
//! state, never visible to the core.

use std::{
    collections::HashMap,
    io::{Read, Write},
};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    auth::{AdminIdentity, AdminStore, AuthError, AuthGateway, Identity},
    ledger::{LedgerCore, LedgerError},
    report::AdminView,
    store::{AccountStore, in_memory::InMemoryAccountStore},
};
use csv_parser::{CsvOperationParser, Operation, OperationKind};
use csv_printer::print_accounts;

pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{op:?} requires a password")]
    PasswordRequired { op: OperationKind },
    #[error("{op:?} requires an amount")]
    AmountRequired { op: OperationKind },
    #[error("{op:?} requires a counterparty")]
    CounterpartyRequired { op: OperationKind },
    #[error("user `{user}` is not logged in")]
    NotLoggedIn { user: String },
    #[error("admin `{user}` is not logged in")]
    AdminNotLoggedIn { user: String },
    #[error("failed to render account listing")]
    Listing(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub error_printer: Box<dyn FnMut(u64, ServiceError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input);

        let store = InMemoryAccountStore::new();
        let mut runtime = Runtime::new(&store);

        for (line, op) in parser {
            match runtime.execute(op) {
                Ok(Some(text)) => {
                    writeln!(self.output, "{text}").context("failed to write output")?
                }
                Ok(None) => {}
                Err(err) => (self.error_printer)(line, err),
            }
        }
        Ok(())
    }
}

struct Runtime<S> {
    auth: AuthGateway<S>,
    ledger: LedgerCore<S>,
    view: AdminView<S>,
    admins: AdminStore,
    sessions: HashMap<String, Identity>,
    admin_sessions: HashMap<String, AdminIdentity>,
}

impl<S: AccountStore + Clone> Runtime<S> {
    fn new(store: S) -> Self {
        Self {
            auth: AuthGateway::new(store.clone()),
            ledger: LedgerCore::new(store.clone()),
            view: AdminView::new(store),
            admins: AdminStore::new(),
            sessions: HashMap::new(),
            admin_sessions: HashMap::new(),
        }
    }

    /// Executes one operation; `Ok(Some(text))` is user-visible output.
    fn execute(&mut self, op: Operation) -> Result<Option<String>, ServiceError> {
        match op.op {
            OperationKind::Register => {
                let password = require_password(&op)?;
                self.auth.register_user(&op.user, password)?;
                Ok(Some(format!("{} registered", op.user)))
            }
            OperationKind::Login => {
                let password = require_password(&op)?;
                let identity = self.auth.login(&op.user, password)?;
                self.sessions.insert(op.user.clone(), identity);
                Ok(Some(format!("{} logged in", op.user)))
            }
            OperationKind::CheckBalance => {
                let identity = self.session(&op.user)?;
                let balance = self.ledger.check_balance(identity)?;
                Ok(Some(format!("{} balance: {balance:.2}", op.user)))
            }
            OperationKind::Deposit => {
                let identity = self.session(&op.user)?;
                let amount = require_amount(&op)?;
                let entry = self.ledger.deposit(identity, amount)?;
                Ok(Some(entry.render(&op.user)))
            }
            OperationKind::Withdraw => {
                let identity = self.session(&op.user)?;
                let amount = require_amount(&op)?;
                let entry = self.ledger.withdraw(identity, amount)?;
                Ok(Some(entry.render(&op.user)))
            }
            OperationKind::Statement => {
                let identity = self.session(&op.user)?;
                Ok(Some(self.ledger.statement_text(identity)?))
            }
            OperationKind::Transfer => {
                let identity = self.session(&op.user)?;
                let to = op
                    .counterparty
                    .as_deref()
                    .ok_or(ServiceError::CounterpartyRequired { op: op.op })?;
                let amount = require_amount(&op)?;
                let (outgoing, _) = self.ledger.transfer(identity, to, amount)?;
                Ok(Some(outgoing.render(&op.user)))
            }
            OperationKind::AdminRegister => {
                let password = require_password(&op)?;
                self.admins.register(&op.user, password)?;
                Ok(Some(format!("admin {} registered", op.user)))
            }
            OperationKind::AdminLogin => {
                let password = require_password(&op)?;
                let admin = self.admins.login(&op.user, password)?;
                self.admin_sessions.insert(op.user.clone(), admin);
                Ok(Some(format!("admin {} logged in", op.user)))
            }
            OperationKind::ListAccounts => {
                let admin =
                    self.admin_sessions
                        .get(&op.user)
                        .ok_or_else(|| ServiceError::AdminNotLoggedIn {
                            user: op.user.clone(),
                        })?;
                let records = self.view.list_accounts(admin)?;
                let mut buf = Vec::new();
                print_accounts(&mut buf, records.into_iter())?;
                Ok(Some(
                    String::from_utf8_lossy(&buf).trim_end().to_string(),
                ))
            }
        }
    }

    fn session(&self, user: &str) -> Result<&Identity, ServiceError> {
        self.sessions
            .get(user)
            .ok_or_else(|| ServiceError::NotLoggedIn {
                user: user.to_string(),
            })
    }
}

fn require_password(op: &Operation) -> Result<&str, ServiceError> {
    op.password
        .as_deref()
        .ok_or(ServiceError::PasswordRequired { op: op.op })
}

/// Amounts are rounded to the currency's two fractional digits here, at the
/// textual boundary; the core only ever sees pre-validated decimals.
fn require_amount(op: &Operation) -> Result<Decimal, ServiceError> {
    op.amount
        .map(|amount| amount.round_dp(2))
        .ok_or(ServiceError::AmountRequired { op: op.op })
}
