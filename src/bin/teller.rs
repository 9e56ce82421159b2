use std::fs::File;

use anyhow::{Context, Result};
use teller::account::AccountError;
use teller::bin_utils::{Service, ServiceError};
use teller::ledger::LedgerError;

fn main() -> Result<()> {
    let filename = std::env::args()
        .nth(1)
        .context("Expected a file name as the first argument")?;
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        error_printer: Box::new(|line, err| match err {
            // the zero-balance case gets its own wording, the failure is the same
            ServiceError::Ledger(LedgerError::Account(AccountError::InsufficientFunds {
                zero_balance: true,
            })) => {
                eprintln!("Error at line {line}: balance is zero, nothing to draw from")
            }
            err => eprintln!("Error at line {line}: {err}"),
        }),
    };
    service.run()
}
