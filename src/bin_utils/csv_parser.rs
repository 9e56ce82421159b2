use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

/// The ten actions of the command surface. Anything else fails to parse
/// here and never reaches the core.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Register,
    Login,
    CheckBalance,
    Deposit,
    Withdraw,
    Statement,
    Transfer,
    AdminRegister,
    AdminLogin,
    ListAccounts,
}

#[derive(Debug, Deserialize)]
pub struct Operation {
    pub op: OperationKind,
    pub user: String,
    pub password: Option<String>,
    pub counterparty: Option<String>,
    pub amount: Option<Decimal>,
}

/// Parses an operation list in CSV format
/// (`op,user,password,counterparty,amount`).
///
/// # Panics
///
/// If a row cannot be parsed
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, Operation>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, Operation);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row.unwrap()))
    }
}
