use std::io::Write;

use csv::Writer;

use crate::store::AccountRecord;

/// Writes the account listing as CSV (`id,name,balance,currency`).
pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl Iterator<Item = AccountRecord>,
) -> Result<(), csv::Error>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for record in accounts {
        writer.serialize(record)?;
    }
    // Ensure all data is flushed to the output
    writer.flush()?;
    Ok(())
}
