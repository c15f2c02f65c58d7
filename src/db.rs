//! Setting up the application database.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use time::OffsetDateTime;

use crate::{
    group::create_group_table,
    ledger::{create_expense_table, create_transfer_table},
    member::create_member_table,
    session::create_session_table,
};

/// Enable foreign key checks and create every table the ledger needs.
///
/// Tables are created in dependency order inside one transaction, so a database is never left
/// half initialised. Calling this on an initialised database is a no-op.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_group_table(&transaction)?;
    create_member_table(&transaction)?;
    create_session_table(&transaction)?;
    create_expense_table(&transaction)?;
    create_transfer_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// The current time in UTC, truncated to whole seconds.
///
/// Timestamps are stored as text, so dropping the sub-second part keeps stored values and the
/// values handed back to callers equal.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}
