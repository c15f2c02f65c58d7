//! Defines the expense and transfer models and their tables.

use std::{collections::BTreeMap, fmt::Display};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Currency, group::GroupId, member::MemberId};

/// Database identifier for an expense header.
pub type ExpenseId = i64;

/// The opaque ID that ties an expense to its transfers.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap an ID produced by an [crate::IdGenerator].
    pub fn new(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for TransactionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The split as it was entered, kept alongside the expense for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseMetadata {
    /// How much each payer contributed.
    pub paid_by_shares: BTreeMap<MemberId, f64>,
    /// The percentage owed by each member.
    pub owed_percentages: BTreeMap<MemberId, f64>,
}

/// A shared cost recorded once by a member of a group.
///
/// Expenses are never modified after they are created, except to mark them as deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    /// The ID of the expense header.
    pub id: ExpenseId,
    /// The ID shared with the expense's transfers.
    pub transaction_id: TransactionId,
    /// What the expense was for.
    pub description: String,
    /// The total cost. Always positive.
    pub amount: f64,
    /// The currency of the expense and all of its transfers.
    pub currency: Currency,
    /// When the expense was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// The group the expense belongs to.
    pub group_id: GroupId,
    /// Who paid and who owes, as entered.
    pub metadata: ExpenseMetadata,
    /// When the expense was deleted, if it has been.
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

/// One line of the ledger: `from_member_id` owes `to_member_id` the `amount`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    /// The expense this transfer was derived from.
    pub transaction_id: TransactionId,
    /// The member who owes money.
    pub from_member_id: MemberId,
    /// The member who is owed money.
    pub to_member_id: MemberId,
    /// How much is owed. Never negative.
    pub amount: f64,
    /// The currency of the amount.
    pub currency: Currency,
    /// The group the transfer belongs to.
    pub group_id: GroupId,
    /// When the transfer was deleted along with its expense, if it has been.
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

/// An expense together with the transfers derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    /// The expense header.
    pub expense: Expense,
    /// The expense's transfers.
    pub transfers: Vec<Transfer>,
}

/// Create the table for expense headers.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS expense (
            id INTEGER PRIMARY KEY,
            transaction_id TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            currency TEXT NOT NULL,
            created_at TEXT NOT NULL,
            group_id INTEGER NOT NULL REFERENCES household(id),
            metadata TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_expense_group_live
            ON expense(group_id, deleted_at, created_at);",
    )?;

    Ok(())
}

/// Create the table for transfers, the lines of the ledger.
pub fn create_transfer_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS transfer (
            id INTEGER PRIMARY KEY,
            transaction_id TEXT NOT NULL REFERENCES expense(transaction_id),
            from_member_id INTEGER NOT NULL REFERENCES member(id),
            to_member_id INTEGER NOT NULL REFERENCES member(id),
            amount REAL NOT NULL CHECK (amount >= 0),
            currency TEXT NOT NULL,
            group_id INTEGER NOT NULL REFERENCES household(id),
            deleted_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transfer_transaction_id ON transfer(transaction_id);
        CREATE INDEX IF NOT EXISTS idx_transfer_group_live ON transfer(group_id, deleted_at);",
    )?;

    Ok(())
}

/// The columns read by [map_expense_row], in order.
pub(super) const EXPENSE_COLUMNS: &str =
    "id, transaction_id, description, amount, currency, created_at, group_id, metadata, deleted_at";

/// The columns read by [map_transfer_row], in order.
pub(super) const TRANSFER_COLUMNS: &str =
    "transaction_id, from_member_id, to_member_id, amount, currency, group_id, deleted_at";

pub(super) fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let raw_metadata: String = row.get(7)?;
    let metadata = serde_json::from_str(&raw_metadata).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Expense {
        id: row.get(0)?,
        transaction_id: TransactionId::new(row.get(1)?),
        description: row.get(2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        created_at: row.get(5)?,
        group_id: GroupId::new(row.get(6)?),
        metadata,
        deleted_at: row.get(8)?,
    })
}

pub(super) fn map_transfer_row(row: &Row) -> Result<Transfer, rusqlite::Error> {
    Ok(Transfer {
        transaction_id: TransactionId::new(row.get(0)?),
        from_member_id: MemberId::new(row.get(1)?),
        to_member_id: MemberId::new(row.get(2)?),
        amount: row.get(3)?,
        currency: row.get(4)?,
        group_id: GroupId::new(row.get(5)?),
        deleted_at: row.get(6)?,
    })
}
