//! Reading expenses and their transfers back out of the ledger.

use std::collections::HashMap;

use rusqlite::{Connection, ToSql, params_from_iter};

use crate::{
    Error,
    group::GroupId,
    ledger::core::{
        EXPENSE_COLUMNS, ExpenseId, LedgerEntry, TRANSFER_COLUMNS, Transfer, TransactionId,
        map_expense_row, map_transfer_row,
    },
};

/// The number of expenses returned per page by [list_expenses].
pub const EXPENSE_PAGE_SIZE: u64 = 5;

/// Retrieve an expense and all of its transfers, deleted or not.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no expense with `id`, or [Error::SqlError] if
/// there is some other SQL error.
pub fn get_expense(id: ExpenseId, connection: &Connection) -> Result<LedgerEntry, Error> {
    let expense = connection
        .prepare(&format!("SELECT {EXPENSE_COLUMNS} FROM expense WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_expense_row)?;

    let transfers = connection
        .prepare(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfer WHERE transaction_id = :transaction_id ORDER BY id"
        ))?
        .query_map(
            &[(":transaction_id", &expense.transaction_id.as_ref())],
            map_transfer_row,
        )?
        .map(|maybe_transfer| maybe_transfer.map_err(|error| error.into()))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(LedgerEntry { expense, transfers })
}

/// Retrieve a page of the live expenses in `group_id`, newest first, with their live transfers.
///
/// At most [EXPENSE_PAGE_SIZE] expenses are returned, skipping the first `offset`. Deleted
/// expenses and transfers are never returned.
///
/// # Errors
///
/// Returns [Error::SqlError] if there is an SQL error.
pub fn list_expenses(
    group_id: GroupId,
    offset: u64,
    connection: &Connection,
) -> Result<Vec<LedgerEntry>, Error> {
    // SQLite reads a negative offset as zero, so offsets past i64::MAX are past the end.
    let Ok(offset) = i64::try_from(offset) else {
        return Ok(Vec::new());
    };

    let expenses = connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense
            WHERE group_id = ?1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3"
        ))?
        .query_map(
            (group_id.as_i64(), EXPENSE_PAGE_SIZE as i64, offset),
            map_expense_row,
        )?
        .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
        .collect::<Result<Vec<_>, Error>>()?;

    if expenses.is_empty() {
        return Ok(Vec::new());
    }

    let mut transfers_by_transaction = get_live_transfers(
        expenses.iter().map(|expense| &expense.transaction_id),
        connection,
    )?;

    Ok(expenses
        .into_iter()
        .map(|expense| {
            let transfers = transfers_by_transaction
                .remove(&expense.transaction_id)
                .unwrap_or_default();

            LedgerEntry { expense, transfers }
        })
        .collect())
}

/// Fetch the live transfers for each of `transaction_ids` in a single query.
fn get_live_transfers<'a>(
    transaction_ids: impl Iterator<Item = &'a TransactionId>,
    connection: &Connection,
) -> Result<HashMap<TransactionId, Vec<Transfer>>, Error> {
    let transaction_ids: Vec<&str> = transaction_ids.map(|id| id.as_ref()).collect();
    let placeholders = vec!["?"; transaction_ids.len()].join(", ");
    let params: Vec<&dyn ToSql> = transaction_ids.iter().map(|id| id as &dyn ToSql).collect();

    let mut transfers_by_transaction: HashMap<TransactionId, Vec<Transfer>> = HashMap::new();
    let mut stmt = connection.prepare(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfer
        WHERE transaction_id IN ({placeholders}) AND deleted_at IS NULL
        ORDER BY id"
    ))?;

    for transfer in stmt.query_map(params_from_iter(params), map_transfer_row)? {
        let transfer = transfer?;
        transfers_by_transaction
            .entry(transfer.transaction_id.clone())
            .or_default()
            .push(transfer);
    }

    Ok(transfers_by_transaction)
}
