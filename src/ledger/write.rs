//! Writing expenses and their transfers to the ledger as one unit.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    group::GroupId,
    id::IdGenerator,
    ledger::core::{Expense, ExpenseId, ExpenseMetadata, LedgerEntry, Transfer, TransactionId},
    split::{Settlement, ValidatedSplit, calculate_settlements},
};

/// A validated expense and its transfers, ready to be written.
///
/// The only way to build one outside of this crate is [NewExpense::new], so the transfers
/// written by [create_expense] always come from [calculate_settlements]:
///
/// ```compile_fail
/// use splitteur_rs::NewExpense;
///
/// fn drop_transfers(new_expense: &mut NewExpense) {
///     new_expense.settlements.clear();
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub(crate) group_id: GroupId,
    pub(crate) split: ValidatedSplit,
    pub(crate) settlements: Vec<Settlement>,
    pub(crate) created_at: OffsetDateTime,
}

impl NewExpense {
    /// Prepare `split` to be written to `group_id`, working out its transfers.
    pub fn new(group_id: GroupId, split: ValidatedSplit, created_at: OffsetDateTime) -> Self {
        let settlements = calculate_settlements(&split);

        Self {
            group_id,
            split,
            settlements,
            created_at,
        }
    }
    /// The transfers that will be written with the expense.
    pub fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }
}

/// Write the expense header and all of its transfers under a fresh transaction ID.
///
/// The header and the transfers are written in one database transaction. If any row fails to
/// write, nothing is kept and no reader ever sees a header without its transfers or the other
/// way around.
///
/// # Errors
///
/// Returns an error if no transaction ID could be generated, the metadata could not be
/// serialized, or any of the writes failed.
pub fn create_expense(
    new_expense: NewExpense,
    id_generator: &dyn IdGenerator,
    connection: &Connection,
) -> Result<LedgerEntry, Error> {
    let transaction_id = TransactionId::new(id_generator.generate_id()?);
    let NewExpense {
        group_id,
        split,
        settlements,
        created_at,
    } = new_expense;

    let metadata = ExpenseMetadata {
        paid_by_shares: split.paid_shares().clone(),
        owed_percentages: split.owed_percentages().clone(),
    };

    let tx = connection.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO expense (transaction_id, description, amount, currency, created_at, group_id, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            transaction_id.as_ref(),
            split.description(),
            split.amount(),
            split.currency(),
            created_at,
            group_id.as_i64(),
            serde_json::to_string(&metadata)?,
        ),
    )?;
    let expense_id = tx.last_insert_rowid();

    let mut transfers = Vec::with_capacity(settlements.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO transfer (transaction_id, from_member_id, to_member_id, amount, currency, group_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for settlement in settlements {
            stmt.execute((
                transaction_id.as_ref(),
                settlement.from.as_i64(),
                settlement.to.as_i64(),
                settlement.amount,
                split.currency(),
                group_id.as_i64(),
            ))?;

            transfers.push(Transfer {
                transaction_id: transaction_id.clone(),
                from_member_id: settlement.from,
                to_member_id: settlement.to,
                amount: settlement.amount,
                currency: split.currency(),
                group_id,
                deleted_at: None,
            });
        }
    }

    tx.commit().inspect_err(|error| {
        tracing::error!("could not commit expense {transaction_id}: {error}")
    })?;

    tracing::info!(
        "created expense {expense_id} ({transaction_id}) in group {group_id} with {} transfers",
        transfers.len()
    );

    Ok(LedgerEntry {
        expense: Expense {
            id: expense_id,
            transaction_id,
            description: split.description().to_owned(),
            amount: split.amount(),
            currency: split.currency(),
            created_at,
            group_id,
            metadata,
            deleted_at: None,
        },
        transfers,
    })
}

/// Mark the expense `expense_id` and every transfer derived from it as deleted.
///
/// The expense must belong to `group_id`. The header and the transfers are updated in one
/// database transaction, so either all of them are deleted or none are.
///
/// # Errors
///
/// This function will return an error if:
/// - the expense does not exist or is already deleted, [Error::DeleteMissingExpense],
/// - the expense belongs to another group, [Error::ExpenseNotInGroup],
/// - any of the queries failed.
///
/// No rows are written when an error is returned.
pub fn soft_delete_expense(
    expense_id: ExpenseId,
    group_id: GroupId,
    deleted_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    let (transaction_id, expense_group_id, already_deleted_at) = tx
        .prepare("SELECT transaction_id, group_id, deleted_at FROM expense WHERE id = :id")?
        .query_row(&[(":id", &expense_id)], |row| {
            Ok((
                TransactionId::new(row.get(0)?),
                GroupId::new(row.get(1)?),
                row.get::<_, Option<OffsetDateTime>>(2)?,
            ))
        })
        .map_err(|error| match Error::from(error) {
            Error::NotFound => Error::DeleteMissingExpense,
            error => error,
        })?;

    if expense_group_id != group_id {
        tracing::warn!(
            "group {group_id} tried to delete expense {expense_id} of group {expense_group_id}"
        );
        return Err(Error::ExpenseNotInGroup);
    }

    if already_deleted_at.is_some() {
        return Err(Error::DeleteMissingExpense);
    }

    tx.execute(
        "UPDATE transfer SET deleted_at = ?1 WHERE transaction_id = ?2 AND deleted_at IS NULL",
        (deleted_at, transaction_id.as_ref()),
    )?;

    let rows_affected = tx.execute(
        "UPDATE expense SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        (deleted_at, expense_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingExpense);
    }

    tx.commit().inspect_err(|error| {
        tracing::error!("could not commit deletion of expense {expense_id}: {error}")
    })?;

    tracing::info!("deleted expense {expense_id} ({transaction_id}) in group {group_id}");

    Ok(())
}
