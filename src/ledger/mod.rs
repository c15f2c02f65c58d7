//! The expense ledger: expense headers, the transfers derived from them, and the
//! operations that write and read them.

mod core;
mod list;
mod write;

pub use core::{
    Expense, ExpenseId, ExpenseMetadata, LedgerEntry, Transfer, TransactionId,
    create_expense_table, create_transfer_table,
};
pub use list::{EXPENSE_PAGE_SIZE, get_expense, list_expenses};
pub use write::{NewExpense, create_expense, soft_delete_expense};
