//! Splitteur is a shared expense ledger for a household.
//!
//! Members of a group record expenses, say who paid what and who owes which
//! percentage, and the ledger turns every expense into pairwise IOUs. Net
//! balances between members are then read back per currency.
//!
//! This library holds the settlement engine, the SQLite ledger and the
//! balance aggregation. The binaries in `src/bin` wrap it in a command line
//! interface.

#![warn(missing_docs)]

mod balance;
mod currency;
mod db;
mod group;
mod id;
mod ledger;
mod logging;
mod member;
mod service;
mod session;
mod split;

pub use balance::{Balances, PairwiseTotal, aggregate_balances, get_pairwise_totals};
pub use currency::Currency;
pub use db::initialize as initialize_db;
pub use group::{Group, GroupId, GroupMetadata, create_group, get_group, update_group_metadata};
pub use id::{IdGenerator, RandomIdGenerator, TRANSACTION_ID_BYTES};
pub use ledger::{
    EXPENSE_PAGE_SIZE, Expense, ExpenseId, ExpenseMetadata, LedgerEntry, NewExpense, Transfer,
    TransactionId, create_expense, get_expense, list_expenses, soft_delete_expense,
};
pub use logging::setup_logging;
pub use member::{Member, MemberId, create_member, get_group_members, get_member};
pub use service::Ledger;
pub use session::{
    DEFAULT_SESSION_DURATION, SessionContext, SessionResolver, SqliteSessionResolver,
    create_session, delete_session, resolve_session,
};
pub use split::{
    MONEY_TOLERANCE, Settlement, SplitRequest, ValidatedSplit, calculate_settlements,
    parse_member_shares,
};

/// The broad class of an [Error], used by callers to decide how to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or policy-violating input. Not worth retrying unchanged.
    Validation,
    /// The session is invalid or the resource belongs to another group.
    Authorization,
    /// The referenced expense does not exist.
    NotFound,
    /// The database was unavailable or a write failed.
    ///
    /// The ledger is left in its pre-call state, so the caller may retry.
    Persistence,
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The currency is not one of the supported currency codes.
    #[error("invalid currency")]
    InvalidCurrency,

    /// The expense amount was zero, negative or not a number.
    #[error("invalid amount")]
    InvalidAmount,

    /// The expense description was empty.
    #[error("invalid description")]
    InvalidDescription,

    /// A paid share was negative, was paid by someone outside the group, or
    /// the paid shares did not add up to the expense amount.
    #[error("invalid paidByShares")]
    InvalidPaidShares,

    /// The members in the split did not match the members of the group.
    #[error("invalid splitIds")]
    InvalidSplitMembers,

    /// A split percentage was outside of [0, 100] or the percentages did not
    /// add up to 100.
    #[error("invalid splitPctShares")]
    InvalidSplitPercentages,

    /// A member ID could not be parsed from a string key.
    #[error("invalid member ID \"{0}\"")]
    InvalidMemberId(String),

    /// The session token was empty, unknown or has expired.
    #[error("invalid or expired session")]
    InvalidSession,

    /// The expense exists but belongs to a different group than the caller.
    #[error("the expense does not belong to your group")]
    ExpenseNotInGroup,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to delete an expense that does not exist or is already deleted.
    #[error("tried to delete an expense that is not in the database")]
    DeleteMissingExpense,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The operating system could not provide random bytes for a new ID.
    #[error("could not generate a random ID: {0}")]
    IdGenerationError(String),

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not (de)serialize JSON: {0}")]
    JSONSerializationError(String),
}

impl Error {
    /// The class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCurrency
            | Error::InvalidAmount
            | Error::InvalidDescription
            | Error::InvalidPaidShares
            | Error::InvalidSplitMembers
            | Error::InvalidSplitPercentages
            | Error::InvalidMemberId(_) => ErrorKind::Validation,
            Error::InvalidSession | Error::ExpenseNotInGroup => ErrorKind::Authorization,
            Error::NotFound | Error::DeleteMissingExpense => ErrorKind::NotFound,
            Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::IdGenerationError(_)
            | Error::JSONSerializationError(_) => ErrorKind::Persistence,
        }
    }

    /// Whether the caller may retry the failed operation as is.
    ///
    /// The ledger never retries on its own.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}
