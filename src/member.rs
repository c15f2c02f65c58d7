//! Code for creating the member table and fetching members from the database.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, group::GroupId};

/// A newtype wrapper for integer member IDs.
///
/// This helps disambiguate member IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct MemberId(i64);

impl MemberId {
    /// Create a new member ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the member ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MemberId {
    type Err = Error;

    /// Parse a member ID from a decimal string, e.g. a JSON object key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(MemberId::new)
            .map_err(|_| Error::InvalidMemberId(s.to_owned()))
    }
}

/// A person in a group who can pay for and owe on expenses.
///
/// Members are never modified after they are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's ID in the application database.
    pub id: MemberId,
    /// The name shown for the member in balances and listings.
    pub display_name: String,
    /// The group the member belongs to.
    pub group_id: GroupId,
}

/// Create the member table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_member_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS member (
            id INTEGER PRIMARY KEY,
            display_name TEXT NOT NULL,
            group_id INTEGER NOT NULL REFERENCES household(id)
        );

        CREATE INDEX IF NOT EXISTS idx_member_group_id ON member(group_id);",
    )?;

    Ok(())
}

/// Create and insert a new member of `group_id` into the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred, e.g. the group does not exist.
pub fn create_member(
    display_name: &str,
    group_id: GroupId,
    connection: &Connection,
) -> Result<Member, Error> {
    connection.execute(
        "INSERT INTO member (display_name, group_id) VALUES (?1, ?2)",
        (display_name, group_id.as_i64()),
    )?;

    let id = MemberId::new(connection.last_insert_rowid());

    Ok(Member {
        id,
        display_name: display_name.to_owned(),
        group_id,
    })
}

/// Get the member from the database with an ID equal to `member_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `member_id` does not belong to a member, [Error::NotFound].
/// - there was an error trying to access the database.
pub fn get_member(member_id: MemberId, connection: &Connection) -> Result<Member, Error> {
    connection
        .prepare("SELECT id, display_name, group_id FROM member WHERE id = :id")?
        .query_row(&[(":id", &member_id.as_i64())], map_row_to_member)
        .map_err(|error| error.into())
}

/// Get every member of `group_id`, ordered by ID.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_group_members(group_id: GroupId, connection: &Connection) -> Result<Vec<Member>, Error> {
    connection
        .prepare("SELECT id, display_name, group_id FROM member WHERE group_id = :group_id ORDER BY id ASC")?
        .query_map(&[(":group_id", &group_id.as_i64())], map_row_to_member)?
        .map(|maybe_member| maybe_member.map_err(|error| error.into()))
        .collect()
}

fn map_row_to_member(row: &Row) -> Result<Member, rusqlite::Error> {
    let id = MemberId::new(row.get(0)?);
    let display_name = row.get(1)?;
    let group_id = GroupId::new(row.get(2)?);

    Ok(Member {
        id,
        display_name,
        group_id,
    })
}

#[cfg(test)]
mod member_id_tests {
    use std::str::FromStr;

    use crate::{Error, member::MemberId};

    #[test]
    fn parses_integer_string() {
        assert_eq!(MemberId::from_str("42"), Ok(MemberId::new(42)));
    }

    #[test]
    fn rejects_non_integer_string() {
        assert_eq!(
            MemberId::from_str("alice"),
            Err(Error::InvalidMemberId("alice".to_owned()))
        );
    }
}
