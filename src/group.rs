//! Groups of members (households) that share a ledger.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Currency, Error,
    member::{MemberId, get_group_members},
};

/// A newtype wrapper for integer group IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct GroupId(i64);

impl GroupId {
    /// Create a new group ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the group ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-group defaults used to pre-fill new expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetadata {
    /// The percentage of an expense each member owes when the caller does not say.
    #[serde(default)]
    pub default_share_percentages: BTreeMap<MemberId, f64>,
    /// The currency used when the caller does not say.
    pub default_currency: Currency,
}

impl GroupMetadata {
    /// Metadata with no default shares.
    pub fn new(default_currency: Currency) -> Self {
        Self {
            default_share_percentages: BTreeMap::new(),
            default_currency,
        }
    }
}

/// A group of members that share expenses.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// The group's ID in the application database.
    pub id: GroupId,
    /// Every member of the group.
    ///
    /// New expenses must be split across exactly this set of members.
    pub member_ids: BTreeSet<MemberId>,
    /// The category names configured for the group.
    pub allowed_category_names: BTreeSet<String>,
    /// Defaults for new expenses.
    pub metadata: GroupMetadata,
}

/// Create the group table.
///
/// The table is called `household` since `group` is an SQL keyword.
pub fn create_group_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS household (
            id INTEGER PRIMARY KEY,
            category_names TEXT NOT NULL,
            metadata TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Create a group with no members.
///
/// # Errors
///
/// Returns an error if the category names or metadata could not be serialized, or if
/// there was an SQL error.
pub fn create_group(
    category_names: &[&str],
    metadata: &GroupMetadata,
    connection: &Connection,
) -> Result<Group, Error> {
    let allowed_category_names: BTreeSet<String> = category_names
        .iter()
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .collect();

    connection.execute(
        "INSERT INTO household (category_names, metadata) VALUES (?1, ?2)",
        (
            serde_json::to_string(&allowed_category_names)?,
            serde_json::to_string(metadata)?,
        ),
    )?;

    Ok(Group {
        id: GroupId::new(connection.last_insert_rowid()),
        member_ids: BTreeSet::new(),
        allowed_category_names,
        metadata: metadata.clone(),
    })
}

/// Replace the metadata of `group_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the group does not exist.
pub fn update_group_metadata(
    group_id: GroupId,
    metadata: &GroupMetadata,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE household SET metadata = ?1 WHERE id = ?2",
        (serde_json::to_string(metadata)?, group_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the group with `group_id` along with the IDs of its members.
///
/// # Errors
///
/// Returns [Error::NotFound] if the group does not exist, or an error if the stored JSON
/// columns are malformed or there was an SQL error.
pub fn get_group(group_id: GroupId, connection: &Connection) -> Result<Group, Error> {
    let (raw_category_names, raw_metadata): (String, String) = connection
        .prepare("SELECT category_names, metadata FROM household WHERE id = :id")?
        .query_row(&[(":id", &group_id.as_i64())], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;

    let member_ids = get_group_members(group_id, connection)?
        .into_iter()
        .map(|member| member.id)
        .collect();

    Ok(Group {
        id: group_id,
        member_ids,
        allowed_category_names: serde_json::from_str(&raw_category_names)?,
        metadata: serde_json::from_str(&raw_metadata)?,
    })
}

#[cfg(test)]
mod group_tests {
    use std::collections::{BTreeMap, BTreeSet};

    use rusqlite::Connection;

    use crate::{
        Currency, Error,
        db::initialize,
        group::{GroupId, GroupMetadata, create_group, get_group, update_group_metadata},
        member::create_member,
    };

    fn get_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    #[test]
    fn create_group_trims_and_deduplicates_categories() {
        let connection = get_db_connection();

        let group = create_group(
            &["Groceries", " Rent ", "Groceries", ""],
            &GroupMetadata::new(Currency::EUR),
            &connection,
        )
        .unwrap();

        assert_eq!(
            group.allowed_category_names,
            BTreeSet::from(["Groceries".to_owned(), "Rent".to_owned()])
        );
    }

    #[test]
    fn get_group_includes_members_and_metadata() {
        let connection = get_db_connection();
        let group = create_group(&["Travel"], &GroupMetadata::new(Currency::INR), &connection)
            .unwrap();
        let alice = create_member("Alice", group.id, &connection).unwrap();
        let bob = create_member("Bob", group.id, &connection).unwrap();
        let metadata = GroupMetadata {
            default_share_percentages: BTreeMap::from([(alice.id, 60.0), (bob.id, 40.0)]),
            default_currency: Currency::GBP,
        };
        update_group_metadata(group.id, &metadata, &connection).unwrap();

        let got = get_group(group.id, &connection).unwrap();

        assert_eq!(got.member_ids, BTreeSet::from([alice.id, bob.id]));
        assert_eq!(
            got.allowed_category_names,
            BTreeSet::from(["Travel".to_owned()])
        );
        assert_eq!(got.metadata, metadata);
    }

    #[test]
    fn get_missing_group_returns_not_found() {
        let connection = get_db_connection();

        assert_eq!(get_group(GroupId::new(9), &connection), Err(Error::NotFound));
    }

    #[test]
    fn update_missing_group_returns_not_found() {
        let connection = get_db_connection();

        let result =
            update_group_metadata(GroupId::new(9), &GroupMetadata::new(Currency::USD), &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let metadata = GroupMetadata::new(Currency::USD);

        let json = serde_json::to_string(&metadata).unwrap();

        assert_eq!(
            json,
            r#"{"defaultSharePercentages":{},"defaultCurrency":"USD"}"#
        );
    }
}
