//! Sessions: who is calling, and which group they act on.
//!
//! A session token is handed to a member when they log in. Only a hash of the token is
//! stored, so a copy of the database cannot be used to act as another member.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    db::now_utc,
    group::{Group, get_group},
    id::IdGenerator,
    member::{Member, MemberId, get_group_members, get_member},
};

/// How long a session lasts unless the caller asks for something else.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::hours(24);

/// The caller behind a session, resolved before any ledger operation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    /// The member making the request.
    pub member: Member,
    /// The member's group.
    pub group: Group,
    /// Every member of the group, keyed by ID.
    pub roster: BTreeMap<MemberId, Member>,
}

/// Turns a session token into the caller's [SessionContext].
pub trait SessionResolver: Send + Sync {
    /// Resolve `token`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSession] if the token is empty, unknown or expired.
    fn resolve(&self, token: &str) -> Result<SessionContext, Error>;
}

/// Resolves sessions stored in the application database.
#[derive(Debug, Clone)]
pub struct SqliteSessionResolver {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSessionResolver {
    /// Create a resolver that reads sessions from `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl SessionResolver for SqliteSessionResolver {
    fn resolve(&self, token: &str) -> Result<SessionContext, Error> {
        let connection = self
            .connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        resolve_session(token, now_utc(), &connection)
    }
}

/// Create the session table.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
            token_hash BLOB PRIMARY KEY,
            member_id INTEGER NOT NULL REFERENCES member(id),
            expires_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

fn hash_token(token: &str) -> Vec<u8> {
    Sha512::digest(token.as_bytes()).to_vec()
}

/// Log `member_id` in, returning a new session token that is valid for `duration`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the member does not exist, [Error::IdGenerationError] if a
/// token could not be generated, or [Error::SqlError] if there is some other SQL error.
pub fn create_session(
    member_id: MemberId,
    duration: Duration,
    id_generator: &dyn IdGenerator,
    connection: &Connection,
) -> Result<String, Error> {
    // Check up front so a missing member is reported as such rather than as a foreign key error.
    get_member(member_id, connection)?;

    let token = id_generator.generate_id()?;
    let expires_at = now_utc() + duration;

    connection.execute(
        "INSERT INTO session (token_hash, member_id, expires_at) VALUES (?1, ?2, ?3)",
        (hash_token(&token), member_id.as_i64(), expires_at),
    )?;

    tracing::info!("created session for member {member_id} expiring at {expires_at}");

    Ok(token)
}

/// Log out of the session `token`.
///
/// # Errors
///
/// Returns [Error::InvalidSession] if there is no such session, or [Error::SqlError] if
/// there is some other SQL error.
pub fn delete_session(token: &str, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM session WHERE token_hash = ?1",
        (hash_token(token),),
    )?;

    if rows_affected == 0 {
        return Err(Error::InvalidSession);
    }

    Ok(())
}

/// Resolve `token` as of `now`.
///
/// # Errors
///
/// Returns [Error::InvalidSession] if the token is empty, unknown or has expired by `now`.
pub fn resolve_session(
    token: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<SessionContext, Error> {
    if token.trim().is_empty() {
        return Err(Error::InvalidSession);
    }

    let (member_id, expires_at): (MemberId, OffsetDateTime) = connection
        .prepare("SELECT member_id, expires_at FROM session WHERE token_hash = :token_hash")?
        .query_row(&[(":token_hash", &hash_token(token))], |row| {
            Ok((MemberId::new(row.get(0)?), row.get(1)?))
        })
        .map_err(|error| match Error::from(error) {
            Error::NotFound => Error::InvalidSession,
            error => error,
        })?;

    if expires_at <= now {
        tracing::debug!("session for member {member_id} expired at {expires_at}");
        return Err(Error::InvalidSession);
    }

    let member = get_member(member_id, connection)?;
    let group = get_group(member.group_id, connection)?;
    let roster = get_group_members(member.group_id, connection)?
        .into_iter()
        .map(|member| (member.id, member))
        .collect();

    Ok(SessionContext {
        member,
        group,
        roster,
    })
}
