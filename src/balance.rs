//! Net balances between members, read from the live transfers in a group.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Currency, Error,
    group::GroupId,
    member::{Member, MemberId},
};

/// The sum of the live transfers from one member to another in one currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairwiseTotal {
    /// The member who owes.
    pub from: MemberId,
    /// The member who is owed.
    pub to: MemberId,
    /// The currency of the transfers.
    pub currency: Currency,
    /// The total owed.
    pub amount: f64,
}

/// Net balances keyed by counterparty display name, then currency.
///
/// A positive amount means the counterparty owes the viewing member. A negative amount means
/// the viewing member owes the counterparty.
pub type Balances = BTreeMap<String, BTreeMap<Currency, f64>>;

/// Sum the live transfers in `group_id` for each (from, to, currency) triple.
///
/// Deleted transfers are ignored, so the totals always reflect only the expenses that are
/// currently live. Transfers where a member owes themself are skipped.
///
/// # Errors
///
/// Returns [Error::SqlError] if there is an SQL error.
pub fn get_pairwise_totals(
    group_id: GroupId,
    connection: &Connection,
) -> Result<Vec<PairwiseTotal>, Error> {
    connection
        .prepare(
            "SELECT from_member_id, to_member_id, currency, SUM(amount) FROM transfer
            WHERE group_id = :group_id AND deleted_at IS NULL AND from_member_id != to_member_id
            GROUP BY from_member_id, to_member_id, currency
            ORDER BY from_member_id, to_member_id, currency",
        )?
        .query_map(&[(":group_id", &group_id.as_i64())], |row| {
            Ok(PairwiseTotal {
                from: MemberId::new(row.get(0)?),
                to: MemberId::new(row.get(1)?),
                currency: row.get(2)?,
                amount: row.get(3)?,
            })
        })?
        .map(|maybe_total| maybe_total.map_err(|error| error.into()))
        .collect()
}

/// Net the pairwise `totals` into the balances seen by `member_id`.
///
/// For every total where `member_id` owes, the amount is subtracted from the counterparty's
/// balance. For every total where `member_id` is owed, it is added. Totals that do not
/// involve `member_id` are ignored. Counterparties are named by their display name in
/// `roster`, falling back to their ID if they are missing from it.
pub fn aggregate_balances(
    member_id: MemberId,
    roster: &BTreeMap<MemberId, Member>,
    totals: &[PairwiseTotal],
) -> Balances {
    let mut balances = Balances::new();

    for total in totals {
        if total.from == total.to {
            continue;
        }

        let (counterparty, signed_amount) = if total.from == member_id {
            (total.to, -total.amount)
        } else if total.to == member_id {
            (total.from, total.amount)
        } else {
            continue;
        };

        let name = match roster.get(&counterparty) {
            Some(member) => member.display_name.clone(),
            None => {
                tracing::warn!("member {counterparty} has transfers but is not in the roster");
                counterparty.to_string()
            }
        };

        *balances
            .entry(name)
            .or_default()
            .entry(total.currency)
            .or_insert(0.0) += signed_amount;
    }

    balances
}
