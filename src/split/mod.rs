//! Turning an expense into who owes whom.
//!
//! A [SplitRequest] is checked against the caller's group to produce a
//! [ValidatedSplit], which [calculate_settlements] turns into pairwise IOUs.

mod request;
mod settlement;

pub use request::{MONEY_TOLERANCE, SplitRequest, ValidatedSplit, parse_member_shares};
pub use settlement::{Settlement, calculate_settlements};
