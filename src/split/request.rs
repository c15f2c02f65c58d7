//! Parsing and validating requests to split a new expense.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Currency, Error, group::GroupMetadata, member::MemberId};

/// How far apart two sums of money or percentages may be and still count as equal, relative
/// to the expected total (or absolute, for totals below 1).
///
/// Clients add up decimal amounts in floating point, e.g. `33.33 + 33.33 + 33.34`, which
/// rarely lands exactly on the expected total. Amounts at or below this value are rejected,
/// since an empty set of payers would otherwise be within tolerance of them.
pub const MONEY_TOLERANCE: f64 = 1e-6;

/// A request to record a new expense, as received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    /// The total cost of the expense.
    pub amount: f64,
    /// What the expense was for.
    pub description: String,
    /// The currency code, e.g. "USD".
    ///
    /// Left as a string so that unsupported codes are reported by [SplitRequest::validate]
    /// in order with the other checks.
    pub currency: String,
    /// How much each member actually paid.
    #[serde(rename = "paidByShares")]
    pub paid_shares: BTreeMap<MemberId, f64>,
    /// The percentage of the expense each member is responsible for.
    #[serde(rename = "splitPctShares")]
    pub owed_percentages: BTreeMap<MemberId, f64>,
}

/// A split that has passed every check in [SplitRequest::validate].
///
/// This type can only be created through validation, so holding one means the paid shares
/// add up to the amount and the owed percentages cover exactly the group and add up to 100.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSplit {
    amount: f64,
    description: String,
    currency: Currency,
    paid_shares: BTreeMap<MemberId, f64>,
    owed_percentages: BTreeMap<MemberId, f64>,
}

impl ValidatedSplit {
    /// The total cost of the expense.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// The trimmed, non-empty description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The currency of the expense and all of its transfers.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// How much each payer contributed.
    pub fn paid_shares(&self) -> &BTreeMap<MemberId, f64> {
        &self.paid_shares
    }

    /// The percentage owed by every member of the group.
    pub fn owed_percentages(&self) -> &BTreeMap<MemberId, f64> {
        &self.owed_percentages
    }
}

impl SplitRequest {
    /// Fill in the currency and owed percentages from the group's defaults where the request
    /// left them empty.
    pub fn with_group_defaults(mut self, metadata: &GroupMetadata) -> Self {
        if self.currency.trim().is_empty() {
            self.currency = metadata.default_currency.code().to_owned();
        }

        if self.owed_percentages.is_empty() {
            self.owed_percentages = metadata.default_share_percentages.clone();
        }

        self
    }

    /// Check the request against the members of the caller's group.
    ///
    /// The checks run in a fixed order and stop at the first failure:
    /// 1. the currency is supported,
    /// 2. the amount is positive,
    /// 3. the description is not empty,
    /// 4. every payer is in the group, no one paid a negative amount and the paid shares add
    ///    up to the amount,
    /// 5. the members in the split are exactly the members of the group,
    /// 6. every percentage is within [0, 100] and they add up to 100.
    ///
    /// # Errors
    ///
    /// Returns the error for the first check that failed.
    pub fn validate(self, member_ids: &BTreeSet<MemberId>) -> Result<ValidatedSplit, Error> {
        let currency: Currency = self.currency.trim().parse()?;

        if !self.amount.is_finite() || self.amount <= MONEY_TOLERANCE {
            return Err(Error::InvalidAmount);
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(Error::InvalidDescription);
        }

        for (member_id, paid) in &self.paid_shares {
            if !paid.is_finite() || *paid < 0.0 || !member_ids.contains(member_id) {
                return Err(Error::InvalidPaidShares);
            }
        }

        let total_paid: f64 = self.paid_shares.values().sum();
        if !approx_eq(total_paid, self.amount) {
            return Err(Error::InvalidPaidShares);
        }

        if !self.owed_percentages.keys().eq(member_ids.iter()) {
            return Err(Error::InvalidSplitMembers);
        }

        if self
            .owed_percentages
            .values()
            .any(|percentage| !(0.0..=100.0).contains(percentage))
        {
            return Err(Error::InvalidSplitPercentages);
        }

        let total_percentage: f64 = self.owed_percentages.values().sum();
        if !approx_eq(total_percentage, 100.0) {
            return Err(Error::InvalidSplitPercentages);
        }

        Ok(ValidatedSplit {
            amount: self.amount,
            description: description.to_owned(),
            currency,
            paid_shares: self.paid_shares,
            owed_percentages: self.owed_percentages,
        })
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= MONEY_TOLERANCE * b.abs().max(1.0)
}

/// Convert shares keyed by stringified member IDs, e.g. `{"1": 50.0}`, into typed shares.
///
/// # Errors
///
/// Returns [Error::InvalidMemberId] for the first key that is not an integer.
pub fn parse_member_shares<'a, I>(shares: I) -> Result<BTreeMap<MemberId, f64>, Error>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    shares
        .into_iter()
        .map(|(key, value)| Ok((key.parse::<MemberId>()?, value)))
        .collect()
}

#[cfg(test)]
mod validate_tests {
    use std::collections::{BTreeMap, BTreeSet};

    use crate::{
        Currency, Error,
        member::MemberId,
        split::{SplitRequest, ValidatedSplit},
    };

    const A: MemberId = MemberId::new(1);
    const B: MemberId = MemberId::new(2);
    const C: MemberId = MemberId::new(3);

    fn group() -> BTreeSet<MemberId> {
        BTreeSet::from([A, B])
    }

    fn valid_request() -> SplitRequest {
        SplitRequest {
            amount: 100.0,
            description: "Groceries".to_owned(),
            currency: "USD".to_owned(),
            paid_shares: BTreeMap::from([(A, 100.0)]),
            owed_percentages: BTreeMap::from([(A, 50.0), (B, 50.0)]),
        }
    }

    #[track_caller]
    fn validate(request: SplitRequest) -> Result<ValidatedSplit, Error> {
        request.validate(&group())
    }

    #[test]
    fn accepts_valid_request() {
        let split = validate(valid_request()).unwrap();

        assert_eq!(split.amount(), 100.0);
        assert_eq!(split.description(), "Groceries");
        assert_eq!(split.currency(), Currency::USD);
    }

    #[test]
    fn trims_description() {
        let split = validate(SplitRequest {
            description: "  Rent \n".to_owned(),
            ..valid_request()
        })
        .unwrap();

        assert_eq!(split.description(), "Rent");
    }

    #[test]
    fn rejects_unsupported_currency() {
        let result = validate(SplitRequest {
            currency: "AUD".to_owned(),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidCurrency));
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = validate(SplitRequest {
                amount,
                ..valid_request()
            });

            assert_eq!(result, Err(Error::InvalidAmount), "amount {amount}");
        }
    }

    #[test]
    fn rejects_amount_within_tolerance_of_zero() {
        let result = validate(SplitRequest {
            amount: 5e-7,
            paid_shares: BTreeMap::new(),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidAmount));
    }

    #[test]
    fn accepts_large_amount_with_rounding_noise() {
        let result = validate(SplitRequest {
            amount: 1_000_000_000_000.0,
            paid_shares: BTreeMap::from([(A, 500_000_000_000.07), (B, 499_999_999_999.93)]),
            ..valid_request()
        });

        assert!(result.is_ok());
    }

    #[test]
    fn rejects_blank_description() {
        let result = validate(SplitRequest {
            description: " \t".to_owned(),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidDescription));
    }

    #[test]
    fn rejects_payer_outside_group() {
        let result = validate(SplitRequest {
            paid_shares: BTreeMap::from([(A, 50.0), (C, 50.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidPaidShares));
    }

    #[test]
    fn rejects_negative_paid_share() {
        let result = validate(SplitRequest {
            paid_shares: BTreeMap::from([(A, 150.0), (B, -50.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidPaidShares));
    }

    #[test]
    fn rejects_paid_shares_that_do_not_add_up() {
        let result = validate(SplitRequest {
            paid_shares: BTreeMap::from([(A, 60.0), (B, 30.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidPaidShares));
    }

    #[test]
    fn rejects_missing_paid_shares() {
        let result = validate(SplitRequest {
            paid_shares: BTreeMap::new(),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidPaidShares));
    }

    #[test]
    fn accepts_decimal_shares_with_rounding_noise() {
        let result = validate(SplitRequest {
            amount: 0.3,
            paid_shares: BTreeMap::from([(A, 0.1), (B, 0.2)]),
            owed_percentages: BTreeMap::from([(A, 33.33), (B, 66.67)]),
            ..valid_request()
        });

        assert!(result.is_ok());
    }

    #[test]
    fn rejects_partial_group_split() {
        let result = validate(SplitRequest {
            owed_percentages: BTreeMap::from([(A, 100.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidSplitMembers));
    }

    #[test]
    fn rejects_split_with_extra_member() {
        let result = validate(SplitRequest {
            owed_percentages: BTreeMap::from([(A, 50.0), (B, 25.0), (C, 25.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidSplitMembers));
    }

    #[test]
    fn rejects_percentage_out_of_range() {
        let result = validate(SplitRequest {
            owed_percentages: BTreeMap::from([(A, 120.0), (B, -20.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidSplitPercentages));
    }

    #[test]
    fn rejects_percentages_summing_to_99() {
        let result = validate(SplitRequest {
            owed_percentages: BTreeMap::from([(A, 50.0), (B, 49.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidSplitPercentages));
    }

    #[test]
    fn reports_first_failing_check_only() {
        let result = validate(SplitRequest {
            amount: -5.0,
            description: String::new(),
            owed_percentages: BTreeMap::from([(A, 10.0)]),
            ..valid_request()
        });

        assert_eq!(result, Err(Error::InvalidAmount));
    }
}
