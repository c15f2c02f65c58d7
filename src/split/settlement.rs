//! The settlement calculator: who owes whom for a single expense.

use serde::Serialize;

use crate::{member::MemberId, split::ValidatedSplit};

/// A directed IOU derived from one expense: `from` owes `to` the `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settlement {
    /// The member who paid less than their share.
    pub from: MemberId,
    /// The member who paid more than their share.
    pub to: MemberId,
    /// How much `from` owes `to`. Never negative.
    pub amount: f64,
}

/// Work out the transfers that settle `split`.
///
/// Each member's balance for the expense is what they paid minus the share they owe.
/// Members with a balance of zero or more are creditors and the rest are debtors. Every
/// debtor's deficit is spread over all of the creditors in proportion to each creditor's
/// share of the total credit, so one transfer is emitted per debtor and creditor pair.
///
/// Creditors whose balance is exactly zero still receive a (zero) transfer from each debtor.
/// Summed by debtor, the transfers equal each debtor's deficit, and summed by creditor they
/// equal each creditor's surplus.
///
/// Transfers are ordered by debtor ID and then creditor ID. No member is ever both sides of
/// a transfer.
pub fn calculate_settlements(split: &ValidatedSplit) -> Vec<Settlement> {
    let balances: Vec<(MemberId, f64)> = split
        .owed_percentages()
        .iter()
        .map(|(member_id, percentage)| {
            let paid = split.paid_shares().get(member_id).copied().unwrap_or(0.0);
            let share = split.amount() * (percentage / 100.0);

            (*member_id, paid - share)
        })
        .collect();

    let (creditors, debtors): (Vec<_>, Vec<_>) =
        balances.into_iter().partition(|(_, balance)| *balance >= 0.0);

    let total_credit: f64 = creditors.iter().map(|(_, credit)| credit).sum();

    if total_credit == 0.0 {
        return Vec::new();
    }

    debtors
        .iter()
        .flat_map(|(debtor, deficit)| {
            creditors.iter().map(move |(creditor, credit)| Settlement {
                from: *debtor,
                to: *creditor,
                amount: (credit / total_credit * deficit).abs(),
            })
        })
        .collect()
}

#[cfg(test)]
mod calculate_settlements_tests {
    use std::collections::{BTreeMap, BTreeSet};

    use crate::{
        member::MemberId,
        split::{Settlement, SplitRequest, ValidatedSplit, calculate_settlements},
    };

    const A: MemberId = MemberId::new(1);
    const B: MemberId = MemberId::new(2);
    const C: MemberId = MemberId::new(3);
    const D: MemberId = MemberId::new(4);
    const E: MemberId = MemberId::new(5);

    fn split(
        amount: f64,
        paid_shares: &[(MemberId, f64)],
        owed_percentages: &[(MemberId, f64)],
    ) -> ValidatedSplit {
        let owed_percentages: BTreeMap<MemberId, f64> = owed_percentages.iter().copied().collect();
        let member_ids: BTreeSet<MemberId> = owed_percentages.keys().copied().collect();

        SplitRequest {
            amount,
            description: "Test".to_owned(),
            currency: "USD".to_owned(),
            paid_shares: paid_shares.iter().copied().collect(),
            owed_percentages,
        }
        .validate(&member_ids)
        .expect("Could not validate test split")
    }

    #[track_caller]
    fn assert_settlement(got: &Settlement, from: MemberId, to: MemberId, amount: f64) {
        assert_eq!((got.from, got.to), (from, to));
        assert!(
            (got.amount - amount).abs() < 1e-9,
            "want {amount}, got {}",
            got.amount
        );
    }

    #[test]
    fn one_payer_even_split() {
        let settlements =
            calculate_settlements(&split(100.0, &[(A, 100.0)], &[(A, 50.0), (B, 50.0)]));

        assert_eq!(
            settlements,
            vec![Settlement {
                from: B,
                to: A,
                amount: 50.0
            }]
        );
    }

    #[test]
    fn one_payer_three_way_split() {
        let settlements = calculate_settlements(&split(
            90.0,
            &[(A, 90.0)],
            &[(A, 34.0), (B, 33.0), (C, 33.0)],
        ));

        assert_eq!(settlements.len(), 2);
        assert_settlement(&settlements[0], B, A, 29.7);
        assert_settlement(&settlements[1], C, A, 29.7);
        let total: f64 = settlements.iter().map(|settlement| settlement.amount).sum();
        assert!((total - 59.4).abs() < 1e-9);
    }

    #[test]
    fn balanced_expense_has_no_settlements() {
        let settlements =
            calculate_settlements(&split(60.0, &[(A, 30.0), (B, 30.0)], &[(A, 50.0), (B, 50.0)]));

        assert!(settlements.is_empty());
    }

    #[test]
    fn deficit_is_pro_rated_across_creditors() {
        // A is owed 55 and B is owed 25, so C's deficit of 80 splits 55:25.
        let settlements = calculate_settlements(&split(
            100.0,
            &[(A, 75.0), (B, 25.0)],
            &[(A, 20.0), (B, 0.0), (C, 80.0)],
        ));

        assert_eq!(settlements.len(), 2);
        assert_settlement(&settlements[0], C, A, 55.0);
        assert_settlement(&settlements[1], C, B, 25.0);
    }

    #[test]
    fn zero_balance_member_receives_zero_transfers() {
        // C paid exactly their share, so is a creditor with nothing owed to them.
        let settlements = calculate_settlements(&split(
            100.0,
            &[(A, 75.0), (C, 25.0)],
            &[(A, 50.0), (B, 25.0), (C, 25.0)],
        ));

        assert_eq!(settlements.len(), 2);
        assert_settlement(&settlements[0], B, A, 25.0);
        assert_settlement(&settlements[1], B, C, 0.0);
    }

    #[test]
    fn emits_full_cross_product() {
        // A and B are creditors, C, D and E are debtors.
        let settlements = calculate_settlements(&split(
            100.0,
            &[(A, 60.0), (B, 40.0)],
            &[(A, 20.0), (B, 20.0), (C, 20.0), (D, 20.0), (E, 20.0)],
        ));

        assert_eq!(settlements.len(), 6);
        assert!(settlements.iter().all(|settlement| settlement.from != settlement.to));
    }

    #[test]
    fn never_emits_self_transfers() {
        let settlements = calculate_settlements(&split(
            90.0,
            &[(A, 45.0), (B, 45.0)],
            &[(A, 10.0), (B, 10.0), (C, 80.0)],
        ));

        assert!(settlements.iter().all(|settlement| settlement.from != settlement.to));
    }
}
