use crate::schema::{Payer, Payment, PaymentTarget};
use crate::utils::month_key;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PayerTotals {
    /// Every known payer, zero when they paid nothing.
    pub by_payer: BTreeMap<String, f64>,
    /// Paid by someone outside the known payer list.
    pub unattributed: f64,
}

impl PayerTotals {
    pub fn total(&self) -> f64 {
        self.by_payer.values().sum()
    }
}

pub fn aggregate_by_payer(payments: &[Payment], known_payers: &[Payer]) -> PayerTotals {
    let mut totals = PayerTotals {
        by_payer: known_payers.iter().map(|p| (p.id.clone(), 0.0)).collect(),
        unattributed: 0.0,
    };

    for payment in payments {
        match totals.by_payer.get_mut(&payment.paid_by) {
            Some(total) => *total += payment.amount,
            None => totals.unattributed += payment.amount,
        }
    }
    totals
}

/// Share of the attributed total per payer, in percent. A zero total gives 0% to everyone.
pub fn percentage_share(aggregate: &PayerTotals) -> BTreeMap<String, f64> {
    let total = aggregate.total();
    aggregate
        .by_payer
        .iter()
        .map(|(payer, amount)| {
            let share = if total > 0.0 { amount / total * 100.0 } else { 0.0 };
            (payer.clone(), share)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyBucket {
    pub month: String,
    pub amount: f64,
}

/// Ascending `YYYY-MM` totals, keeping only the most recent `months_back` months
/// that saw a payment.
pub fn monthly_buckets(payments: &[Payment], months_back: usize) -> Vec<MonthlyBucket> {
    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    for payment in payments {
        *by_month.entry(month_key(payment.payment_date)).or_insert(0.0) += payment.amount;
    }

    let skip = by_month.len().saturating_sub(months_back);
    by_month
        .into_iter()
        .skip(skip)
        .map(|(month, amount)| MonthlyBucket { month, amount })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentFilter {
    pub target: Option<PaymentTarget>,
    pub paid_by: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.target.as_ref().map_or(true, |t| *t == payment.target)
            && self.paid_by.as_ref().map_or(true, |p| *p == payment.paid_by)
            && self.from.map_or(true, |from| payment.payment_date >= from)
            && self.to.map_or(true, |to| payment.payment_date <= to)
    }

    pub fn apply<'a>(&self, payments: &'a [Payment]) -> Vec<&'a Payment> {
        payments.iter().filter(|p| self.matches(p)).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Contribution {
    pub renovation: f64,
    pub mortgage: f64,
}

impl Contribution {
    pub fn total(&self) -> f64 {
        self.renovation + self.mortgage
    }
}

/// Renovation vs. mortgage totals for each known payer.
pub fn household_contributions(
    payments: &[Payment],
    known_payers: &[Payer],
) -> BTreeMap<String, Contribution> {
    let mut contributions: BTreeMap<String, Contribution> = known_payers
        .iter()
        .map(|p| (p.id.clone(), Contribution::default()))
        .collect();

    for payment in payments {
        if let Some(entry) = contributions.get_mut(&payment.paid_by) {
            match payment.target {
                PaymentTarget::Project(_) => entry.renovation += payment.amount,
                PaymentTarget::Mortgage(_) => entry.mortgage += payment.amount,
            }
        }
    }
    contributions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payer(id: &str) -> Payer {
        Payer {
            id: id.to_string(),
            full_name: id.to_string(),
        }
    }

    fn payment(paid_by: &str, amount: f64, date: (i32, u32, u32), target: PaymentTarget) -> Payment {
        Payment {
            id: format!("{}-{}", paid_by, amount),
            target,
            paid_by: paid_by.to_string(),
            amount,
            payment_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            payment_method: None,
            notes: None,
            proof_reference: None,
        }
    }

    fn project(id: &str) -> PaymentTarget {
        PaymentTarget::Project(id.to_string())
    }

    #[test]
    fn test_aggregate_and_share() {
        let payments = vec![
            payment("A", 100.0, (2024, 1, 5), project("p1")),
            payment("B", 300.0, (2024, 1, 6), project("p1")),
        ];
        let payers = vec![payer("A"), payer("B"), payer("C")];

        let totals = aggregate_by_payer(&payments, &payers);
        assert_eq!(totals.by_payer["A"], 100.0);
        assert_eq!(totals.by_payer["B"], 300.0);
        assert_eq!(totals.by_payer["C"], 0.0);
        assert_eq!(totals.unattributed, 0.0);

        let share = percentage_share(&totals);
        assert_eq!(share["A"], 25.0);
        assert_eq!(share["B"], 75.0);
        assert_eq!(share["C"], 0.0);
    }

    #[test]
    fn test_zero_total_share() {
        let totals = aggregate_by_payer(&[], &[payer("A"), payer("B")]);
        let share = percentage_share(&totals);
        assert!(share.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_unknown_payer_is_unattributed() {
        let payments = vec![payment("Z", 50.0, (2024, 1, 1), project("p1"))];
        let totals = aggregate_by_payer(&payments, &[payer("A")]);
        assert_eq!(totals.unattributed, 50.0);
        assert_eq!(totals.total(), 0.0);
    }

    #[test]
    fn test_monthly_buckets_keep_most_recent() {
        let payments = vec![
            payment("A", 10.0, (2024, 3, 1), project("p1")),
            payment("A", 5.0, (2024, 1, 20), project("p1")),
            payment("B", 7.0, (2024, 3, 30), project("p1")),
            payment("B", 1.0, (2023, 12, 31), project("p1")),
        ];

        let buckets = monthly_buckets(&payments, 2);
        assert_eq!(
            buckets,
            vec![
                MonthlyBucket { month: "2024-01".to_string(), amount: 5.0 },
                MonthlyBucket { month: "2024-03".to_string(), amount: 17.0 },
            ]
        );
        assert_eq!(monthly_buckets(&payments, 12).len(), 3);
        assert!(monthly_buckets(&payments, 0).is_empty());
    }

    #[test]
    fn test_payment_filter() {
        let payments = vec![
            payment("A", 10.0, (2024, 1, 1), project("p1")),
            payment("A", 20.0, (2024, 2, 1), project("p2")),
            payment("B", 30.0, (2024, 3, 1), project("p1")),
        ];

        let filter = PaymentFilter {
            target: Some(project("p1")),
            from: NaiveDate::from_ymd_opt(2024, 1, 15),
            ..Default::default()
        };
        let hits = filter.apply(&payments);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].amount, 30.0);

        assert_eq!(PaymentFilter::default().apply(&payments).len(), 3);
    }

    #[test]
    fn test_household_contributions() {
        let payments = vec![
            payment("A", 100.0, (2024, 1, 1), project("p1")),
            payment("A", 1347.13, (2024, 1, 5), PaymentTarget::Mortgage("m1".to_string())),
            payment("B", 40.0, (2024, 1, 9), project("p1")),
        ];
        let split = household_contributions(&payments, &[payer("A"), payer("B")]);
        assert_eq!(split["A"].renovation, 100.0);
        assert_eq!(split["A"].mortgage, 1347.13);
        assert_eq!(split["B"].total(), 40.0);
    }
}
