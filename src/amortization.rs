//! Fixed-payment loan schedules.
//!
//! Rounding policy: the running balance is carried at full `f64` precision and
//! rows are rounded to cents only when they are emitted. Because the fixed
//! payment itself is usually rounded to cents, a small residual can remain at
//! the last scheduled month. A residual below one monthly payment is folded into
//! that month's principal so the schedule closes at zero. A larger one means the
//! payment does not amortize the loan; it stays on the last row and is reported
//! by [`AmortizationSchedule::residual_balance`].

use crate::error::{ensure_finite, LedgerError, Result};
use crate::schema::{MortgageLoan, Payment};
use crate::utils::round_cents;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRow {
    pub month: u32,
    pub interest: f64,
    pub principal: f64,
    pub balance: f64,
}

/// Validated loan parameters. Rows are generated on demand, so iterating twice
/// yields the same sequence.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct AmortizationSchedule {
    principal: f64,
    monthly_rate: f64,
    term_months: u32,
    payment: f64,
}

pub fn build_schedule(
    principal: f64,
    annual_rate_pct: f64,
    term_months: u32,
    fixed_monthly_payment: f64,
) -> Result<AmortizationSchedule> {
    AmortizationSchedule::new(principal, annual_rate_pct, term_months, fixed_monthly_payment)
}

/// Standard annuity payment for a fully amortizing loan, rounded to cents.
pub fn level_payment(principal: f64, annual_rate_pct: f64, term_months: u32) -> Result<f64> {
    let principal = ensure_finite("principal", principal)?;
    let annual_rate_pct = ensure_finite("annual_rate_pct", annual_rate_pct)?;
    if principal < 0.0 || annual_rate_pct < 0.0 || term_months == 0 {
        return Err(LedgerError::InvalidInput(format!(
            "cannot compute a level payment for principal {}, rate {}%, term {}",
            principal, annual_rate_pct, term_months
        )));
    }

    let rate = annual_rate_pct / 100.0 / 12.0;
    let payment = if rate == 0.0 {
        principal / term_months as f64
    } else {
        principal * rate / (1.0 - (1.0 + rate).powi(-(term_months as i32)))
    };
    Ok(round_cents(payment))
}

impl AmortizationSchedule {
    pub fn new(
        principal: f64,
        annual_rate_pct: f64,
        term_months: u32,
        fixed_monthly_payment: f64,
    ) -> Result<Self> {
        let principal = ensure_finite("principal", principal)?;
        let annual_rate_pct = ensure_finite("annual_rate_pct", annual_rate_pct)?;
        let payment = ensure_finite("monthly_payment", fixed_monthly_payment)?;

        if principal < 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "principal must be >= 0, got {}",
                principal
            )));
        }
        if annual_rate_pct < 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "annual_rate_pct must be >= 0, got {}",
                annual_rate_pct
            )));
        }
        if term_months == 0 {
            return Err(LedgerError::InvalidInput(
                "term_months must be at least 1".to_string(),
            ));
        }
        if payment <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "monthly_payment must be > 0, got {}",
                payment
            )));
        }

        let monthly_rate = annual_rate_pct / 100.0 / 12.0;
        let first_interest = principal * monthly_rate;
        if payment < first_interest {
            return Err(LedgerError::InvalidInput(format!(
                "monthly_payment {} does not cover the first month's interest {:.2}",
                payment, first_interest
            )));
        }

        Ok(Self {
            principal,
            monthly_rate,
            term_months,
            payment,
        })
    }

    pub fn principal(&self) -> f64 {
        self.principal
    }

    pub fn term_months(&self) -> u32 {
        self.term_months
    }

    pub fn monthly_payment(&self) -> f64 {
        self.payment
    }

    pub fn iter(&self) -> ScheduleIter {
        ScheduleIter {
            schedule: *self,
            balance: self.principal,
            month: 0,
            finished: self.principal == 0.0,
        }
    }

    pub fn rows(&self) -> Vec<ScheduleRow> {
        self.iter().collect()
    }

    /// Balance left after the last scheduled row. Zero for a loan the payment
    /// fully amortizes.
    pub fn residual_balance(&self) -> f64 {
        self.iter()
            .last()
            .map_or_else(|| round_cents(self.principal), |row| row.balance)
    }

    /// Balance at the first month of every loan year, as `(year, balance)`.
    pub fn yearly_balances(&self) -> Vec<(u32, f64)> {
        self.iter()
            .filter(|row| (row.month - 1) % 12 == 0)
            .map(|row| (row.month / 12, row.balance))
            .collect()
    }
}

impl<'a> IntoIterator for &'a AmortizationSchedule {
    type Item = ScheduleRow;
    type IntoIter = ScheduleIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ScheduleIter {
    schedule: AmortizationSchedule,
    balance: f64,
    month: u32,
    finished: bool,
}

impl Iterator for ScheduleIter {
    type Item = ScheduleRow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.month += 1;
        let interest = self.balance * self.schedule.monthly_rate;
        let mut principal = self.schedule.payment - interest;
        let mut balance = (self.balance - principal).max(0.0);

        if self.month == self.schedule.term_months
            && balance > 0.0
            && balance < self.schedule.payment
        {
            principal += balance;
            balance = 0.0;
        }

        self.balance = balance;
        if balance == 0.0 || self.month == self.schedule.term_months {
            self.finished = true;
        }

        Some(ScheduleRow {
            month: self.month,
            interest: round_cents(interest),
            principal: round_cents(principal),
            balance: round_cents(balance),
        })
    }
}

impl MortgageLoan {
    pub fn schedule(&self) -> Result<AmortizationSchedule> {
        build_schedule(
            self.principal,
            self.annual_interest_rate_pct,
            self.term_months,
            self.monthly_payment,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallmentMatch {
    pub payment_id: String,
    pub payment_date: NaiveDate,
    pub amount: f64,
    /// Schedule row at the same position, `None` once the schedule is exhausted.
    pub row: Option<ScheduleRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MortgageReconciliation {
    pub matches: Vec<InstallmentMatch>,
    pub total_paid: f64,
    pub interest_paid: f64,
    pub principal_paid: f64,
    pub outstanding_balance: f64,
    /// Payments beyond the last schedule row.
    pub unscheduled_payments: Vec<String>,
}

impl MortgageReconciliation {
    pub fn payments_made(&self) -> usize {
        self.matches.len()
    }
}

/// Pairs payments with schedule rows by position: after sorting by date, the
/// i-th payment is taken as installment i. Dates are not compared, so a skipped
/// or doubled month shifts every later pairing.
pub fn reconcile_payments(
    schedule: &AmortizationSchedule,
    payments: &[Payment],
) -> Result<MortgageReconciliation> {
    let mut ordered: Vec<&Payment> = payments.iter().collect();
    ordered.sort_by_key(|p| p.payment_date);

    let mut rows = schedule.iter();
    let mut matches = Vec::with_capacity(ordered.len());
    let mut unscheduled_payments = Vec::new();
    let mut total_paid = 0.0;
    let mut interest_paid = 0.0;
    let mut principal_paid = 0.0;
    let mut last_balance = None;

    for payment in ordered {
        total_paid += ensure_finite("payment amount", payment.amount)?;
        let row = rows.next();
        match row {
            Some(r) => {
                interest_paid += r.interest;
                principal_paid += r.principal;
                last_balance = Some(r.balance);
            }
            None => unscheduled_payments.push(payment.id.clone()),
        }
        matches.push(InstallmentMatch {
            payment_id: payment.id.clone(),
            payment_date: payment.payment_date,
            amount: payment.amount,
            row,
        });
    }

    if !unscheduled_payments.is_empty() {
        debug!(
            "{} payments exceed the {}-row schedule",
            unscheduled_payments.len(),
            matches.len() - unscheduled_payments.len()
        );
    }

    Ok(MortgageReconciliation {
        matches,
        total_paid,
        interest_paid: round_cents(interest_paid),
        principal_paid: round_cents(principal_paid),
        outstanding_balance: last_balance.unwrap_or_else(|| round_cents(schedule.principal())),
        unscheduled_payments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PaymentTarget;

    fn payment(id: &str, y: i32, m: u32, d: u32, amount: f64) -> Payment {
        Payment {
            id: id.to_string(),
            target: PaymentTarget::Mortgage("m1".to_string()),
            paid_by: "ana".to_string(),
            amount,
            payment_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            payment_method: None,
            notes: None,
            proof_reference: None,
        }
    }

    #[test]
    fn test_first_row_of_thirty_year_loan() {
        let schedule = build_schedule(300_000.0, 3.5, 360, 1347.13).unwrap();
        let first = schedule.iter().next().unwrap();
        assert_eq!(first.month, 1);
        assert!((first.interest - 875.00).abs() <= 0.01);
        assert!((first.principal - 472.13).abs() <= 0.01);
        assert!((first.balance - 299_527.87).abs() <= 0.01);
    }

    #[test]
    fn test_schedule_closes_at_term() {
        let schedule = build_schedule(300_000.0, 3.5, 360, 1347.13).unwrap();
        let rows = schedule.rows();
        assert_eq!(rows.len(), 360);
        assert_eq!(rows.last().unwrap().balance, 0.0);
        assert!(rows.windows(2).all(|w| w[1].balance <= w[0].balance));
    }

    #[test]
    fn test_rounding_residual_is_settled_in_last_month() {
        let schedule = build_schedule(300_000.0, 3.5, 360, 1347.13).unwrap();
        let rows = schedule.rows();
        let last = rows.last().unwrap();
        let prev = rows[rows.len() - 2];
        assert!(last.principal > 1347.13 - last.interest);
        assert!((last.principal - prev.balance).abs() <= 0.01);
        assert_eq!(schedule.residual_balance(), 0.0);
    }

    #[test]
    fn test_under_amortizing_payment_keeps_balance() {
        let schedule = build_schedule(300_000.0, 3.5, 360, 900.0).unwrap();
        let rows = schedule.rows();
        assert_eq!(rows.len(), 360);

        let last = rows.last().unwrap();
        assert!((last.principal - (900.0 - last.interest)).abs() <= 0.01);
        assert!(last.balance > 280_000.0);
        assert!(rows.windows(2).all(|w| w[1].balance <= w[0].balance));
        assert_eq!(schedule.residual_balance(), last.balance);
    }

    #[test]
    fn test_overpayment_stops_early() {
        let schedule = build_schedule(10_000.0, 6.0, 120, 2_000.0).unwrap();
        let rows = schedule.rows();
        assert!(rows.len() < 120);
        assert_eq!(rows.last().unwrap().balance, 0.0);
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_restartable() {
        let schedule = build_schedule(50_000.0, 4.2, 60, 925.0).unwrap();
        let first: Vec<ScheduleRow> = schedule.iter().collect();
        let second: Vec<ScheduleRow> = (&schedule).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_rate() {
        let schedule = build_schedule(1_200.0, 0.0, 12, 100.0).unwrap();
        let rows = schedule.rows();
        assert_eq!(rows.len(), 12);
        assert!(rows.iter().all(|r| r.interest == 0.0));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            build_schedule(f64::NAN, 3.5, 360, 1000.0),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(build_schedule(1000.0, f64::INFINITY, 12, 100.0).is_err());
        assert!(build_schedule(1000.0, 3.5, 0, 100.0).is_err());
        assert!(build_schedule(1000.0, 3.5, 12, 0.0).is_err());
        assert!(build_schedule(-1.0, 3.5, 12, 100.0).is_err());
        // 300k at 3.5% accrues 875 in month one.
        assert!(build_schedule(300_000.0, 3.5, 360, 800.0).is_err());
    }

    #[test]
    fn test_zero_principal_has_no_rows() {
        let schedule = build_schedule(0.0, 3.5, 12, 100.0).unwrap();
        assert!(schedule.rows().is_empty());
    }

    #[test]
    fn test_level_payment() {
        assert_eq!(level_payment(300_000.0, 3.5, 360).unwrap(), 1347.13);
        assert_eq!(level_payment(1_200.0, 0.0, 12).unwrap(), 100.0);
        assert!(level_payment(1_000.0, 3.5, 0).is_err());
    }

    #[test]
    fn test_yearly_balances() {
        let schedule = build_schedule(300_000.0, 3.5, 360, 1347.13).unwrap();
        let points = schedule.yearly_balances();
        assert_eq!(points.len(), 30);
        assert_eq!(points[0].0, 0);
        assert_eq!(points[1].0, 1);
    }

    #[test]
    fn test_positional_reconciliation() {
        let schedule = build_schedule(300_000.0, 3.5, 360, 1347.13).unwrap();
        let rows = schedule.rows();
        let payments = vec![
            payment("p3", 2024, 4, 1, 1347.13),
            payment("p1", 2024, 1, 1, 1347.13),
            // February skipped; March still pairs with row 2.
            payment("p2", 2024, 3, 1, 1347.13),
        ];

        let recon = reconcile_payments(&schedule, &payments).unwrap();
        assert_eq!(recon.payments_made(), 3);
        assert_eq!(recon.matches[0].payment_id, "p1");
        assert_eq!(recon.matches[1].payment_id, "p2");
        assert_eq!(recon.matches[1].row, Some(rows[1]));
        assert_eq!(recon.outstanding_balance, rows[2].balance);
        let expected_interest = round_cents(rows[0].interest + rows[1].interest + rows[2].interest);
        assert_eq!(recon.interest_paid, expected_interest);
        assert!(recon.unscheduled_payments.is_empty());
    }

    #[test]
    fn test_reconciliation_without_payments() {
        let schedule = build_schedule(100_000.0, 5.0, 240, 700.0).unwrap();
        let recon = reconcile_payments(&schedule, &[]).unwrap();
        assert_eq!(recon.outstanding_balance, 100_000.0);
        assert_eq!(recon.interest_paid, 0.0);
    }

    #[test]
    fn test_surplus_payments_are_unscheduled() {
        let schedule = build_schedule(1_000.0, 0.0, 2, 500.0).unwrap();
        let payments = vec![
            payment("a", 2024, 1, 1, 500.0),
            payment("b", 2024, 2, 1, 500.0),
            payment("c", 2024, 3, 1, 500.0),
        ];
        let recon = reconcile_payments(&schedule, &payments).unwrap();
        assert_eq!(recon.unscheduled_payments, vec!["c".to_string()]);
        assert_eq!(recon.matches[2].row, None);
        assert_eq!(recon.outstanding_balance, 0.0);
        assert_eq!(recon.total_paid, 1_500.0);
    }

    #[test]
    fn test_mortgage_loan_schedule() {
        let loan = MortgageLoan {
            id: "m1".to_string(),
            property_name: "Our Home".to_string(),
            principal: 300_000.0,
            annual_interest_rate_pct: 3.5,
            term_months: 360,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            monthly_payment: 1347.13,
        };
        assert_eq!(loan.schedule().unwrap().rows().len(), 360);
    }
}
