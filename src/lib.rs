//! # Renovation Ledger
//!
//! Financial reconciliation for a household running renovation projects
//! alongside a mortgage.
//!
//! ## Core Concepts
//!
//! - **Ledger**: contract line items (the budget) and bills (the actuals) per project
//! - **Deviation**: billed minus budgeted, per contract line item
//! - **Amortization**: fixed-payment mortgage schedules and positional matching of real payments
//! - **Obligations**: payment duties read from protocol spreadsheets, paired with slip and invoice files
//! - **Aggregation**: who paid how much, and when
//!
//! ## Example
//!
//! ```rust
//! use renovation_ledger::*;
//! use chrono::NaiveDate;
//!
//! let loan = MortgageLoan {
//!     id: "m1".to_string(),
//!     property_name: "Casa".to_string(),
//!     principal: 300_000.0,
//!     annual_interest_rate_pct: 3.5,
//!     term_months: 360,
//!     start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     monthly_payment: 1347.13,
//! };
//!
//! let first = loan.schedule().unwrap().iter().next().unwrap();
//! assert_eq!(first.interest, 875.00);
//! assert_eq!(first.balance, 299_527.87);
//! ```

pub mod aggregation;
pub mod amortization;
pub mod config;
pub mod error;
pub mod estimate;
pub mod extraction;
pub mod ledger;
pub mod messaging;
pub mod obligations;
pub mod prompts;
pub mod schema;
pub mod utils;
pub mod workbook;

#[cfg(feature = "llm")]
pub mod llm;

pub use aggregation::{
    aggregate_by_payer, household_contributions, monthly_buckets, percentage_share, Contribution,
    MonthlyBucket, PayerTotals, PaymentFilter,
};
pub use amortization::{
    build_schedule, level_payment, reconcile_payments, AmortizationSchedule, InstallmentMatch,
    MortgageReconciliation, ScheduleRow,
};
pub use config::{FileMatcherConfig, MatchStrategy, MessageFormat, ObligationParserConfig};
pub use error::{LedgerError, Result};
pub use estimate::{build_summary, EstimateRequest, ProjectSnapshot};
pub use extraction::{
    BillExtraction, ContractExtraction, ExtractedBillLine, ExtractedContractLine, ReceiptExtraction,
};
pub use ledger::{
    project_overview, DeviationReport, DeviationRow, LineItemLedger, ProjectOverview,
};
pub use messaging::render_payment_message;
pub use obligations::{
    match_files_to_obligations, parse_obligations, FileMatcher, ObligationParser, ParseOutcome,
    ValidationIssue,
};
pub use prompts::{ExtractionKind, PromptStrategy};
pub use schema::*;
pub use workbook::{Cell, Sheet, Workbook};

use log::info;

/// Reconciles a loan against a payment stream that may also hold renovation
/// payments or installments of other loans. Only payments targeting this loan
/// are matched.
pub fn reconcile_mortgage(loan: &MortgageLoan, payments: &[Payment]) -> Result<MortgageReconciliation> {
    let target = PaymentTarget::Mortgage(loan.id.clone());
    let own: Vec<Payment> = payments
        .iter()
        .filter(|p| p.target == target)
        .cloned()
        .collect();

    let schedule = loan.schedule()?;
    let reconciliation = reconcile_payments(&schedule, &own)?;

    info!(
        "Mortgage '{}': {} installments paid, outstanding {:.2}",
        loan.property_name,
        reconciliation.payments_made(),
        reconciliation.outstanding_balance
    );
    Ok(reconciliation)
}
