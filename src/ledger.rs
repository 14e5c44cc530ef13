use crate::error::{ensure_finite, LedgerError, Result};
use crate::extraction::BillExtraction;
use crate::schema::{
    Bill, BillLineItem, ContractLineItem, ContractLineItemDraft, Payment, PaymentTarget, Project,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviationRow {
    pub contract_line_item_id: String,
    pub description: String,
    pub category: Option<String>,
    pub sort_order: u32,
    pub budgeted: f64,
    pub billed: f64,
    pub deviation: f64,
    pub deviation_pct: f64,
}

/// Budget vs. billed view of one project.
///
/// `total_billed` sums every bill line item of the project, while the rows only
/// see line items mapped to a contract line item. The difference is reported as
/// `unmapped_billed` instead of being spread over the rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviationReport {
    pub project_id: String,
    pub rows: Vec<DeviationRow>,
    pub total_billed: f64,
    pub unmapped_billed: f64,
}

impl DeviationReport {
    pub fn mapped_billed(&self) -> f64 {
        self.rows.iter().map(|r| r.billed).sum()
    }
}

/// Per-line deviations for the given contract line items against the bills of
/// their project. Rows come back in `sort_order`.
pub fn deviation_rows(line_items: &[ContractLineItem], bills: &[Bill]) -> Result<Vec<DeviationRow>> {
    let mut billed_by_item: HashMap<(&str, &str), f64> = HashMap::new();
    for bill in bills {
        for line in &bill.line_items {
            let amount = ensure_finite("bill line item amount", line.amount)?;
            if let Some(item_id) = line.contract_line_item_id.as_deref() {
                *billed_by_item
                    .entry((bill.project_id.as_str(), item_id))
                    .or_insert(0.0) += amount;
            }
        }
    }

    let mut ordered: Vec<&ContractLineItem> = line_items.iter().collect();
    ordered.sort_by_key(|item| item.sort_order);

    ordered
        .into_iter()
        .map(|item| {
            let budgeted = ensure_finite("budgeted_amount", item.budgeted_amount)?;
            let billed = billed_by_item
                .get(&(item.project_id.as_str(), item.id.as_str()))
                .copied()
                .unwrap_or(0.0);
            let deviation = billed - budgeted;
            let deviation_pct = if budgeted > 0.0 {
                deviation / budgeted * 100.0
            } else {
                0.0
            };

            Ok(DeviationRow {
                contract_line_item_id: item.id.clone(),
                description: item.description.clone(),
                category: item.category.clone(),
                sort_order: item.sort_order,
                budgeted,
                billed,
                deviation,
                deviation_pct,
            })
        })
        .collect()
}

/// Line item budgets win over the flat contract amount, but only when at least
/// one line item exists.
pub fn total_budget(project: &Project, line_items: &[ContractLineItem]) -> f64 {
    if line_items.is_empty() {
        project.contract_amount.unwrap_or(0.0)
    } else {
        line_items.iter().map(|item| item.budgeted_amount).sum()
    }
}

/// Flat sum of every bill line item, mapped or not.
pub fn total_billed(bills: &[Bill]) -> f64 {
    bills
        .iter()
        .flat_map(|bill| bill.line_items.iter())
        .map(|line| line.amount)
        .sum()
}

pub fn unmapped_billed(bills: &[Bill]) -> f64 {
    bills
        .iter()
        .flat_map(|bill| bill.line_items.iter())
        .filter(|line| line.contract_line_item_id.is_none())
        .map(|line| line.amount)
        .sum()
}

/// Sum of bill header totals (what the contractor invoiced, itemized or not).
pub fn total_invoiced(bills: &[Bill]) -> f64 {
    bills.iter().map(|bill| bill.total_amount).sum()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectOverview {
    pub project_id: String,
    pub budget: f64,
    pub billed: f64,
    pub paid: f64,
    pub remaining: f64,
    pub pct_paid: f64,
    pub deviation_pct: f64,
}

/// Dashboard figures for one project. Bills and payments of other projects are ignored.
pub fn project_overview(
    project: &Project,
    line_items: &[ContractLineItem],
    bills: &[Bill],
    payments: &[Payment],
) -> Result<ProjectOverview> {
    let budget = ensure_finite("budget", total_budget(project, line_items))?;
    let billed = ensure_finite(
        "billed",
        bills
            .iter()
            .filter(|b| b.project_id == project.id)
            .map(|b| b.total_amount)
            .sum(),
    )?;
    let target = PaymentTarget::Project(project.id.clone());
    let paid = ensure_finite(
        "paid",
        payments
            .iter()
            .filter(|p| p.target == target)
            .map(|p| p.amount)
            .sum(),
    )?;

    let (pct_paid, deviation_pct) = if budget > 0.0 {
        ((paid / budget * 100.0).min(100.0), (billed - budget) / budget * 100.0)
    } else {
        (0.0, 0.0)
    };

    Ok(ProjectOverview {
        project_id: project.id.clone(),
        budget,
        billed,
        paid,
        remaining: budget - paid,
        pct_paid,
        deviation_pct,
    })
}

/// In-memory view of one household's contract line items and bills.
///
/// Every mutating call validates its whole batch before touching state, so a
/// rejected call leaves the ledger exactly as it was.
#[derive(Debug, Clone, Default)]
pub struct LineItemLedger {
    line_items: Vec<ContractLineItem>,
    bills: Vec<Bill>,
}

impl LineItemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contract_line_items(
        &mut self,
        project_id: &str,
        drafts: Vec<ContractLineItemDraft>,
    ) -> Result<&[ContractLineItem]> {
        if project_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "project_id must not be empty".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = self.line_items.iter().map(|i| i.id.as_str()).collect();
        for draft in &drafts {
            let budget = ensure_finite("budgeted_amount", draft.budgeted_amount)?;
            if budget < 0.0 {
                return Err(LedgerError::InvalidInput(format!(
                    "budgeted_amount of '{}' must be >= 0, got {}",
                    draft.id, budget
                )));
            }
            if !seen.insert(draft.id.as_str()) {
                return Err(LedgerError::DuplicateId(draft.id.clone()));
            }
        }

        let existing = self
            .line_items
            .iter()
            .filter(|i| i.project_id == project_id)
            .count() as u32;
        let start = self.line_items.len();

        for (idx, draft) in drafts.into_iter().enumerate() {
            self.line_items.push(ContractLineItem {
                sort_order: draft.sort_order.unwrap_or(existing + idx as u32),
                id: draft.id,
                project_id: project_id.to_string(),
                description: draft.description,
                category: draft.category,
                budgeted_amount: draft.budgeted_amount,
            });
        }

        debug!(
            "Added {} contract line items to project {}",
            self.line_items.len() - start,
            project_id
        );

        Ok(&self.line_items[start..])
    }

    /// Registers a bill header. Line items already attached to it go through the
    /// same reference checks as [`record_bill_line_items`](Self::record_bill_line_items).
    pub fn register_bill(&mut self, mut bill: Bill) -> Result<()> {
        if self.bills.iter().any(|b| b.id == bill.id) {
            return Err(LedgerError::DuplicateId(bill.id));
        }
        ensure_finite("total_amount", bill.total_amount)?;
        self.validate_lines(&bill.project_id, &bill.line_items, &HashSet::new())?;
        for item in &mut bill.line_items {
            item.bill_id = bill.id.clone();
        }

        debug!(
            "Registered bill {} for project {} with {} line items",
            bill.id,
            bill.project_id,
            bill.line_items.len()
        );
        self.bills.push(bill);
        Ok(())
    }

    pub fn record_bill_line_items(&mut self, bill_id: &str, items: Vec<BillLineItem>) -> Result<()> {
        let idx = self
            .bills
            .iter()
            .position(|b| b.id == bill_id)
            .ok_or_else(|| LedgerError::UnknownBill(bill_id.to_string()))?;

        let bill = &self.bills[idx];
        let existing: HashSet<&str> = bill.line_items.iter().map(|l| l.id.as_str()).collect();
        self.validate_lines(&bill.project_id, &items, &existing)?;

        let bill = &mut self.bills[idx];
        bill.line_items.extend(items.into_iter().map(|mut item| {
            item.bill_id = bill_id.to_string();
            item
        }));
        Ok(())
    }

    /// Save step of the bill extraction flow. The extraction result comes in as
    /// an argument; line item ids are `<bill id>-<n>` (1-based).
    pub fn save_extracted_bill(&mut self, mut bill: Bill, extraction: &BillExtraction) -> Result<()> {
        bill.line_items = extraction
            .line_items
            .iter()
            .enumerate()
            .map(|(idx, line)| BillLineItem {
                id: format!("{}-{}", bill.id, idx + 1),
                bill_id: bill.id.clone(),
                contract_line_item_id: line.contract_line_item_id.clone(),
                description: line.description.clone(),
                amount: line.amount,
                is_deviation: line.is_deviation,
                deviation_reason: line.deviation_reason.clone(),
            })
            .collect();

        self.register_bill(bill)
    }

    pub fn line_items(&self, project_id: &str) -> Vec<ContractLineItem> {
        let mut items: Vec<ContractLineItem> = self
            .line_items
            .iter()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.sort_order);
        items
    }

    pub fn bills(&self, project_id: &str) -> Vec<Bill> {
        self.bills
            .iter()
            .filter(|b| b.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn compute_deviation(&self, project_id: &str) -> Result<DeviationReport> {
        let items = self.line_items(project_id);
        let bills = self.bills(project_id);

        let rows = deviation_rows(&items, &bills)?;
        let report = DeviationReport {
            project_id: project_id.to_string(),
            rows,
            total_billed: total_billed(&bills),
            unmapped_billed: unmapped_billed(&bills),
        };

        info!(
            "Project {}: {} line items, billed {:.2} ({:.2} unmapped)",
            project_id,
            report.rows.len(),
            report.total_billed,
            report.unmapped_billed
        );

        Ok(report)
    }

    pub fn total_budget(&self, project: &Project) -> f64 {
        total_budget(project, &self.line_items(&project.id))
    }

    fn validate_lines(
        &self,
        project_id: &str,
        items: &[BillLineItem],
        existing_ids: &HashSet<&str>,
    ) -> Result<()> {
        let mut seen: HashSet<&str> = existing_ids.clone();
        for item in items {
            ensure_finite("bill line item amount", item.amount)?;
            if !seen.insert(item.id.as_str()) {
                return Err(LedgerError::DuplicateId(item.id.clone()));
            }

            let Some(reference) = item.contract_line_item_id.as_deref() else {
                continue;
            };
            let same_project = self
                .line_items
                .iter()
                .any(|li| li.id == reference && li.project_id == project_id);
            if !same_project {
                return Err(LedgerError::ReferenceIntegrity {
                    line_item: item.id.clone(),
                    reference: reference.to_string(),
                    project_id: project_id.to_string(),
                });
            }
        }
        Ok(())
    }
}
