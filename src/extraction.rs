//! Response shapes of the document-extraction collaborator.
//!
//! Extraction results are plain values: the caller receives them from the
//! extraction step and hands them to the save step (see
//! [`LineItemLedger::save_extracted_bill`](crate::ledger::LineItemLedger::save_extracted_bill)).

use crate::error::{LedgerError, Result};
use crate::schema::{ContractLineItemDraft, Project};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ExtractedContractLine {
    pub description: String,
    #[serde(default)]
    #[schemars(description = "e.g. Labor, Materials, Equipment, Permits, Other")]
    pub category: Option<String>,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ContractExtraction {
    pub contractor_name: String,
    #[serde(default)]
    #[schemars(description = "YYYY-MM-DD or null")]
    pub contract_date: Option<NaiveDate>,
    pub total_amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub line_items: Vec<ExtractedContractLine>,
    #[serde(default)]
    #[schemars(description = "Important conditions or observations")]
    pub notes: Option<String>,
}

impl ContractExtraction {
    pub fn from_response(raw: &str) -> Result<Self> {
        let extraction: Self = parse_collaborator_json(raw)?;
        check_amount("total_amount", extraction.total_amount)?;
        for (idx, line) in extraction.line_items.iter().enumerate() {
            check_amount(&format!("line_items[{}].amount", idx), line.amount)?;
        }
        Ok(extraction)
    }

    /// Fills the project's contract fields the extraction knows and the project
    /// still lacks. Existing values are never overwritten. Returns whether
    /// anything changed.
    pub fn apply_to(&self, project: &mut Project) -> bool {
        let mut changed = false;

        let has_amount = project.contract_amount.is_some_and(|amount| amount != 0.0);
        if !has_amount && self.total_amount > 0.0 {
            project.contract_amount = Some(self.total_amount);
            changed = true;
        }
        let has_contractor = project
            .contractor_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if !has_contractor && !self.contractor_name.trim().is_empty() {
            project.contractor_name = Some(self.contractor_name.trim().to_string());
            changed = true;
        }
        if project.contract_date.is_none() && self.contract_date.is_some() {
            project.contract_date = self.contract_date;
            changed = true;
        }

        changed
    }

    /// Line item drafts in document order, with ids `<prefix>-<n>` (1-based).
    pub fn line_item_drafts(&self, id_prefix: &str) -> Vec<ContractLineItemDraft> {
        self.line_items
            .iter()
            .enumerate()
            .map(|(idx, line)| ContractLineItemDraft {
                id: format!("{}-{}", id_prefix, idx + 1),
                description: line.description.clone(),
                category: line.category.clone(),
                budgeted_amount: line.amount,
                sort_order: None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ExtractedBillLine {
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    #[schemars(description = "Id of the matching contract line item from the provided list, or null if no match")]
    pub contract_line_item_id: Option<String>,
    #[serde(default)]
    pub is_deviation: bool,
    #[serde(default)]
    pub deviation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BillExtraction {
    #[serde(default)]
    pub bill_number: Option<String>,
    pub contractor_name: String,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub total_amount: f64,
    pub line_items: Vec<ExtractedBillLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BillExtraction {
    pub fn from_response(raw: &str) -> Result<Self> {
        let extraction: Self = parse_collaborator_json(raw)?;
        check_amount("total_amount", extraction.total_amount)?;
        for (idx, line) in extraction.line_items.iter().enumerate() {
            if !line.amount.is_finite() {
                return Err(LedgerError::ExternalCollaborator(format!(
                    "line_items[{}].amount is not a finite number",
                    idx
                )));
            }
        }
        Ok(extraction)
    }
}

/// Fields read from a transfer receipt (e.g. a PIX confirmation screenshot).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ReceiptExtraction {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ReceiptExtraction {
    pub fn from_response(raw: &str) -> Result<Self> {
        let extraction: Self = parse_collaborator_json(raw)?;
        if let Some(amount) = extraction.amount {
            check_amount("amount", amount)?;
        }
        Ok(extraction)
    }
}

/// Parses a collaborator reply, tolerating a surrounding markdown code fence.
pub(crate) fn parse_collaborator_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|e| {
        LedgerError::ExternalCollaborator(format!("Malformed response: {}", e))
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::ExternalCollaborator(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(())
}
