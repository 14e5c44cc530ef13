use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    /// Flat contract value. Only used for budgeting when the project has no line items.
    #[serde(default)]
    pub contract_amount: Option<f64>,
    #[serde(default)]
    pub contractor_name: Option<String>,
    #[serde(default)]
    pub contract_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractLineItem {
    pub id: String,
    pub project_id: String,
    pub description: String,
    pub category: Option<String>,
    pub budgeted_amount: f64,
    pub sort_order: u32,
}

/// A contract line item as it arrives at ingestion, before the ledger owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractLineItemDraft {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub budgeted_amount: f64,
    #[serde(default)]
    pub sort_order: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    #[default]
    Pending,
    Paid,
    Disputed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bill {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub bill_number: Option<String>,
    pub contractor_name: String,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub total_amount: f64,
    #[serde(default)]
    pub status: BillStatus,
    #[serde(default)]
    pub line_items: Vec<BillLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillLineItem {
    pub id: String,
    pub bill_id: String,
    /// Weak reference into the contract line items of the same project.
    #[serde(default)]
    pub contract_line_item_id: Option<String>,
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub is_deviation: bool,
    #[serde(default)]
    pub deviation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Project(String),
    Mortgage(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub target: PaymentTarget,
    pub paid_by: String,
    pub amount: f64,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Reference to the stored proof of payment (receipt upload), if any.
    #[serde(default)]
    pub proof_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payer {
    pub id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MortgageLoan {
    pub id: String,
    pub property_name: String,
    pub principal: f64,
    pub annual_interest_rate_pct: f64,
    pub term_months: u32,
    pub start_date: NaiveDate,
    pub monthly_payment: f64,
}

/// A file offered for matching. `handle` is whatever the caller uses to find it again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
}

impl FileRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
        }
    }
}

/// A payment obligation read from one row of a protocol spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObligationRecord {
    pub protocol_number: Option<String>,
    pub sheet_name: String,
    pub supplier: String,
    pub invoice_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
    pub category: Option<String>,
    pub status: String,
    pub payment_method: Option<String>,
    /// Recipient label the obligation is delegated to.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Typed payment slip line ("linha digitável").
    #[serde(default)]
    pub payment_code: Option<String>,
    #[serde(default)]
    pub slip_file: Option<FileRef>,
    #[serde(default)]
    pub invoice_file: Option<FileRef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CostEstimate {
    #[schemars(description = "Projected total cost of the project once finished")]
    pub estimated_final_cost: f64,
    #[schemars(description = "Lower bound of the estimate")]
    pub confidence_low: f64,
    #[schemars(description = "Upper bound of the estimate")]
    pub confidence_high: f64,
    pub risk_level: RiskLevel,
    pub key_observations: Vec<String>,
    pub recommendations: Vec<String>,
    #[schemars(description = "2-3 sentence plain language summary")]
    pub summary: String,
}

impl CostEstimate {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CostEstimate)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}
