//! System prompts for the document-extraction and estimation collaborator.
//!
//! A single [`PromptStrategy`] renders every prompt from a template, a locale
//! and a schema version instead of keeping one hand-written builder per
//! language or response layout.

use crate::error::Result;
use crate::extraction::{BillExtraction, ContractExtraction, ReceiptExtraction};
use crate::schema::{ContractLineItem, CostEstimate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    ContractLineItems,
    Bill,
    Receipt,
    CostEstimate,
}

const DEFAULT_TEMPLATE: &str = "{{role}}\n\
Return ONLY valid JSON, no markdown, matching this structure:\n\
{{schema}}\n\
Write every free-text field in {{language}}.\n\
{{context}}";

const CONTRACT_SHAPE: &str = r#"{
  "contractor_name": "string",
  "contract_date": "YYYY-MM-DD or null",
  "total_amount": number,
  "currency": "EUR or USD or other",
  "line_items": [
    { "description": "string", "category": "string (e.g. Labor, Materials, Equipment, Permits, Other)", "amount": number }
  ],
  "notes": "any important conditions or observations"
}"#;

const BILL_SHAPE: &str = r#"{
  "bill_number": "string or null",
  "contractor_name": "string",
  "issue_date": "YYYY-MM-DD or null",
  "due_date": "YYYY-MM-DD or null",
  "total_amount": number,
  "line_items": [
    {
      "description": "string",
      "amount": number,
      "contract_line_item_id": "id from list or null if no match",
      "is_deviation": boolean,
      "deviation_reason": "string explaining why this deviates, or null"
    }
  ],
  "notes": "any observations about this bill"
}"#;

const RECEIPT_SHAPE: &str = r#"{
  "amount": number,
  "payment_date": "YYYY-MM-DD or null",
  "notes": "payer, payee and transaction id if visible"
}"#;

const ESTIMATE_SHAPE: &str = r#"{
  "estimated_final_cost": number,
  "confidence_low": number,
  "confidence_high": number,
  "risk_level": "low|medium|high",
  "key_observations": ["string", "string"],
  "recommendations": ["string", "string"],
  "summary": "2-3 sentence plain language summary"
}"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptStrategy {
    /// BCP 47 tag, e.g. `en`, `pt-BR`, `de-DE`.
    pub locale: String,
    /// 1: example-shaped JSON skeleton. 2: generated JSON Schema.
    pub schema_version: u32,
    /// Per-kind replacements for the default template.
    pub templates: BTreeMap<ExtractionKind, String>,
}

impl Default for PromptStrategy {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            schema_version: 1,
            templates: BTreeMap::new(),
        }
    }
}

impl PromptStrategy {
    pub fn for_locale(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, kind: ExtractionKind, template: impl Into<String>) -> Self {
        self.templates.insert(kind, template.into());
        self
    }

    pub fn language(&self) -> &'static str {
        match self.locale.split('-').next().unwrap_or("") {
            "pt" => "Brazilian Portuguese",
            "de" => "German",
            "es" => "Spanish",
            _ => "English",
        }
    }

    pub fn system_prompt(&self, kind: ExtractionKind) -> Result<String> {
        self.render(kind, "")
    }

    /// Bill prompt listing the contract line items the collaborator may map to.
    pub fn bill_prompt(&self, line_items: &[ContractLineItem]) -> Result<String> {
        let mut context = String::new();
        if !line_items.is_empty() {
            context.push_str("Contract line items for mapping:\n");
            for (i, item) in line_items.iter().enumerate() {
                context.push_str(&format!(
                    "{}. [ID: {}] {} - Budget: {}\n",
                    i + 1,
                    item.id,
                    item.description,
                    item.budgeted_amount
                ));
            }
        }
        self.render(ExtractionKind::Bill, &context)
    }

    pub fn user_instruction(&self, kind: ExtractionKind) -> &'static str {
        match kind {
            ExtractionKind::ContractLineItems => "Extract all line items from this contract document.",
            ExtractionKind::Bill => "Extract and map all items from this bill.",
            ExtractionKind::Receipt => "Extract the payment details from this receipt.",
            ExtractionKind::CostEstimate => "Provide a final cost estimate for this project.",
        }
    }

    fn render(&self, kind: ExtractionKind, context: &str) -> Result<String> {
        let template = self
            .templates
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TEMPLATE);

        Ok(template
            .replace("{{role}}", role(kind))
            .replace("{{schema}}", &self.schema(kind)?)
            .replace("{{language}}", self.language())
            .replace("{{context}}", context)
            .trim_end()
            .to_string())
    }

    fn schema(&self, kind: ExtractionKind) -> Result<String> {
        if self.schema_version < 2 {
            let shape = match kind {
                ExtractionKind::ContractLineItems => CONTRACT_SHAPE,
                ExtractionKind::Bill => BILL_SHAPE,
                ExtractionKind::Receipt => RECEIPT_SHAPE,
                ExtractionKind::CostEstimate => ESTIMATE_SHAPE,
            };
            return Ok(shape.to_string());
        }

        match kind {
            ExtractionKind::ContractLineItems => json_schema::<ContractExtraction>(),
            ExtractionKind::Bill => json_schema::<BillExtraction>(),
            ExtractionKind::Receipt => json_schema::<ReceiptExtraction>(),
            ExtractionKind::CostEstimate => json_schema::<CostEstimate>(),
        }
    }
}

fn role(kind: ExtractionKind) -> &'static str {
    match kind {
        ExtractionKind::ContractLineItems => {
            "You are a construction contract analyst. Extract all line items from the contract."
        }
        ExtractionKind::Bill => {
            "You are a construction billing analyst. Extract all data from this bill/invoice, \
             then map each bill line item to the most relevant contract line item from the provided list."
        }
        ExtractionKind::Receipt => {
            "You read bank transfer receipts and extract the amount, date and reference of the transfer."
        }
        ExtractionKind::CostEstimate => {
            "You are a construction cost analyst with expertise in residential renovation projects. \
             Analyze the project data and provide a cost estimate."
        }
    }
}

fn json_schema<T: JsonSchema>() -> Result<String> {
    Ok(serde_json::to_string_pretty(&schemars::schema_for!(T))?)
}
