use crate::error::{ensure_finite, LedgerError, Result};
use crate::extraction::parse_collaborator_json;
use crate::ledger::{deviation_rows, total_budget, total_billed, total_invoiced, unmapped_billed, DeviationRow};
use crate::prompts::{ExtractionKind, PromptStrategy};
use crate::schema::{Bill, ContractLineItem, CostEstimate, Payment, PaymentTarget, Project};
use log::debug;
use serde::{Deserialize, Serialize};

/// Everything the estimation collaborator gets to see about one project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSnapshot {
    pub project_name: String,
    pub status: String,
    pub total_budget: f64,
    pub total_billed: f64,
    pub unmapped_billed: f64,
    pub total_invoiced: f64,
    pub total_paid: f64,
    pub deviations: Vec<DeviationRow>,
}

/// Builds the snapshot from the project's own records. Line items, bills and
/// payments belonging to other projects are ignored, so the same inputs always
/// give the same snapshot.
pub fn build_summary(
    project: &Project,
    line_items: &[ContractLineItem],
    bills: &[Bill],
    payments: &[Payment],
) -> Result<ProjectSnapshot> {
    let own_items: Vec<ContractLineItem> = line_items
        .iter()
        .filter(|item| item.project_id == project.id)
        .cloned()
        .collect();
    let own_bills: Vec<Bill> = bills
        .iter()
        .filter(|bill| bill.project_id == project.id)
        .cloned()
        .collect();
    let target = PaymentTarget::Project(project.id.clone());

    let total_paid = ensure_finite(
        "total_paid",
        payments
            .iter()
            .filter(|p| p.target == target)
            .map(|p| p.amount)
            .sum(),
    )?;
    let deviations = deviation_rows(&own_items, &own_bills)?;

    let snapshot = ProjectSnapshot {
        project_name: project.name.clone(),
        status: project.status.clone(),
        total_budget: ensure_finite("total_budget", total_budget(project, &own_items))?,
        total_billed: total_billed(&own_bills),
        unmapped_billed: unmapped_billed(&own_bills),
        total_invoiced: ensure_finite("total_invoiced", total_invoiced(&own_bills))?,
        total_paid,
        deviations,
    };

    debug!(
        "Built snapshot for '{}': budget {:.2}, billed {:.2}, paid {:.2}",
        snapshot.project_name, snapshot.total_budget, snapshot.total_billed, snapshot.total_paid
    );
    Ok(snapshot)
}

/// A ready-to-send estimation request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EstimateRequest {
    pub system: String,
    pub user_prompt: String,
    pub snapshot: ProjectSnapshot,
}

impl EstimateRequest {
    pub fn new(snapshot: ProjectSnapshot, strategy: &PromptStrategy) -> Result<Self> {
        let system = strategy.system_prompt(ExtractionKind::CostEstimate)?;
        let user_prompt = format!(
            "{}\n\nProject data:\n{}",
            strategy.user_instruction(ExtractionKind::CostEstimate),
            serde_json::to_string_pretty(&snapshot)?
        );
        Ok(Self {
            system,
            user_prompt,
            snapshot,
        })
    }
}

impl CostEstimate {
    /// Parses and checks a collaborator response. Any missing field, negative or
    /// non-finite amount, inverted range or empty summary is rejected.
    pub fn from_response(raw: &str) -> Result<Self> {
        let estimate: CostEstimate = parse_collaborator_json(raw)?;

        for (field, value) in [
            ("estimated_final_cost", estimate.estimated_final_cost),
            ("confidence_low", estimate.confidence_low),
            ("confidence_high", estimate.confidence_high),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::ExternalCollaborator(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }
        if estimate.confidence_low > estimate.confidence_high {
            return Err(LedgerError::ExternalCollaborator(format!(
                "confidence_low {} exceeds confidence_high {}",
                estimate.confidence_low, estimate.confidence_high
            )));
        }
        if estimate.summary.trim().is_empty() {
            return Err(LedgerError::ExternalCollaborator(
                "summary must not be empty".to_string(),
            ));
        }

        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BillLineItem, BillStatus, RiskLevel};
    use chrono::NaiveDate;

    fn project() -> Project {
        Project {
            id: "p1".to_string(),
            name: "Kitchen".to_string(),
            status: "in_progress".to_string(),
            contract_amount: Some(50000.0),
            contractor_name: None,
            contract_date: None,
        }
    }

    fn bill(id: &str, project_id: &str, lines: Vec<(Option<&str>, f64)>) -> Bill {
        Bill {
            id: id.to_string(),
            project_id: project_id.to_string(),
            bill_number: None,
            contractor_name: "Obra Certa".to_string(),
            issue_date: None,
            due_date: None,
            total_amount: lines.iter().map(|(_, a)| a).sum(),
            status: BillStatus::Pending,
            line_items: lines
                .into_iter()
                .enumerate()
                .map(|(i, (item, amount))| BillLineItem {
                    id: format!("{}-{}", id, i),
                    bill_id: id.to_string(),
                    contract_line_item_id: item.map(str::to_string),
                    description: "line".to_string(),
                    amount,
                    is_deviation: false,
                    deviation_reason: None,
                })
                .collect(),
        }
    }

    fn paid(target: &str, amount: f64) -> Payment {
        Payment {
            id: format!("pay-{}", amount),
            target: PaymentTarget::Project(target.to_string()),
            paid_by: "ana".to_string(),
            amount,
            payment_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            payment_method: None,
            notes: None,
            proof_reference: None,
        }
    }

    #[test]
    fn test_summary_uses_contract_amount_without_line_items() {
        let snapshot = build_summary(&project(), &[], &[], &[]).unwrap();
        assert_eq!(snapshot.total_budget, 50000.0);
        assert!(snapshot.deviations.is_empty());
        assert_eq!(snapshot.total_paid, 0.0);
    }

    #[test]
    fn test_summary_ignores_other_projects() {
        let items = vec![ContractLineItem {
            id: "li-1".to_string(),
            project_id: "p1".to_string(),
            description: "Tiles".to_string(),
            category: None,
            budgeted_amount: 1000.0,
            sort_order: 0,
        }];
        let bills = vec![
            bill("b1", "p1", vec![(Some("li-1"), 1200.0), (None, 50.0)]),
            bill("b2", "p2", vec![(None, 999.0)]),
        ];
        let payments = vec![paid("p1", 500.0), paid("p2", 700.0)];

        let snapshot = build_summary(&project(), &items, &bills, &payments).unwrap();
        assert_eq!(snapshot.total_budget, 1000.0);
        assert_eq!(snapshot.total_billed, 1250.0);
        assert_eq!(snapshot.unmapped_billed, 50.0);
        assert_eq!(snapshot.total_invoiced, 1250.0);
        assert_eq!(snapshot.total_paid, 500.0);
        assert_eq!(snapshot.deviations[0].deviation, 200.0);

        let again = build_summary(&project(), &items, &bills, &payments).unwrap();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn test_request_embeds_snapshot() {
        let snapshot = build_summary(&project(), &[], &[], &[]).unwrap();
        let request = EstimateRequest::new(snapshot, &PromptStrategy::default()).unwrap();
        assert!(request.system.contains("construction cost analyst"));
        assert!(request.user_prompt.contains("\"total_budget\": 50000.0"));
    }

    #[test]
    fn test_valid_estimate_response() {
        let raw = r#"```json
{"estimated_final_cost": 52000, "confidence_low": 50000, "confidence_high": 56000,
 "risk_level": "medium", "key_observations": ["Tiles over budget"],
 "recommendations": ["Lock in plumbing quote"], "summary": "Slightly over budget."}
```"#;
        let estimate = CostEstimate::from_response(raw).unwrap();
        assert_eq!(estimate.risk_level, RiskLevel::Medium);
        assert_eq!(estimate.estimated_final_cost, 52000.0);
    }

    #[test]
    fn test_malformed_estimate_responses() {
        let missing = r#"{"estimated_final_cost": 1, "confidence_low": 1, "confidence_high": 2,
            "risk_level": "low", "key_observations": [], "recommendations": []}"#;
        let inverted = r#"{"estimated_final_cost": 1, "confidence_low": 3, "confidence_high": 2,
            "risk_level": "low", "key_observations": [], "recommendations": [], "summary": "x"}"#;
        let negative = r#"{"estimated_final_cost": -1, "confidence_low": 0, "confidence_high": 2,
            "risk_level": "low", "key_observations": [], "recommendations": [], "summary": "x"}"#;
        let bad_risk = r#"{"estimated_final_cost": 1, "confidence_low": 0, "confidence_high": 2,
            "risk_level": "extreme", "key_observations": [], "recommendations": [], "summary": "x"}"#;
        let blank = r#"{"estimated_final_cost": 1, "confidence_low": 0, "confidence_high": 2,
            "risk_level": "low", "key_observations": [], "recommendations": [], "summary": "  "}"#;

        for raw in [missing, inverted, negative, bad_risk, blank, "not json"] {
            assert!(matches!(
                CostEstimate::from_response(raw),
                Err(LedgerError::ExternalCollaborator(_))
            ));
        }
    }
}
