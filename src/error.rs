use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bill line item '{line_item}' references contract line item '{reference}' outside project '{project_id}'")]
    ReferenceIntegrity {
        line_item: String,
        reference: String,
        project_id: String,
    },

    #[error("Unknown bill: {0}")]
    UnknownBill(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("External collaborator error: {0}")]
    ExternalCollaborator(String),

    #[error("Collaborator call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "llm")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LedgerError::InvalidInput(format!(
            "{} must be a finite number, got {}",
            field, value
        )))
    }
}
