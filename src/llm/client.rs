use crate::error::{LedgerError, Result};
use crate::estimate::EstimateRequest;
use crate::extraction::{BillExtraction, ContractExtraction, ReceiptExtraction};
use crate::llm::types::*;
use crate::prompts::{ExtractionKind, PromptStrategy};
use crate::schema::{ContractLineItem, CostEstimate};
use futures::future::try_join_all;
use log::{debug, warn};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-opus-4-5";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the document-reading and estimation collaborator.
///
/// Every call either returns a validated value or an error; nothing the
/// caller owns is touched, so a failed or timed-out call can simply be retried.
#[derive(Clone)]
pub struct MessagesClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl MessagesClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub async fn extract_contract(
        &self,
        strategy: &PromptStrategy,
        document: &Attachment,
    ) -> Result<ContractExtraction> {
        let kind = ExtractionKind::ContractLineItems;
        let system = strategy.system_prompt(kind)?;
        let raw = self
            .send(&system, document_content(document, strategy.user_instruction(kind)))
            .await?;
        ContractExtraction::from_response(&raw)
    }

    pub async fn extract_bill(
        &self,
        strategy: &PromptStrategy,
        document: &Attachment,
        line_items: &[ContractLineItem],
    ) -> Result<BillExtraction> {
        let system = strategy.bill_prompt(line_items)?;
        let raw = self
            .send(
                &system,
                document_content(document, strategy.user_instruction(ExtractionKind::Bill)),
            )
            .await?;
        BillExtraction::from_response(&raw)
    }

    /// Extracts several bills concurrently. The first failure fails the batch.
    pub async fn extract_bills(
        &self,
        strategy: &PromptStrategy,
        documents: &[Attachment],
        line_items: &[ContractLineItem],
    ) -> Result<Vec<BillExtraction>> {
        try_join_all(
            documents
                .iter()
                .map(|doc| self.extract_bill(strategy, doc, line_items)),
        )
        .await
    }

    pub async fn extract_receipt(
        &self,
        strategy: &PromptStrategy,
        document: &Attachment,
    ) -> Result<ReceiptExtraction> {
        let kind = ExtractionKind::Receipt;
        let system = strategy.system_prompt(kind)?;
        let raw = self
            .send(&system, document_content(document, strategy.user_instruction(kind)))
            .await?;
        ReceiptExtraction::from_response(&raw)
    }

    pub async fn request_estimate(&self, request: &EstimateRequest) -> Result<CostEstimate> {
        let raw = self
            .send(
                &request.system,
                vec![ContentBlock::text(request.user_prompt.clone())],
            )
            .await?;
        CostEstimate::from_response(&raw)
    }

    /// Sends one user turn and returns the text of the first content block.
    pub async fn send(&self, system: &str, content: Vec<ContentBlock>) -> Result<String> {
        with_timeout(self.timeout, self.post_messages(system, content)).await
    }

    async fn post_messages(&self, system: &str, content: Vec<ContentBlock>) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let payload = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![Message::user(content)],
        };

        debug!("Posting to {} with model {}", url, self.model);
        let res = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await?;
            let message = serde_json::from_str::<ApiErrorBody>(&err_text)
                .map(|body| body.error.message)
                .unwrap_or(err_text);
            warn!("Messages API returned {}", status);
            return Err(LedgerError::ExternalCollaborator(format!(
                "Messages API error (status {}): {}",
                status, message
            )));
        }

        let body: MessagesResponse = res.json().await?;
        body.content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| {
                LedgerError::ExternalCollaborator("Response contained no text block".to_string())
            })
    }
}

fn document_content(document: &Attachment, instruction: &str) -> Vec<ContentBlock> {
    vec![document.to_block(), ContentBlock::text(instruction)]
}

async fn with_timeout<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Collaborator call exceeded {:?}", limit);
            Err(LedgerError::Timeout(limit.as_secs()))
        }
    }
}
