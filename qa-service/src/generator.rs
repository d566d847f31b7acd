//! Natural language to SQL generation.
//!
//! The model is asked for a single statement in the dialect of the connected
//! database. Its answer is returned untouched apart from surrounding
//! whitespace; cleanup happens in the sanitizer.

use std::time::Duration;

use async_trait::async_trait;
use common::config::LlmConfig;
use common::errors::{AppError, AppResult};
use common::models::connection::DbType;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaSummary;

/// Generation stops before the model starts inventing results.
const STOP_SEQUENCE: &str = "\nSQLResult:";

/// Turns a question into SQL text.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Returns the raw model output for `question` against `schema`.
    async fn generate(&self, question: &str, schema: &SchemaSummary) -> AppResult<String>;
}

/// Builds the prompt sent to the model.
pub fn build_prompt(question: &str, schema: &SchemaSummary, top_k: u32) -> String {
    let dialect = schema.db_type.dialect();
    let (quote_hint, today_hint) = match schema.db_type {
        DbType::MySQL => (
            "Wrap each column name in backticks (`) to denote them as delimited identifiers.",
            "Use the CURDATE() function to get the current date if the question involves \"today\".",
        ),
        DbType::SQLite => (
            "Wrap each column name in double quotes (\") to denote them as delimited identifiers.",
            "Use the date('now') function to get the current date if the question involves \"today\".",
        ),
    };

    format!(
        "You are a {dialect} expert. Given an input question, write one syntactically correct \
{dialect} query that answers it.\n\
Unless the question asks for a specific number of examples, return at most {top_k} results \
using the LIMIT clause as per {dialect}. You can order the results to return the most \
informative data in the database.\n\
Never query for all columns from a table. Query only the columns that are needed to answer \
the question. {quote_hint}\n\
Only use column names you can see in the tables below and do not query columns that do not \
exist. Pay attention to which column is in which table.\n\
{today_hint}\n\
\n\
Use the following format:\n\
\n\
Question: Question here\n\
SQLQuery: SQL Query to run\n\
SQLResult: Result of the SQLQuery\n\
Answer: Final answer here\n\
\n\
Only use the following tables:\n\
{schema}\n\
Question: {question}\n\
SQLQuery: "
    )
}

/// Gemini `generateContent` client.
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    stop_sequences: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    status: Option<String>,
}

impl GeminiGenerator {
    /// Creates a client from the model settings.
    pub fn new(config: LlmConfig) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    fn extract_text(response: GenerateContentResponse) -> AppResult<String> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(AppError::Generation(format!("model returned no answer: {}", reason)));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            let reason = candidate
                .finish_reason
                .unwrap_or_else(|| "empty response".to_string());
            return Err(AppError::Generation(format!("model returned no text: {}", reason)));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl QueryGenerator for GeminiGenerator {
    async fn generate(&self, question: &str, schema: &SchemaSummary) -> AppResult<String> {
        let prompt = build_prompt(question, schema, self.config.top_k);
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                stop_sequences: vec![STOP_SEQUENCE],
            },
        };

        tracing::debug!(model = %self.config.model, prompt_chars = prompt.len(), "Calling model");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("model API unreachable: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Generation(format!("failed to read model response: {}", e)))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => match envelope.error.status {
                    Some(code) => format!("{} ({})", envelope.error.message, code),
                    None => envelope.error.message,
                },
                Err(_) => text,
            };
            return Err(AppError::Generation(format!("model API error {}: {}", status, detail)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::Generation(format!("malformed model response: {}", e)))?;
        Self::extract_text(parsed)
    }
}
