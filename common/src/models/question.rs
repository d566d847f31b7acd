//! Question and answer models.
//!
//! A question goes in, an [`AskOutcome`] comes out. Pipeline failures are
//! part of the outcome rather than transport errors, so the page and the
//! JSON API can both show them next to the query text.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::query::{BarChart, QueryResult};

/// Message shown when Execute is pressed without a question.
pub const ENTER_QUESTION_MESSAGE: &str = "Please enter a question.";

/// Sidebar examples, shown as plain text.
pub const EXAMPLE_QUESTIONS: [&str; 5] = [
    "How many unique customers are in the sales table?",
    "What is the total revenue for each product category?",
    "Who are the top 5 customers by total purchase amount?",
    "What is the average order value?",
    "Which day of the week has the highest sales?",
];

/// Request body for asking a question.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct AskRequest {
    /// Natural-language question about the sales data.
    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter a question."))]
    pub question: String,
}

/// Outcome of one Execute press.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    /// No question was given; nothing was generated or executed.
    NeedsQuestion { message: String },
    /// The pipeline ran, successfully or not.
    Answered(Answer),
}

impl AskOutcome {
    pub fn needs_question() -> Self {
        AskOutcome::NeedsQuestion {
            message: ENTER_QUESTION_MESSAGE.to_string(),
        }
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            AskOutcome::Answered(answer) => Some(answer),
            AskOutcome::NeedsQuestion { .. } => None,
        }
    }
}

/// Everything produced while answering a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Answer {
    /// The question as entered.
    pub question: String,

    /// Raw model output, when generation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,

    /// Model output after sanitization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_query: Option<String>,

    /// Result set; absent when any stage failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,

    /// Bar chart, only for two-column numeric results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<BarChart>,

    /// Failure description, when a stage failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl Answer {
    /// Starts an answer for the given question.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            generated_query: None,
            sanitized_query: None,
            result: None,
            chart: None,
            error: None,
        }
    }

    /// Records a failure and drops any partial result.
    pub fn fail(mut self, stage: PipelineStage, message: impl Into<String>) -> Self {
        self.result = None;
        self.chart = None;
        self.error = Some(StageError {
            stage,
            message: message.into(),
        });
        self
    }

    /// Attaches a result set and derives the chart from it.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.chart = result.bar_chart();
        self.result = Some(result);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }
}

/// Pipeline stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading table metadata and sample rows.
    Schema,
    /// Calling the language model.
    Generation,
    /// Running the sanitized statement.
    Execution,
}

/// A failure captured during one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageError {
    pub stage: PipelineStage,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::query::ColumnInfo;
    use serde_json::json;

    #[test]
    fn test_empty_question_fails_validation() {
        let req = AskRequest {
            question: String::new(),
        };
        assert!(req.validate().is_err());

        let req = AskRequest {
            question: "What is the average order value?".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_fail_drops_result_and_chart() {
        let result = QueryResult::new(
            vec![ColumnInfo::new("k", "TEXT"), ColumnInfo::new("v", "INTEGER")],
            vec![vec![json!("a"), json!(1)]],
        );
        let answer = Answer::new("q").with_result(result);
        assert!(answer.chart.is_some());
        assert!(answer.is_success());

        let failed = answer.fail(PipelineStage::Execution, "boom");
        assert!(failed.result.is_none());
        assert!(failed.chart.is_none());
        assert!(!failed.is_success());
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(AskOutcome::needs_question()).unwrap();
        assert_eq!(json["status"], "needs_question");
        assert_eq!(json["message"], ENTER_QUESTION_MESSAGE);

        let mut answer = Answer::new("q");
        answer.generated_query = Some("SELECT 1".into());
        let json = serde_json::to_value(AskOutcome::Answered(
            answer.fail(PipelineStage::Execution, "no such column"),
        ))
        .unwrap();
        assert_eq!(json["status"], "answered");
        assert_eq!(json["generated_query"], "SELECT 1");
        assert_eq!(json["error"]["stage"], "execution");
        assert!(json.get("result").is_none());
    }
}
