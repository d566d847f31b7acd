//! Question answering pipeline.
//!
//! One Execute press runs schema introspection, generation, sanitization and
//! execution in that order. A failing stage ends the request with an
//! [`Answer`] that records the stage and message; nothing is retried.

use std::sync::Arc;

use common::models::question::{Answer, AskOutcome, AskRequest, PipelineStage};
use common::utils::{SqlSanitizer, SqlValidator};
use validator::Validate;

use crate::executor::QueryExecutor;
use crate::generator::QueryGenerator;
use crate::pool_manager::PoolManager;
use crate::schema::SchemaIntrospector;

/// Runs questions through the pipeline.
pub struct QaService {
    pool_manager: Arc<PoolManager>,
    introspector: SchemaIntrospector,
    generator: Arc<dyn QueryGenerator>,
    executor: QueryExecutor,
    read_only: bool,
}

impl QaService {
    pub fn new(
        pool_manager: Arc<PoolManager>,
        generator: Arc<dyn QueryGenerator>,
        sample_rows: u32,
        read_only: bool,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(pool_manager.clone()),
            introspector: SchemaIntrospector::new(sample_rows),
            pool_manager,
            generator,
            read_only,
        }
    }

    /// Answers one question.
    ///
    /// Surrounding whitespace is trimmed before the question reaches the
    /// prompt and the returned [`Answer`], so a question of only whitespace
    /// counts as empty. A blank question short-circuits before the model or
    /// the database is touched.
    ///
    /// The cleaned query must be a single statement; with `read_only` set it
    /// must also only read. Either rejection is an execution-stage failure.
    pub async fn ask(&self, req: AskRequest) -> AskOutcome {
        let req = AskRequest {
            question: req.question.trim().to_string(),
        };
        if let Err(e) = req.validate() {
            tracing::debug!(error = %e, "No question given");
            return AskOutcome::needs_question();
        }

        let question = req.question;
        tracing::info!(question_chars = question.chars().count(), "Answering question");
        let mut answer = Answer::new(question.as_str());

        let schema = match self.introspector.introspect(&self.pool_manager).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!(error = %e, "Schema introspection failed");
                return AskOutcome::Answered(answer.fail(PipelineStage::Schema, e.to_string()));
            }
        };

        let generated = match self.generator.generate(&question, &schema).await {
            Ok(sql) => sql,
            Err(e) => {
                tracing::warn!(error = %e, "Query generation failed");
                return AskOutcome::Answered(
                    answer.fail(PipelineStage::Generation, e.to_string()),
                );
            }
        };
        tracing::info!(sql = %generated, "Raw generated query");

        let sanitized = SqlSanitizer::sanitize(&generated);
        tracing::info!(sql = %sanitized, "Cleaned query");
        answer.generated_query = Some(generated);
        answer.sanitized_query = Some(sanitized.clone());

        if sanitized.is_empty() {
            tracing::warn!("Model produced an empty query");
            return AskOutcome::Answered(
                answer.fail(PipelineStage::Execution, "the generated query is empty"),
            );
        }

        if let Err(e) = SqlValidator::validate_single_statement(&sanitized) {
            tracing::warn!(error = %e, "Query rejected as more than one statement");
            return AskOutcome::Answered(answer.fail(PipelineStage::Execution, e.to_string()));
        }

        if self.read_only {
            if let Err(e) = SqlValidator::validate_read_only(&sanitized) {
                tracing::warn!(error = %e, "Query rejected by read-only guard");
                return AskOutcome::Answered(answer.fail(PipelineStage::Execution, e.to_string()));
            }
        }

        match self.executor.execute(&sanitized).await {
            Ok(result) => AskOutcome::Answered(answer.with_result(result)),
            Err(e) => {
                tracing::warn!(error = %e, "Query execution failed");
                AskOutcome::Answered(answer.fail(PipelineStage::Execution, e.to_string()))
            }
        }
    }
}
