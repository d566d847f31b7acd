//! Application state for the question answering service.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::AppResult;

use crate::generator::{GeminiGenerator, QueryGenerator};
use crate::pool_manager::PoolManager;
use crate::service::QaService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool_manager: Arc<PoolManager>,
    pub qa: Arc<QaService>,
}

impl AppState {
    /// Connects to the sales database and sets up the model client.
    ///
    /// # Errors
    /// `AppError::DatabaseConnection` when the startup probe fails, in which
    /// case the service must not start serving.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let pool_manager = Arc::new(PoolManager::connect(config.database.clone()).await?);
        let generator = Arc::new(GeminiGenerator::new(config.llm.clone())?);
        Ok(Self::with_generator(config, pool_manager, generator))
    }

    /// Assembles the state from an open pool and any generator.
    pub fn with_generator(
        config: AppConfig,
        pool_manager: Arc<PoolManager>,
        generator: Arc<dyn QueryGenerator>,
    ) -> Self {
        let qa = QaService::new(
            pool_manager.clone(),
            generator,
            config.sample_rows,
            config.read_only,
        );
        Self {
            config,
            pool_manager,
            qa: Arc::new(qa),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::errors::AppError;

    #[tokio::test]
    async fn test_unreachable_database_stops_startup() {
        let config = AppConfig::from_lookup("qa-service", |key| match key {
            "GOOGLE_API_KEY" => Some("test-key".to_string()),
            "DB_TYPE" => Some("sqlite".to_string()),
            "DB_PATH" => Some("/nonexistent/dir/sales.db".to_string()),
            "DB_CONNECT_TIMEOUT_SECS" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();

        let result = AppState::new(config).await;
        assert!(matches!(result.err(), Some(AppError::DatabaseConnection(_))));
    }
}
