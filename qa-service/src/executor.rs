//! Query execution.
//!
//! Runs one statement on a pooled connection and converts the rows into a
//! driver-independent [`QueryResult`].

use std::sync::Arc;
use std::time::Instant;

use common::errors::{AppError, AppResult};
use common::models::query::{ColumnInfo, QueryResult};
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};

use crate::pool_manager::{DatabasePool, PoolManager};

/// Executes sanitized statements against the sales database.
pub struct QueryExecutor {
    pool_manager: Arc<PoolManager>,
}

impl QueryExecutor {
    pub fn new(pool_manager: Arc<PoolManager>) -> Self {
        Self { pool_manager }
    }

    /// Executes a single statement and returns every row.
    ///
    /// # Errors
    /// `AppError::DatabaseConnection` when no connection can be acquired,
    /// `AppError::DatabaseQuery` carrying the driver message for anything the
    /// database rejects.
    pub async fn execute(&self, sql: &str) -> AppResult<QueryResult> {
        let start = Instant::now();
        let mut result = fetch(self.pool_manager.pool(), sql).await?;
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            rows = result.row_count,
            columns = result.columns.len(),
            elapsed_ms = result.execution_time_ms,
            "Query executed"
        );
        Ok(result)
    }
}

/// Runs `sql` on a connection checked out of `pool`.
///
/// The statement is prepared first so column metadata is known even when
/// no rows come back.
pub async fn fetch(pool: &DatabasePool, sql: &str) -> AppResult<QueryResult> {
    match pool {
        DatabasePool::MySQL(pool) => {
            let mut conn = pool
                .acquire()
                .await
                .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
            let statement = (&mut *conn).prepare(sql).await.map_err(query_error)?;
            let columns = describe_columns(statement.columns());
            let rows = statement
                .query()
                .fetch_all(&mut *conn)
                .await
                .map_err(query_error)?;
            let data = rows
                .iter()
                .map(|row| (0..row.len()).map(|i| mysql_value(row, i)).collect())
                .collect();
            Ok(QueryResult::new(columns, data))
        }
        DatabasePool::SQLite(pool) => {
            let mut conn = pool
                .acquire()
                .await
                .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
            let statement = (&mut *conn).prepare(sql).await.map_err(query_error)?;
            let columns = describe_columns(statement.columns());
            let rows = statement
                .query()
                .fetch_all(&mut *conn)
                .await
                .map_err(query_error)?;
            let data = rows
                .iter()
                .map(|row| (0..row.len()).map(|i| sqlite_value(row, i)).collect())
                .collect();
            Ok(QueryResult::new(columns, data))
        }
    }
}

fn query_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db) => AppError::DatabaseQuery(db.message().to_string()),
        other => AppError::DatabaseQuery(other.to_string()),
    }
}

fn describe_columns<C: Column>(columns: &[C]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|c| ColumnInfo::new(c.name(), c.type_info().name()))
        .collect()
}

fn mysql_value(row: &MySqlRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(idx).ok().map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get_unchecked::<i64, _>(idx).ok().map(Value::from)
        }
        name if name.ends_with(" UNSIGNED") => {
            row.try_get_unchecked::<u64, _>(idx).ok().map(Value::from)
        }
        "FLOAT" => row
            .try_get_unchecked::<f32, _>(idx)
            .ok()
            .map(|v| Value::from(f64::from(v))),
        "DOUBLE" => row.try_get_unchecked::<f64, _>(idx).ok().map(Value::from),
        // DECIMAL arrives as text; surface it as a number so it can be charted.
        "DECIMAL" => row
            .try_get_unchecked::<String, _>(idx)
            .ok()
            .map(|s| decimal_value(&s)),
        "DATE" => row
            .try_get_unchecked::<chrono::NaiveDate, _>(idx)
            .ok()
            .map(|d| Value::String(d.to_string())),
        "DATETIME" => row
            .try_get_unchecked::<chrono::NaiveDateTime, _>(idx)
            .ok()
            .map(|d| Value::String(d.to_string())),
        "TIMESTAMP" => row
            .try_get_unchecked::<chrono::DateTime<chrono::Utc>, _>(idx)
            .ok()
            .map(|d| Value::String(d.to_rfc3339())),
        "TIME" => row
            .try_get_unchecked::<chrono::NaiveTime, _>(idx)
            .ok()
            .map(|t| Value::String(t.to_string())),
        _ => text_or_bytes(
            row.try_get_unchecked::<String, _>(idx).ok(),
            || row.try_get_unchecked::<Vec<u8>, _>(idx).ok(),
        ),
    };

    decoded.unwrap_or_else(|| Value::String(format!("<{}>", type_name)))
}

fn sqlite_value(row: &SqliteRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(idx).ok().map(Value::from),
        "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(idx).ok().map(Value::from),
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(idx).ok().map(Value::Bool),
        _ => text_or_bytes(
            row.try_get_unchecked::<String, _>(idx).ok(),
            || row.try_get_unchecked::<Vec<u8>, _>(idx).ok(),
        ),
    };

    decoded.unwrap_or_else(|| Value::String(format!("<{}>", type_name)))
}

fn decimal_value(text: &str) -> Value {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Value::from)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

fn text_or_bytes<F>(text: Option<String>, bytes: F) -> Option<Value>
where
    F: FnOnce() -> Option<Vec<u8>>,
{
    text.map(Value::String).or_else(|| {
        bytes().map(|b| match String::from_utf8(b) {
            Ok(s) => Value::String(s),
            Err(e) => Value::String(format!("<{} bytes>", e.into_bytes().len())),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool_manager::tests::seeded_manager;
    use serde_json::json;

    async fn executor() -> QueryExecutor {
        QueryExecutor::new(Arc::new(seeded_manager().await))
    }

    #[tokio::test]
    async fn test_returns_columns_and_rows_in_order() {
        let result = executor()
            .await
            .execute(
                "SELECT product_category, SUM(total_amount) AS revenue \
                 FROM sales GROUP BY product_category ORDER BY product_category",
            )
            .await
            .unwrap();

        assert_eq!(result.column_names(), vec!["product_category", "revenue"]);
        assert_eq!(result.row_count, 3);
        assert_eq!(result.rows[0], vec![json!("Beauty"), json!(150.0)]);
        assert_eq!(result.rows[1], vec![json!("Clothing"), json!(1500.0)]);
        assert!(result.bar_chart().is_some());
    }

    #[tokio::test]
    async fn test_scalar_types_are_decoded() {
        let result = executor()
            .await
            .execute("SELECT COUNT(DISTINCT customer_id), AVG(age), NULL, 'x' FROM sales")
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], json!(3));
        assert!(result.rows[0][1].is_number());
        assert_eq!(result.rows[0][2], Value::Null);
        assert_eq!(result.rows[0][3], json!("x"));
    }

    #[tokio::test]
    async fn test_empty_result_keeps_columns() {
        let result = executor()
            .await
            .execute("SELECT customer_id, total_amount FROM sales WHERE age > 200")
            .await
            .unwrap();
        assert_eq!(result.row_count, 0);
        assert_eq!(result.column_names(), vec!["customer_id", "total_amount"]);
    }

    #[tokio::test]
    async fn test_missing_column_is_query_error() {
        let err = executor()
            .await
            .execute("SELECT Number_of_Customers FROM sales")
            .await
            .unwrap_err();
        match err {
            AppError::DatabaseQuery(msg) => assert!(msg.contains("Number_of_Customers")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_is_released_after_error() {
        let executor = executor().await;
        assert!(executor.execute("SELECT nope FROM sales").await.is_err());
        // The single pooled connection must be back for the next statement.
        let result = executor.execute("SELECT 1 AS one").await.unwrap();
        assert_eq!(result.rows, vec![vec![json!(1)]]);
    }

    #[test]
    fn test_decimal_value() {
        assert_eq!(decimal_value("155580.00"), json!(155580.0));
        assert_eq!(decimal_value("abc"), json!("abc"));
    }
}
