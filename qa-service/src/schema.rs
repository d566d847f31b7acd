//! Schema introspection.
//!
//! Builds the table description handed to the language model: one
//! `CREATE TABLE` block per base table followed by a few sample rows.

use std::fmt;

use common::errors::{AppError, AppResult};
use common::models::connection::DbType;
use common::models::query::{display_value, ColumnInfo, QueryResult};

use crate::executor;
use crate::pool_manager::{DatabasePool, PoolManager};

/// Sample values longer than this are cut in the prompt.
const MAX_SAMPLE_VALUE_CHARS: usize = 100;

/// A table column as declared in the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// One table with its columns and sample rows.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<TableColumn>,
    pub sample: QueryResult,
}

/// Every table of the database, in name order.
#[derive(Debug, Clone)]
pub struct SchemaSummary {
    pub db_type: DbType,
    pub sample_rows: u32,
    pub tables: Vec<TableInfo>,
}

impl SchemaSummary {
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

impl fmt::Display for SchemaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "CREATE TABLE {} (", table.name)?;
            let defs: Vec<String> = table
                .columns
                .iter()
                .map(|c| {
                    let null = if c.nullable { "" } else { " NOT NULL" };
                    format!("\t{} {}{}", c.name, c.data_type, null)
                })
                .collect();
            writeln!(f, "{}", defs.join(", \n"))?;
            writeln!(f, ")")?;
            writeln!(f)?;
            writeln!(f, "/*")?;
            writeln!(
                f,
                "{} rows from {} table:",
                self.sample_rows, table.name
            )?;
            let header: Vec<&str> = table.sample.column_names();
            writeln!(f, "{}", header.join("\t"))?;
            for row in &table.sample.rows {
                let cells: Vec<String> = row.iter().map(sample_cell).collect();
                writeln!(f, "{}", cells.join("\t"))?;
            }
            writeln!(f, "*/")?;
        }
        Ok(())
    }
}

fn sample_cell(value: &serde_json::Value) -> String {
    let text = display_value(value);
    if text.chars().count() > MAX_SAMPLE_VALUE_CHARS {
        text.chars().take(MAX_SAMPLE_VALUE_CHARS).collect()
    } else {
        text
    }
}

/// Reads table metadata and sample rows.
pub struct SchemaIntrospector {
    sample_rows: u32,
}

impl SchemaIntrospector {
    pub fn new(sample_rows: u32) -> Self {
        Self { sample_rows }
    }

    /// Describes every base table of the connected database.
    ///
    /// # Errors
    /// Any failure is reported as `AppError::DatabaseConnection`, the same
    /// class as a failed startup probe.
    pub async fn introspect(&self, pool_manager: &PoolManager) -> AppResult<SchemaSummary> {
        let pool = pool_manager.pool();
        let columns = list_columns(pool).await.map_err(as_connection_error)?;

        let mut tables: Vec<TableInfo> = Vec::new();
        for (table, column) in columns {
            match tables.last_mut() {
                Some(last) if last.name == table => last.columns.push(column),
                _ => tables.push(TableInfo {
                    name: table,
                    columns: vec![column],
                    sample: QueryResult::new(Vec::new(), Vec::new()),
                }),
            }
        }

        for table in &mut tables {
            let sql = format!(
                "SELECT * FROM {} LIMIT {}",
                quote_identifier(pool.db_type(), &table.name),
                self.sample_rows
            );
            table.sample = executor::fetch(pool, &sql)
                .await
                .map_err(as_connection_error)?;
            if table.sample.columns.is_empty() {
                table.sample.columns = table
                    .columns
                    .iter()
                    .map(|c| ColumnInfo::new(c.name.clone(), c.data_type.clone()))
                    .collect();
            }
        }

        let summary = SchemaSummary {
            db_type: pool.db_type(),
            sample_rows: self.sample_rows,
            tables,
        };
        tracing::debug!(tables = ?summary.table_names(), "Schema introspected");
        Ok(summary)
    }
}

/// Returns `(table, column)` pairs ordered by table name then column position.
async fn list_columns(pool: &DatabasePool) -> AppResult<Vec<(String, TableColumn)>> {
    let rows: Vec<(String, String, String, bool)> = match pool {
        DatabasePool::MySQL(pool) => {
            let rows: Vec<(String, String, String, String)> = sqlx::query_as(
                "SELECT CAST(c.TABLE_NAME AS CHAR), CAST(c.COLUMN_NAME AS CHAR),
                        CAST(c.COLUMN_TYPE AS CHAR), CAST(c.IS_NULLABLE AS CHAR)
                 FROM information_schema.COLUMNS c
                 JOIN information_schema.TABLES t
                   ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
                 WHERE c.TABLE_SCHEMA = DATABASE() AND t.TABLE_TYPE = 'BASE TABLE'
                 ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION",
            )
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
            rows.into_iter()
                .map(|(t, c, ty, nullable)| (t, c, ty.to_uppercase(), nullable == "YES"))
                .collect()
        }
        DatabasePool::SQLite(pool) => {
            let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
                "SELECT m.name, p.name, p.type, p.\"notnull\"
                 FROM sqlite_master m
                 JOIN pragma_table_info(m.name) p
                 WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
                 ORDER BY m.name, p.cid",
            )
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
            rows.into_iter()
                .map(|(t, c, ty, notnull)| (t, c, ty, notnull == 0))
                .collect()
        }
    };

    Ok(rows
        .into_iter()
        .map(|(table, name, data_type, nullable)| {
            (
                table,
                TableColumn {
                    name,
                    data_type,
                    nullable,
                },
            )
        })
        .collect())
}

fn quote_identifier(db_type: DbType, name: &str) -> String {
    match db_type {
        DbType::MySQL => format!("`{}`", name.replace('`', "``")),
        DbType::SQLite => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn as_connection_error(e: AppError) -> AppError {
    match e {
        AppError::DatabaseConnection(_) => e,
        other => AppError::DatabaseConnection(format!("schema introspection failed: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool_manager::tests::seeded_manager;

    #[tokio::test]
    async fn test_introspects_tables_and_samples() {
        let manager = seeded_manager().await;
        let summary = SchemaIntrospector::new(3).introspect(&manager).await.unwrap();

        assert_eq!(summary.table_names(), vec!["sales"]);
        let sales = &summary.tables[0];
        assert_eq!(sales.columns.len(), 9);
        assert_eq!(sales.columns[0].name, "transaction_id");
        assert!(!sales.columns[1].nullable);
        assert!(sales.columns[3].nullable);
        assert_eq!(sales.sample.row_count, 3);
    }

    #[tokio::test]
    async fn test_prompt_text_layout() {
        let manager = seeded_manager().await;
        let summary = SchemaIntrospector::new(3).introspect(&manager).await.unwrap();
        let text = summary.to_string();

        assert!(text.starts_with("CREATE TABLE sales (\n\ttransaction_id INTEGER"));
        assert!(text.contains("\tdate TEXT NOT NULL, \n"));
        assert!(text.contains("/*\n3 rows from sales table:\n"));
        assert!(text.contains("transaction_id\tdate\tcustomer_id"));
        assert!(text.contains("1\t2023-11-24\tCUST001\tMale\t34\tBeauty\t3\t50.0\t150.0"));
        assert!(text.trim_end().ends_with("*/"));
    }

    #[tokio::test]
    async fn test_introspection_failure_is_connection_class() {
        let manager = seeded_manager().await;
        manager.close().await;
        let err = SchemaIntrospector::new(3).introspect(&manager).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseConnection(_)));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier(DbType::MySQL, "sa`les"), "`sa``les`");
        assert_eq!(quote_identifier(DbType::SQLite, "sales"), "\"sales\"");
    }

    #[test]
    fn test_long_sample_values_are_cut() {
        let long = serde_json::Value::String("x".repeat(150));
        assert_eq!(sample_cell(&long).len(), MAX_SAMPLE_VALUE_CHARS);
    }
}
