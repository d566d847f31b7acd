//! Shared data models.

pub mod connection;
pub mod query;
pub mod question;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DbType};
pub use query::{Bar, BarChart, ColumnInfo, QueryResult};
pub use question::{
    Answer, AskOutcome, AskRequest, PipelineStage, StageError, ENTER_QUESTION_MESSAGE,
    EXAMPLE_QUESTIONS,
};
