//! Shared building blocks for the retail sales question answering service.
//!
//! Contains configuration, the error type, the JSON extractor, the API
//! response envelope, middleware, shared models and SQL text utilities.

pub mod config;
pub mod errors;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
