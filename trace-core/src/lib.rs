//! trace-core: shared infrastructure for the tracepoint service.
pub mod config;
pub mod error;
pub mod observability;
