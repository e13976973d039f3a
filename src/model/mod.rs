//! Core data model types for queued messages, Exim processes and log lines.

pub mod logline;
pub mod message;
pub mod process;
