//! `eximshell` — a terminal monitor for the Exim mail transfer agent.
//!
//! This crate provides the core library for running the Exim tools, tailing
//! the main log without blocking, keeping queue and process snapshots fresh
//! on background workers, and acting on queued messages.

pub mod config;
pub mod error;
pub mod exim;
pub mod model;
pub mod stats;
pub mod tui;
