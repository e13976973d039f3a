//! Data acquisition from a running Exim: command execution, background
//! refresh, log tailing, queue and process collection, and queue actions.

pub mod actions;
pub mod command;
pub mod process;
pub mod queue;
pub mod refresher;
pub mod tailer;
pub mod tools;
