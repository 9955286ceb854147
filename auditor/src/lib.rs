//! Cross-replica consistency checks over execution logs.
//!
//! Every replica logs a line per executed command, ie.
//! `2019/06/10 23:26:44 Replica 1: Executed command {59 2 42 59} with seq: 80, result: 99`.
//! A replica must execute a command at most once, and every replica that executed
//! a command must have observed the same result.

mod audit;
mod line;

pub use audit::{AuditError, AuditReport, Auditor, CommandResultTable, Mismatch, merge};
pub use line::{LineError, LogLine, TOKEN_COUNT};
